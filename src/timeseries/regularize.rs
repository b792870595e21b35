//! Raw series merging and session-scoped regularization
//!
//! Raw bars arrive gappy, unsorted and possibly overlapping between fetches.
//! They are merged into one deduplicated series and then reindexed onto the
//! fixed session grid of their resolution. Gaps are forward-filled only from
//! earlier slots of the same exchange-local day.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};

use super::calendar::{exchange_date, session_slots};
use crate::models::{Bar, CleanBar, Resolution};

/// Deduplicate bars by timestamp and sort ascending
///
/// When two bars share a timestamp the one that comes later in the input
/// wins. Bars with non-finite values are dropped. Values are rounded to the
/// persisted precision.
pub fn dedupe_sorted<'a, I>(bars: I) -> Vec<Bar>
where
    I: IntoIterator<Item = &'a Bar>,
{
    let mut by_time: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();
    for bar in bars {
        if !bar.is_finite() {
            continue;
        }
        by_time.insert(bar.timestamp, bar.rounded());
    }
    by_time.into_values().collect()
}

/// Concatenate existing and freshly fetched raw bars (last-write-wins)
pub fn merge_raw(existing: &[Bar], new: &[Bar]) -> Vec<Bar> {
    dedupe_sorted(existing.iter().chain(new.iter()))
}

/// Reindex raw bars onto the resolution's session calendar
///
/// Intraday: every slot 09:30..=16:00 of each exchange-local date present in
/// the input. Daily: one slot per date present. A slot without an observation
/// takes the previous slot's close with zero volume; slots before the first
/// observation of a day are left out.
pub fn regularize(symbol: &str, raw: &[Bar], resolution: Resolution) -> Vec<CleanBar> {
    let bars = dedupe_sorted(raw);

    if !resolution.is_intraday() {
        return regularize_daily(symbol, &bars);
    }

    let mut by_time: HashMap<DateTime<Utc>, &Bar> = HashMap::with_capacity(bars.len());
    let mut dates: Vec<NaiveDate> = Vec::new();
    for bar in &bars {
        by_time.insert(bar.timestamp, bar);
        let date = exchange_date(bar.timestamp);
        if dates.last() != Some(&date) {
            dates.push(date);
        }
    }

    let mut clean = Vec::with_capacity(dates.len() * 79);
    for date in dates {
        // Reset per day: nothing leaks across the overnight boundary
        let mut previous_close: Option<f64> = None;

        for slot in session_slots(date, resolution) {
            match by_time.get(&slot) {
                Some(bar) => {
                    clean.push(CleanBar::observed(symbol, bar));
                    previous_close = Some(bar.close);
                }
                None => {
                    if let Some(close) = previous_close {
                        clean.push(CleanBar::filled(symbol, slot, close));
                    }
                }
            }
        }
    }

    clean
}

fn regularize_daily(symbol: &str, bars: &[Bar]) -> Vec<CleanBar> {
    let mut by_date: BTreeMap<NaiveDate, &Bar> = BTreeMap::new();
    for bar in bars {
        by_date.insert(exchange_date(bar.timestamp), bar);
    }
    by_date
        .values()
        .map(|bar| CleanBar::observed(symbol, bar))
        .collect()
}

/// Merge a fresh fetch into the existing raw series and re-derive the clean series
pub fn merge_and_regularize(
    symbol: &str,
    existing_raw: &[Bar],
    new_raw: &[Bar],
    resolution: Resolution,
) -> (Vec<Bar>, Vec<CleanBar>) {
    let raw = merge_raw(existing_raw, new_raw);
    let clean = regularize(symbol, &raw, resolution);
    (raw, clean)
}
