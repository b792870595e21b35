use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Resolution;

/// Timezone of the exchange whose sessions the series follow
pub const EXCHANGE_TZ: Tz = chrono_tz::America::New_York;

/// Regular session open (exchange local time)
pub fn session_open() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default()
}

/// Regular session close (exchange local time), inclusive slot
pub fn session_close() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default()
}

/// Close plus a ten minute buffer so provider feeds can settle
pub fn eod_trigger_time() -> NaiveTime {
    NaiveTime::from_hms_opt(16, 10, 0).unwrap_or_default()
}

/// Exchange-local calendar date of an instant
pub fn exchange_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&EXCHANGE_TZ).date_naive()
}

/// Today's date at the exchange
pub fn exchange_today() -> NaiveDate {
    exchange_date(Utc::now())
}

/// Current time at the exchange
pub fn exchange_now() -> DateTime<Tz> {
    Utc::now().with_timezone(&EXCHANGE_TZ)
}

/// Exchange-local wall clock time on `date`, resolved to an instant
///
/// Returns `None` for wall clock times skipped by a DST transition.
pub fn exchange_datetime(date: NaiveDate, time: NaiveTime) -> Option<DateTime<Tz>> {
    EXCHANGE_TZ.from_local_datetime(&date.and_time(time)).earliest()
}

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, `None` when `start` is after `end`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        if start > end {
            None
        } else {
            Some(Self { start, end })
        }
    }

    /// Number of calendar days covered
    pub fn num_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// Split into calendar-month pieces, each clamped to the range
    pub fn month_chunks(&self) -> Vec<DateRange> {
        let mut chunks = Vec::new();
        let mut current = self.start;

        while current <= self.end {
            let chunk_end = last_day_of_month(current).min(self.end);
            chunks.push(DateRange {
                start: current,
                end: chunk_end,
            });
            match chunk_end.succ_opt() {
                Some(next) => current = next,
                None => break,
            }
        }

        chunks
    }
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

/// Slot instants of the regular session on `date` for an intraday resolution
///
/// 09:30 through 16:00 inclusive at the resolution step. Daily series have
/// no intraday grid, so the daily resolution yields no slots.
pub fn session_slots(date: NaiveDate, resolution: Resolution) -> Vec<DateTime<Utc>> {
    if !resolution.is_intraday() {
        return Vec::new();
    }

    let step = resolution.step();
    let close = session_close();
    let mut slots = Vec::new();
    let mut time = session_open();

    loop {
        if let Some(dt) = exchange_datetime(date, time) {
            slots.push(dt.with_timezone(&Utc));
        }
        let (next, wrapped) = time.overflowing_add_signed(step);
        if wrapped != 0 || next > close {
            break;
        }
        time = next;
    }

    slots
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Next end-of-day trigger after `now`
///
/// Today at 16:10 exchange time if that has not passed yet, otherwise the
/// next weekday at 16:10.
pub fn next_market_close_run(now: DateTime<Tz>) -> DateTime<Tz> {
    let trigger = eod_trigger_time();
    let today = now.date_naive();

    if let Some(today_trigger) = exchange_datetime(today, trigger) {
        if now <= today_trigger {
            return today_trigger;
        }
    }

    let mut next_day = today + Duration::days(1);
    while is_weekend(next_day) {
        next_day += Duration::days(1);
    }

    exchange_datetime(next_day, trigger)
        .unwrap_or_else(|| EXCHANGE_TZ.from_utc_datetime(&next_day.and_time(trigger)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ny(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        EXCHANGE_TZ.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_date_range_rejects_inverted() {
        assert!(DateRange::new(date(2024, 3, 2), date(2024, 3, 1)).is_none());
        let range = DateRange::new(date(2024, 3, 1), date(2024, 3, 1)).unwrap();
        assert_eq!(range.num_days(), 1);
    }

    #[test]
    fn test_month_chunks_clamped_to_range() {
        let range = DateRange::new(date(2023, 11, 20), date(2024, 2, 10)).unwrap();
        let chunks = range.month_chunks();

        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], DateRange { start: date(2023, 11, 20), end: date(2023, 11, 30) });
        assert_eq!(chunks[1], DateRange { start: date(2023, 12, 1), end: date(2023, 12, 31) });
        assert_eq!(chunks[2], DateRange { start: date(2024, 1, 1), end: date(2024, 1, 31) });
        assert_eq!(chunks[3], DateRange { start: date(2024, 2, 1), end: date(2024, 2, 10) });
    }

    #[test]
    fn test_month_chunks_single_month() {
        let range = DateRange::new(date(2024, 2, 5), date(2024, 2, 29)).unwrap();
        assert_eq!(range.month_chunks(), vec![range]);
    }

    #[test]
    fn test_session_slots_five_minutes() {
        let slots = session_slots(date(2024, 1, 2), Resolution::FiveMinutes);
        // 09:30..=16:00 every 5 minutes
        assert_eq!(slots.len(), 79);
        assert_eq!(slots[0], Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap());
        assert_eq!(slots[78], Utc.with_ymd_and_hms(2024, 1, 2, 21, 0, 0).unwrap());
    }

    #[test]
    fn test_session_slots_follow_dst() {
        // EDT: 09:30 local is 13:30 UTC
        let slots = session_slots(date(2024, 7, 1), Resolution::FifteenMinutes);
        assert_eq!(slots.len(), 27);
        assert_eq!(slots[0], Utc.with_ymd_and_hms(2024, 7, 1, 13, 30, 0).unwrap());
    }

    #[test]
    fn test_session_slots_daily() {
        assert!(session_slots(date(2024, 1, 2), Resolution::OneDay).is_empty());
    }

    #[test]
    fn test_next_run_before_close_is_today() {
        let now = ny(2024, 1, 3, 11, 0);
        assert_eq!(next_market_close_run(now), ny(2024, 1, 3, 16, 10));
    }

    #[test]
    fn test_next_run_at_trigger_is_today() {
        let now = ny(2024, 1, 3, 16, 10);
        assert_eq!(next_market_close_run(now), ny(2024, 1, 3, 16, 10));
    }

    #[test]
    fn test_next_run_after_close_is_next_day() {
        let now = ny(2024, 1, 3, 17, 0);
        assert_eq!(next_market_close_run(now), ny(2024, 1, 4, 16, 10));
    }

    #[test]
    fn test_next_run_skips_weekend() {
        // Friday evening -> Monday
        let now = ny(2024, 1, 5, 18, 30);
        assert_eq!(next_market_close_run(now), ny(2024, 1, 8, 16, 10));
    }

    #[test]
    fn test_exchange_date_uses_local_calendar() {
        // 02:00 UTC on Jan 3 is still Jan 2 in New York
        let instant = Utc.with_ymd_and_hms(2024, 1, 3, 2, 0, 0).unwrap();
        assert_eq!(exchange_date(instant), date(2024, 1, 2));
    }
}
