use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::market_data::MarketDataProvider;
use crate::models::{Bar, Resolution};
use crate::storage::SeriesStore;
use crate::timeseries::{exchange_date, exchange_today, merge_and_regularize, DateRange};
use crate::utils::tickers::normalize_symbols;

/// Outcome for one (symbol, resolution) pair of a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    /// New bars were merged and both tables rewritten
    Updated {
        fetched: usize,
        raw_rows: usize,
        clean_rows: usize,
    },
    /// The series already reaches today
    UpToDate,
    /// The provider returned nothing for the window
    NoData,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SyncEntry {
    pub symbol: String,
    pub resolution: Resolution,
    pub status: SyncStatus,
}

/// Summary of one synchronization pass
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SyncReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub entries: Vec<SyncEntry>,
}

impl SyncReport {
    pub fn updated(&self) -> usize {
        self.count(|s| matches!(s, SyncStatus::Updated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, SyncStatus::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&SyncStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| pred(&e.status)).count()
    }
}

/// Window to request given the sync cursor of a series
///
/// No data yet: the last `lookback_days` up to today. Otherwise from the day
/// after the tail through today; `None` when that start lies after today.
pub fn fetch_window_from_tail(
    tail: Option<DateTime<Utc>>,
    today: NaiveDate,
    lookback_days: i64,
) -> Option<DateRange> {
    match tail {
        None => DateRange::new(today - ChronoDuration::days(lookback_days), today),
        Some(tail) => {
            let start = exchange_date(tail).succ_opt()?;
            DateRange::new(start, today)
        }
    }
}

/// Incremental OHLCV synchronizer
///
/// Brings the raw and clean tables of each (symbol, resolution) up to date
/// by fetching only the dates after the stored tail.
pub struct BarSynchronizer {
    provider: Arc<dyn MarketDataProvider>,
    store: SeriesStore,
    resolutions: Vec<Resolution>,
    lookback_days: i64,
    chunk_delay: Duration,
    /// Serializes passes; the synchronizer is the only writer of series files
    pass_lock: tokio::sync::Mutex<()>,
    last_run_at: RwLock<Option<DateTime<Utc>>>,
}

impl BarSynchronizer {
    pub fn new(provider: Arc<dyn MarketDataProvider>, store: SeriesStore) -> Self {
        Self {
            provider,
            store,
            resolutions: Resolution::intraday(),
            lookback_days: 30,
            chunk_delay: Duration::from_millis(200),
            pass_lock: tokio::sync::Mutex::new(()),
            last_run_at: RwLock::new(None),
        }
    }

    pub fn with_resolutions(mut self, resolutions: Vec<Resolution>) -> Self {
        self.resolutions = resolutions;
        self
    }

    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn store(&self) -> &SeriesStore {
        &self.store
    }

    pub fn resolutions(&self) -> &[Resolution] {
        &self.resolutions
    }

    pub fn last_run_at(&self) -> Option<DateTime<Utc>> {
        *self.last_run_at.read()
    }

    /// Date range still missing from a persisted series, as of `today`
    pub async fn determine_fetch_window(
        &self,
        symbol: &str,
        resolution: Resolution,
        today: NaiveDate,
    ) -> Result<Option<DateRange>, ServiceError> {
        let store = self.store.clone();
        let sym = symbol.to_string();
        let tail = tokio::task::spawn_blocking(move || store.tail_timestamp(&sym, resolution)).await??;

        Ok(fetch_window_from_tail(tail, today, self.lookback_days))
    }

    /// Fetch `range` from the provider
    ///
    /// Intraday ranges are requested one calendar month at a time with a
    /// pause between requests; a failing chunk is logged and skipped.
    /// Returns `None` when nothing came back.
    pub async fn fetch_range(
        &self,
        symbol: &str,
        resolution: Resolution,
        range: DateRange,
    ) -> Option<Vec<Bar>> {
        let mut bars = Vec::new();

        if resolution.is_intraday() {
            for (i, chunk) in range.month_chunks().into_iter().enumerate() {
                if i > 0 && !self.chunk_delay.is_zero() {
                    tokio::time::sleep(self.chunk_delay).await;
                }

                match self
                    .provider
                    .get_bars(symbol, resolution, chunk.start, chunk.end)
                    .await
                {
                    Ok(chunk_bars) => {
                        tracing::debug!(
                            "📥 {} {} {}..{}: {} bars",
                            symbol,
                            resolution,
                            chunk.start,
                            chunk.end,
                            chunk_bars.len()
                        );
                        bars.extend(chunk_bars);
                    }
                    Err(e) => {
                        tracing::warn!(
                            "⚠️  Skipping {} {} chunk {}..{}: {}",
                            symbol,
                            resolution,
                            chunk.start,
                            chunk.end,
                            e
                        );
                    }
                }
            }
        } else {
            match self
                .provider
                .get_bars(symbol, resolution, range.start, range.end)
                .await
            {
                Ok(daily) => bars = daily,
                Err(e) => {
                    tracing::warn!("⚠️  Daily fetch for {} failed: {}", symbol, e);
                }
            }
        }

        if bars.is_empty() {
            return None;
        }
        bars.sort_by_key(|b| b.timestamp);
        Some(bars)
    }

    /// Bring one series up to date
    pub async fn sync_series(
        &self,
        symbol: &str,
        resolution: Resolution,
        today: NaiveDate,
    ) -> Result<SyncStatus, ServiceError> {
        let Some(window) = self.determine_fetch_window(symbol, resolution, today).await? else {
            tracing::debug!("{} {} is up to date", symbol, resolution);
            return Ok(SyncStatus::UpToDate);
        };

        let Some(fetched) = self.fetch_range(symbol, resolution, window).await else {
            tracing::info!(
                "No new {} data for {} between {} and {}",
                resolution,
                symbol,
                window.start,
                window.end
            );
            return Ok(SyncStatus::NoData);
        };

        let store = self.store.clone();
        let sym = symbol.to_string();
        let fetched_count = fetched.len();

        let (raw_rows, clean_rows) = tokio::task::spawn_blocking(move || {
            let existing = store.read_raw(&sym, resolution)?;
            let (raw, clean) = merge_and_regularize(&sym, &existing, &fetched, resolution);
            store.write_series(&sym, resolution, &raw, &clean)?;
            Ok::<_, ServiceError>((raw.len(), clean.len()))
        })
        .await??;

        tracing::info!(
            "✅ {} {}: +{} bars ({} raw, {} clean)",
            symbol,
            resolution,
            fetched_count,
            raw_rows,
            clean_rows
        );

        Ok(SyncStatus::Updated {
            fetched: fetched_count,
            raw_rows,
            clean_rows,
        })
    }

    /// Run one pass over `symbols` for every configured resolution
    pub async fn run_once(&self, symbols: &[String]) -> SyncReport {
        self.run_once_as_of(symbols, exchange_today()).await
    }

    /// [`run_once`](Self::run_once) with an explicit exchange-local "today"
    pub async fn run_once_as_of(&self, symbols: &[String], today: NaiveDate) -> SyncReport {
        self.run_once_while(symbols, today, || true).await
    }

    /// Run a pass that stops early once `keep_going` returns false
    ///
    /// `keep_going` is checked before each (symbol, resolution) entry; the
    /// report only lists the entries that were processed.
    pub async fn run_once_while<F>(&self, symbols: &[String], today: NaiveDate, keep_going: F) -> SyncReport
    where
        F: Fn() -> bool + Send + Sync,
    {
        let _pass = self.pass_lock.lock().await;
        let started_at = Utc::now();
        let symbols = normalize_symbols(symbols);

        tracing::info!(
            "🔄 Sync pass started: {} symbols x {} resolutions",
            symbols.len(),
            self.resolutions.len()
        );

        let mut entries = Vec::with_capacity(symbols.len() * self.resolutions.len());
        'pass: for resolution in &self.resolutions {
            for symbol in &symbols {
                if !keep_going() {
                    tracing::info!(
                        "Sync pass interrupted after {} of {} series",
                        entries.len(),
                        symbols.len() * self.resolutions.len()
                    );
                    break 'pass;
                }

                let status = match self.sync_series(symbol, *resolution, today).await {
                    Ok(status) => status,
                    Err(e) => {
                        tracing::error!("❌ Sync of {} {} failed: {}", symbol, resolution, e);
                        SyncStatus::Failed {
                            error: e.to_string(),
                        }
                    }
                };
                entries.push(SyncEntry {
                    symbol: symbol.clone(),
                    resolution: *resolution,
                    status,
                });
            }
        }

        let finished_at = Utc::now();
        *self.last_run_at.write() = Some(finished_at);

        let report = SyncReport {
            started_at,
            finished_at,
            entries,
        };
        tracing::info!(
            "🏁 Sync pass finished: {} updated, {} failed",
            report.updated(),
            report.failed()
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{bar_at, ny_utc, session_bars, MockProvider};
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn synchronizer(provider: Arc<MockProvider>, dir: &TempDir) -> BarSynchronizer {
        BarSynchronizer::new(provider, SeriesStore::new(dir.path()))
            .with_resolutions(vec![Resolution::FiveMinutes])
            .with_chunk_delay(Duration::ZERO)
    }

    #[test]
    fn test_window_without_data_uses_lookback() {
        let window = fetch_window_from_tail(None, date(2024, 3, 15), 30).unwrap();
        assert_eq!(window.start, date(2024, 2, 14));
        assert_eq!(window.end, date(2024, 3, 15));
    }

    #[test]
    fn test_window_starts_day_after_tail() {
        let tail = ny_utc(2024, 3, 12, 16, 0);
        let window = fetch_window_from_tail(Some(tail), date(2024, 3, 15), 30).unwrap();
        assert_eq!(window.start, date(2024, 3, 13));
        assert_eq!(window.end, date(2024, 3, 15));
    }

    #[test]
    fn test_window_none_when_tail_is_today_or_later() {
        let today = date(2024, 3, 15);
        assert!(fetch_window_from_tail(Some(ny_utc(2024, 3, 15, 16, 0)), today, 30).is_none());
        assert!(fetch_window_from_tail(Some(ny_utc(2024, 3, 20, 9, 30)), today, 30).is_none());
    }

    #[tokio::test]
    async fn test_fetch_range_splits_by_month_and_skips_failed_chunk() {
        let bars = vec![
            bar_at(ny_utc(2024, 1, 30, 10, 0), 100.0, 1.0),
            bar_at(ny_utc(2024, 2, 5, 10, 0), 101.0, 1.0),
            bar_at(ny_utc(2024, 3, 4, 10, 0), 102.0, 1.0),
        ];
        let provider = Arc::new(
            MockProvider::new()
                .with_bars("AAPL", bars)
                .failing_chunk(date(2024, 2, 1)),
        );
        let dir = TempDir::new().unwrap();
        let sync = synchronizer(provider.clone(), &dir);

        let range = DateRange::new(date(2024, 1, 20), date(2024, 3, 10)).unwrap();
        let fetched = sync
            .fetch_range("AAPL", Resolution::FiveMinutes, range)
            .await
            .unwrap();

        let requests = provider.bar_requests();
        assert_eq!(requests.len(), 3);
        assert_eq!((requests[0].2, requests[0].3), (date(2024, 1, 20), date(2024, 1, 31)));
        assert_eq!((requests[2].2, requests[2].3), (date(2024, 3, 1), date(2024, 3, 10)));

        let closes: Vec<f64> = fetched.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![100.0, 102.0]);
    }

    #[tokio::test]
    async fn test_fetch_range_none_when_empty() {
        let provider = Arc::new(MockProvider::new());
        let dir = TempDir::new().unwrap();
        let sync = synchronizer(provider, &dir);

        let range = DateRange::new(date(2024, 1, 2), date(2024, 1, 5)).unwrap();
        assert!(sync
            .fetch_range("AAPL", Resolution::FiveMinutes, range)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_daily_range_is_fetched_in_one_call() {
        let bars = vec![
            bar_at(ny_utc(2024, 1, 2, 16, 0), 100.0, 1.0),
            bar_at(ny_utc(2024, 3, 4, 16, 0), 102.0, 1.0),
        ];
        let provider = Arc::new(MockProvider::new().with_bars("AAPL", bars));
        let dir = TempDir::new().unwrap();
        let sync = synchronizer(provider.clone(), &dir);

        let range = DateRange::new(date(2024, 1, 1), date(2024, 4, 30)).unwrap();
        let fetched = sync
            .fetch_range("AAPL", Resolution::OneDay, range)
            .await
            .unwrap();

        let requests = provider.bar_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].1, Resolution::OneDay);
        assert_eq!((requests[0].2, requests[0].3), (range.start, range.end));
        assert_eq!(fetched.len(), 2);
    }

    #[tokio::test]
    async fn test_daily_fetch_failure_yields_none() {
        let provider = Arc::new(MockProvider::new().failing_for("AAPL"));
        let dir = TempDir::new().unwrap();
        let sync = synchronizer(provider.clone(), &dir);

        let range = DateRange::new(date(2024, 1, 1), date(2024, 4, 30)).unwrap();
        assert!(sync.fetch_range("AAPL", Resolution::OneDay, range).await.is_none());
        assert_eq!(provider.bar_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_pass_stops_between_series() {
        let provider = Arc::new(
            MockProvider::new()
                .with_bars("AAA", session_bars(date(2024, 1, 2), 10.0))
                .with_bars("BBB", session_bars(date(2024, 1, 2), 20.0))
                .with_bars("CCC", session_bars(date(2024, 1, 2), 30.0)),
        );
        let dir = TempDir::new().unwrap();
        let sync = synchronizer(provider.clone(), &dir);

        let checks = std::sync::atomic::AtomicUsize::new(0);
        let symbols = vec!["AAA".to_string(), "BBB".to_string(), "CCC".to_string()];
        let report = sync
            .run_once_while(&symbols, date(2024, 1, 2), || {
                checks.fetch_add(1, std::sync::atomic::Ordering::SeqCst) < 2
            })
            .await;

        assert_eq!(report.entries.len(), 2);
        assert_eq!(report.entries[1].symbol, "BBB");
        assert!(provider.bar_requests().iter().all(|r| r.0 != "CCC"));
        assert!(sync.store().read_raw("CCC", Resolution::FiveMinutes).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_once_writes_then_reports_up_to_date() {
        let provider = Arc::new(MockProvider::new().with_bars("AAPL", session_bars(date(2024, 1, 2), 100.0)));
        let dir = TempDir::new().unwrap();
        let sync = synchronizer(provider, &dir);
        let today = date(2024, 1, 2);

        let report = sync.run_once_as_of(&["aapl".to_string()], today).await;
        assert_eq!(report.entries.len(), 1);
        assert_eq!(report.entries[0].symbol, "AAPL");
        assert_eq!(
            report.entries[0].status,
            SyncStatus::Updated {
                fetched: 79,
                raw_rows: 79,
                clean_rows: 79
            }
        );
        assert!(sync.last_run_at().is_some());

        let clean = sync.store().read_clean("AAPL", Resolution::FiveMinutes).unwrap();
        assert_eq!(clean.last().unwrap().timestamp, ny_utc(2024, 1, 2, 16, 0));

        // Tail is today: nothing left to fetch
        let second = sync.run_once_as_of(&["AAPL".to_string()], today).await;
        assert_eq!(second.entries[0].status, SyncStatus::UpToDate);
    }

    #[tokio::test]
    async fn test_incremental_pass_merges_with_existing() {
        let mut bars = session_bars(date(2024, 1, 2), 100.0);
        bars.extend(session_bars(date(2024, 1, 3), 110.0));
        let provider = Arc::new(MockProvider::new().with_bars("MSFT", bars));
        let dir = TempDir::new().unwrap();
        let sync = synchronizer(provider.clone(), &dir);

        sync.run_once_as_of(&["MSFT".to_string()], date(2024, 1, 2)).await;
        let report = sync.run_once_as_of(&["MSFT".to_string()], date(2024, 1, 3)).await;

        let last_request = provider.bar_requests().last().cloned().unwrap();
        assert_eq!((last_request.2, last_request.3), (date(2024, 1, 3), date(2024, 1, 3)));
        assert!(matches!(
            report.entries[0].status,
            SyncStatus::Updated { raw_rows: 158, clean_rows: 158, .. }
        ));
    }

    #[tokio::test]
    async fn test_failing_symbol_does_not_block_others() {
        let provider = Arc::new(
            MockProvider::new()
                .with_bars("ABC", session_bars(date(2024, 1, 2), 50.0))
                .failing_for("XYZ"),
        );
        let dir = TempDir::new().unwrap();
        let sync = synchronizer(provider, &dir);

        let report = sync
            .run_once_as_of(&["XYZ".to_string(), "ABC".to_string()], date(2024, 1, 2))
            .await;

        // Every chunk of XYZ fails, which leaves nothing to merge
        assert_eq!(report.entries[0].status, SyncStatus::NoData);
        assert!(matches!(report.entries[1].status, SyncStatus::Updated { .. }));
        assert_eq!(report.updated(), 1);
    }
}
