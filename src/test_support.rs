//! Shared fixtures and in-memory collaborators for unit tests

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::database::models::{NewPrediction, Prediction};
use crate::database::repositories::PredictionRepository;
use crate::database::DatabaseError;
use crate::errors::ServiceError;
use crate::forecast::model::{ForecastFrame, ForecastPoint, Forecaster, ModelLoader};
use crate::market_data::MarketDataProvider;
use crate::models::{
    Bar, CleanBar, CompanyProfile, MoverDirection, MoverEntry, NewsArticle, Quote, Resolution,
    SymbolSearchResult,
};
use crate::timeseries::{exchange_date, EXCHANGE_TZ};

/// New York wall-clock time as a UTC instant
pub fn ny_utc(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    EXCHANGE_TZ
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .earliest()
        .expect("valid New York time")
        .with_timezone(&Utc)
}

/// Flat bar (open = high = low = close)
pub fn bar_at(timestamp: DateTime<Utc>, close: f64, volume: f64) -> Bar {
    Bar::new(timestamp, close, close, close, close, volume)
}

/// Every 5 minute bar of a session, 09:30 through 16:00
pub fn session_bars(date: NaiveDate, start_price: f64) -> Vec<Bar> {
    let open = ny_utc(date.year(), date.month(), date.day(), 9, 30);
    (0..79)
        .map(|i| bar_at(open + Duration::minutes(5 * i), start_price + i as f64 * 0.01, 100.0))
        .collect()
}

/// Scripted market data provider
pub struct MockProvider {
    bars: Mutex<HashMap<String, Vec<Bar>>>,
    failing_symbols: Mutex<HashSet<String>>,
    failing_chunk_starts: Mutex<HashSet<NaiveDate>>,
    bar_requests: Mutex<Vec<(String, Resolution, NaiveDate, NaiveDate)>>,
    profile_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            bars: Mutex::new(HashMap::new()),
            failing_symbols: Mutex::new(HashSet::new()),
            failing_chunk_starts: Mutex::new(HashSet::new()),
            bar_requests: Mutex::new(Vec::new()),
            profile_calls: AtomicUsize::new(0),
        }
    }

    /// Bars returned for `symbol` (at any resolution) within the requested dates
    pub fn with_bars(self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.bars.lock().insert(symbol.to_string(), bars);
        self
    }

    pub fn failing_for(self, symbol: &str) -> Self {
        self.failing_symbols.lock().insert(symbol.to_string());
        self
    }

    /// Fail any bar request whose range starts on `start`
    pub fn failing_chunk(self, start: NaiveDate) -> Self {
        self.failing_chunk_starts.lock().insert(start);
        self
    }

    pub fn profile_calls(&self) -> usize {
        self.profile_calls.load(Ordering::SeqCst)
    }

    pub fn bar_requests(&self) -> Vec<(String, Resolution, NaiveDate, NaiveDate)> {
        self.bar_requests.lock().clone()
    }
}

#[async_trait]
impl MarketDataProvider for MockProvider {
    fn id(&self) -> &'static str {
        "MOCK"
    }

    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>, ServiceError> {
        if self.failing_symbols.lock().contains(symbol) {
            return Err(ServiceError::provider("MOCK", "quote unavailable"));
        }
        if symbol == "NONE" {
            return Ok(None);
        }
        Ok(Some(Quote {
            symbol: symbol.to_string(),
            name: Some(format!("{} Inc.", symbol)),
            price: 100.0,
            change: Some(1.0),
            change_percent: Some(1.0),
            day_high: Some(101.0),
            day_low: Some(99.0),
            volume: Some(1_000_000.0),
            timestamp: None,
        }))
    }

    async fn get_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, ServiceError> {
        self.bar_requests
            .lock()
            .push((symbol.to_string(), resolution, from, to));

        if self.failing_symbols.lock().contains(symbol) {
            return Err(ServiceError::provider("MOCK", "bars unavailable"));
        }
        if self.failing_chunk_starts.lock().contains(&from) {
            return Err(ServiceError::provider("MOCK", "chunk unavailable"));
        }

        let bars = self.bars.lock();
        Ok(bars
            .get(symbol)
            .map(|all| {
                all.iter()
                    .filter(|b| {
                        let date = exchange_date(b.timestamp);
                        date >= from && date <= to
                    })
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn search(&self, query: &str) -> Result<Vec<SymbolSearchResult>, ServiceError> {
        Ok(vec![SymbolSearchResult {
            symbol: query.to_uppercase(),
            name: format!("{} Inc.", query.to_uppercase()),
            exchange: "NASDAQ".to_string(),
        }])
    }

    async fn get_movers(&self, _direction: MoverDirection) -> Result<Vec<MoverEntry>, ServiceError> {
        Ok(vec![MoverEntry {
            symbol: "NVDA".to_string(),
            name: "NVIDIA".to_string(),
            price: 120.0,
            change: 6.0,
            change_percent: 5.0,
        }])
    }

    async fn get_company_profile(&self, symbol: &str) -> Result<Option<CompanyProfile>, ServiceError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        let symbol = symbol.to_uppercase();
        Ok(Some(CompanyProfile {
            symbol: symbol.clone(),
            company_name: format!("{} Inc.", symbol),
            exchange: "NASDAQ".to_string(),
            industry: "Technology".to_string(),
            sector: "Technology".to_string(),
            ceo: String::new(),
            market_cap: 0.0,
            website: String::new(),
            description: String::new(),
        }))
    }

    async fn get_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsArticle>, ServiceError> {
        Ok((0..limit.min(2))
            .map(|i| NewsArticle {
                symbol: symbol.to_string(),
                title: format!("Headline {}", i),
                url: format!("https://news.test/{}", i),
                site: "test".to_string(),
                text: String::new(),
                image: None,
                published_at: None,
            })
            .collect())
    }
}

/// Forecaster that walks the last target upward by 0.1 per step
pub struct MockForecaster {
    failing_symbols: HashSet<String>,
    horizon: usize,
    calls: AtomicUsize,
}

impl MockForecaster {
    pub fn new(horizon: usize) -> Self {
        Self {
            failing_symbols: HashSet::new(),
            horizon,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_for(mut self, symbol: &str) -> Self {
        self.failing_symbols.insert(symbol.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Forecaster for MockForecaster {
    fn model_version(&self) -> &str {
        "mock-v1"
    }

    async fn predict(&self, item_id: &str, history: &[CleanBar]) -> Result<ForecastFrame, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_symbols.contains(item_id) {
            return Err(ServiceError::provider("forecaster", format!("no forecast for {}", item_id)));
        }

        let last = history
            .last()
            .ok_or_else(|| ServiceError::provider("forecaster", "empty history"))?;
        let points = (1..=self.horizon)
            .map(|step| {
                let mean = last.target + step as f64 * 0.1;
                ForecastPoint {
                    item_id: item_id.to_string(),
                    timestamp: last.timestamp + Duration::minutes(5 * step as i64),
                    mean: Some(mean),
                    quantiles: [("0.1".to_string(), mean - 1.0), ("0.9".to_string(), mean + 1.0)]
                        .into_iter()
                        .collect(),
                }
            })
            .collect();
        Ok(ForecastFrame { points })
    }
}

/// Model loader returning a shared [`MockForecaster`], or failing
pub struct MockModelLoader {
    forecaster: Option<Arc<MockForecaster>>,
    loads: AtomicUsize,
}

impl MockModelLoader {
    pub fn new(forecaster: Arc<MockForecaster>) -> Self {
        Self {
            forecaster: Some(forecaster),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            forecaster: None,
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelLoader for MockModelLoader {
    async fn load(&self, path: &Path) -> Result<Arc<dyn Forecaster>, ServiceError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        match &self.forecaster {
            Some(forecaster) => Ok(forecaster.clone()),
            None => Err(ServiceError::ModelLoadFailure(format!(
                "no model at {}",
                path.display()
            ))),
        }
    }
}

/// Prediction store kept in memory
#[derive(Default)]
pub struct InMemoryPredictionRepository {
    rows: Mutex<Vec<Prediction>>,
}

impl InMemoryPredictionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Prediction> {
        self.rows.lock().clone()
    }
}

fn newest_first(rows: &mut [Prediction]) {
    rows.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then(b.id.cmp(&a.id))
    });
}

#[async_trait]
impl PredictionRepository for InMemoryPredictionRepository {
    fn insert_batch(&self, predictions: Vec<NewPrediction>) -> Result<usize, DatabaseError> {
        let mut rows = self.rows.lock();
        let count = predictions.len();
        for new in predictions {
            let id = rows.iter().map(|p| p.id).max().unwrap_or(0) + 1;
            rows.push(Prediction {
                id,
                ticker: new.ticker,
                predicted_price: new.predicted_price,
                confidence_low: new.confidence_low,
                confidence_high: new.confidence_high,
                prediction_time: new.prediction_time,
                horizon_minutes: new.horizon_minutes,
                model_version: new.model_version,
                created_at: Utc::now(),
            });
        }
        Ok(count)
    }

    fn latest(&self, ticker: Option<&str>, limit: i64) -> Result<Vec<Prediction>, DatabaseError> {
        let mut rows: Vec<Prediction> = self
            .rows
            .lock()
            .iter()
            .filter(|p| ticker.map_or(true, |t| p.ticker == t))
            .cloned()
            .collect();
        newest_first(&mut rows);
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    fn history(&self, ticker: &str, since: DateTime<Utc>) -> Result<Vec<Prediction>, DatabaseError> {
        let mut rows: Vec<Prediction> = self
            .rows
            .lock()
            .iter()
            .filter(|p| p.ticker == ticker && p.created_at >= since)
            .cloned()
            .collect();
        newest_first(&mut rows);
        Ok(rows)
    }

    fn prune(&self, ticker: &str, keep: i64) -> Result<usize, DatabaseError> {
        let mut rows = self.rows.lock();
        let mut mine: Vec<Prediction> = rows.iter().filter(|p| p.ticker == ticker).cloned().collect();
        newest_first(&mut mine);
        let keep_ids: HashSet<i64> = mine.iter().take(keep.max(0) as usize).map(|p| p.id).collect();

        let before = rows.len();
        rows.retain(|p| p.ticker != ticker || keep_ids.contains(&p.id));
        Ok(before - rows.len())
    }

    fn tickers(&self) -> Result<Vec<String>, DatabaseError> {
        let mut tickers: Vec<String> = self.rows.lock().iter().map(|p| p.ticker.clone()).collect();
        tickers.sort();
        tickers.dedup();
        Ok(tickers)
    }
}
