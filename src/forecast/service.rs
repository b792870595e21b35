use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use super::horizons::{self, Horizon};
use super::model::{Forecaster, ModelLoader};
use super::worker_pool::WorkerPool;
use crate::config::PredictionConfig;
use crate::database::models::{NewPrediction, Prediction};
use crate::database::repositories::PredictionRepository;
use crate::errors::ServiceError;
use crate::lifecycle::{join_with_timeout, panic_message, WorkerSignal, WorkerState, STOP_TIMEOUT};
use crate::market_data::MarketDataProvider;
use crate::models::{round_value, CleanBar, Resolution};
use crate::timeseries::{dedupe_sorted, exchange_today, regularize};
use crate::utils::tickers::normalize_symbols;

/// Upper bound for `latest` reads
pub const MAX_LATEST_LIMIT: i64 = 100;

/// Snapshot of the prediction scheduler
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PredictionStatus {
    pub state: WorkerState,
    pub running: bool,
    /// Whether a forecasting model is loaded
    pub loaded: bool,
    pub tickers: Vec<String>,
    pub horizons: Vec<Horizon>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SymbolFailure {
    pub symbol: String,
    pub error: String,
}

/// Result of one pass over the scheduled tickers
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub succeeded: Vec<String>,
    pub failed: Vec<SymbolFailure>,
    /// Rows written to the prediction store
    pub stored: usize,
}

/// Outcome of an on-demand prediction for one ticker
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GeneratedPrediction {
    pub ticker: String,
    pub predictions: Vec<NewPrediction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// State shared between the service handle and its worker task
struct PredictionCore {
    provider: Arc<dyn MarketDataProvider>,
    repository: Arc<dyn PredictionRepository>,
    config: PredictionConfig,
    horizons: Vec<Horizon>,
    forecaster: RwLock<Option<Arc<dyn Forecaster>>>,
    tickers: RwLock<Vec<String>>,
    today: Clock,
}

impl PredictionCore {
    fn forecaster(&self) -> Option<Arc<dyn Forecaster>> {
        self.forecaster.read().clone()
    }

    /// Recent 5-minute history in model format
    async fn load_history(&self, symbol: &str) -> Result<Vec<CleanBar>, ServiceError> {
        let today = (self.today)();
        let from = today - ChronoDuration::days(self.config.history_days);

        let bars = self
            .provider
            .get_bars(symbol, Resolution::FiveMinutes, from, today)
            .await?;
        let raw = dedupe_sorted(&bars);
        let history = regularize(symbol, &raw, Resolution::FiveMinutes);

        if history.len() < self.config.min_history {
            return Err(ServiceError::InsufficientHistory {
                symbol: symbol.to_string(),
                required: self.config.min_history,
                available: history.len(),
            });
        }
        Ok(history)
    }

    /// One prediction per configured horizon; nothing is stored
    async fn forecast_symbol(
        &self,
        forecaster: &dyn Forecaster,
        symbol: &str,
    ) -> Result<Vec<NewPrediction>, ServiceError> {
        let history = self.load_history(symbol).await?;
        let frame = forecaster.predict(symbol, &history).await?;

        let predictions: Vec<NewPrediction> = self
            .horizons
            .iter()
            .filter_map(|horizon| {
                let point = frame.at_step(horizon.steps)?;
                let price = point.point_forecast()?;
                Some(
                    NewPrediction::new(
                        symbol,
                        round_value(price),
                        point.timestamp,
                        horizon.minutes,
                        forecaster.model_version(),
                    )
                    .with_interval(
                        point.quantile(0.1).map(round_value),
                        point.quantile(0.9).map(round_value),
                    ),
                )
            })
            .collect();

        if predictions.is_empty() {
            return Err(ServiceError::provider(
                "forecaster",
                format!("No forecast rows returned for {}", symbol),
            ));
        }
        Ok(predictions)
    }

    /// Forecast, persist and prune one ticker
    async fn predict_and_store(&self, forecaster: &dyn Forecaster, symbol: &str) -> Result<usize, ServiceError> {
        let predictions = self.forecast_symbol(forecaster, symbol).await?;

        let repository = self.repository.clone();
        let ticker = symbol.to_string();
        let keep = self.config.max_predictions_per_ticker;
        let stored = tokio::task::spawn_blocking(move || {
            let stored = repository.insert_batch(predictions)?;
            let pruned = repository.prune(&ticker, keep)?;
            if pruned > 0 {
                tracing::debug!("🧹 Pruned {} old predictions for {}", pruned, ticker);
            }
            Ok::<_, ServiceError>(stored)
        })
        .await??;

        Ok(stored)
    }

    async fn run_cycle(&self, symbols: &[String], signal: Option<&WorkerSignal>) -> Result<CycleReport, ServiceError> {
        let forecaster = self
            .forecaster()
            .ok_or_else(|| ServiceError::ModelLoadFailure("No model loaded".to_string()))?;

        let started_at = Utc::now();
        let mut report = CycleReport {
            started_at,
            finished_at: started_at,
            succeeded: Vec::new(),
            failed: Vec::new(),
            stored: 0,
        };

        for symbol in symbols {
            if signal.map_or(false, |s| !s.is_running()) {
                tracing::info!("Prediction cycle interrupted by stop");
                break;
            }

            match self.predict_and_store(forecaster.as_ref(), symbol).await {
                Ok(stored) => {
                    tracing::info!("🔮 Stored {} predictions for {}", stored, symbol);
                    report.stored += stored;
                    report.succeeded.push(symbol.clone());
                }
                Err(e) => {
                    tracing::error!("❌ Prediction for {} failed: {}", symbol, e);
                    report.failed.push(SymbolFailure {
                        symbol: symbol.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        report.finished_at = Utc::now();
        Ok(report)
    }
}

/// Periodic prediction scheduler with an on-demand request surface
pub struct PredictionService {
    core: Arc<PredictionCore>,
    loader: Arc<dyn ModelLoader>,
    pool: WorkerPool,
    state: RwLock<WorkerState>,
    signal: Mutex<Arc<WorkerSignal>>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl PredictionService {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        repository: Arc<dyn PredictionRepository>,
        loader: Arc<dyn ModelLoader>,
        config: PredictionConfig,
        pool: WorkerPool,
    ) -> Self {
        let tickers = normalize_symbols(&config.tickers);
        let core = PredictionCore {
            provider,
            repository,
            horizons: horizons::configured(config.multi_horizon),
            config,
            forecaster: RwLock::new(None),
            tickers: RwLock::new(tickers),
            today: Arc::new(exchange_today),
        };

        Self {
            core: Arc::new(core),
            loader,
            pool,
            state: RwLock::new(WorkerState::Stopped),
            signal: Mutex::new(Arc::new(WorkerSignal::new())),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    /// Override how "today" is determined when picking the history window
    #[cfg(test)]
    fn with_clock(mut self, today: NaiveDate) -> Self {
        if let Some(core) = Arc::get_mut(&mut self.core) {
            core.today = Arc::new(move || today);
        }
        self
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    pub fn status(&self) -> PredictionStatus {
        let state = self.state();
        PredictionStatus {
            state,
            running: state == WorkerState::Running,
            loaded: self.core.forecaster.read().is_some(),
            tickers: self.core.tickers.read().clone(),
            horizons: self.core.horizons.clone(),
        }
    }

    async fn ensure_model(&self) -> Result<Arc<dyn Forecaster>, ServiceError> {
        if let Some(forecaster) = self.core.forecaster() {
            return Ok(forecaster);
        }

        let forecaster = self.loader.load(&self.core.config.model_path).await?;
        *self.core.forecaster.write() = Some(forecaster.clone());
        Ok(forecaster)
    }

    /// Start the scheduler
    ///
    /// Loads the model first if needed; a load failure leaves the scheduler
    /// stopped and is returned. Returns `Ok(false)` when already running.
    pub async fn start(&self, symbols: Option<Vec<String>>) -> Result<bool, ServiceError> {
        let mut handle_slot = self.handle.lock().await;

        if self.state().is_active() {
            tracing::info!("Prediction scheduler already running");
            return Ok(false);
        }
        *self.state.write() = WorkerState::Starting;

        if let Some(symbols) = symbols {
            let symbols = normalize_symbols(&symbols);
            if !symbols.is_empty() {
                *self.core.tickers.write() = symbols;
            }
        }

        if let Err(e) = self.ensure_model().await {
            tracing::error!("❌ Prediction scheduler not started: {}", e);
            *self.state.write() = WorkerState::Stopped;
            return Err(e);
        }

        let signal = Arc::new(WorkerSignal::new());
        signal.set_running();
        *self.signal.lock() = signal.clone();

        *handle_slot = Some(tokio::spawn(prediction_loop(self.core.clone(), signal)));
        *self.state.write() = WorkerState::Running;

        tracing::info!(
            "🚀 Prediction scheduler started for {:?}",
            self.core.tickers.read().as_slice()
        );
        Ok(true)
    }

    /// Stop the scheduler, waiting up to ten seconds for the worker
    pub async fn stop(&self) {
        let mut handle_slot = self.handle.lock().await;

        if self.state() == WorkerState::Stopped {
            return;
        }

        *self.state.write() = WorkerState::Stopping;
        self.signal.lock().request_stop();

        if let Some(handle) = handle_slot.take() {
            join_with_timeout("Prediction", handle, STOP_TIMEOUT).await;
        }

        *self.state.write() = WorkerState::Stopped;
        tracing::info!("🛑 Prediction scheduler stopped");
    }

    /// Predict, persist and prune each symbol in turn
    pub async fn run_cycle(&self, symbols: &[String]) -> Result<CycleReport, ServiceError> {
        self.ensure_model().await?;
        let symbols = normalize_symbols(symbols);
        self.core.run_cycle(&symbols, None).await
    }

    /// Predict `symbols` concurrently through the worker pool without storing
    pub async fn generate(&self, symbols: &[String]) -> Result<Vec<GeneratedPrediction>, ServiceError> {
        let forecaster = self.ensure_model().await?;
        let symbols = normalize_symbols(symbols);

        let tasks = symbols.into_iter().map(|ticker| {
            let core = self.core.clone();
            let forecaster = forecaster.clone();
            let pool = self.pool.clone();
            async move {
                let result = pool
                    .run(core.forecast_symbol(forecaster.as_ref(), &ticker))
                    .await;
                match result {
                    Ok(predictions) => GeneratedPrediction {
                        ticker,
                        predictions,
                        error: None,
                    },
                    Err(e) => {
                        tracing::warn!("⚠️  On-demand prediction for {} failed: {}", ticker, e);
                        GeneratedPrediction {
                            ticker,
                            predictions: Vec::new(),
                            error: Some(e.to_string()),
                        }
                    }
                }
            }
        });

        Ok(futures::future::join_all(tasks).await)
    }

    /// Newest stored predictions, `limit` clamped to 1..=100
    pub async fn latest(&self, ticker: Option<String>, limit: i64) -> Result<Vec<Prediction>, ServiceError> {
        let repository = self.core.repository.clone();
        let limit = limit.clamp(1, MAX_LATEST_LIMIT);
        let ticker = ticker.map(|t| crate::utils::tickers::normalize_symbol(&t));

        let rows = tokio::task::spawn_blocking(move || repository.latest(ticker.as_deref(), limit)).await??;
        Ok(rows)
    }

    /// Stored predictions of `ticker` from the last `hours_back` hours
    pub async fn history(&self, ticker: &str, hours_back: i64) -> Result<Vec<Prediction>, ServiceError> {
        let repository = self.core.repository.clone();
        let ticker = crate::utils::tickers::normalize_symbol(ticker);
        let since = Utc::now() - ChronoDuration::hours(hours_back.max(0));

        let rows = tokio::task::spawn_blocking(move || repository.history(&ticker, since)).await??;
        Ok(rows)
    }
}

async fn prediction_loop(core: Arc<PredictionCore>, signal: Arc<WorkerSignal>) {
    let interval = core.config.interval();
    let backoff = core.config.backoff();

    while signal.is_running() {
        let tickers = core.tickers.read().clone();
        let cycle = AssertUnwindSafe(core.run_cycle(&tickers, Some(signal.as_ref()))).catch_unwind();

        let pause = match cycle.await {
            Ok(Ok(report)) => {
                tracing::info!(
                    "📈 Prediction cycle done: {} ok, {} failed, {} stored",
                    report.succeeded.len(),
                    report.failed.len(),
                    report.stored
                );
                interval
            }
            Ok(Err(e)) => {
                tracing::error!("❌ Prediction cycle failed: {}", e);
                backoff
            }
            Err(panic) => {
                tracing::error!("❌ Prediction cycle panicked: {}", panic_message(panic.as_ref()));
                backoff
            }
        };

        if !signal.sleep(pause).await {
            break;
        }
    }
    tracing::debug!("Prediction worker loop exited");
}
