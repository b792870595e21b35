use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

use super::synchronizer::{BarSynchronizer, SyncReport};
use crate::lifecycle::{join_with_timeout, panic_message, WorkerSignal, WorkerState, STOP_TIMEOUT};
use crate::timeseries::{exchange_now, exchange_today, next_market_close_run};
use crate::utils::tickers::normalize_symbols;

/// Never sleep less than this before a run
const MIN_WAIT: Duration = Duration::from_secs(5);
/// Pause after a completed run so one close is not processed twice
const COOLDOWN: Duration = Duration::from_secs(30 * 60);
const BACKOFF: Duration = Duration::from_secs(60);
/// Tickers listed in the status response
const STATUS_TICKER_LIMIT: usize = 10;

/// Snapshot of the end-of-day updater
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EodStatus {
    pub state: WorkerState,
    pub is_running: bool,
    pub ticker_count: usize,
    /// First ten tracked tickers
    pub tickers: Vec<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Runs a synchronization pass over the tracked tickers after every close
pub struct EodUpdater {
    synchronizer: Arc<BarSynchronizer>,
    tickers: Arc<RwLock<Vec<String>>>,
    state: Arc<RwLock<WorkerState>>,
    signal: Mutex<Arc<WorkerSignal>>,
    next_run_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl EodUpdater {
    pub fn new(synchronizer: Arc<BarSynchronizer>, tickers: Vec<String>) -> Self {
        Self {
            synchronizer,
            tickers: Arc::new(RwLock::new(normalize_symbols(&tickers))),
            state: Arc::new(RwLock::new(WorkerState::Stopped)),
            signal: Mutex::new(Arc::new(WorkerSignal::new())),
            next_run_at: Arc::new(RwLock::new(None)),
            handle: tokio::sync::Mutex::new(None),
        }
    }

    pub fn synchronizer(&self) -> &Arc<BarSynchronizer> {
        &self.synchronizer
    }

    pub fn tickers(&self) -> Vec<String> {
        self.tickers.read().clone()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.read()
    }

    /// Start the updater
    ///
    /// A ticker list, when given, replaces the tracked list. Returns false
    /// without touching anything if the updater was already running.
    pub async fn start(&self, tickers: Option<Vec<String>>) -> bool {
        let mut handle_slot = self.handle.lock().await;

        if self.state().is_active() {
            tracing::info!("EOD updater already running");
            return false;
        }

        if let Some(tickers) = tickers {
            let tickers = normalize_symbols(&tickers);
            if !tickers.is_empty() {
                *self.tickers.write() = tickers;
            }
        }

        *self.state.write() = WorkerState::Starting;

        let signal = Arc::new(WorkerSignal::new());
        signal.set_running();
        *self.signal.lock() = signal.clone();

        let worker = EodWorker {
            synchronizer: self.synchronizer.clone(),
            tickers: self.tickers.clone(),
            next_run_at: self.next_run_at.clone(),
            signal,
        };
        *handle_slot = Some(tokio::spawn(worker.run()));
        *self.state.write() = WorkerState::Running;

        tracing::info!("🚀 EOD updater started ({} tickers)", self.tickers.read().len());
        true
    }

    /// Stop the updater, waiting up to ten seconds for the worker
    pub async fn stop(&self) {
        let mut handle_slot = self.handle.lock().await;

        if self.state() == WorkerState::Stopped {
            return;
        }

        *self.state.write() = WorkerState::Stopping;
        self.signal.lock().request_stop();

        if let Some(handle) = handle_slot.take() {
            join_with_timeout("EOD updater", handle, STOP_TIMEOUT).await;
        }

        *self.next_run_at.write() = None;
        *self.state.write() = WorkerState::Stopped;
        tracing::info!("🛑 EOD updater stopped");
    }

    /// Synchronize the full tracked list now
    pub async fn update_all(&self) -> SyncReport {
        let tickers = self.tickers();
        self.synchronizer.run_once(&tickers).await
    }

    /// Synchronize the given tickers now
    pub async fn update(&self, tickers: &[String]) -> SyncReport {
        self.synchronizer.run_once(tickers).await
    }

    pub fn status(&self) -> EodStatus {
        let state = self.state();
        let tickers = self.tickers.read();
        EodStatus {
            state,
            is_running: state == WorkerState::Running,
            ticker_count: tickers.len(),
            tickers: tickers.iter().take(STATUS_TICKER_LIMIT).cloned().collect(),
            last_run_at: self.synchronizer.last_run_at(),
            next_run_at: *self.next_run_at.read(),
        }
    }
}

struct EodWorker {
    synchronizer: Arc<BarSynchronizer>,
    tickers: Arc<RwLock<Vec<String>>>,
    next_run_at: Arc<RwLock<Option<DateTime<Utc>>>>,
    signal: Arc<WorkerSignal>,
}

impl EodWorker {
    async fn run(self) {
        while self.signal.is_running() {
            let now = exchange_now();
            let next = next_market_close_run(now);
            *self.next_run_at.write() = Some(next.with_timezone(&Utc));

            let wait = (next - now).to_std().unwrap_or(Duration::ZERO).max(MIN_WAIT);
            tracing::info!("⏰ Next EOD update at {} (in {:?})", next, wait);

            if !self.signal.sleep(wait).await {
                break;
            }

            let tickers = self.tickers.read().clone();
            let signal = self.signal.clone();
            let pass = self
                .synchronizer
                .run_once_while(&tickers, exchange_today(), move || signal.is_running());
            let cycle = AssertUnwindSafe(pass).catch_unwind();

            let pause = match cycle.await {
                Ok(report) => {
                    tracing::info!(
                        "📊 EOD update done: {} of {} series updated",
                        report.updated(),
                        report.entries.len()
                    );
                    COOLDOWN
                }
                Err(panic) => {
                    tracing::error!("❌ EOD update panicked: {}", panic_message(panic.as_ref()));
                    BACKOFF
                }
            };

            if !self.signal.sleep(pause).await {
                break;
            }
        }
        tracing::debug!("EOD worker loop exited");
    }
}
