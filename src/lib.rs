// Library Crate Root
// lib.rs

pub mod api;
pub mod config;
pub mod database;
pub mod errors;
pub mod forecast;
pub mod jobs;
pub mod lifecycle;
pub mod market_data;
pub mod models;
pub mod storage;
pub mod sync;
pub mod timeseries;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

// pub use = re-export at crate root
pub use api::{create_router, MarketState};
pub use config::AppConfig;
pub use errors::ServiceError;
pub use forecast::{PredictionService, WorkerPool};
pub use lifecycle::WorkerState;
pub use models::{Bar, CleanBar, Resolution};
pub use storage::SeriesStore;
pub use sync::{BarSynchronizer, EodUpdater, SyncReport};
