/// Price forecasting
///
/// - `model`: forecaster/loader traits and the manifest-backed remote model
/// - `horizons`: which steps ahead get stored
/// - `service`: the periodic prediction scheduler and on-demand predictions
/// - `worker_pool`: bounded concurrency for request-driven work

pub mod horizons;
pub mod model;
pub mod service;
pub mod worker_pool;

pub use horizons::Horizon;
pub use model::{ForecastFrame, ForecastPoint, Forecaster, ManifestModelLoader, ModelLoader};
pub use service::{CycleReport, GeneratedPrediction, PredictionService, PredictionStatus};
pub use worker_pool::WorkerPool;
