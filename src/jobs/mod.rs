/// Cron jobs and scheduled tasks module
///
/// - Prediction retention: trims every ticker to its newest N predictions

pub mod prediction_retention_job;

pub use prediction_retention_job::PredictionRetentionJob;
