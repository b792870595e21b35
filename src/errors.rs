//! Error types for the synchronization and prediction services
//!
//! Every failure the background workers can run into is classified into one of
//! four categories. Per-symbol and per-chunk failures are logged and swallowed at
//! the symbol/chunk boundary by the callers; only model-load failures are
//! surfaced to whoever asked the scheduler to start.

use thiserror::Error;

use crate::database::DatabaseError;

/// Errors produced by the market-data, forecasting and persistence layers
///
/// # Error Categories
///
/// - **Collaborator Errors**: `ProviderUnavailable` (network, timeout, non-2xx)
/// - **Startup Errors**: `ModelLoadFailure`
/// - **Data Errors**: `InsufficientHistory`
/// - **Storage Errors**: `PersistenceFailure`
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Market-data or forecasting endpoint could not be reached or answered with an error
    #[error("Provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// Forecasting artifact is missing or incompatible
    #[error("Model load failure: {0}")]
    ModelLoadFailure(String),

    /// Fewer observations than the model needs
    #[error("Insufficient history for {symbol}: {available} observations, {required} required")]
    InsufficientHistory {
        symbol: String,
        required: usize,
        available: usize,
    },

    /// Raw/clean series or prediction record could not be written
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl ServiceError {
    pub fn provider(provider: &str, message: impl Into<String>) -> Self {
        ServiceError::ProviderUnavailable {
            provider: provider.to_string(),
            message: message.into(),
        }
    }

    /// Returns true if retrying later might succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ServiceError::ProviderUnavailable { .. } | ServiceError::InsufficientHistory { .. }
        )
    }
}

impl From<DatabaseError> for ServiceError {
    fn from(err: DatabaseError) -> Self {
        ServiceError::PersistenceFailure(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::PersistenceFailure(err.to_string())
    }
}

impl From<csv::Error> for ServiceError {
    fn from(err: csv::Error) -> Self {
        ServiceError::PersistenceFailure(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ServiceError {
    fn from(err: tokio::task::JoinError) -> Self {
        ServiceError::PersistenceFailure(format!("Blocking task failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServiceError::InsufficientHistory {
            symbol: "AAPL".to_string(),
            required: 365,
            available: 12,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient history for AAPL: 12 observations, 365 required"
        );

        let err = ServiceError::provider("FMP", "HTTP 503");
        assert_eq!(err.to_string(), "Provider FMP unavailable: HTTP 503");
    }

    #[test]
    fn test_error_categories() {
        assert!(ServiceError::provider("FMP", "timeout").is_transient());
        assert!(!ServiceError::ModelLoadFailure("missing".to_string()).is_transient());
        assert!(!ServiceError::PersistenceFailure("disk full".to_string()).is_transient());
    }

    #[test]
    fn test_io_error_maps_to_persistence() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        assert!(matches!(
            ServiceError::from(io),
            ServiceError::PersistenceFailure(_)
        ));
    }
}
