use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::market_data::fmp::DEFAULT_BASE_URL;
use crate::utils::tickers::{default_tickers, parse_ticker_list};

/// Application configuration, loaded from the environment (and `.env`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    pub market_data: MarketDataConfig,

    pub sync: SyncConfig,

    pub prediction: PredictionConfig,

    /// PostgreSQL settings; `None` disables the prediction store
    pub database: Option<DatabaseConfig>,

    /// Capacity of the pool used for outbound calls made from request handlers
    pub worker_pool_size: usize,
}

/// Market data vendor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfig {
    #[serde(skip_serializing)] // Never expose the API key
    pub api_key: String,

    #[serde(default = "default_fmp_base_url")]
    pub base_url: String,
}

/// Incremental synchronizer and end-of-day updater settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Root folder of the raw/clean series tables
    pub data_dir: PathBuf,

    /// One ticker per line
    pub tickers_file: PathBuf,

    /// Lookback used when a series has no data yet
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,

    /// Pause between month-chunk requests
    #[serde(default = "default_chunk_delay_ms")]
    pub chunk_delay_ms: u64,

    /// Start the end-of-day updater at boot
    #[serde(default)]
    pub auto_start: bool,
}

/// Prediction scheduler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    /// Directory of the forecasting model (holds `predictor.json`)
    pub model_path: PathBuf,

    /// Tickers predicted when `start` is called without a list
    pub tickers: Vec<String>,

    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,

    /// Days of 5-minute history handed to the model
    #[serde(default = "default_history_days")]
    pub history_days: i64,

    /// Minimum regularized observations needed for a forecast
    #[serde(default = "default_min_history")]
    pub min_history: usize,

    /// Predict 5m/15m/30m/60m/1d instead of only the next 5 minute bar
    #[serde(default)]
    pub multi_horizon: bool,

    /// Rows kept per ticker in the prediction table
    #[serde(default = "default_max_predictions")]
    pub max_predictions_per_ticker: i64,

    /// Start the scheduler at boot
    #[serde(default)]
    pub auto_start: bool,
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(skip_serializing)]
    pub url: String,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            tickers_file: PathBuf::from("./stock_tickers.txt"),
            lookback_days: default_lookback_days(),
            chunk_delay_ms: default_chunk_delay_ms(),
            auto_start: false,
        }
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("./models/chronos"),
            tickers: default_tickers(),
            interval_secs: default_interval_secs(),
            backoff_secs: default_backoff_secs(),
            history_days: default_history_days(),
            min_history: default_min_history(),
            multi_horizon: false,
            max_predictions_per_ticker: default_max_predictions(),
            auto_start: false,
        }
    }
}

impl SyncConfig {
    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl PredictionConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

// Default value functions for serde
fn default_fmp_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_lookback_days() -> i64 {
    30
}

fn default_chunk_delay_ms() -> u64 {
    200
}

fn default_interval_secs() -> u64 {
    300
}

fn default_backoff_secs() -> u64 {
    60
}

fn default_history_days() -> i64 {
    30
}

fn default_min_history() -> usize {
    365
}

fn default_max_predictions() -> i64 {
    1000
}

fn default_pool_size() -> u32 {
    10
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    /// Build the configuration from environment variables
    ///
    /// Every setting has a default; `DATABASE_URL` is the only one whose
    /// absence turns a feature (the prediction store) off.
    pub fn from_env() -> Self {
        let sync_defaults = SyncConfig::default();
        let prediction_defaults = PredictionConfig::default();

        let tickers = std::env::var("PREDICTION_TICKERS")
            .ok()
            .map(|raw| parse_ticker_list(&raw))
            .filter(|t| !t.is_empty())
            .unwrap_or(prediction_defaults.tickers);

        let database = std::env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
            url,
            pool_size: env_or("DB_POOL_MAX_SIZE", default_pool_size()),
        });

        Self {
            bind_addr: env_string("BIND_ADDR", "127.0.0.1:3000"),
            market_data: MarketDataConfig {
                api_key: env_string("FMP_API_KEY", ""),
                base_url: env_string("FMP_BASE_URL", DEFAULT_BASE_URL),
            },
            sync: SyncConfig {
                data_dir: std::env::var("DATA_DIR")
                    .map(PathBuf::from)
                    .unwrap_or(sync_defaults.data_dir),
                tickers_file: std::env::var("STOCK_TICKERS_FILE")
                    .map(PathBuf::from)
                    .unwrap_or(sync_defaults.tickers_file),
                lookback_days: env_or("SYNC_LOOKBACK_DAYS", sync_defaults.lookback_days),
                chunk_delay_ms: env_or("SYNC_CHUNK_DELAY_MS", sync_defaults.chunk_delay_ms),
                auto_start: env_or("EOD_AUTO_START", false),
            },
            prediction: PredictionConfig {
                model_path: std::env::var("MODEL_PATH")
                    .map(PathBuf::from)
                    .unwrap_or(prediction_defaults.model_path),
                tickers,
                interval_secs: env_or("PREDICTION_INTERVAL_SECS", prediction_defaults.interval_secs),
                backoff_secs: env_or("PREDICTION_BACKOFF_SECS", prediction_defaults.backoff_secs),
                history_days: env_or("PREDICTION_HISTORY_DAYS", prediction_defaults.history_days),
                min_history: env_or("PREDICTION_MIN_HISTORY", prediction_defaults.min_history),
                multi_horizon: env_or("PREDICTION_MULTI_HORIZON", false),
                max_predictions_per_ticker: env_or(
                    "MAX_PREDICTIONS_PER_TICKER",
                    prediction_defaults.max_predictions_per_ticker,
                ),
                auto_start: env_or("PREDICTION_AUTO_START", false),
            },
            database,
            worker_pool_size: env_or("WORKER_POOL_SIZE", 4usize).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prediction_defaults() {
        let config = PredictionConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(300));
        assert_eq!(config.backoff(), Duration::from_secs(60));
        assert_eq!(config.min_history, 365);
        assert_eq!(config.max_predictions_per_ticker, 1000);
        assert_eq!(config.tickers, vec!["AAPL".to_string()]);
    }

    #[test]
    fn test_sync_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.lookback_days, 30);
        assert_eq!(config.chunk_delay(), Duration::from_millis(200));
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let config: PredictionConfig =
            serde_json::from_str(r#"{"model_path": "/models/x", "tickers": ["MSFT"]}"#).unwrap();
        assert_eq!(config.interval_secs, 300);
        assert_eq!(config.history_days, 30);
        assert!(!config.multi_horizon);
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = MarketDataConfig {
            api_key: "secret".to_string(),
            base_url: default_fmp_base_url(),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
