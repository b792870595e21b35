use std::sync::Arc;
use stock_insights_api::config::{AppConfig, DatabaseConfig, PredictionConfig};
use stock_insights_api::database::repositories::{PredictionRepository, PredictionRepositoryImpl};
use stock_insights_api::forecast::ManifestModelLoader;
use stock_insights_api::market_data::{FmpProvider, MarketDataProvider, ProfileCache};
use stock_insights_api::utils::tickers::load_ticker_file;
use stock_insights_api::{
    create_router, BarSynchronizer, EodUpdater, MarketState, PredictionService, SeriesStore,
    WorkerPool,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load environment variables from .env file (if present)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_insights_api=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env();

    if config.market_data.api_key.is_empty() {
        tracing::warn!("⚠️  FMP_API_KEY is not set, provider calls will be rejected upstream");
    }

    let provider: Arc<dyn MarketDataProvider> = Arc::new(FmpProvider::new(
        config.market_data.api_key.clone(),
        config.market_data.base_url.clone(),
    ));
    let pool = WorkerPool::new(config.worker_pool_size);
    let store = SeriesStore::new(config.sync.data_dir.clone());

    // Incremental synchronizer + end-of-day updater
    let synchronizer = Arc::new(
        BarSynchronizer::new(provider.clone(), store.clone())
            .with_lookback_days(config.sync.lookback_days)
            .with_chunk_delay(config.sync.chunk_delay()),
    );
    let tickers = load_ticker_file(&config.sync.tickers_file);
    tracing::info!(
        "📈 Tracking {} tickers from {}",
        tickers.len(),
        config.sync.tickers_file.display()
    );
    let eod = Arc::new(EodUpdater::new(synchronizer, tickers));

    // Prediction store (optional - only if DATABASE_URL is set)
    let predictions = match &config.database {
        Some(db) => {
            initialize_predictions(db, config.prediction.clone(), provider.clone(), pool.clone()).await
        }
        None => {
            tracing::info!("🗄️  Prediction store: Not configured (DATABASE_URL not set)");
            None
        }
    };

    if config.sync.auto_start {
        eod.start(None).await;
    }

    if let (Some(service), true) = (&predictions, config.prediction.auto_start) {
        if let Err(e) = service.start(None).await {
            tracing::warn!("⚠️  Prediction scheduler auto-start failed: {}", e);
            tracing::warn!("   Use POST /api/v1/predictions/start once the model is available");
        }
    }

    let market = MarketState {
        provider: provider.clone(),
        profiles: Arc::new(ProfileCache::new(provider)),
        pool,
        store,
    };

    let app = create_router(market, eod, predictions);

    let addr = config.bind_addr.clone();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("❌ Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("🚀 Stock Insights API server running on http://{}", addr);
    tracing::info!("📊 Health check: http://{}/api/v1/health", addr);
    tracing::info!("📚 Swagger UI: http://{}/swagger-ui", addr);
    tracing::info!("🌙 EOD control: http://{}/api/v1/eod/*", addr);

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("❌ Server error: {}", e);
    }
}

/// Connect to PostgreSQL, run migrations and build the prediction service
///
/// Also registers the hourly retention job. Returns `None` (server keeps
/// running without prediction endpoints) when the database is unreachable.
async fn initialize_predictions(
    db: &DatabaseConfig,
    prediction_config: PredictionConfig,
    provider: Arc<dyn MarketDataProvider>,
    pool: WorkerPool,
) -> Option<Arc<PredictionService>> {
    use stock_insights_api::database::establish_connection_pool;

    tracing::info!("🗄️  Initializing PostgreSQL connection...");

    let db_pool = match establish_connection_pool(&db.url, db.pool_size) {
        Ok(pool) => {
            tracing::info!("✅ Database connection established");
            pool
        }
        Err(e) => {
            tracing::error!("❌ Failed to establish database connection: {}", e);
            tracing::warn!("⚠️  Server will start without prediction functionality");
            return None;
        }
    };

    let migrate_pool = db_pool.clone();
    match tokio::task::spawn_blocking(move || migrate_pool.run_migrations()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::error!("❌ Database migrations failed: {}", e);
            return None;
        }
        Err(e) => {
            tracing::error!("❌ Migration task panicked: {}", e);
            return None;
        }
    }

    let repository = Arc::new(PredictionRepositoryImpl::new(move || db_pool.get_conn()))
        as Arc<dyn PredictionRepository>;

    initialize_cron_scheduler(repository.clone(), prediction_config.max_predictions_per_ticker).await;

    tracing::info!(
        "🔮 Prediction service configured (model: {})",
        prediction_config.model_path.display()
    );

    Some(Arc::new(PredictionService::new(
        provider,
        repository,
        Arc::new(ManifestModelLoader),
        prediction_config,
        pool,
    )))
}

/// Initialize cron scheduler for periodic jobs
async fn initialize_cron_scheduler(repository: Arc<dyn PredictionRepository>, keep: i64) {
    use stock_insights_api::jobs::PredictionRetentionJob;
    use tokio_cron_scheduler::JobScheduler;

    tracing::info!("⏰ Initializing cron scheduler...");

    let scheduler = match JobScheduler::new().await {
        Ok(scheduler) => scheduler,
        Err(e) => {
            tracing::error!("❌ Failed to create cron scheduler: {}", e);
            return;
        }
    };

    if let Err(e) = PredictionRetentionJob::new(repository, keep)
        .register(&scheduler)
        .await
    {
        tracing::error!("❌ Failed to register prediction retention job: {}", e);
        return;
    }

    if let Err(e) = scheduler.start().await {
        tracing::error!("❌ Failed to start cron scheduler: {}", e);
        return;
    }

    tracing::info!("✅ Cron scheduler started successfully");

    // Keep scheduler alive (it will run in the background)
    std::mem::forget(scheduler);
}
