use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
use thiserror::Error;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Type alias for PostgreSQL connection pool
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Type alias for pooled connection
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Connection pool for the prediction store
#[derive(Clone)]
pub struct DatabasePool {
    pool: Arc<PgPool>,
}

impl DatabasePool {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<PgPooledConnection, DatabaseError> {
        self.pool
            .get()
            .map_err(|e| DatabaseError::ConnectionPoolError(e.to_string()))
    }

    /// Apply pending embedded migrations
    pub fn run_migrations(&self) -> Result<(), DatabaseError> {
        tracing::info!("Running database migrations");
        let mut conn = self.get_conn()?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

        if applied.is_empty() {
            tracing::info!("No pending migrations to apply");
        } else {
            for version in &applied {
                tracing::info!("  ✅ Applied migration {}", version);
            }
        }
        Ok(())
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Connection pool error: {0}")]
    ConnectionPoolError(String),

    #[error("Database query error: {0}")]
    QueryError(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Diesel error: {0}")]
    DieselError(#[from] diesel::result::Error),
}

/// Establish the connection pool and verify that a connection can be made
///
/// # Arguments
/// * `database_url` - PostgreSQL connection URL
/// * `pool_size` - Maximum number of pooled connections
pub fn establish_connection_pool(
    database_url: &str,
    pool_size: u32,
) -> Result<DatabasePool, DatabaseError> {
    tracing::info!("Establishing database connection pool...");

    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder()
        .max_size(pool_size)
        .connection_timeout(std::time::Duration::from_secs(10))
        .build(manager)
        .map_err(|e| DatabaseError::ConnectionPoolError(e.to_string()))?;

    tracing::info!("Database pool created with max size: {}", pool_size);

    let _ = pool
        .get()
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))?;

    tracing::info!("Database connection successful");

    Ok(DatabasePool::new(pool))
}
