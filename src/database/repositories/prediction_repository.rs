use crate::database::connection::{DatabaseError, PgPooledConnection};
use crate::database::models::{NewPrediction, Prediction};
use crate::database::schema::stock_predictions;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use std::sync::Arc;

/// Prediction repository trait - append-only store with bounded retention
///
/// Methods are blocking; async callers run them on `spawn_blocking`.
#[async_trait::async_trait]
pub trait PredictionRepository: Send + Sync {
    /// Insert a batch of predictions in one transaction
    fn insert_batch(&self, predictions: Vec<NewPrediction>) -> Result<usize, DatabaseError>;

    /// Most recently generated predictions first, optionally for one ticker
    fn latest(&self, ticker: Option<&str>, limit: i64) -> Result<Vec<Prediction>, DatabaseError>;

    /// Predictions for `ticker` generated at or after `since`, newest first
    fn history(&self, ticker: &str, since: DateTime<Utc>) -> Result<Vec<Prediction>, DatabaseError>;

    /// Delete all but the `keep` most recently generated rows of a ticker; returns rows deleted
    fn prune(&self, ticker: &str, keep: i64) -> Result<usize, DatabaseError>;

    /// Distinct tickers that have stored predictions
    fn tickers(&self) -> Result<Vec<String>, DatabaseError>;
}

/// Diesel implementation of PredictionRepository
pub struct PredictionRepositoryImpl {
    get_conn: Arc<dyn Fn() -> Result<PgPooledConnection, DatabaseError> + Send + Sync>,
}

impl PredictionRepositoryImpl {
    /// Create new prediction repository with connection provider
    pub fn new<F>(get_conn: F) -> Self
    where
        F: Fn() -> Result<PgPooledConnection, DatabaseError> + Send + Sync + 'static,
    {
        Self {
            get_conn: Arc::new(get_conn),
        }
    }
}

#[async_trait::async_trait]
impl PredictionRepository for PredictionRepositoryImpl {
    fn insert_batch(&self, predictions: Vec<NewPrediction>) -> Result<usize, DatabaseError> {
        if predictions.is_empty() {
            return Ok(0);
        }
        let mut conn = (self.get_conn)()?;

        conn.transaction::<_, DatabaseError, _>(|conn| {
            diesel::insert_into(stock_predictions::table)
                .values(&predictions)
                .execute(conn)
                .map_err(DatabaseError::from)
        })
    }

    fn latest(&self, ticker: Option<&str>, limit: i64) -> Result<Vec<Prediction>, DatabaseError> {
        let mut conn = (self.get_conn)()?;

        let mut query = stock_predictions::table
            .select(Prediction::as_select())
            .into_boxed();
        if let Some(ticker) = ticker {
            query = query.filter(stock_predictions::ticker.eq(ticker));
        }

        query
            .order((
                stock_predictions::created_at.desc(),
                stock_predictions::id.desc(),
            ))
            .limit(limit)
            .load::<Prediction>(&mut conn)
            .map_err(DatabaseError::from)
    }

    fn history(&self, ticker: &str, since: DateTime<Utc>) -> Result<Vec<Prediction>, DatabaseError> {
        let mut conn = (self.get_conn)()?;

        stock_predictions::table
            .filter(stock_predictions::ticker.eq(ticker))
            .filter(stock_predictions::created_at.ge(since))
            .order((
                stock_predictions::created_at.desc(),
                stock_predictions::id.desc(),
            ))
            .select(Prediction::as_select())
            .load::<Prediction>(&mut conn)
            .map_err(DatabaseError::from)
    }

    fn prune(&self, ticker: &str, keep: i64) -> Result<usize, DatabaseError> {
        let mut conn = (self.get_conn)()?;

        conn.transaction::<_, DatabaseError, _>(|conn| {
            let keep_ids: Vec<i64> = stock_predictions::table
                .filter(stock_predictions::ticker.eq(ticker))
                .order((
                    stock_predictions::created_at.desc(),
                    stock_predictions::id.desc(),
                ))
                .limit(keep.max(0))
                .select(stock_predictions::id)
                .load(conn)?;

            let deleted = diesel::delete(
                stock_predictions::table
                    .filter(stock_predictions::ticker.eq(ticker))
                    .filter(stock_predictions::id.ne_all(keep_ids)),
            )
            .execute(conn)?;

            Ok(deleted)
        })
    }

    fn tickers(&self) -> Result<Vec<String>, DatabaseError> {
        let mut conn = (self.get_conn)()?;

        stock_predictions::table
            .select(stock_predictions::ticker)
            .distinct()
            .order(stock_predictions::ticker.asc())
            .load::<String>(&mut conn)
            .map_err(DatabaseError::from)
    }
}
