/// Time-series helpers shared by the synchronizer and the prediction scheduler
///
/// - Exchange calendar: sessions, date ranges, end-of-day trigger times
/// - Regularization: merge, deduplicate and session-scoped forward fill

pub mod calendar;
pub mod regularize;

pub use calendar::{
    exchange_date, exchange_now, exchange_today, next_market_close_run, session_slots, DateRange,
    EXCHANGE_TZ,
};
pub use regularize::{dedupe_sorted, merge_and_regularize, merge_raw, regularize};
