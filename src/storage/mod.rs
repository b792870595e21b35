/// File storage for raw and regularized bar series
pub mod series_store;

pub use series_store::{SeriesKind, SeriesStore};
