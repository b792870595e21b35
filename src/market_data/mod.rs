/// Market data collaborator
///
/// - `MarketDataProvider` trait: quotes, bars, search, movers, profiles, news
/// - `FmpProvider`: Financial Modeling Prep REST implementation
/// - `ProfileCache`: 12 hour company profile cache

pub mod fmp;
pub mod profile_cache;
pub mod provider;

pub use fmp::FmpProvider;
pub use profile_cache::ProfileCache;
pub use provider::MarketDataProvider;
