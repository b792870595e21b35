use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::ServiceError;
use crate::models::{
    Bar, CompanyProfile, MoverDirection, MoverEntry, NewsArticle, Quote, Resolution,
    SymbolSearchResult,
};

/// Market data provider trait - defines the interface to the external data vendor
///
/// All calls are rate-limited on the vendor side; callers must tolerate empty
/// results and `ProviderUnavailable` errors.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Identifier used in logs and error messages (e.g. "FMP")
    fn id(&self) -> &'static str;

    /// Latest quote, `None` if the vendor knows nothing about the symbol
    async fn get_quote(&self, symbol: &str) -> Result<Option<Quote>, ServiceError>;

    /// Bars for `symbol` between `from` and `to` (inclusive exchange-local dates)
    ///
    /// Order of the returned bars is unspecified.
    async fn get_bars(
        &self,
        symbol: &str,
        resolution: Resolution,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Bar>, ServiceError>;

    /// Symbol lookup by free-text query
    async fn search(&self, query: &str) -> Result<Vec<SymbolSearchResult>, ServiceError>;

    /// Today's gainers, losers or most active symbols
    async fn get_movers(&self, direction: MoverDirection) -> Result<Vec<MoverEntry>, ServiceError>;

    /// Company snapshot, `None` if no profile exists
    async fn get_company_profile(&self, symbol: &str) -> Result<Option<CompanyProfile>, ServiceError>;

    /// Recent news for a symbol
    async fn get_news(&self, symbol: &str, limit: usize) -> Result<Vec<NewsArticle>, ServiceError>;
}
