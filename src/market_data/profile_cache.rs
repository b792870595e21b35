use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::provider::MarketDataProvider;
use crate::errors::ServiceError;
use crate::models::CompanyProfile;

/// Company profiles change rarely; keep them for 12 hours
pub const PROFILE_TTL: Duration = Duration::from_secs(60 * 60 * 12);

struct CachedProfile {
    profile: CompanyProfile,
    fetched_at: Instant,
}

/// In-process TTL cache in front of the provider's company profile endpoint
pub struct ProfileCache {
    provider: Arc<dyn MarketDataProvider>,
    entries: DashMap<String, CachedProfile>,
    ttl: Duration,
}

impl ProfileCache {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self::with_ttl(provider, PROFILE_TTL)
    }

    pub fn with_ttl(provider: Arc<dyn MarketDataProvider>, ttl: Duration) -> Self {
        Self {
            provider,
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cached profile if present and fresh
    pub fn get_cached(&self, symbol: &str) -> Option<CompanyProfile> {
        let key = symbol.to_uppercase();
        let entry = self.entries.get(&key)?;
        if entry.fetched_at.elapsed() < self.ttl {
            Some(entry.profile.clone())
        } else {
            None
        }
    }

    /// Profile for `symbol`, hitting the provider only on a miss or expiry
    pub async fn get(&self, symbol: &str) -> Result<Option<CompanyProfile>, ServiceError> {
        if let Some(profile) = self.get_cached(symbol) {
            tracing::debug!("Profile cache hit for {}", symbol);
            return Ok(Some(profile));
        }

        let profile = self.provider.get_company_profile(symbol).await?;
        if let Some(ref profile) = profile {
            self.entries.insert(
                symbol.to_uppercase(),
                CachedProfile {
                    profile: profile.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }
        Ok(profile)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockProvider;

    #[tokio::test]
    async fn test_profile_fetched_once_within_ttl() {
        let provider = Arc::new(MockProvider::new());
        let cache = ProfileCache::new(provider.clone());

        let first = cache.get("aapl").await.unwrap().unwrap();
        let second = cache.get("AAPL").await.unwrap().unwrap();

        assert_eq!(first.symbol, "AAPL");
        assert_eq!(second.company_name, first.company_name);
        assert_eq!(provider.profile_calls(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_expired_profile_refetched() {
        let provider = Arc::new(MockProvider::new());
        let cache = ProfileCache::with_ttl(provider.clone(), Duration::ZERO);

        cache.get("AAPL").await.unwrap();
        cache.get("AAPL").await.unwrap();

        assert_eq!(provider.profile_calls(), 2);
    }
}
