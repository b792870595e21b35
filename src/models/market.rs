use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Latest quote for a symbol
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Quote {
    pub symbol: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_low: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Symbol search hit
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SymbolSearchResult {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
}

/// Which movers list to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MoverDirection {
    Gainers,
    Losers,
    Actives,
}

impl MoverDirection {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gainers" | "up" => Some(MoverDirection::Gainers),
            "losers" | "down" => Some(MoverDirection::Losers),
            "actives" | "active" => Some(MoverDirection::Actives),
            _ => None,
        }
    }
}

/// One entry of a gainers/losers/actives list
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MoverEntry {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

/// Company snapshot
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyProfile {
    pub symbol: String,
    pub company_name: String,
    pub exchange: String,
    pub industry: String,
    pub sector: String,
    pub ceo: String,
    pub market_cap: f64,
    pub website: String,
    pub description: String,
}

/// News article about a symbol
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NewsArticle {
    pub symbol: String,
    pub title: String,
    pub url: String,
    pub site: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}
