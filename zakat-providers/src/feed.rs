//! Sources of spot prices.

use crate::rates::SpotPrices;
use rust_decimal::Decimal;
use serde::Deserialize;
use zakat_core::ZakatError;
use zakat_core::inputs::IntoZakatDecimal;

pub const DEFAULT_FEED_BASE_URL: &str = "https://data-asg.goldprice.org";
/// Rates are always requested in USD; no currency conversion is done.
pub const FEED_PATH: &str = "/dbXRates/USD";

/// Fetches one pair of gold/silver spot prices per call.
#[async_trait::async_trait]
pub trait PriceFeed: Send + Sync {
    async fn fetch_spot(&self) -> Result<SpotPrices, ZakatError>;
}

/// Always returns the same prices. Useful for tests and offline runs.
#[derive(Debug, Clone)]
pub struct StaticPriceFeed {
    spot: SpotPrices,
}

impl StaticPriceFeed {
    pub fn new(
        gold_per_ounce: impl IntoZakatDecimal,
        silver_per_ounce: impl IntoZakatDecimal,
    ) -> Result<Self, ZakatError> {
        let spot = SpotPrices {
            gold_per_ounce: gold_per_ounce.into_zakat_decimal()?,
            silver_per_ounce: silver_per_ounce.into_zakat_decimal()?,
        };
        if spot.gold_per_ounce <= Decimal::ZERO || spot.silver_per_ounce <= Decimal::ZERO {
            return Err(ZakatError::invalid_input("prices", "Spot prices must be positive"));
        }
        Ok(Self { spot })
    }
}

#[async_trait::async_trait]
impl PriceFeed for StaticPriceFeed {
    async fn fetch_spot(&self) -> Result<SpotPrices, ZakatError> {
        Ok(self.spot)
    }
}

/// Network configuration for the live feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkConfig {
    pub timeout_seconds: u64,
    /// Scheme and host of the feed, without the path. Overridable for tests.
    pub base_url: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 10,
            base_url: DEFAULT_FEED_BASE_URL.to_string(),
        }
    }
}

impl NetworkConfig {
    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), FEED_PATH)
    }
}

#[derive(Deserialize)]
struct FeedPayload {
    #[serde(default)]
    items: Vec<FeedItem>,
}

#[derive(Deserialize)]
struct FeedItem {
    #[serde(rename = "xauPrice")]
    xau_price: Option<Decimal>,
    #[serde(rename = "xagPrice")]
    xag_price: Option<Decimal>,
}

/// Extracts spot prices from a feed response body.
///
/// Only the first item is read. Missing or non-positive prices are treated
/// as a failed fetch rather than passed on as zero.
pub fn parse_spot_payload(body: &str) -> Result<SpotPrices, ZakatError> {
    let payload: FeedPayload = serde_json::from_str(body)
        .map_err(|e| ZakatError::NetworkError(format!("Failed to parse price feed response: {}", e)))?;

    let item = payload
        .items
        .into_iter()
        .next()
        .ok_or_else(|| ZakatError::NetworkError("Price feed returned no items".to_string()))?;

    match (item.xau_price, item.xag_price) {
        (Some(gold), Some(silver)) if gold > Decimal::ZERO && silver > Decimal::ZERO => Ok(SpotPrices {
            gold_per_ounce: gold,
            silver_per_ounce: silver,
        }),
        _ => Err(ZakatError::NetworkError(
            "Price feed response is missing gold or silver prices".to_string(),
        )),
    }
}

/// Live gold/silver spot prices from goldprice.org.
#[cfg(feature = "live-pricing")]
pub struct GoldPriceFeed {
    client: reqwest::Client,
    endpoint: String,
}

#[cfg(feature = "live-pricing")]
impl GoldPriceFeed {
    pub fn new(config: &NetworkConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("zakat/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: config.endpoint(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(feature = "live-pricing")]
impl Default for GoldPriceFeed {
    fn default() -> Self {
        Self::new(&NetworkConfig::default())
    }
}

#[cfg(feature = "live-pricing")]
#[async_trait::async_trait]
impl PriceFeed for GoldPriceFeed {
    async fn fetch_spot(&self) -> Result<SpotPrices, ZakatError> {
        tracing::debug!(endpoint = %self.endpoint, "Requesting spot prices");

        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| ZakatError::NetworkError(format!("Price feed request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ZakatError::NetworkError(format!("Price feed returned HTTP {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ZakatError::NetworkError(format!("Failed to read price feed response: {}", e)))?;

        parse_spot_payload(&body)
    }
}
