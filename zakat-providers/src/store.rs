//! Persisted layout of the last successful rate fetch.
//!
//! Two entries are written: a JSON object with the per-gram and per-ounce
//! prices, and an RFC 3339 timestamp of when they were fetched. Either entry
//! missing or unparseable counts as no cached value.

use crate::cache::KeyValueCache;
use crate::rates::{MetalRateSnapshot, SpotPrices};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use zakat_core::ZakatError;

pub const RATES_KEY: &str = "zakat_calculator_metal_rates";
pub const LAST_UPDATED_KEY: &str = "zakat_calculator_last_updated";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRates {
    #[serde(with = "rust_decimal::serde::float")]
    pub gold_price_per_gram: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub silver_price_per_gram: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub gold_price_per_oz: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub silver_price_per_oz: Decimal,
}

impl From<&MetalRateSnapshot> for StoredRates {
    fn from(snapshot: &MetalRateSnapshot) -> Self {
        Self {
            gold_price_per_gram: snapshot.gold.per_gram,
            silver_price_per_gram: snapshot.silver.per_gram,
            gold_price_per_oz: snapshot.gold.per_ounce,
            silver_price_per_oz: snapshot.silver.per_ounce,
        }
    }
}

impl StoredRates {
    fn is_valid(&self) -> bool {
        [
            self.gold_price_per_gram,
            self.silver_price_per_gram,
            self.gold_price_per_oz,
            self.silver_price_per_oz,
        ]
        .iter()
        .all(|p| *p > Decimal::ZERO)
    }

    /// Rebuilds a full snapshot. Secondary units come from the ounce
    /// prices; the stored gram prices are kept as written.
    pub fn into_snapshot(self, captured_at: DateTime<Utc>) -> MetalRateSnapshot {
        let mut snapshot = MetalRateSnapshot::from_spot(
            SpotPrices {
                gold_per_ounce: self.gold_price_per_oz,
                silver_per_ounce: self.silver_price_per_oz,
            },
            captured_at,
        );
        snapshot.gold.per_gram = self.gold_price_per_gram;
        snapshot.silver.per_gram = self.silver_price_per_gram;
        snapshot
    }
}

/// Reads the persisted snapshot, if both entries are present and sane.
///
/// Timestamps later than `now` are treated as corrupt, otherwise a skewed
/// clock could pin stale prices indefinitely.
pub async fn load_snapshot(cache: &dyn KeyValueCache, now: DateTime<Utc>) -> Option<MetalRateSnapshot> {
    let raw_rates = cache.get(RATES_KEY).await?;
    let raw_stamp = cache.get(LAST_UPDATED_KEY).await?;

    let rates: StoredRates = match serde_json::from_str(&raw_rates) {
        Ok(rates) => rates,
        Err(e) => {
            warn!(error = %e, "Discarding unparseable cached rates");
            return None;
        }
    };
    let captured_at = match DateTime::parse_from_rfc3339(raw_stamp.trim()) {
        Ok(stamp) => stamp.with_timezone(&Utc),
        Err(e) => {
            warn!(error = %e, "Discarding cached rates with invalid timestamp");
            return None;
        }
    };

    if !rates.is_valid() || captured_at > now {
        warn!(%captured_at, "Discarding implausible cached rates");
        return None;
    }

    Some(rates.into_snapshot(captured_at))
}

pub async fn save_snapshot(cache: &dyn KeyValueCache, snapshot: &MetalRateSnapshot) -> Result<(), ZakatError> {
    let payload = serde_json::to_string(&StoredRates::from(snapshot))
        .map_err(|e| ZakatError::CacheError(format!("Failed to serialize rates: {}", e)))?;
    cache.set(RATES_KEY, payload).await?;
    cache.set(LAST_UPDATED_KEY, snapshot.captured_at.to_rfc3339()).await
}
