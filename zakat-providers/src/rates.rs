//! Normalized gold/silver rates derived from troy-ounce spot prices.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use zakat_core::units::{GRAMS_PER_KILOGRAM, TOLA_IN_GRAMS, TROY_OUNCE_IN_GRAMS};

/// Spot prices per troy ounce in the feed's base currency (USD).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpotPrices {
    pub gold_per_ounce: Decimal,
    pub silver_per_ounce: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldRates {
    pub per_gram: Decimal,
    pub per_ounce: Decimal,
    pub per_kilogram: Decimal,
    pub per_tola: Decimal,
    /// Karat prices are per troy ounce, as fractions of 24K.
    pub karat_24: Decimal,
    pub karat_22: Decimal,
    pub karat_21: Decimal,
    pub karat_18: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SilverRates {
    pub per_gram: Decimal,
    pub per_ounce: Decimal,
    pub per_kilogram: Decimal,
    pub per_tola: Decimal,
}

/// Gold and silver rates captured at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetalRateSnapshot {
    pub gold: GoldRates,
    pub silver: SilverRates,
    pub captured_at: DateTime<Utc>,
}

fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn karat(price_per_ounce: Decimal, karat: u32) -> Decimal {
    round2(price_per_ounce * Decimal::from(karat) / dec!(24))
}

impl MetalRateSnapshot {
    /// Derives every unit from the ounce spot prices. All values are rounded
    /// to cents; derived units are computed from the unrounded gram price.
    pub fn from_spot(spot: SpotPrices, captured_at: DateTime<Utc>) -> Self {
        let gold_gram = spot.gold_per_ounce / TROY_OUNCE_IN_GRAMS;
        let silver_gram = spot.silver_per_ounce / TROY_OUNCE_IN_GRAMS;

        Self {
            gold: GoldRates {
                per_gram: round2(gold_gram),
                per_ounce: round2(spot.gold_per_ounce),
                per_kilogram: round2(gold_gram * GRAMS_PER_KILOGRAM),
                per_tola: round2(gold_gram * TOLA_IN_GRAMS),
                karat_24: round2(spot.gold_per_ounce),
                karat_22: karat(spot.gold_per_ounce, 22),
                karat_21: karat(spot.gold_per_ounce, 21),
                karat_18: karat(spot.gold_per_ounce, 18),
            },
            silver: SilverRates {
                per_gram: round2(silver_gram),
                per_ounce: round2(spot.silver_per_ounce),
                per_kilogram: round2(silver_gram * GRAMS_PER_KILOGRAM),
                per_tola: round2(silver_gram * TOLA_IN_GRAMS),
            },
            captured_at,
        }
    }

    /// Fixed default rates shown when live prices cannot be retrieved.
    pub fn fallback(captured_at: DateTime<Utc>) -> Self {
        Self {
            gold: GoldRates {
                per_gram: dec!(80.38),
                per_ounce: dec!(2500.00),
                per_kilogram: dec!(80380.00),
                per_tola: dec!(937.50),
                karat_24: dec!(2500.00),
                karat_22: dec!(2291.67),
                karat_21: dec!(2187.50),
                karat_18: dec!(1875.00),
            },
            silver: SilverRates {
                per_gram: dec!(0.92),
                per_ounce: dec!(28.50),
                per_kilogram: dec!(920.00),
                per_tola: dec!(10.73),
            },
            captured_at,
        }
    }

    pub fn gold_price_per_gram(&self) -> Decimal {
        self.gold.per_gram
    }

    pub fn silver_price_per_gram(&self) -> Decimal {
        self.silver.per_gram
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.captured_at
    }

    /// True while the snapshot is younger than `window`.
    pub fn is_fresh(&self, now: DateTime<Utc>, window: std::time::Duration) -> bool {
        match chrono::Duration::from_std(window) {
            Ok(window) => self.age(now) < window,
            Err(_) => true,
        }
    }
}
