//! # zakat
//!
//! Computes a Zakat obligation from a snapshot of assets and liabilities,
//! with gold/silver prices taken from a live, cached rate feed.
//!
//! The engine lives in [`zakat_core`] and never performs I/O. Rates come from
//! [`zakat_providers`] (enabled by the default `providers` feature); the
//! caller decides how the two meet, usually by filling unset metal prices:
//!
//! ```rust
//! use zakat::prelude::*;
//!
//! let rates = MetalRateSnapshot::fallback(chrono::Utc::now());
//! let assets = AssetSnapshot::new()
//!     .cash_bank(12_000)
//!     .gold_weight(20)
//!     .with_market_prices(rates.gold_price_per_gram(), rates.silver_price_per_gram());
//!
//! let result = compute(&assets, &LiabilitySnapshot::new().debts(500), &CalculationSettings::new())?;
//! assert!(result.is_payable);
//! println!("{}", result.explain());
//! # Ok::<(), ZakatError>(())
//! ```

pub mod prelude;

pub use zakat_core::{
    AssetSnapshot, CalculationSettings, LiabilitySnapshot, NisabStandard, PriceDefaults, ZakatError,
    ZakatForm, ZakatResult, compute,
};

pub use zakat_core as core;
#[cfg(feature = "providers")]
pub use zakat_providers as providers;
