//! Core data structures and the pure calculation engine for Zakat.
//!
//! ```rust
//! use zakat_core::prelude::*;
//!
//! let assets = AssetSnapshot::new().cash_bank(10_000).gold_price_per_gram(80);
//! let result = compute(&assets, &LiabilitySnapshot::new(), &CalculationSettings::new())?;
//! assert_eq!(result.format_amount(), "250.00");
//! # Ok::<(), ZakatError>(())
//! ```

pub mod assets;
pub mod config;
pub mod engine;
pub mod inputs;
pub mod types;
pub mod units;

pub use assets::{AssetSnapshot, LiabilitySnapshot};
pub use config::{CalculationSettings, NisabStandard, PriceDefaults, ZakatForm};
pub use engine::compute;
pub use types::{ZakatError, ZakatResult};

pub mod prelude {
    pub use crate::assets::{
        AssetSnapshot, Business, CashAssets, Investments, LiabilitySnapshot, MetalHolding,
        PreciousMetals, RealEstate, Retirement,
    };
    pub use crate::config::{CalculationSettings, NisabStandard, PriceDefaults, ZakatForm};
    pub use crate::engine::{compute, compute_at};
    pub use crate::inputs::IntoZakatDecimal;
    pub use crate::types::{CalculationStep, Operation, ZakatError, ZakatResult};
    pub use crate::units::{TROY_OUNCE_IN_GRAMS, WeightUnit};
}
