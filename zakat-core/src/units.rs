//! Weight units and the conversion constants shared by the engine and the
//! rate provider. Both sides must convert ounces with the same factor.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// 1 troy ounce in grams.
pub const TROY_OUNCE_IN_GRAMS: Decimal = dec!(31.1034768);

/// 1 tola in grams.
pub const TOLA_IN_GRAMS: Decimal = dec!(11.6638038);

pub const GRAMS_PER_KILOGRAM: Decimal = dec!(1000);

/// Gold weight (grams) that sets the gold-standard Nisab.
pub const NISAB_GOLD_GRAMS: Decimal = dec!(85);

/// Silver weight (grams) that sets the silver-standard Nisab.
pub const NISAB_SILVER_GRAMS: Decimal = dec!(595);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WeightUnit {
    #[default]
    #[serde(rename = "g", alias = "gram", alias = "grams")]
    Gram,
    #[serde(rename = "oz", alias = "ounce", alias = "ounces")]
    Ounce,
}

impl WeightUnit {
    /// Number of grams in one of this unit.
    pub fn grams(&self) -> Decimal {
        match self {
            WeightUnit::Gram => Decimal::ONE,
            WeightUnit::Ounce => TROY_OUNCE_IN_GRAMS,
        }
    }

    /// `None` when the weight is too large to express in grams.
    pub fn to_grams(&self, weight: Decimal) -> Option<Decimal> {
        weight.checked_mul(self.grams())
    }
}

impl std::fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WeightUnit::Gram => write!(f, "g"),
            WeightUnit::Ounce => write!(f, "oz"),
        }
    }
}

impl std::str::FromStr for WeightUnit {
    type Err = crate::types::ZakatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "g" | "gram" | "grams" => Ok(WeightUnit::Gram),
            "oz" | "ounce" | "ounces" => Ok(WeightUnit::Ounce),
            other => Err(crate::types::ZakatError::invalid_input(
                "unit",
                format!("Unknown weight unit: {}", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ounce_conversion_uses_troy_ounce() {
        assert_eq!(WeightUnit::Ounce.to_grams(dec!(2)), Some(dec!(62.2069536)));
        assert_eq!(WeightUnit::Gram.to_grams(dec!(50)), Some(dec!(50)));
        assert_eq!(WeightUnit::Ounce.to_grams(Decimal::MAX), None);
    }

    #[test]
    fn test_parse_and_serde() {
        assert_eq!("OZ".parse::<WeightUnit>().unwrap(), WeightUnit::Ounce);
        assert!("stone".parse::<WeightUnit>().is_err());
        let unit: WeightUnit = serde_json::from_str(r#""ounce""#).unwrap();
        assert_eq!(unit, WeightUnit::Ounce);
        assert_eq!(serde_json::to_string(&WeightUnit::Gram).unwrap(), r#""g""#);
    }
}
