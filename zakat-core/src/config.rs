use crate::assets::{AssetSnapshot, LiabilitySnapshot};
use crate::inputs::{IntoZakatDecimal, positive};
use crate::types::ZakatError;
use crate::units::{NISAB_GOLD_GRAMS, NISAB_SILVER_GRAMS};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_ZAKAT_RATE: Decimal = dec!(0.025);
pub const DEFAULT_GOLD_PRICE_PER_GRAM: Decimal = dec!(75);
pub const DEFAULT_SILVER_PRICE_PER_GRAM: Decimal = dec!(0.85);

/// Nisab standard used when no explicit threshold is supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum NisabStandard {
    /// 85 g × gold price per gram.
    #[default]
    Gold,
    /// 595 g × silver price per gram.
    Silver,
    /// The lower of the gold and silver thresholds.
    LowerOfTwo,
}

/// Metal prices assumed when the caller leaves a price unset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceDefaults {
    pub gold_price_per_gram: Decimal,
    pub silver_price_per_gram: Decimal,
}

impl Default for PriceDefaults {
    fn default() -> Self {
        Self {
            gold_price_per_gram: DEFAULT_GOLD_PRICE_PER_GRAM,
            silver_price_per_gram: DEFAULT_SILVER_PRICE_PER_GRAM,
        }
    }
}

impl PriceDefaults {
    pub fn new(
        gold_price_per_gram: impl IntoZakatDecimal,
        silver_price_per_gram: impl IntoZakatDecimal,
    ) -> Result<Self, ZakatError> {
        let defaults = Self {
            gold_price_per_gram: gold_price_per_gram.into_zakat_decimal()?,
            silver_price_per_gram: silver_price_per_gram.into_zakat_decimal()?,
        };
        defaults.validate()?;
        Ok(defaults)
    }

    pub fn validate(&self) -> Result<(), ZakatError> {
        if self.gold_price_per_gram <= Decimal::ZERO {
            return Err(ZakatError::ConfigurationError(
                "Default gold price must be > 0".to_string(),
            ));
        }
        if self.silver_price_per_gram <= Decimal::ZERO {
            return Err(ZakatError::ConfigurationError(
                "Default silver price must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Reads `ZAKAT_GOLD_PRICE` / `ZAKAT_SILVER_PRICE`, keeping the built-in
    /// default for any variable that is absent.
    pub fn from_env() -> Result<Self, ZakatError> {
        let mut defaults = Self::default();
        if let Ok(gold) = env::var("ZAKAT_GOLD_PRICE") {
            defaults.gold_price_per_gram = gold.parse::<Decimal>().map_err(|e| {
                ZakatError::ConfigurationError(format!("Invalid gold price format: {}", e))
            })?;
        }
        if let Ok(silver) = env::var("ZAKAT_SILVER_PRICE") {
            defaults.silver_price_per_gram = silver.parse::<Decimal>().map_err(|e| {
                ZakatError::ConfigurationError(format!("Invalid silver price format: {}", e))
            })?;
        }
        defaults.validate()?;
        Ok(defaults)
    }
}

/// User-overridable calculation settings.
///
/// `None` and non-positive values both mean "not set": the engine then
/// derives the Nisab from metal prices and applies [`DEFAULT_ZAKAT_RATE`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculationSettings {
    pub nisab_threshold: Option<Decimal>,
    pub zakat_rate: Option<Decimal>,
    pub nisab_standard: NisabStandard,
    pub defaults: PriceDefaults,
}

impl std::str::FromStr for CalculationSettings {
    type Err = ZakatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let settings: Self = serde_json::from_str(s).map_err(|e| {
            ZakatError::ConfigurationError(format!("Failed to parse settings JSON: {}", e))
        })?;
        settings.validate()?;
        Ok(settings)
    }
}

impl CalculationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nisab_threshold(mut self, threshold: impl IntoZakatDecimal) -> Result<Self, ZakatError> {
        self.nisab_threshold = Some(threshold.into_zakat_decimal()?);
        Ok(self)
    }

    pub fn with_zakat_rate(mut self, rate: impl IntoZakatDecimal) -> Result<Self, ZakatError> {
        self.zakat_rate = Some(rate.into_zakat_decimal()?);
        Ok(self)
    }

    pub fn with_nisab_standard(mut self, standard: NisabStandard) -> Self {
        self.nisab_standard = standard;
        self
    }

    pub fn with_defaults(mut self, defaults: PriceDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn validate(&self) -> Result<(), ZakatError> {
        if let Some(rate) = self.zakat_rate
            && rate > Decimal::ONE
        {
            return Err(ZakatError::ConfigurationError(
                "Zakat rate is a fraction and must not exceed 1".to_string(),
            ));
        }
        self.defaults.validate()
    }

    /// The rate to apply: the configured one when positive, else 2.5%.
    pub fn effective_rate(&self) -> Decimal {
        positive(self.zakat_rate).unwrap_or(DEFAULT_ZAKAT_RATE)
    }

    /// The Nisab threshold for the given current metal prices.
    pub fn effective_nisab(
        &self,
        gold_price_per_gram: Decimal,
        silver_price_per_gram: Decimal,
    ) -> Result<Decimal, ZakatError> {
        if let Some(threshold) = positive(self.nisab_threshold) {
            return Ok(threshold);
        }
        let gold = || {
            NISAB_GOLD_GRAMS
                .checked_mul(gold_price_per_gram)
                .ok_or_else(|| ZakatError::CalculationError("Overflow calculating gold nisab value".to_string()))
        };
        let silver = || {
            NISAB_SILVER_GRAMS
                .checked_mul(silver_price_per_gram)
                .ok_or_else(|| ZakatError::CalculationError("Overflow calculating silver nisab value".to_string()))
        };
        match self.nisab_standard {
            NisabStandard::Gold => gold(),
            NisabStandard::Silver => silver(),
            NisabStandard::LowerOfTwo => Ok(gold()?.min(silver()?)),
        }
    }
}

/// A complete calculation request as saved by the form layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZakatForm {
    pub assets: AssetSnapshot,
    pub liabilities: LiabilitySnapshot,
    pub settings: CalculationSettings,
}

impl ZakatForm {
    /// Loads a form from a `.json` or `.toml` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ZakatError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ZakatError::ConfigurationError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let form = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_toml(&content)?
        };
        debug!("Loaded calculation form from {}", path.display());
        Ok(form)
    }

    pub fn from_json(content: &str) -> Result<Self, ZakatError> {
        let form: Self = serde_json::from_str(content).map_err(|e| {
            ZakatError::ConfigurationError(format!("Failed to parse form JSON: {}", e))
        })?;
        form.validate()?;
        Ok(form)
    }

    pub fn from_toml(content: &str) -> Result<Self, ZakatError> {
        let form: Self = toml::from_str(content).map_err(|e| {
            ZakatError::ConfigurationError(format!("Failed to parse form TOML: {}", e))
        })?;
        form.validate()?;
        Ok(form)
    }

    pub fn validate(&self) -> Result<(), ZakatError> {
        self.assets.validate()?;
        self.liabilities.validate()?;
        self.settings.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_rate_defaults() {
        assert_eq!(CalculationSettings::new().effective_rate(), dec!(0.025));
        let zero = CalculationSettings::new().with_zakat_rate(0).unwrap();
        assert_eq!(zero.effective_rate(), dec!(0.025));
        let custom = CalculationSettings::new().with_zakat_rate(0.03).unwrap();
        assert_eq!(custom.effective_rate(), dec!(0.03));
    }

    #[test]
    fn test_effective_nisab_standards() {
        let settings = CalculationSettings::new();
        assert_eq!(settings.effective_nisab(dec!(80), dec!(1)).unwrap(), dec!(6800));

        let silver = settings.clone().with_nisab_standard(NisabStandard::Silver);
        assert_eq!(silver.effective_nisab(dec!(80), dec!(1)).unwrap(), dec!(595));

        let lower = settings.with_nisab_standard(NisabStandard::LowerOfTwo);
        assert_eq!(lower.effective_nisab(dec!(80), dec!(20)).unwrap(), dec!(6800));
    }

    #[test]
    fn test_explicit_nisab_wins_unless_zero() {
        let explicit = CalculationSettings::new().with_nisab_threshold(5000).unwrap();
        assert_eq!(explicit.effective_nisab(dec!(80), dec!(1)).unwrap(), dec!(5000));

        let zero = CalculationSettings::new().with_nisab_threshold(0).unwrap();
        assert_eq!(zero.effective_nisab(dec!(80), dec!(1)).unwrap(), dec!(6800));
    }

    #[test]
    fn test_validate_rejects_rate_above_one() {
        let settings = CalculationSettings::new().with_zakat_rate(2.5).unwrap();
        assert!(settings.validate().is_err());
        assert!(PriceDefaults::new(0, 1).is_err());
    }

    #[test]
    fn test_settings_from_json() {
        let settings: CalculationSettings =
            r#"{"nisab_threshold": "6800", "nisab_standard": "lower-of-two"}"#
                .parse()
                .unwrap();
        assert_eq!(settings.nisab_threshold, Some(dec!(6800)));
        assert_eq!(settings.nisab_standard, NisabStandard::LowerOfTwo);
        assert_eq!(settings.defaults, PriceDefaults::default());
    }

    #[test]
    fn test_form_from_toml() {
        let toml_str = r#"
[assets.cash]
bank = 10000

[assets.precious_metals.gold]
weight = 50
unit = "g"
price_per_gram = 80

[liabilities]
debts = 500

[settings]
zakat_rate = 0.025
"#;
        let form = ZakatForm::from_toml(toml_str).unwrap();
        assert_eq!(form.assets.cash.bank, dec!(10000));
        assert_eq!(form.assets.precious_metals.gold.price_per_gram, Some(dec!(80)));
        assert_eq!(form.liabilities.debts, dec!(500));
        assert_eq!(form.settings.zakat_rate, Some(dec!(0.025)));
    }

    #[test]
    fn test_form_rejects_negative_values() {
        let result = ZakatForm::from_json(r#"{"liabilities": {"debts": -5}}"#);
        assert!(matches!(result, Err(ZakatError::InvalidInput { .. })));
    }
}
