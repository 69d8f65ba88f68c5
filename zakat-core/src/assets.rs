//! Asset and liability snapshots handed to the engine.
//!
//! Snapshots are built once per calculation session by the caller, validated,
//! passed to [`compute`](crate::engine::compute) and then discarded.

use crate::inputs::IntoZakatDecimal;
use crate::types::ZakatError;
use crate::units::WeightUnit;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CashAssets {
    pub physical: Decimal,
    pub bank: Decimal,
}

/// A holding of one precious metal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetalHolding {
    pub weight: Decimal,
    pub unit: WeightUnit,
    /// Market price per gram. `None` or zero falls back to the configured default.
    pub price_per_gram: Option<Decimal>,
}

impl MetalHolding {
    pub fn weight_in_grams(&self) -> Result<Decimal, ZakatError> {
        self.unit.to_grams(self.weight).ok_or_else(|| {
            ZakatError::CalculationError(format!("Overflow converting {} {} to grams", self.weight, self.unit))
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreciousMetals {
    pub gold: MetalHolding,
    pub silver: MetalHolding,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Investments {
    pub stocks: Decimal,
    pub mutual_funds: Decimal,
    pub bonds: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Retirement {
    /// Free-form account label (e.g. "401k"). Informational only.
    pub account_type: Option<String>,
    /// Value accessible now, after early-withdrawal penalties and taxes.
    pub liquid_value: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RealEstate {
    pub investment_properties: Decimal,
    pub rental_income: Decimal,
    /// Personal-use property is exempt; its rental income is not.
    pub personal_use: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Business {
    pub inventory: Decimal,
    pub accounts_receivable: Decimal,
    pub cash_in_accounts: Decimal,
}

/// Everything the user owns, as entered for one calculation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetSnapshot {
    pub cash: CashAssets,
    pub precious_metals: PreciousMetals,
    pub investments: Investments,
    pub retirement: Retirement,
    pub real_estate: RealEstate,
    pub business: Business,
}

/// Amounts due within the current Zakat cycle.
///
/// Long-term debt must already be reduced to its current-cycle installment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiabilitySnapshot {
    pub debts: Decimal,
    pub pending_taxes: Decimal,
    pub obligations: Decimal,
}

/// Generates fluent setters that accept anything convertible to `Decimal`.
///
/// Unparsable values are ignored and leave the field untouched, matching how
/// form input is treated: validation happens in `validate()`.
macro_rules! decimal_setters {
    ($ty:ty { $( $(#[$doc:meta])* $name:ident => $($field:ident).+ ),* $(,)? }) => {
        impl $ty {
            $(
                $(#[$doc])*
                pub fn $name(mut self, value: impl IntoZakatDecimal) -> Self {
                    if let Ok(v) = value.into_zakat_decimal() {
                        self.$($field).+ = v;
                    }
                    self
                }
            )*
        }
    };
}

decimal_setters!(AssetSnapshot {
    cash_physical => cash.physical,
    cash_bank => cash.bank,
    gold_weight => precious_metals.gold.weight,
    silver_weight => precious_metals.silver.weight,
    stocks => investments.stocks,
    mutual_funds => investments.mutual_funds,
    bonds => investments.bonds,
    /// Sets the liquid (accessible now) value of retirement accounts.
    retirement_liquid_value => retirement.liquid_value,
    investment_properties => real_estate.investment_properties,
    rental_income => real_estate.rental_income,
    inventory => business.inventory,
    accounts_receivable => business.accounts_receivable,
    business_cash => business.cash_in_accounts,
});

decimal_setters!(LiabilitySnapshot {
    debts => debts,
    pending_taxes => pending_taxes,
    obligations => obligations,
});

impl AssetSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gold_unit(mut self, unit: WeightUnit) -> Self {
        self.precious_metals.gold.unit = unit;
        self
    }

    pub fn silver_unit(mut self, unit: WeightUnit) -> Self {
        self.precious_metals.silver.unit = unit;
        self
    }

    pub fn gold_price_per_gram(mut self, price: impl IntoZakatDecimal) -> Self {
        if let Ok(p) = price.into_zakat_decimal() {
            self.precious_metals.gold.price_per_gram = Some(p);
        }
        self
    }

    pub fn silver_price_per_gram(mut self, price: impl IntoZakatDecimal) -> Self {
        if let Ok(p) = price.into_zakat_decimal() {
            self.precious_metals.silver.price_per_gram = Some(p);
        }
        self
    }

    pub fn personal_use(mut self, personal_use: bool) -> Self {
        self.real_estate.personal_use = personal_use;
        self
    }

    pub fn retirement_type(mut self, account_type: impl Into<String>) -> Self {
        self.retirement.account_type = Some(account_type.into());
        self
    }

    /// Fills metal prices the user left unset (or zero) with market rates.
    /// Prices the user entered explicitly are kept.
    pub fn with_market_prices(mut self, gold_per_gram: Decimal, silver_per_gram: Decimal) -> Self {
        let metals = &mut self.precious_metals;
        if crate::inputs::positive(metals.gold.price_per_gram).is_none() {
            metals.gold.price_per_gram = Some(gold_per_gram);
        }
        if crate::inputs::positive(metals.silver.price_per_gram).is_none() {
            metals.silver.price_per_gram = Some(silver_per_gram);
        }
        self
    }

    /// Checks that every numeric field is non-negative.
    ///
    /// Callers run this before [`compute`](crate::engine::compute), which
    /// still rejects totals too large to represent.
    pub fn validate(&self) -> Result<(), ZakatError> {
        let metals = &self.precious_metals;
        let fields = [
            ("cash.physical", Some(self.cash.physical)),
            ("cash.bank", Some(self.cash.bank)),
            ("precious_metals.gold.weight", Some(metals.gold.weight)),
            ("precious_metals.gold.price_per_gram", metals.gold.price_per_gram),
            ("precious_metals.silver.weight", Some(metals.silver.weight)),
            ("precious_metals.silver.price_per_gram", metals.silver.price_per_gram),
            ("investments.stocks", Some(self.investments.stocks)),
            ("investments.mutual_funds", Some(self.investments.mutual_funds)),
            ("investments.bonds", Some(self.investments.bonds)),
            ("retirement.liquid_value", Some(self.retirement.liquid_value)),
            ("real_estate.investment_properties", Some(self.real_estate.investment_properties)),
            ("real_estate.rental_income", Some(self.real_estate.rental_income)),
            ("business.inventory", Some(self.business.inventory)),
            ("business.accounts_receivable", Some(self.business.accounts_receivable)),
            ("business.cash_in_accounts", Some(self.business.cash_in_accounts)),
        ];
        ensure_non_negative(&fields)
    }
}

impl LiabilitySnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<(), ZakatError> {
        ensure_non_negative(&[
            ("debts", Some(self.debts)),
            ("pending_taxes", Some(self.pending_taxes)),
            ("obligations", Some(self.obligations)),
        ])
    }
}

fn ensure_non_negative(fields: &[(&str, Option<Decimal>)]) -> Result<(), ZakatError> {
    for (field, value) in fields {
        if let Some(v) = value
            && *v < Decimal::ZERO
        {
            return Err(ZakatError::invalid_input(*field, "must be non-negative"));
        }
    }
    Ok(())
}
