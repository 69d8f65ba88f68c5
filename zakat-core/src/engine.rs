//! The Zakat engine.
//!
//! A pure function of its inputs: no I/O, no globals. The only
//! non-deterministic value, the calculation timestamp, can be pinned with
//! [`compute_at`]. Arithmetic is checked; amounts too large for a `Decimal`
//! yield [`ZakatError::CalculationError`] instead of a panic.

use crate::assets::{AssetSnapshot, LiabilitySnapshot, MetalHolding};
use crate::config::CalculationSettings;
use crate::inputs::positive;
use crate::types::{CalculationStep, ZakatError, ZakatResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::debug;

/// Computes the Zakat obligation for one snapshot, stamped with the current time.
pub fn compute(
    assets: &AssetSnapshot,
    liabilities: &LiabilitySnapshot,
    settings: &CalculationSettings,
) -> Result<ZakatResult, ZakatError> {
    compute_at(assets, liabilities, settings, Utc::now())
}

/// Same as [`compute`] with an explicit calculation date.
pub fn compute_at(
    assets: &AssetSnapshot,
    liabilities: &LiabilitySnapshot,
    settings: &CalculationSettings,
    calculation_date: DateTime<Utc>,
) -> Result<ZakatResult, ZakatError> {
    let mut trace = Vec::new();

    let total_assets = asset_total_with_trace(assets, settings, &mut trace)?;
    trace.push(CalculationStep::result("Total Assets", total_assets));

    let total_liabilities = liability_total_with_trace(liabilities, &mut trace)?;
    trace.push(CalculationStep::result("Total Liabilities", total_liabilities));

    let net_zakatable_wealth = total_assets
        .checked_sub(total_liabilities)
        .ok_or_else(|| overflow("net zakatable wealth"))?;
    trace.push(CalculationStep::result("Net Zakatable Wealth", net_zakatable_wealth));

    let nisab_threshold = nisab_threshold(assets, settings)?;
    trace.push(CalculationStep::compare("Nisab Threshold", nisab_threshold));

    let zakat_rate = settings.effective_rate();
    // Strictly greater: wealth exactly at Nisab owes nothing.
    let is_payable = net_zakatable_wealth > nisab_threshold;
    let zakat_amount = if is_payable {
        trace.push(CalculationStep::rate("Zakat Rate", zakat_rate));
        net_zakatable_wealth
            .checked_mul(zakat_rate)
            .ok_or_else(|| overflow("zakat due"))?
    } else {
        trace.push(CalculationStep::info("Net wealth does not exceed Nisab - No Zakat Due"));
        Decimal::ZERO
    };
    trace.push(CalculationStep::result("Zakat Due", zakat_amount));

    debug!(
        %total_assets,
        %total_liabilities,
        %nisab_threshold,
        %zakat_amount,
        "Computed Zakat"
    );

    Ok(ZakatResult {
        total_assets,
        total_liabilities,
        net_zakatable_wealth,
        zakat_amount,
        nisab_threshold,
        zakat_rate,
        is_payable,
        calculation_date,
        calculation_trace: trace,
    })
}

/// Sum of every zakatable asset, with metal prices resolved against defaults.
pub fn total_assets(assets: &AssetSnapshot, settings: &CalculationSettings) -> Result<Decimal, ZakatError> {
    asset_total_with_trace(assets, settings, &mut Vec::new())
}

pub fn total_liabilities(liabilities: &LiabilitySnapshot) -> Result<Decimal, ZakatError> {
    liability_total_with_trace(liabilities, &mut Vec::new())
}

/// The explicit threshold from settings, or one derived from the current
/// metal prices of the snapshot.
pub fn nisab_threshold(assets: &AssetSnapshot, settings: &CalculationSettings) -> Result<Decimal, ZakatError> {
    let metals = &assets.precious_metals;
    settings.effective_nisab(
        resolved_price(&metals.gold, settings.defaults.gold_price_per_gram),
        resolved_price(&metals.silver, settings.defaults.silver_price_per_gram),
    )
}

fn overflow(what: &str) -> ZakatError {
    ZakatError::CalculationError(format!("Overflow calculating {}", what))
}

fn resolved_price(holding: &MetalHolding, default: Decimal) -> Decimal {
    positive(holding.price_per_gram).unwrap_or(default)
}

fn metal_value(holding: &MetalHolding, default_price: Decimal, label: &str) -> Result<Decimal, ZakatError> {
    holding
        .weight_in_grams()?
        .checked_mul(resolved_price(holding, default_price))
        .ok_or_else(|| overflow(&format!("{} value", label.to_lowercase())))
}

fn sum(label: &str, values: &[Decimal]) -> Result<Decimal, ZakatError> {
    values.iter().try_fold(Decimal::ZERO, |total, value| {
        total.checked_add(*value).ok_or_else(|| overflow(label))
    })
}

fn asset_total_with_trace(
    assets: &AssetSnapshot,
    settings: &CalculationSettings,
    trace: &mut Vec<CalculationStep>,
) -> Result<Decimal, ZakatError> {
    let metals = &assets.precious_metals;
    let real_estate = &assets.real_estate;
    let investments = &assets.investments;
    let business = &assets.business;

    let property_value = if real_estate.personal_use {
        trace.push(CalculationStep::info("Personal-use property excluded"));
        Decimal::ZERO
    } else {
        real_estate.investment_properties
    };

    let components = [
        ("Cash", sum("cash", &[assets.cash.physical, assets.cash.bank])?),
        ("Gold", metal_value(&metals.gold, settings.defaults.gold_price_per_gram, "Gold")?),
        ("Silver", metal_value(&metals.silver, settings.defaults.silver_price_per_gram, "Silver")?),
        (
            "Investments",
            sum("investments", &[investments.stocks, investments.mutual_funds, investments.bonds])?,
        ),
        ("Retirement (liquid)", assets.retirement.liquid_value),
        ("Investment Property", property_value),
        ("Rental Income", real_estate.rental_income),
        (
            "Business Assets",
            sum(
                "business assets",
                &[business.inventory, business.accounts_receivable, business.cash_in_accounts],
            )?,
        ),
    ];

    for (label, value) in &components {
        trace.push(CalculationStep::add(*label, *value));
    }
    let values: Vec<Decimal> = components.iter().map(|(_, value)| *value).collect();
    sum("total assets", &values)
}

fn liability_total_with_trace(
    liabilities: &LiabilitySnapshot,
    trace: &mut Vec<CalculationStep>,
) -> Result<Decimal, ZakatError> {
    let components = [
        ("Debts", liabilities.debts),
        ("Pending Taxes", liabilities.pending_taxes),
        ("Other Obligations", liabilities.obligations),
    ];

    for (label, value) in &components {
        trace.push(CalculationStep::subtract(*label, *value));
    }
    let values: Vec<Decimal> = components.iter().map(|(_, value)| *value).collect();
    sum("total liabilities", &values)
}
