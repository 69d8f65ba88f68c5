//! Terminal rendering for rates and results.

use colored::Colorize;
use rust_decimal::Decimal;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use zakat_core::ZakatResult;
use zakat_core::types::Operation;
use zakat_providers::{MetalRateSnapshot, RateReport, RateSource};

#[derive(Tabled)]
struct RateRow {
    #[tabled(rename = "Metal")]
    metal: &'static str,
    #[tabled(rename = "Unit")]
    unit: &'static str,
    #[tabled(rename = "Price (USD)")]
    price: String,
}

#[derive(Tabled)]
struct StepRow {
    #[tabled(rename = "Step")]
    description: String,
    #[tabled(rename = "")]
    symbol: &'static str,
    #[tabled(rename = "Amount")]
    amount: String,
}

fn money(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn rate_rows(snapshot: &MetalRateSnapshot) -> Vec<RateRow> {
    let gold = &snapshot.gold;
    let silver = &snapshot.silver;
    let row = |metal, unit, price| RateRow {
        metal,
        unit,
        price: money(price),
    };
    vec![
        row("Gold", "gram", gold.per_gram),
        row("Gold", "troy ounce", gold.per_ounce),
        row("Gold", "kilogram", gold.per_kilogram),
        row("Gold", "tola", gold.per_tola),
        row("Gold 24K", "troy ounce", gold.karat_24),
        row("Gold 22K", "troy ounce", gold.karat_22),
        row("Gold 21K", "troy ounce", gold.karat_21),
        row("Gold 18K", "troy ounce", gold.karat_18),
        row("Silver", "gram", silver.per_gram),
        row("Silver", "troy ounce", silver.per_ounce),
        row("Silver", "kilogram", silver.per_kilogram),
        row("Silver", "tola", silver.per_tola),
    ]
}

pub fn source_label(source: RateSource) -> &'static str {
    match source {
        RateSource::Cache => "cached",
        RateSource::Live => "live",
        RateSource::Fallback => "fallback defaults",
    }
}

pub fn render_rates(report: &RateReport, heading: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{} ({}, updated {})\n",
        heading.bold(),
        source_label(report.source),
        report.last_updated().format("%Y-%m-%d %H:%M UTC")
    ));
    out.push_str(&Table::new(rate_rows(&report.snapshot)).with(Style::rounded()).to_string());
    out.push('\n');
    if let Some(error) = &report.error {
        out.push_str(&format!("{}\n", error.yellow()));
    }
    out
}

fn step_symbol(operation: Operation) -> &'static str {
    match operation {
        Operation::Add => "+",
        Operation::Subtract => "-",
        Operation::Compare => "vs",
        Operation::Rate => "x",
        Operation::Result => "=",
        Operation::Info => "",
    }
}

pub fn render_result(result: &ZakatResult) -> String {
    let rows: Vec<StepRow> = result
        .calculation_trace
        .iter()
        .map(|step| StepRow {
            description: step.description.clone(),
            symbol: step_symbol(step.operation),
            amount: match (step.operation, step.amount) {
                (Operation::Rate, Some(rate)) => format!("{}%", (rate * Decimal::ONE_HUNDRED).normalize()),
                (_, Some(amount)) => money(amount),
                (_, None) => String::new(),
            },
        })
        .collect();

    let status = if result.is_payable {
        format!("PAYABLE: {} due", result.format_amount()).green().bold()
    } else {
        "EXEMPT: net wealth does not exceed Nisab".cyan().bold()
    };

    format!(
        "{}\n{}\n",
        Table::new(rows).with(Style::rounded()),
        status
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use zakat_core::prelude::*;

    #[test]
    fn test_rates_table_lists_all_units() {
        colored::control::set_override(false);
        let report = RateReport {
            snapshot: MetalRateSnapshot::fallback(Utc::now()),
            source: RateSource::Fallback,
            error: Some(zakat_providers::FALLBACK_WARNING.to_string()),
        };
        let text = render_rates(&report, "Metal rates");

        assert!(text.contains("fallback defaults"));
        assert!(text.contains("80.38"));
        assert!(text.contains("2291.67"));
        assert!(text.contains("10.73"));
        assert!(text.contains(zakat_providers::FALLBACK_WARNING));
    }

    #[test]
    fn test_result_table_shows_rate_and_status() {
        colored::control::set_override(false);
        let result = compute(
            &AssetSnapshot::new().cash_bank(10_000).gold_price_per_gram(80),
            &LiabilitySnapshot::new(),
            &CalculationSettings::new(),
        )
        .unwrap();
        let text = render_result(&result);

        assert!(text.contains("2.5%"));
        assert!(text.contains("PAYABLE: 250.00 due"));
    }
}
