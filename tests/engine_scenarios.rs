use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use zakat::prelude::*;

fn fixed_date() -> DateTime<Utc> {
    "2026-02-01T12:00:00Z".parse().unwrap()
}

#[test]
fn test_bank_balance_scenario() {
    let assets = AssetSnapshot::new().cash_bank(10_000).gold_price_per_gram(80);
    let result = compute(&assets, &LiabilitySnapshot::new(), &CalculationSettings::new()).unwrap();

    assert_eq!(result.nisab_threshold, dec!(6800));
    assert!(result.is_payable);
    assert_eq!(result.zakat_amount, dec!(250));
    assert_eq!(result.format_amount(), "250.00");
}

#[test]
fn test_fifty_grams_of_gold_is_exempt() {
    let assets = AssetSnapshot::new().gold_weight(50).gold_price_per_gram(80);
    let result = compute(&assets, &LiabilitySnapshot::new(), &CalculationSettings::new()).unwrap();

    assert_eq!(result.total_assets, dec!(4000));
    assert!(!result.is_payable);
    assert_eq!(result.zakat_amount, Decimal::ZERO);
}

#[test]
fn test_net_wealth_identity_holds_exactly() {
    let assets = AssetSnapshot::new()
        .cash_physical(dec!(1234.56))
        .cash_bank(dec!(7890.12))
        .stocks(dec!(333.33))
        .mutual_funds(dec!(0.01))
        .inventory(dec!(100.10));
    let liabilities = LiabilitySnapshot::new()
        .debts(dec!(999.99))
        .pending_taxes(dec!(0.33));
    let result = compute(&assets, &liabilities, &CalculationSettings::new()).unwrap();

    assert_eq!(
        result.total_assets - result.total_liabilities,
        result.net_zakatable_wealth
    );
    assert!(result.zakat_amount >= Decimal::ZERO);
}

#[test]
fn test_payable_iff_strictly_above_nisab() {
    let settings = CalculationSettings::new().with_nisab_threshold(5000).unwrap();
    for (cash, payable) in [(4999, false), (5000, false), (5001, true)] {
        let result = compute(
            &AssetSnapshot::new().cash_bank(cash),
            &LiabilitySnapshot::new(),
            &settings,
        )
        .unwrap();
        assert_eq!(result.is_payable, payable, "cash = {cash}");
        assert_eq!(result.zakat_amount > Decimal::ZERO, payable);
    }
}

#[test]
fn test_liabilities_can_push_wealth_below_nisab() {
    let assets = AssetSnapshot::new().cash_bank(8000).gold_price_per_gram(80);
    let liabilities = LiabilitySnapshot::new().debts(1500).obligations(200);
    let result = compute(&assets, &liabilities, &CalculationSettings::new()).unwrap();

    assert_eq!(result.net_zakatable_wealth, dec!(6300));
    assert!(!result.is_payable);
}

#[test]
fn test_same_inputs_same_result() {
    let assets = AssetSnapshot::new()
        .gold_weight(2)
        .gold_unit(WeightUnit::Ounce)
        .silver_weight(500)
        .retirement_liquid_value(15_000)
        .retirement_type("401k");
    let liabilities = LiabilitySnapshot::new().pending_taxes(1200);
    let settings = CalculationSettings::new().with_nisab_standard(NisabStandard::LowerOfTwo);

    let a = compute_at(&assets, &liabilities, &settings, fixed_date()).unwrap();
    let b = compute_at(&assets, &liabilities, &settings, fixed_date()).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_form_file_round_trip_through_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("household.toml");
    std::fs::write(
        &path,
        r#"
[assets.cash]
physical = 500
bank = 9500

[assets.real_estate]
investment_properties = 250000
rental_income = 6000
personal_use = true

[liabilities]
debts = 1000

[settings]
nisab_standard = "gold"
"#,
    )
    .unwrap();

    let form = ZakatForm::load(&path).unwrap();
    let result = compute(&form.assets, &form.liabilities, &form.settings).unwrap();

    // Default gold price of 75/g gives a Nisab of 6375.
    assert_eq!(result.total_assets, dec!(16000));
    assert_eq!(result.nisab_threshold, dec!(6375));
    assert_eq!(result.zakat_amount, dec!(375));
}

#[test]
fn test_result_serializes_trace_with_camel_case_operations() {
    let result = compute_at(
        &AssetSnapshot::new().cash_bank(10_000),
        &LiabilitySnapshot::new(),
        &CalculationSettings::new(),
        fixed_date(),
    )
    .unwrap();

    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains(r#""operation":"add""#));
    assert!(json.contains(r#""operation":"compare""#));
    assert!(json.contains("2026-02-01T12:00:00Z"));
}

#[test]
fn test_explain_mentions_status() {
    let result = compute(
        &AssetSnapshot::new().cash_bank(100),
        &LiabilitySnapshot::new(),
        &CalculationSettings::new(),
    )
    .unwrap();
    let explanation = result.explain();
    assert!(explanation.contains("Nisab Threshold"));
    assert!(explanation.contains("EXEMPT"));
}

#[test]
fn test_oversized_form_reports_calculation_error() {
    let form = ZakatForm::from_toml(
        r#"
[assets.cash]
bank = "79228162514264337593543950335"
physical = 1
"#,
    )
    .unwrap();
    form.assets.validate().unwrap();

    let err = compute(&form.assets, &form.liabilities, &form.settings).unwrap_err();
    assert!(matches!(err, ZakatError::CalculationError(_)));
}
