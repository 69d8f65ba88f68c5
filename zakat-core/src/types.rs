use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The kind of arithmetic a [`CalculationStep`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Add,
    Subtract,
    Compare,
    Rate,
    Result,
    Info,
}

impl Operation {
    fn symbol(&self) -> &'static str {
        match self {
            Operation::Add => "+",
            Operation::Subtract => "-",
            Operation::Compare => "?",
            Operation::Rate => "x",
            Operation::Result => "=",
            Operation::Info => " ",
        }
    }
}

/// Represents a single step in the Zakat calculation process.
///
/// The engine records one step per asset category so callers can show the
/// user exactly how the final amount was derived.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CalculationStep {
    /// Human-readable description of what this step does.
    pub description: String,
    /// The value at this step (if applicable).
    pub amount: Option<Decimal>,
    pub operation: Operation,
}

impl CalculationStep {
    fn with(operation: Operation, description: impl Into<String>, amount: Option<Decimal>) -> Self {
        Self {
            description: description.into(),
            amount,
            operation,
        }
    }

    pub fn add(description: impl Into<String>, amount: Decimal) -> Self {
        Self::with(Operation::Add, description, Some(amount))
    }

    pub fn subtract(description: impl Into<String>, amount: Decimal) -> Self {
        Self::with(Operation::Subtract, description, Some(amount))
    }

    pub fn compare(description: impl Into<String>, amount: Decimal) -> Self {
        Self::with(Operation::Compare, description, Some(amount))
    }

    pub fn rate(description: impl Into<String>, rate: Decimal) -> Self {
        Self::with(Operation::Rate, description, Some(rate))
    }

    pub fn result(description: impl Into<String>, amount: Decimal) -> Self {
        Self::with(Operation::Result, description, Some(amount))
    }

    pub fn info(description: impl Into<String>) -> Self {
        Self::with(Operation::Info, description, None)
    }
}

/// Outcome of a single Zakat computation.
///
/// A plain value object: produced fresh on every call to
/// [`compute`](crate::engine::compute) and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ZakatResult {
    pub total_assets: Decimal,
    pub total_liabilities: Decimal,
    /// `total_assets - total_liabilities`. Not clamped, may be negative.
    pub net_zakatable_wealth: Decimal,
    pub zakat_amount: Decimal,
    pub nisab_threshold: Decimal,
    /// The rate that was applied (after defaulting).
    pub zakat_rate: Decimal,
    /// Whether net wealth strictly exceeded the Nisab threshold.
    pub is_payable: bool,
    pub calculation_date: DateTime<Utc>,
    /// Step-by-step trace of how this result was derived.
    pub calculation_trace: Vec<CalculationStep>,
}

impl ZakatResult {
    /// Returns the Zakat due formatted as a string with 2 decimal places.
    pub fn format_amount(&self) -> String {
        use rust_decimal::RoundingStrategy;
        let rounded = self
            .zakat_amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        format!("{:.2}", rounded)
    }

    /// Returns a concise status string.
    /// Format: "{Payable/Exempt} - Due: {Amount}"
    pub fn summary(&self) -> String {
        let status = if self.is_payable { "Payable" } else { "Exempt" };
        format!("{} - Due: {}", status, self.format_amount())
    }

    /// Generates a human-readable explanation of the Zakat calculation.
    ///
    /// Each trace step is printed with its operation symbol so the user can
    /// follow how `zakat_amount` was determined.
    pub fn explain(&self) -> String {
        use std::fmt::Write;
        let mut output = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(
            &mut output,
            "Zakat calculation ({}):",
            self.calculation_date.format("%Y-%m-%d %H:%M UTC")
        );
        let _ = writeln!(&mut output, "{:-<50}", "");

        let width = self
            .calculation_trace
            .iter()
            .map(|step| step.description.len())
            .max()
            .unwrap_or(20)
            .max(20);

        for step in &self.calculation_trace {
            match (step.operation, step.amount) {
                (Operation::Info, _) | (_, None) => {
                    let _ = writeln!(&mut output, "  INFO: {}", step.description);
                }
                (Operation::Rate, Some(amount)) => {
                    let _ = writeln!(
                        &mut output,
                        "  {:<width$} : {} {:>12.3}",
                        step.description,
                        step.operation.symbol(),
                        amount,
                    );
                }
                (operation, Some(amount)) => {
                    let _ = writeln!(
                        &mut output,
                        "  {:<width$} : {} {:>12.2}",
                        step.description,
                        operation.symbol(),
                        amount,
                    );
                }
            }
        }

        let _ = writeln!(&mut output, "{:-<50}", "");
        let _ = writeln!(
            &mut output,
            "Status: {}",
            if self.is_payable { "PAYABLE" } else { "EXEMPT" }
        );
        if self.is_payable {
            let _ = writeln!(&mut output, "Amount Due: {}", self.format_amount());
        }

        output
    }
}

impl std::fmt::Display for ZakatResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Net Wealth: {} | Nisab: {}",
            self.net_zakatable_wealth.round_dp(2),
            self.nisab_threshold.round_dp(2)
        )?;
        if self.is_payable {
            write!(f, "Status: PAYABLE ({} due)", self.format_amount())
        } else {
            write!(f, "Status: EXEMPT - Net wealth does not exceed Nisab")
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ZakatError {
    #[error("Invalid Input [{field}]: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Configuration Error: {0}")]
    ConfigurationError(String),

    #[error("Calculation Error: {0}")]
    CalculationError(String),

    #[error("Network Error: {0}")]
    NetworkError(String),

    #[error("Cache Error: {0}")]
    CacheError(String),
}

impl ZakatError {
    pub fn invalid_input(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ZakatError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
