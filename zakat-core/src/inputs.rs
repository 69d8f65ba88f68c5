use crate::types::ZakatError;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Trait for converting various types into `Decimal` for Zakat calculations.
///
/// This lets callers pass `i32`, `f64`, `&str`, etc. directly into the
/// snapshot builders without wrapping them in `dec!()` or `Decimal::from()`.
pub trait IntoZakatDecimal {
    fn into_zakat_decimal(self) -> Result<Decimal, ZakatError>;
}

impl IntoZakatDecimal for Decimal {
    fn into_zakat_decimal(self) -> Result<Decimal, ZakatError> {
        Ok(self)
    }
}

macro_rules! impl_into_zakat_decimal_int {
    ($($t:ty),*) => {
        $(
            impl IntoZakatDecimal for $t {
                fn into_zakat_decimal(self) -> Result<Decimal, ZakatError> {
                    Ok(Decimal::from(self))
                }
            }
        )*
    };
}

impl_into_zakat_decimal_int!(i32, u32, i64, u64, isize, usize);

macro_rules! impl_into_zakat_decimal_float {
    ($($t:ty),*) => {
        $(
            impl IntoZakatDecimal for $t {
                fn into_zakat_decimal(self) -> Result<Decimal, ZakatError> {
                    // Parse through the shortest round-trip representation so
                    // 0.85_f64 becomes exactly 0.85 rather than its binary expansion.
                    Decimal::from_str(&self.to_string()).map_err(|_| {
                        ZakatError::invalid_input("number", format!("Invalid float value: {}", self))
                    })
                }
            }
        )*
    };
}

impl_into_zakat_decimal_float!(f32, f64);

impl IntoZakatDecimal for &str {
    fn into_zakat_decimal(self) -> Result<Decimal, ZakatError> {
        Decimal::from_str(self.trim()).map_err(|e| {
            ZakatError::invalid_input("number", format!("Invalid string format: {}", e))
        })
    }
}

impl IntoZakatDecimal for String {
    fn into_zakat_decimal(self) -> Result<Decimal, ZakatError> {
        self.as_str().into_zakat_decimal()
    }
}

/// Treats `None` and non-positive values alike as "not provided".
pub(crate) fn positive(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| *v > Decimal::ZERO)
}
