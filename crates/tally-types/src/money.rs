use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::TypeError;

/// Largest amount a single invoice or payment may carry.
///
/// Far below `Decimal::MAX`, so per-client totals stay representable.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_1000, 0xE8, 0, false, 0);

/// Parse a decimal amount from command text.
///
/// Accepts plain and scientific notation (`200`, `200.50`, `2e2`).
pub fn parse_amount(raw: &str) -> Result<Decimal, TypeError> {
    let trimmed = raw.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|_| TypeError::InvalidAmount(raw.to_string()))
}

/// Strip trailing zeros so that equal amounts render identically
/// (`400.00` and `400` both become `400`).
pub fn normalize_money(amount: Decimal) -> Decimal {
    amount.normalize()
}
