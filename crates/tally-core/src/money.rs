//! Integer-cent currency helpers
//!
//! All monetary amounts in the system are stored and computed as whole cents
//! (`i64`). Floating point never touches currency arithmetic; floats only
//! appear at the AI adapter boundary, where model output is converted to
//! cents immediately.

use crate::error::{Error, Result};

/// Parse a decimal string like "12.34" or "12" into cents.
///
/// Accepts an optional leading `$` and at most two fractional digits.
/// A single fractional digit is treated as tenths ("1.5" -> 150).
pub fn parse_cents(s: &str) -> Result<i64> {
    let s = s.trim().trim_start_matches('$').trim();
    if s.is_empty() {
        return Err(Error::InvalidData("empty amount".to_string()));
    }

    let (sign, s) = match s.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, s),
    };

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if frac.len() > 2 {
        return Err(Error::InvalidData(format!(
            "amount has more than two decimal places: {}",
            s
        )));
    }

    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole
            .parse()
            .map_err(|_| Error::InvalidData(format!("invalid amount: {}", s)))?
    };

    let frac_cents: i64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<2}", frac);
        padded
            .parse()
            .map_err(|_| Error::InvalidData(format!("invalid amount: {}", s)))?
    };

    Ok(sign * (whole * 100 + frac_cents))
}

/// Format cents as a plain decimal string: 1234 -> "12.34".
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// Format cents for display with a dollar sign: 1234 -> "$12.34".
pub fn format_dollars(cents: i64) -> String {
    format!("${}", format_cents(cents))
}

/// Convert a float amount from model output into cents, rounding to the
/// nearest cent. Negative and non-finite values clamp to zero; extraction
/// output is untrusted.
pub fn cents_from_f64(amount: f64) -> i64 {
    if !amount.is_finite() || amount <= 0.0 {
        return 0;
    }
    (amount * 100.0).round() as i64
}

/// Percentage of a budget consumed, in tenths of a percent for exact
/// comparison: spent=7999, budget=10000 -> 799 (79.9%).
///
/// Threshold checks multiply through instead of dividing, so the
/// 79.99 + 0.02 = 80.01 >= 80% case is exact.
pub fn percentage_tenths(spent_cents: i64, budget_cents: i64) -> i64 {
    if budget_cents <= 0 {
        return 0;
    }
    spent_cents * 1000 / budget_cents
}

/// Display percentage with one decimal place: (8001, 10000) -> "80.0".
pub fn format_percentage(spent_cents: i64, budget_cents: i64) -> String {
    let tenths = percentage_tenths(spent_cents, budget_cents);
    format!("{}.{}", tenths / 10, tenths % 10)
}
