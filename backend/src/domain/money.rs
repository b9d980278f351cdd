//! Currency formatting and parsing.
//!
//! Amounts are `f64` dollars kept at cent precision; everything that stores
//! or displays an amount goes through [`round_to_cents`].

use num_format::{Locale, ToFormattedString};

/// Round to two decimal places.
pub fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

/// Symbol used when none is configured
pub const DEFAULT_CURRENCY_SYMBOL: &str = "$";

/// Format as US dollars: `$1,234.56`, `-$12.00`.
pub fn format_currency(amount: f64) -> String {
    format_currency_with(amount, DEFAULT_CURRENCY_SYMBOL)
}

/// Format with an explicit currency symbol, en thousands separators and two
/// decimals.
pub fn format_currency_with(amount: f64, symbol: &str) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_formatted_string(&Locale::en);
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}{}{}.{:02}", sign, symbol, whole, cents % 100)
}

/// Short form for large amounts: `$1.2M`, `$4.3K`, otherwise [`format_currency`].
pub fn format_currency_compact(amount: f64) -> String {
    format_currency_compact_with(amount, DEFAULT_CURRENCY_SYMBOL)
}

pub fn format_currency_compact_with(amount: f64, symbol: &str) -> String {
    if amount >= 1_000_000.0 {
        format!("{}{:.1}M", symbol, amount / 1_000_000.0)
    } else if amount >= 1_000.0 {
        format!("{}{:.1}K", symbol, amount / 1_000.0)
    } else {
        format_currency_with(amount, symbol)
    }
}

/// Parse free-form user input. Everything except digits and `.` is dropped;
/// unparseable input reads as 0.
pub fn parse_currency_input(input: &str) -> f64 {
    let cleaned: String = input
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    match leading_float(&cleaned) {
        Some(value) => round_to_cents(value),
        None => 0.0,
    }
}

/// Text to pre-fill an amount field with; empty for zero.
pub fn format_currency_input(value: f64) -> String {
    if value == 0.0 {
        String::new()
    } else {
        format!("{:.2}", value)
    }
}

// "12.5.3" parses as 12.5, like a lenient float reader would.
fn leading_float(cleaned: &str) -> Option<f64> {
    let end = cleaned
        .char_indices()
        .filter(|(_, c)| *c == '.')
        .nth(1)
        .map(|(i, _)| i)
        .unwrap_or(cleaned.len());
    let candidate = &cleaned[..end];
    if candidate.is_empty() || candidate == "." {
        return None;
    }
    candidate.parse::<f64>().ok()
}
