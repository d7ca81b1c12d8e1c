use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::token::Token;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_currency, r"(?i)[₹$]|\brs\.?|\binr\b");
re!(re_number, r"-?\d+(?:\.\d+)?");
re!(re_numeric_only, r"^-?\d+(?:\.\d+)?$");

/// Strip currency markers, thousands separators, and whitespace, leaving
/// just the digit runs (and signs / decimal points) behind.
fn strip_currency(text: &str) -> String {
    let cleaned = re_currency().replace_all(text, "");
    cleaned
        .replace(',', "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Extract the first numeric value from a text cell.
///
/// Handles OCR cells like `₹1,234.50`, `Rs. 500` or `500.00/-`. Returns
/// `None` when no digit run is present — parse failures are dropped at the
/// field level, never raised.
pub fn extract_number(text: &str) -> Option<f64> {
    let cleaned = strip_currency(text);
    let m = re_number().find(&cleaned)?;
    Decimal::from_str(m.as_str()).ok()?.to_f64()
}

/// Whether the text is one number once currency decoration is removed.
pub fn is_numeric_text(text: &str) -> bool {
    let cleaned = strip_currency(text);
    !cleaned.is_empty() && re_numeric_only().is_match(&cleaned)
}

pub fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Space-join token texts in their stored order.
pub fn merge_token_text(tokens: &[Token]) -> String {
    tokens
        .iter()
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Percentage difference of `actual` from `expected`.
/// An expected value of zero counts as a 100% difference unless the actual
/// value is also zero.
pub fn arithmetic_difference_percent(expected: f64, actual: f64) -> f64 {
    if expected == 0.0 {
        return if actual != 0.0 { 100.0 } else { 0.0 };
    }
    ((actual - expected) / expected).abs() * 100.0
}

// ── Descriptive statistics (used by the anomaly battery) ─────────────────────

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (two-pass, no Bessel correction).
pub fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Exact median via sorted-array midpoint; the two middle values are
/// averaged on even counts. Returns 0.0 for an empty slice.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
