//! Raw dashboard strings to typed values.
//!
//! Everything scraped off the partner portals arrives decorated: "₹9,600",
//! "85.0%", "12.5 min", "N/A". Downstream sheet analysis wants plain numbers,
//! so all numeric fields funnel through [`normalize`] before a row is built.

use serde_json::Value;
use std::fmt;
use tracing::warn;

/// A scraped value after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedValue {
    Integer(i64),
    Float(f64),
    /// Field exists in the schema but no usable value was extracted.
    Missing,
    /// Non-numeric field carried through as-is (names, remarks, dates).
    Text(String),
}

/// What kind of decoration to expect on a raw value. Only used to give
/// normalization warnings some context; stripping is uniform regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitHint {
    None,
    Currency,
    Percent,
    Minutes,
}

impl fmt::Display for UnitHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "plain"),
            Self::Currency => write!(f, "currency"),
            Self::Percent => write!(f, "percent"),
            Self::Minutes => write!(f, "minutes"),
        }
    }
}

/// Convert a decorated raw string into a typed value.
///
/// Strips everything that is not an ASCII digit or a decimal point, which
/// discards currency glyphs, percent signs, thousands separators and unit
/// words in one pass. A value with no digits left is `Missing`; one decimal
/// point makes it a `Float`, otherwise an `Integer`. A malformed residue
/// (several decimal points, overflow) is reported as `Missing` rather than an
/// error, so one bad field never aborts a batch.
pub fn normalize(raw: &str, hint: UnitHint) -> NormalizedValue {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("n/a") {
        return NormalizedValue::Missing;
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return NormalizedValue::Missing;
    }

    if cleaned.contains('.') {
        match cleaned.parse::<f64>() {
            Ok(f) => NormalizedValue::Float(f),
            Err(_) => {
                warn!("could not parse {hint} value as number: {raw:?}");
                NormalizedValue::Missing
            }
        }
    } else {
        match cleaned.parse::<i64>() {
            Ok(i) => NormalizedValue::Integer(i),
            Err(_) => {
                warn!("could not parse {hint} value as number: {raw:?}");
                NormalizedValue::Missing
            }
        }
    }
}

/// Guess a unit hint from a metric label ("Total Spends" is currency, labels
/// with "%" are percentages, "Kitchen Prep Time" is minutes).
pub fn hint_for_label(label: &str) -> UnitHint {
    let lower = label.to_lowercase();
    if label.contains('%') || lower.contains("accuracy") || lower.contains("online") {
        UnitHint::Percent
    } else if lower.contains("spend") || lower.contains("value") || lower.contains("refund") {
        UnitHint::Currency
    } else if lower.contains("time") {
        UnitHint::Minutes
    } else {
        UnitHint::None
    }
}

impl Default for NormalizedValue {
    fn default() -> Self {
        Self::Missing
    }
}

impl NormalizedValue {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Cell representation for the tabular store. Numbers go out as JSON
    /// numbers so the interpreted append mode stores them as numerics;
    /// `Missing` goes out as the literal "N/A" the sheets have always used.
    pub fn to_cell(&self) -> Value {
        match self {
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => Value::from(*f),
            Self::Missing => Value::from("N/A"),
            Self::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Missing => write!(f, "N/A"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_with_thousands_separator_is_integer() {
        assert_eq!(
            normalize("₹9,600", UnitHint::Currency),
            NormalizedValue::Integer(9600)
        );
        assert_eq!(
            normalize("1,234", UnitHint::None),
            NormalizedValue::Integer(1234)
        );
    }

    #[test]
    fn percent_and_unit_suffixes_are_floats() {
        assert_eq!(
            normalize("85.0%", UnitHint::Percent),
            NormalizedValue::Float(85.0)
        );
        assert_eq!(
            normalize("12.5 min", UnitHint::Minutes),
            NormalizedValue::Float(12.5)
        );
        assert_eq!(normalize("12.5", UnitHint::None), NormalizedValue::Float(12.5));
    }

    #[test]
    fn missing_sentinels() {
        assert_eq!(normalize("", UnitHint::None), NormalizedValue::Missing);
        assert_eq!(normalize("N/A", UnitHint::None), NormalizedValue::Missing);
        assert_eq!(normalize("n/a", UnitHint::None), NormalizedValue::Missing);
        assert_eq!(normalize("Not found", UnitHint::None), NormalizedValue::Missing);
        assert_eq!(normalize("--", UnitHint::None), NormalizedValue::Missing);
    }

    #[test]
    fn malformed_residue_is_missing_not_an_error() {
        // Two decimal points survive stripping but fail the parse.
        assert_eq!(normalize("1.2.3", UnitHint::None), NormalizedValue::Missing);
    }

    #[test]
    fn display_round_trips_magnitude() {
        assert_eq!(normalize("₹9,600", UnitHint::Currency).to_string(), "9600");
        assert_eq!(normalize("12.5 min", UnitHint::Minutes).to_string(), "12.5");
    }

    #[test]
    fn cells_are_typed() {
        assert_eq!(NormalizedValue::Integer(9600).to_cell(), Value::from(9600));
        assert_eq!(NormalizedValue::Missing.to_cell(), Value::from("N/A"));
    }

    #[test]
    fn label_hints() {
        assert_eq!(hint_for_label("% of Bolt Orders"), UnitHint::Percent);
        assert_eq!(hint_for_label("Total Spends"), UnitHint::Currency);
        assert_eq!(hint_for_label("Kitchen Prep Time"), UnitHint::Minutes);
        assert_eq!(hint_for_label("Delivered Orders"), UnitHint::None);
    }
}
