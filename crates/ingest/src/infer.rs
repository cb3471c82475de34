//! Column type inference from sampled values.

use outreach_core::field::FieldType;
use outreach_schema::validate::{parse_currency, parse_date, parse_number};
use serde_json::Value;
use std::collections::BTreeSet;

/// Guess a field type from non-empty samples.
///
/// numeric-looking → number (currency when a marker was needed to parse),
/// date-looking → date, exactly two distinct values → boolean, else text.
pub fn infer_type(samples: &[String]) -> FieldType {
    if samples.is_empty() {
        return FieldType::Text;
    }

    let as_value = |s: &String| Value::String(s.clone());
    if samples.iter().all(|s| parse_number(&as_value(s)).is_some()) {
        return FieldType::Number;
    }
    if samples.iter().all(|s| parse_currency(&as_value(s)).is_some()) {
        return FieldType::Currency;
    }
    if samples.iter().all(|s| parse_date(s).is_some()) {
        return FieldType::Date;
    }

    let distinct: BTreeSet<String> = samples.iter().map(|s| s.trim().to_lowercase()).collect();
    if distinct.len() == 2 {
        return FieldType::Boolean;
    }
    FieldType::Text
}

/// Whether a column inferred as `inferred` can plausibly feed a field of `declared` type.
pub fn type_compatible(inferred: FieldType, declared: FieldType) -> bool {
    match inferred {
        FieldType::Number | FieldType::Currency => declared.is_numeric() || declared == FieldType::Text,
        FieldType::Date => matches!(declared, FieldType::Date | FieldType::Text),
        FieldType::Boolean => matches!(
            declared,
            FieldType::Boolean | FieldType::SingleSelect | FieldType::Text
        ),
        FieldType::Text | FieldType::SingleSelect => {
            matches!(declared, FieldType::Text | FieldType::SingleSelect)
        }
    }
}

/// Strength of the match between an inferred and a declared type, used to
/// break score ties: 2 exact, 1 compatible, 0 incompatible.
pub fn type_affinity(inferred: FieldType, declared: FieldType) -> u8 {
    if inferred == declared || (inferred.is_numeric() && declared.is_numeric()) {
        2
    } else if type_compatible(inferred, declared) {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn numbers_inferred() {
        assert_eq!(infer_type(&s(&["50000", "1,200", "3.5"])), FieldType::Number);
    }

    #[test]
    fn currency_when_marked() {
        assert_eq!(infer_type(&s(&["₹50,000", "₹1,200"])), FieldType::Currency);
    }

    #[test]
    fn dates_inferred() {
        assert_eq!(infer_type(&s(&["2025-03-05", "12/04/2025"])), FieldType::Date);
    }

    #[test]
    fn two_values_inferred_boolean() {
        assert_eq!(infer_type(&s(&["Yes", "No", "yes"])), FieldType::Boolean);
    }

    #[test]
    fn otherwise_text() {
        assert_eq!(infer_type(&s(&["Pune", "Delhi", "Mumbai"])), FieldType::Text);
        assert_eq!(infer_type(&[]), FieldType::Text);
    }

    #[test]
    fn numeric_column_prefers_numeric_fields() {
        assert_eq!(type_affinity(FieldType::Number, FieldType::Currency), 2);
        assert_eq!(type_affinity(FieldType::Number, FieldType::Text), 1);
        assert_eq!(type_affinity(FieldType::Number, FieldType::Date), 0);
    }
}
