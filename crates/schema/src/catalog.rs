//! Catalog of field types: what each means and which rule keys it accepts.

use outreach_core::field::FieldType;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct FieldTypeInfo {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub description: &'static str,
    pub rule_keys: &'static [&'static str],
    pub requires_options: bool,
}

/// Validation rule keys permitted for `field_type`.
pub fn rule_keys(field_type: FieldType) -> &'static [&'static str] {
    match field_type {
        FieldType::Text => &["min_length", "max_length", "pattern"],
        FieldType::Number => &["min", "max", "precision"],
        FieldType::Currency => &["min", "max", "allow_negative"],
        FieldType::Date => &["min_date", "max_date"],
        FieldType::Boolean | FieldType::SingleSelect => &[],
    }
}

fn description(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Text => "Free text, optionally bounded in length or matched against a pattern",
        FieldType::Number => "Numeric value with optional range and decimal precision",
        FieldType::Currency => "Monetary amount rounded to two decimals; negative only if allowed",
        FieldType::Date => "Calendar date (YYYY-MM-DD or DD/MM/YYYY) with optional range",
        FieldType::Boolean => "true or false",
        FieldType::SingleSelect => "One value from a fixed list of options",
    }
}

/// Every field type, in declaration order.
pub fn field_type_catalog() -> Vec<FieldTypeInfo> {
    FieldType::ALL
        .iter()
        .map(|&t| FieldTypeInfo {
            field_type: t,
            description: description(t),
            rule_keys: rule_keys(t),
            requires_options: t == FieldType::SingleSelect,
        })
        .collect()
}
