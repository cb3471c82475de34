//! Field definitions — the dynamic schema's vocabulary.
//!
//! A [`FieldDefinition`] names a typed, validated attribute. Names are
//! case-insensitive: they are normalized to lowercase snake case on the
//! way in, so `Student_Name` and `student_name` are the same field.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchemaError;

/// Maximum length of a field name.
pub const MAX_FIELD_NAME_LEN: usize = 64;

/// The value types a field can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Currency,
    Date,
    Boolean,
    #[serde(alias = "select")]
    SingleSelect,
}

impl FieldType {
    pub const ALL: [FieldType; 6] = [
        FieldType::Text,
        FieldType::Number,
        FieldType::Currency,
        FieldType::Date,
        FieldType::Boolean,
        FieldType::SingleSelect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Currency => "currency",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::SingleSelect => "single_select",
        }
    }

    /// Number and currency share a numeric representation.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number | Self::Currency)
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for FieldType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "number" => Ok(Self::Number),
            "currency" => Ok(Self::Currency),
            "date" => Ok(Self::Date),
            "boolean" | "bool" => Ok(Self::Boolean),
            "single_select" | "single-select" | "select" => Ok(Self::SingleSelect),
            other => Err(SchemaError::InvalidRules {
                name: other.to_string(),
                reason: "unknown field type".into(),
            }),
        }
    }
}

/// Type-specific validation rules. Keys that do not apply to a field's
/// type are rejected when the field is defined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationRules {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// Maximum decimal places for `number` fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u32>,
    /// Currency only: permit values below zero.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub allow_negative: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_date: Option<NaiveDate>,
}

impl ValidationRules {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Names of the rule keys that are set.
    pub fn keys(&self) -> Vec<&'static str> {
        let mut keys = Vec::new();
        if self.min_length.is_some() {
            keys.push("min_length");
        }
        if self.max_length.is_some() {
            keys.push("max_length");
        }
        if self.pattern.is_some() {
            keys.push("pattern");
        }
        if self.min.is_some() {
            keys.push("min");
        }
        if self.max.is_some() {
            keys.push("max");
        }
        if self.precision.is_some() {
            keys.push("precision");
        }
        if self.allow_negative {
            keys.push("allow_negative");
        }
        if self.min_date.is_some() {
            keys.push("min_date");
        }
        if self.max_date.is_some() {
            keys.push("max_date");
        }
        keys
    }
}

/// A named, typed attribute the schema recognizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Lowercase snake-case name, unique among active fields.
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    pub label: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default = "default_true")]
    pub visible_in_list: bool,

    /// Allowed values; required iff the type is single-select.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,

    #[serde(default, skip_serializing_if = "ValidationRules::is_empty")]
    pub validation_rules: ValidationRules,

    #[serde(default)]
    pub display_order: i32,

    #[serde(default = "default_true")]
    pub active: bool,

    /// Historical header spellings that mapped to this field.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Input for defining a new field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default = "default_true")]
    pub visible_in_list: bool,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub validation_rules: ValidationRules,
    #[serde(default)]
    pub display_order: Option<i32>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            label: None,
            required: false,
            visible_in_list: true,
            options: Vec::new(),
            validation_rules: ValidationRules::default(),
            display_order: None,
            aliases: Vec::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn rules(mut self, rules: ValidationRules) -> Self {
        self.validation_rules = rules;
        self
    }

    pub fn display_order(mut self, order: i32) -> Self {
        self.display_order = Some(order);
        self
    }
}

/// Partial update for an existing field. The name is immutable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldPatch {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_in_list: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<ValidationRules>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
}

/// Normalize a field name: trim, lowercase, spaces and dashes to `_`.
///
/// The result must start with a letter and contain only `[a-z0-9_]`.
pub fn normalize_field_name(raw: &str) -> Result<String, SchemaError> {
    let name: String = raw
        .trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_lowercase(),
        })
        .collect();

    let invalid = |reason: &str| SchemaError::InvalidName {
        name: raw.to_string(),
        reason: reason.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("name cannot be empty"));
    }
    if name.len() > MAX_FIELD_NAME_LEN {
        return Err(invalid("name is longer than 64 characters"));
    }
    if !name.starts_with(|c: char| c.is_ascii_lowercase()) {
        return Err(invalid("name must start with a letter"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(invalid("name may only contain letters, digits and underscores"));
    }
    Ok(name)
}

/// Turn `scholarship_amount` into `Scholarship Amount`.
pub fn label_from_name(name: &str) -> String {
    name.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_normalized() {
        assert_eq!(normalize_field_name("  Student Name ").unwrap(), "student_name");
        assert_eq!(normalize_field_name("Hostel-Fee").unwrap(), "hostel_fee");
    }

    #[test]
    fn bad_names_rejected() {
        assert!(normalize_field_name("").is_err());
        assert!(normalize_field_name("1st_rank").is_err());
        assert!(normalize_field_name("fee$").is_err());
        assert!(normalize_field_name(&"a".repeat(65)).is_err());
    }

    #[test]
    fn select_alias_parses() {
        let t: FieldType = serde_json::from_str("\"select\"").unwrap();
        assert_eq!(t, FieldType::SingleSelect);
        assert_eq!("single-select".parse::<FieldType>().unwrap(), FieldType::SingleSelect);
    }

    #[test]
    fn label_is_title_cased() {
        assert_eq!(label_from_name("scholarship_amount"), "Scholarship Amount");
    }

    #[test]
    fn rule_keys_listed() {
        let rules = ValidationRules {
            min: Some(0.0),
            allow_negative: true,
            ..Default::default()
        };
        assert_eq!(rules.keys(), vec!["min", "allow_negative"]);
    }
}
