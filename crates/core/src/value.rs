//! Typed attribute values.
//!
//! Every stored value is tagged with the type it was validated against
//! at write time. Values under names the schema does not know are kept
//! verbatim as [`AttributeValue::Unschematized`].

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::field::FieldType;

/// A currency amount held as an integer count of hundredths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Money {
    minor: i64,
}

impl Money {
    pub fn from_minor(minor: i64) -> Self {
        Self { minor }
    }

    /// Round to two decimal places, half away from zero.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let scaled = (value * 100.0).round();
        if scaled.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Self {
            minor: scaled as i64,
        })
    }

    pub fn minor(&self) -> i64 {
        self.minor
    }

    pub fn whole(&self) -> i64 {
        self.minor / 100
    }

    pub fn cents(&self) -> i64 {
        (self.minor % 100).abs()
    }

    pub fn is_negative(&self) -> bool {
        self.minor < 0
    }

    pub fn as_f64(&self) -> f64 {
        self.minor as f64 / 100.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let sign = if self.is_negative() { "-" } else { "" };
        write!(f, "{sign}{}.{:02}", self.whole().abs(), self.cents())
    }
}

impl From<Money> for String {
    fn from(m: Money) -> Self {
        m.to_string()
    }
}

impl TryFrom<String> for Money {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.trim()
            .parse::<f64>()
            .ok()
            .and_then(Money::from_f64)
            .ok_or_else(|| format!("invalid currency amount '{s}'"))
    }
}

/// A value that passed validation against a field of the matching type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TypedValue {
    Text(String),
    Number(f64),
    Currency(Money),
    Date(NaiveDate),
    Boolean(bool),
    SingleSelect(String),
}

impl TypedValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Text(_) => FieldType::Text,
            Self::Number(_) => FieldType::Number,
            Self::Currency(_) => FieldType::Currency,
            Self::Date(_) => FieldType::Date,
            Self::Boolean(_) => FieldType::Boolean,
            Self::SingleSelect(_) => FieldType::SingleSelect,
        }
    }

    /// The untyped form, suitable for re-validation against another definition.
    pub fn to_raw(&self) -> serde_json::Value {
        match self {
            Self::Text(s) | Self::SingleSelect(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Self::Currency(m) => serde_json::Value::String(m.to_string()),
            Self::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
            Self::Boolean(b) => serde_json::Value::Bool(*b),
        }
    }
}

/// One entry of a record's attribute map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum AttributeValue {
    Typed(TypedValue),
    /// Stored under a name no active field defines. Kept verbatim.
    Unschematized(serde_json::Value),
}

impl AttributeValue {
    pub fn typed(&self) -> Option<&TypedValue> {
        match self {
            Self::Typed(v) => Some(v),
            Self::Unschematized(_) => None,
        }
    }

    pub fn is_unschematized(&self) -> bool {
        matches!(self, Self::Unschematized(_))
    }

    pub fn to_raw(&self) -> serde_json::Value {
        match self {
            Self::Typed(v) => v.to_raw(),
            Self::Unschematized(raw) => raw.clone(),
        }
    }
}

impl From<TypedValue> for AttributeValue {
    fn from(v: TypedValue) -> Self {
        Self::Typed(v)
    }
}

/// Render a raw JSON scalar as plain text. `None` for null, arrays and objects.
pub fn raw_scalar_text(raw: &serde_json::Value) -> Option<String> {
    match raw {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
