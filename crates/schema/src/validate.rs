//! Value validation against a single field definition, plus the checks a
//! definition itself must pass before it is registered.

use chrono::NaiveDate;
use outreach_core::error::{Rule, SchemaError, ValidationError};
use outreach_core::field::{FieldDefinition, FieldType, ValidationRules};
use outreach_core::value::{Money, TypedValue};
use serde_json::Value;

use crate::catalog;

/// Accepted textual date layouts, tried in order. Ambiguous slash dates are day-first.
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d", "%d %B %Y"];

/// Validate `raw` against `def`.
///
/// `Ok(None)` means the value is empty and the field is optional: the
/// attribute is treated as absent. Nothing is coerced beyond the type's own
/// parsing (currency rounding to hundredths is part of the type).
pub fn validate_value(def: &FieldDefinition, raw: &Value) -> Result<Option<TypedValue>, ValidationError> {
    let fail = |rule: Rule, reason: String| ValidationError::new(&def.name, rule, reason);

    if is_empty(raw) {
        if def.required {
            return Err(fail(Rule::Required, format!("{} is required", def.label)));
        }
        return Ok(None);
    }

    let rules = &def.validation_rules;
    let value = match def.field_type {
        FieldType::Text => {
            let text = scalar_text(raw)
                .ok_or_else(|| fail(Rule::Type, format!("{} must be text", def.label)))?;
            check_text(&text, rules).map_err(|(rule, reason)| fail(rule, format!("{} {reason}", def.label)))?;
            TypedValue::Text(text)
        }
        FieldType::Number => {
            let n = parse_number(raw)
                .ok_or_else(|| fail(Rule::Type, format!("{} must be a valid number", def.label)))?;
            check_range(n, rules).map_err(|(rule, reason)| fail(rule, format!("{} {reason}", def.label)))?;
            if let Some(places) = rules.precision {
                if !within_precision(n, places) {
                    return Err(fail(
                        Rule::Precision,
                        format!("{} allows at most {places} decimal places", def.label),
                    ));
                }
            }
            TypedValue::Number(n)
        }
        FieldType::Currency => {
            let money = parse_currency(raw)
                .ok_or_else(|| fail(Rule::Type, format!("{} must be a valid amount", def.label)))?;
            if money.is_negative() && !rules.allow_negative {
                return Err(fail(Rule::NonNegative, format!("{} cannot be negative", def.label)));
            }
            check_range(money.as_f64(), rules)
                .map_err(|(rule, reason)| fail(rule, format!("{} {reason}", def.label)))?;
            TypedValue::Currency(money)
        }
        FieldType::Date => {
            let date = raw
                .as_str()
                .and_then(parse_date)
                .ok_or_else(|| fail(Rule::Type, format!("{} must be a valid date (YYYY-MM-DD)", def.label)))?;
            if let Some(min) = rules.min_date {
                if date < min {
                    return Err(fail(Rule::DateRange, format!("{} must be on or after {min}", def.label)));
                }
            }
            if let Some(max) = rules.max_date {
                if date > max {
                    return Err(fail(Rule::DateRange, format!("{} must be on or before {max}", def.label)));
                }
            }
            TypedValue::Date(date)
        }
        FieldType::Boolean => {
            let b = parse_bool(raw)
                .ok_or_else(|| fail(Rule::Type, format!("{} must be true or false", def.label)))?;
            TypedValue::Boolean(b)
        }
        FieldType::SingleSelect => {
            let choice = scalar_text(raw).unwrap_or_default();
            match def.options.iter().find(|o| **o == choice) {
                Some(option) => TypedValue::SingleSelect(option.clone()),
                None => {
                    return Err(fail(
                        Rule::Options,
                        format!("{} must be one of: {}", def.label, def.options.join(", ")),
                    ));
                }
            }
        }
    };
    Ok(Some(value))
}

/// Null, or a string that is blank after trimming.
pub fn is_empty(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

fn scalar_text(raw: &Value) -> Option<String> {
    outreach_core::value::raw_scalar_text(raw).map(|s| s.trim().to_string())
}

fn check_text(text: &str, rules: &ValidationRules) -> Result<(), (Rule, String)> {
    let len = text.chars().count();
    if let Some(min) = rules.min_length {
        if len < min {
            return Err((Rule::MinLength, format!("must be at least {min} characters")));
        }
    }
    if let Some(max) = rules.max_length {
        if len > max {
            return Err((Rule::MaxLength, format!("must be at most {max} characters")));
        }
    }
    if let Some(pattern) = &rules.pattern {
        let re = regex_lite::Regex::new(pattern)
            .map_err(|_| (Rule::Pattern, format!("has an unusable pattern '{pattern}'")))?;
        if !re.is_match(text) {
            return Err((Rule::Pattern, format!("does not match pattern '{pattern}'")));
        }
    }
    Ok(())
}

fn check_range(n: f64, rules: &ValidationRules) -> Result<(), (Rule, String)> {
    if let Some(min) = rules.min {
        if n < min {
            return Err((Rule::Min, format!("must be at least {min}")));
        }
    }
    if let Some(max) = rules.max {
        if n > max {
            return Err((Rule::Max, format!("must be at most {max}")));
        }
    }
    Ok(())
}

fn within_precision(n: f64, places: u32) -> bool {
    let scaled = n * 10f64.powi(places as i32);
    (scaled - scaled.round()).abs() <= 1e-9 * scaled.abs().max(1.0)
}

/// Parse a plain number. Thousands separators are tolerated.
pub fn parse_number(raw: &Value) -> Option<f64> {
    let n = match raw {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Parse an amount, tolerating a leading currency marker and separators.
pub fn parse_currency(raw: &Value) -> Option<Money> {
    match raw {
        Value::Number(n) => n.as_f64().and_then(Money::from_f64),
        Value::String(s) => {
            let mut text = s.trim();
            for marker in ["INR", "Rs.", "Rs", "rs.", "rs", "₹", "$", "€", "£"] {
                if let Some(rest) = text.strip_prefix(marker) {
                    text = rest.trim_start();
                    break;
                }
            }
            let cleaned: String = text.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
            cleaned.parse::<f64>().ok().and_then(Money::from_f64)
        }
        _ => None,
    }
}

/// Parse a date in any of the accepted layouts.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Only the two canonical truth values are accepted.
pub fn parse_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.trim().eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.trim().eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Check that a definition's options and rules are coherent for its type.
pub fn check_definition(
    name: &str,
    field_type: FieldType,
    options: &[String],
    rules: &ValidationRules,
) -> Result<(), SchemaError> {
    let invalid = |reason: String| SchemaError::InvalidRules {
        name: name.to_string(),
        reason,
    };

    if field_type == FieldType::SingleSelect {
        if options.is_empty() {
            return Err(SchemaError::MissingOptions {
                name: name.to_string(),
            });
        }
        if options.iter().any(|o| o.trim().is_empty()) {
            return Err(invalid("options cannot be blank".into()));
        }
        for (i, option) in options.iter().enumerate() {
            if options[..i].contains(option) {
                return Err(invalid(format!("option '{option}' is listed twice")));
            }
        }
    } else if !options.is_empty() {
        return Err(invalid(format!("options do not apply to {field_type} fields")));
    }

    let allowed = catalog::rule_keys(field_type);
    if let Some(key) = rules.keys().into_iter().find(|k| !allowed.contains(k)) {
        return Err(invalid(format!("rule '{key}' does not apply to {field_type} fields")));
    }

    if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
        if min > max {
            return Err(invalid("min_length exceeds max_length".into()));
        }
    }
    if let (Some(min), Some(max)) = (rules.min, rules.max) {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(invalid("min must be a finite number not above max".into()));
        }
    }
    if let (Some(min), Some(max)) = (rules.min_date, rules.max_date) {
        if min > max {
            return Err(invalid("min_date is after max_date".into()));
        }
    }
    if let Some(pattern) = &rules.pattern {
        regex_lite::Regex::new(pattern).map_err(|e| invalid(format!("pattern does not compile: {e}")))?;
    }
    Ok(())
}
