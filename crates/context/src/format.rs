//! Rendering typed values for a spoken script.

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use outreach_config::{DigitGrouping, LocaleConfig};
use outreach_core::value::{Money, TypedValue};
use std::fmt::Write;
use tracing::warn;

const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";

/// Formats values per the configured locale rules.
#[derive(Debug, Clone)]
pub struct ValueFormatter {
    locale: LocaleConfig,
}

impl ValueFormatter {
    pub fn new(mut locale: LocaleConfig) -> Self {
        if StrftimeItems::new(&locale.date_format).any(|i| matches!(i, Item::Error)) {
            warn!(format = %locale.date_format, "Invalid date format, using ISO dates");
            locale.date_format = FALLBACK_DATE_FORMAT.to_string();
        }
        Self { locale }
    }

    pub fn locale(&self) -> &LocaleConfig {
        &self.locale
    }

    pub fn format(&self, value: &TypedValue) -> String {
        match value {
            TypedValue::Text(s) | TypedValue::SingleSelect(s) => s.clone(),
            TypedValue::Number(n) => format_number(*n),
            TypedValue::Currency(m) => self.format_money(*m),
            TypedValue::Date(d) => self.format_date(*d),
            TypedValue::Boolean(true) => self.locale.true_word.clone(),
            TypedValue::Boolean(false) => self.locale.false_word.clone(),
        }
    }

    pub fn format_money(&self, money: Money) -> String {
        let sign = if money.is_negative() { "-" } else { "" };
        let whole = group_digits(money.whole().unsigned_abs(), self.locale.digit_grouping);
        if self.locale.trim_whole_currency && money.cents() == 0 {
            format!("{sign}{}{whole}", self.locale.currency_symbol)
        } else {
            format!("{sign}{}{whole}.{:02}", self.locale.currency_symbol, money.cents())
        }
    }

    pub fn format_date(&self, date: NaiveDate) -> String {
        let mut out = String::new();
        if write!(out, "{}", date.format(&self.locale.date_format)).is_err() {
            return date.format(FALLBACK_DATE_FORMAT).to_string();
        }
        out
    }
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self::new(LocaleConfig::default())
    }
}

fn format_number(n: f64) -> String {
    if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// `1234567` → `12,34,567` (Indian) or `1,234,567` (Western).
pub fn group_digits(n: u64, grouping: DigitGrouping) -> String {
    let digits = n.to_string();
    if digits.len() <= 3 {
        return digits;
    }
    let (head, tail) = digits.split_at(digits.len() - 3);
    let group = match grouping {
        DigitGrouping::Indian => 2,
        DigitGrouping::Western => 3,
    };

    let mut groups = Vec::new();
    let mut end = head.len();
    while end > 0 {
        let start = end.saturating_sub(group);
        groups.push(&head[start..end]);
        end = start;
    }
    groups.reverse();
    format!("{},{tail}", groups.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indian_and_western_grouping() {
        assert_eq!(group_digits(999, DigitGrouping::Indian), "999");
        assert_eq!(group_digits(50_000, DigitGrouping::Indian), "50,000");
        assert_eq!(group_digits(1_234_567, DigitGrouping::Indian), "12,34,567");
        assert_eq!(group_digits(1_234_567, DigitGrouping::Western), "1,234,567");
        assert_eq!(group_digits(100_000, DigitGrouping::Western), "100,000");
    }

    #[test]
    fn currency_with_symbol() {
        let f = ValueFormatter::default();
        assert_eq!(f.format_money(Money::from_minor(5_000_000)), "₹50,000");
        assert_eq!(f.format_money(Money::from_minor(5_000_050)), "₹50,000.50");
        assert_eq!(f.format_money(Money::from_minor(-50_000)), "-₹500");

        let mut locale = LocaleConfig::default();
        locale.trim_whole_currency = false;
        locale.currency_symbol = "$".into();
        locale.digit_grouping = DigitGrouping::Western;
        let f = ValueFormatter::new(locale);
        assert_eq!(f.format_money(Money::from_minor(123_456_700)), "$1,234,567.00");
    }

    #[test]
    fn dates_and_booleans() {
        let f = ValueFormatter::default();
        let d = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(f.format(&TypedValue::Date(d)), "5 March 2025");
        assert_eq!(f.format(&TypedValue::Boolean(true)), "yes");
        assert_eq!(f.format(&TypedValue::Boolean(false)), "no");
    }

    #[test]
    fn bad_date_format_falls_back() {
        let mut locale = LocaleConfig::default();
        locale.date_format = "%Q".into();
        let f = ValueFormatter::new(locale);
        let d = NaiveDate::from_ymd_opt(2025, 3, 5).unwrap();
        assert_eq!(f.format_date(d), "2025-03-05");
    }

    #[test]
    fn numbers_drop_trailing_zero() {
        assert_eq!(format_number(12.0), "12");
        assert_eq!(format_number(92.5), "92.5");
        assert_eq!(format_number(-3.0), "-3");
    }
}
