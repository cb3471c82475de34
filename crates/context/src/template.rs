//! Placeholder resolution with safe omission.
//!
//! A note body references fields as `{{field_name}}`. When a referenced value
//! is missing, the smallest enclosing unit is dropped: a trailing clause
//! (after `,` or `;`) when the placeholder sits there, otherwise the whole
//! sentence. Nothing is ever rendered with an empty gap.

use outreach_core::field::normalize_field_name;
use regex_lite::{Captures, Regex};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("valid placeholder regex")
});

/// Titles that end in `.` without ending a sentence.
const ABBREVIATIONS: &[&str] = &["Dr", "Mr", "Mrs", "Ms", "Prof", "St", "Sr", "Jr", "Smt", "Shri"];

/// A note body after substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    /// Fields whose values were substituted.
    pub used: BTreeSet<String>,
    /// Referenced fields that had no usable value.
    pub missing: BTreeSet<String>,
}

impl Rendered {
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Field names referenced by `body`, normalized, in order of first use.
pub fn placeholders(body: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in PLACEHOLDER_RE.captures_iter(body) {
        let name = placeholder_name(&caps);
        if !seen.contains(&name) {
            seen.push(name);
        }
    }
    seen
}

/// The normalized field name, or the marker as written when it names no
/// valid field. Such a marker never resolves, so it is always omitted.
fn placeholder_name(caps: &Captures<'_>) -> String {
    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    normalize_field_name(raw).unwrap_or_else(|_| caps.get(0).map(|m| m.as_str()).unwrap_or("{{}}").to_string())
}

/// Substitute placeholders using `lookup`, dropping clauses or sentences
/// whose values are missing.
pub fn render<F>(body: &str, lookup: F) -> Rendered
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = Rendered::default();
    let mut text = String::new();

    for sentence in split_sentences(body) {
        let names = placeholders(sentence.body);
        let missing: Vec<String> = names.iter().filter(|n| lookup(n).is_none()).cloned().collect();

        let kept = if missing.is_empty() {
            Some(sentence.body.to_string())
        } else {
            out.missing.extend(missing.iter().cloned());
            drop_clauses(sentence.body, &missing)
        };
        let Some(kept) = kept else {
            continue;
        };

        let substituted = PLACEHOLDER_RE.replace_all(&kept, |caps: &Captures<'_>| {
            let name = placeholder_name(caps);
            match lookup(&name) {
                Some(value) => {
                    out.used.insert(name);
                    value
                }
                None => String::new(),
            }
        });
        if substituted.trim().is_empty() {
            continue;
        }
        if !text.is_empty() && !text.ends_with(char::is_whitespace) {
            text.push(' ');
        }
        text.push_str(substituted.trim_end());
        text.push_str(sentence.terminator);
        text.push_str(sentence.trailing);
    }

    out.text = text.trim().to_string();
    out
}

struct Sentence<'a> {
    body: &'a str,
    terminator: &'a str,
    trailing: &'a str,
}

/// Split at runs of `.`, `!`, `?` followed by whitespace or the end.
fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    let mut sentences = Vec::new();
    let bytes = text.as_bytes();
    let is_term = |b: u8| matches!(b, b'.' | b'!' | b'?');
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if is_term(bytes[i]) {
            let mut end = i;
            while end < bytes.len() && is_term(bytes[end]) {
                end += 1;
            }
            let boundary = end == bytes.len() || bytes[end].is_ascii_whitespace();
            if boundary && !(end == i + 1 && bytes[i] == b'.' && ends_with_abbreviation(&text[start..i])) {
                let mut ws = end;
                while ws < bytes.len() && bytes[ws].is_ascii_whitespace() {
                    ws += 1;
                }
                sentences.push(Sentence {
                    body: &text[start..i],
                    terminator: &text[i..end],
                    trailing: &text[end..ws],
                });
                start = ws;
                i = ws;
                continue;
            }
            i = end;
            continue;
        }
        i += 1;
    }

    if start < text.len() {
        let rest = &text[start..];
        let body = rest.trim_end();
        if !body.is_empty() {
            sentences.push(Sentence {
                body,
                terminator: "",
                trailing: &rest[body.len()..],
            });
        }
    }
    sentences
}

fn ends_with_abbreviation(text: &str) -> bool {
    let word = text
        .rsplit(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("");
    ABBREVIATIONS.contains(&word)
}

/// Drop the clauses referencing `missing`. The leading clause carries the
/// sentence, so if it is affected the whole sentence goes.
fn drop_clauses(sentence: &str, missing: &[String]) -> Option<String> {
    let mut clauses: Vec<(&str, &str)> = Vec::new();
    let mut delim = "";
    let mut start = 0;
    for (i, c) in sentence.char_indices() {
        if c == ',' || c == ';' {
            clauses.push((delim, &sentence[start..i]));
            delim = &sentence[i..i + 1];
            start = i + 1;
        }
    }
    clauses.push((delim, &sentence[start..]));

    let references_missing = |clause: &str| placeholders(clause).iter().any(|n| missing.contains(n));

    let (_, first) = clauses.first()?;
    if references_missing(first) {
        return None;
    }
    let mut kept = String::new();
    for (i, (delim, clause)) in clauses.iter().enumerate() {
        if i > 0 && references_missing(clause) {
            continue;
        }
        kept.push_str(delim);
        kept.push_str(clause);
    }
    Some(kept.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(values: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = values
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn substitutes_present_values() {
        let r = render(
            "Congratulations {{student_name}} on qualifying!",
            lookup(&[("student_name", "Priya")]),
        );
        assert_eq!(r.text, "Congratulations Priya on qualifying!");
        assert!(r.used.contains("student_name"));
        assert!(r.missing.is_empty());
    }

    #[test]
    fn missing_value_drops_sentence() {
        let r = render(
            "Hostel is available. Hostel fees are {{hostel_fee}}. Mess is included.",
            lookup(&[]),
        );
        assert_eq!(r.text, "Hostel is available. Mess is included.");
        assert!(r.missing.contains("hostel_fee"));
    }

    #[test]
    fn missing_value_in_trailing_clause_drops_clause() {
        let r = render(
            "Your award is {{amount}}, payable by {{due_date}}.",
            lookup(&[("amount", "₹50,000")]),
        );
        assert_eq!(r.text, "Your award is ₹50,000.");
    }

    #[test]
    fn missing_value_in_leading_clause_drops_sentence() {
        let r = render("{{student_name}}, you have qualified.", lookup(&[]));
        assert!(r.is_empty());
    }

    #[test]
    fn whole_body_omitted() {
        let r = render("Hostel fees are {{hostel_fee}}.", lookup(&[]));
        assert!(r.is_empty());
    }

    #[test]
    fn placeholder_names_normalized() {
        assert_eq!(placeholders("{{ Student_Name }} and {{student_name}}"), vec!["student_name"]);
        let r = render("Hi {{ Student Name }}.", lookup(&[("student_name", "Asha")]));
        assert_eq!(r.text, "Hi Asha.");
    }

    #[test]
    fn decimals_do_not_split_sentences() {
        let r = render("Cutoff is 92.5 percent. Rank {{rank}}.", lookup(&[]));
        assert_eq!(r.text, "Cutoff is 92.5 percent.");
    }

    #[test]
    fn hyphenated_placeholder_resolves_to_field() {
        let r = render("Hi there. Fees are {{hostel-fee}}.", lookup(&[("hostel_fee", "₹12,000")]));
        assert_eq!(r.text, "Hi there. Fees are ₹12,000.");

        let r = render("Hi there. Fees are {{hostel-fee}}.", lookup(&[]));
        assert_eq!(r.text, "Hi there.");
        assert!(r.missing.contains("hostel_fee"));
    }

    #[test]
    fn malformed_markers_are_omitted() {
        let r = render(
            "Well done. Rank {{1st_rank}} secured. Empty {{}} marker. See you soon.",
            lookup(&[("1st_rank", "4")]),
        );
        assert_eq!(r.text, "Well done. See you soon.");
        assert!(!r.text.contains("{{"));
        assert!(r.missing.contains("{{1st_rank}}"));
        assert!(r.missing.contains("{{}}"));
    }

    #[test]
    fn abbreviations_do_not_split_sentences() {
        let r = render(
            "Hi {{student_name}}! Call Dr. Rao about {{hostel_fee}}.",
            lookup(&[("student_name", "Priya")]),
        );
        assert_eq!(r.text, "Hi Priya!");

        let r = render(
            "Call Dr. Rao at {{phone}}. Visit Mrs. Iyer at the office.",
            lookup(&[("phone", "98765")]),
        );
        assert_eq!(r.text, "Call Dr. Rao at 98765. Visit Mrs. Iyer at the office.");
    }
}
