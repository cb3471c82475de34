//! Pluggable header→field confidence scoring.
//!
//! The mapper only needs a score in `[0, 1]` per (header, field) pair; how
//! it is computed is up to the strategy. [`LexicalScorer`] is the built-in
//! deterministic strategy and the fallback when another strategy fails.

use async_trait::async_trait;
use outreach_core::error::{MappingError, Result};
use outreach_core::field::{FieldDefinition, FieldType};
use outreach_core::similarity::{levenshtein_ratio, squash, tokenize};
use std::collections::HashMap;

/// What a strategy knows about one candidate field.
#[derive(Debug, Clone)]
pub struct FieldProfile {
    pub name: String,
    pub label: String,
    pub aliases: Vec<String>,
    pub field_type: FieldType,
}

impl From<&FieldDefinition> for FieldProfile {
    fn from(def: &FieldDefinition) -> Self {
        Self {
            name: def.name.clone(),
            label: def.label.clone(),
            aliases: def.aliases.clone(),
            field_type: def.field_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoringRequest {
    pub headers: Vec<String>,
    pub fields: Vec<FieldProfile>,
}

/// `scores[h][f]`: confidence that header `h` holds field `f`.
pub type ScoreMatrix = Vec<Vec<f32>>;

#[async_trait]
pub trait ScoringStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn score(&self, request: &ScoringRequest) -> Result<ScoreMatrix>;
}

/// Check a strategy's output has one finite score per pair, clamped to `[0, 1]`.
pub fn check_matrix(strategy: &str, request: &ScoringRequest, matrix: ScoreMatrix) -> Result<ScoreMatrix> {
    let bad = |reason: String| MappingError::Scoring {
        strategy: strategy.to_string(),
        reason,
    };
    if matrix.len() != request.headers.len() {
        return Err(bad(format!(
            "expected {} rows of scores, got {}",
            request.headers.len(),
            matrix.len()
        ))
        .into());
    }
    matrix
        .into_iter()
        .map(|row| {
            if row.len() != request.fields.len() {
                return Err(bad(format!("expected {} scores per header, got {}", request.fields.len(), row.len())).into());
            }
            Ok(row
                .into_iter()
                .map(|s| if s.is_finite() { s.clamp(0.0, 1.0) } else { 0.0 })
                .collect())
        })
        .collect()
}

// Weights of the lexical signals.
const EXACT: f32 = 1.0;
const TOKEN_WEIGHT: f32 = 0.95;
const SYNONYM_WEIGHT: f32 = 0.7;
const EDIT_WEIGHT: f32 = 0.85;
/// Token pairs at least this close count as the same word.
const FUZZY_TOKEN: f32 = 0.8;

/// Deterministic scoring from names, labels, aliases and synonym groups.
///
/// For each spelling of a field the score is the best of:
/// exact match ignoring case and separators; token overlap; overlap via
/// synonym groups; and whole-string edit similarity.
pub struct LexicalScorer {
    /// token → ids of the synonym groups containing it
    groups: HashMap<String, Vec<usize>>,
}

impl LexicalScorer {
    pub fn new(synonyms: &[Vec<String>]) -> Self {
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for (id, group) in synonyms.iter().enumerate() {
            for word in group {
                for token in tokenize(word) {
                    groups.entry(token).or_default().push(id);
                }
            }
        }
        Self { groups }
    }

    fn same_word(a: &str, b: &str) -> bool {
        a == b || (a.len() >= 4 && b.len() >= 4 && levenshtein_ratio(a, b) >= FUZZY_TOKEN)
    }

    fn synonyms(&self, a: &str, b: &str) -> bool {
        match (self.groups.get(a), self.groups.get(b)) {
            (Some(ga), Some(gb)) => ga.iter().any(|g| gb.contains(g)),
            _ => false,
        }
    }

    /// Coverage-weighted overlap: mostly how much of the header is
    /// explained, partly how much of the candidate.
    fn overlap(header: &[String], candidate: &[String], matches: impl Fn(&str, &str) -> bool) -> f32 {
        if header.is_empty() || candidate.is_empty() {
            return 0.0;
        }
        let hits_h = header
            .iter()
            .filter(|h| candidate.iter().any(|c| matches(h.as_str(), c.as_str())))
            .count();
        let hits_c = candidate
            .iter()
            .filter(|c| header.iter().any(|h| matches(h.as_str(), c.as_str())))
            .count();
        let header_cov = hits_h as f32 / header.len() as f32;
        let cand_cov = hits_c as f32 / candidate.len() as f32;
        0.85 * header_cov + 0.15 * cand_cov
    }

    /// Score one header against one spelling.
    pub fn score_pair(&self, header: &str, candidate: &str) -> f32 {
        let hs = squash(header);
        let cs = squash(candidate);
        if hs.is_empty() || cs.is_empty() {
            return 0.0;
        }
        if hs == cs {
            return EXACT;
        }

        let ht = tokenize(header);
        let ct = tokenize(candidate);
        let direct = Self::overlap(&ht, &ct, Self::same_word);
        let synonym = Self::overlap(&ht, &ct, |a, b| Self::same_word(a, b) || self.synonyms(a, b));
        let edit = levenshtein_ratio(&hs, &cs);

        (TOKEN_WEIGHT * direct)
            .max(SYNONYM_WEIGHT * synonym)
            .max(EDIT_WEIGHT * edit)
    }

    pub fn score_field(&self, header: &str, field: &FieldProfile) -> f32 {
        std::iter::once(field.name.as_str())
            .chain(std::iter::once(field.label.as_str()))
            .chain(field.aliases.iter().map(String::as_str))
            .map(|spelling| self.score_pair(header, spelling))
            .fold(0.0, f32::max)
    }

    pub fn score_sync(&self, request: &ScoringRequest) -> ScoreMatrix {
        request
            .headers
            .iter()
            .map(|h| request.fields.iter().map(|f| self.score_field(h, f)).collect())
            .collect()
    }
}

#[async_trait]
impl ScoringStrategy for LexicalScorer {
    fn name(&self) -> &str {
        "lexical"
    }

    async fn score(&self, request: &ScoringRequest) -> Result<ScoreMatrix> {
        Ok(self.score_sync(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> LexicalScorer {
        LexicalScorer::new(&[
            vec!["amount".into(), "award".into(), "money".into()],
            vec!["phone".into(), "mobile".into()],
        ])
    }

    fn profile(name: &str, label: &str, field_type: FieldType) -> FieldProfile {
        FieldProfile {
            name: name.into(),
            label: label.into(),
            aliases: Vec::new(),
            field_type,
        }
    }

    #[test]
    fn exact_spelling_scores_one() {
        let s = scorer();
        assert_eq!(s.score_pair("Student Name", "student_name"), 1.0);
        assert_eq!(s.score_pair("studentName", "student_name"), 1.0);
    }

    #[test]
    fn partial_header_scores_high() {
        let s = scorer();
        let score = s.score_field("Name", &profile("student_name", "Student Name", FieldType::Text));
        assert!(score >= 0.85, "got {score}");
    }

    #[test]
    fn synonym_scores_medium() {
        let s = scorer();
        let score = s.score_field(
            "Award",
            &profile("scholarship_amount", "Scholarship Amount", FieldType::Currency),
        );
        assert!((0.5..0.85).contains(&score), "got {score}");
    }

    #[test]
    fn unrelated_scores_low() {
        let s = scorer();
        let score = s.score_field("City", &profile("scholarship_amount", "Scholarship Amount", FieldType::Currency));
        assert!(score < 0.3, "got {score}");
    }

    #[test]
    fn typo_tolerated() {
        let s = scorer();
        let score = s.score_pair("Scholarshp Amount", "scholarship_amount");
        assert!(score >= 0.85, "got {score}");
    }

    #[test]
    fn aliases_count() {
        let s = scorer();
        let mut p = profile("test_score", "Test Score", FieldType::Number);
        assert!(s.score_field("ANTHE Marks", &p) < 0.5);
        p.aliases.push("ANTHE Marks".into());
        assert_eq!(s.score_field("ANTHE Marks", &p), 1.0);
    }

    #[test]
    fn matrix_shape_checked() {
        let req = ScoringRequest {
            headers: vec!["a".into()],
            fields: vec![profile("a", "A", FieldType::Text)],
        };
        assert!(check_matrix("x", &req, vec![]).is_err());
        let m = check_matrix("x", &req, vec![vec![f32::NAN]]).unwrap();
        assert_eq!(m[0][0], 0.0);
        let m = check_matrix("x", &req, vec![vec![1.7]]).unwrap();
        assert_eq!(m[0][0], 1.0);
    }
}
