//! Mapping proposal: which header holds which field, and how sure we are.
//!
//! The mapper only proposes. Nothing it returns is applied to the record
//! store until the caller submits a [`ConfirmedMapping`](crate::ConfirmedMapping).

use outreach_config::IngestConfig;
use outreach_core::error::{MappingError, Result};
use outreach_core::field::{normalize_field_name, label_from_name, FieldType};
use outreach_core::similarity::{squash, tokenize};
use outreach_schema::SchemaSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::infer::{infer_type, type_affinity};
use crate::scoring::{check_matrix, FieldProfile, LexicalScorer, ScoreMatrix, ScoringRequest, ScoringStrategy};
use crate::table::Table;

/// Scores closer than this are treated as equal.
const TIE_EPSILON: f32 = 1e-4;
/// Alternatives listed per header.
const MAX_ALTERNATIVES: usize = 3;
/// Sample values echoed back per header.
const ECHOED_SAMPLES: usize = 3;

#[derive(Debug, Clone)]
pub struct MapperSettings {
    pub confidence_threshold: f32,
    pub high_confidence: f32,
    pub suggestion_floor: f32,
    pub sample_rows: usize,
    pub scoring_timeout: Duration,
    pub key_aliases: Vec<String>,
}

impl From<&IngestConfig> for MapperSettings {
    fn from(cfg: &IngestConfig) -> Self {
        Self {
            confidence_threshold: cfg.confidence_threshold,
            high_confidence: cfg.high_confidence,
            suggestion_floor: cfg.suggestion_floor,
            sample_rows: cfg.sample_rows,
            scoring_timeout: Duration::from_millis(cfg.scoring_timeout_ms),
            key_aliases: cfg.key_aliases.clone(),
        }
    }
}

impl Default for MapperSettings {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub field: String,
    pub confidence: f32,
}

/// Why a header was not proposed for any field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnmappedReason {
    /// The column holds the record key; the caller handles it.
    KeySource,
    BelowThreshold,
    /// Several fields scored equally well.
    Ambiguous { candidates: Vec<String> },
    /// Another header won the same field with higher confidence.
    LostConflict { field: String, winner: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HeaderStatus {
    Proposed {
        field: String,
        confidence: f32,
        band: ConfidenceBand,
    },
    Unmapped {
        #[serde(flatten)]
        reason: UnmappedReason,
    },
    NewFieldSuggestion {
        name: String,
        label: String,
        #[serde(rename = "type")]
        field_type: FieldType,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderMapping {
    pub header: String,
    pub column: usize,
    #[serde(flatten)]
    pub status: HeaderStatus,
    pub inferred_type: FieldType,
    pub alternatives: Vec<Candidate>,
    pub samples: Vec<String>,
}

impl HeaderMapping {
    pub fn proposed_field(&self) -> Option<&str> {
        match &self.status {
            HeaderStatus::Proposed { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Per-header proposal for one table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingReport {
    pub headers: Vec<HeaderMapping>,
    pub key_header: Option<String>,
    /// Schema version the proposal was computed against.
    pub schema_version: u64,
    /// Strategy whose scores were used.
    pub strategy: String,
    pub row_count: usize,
    pub warnings: Vec<String>,
}

impl MappingReport {
    pub fn header(&self, header: &str) -> Option<&HeaderMapping> {
        self.headers.iter().find(|h| h.header == header)
    }
}

pub struct IngestionMapper {
    strategy: Arc<dyn ScoringStrategy>,
    fallback: Arc<LexicalScorer>,
    settings: MapperSettings,
}

impl IngestionMapper {
    /// A mapper that scores with the built-in lexical strategy only.
    pub fn lexical(synonyms: &[Vec<String>], settings: MapperSettings) -> Self {
        let lexical = Arc::new(LexicalScorer::new(synonyms));
        Self {
            strategy: lexical.clone(),
            fallback: lexical,
            settings,
        }
    }

    /// A mapper that consults `strategy` first and falls back to lexical scoring.
    pub fn with_strategy(strategy: Arc<dyn ScoringStrategy>, synonyms: &[Vec<String>], settings: MapperSettings) -> Self {
        Self {
            strategy,
            fallback: Arc::new(LexicalScorer::new(synonyms)),
            settings,
        }
    }

    pub fn settings(&self) -> &MapperSettings {
        &self.settings
    }

    /// Header that looks like the record key, if any.
    pub fn detect_key_header(&self, table: &Table) -> Option<String> {
        let aliases: Vec<String> = self.settings.key_aliases.iter().map(|a| squash(a)).collect();
        table
            .headers
            .iter()
            .find(|h| {
                let whole = squash(h);
                aliases.contains(&whole) || tokenize(h).iter().any(|t| aliases.contains(t))
            })
            .cloned()
    }

    /// Propose a mapping for every header of `table`.
    pub async fn propose(&self, table: &Table, schema: &SchemaSnapshot, key_header: Option<&str>) -> Result<MappingReport> {
        let mut warnings = Vec::new();

        let key_header = match key_header {
            Some(h) => {
                if table.column(h).is_none() {
                    return Err(MappingError::UnknownHeader(h.to_string()).into());
                }
                Some(h.to_string())
            }
            None => self.detect_key_header(table),
        };
        if key_header.is_none() {
            warnings.push("no record key column given or detected; name one before committing".to_string());
        }

        let candidates: Vec<(usize, &String)> = table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| Some(h.as_str()) != key_header.as_deref())
            .collect();

        let request = ScoringRequest {
            headers: candidates.iter().map(|(_, h)| (*h).clone()).collect(),
            fields: schema.fields.iter().map(FieldProfile::from).collect(),
        };
        let (strategy, scores) = self.score(&request, &mut warnings).await;

        let mut headers = Vec::with_capacity(table.headers.len());
        for (column, header) in table.headers.iter().enumerate() {
            let samples = table.samples(column, self.settings.sample_rows);
            let inferred_type = infer_type(&samples);
            let echoed = samples.iter().take(ECHOED_SAMPLES).cloned().collect();

            if Some(header.as_str()) == key_header.as_deref() {
                headers.push(HeaderMapping {
                    header: header.clone(),
                    column,
                    status: HeaderStatus::Unmapped {
                        reason: UnmappedReason::KeySource,
                    },
                    inferred_type,
                    alternatives: Vec::new(),
                    samples: echoed,
                });
                continue;
            }

            let row = candidates
                .iter()
                .position(|(c, _)| *c == column)
                .and_then(|i| scores.get(i));
            let ranked = rank(row.map(Vec::as_slice).unwrap_or(&[]), schema, inferred_type);
            let status = self.classify(header, &ranked, inferred_type);
            let alternatives = ranked
                .iter()
                .filter(|r| r.score > 0.0)
                .take(MAX_ALTERNATIVES)
                .map(|r| Candidate {
                    field: schema.fields[r.field].name.clone(),
                    confidence: r.score,
                })
                .collect();

            headers.push(HeaderMapping {
                header: header.clone(),
                column,
                status,
                inferred_type,
                alternatives,
                samples: echoed,
            });
        }

        resolve_conflicts(&mut headers);

        let proposed = headers.iter().filter(|h| h.proposed_field().is_some()).count();
        info!(
            headers = headers.len(),
            proposed,
            strategy = %strategy,
            schema_version = schema.version,
            "Mapping proposed"
        );

        Ok(MappingReport {
            headers,
            key_header,
            schema_version: schema.version,
            strategy,
            row_count: table.len(),
            warnings,
        })
    }

    /// Run the configured strategy under a deadline; fall back to lexical
    /// scoring on error, timeout or malformed output.
    async fn score(&self, request: &ScoringRequest, warnings: &mut Vec<String>) -> (String, ScoreMatrix) {
        let name = self.strategy.name().to_string();
        if request.fields.is_empty() || request.headers.is_empty() {
            return (name, vec![Vec::new(); request.headers.len()]);
        }

        let outcome = tokio::time::timeout(self.settings.scoring_timeout, self.strategy.score(request)).await;
        let failure = match outcome {
            Ok(Ok(matrix)) => match check_matrix(&name, request, matrix) {
                Ok(matrix) => return (name, matrix),
                Err(e) => e.to_string(),
            },
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!(
                "scoring strategy '{name}' timed out after {} ms",
                self.settings.scoring_timeout.as_millis()
            ),
        };

        warn!(strategy = %name, reason = %failure, "Scoring strategy failed, using lexical fallback");
        warnings.push(format!("{failure}; fell back to lexical scoring"));
        (
            self.fallback.name().to_string(),
            self.fallback.score_sync(request),
        )
    }

    fn band(&self, score: f32) -> ConfidenceBand {
        if score >= self.settings.high_confidence {
            ConfidenceBand::High
        } else if score >= self.settings.confidence_threshold {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }

    fn classify(&self, header: &str, ranked: &[Ranked], inferred: FieldType) -> HeaderStatus {
        let tied = leaders(ranked);
        let best = match tied.first() {
            Some(best) if best.score >= self.settings.suggestion_floor => *best,
            _ => return new_field_suggestion(header, inferred),
        };

        if best.score < self.settings.confidence_threshold {
            return HeaderStatus::Unmapped {
                reason: UnmappedReason::BelowThreshold,
            };
        }

        if tied.len() > 1 {
            debug!(header, candidates = tied.len(), "Ambiguous header");
            return HeaderStatus::Unmapped {
                reason: UnmappedReason::Ambiguous {
                    candidates: tied.iter().map(|r| r.name.clone()).collect(),
                },
            };
        }

        HeaderStatus::Proposed {
            field: best.name.clone(),
            confidence: best.score,
            band: self.band(best.score),
        }
    }
}

struct Ranked {
    field: usize,
    name: String,
    score: f32,
    affinity: u8,
}

/// Candidates by descending score; equal scores ordered by type affinity.
fn rank(scores: &[f32], schema: &SchemaSnapshot, inferred: FieldType) -> Vec<Ranked> {
    let mut ranked: Vec<Ranked> = scores
        .iter()
        .zip(&schema.fields)
        .enumerate()
        .map(|(i, (&score, def))| Ranked {
            field: i,
            name: def.name.clone(),
            score,
            affinity: type_affinity(inferred, def.field_type),
        })
        .collect();
    order_candidates(&mut ranked);
    ranked
}

/// Strict total order: score, then type affinity, then schema position.
fn order_candidates(ranked: &mut [Ranked]) {
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.affinity.cmp(&a.affinity))
            .then(a.field.cmp(&b.field))
    });
}

/// Candidates within [`TIE_EPSILON`] of the top score that share the best
/// type affinity among them, in rank order. More than one means ambiguous.
fn leaders(ranked: &[Ranked]) -> Vec<&Ranked> {
    let Some(top) = ranked.first() else {
        return Vec::new();
    };
    let near: Vec<&Ranked> = ranked
        .iter()
        .take_while(|r| top.score - r.score < TIE_EPSILON)
        .collect();
    let affinity = near.iter().map(|r| r.affinity).max().unwrap_or(0);
    near.into_iter().filter(|r| r.affinity == affinity).collect()
}

fn new_field_suggestion(header: &str, inferred: FieldType) -> HeaderStatus {
    let slug = tokenize(header).join("_");
    let name = match normalize_field_name(&slug) {
        Ok(name) => name,
        Err(_) => format!("field_{slug}"),
    };
    HeaderStatus::NewFieldSuggestion {
        label: label_from_name(&name),
        name,
        field_type: inferred,
    }
}

/// If two headers propose the same field, the higher confidence keeps it
/// (earlier column on a tie); the others become unmapped.
fn resolve_conflicts(headers: &mut [HeaderMapping]) {
    let mut winners: HashMap<String, (usize, f32)> = HashMap::new();
    for (i, h) in headers.iter().enumerate() {
        if let HeaderStatus::Proposed { field, confidence, .. } = &h.status {
            let entry = winners.entry(field.clone()).or_insert((i, *confidence));
            if *confidence > entry.1 {
                *entry = (i, *confidence);
            }
        }
    }

    let names: Vec<String> = headers.iter().map(|h| h.header.clone()).collect();
    for (i, h) in headers.iter_mut().enumerate() {
        let HeaderStatus::Proposed { field, .. } = &h.status else {
            continue;
        };
        if let Some(&(winner, _)) = winners.get(field) {
            if winner != i {
                h.status = HeaderStatus::Unmapped {
                    reason: UnmappedReason::LostConflict {
                        field: field.clone(),
                        winner: names[winner].clone(),
                    },
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use outreach_core::field::FieldSpec;
    use outreach_schema::FieldRegistry;

    fn ranked(field: usize, score: f32, affinity: u8) -> Ranked {
        Ranked {
            field,
            name: format!("f{field}"),
            score,
            affinity,
        }
    }

    #[test]
    fn near_equal_scores_order_strictly() {
        let mut candidates = vec![
            ranked(0, 0.5, 1),
            ranked(1, 0.50012, 0),
            ranked(2, 0.50006, 2),
            ranked(3, 0.2, 2),
        ];
        order_candidates(&mut candidates);
        let order: Vec<usize> = candidates.iter().map(|r| r.field).collect();
        assert_eq!(order, vec![1, 2, 0, 3]);
    }

    #[test]
    fn near_tie_prefers_type_affinity() {
        let mut candidates = vec![ranked(0, 0.80002, 0), ranked(1, 0.8, 2), ranked(2, 0.6, 2)];
        order_candidates(&mut candidates);
        let tied = leaders(&candidates);
        assert_eq!(tied.len(), 1);
        assert_eq!(tied[0].field, 1);

        let mut candidates = vec![ranked(0, 0.8, 1), ranked(1, 0.80001, 1)];
        order_candidates(&mut candidates);
        assert_eq!(leaders(&candidates).len(), 2);
    }

    async fn schema() -> SchemaSnapshot {
        let reg = FieldRegistry::new();
        reg.define(FieldSpec::new("student_name", FieldType::Text).required())
            .await
            .unwrap();
        reg.define(FieldSpec::new("scholarship_amount", FieldType::Currency))
            .await
            .unwrap();
        reg.snapshot().await
    }

    fn mapper() -> IngestionMapper {
        let cfg = IngestConfig::default();
        IngestionMapper::lexical(&cfg.synonyms, MapperSettings::from(&cfg))
    }

    fn table(headers: &[&str], rows: &[&[&str]]) -> Table {
        Table::new(
            headers.iter().map(|h| h.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn proposes_name_award_and_leaves_phone_to_caller() {
        let t = table(&["Name", "Phone", "Award"], &[&["Rahul Sharma", "9876543210", "50000"]]);
        let report = mapper().propose(&t, &schema().await, None).await.unwrap();

        assert_eq!(report.key_header.as_deref(), Some("Phone"));
        assert_eq!(
            report.header("Phone").unwrap().status,
            HeaderStatus::Unmapped {
                reason: UnmappedReason::KeySource
            }
        );

        match &report.header("Name").unwrap().status {
            HeaderStatus::Proposed { field, band, .. } => {
                assert_eq!(field, "student_name");
                assert_eq!(*band, ConfidenceBand::High);
            }
            other => panic!("unexpected {other:?}"),
        }

        let award = report.header("Award").unwrap();
        assert_eq!(award.inferred_type, FieldType::Number);
        match &award.status {
            HeaderStatus::Proposed { field, band, .. } => {
                assert_eq!(field, "scholarship_amount");
                assert_eq!(*band, ConfidenceBand::Medium);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(report.schema_version, 2);
        assert_eq!(report.strategy, "lexical");
    }

    #[tokio::test]
    async fn unrelated_header_becomes_new_field_suggestion() {
        let t = table(&["Phone", "Exam Date"], &[&["1", "2025-03-05"]]);
        let report = mapper().propose(&t, &schema().await, None).await.unwrap();
        assert_eq!(
            report.header("Exam Date").unwrap().status,
            HeaderStatus::NewFieldSuggestion {
                name: "exam_date".into(),
                label: "Exam Date".into(),
                field_type: FieldType::Date,
            }
        );
    }

    #[tokio::test]
    async fn two_headers_one_field_higher_confidence_wins() {
        let t = table(&["Phone", "Name", "Student Name"], &[&["1", "a", "b"]]);
        let report = mapper().propose(&t, &schema().await, None).await.unwrap();

        assert_eq!(report.header("Student Name").unwrap().proposed_field(), Some("student_name"));
        assert_eq!(
            report.header("Name").unwrap().status,
            HeaderStatus::Unmapped {
                reason: UnmappedReason::LostConflict {
                    field: "student_name".into(),
                    winner: "Student Name".into(),
                }
            }
        );
    }

    #[tokio::test]
    async fn equal_candidates_are_ambiguous() {
        let reg = FieldRegistry::new();
        reg.define(FieldSpec::new("student_name", FieldType::Text)).await.unwrap();
        reg.define(FieldSpec::new("parent_name", FieldType::Text)).await.unwrap();
        let schema = reg.snapshot().await;

        let t = table(&["Phone", "Name"], &[&["1", "Priya"]]);
        let report = mapper().propose(&t, &schema, None).await.unwrap();
        match &report.header("Name").unwrap().status {
            HeaderStatus::Unmapped {
                reason: UnmappedReason::Ambiguous { candidates },
            } => assert_eq!(candidates.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn type_breaks_ties() {
        let reg = FieldRegistry::new();
        reg.define(FieldSpec::new("fee_note", FieldType::Text)).await.unwrap();
        reg.define(FieldSpec::new("fee_amount", FieldType::Currency)).await.unwrap();
        let schema = reg.snapshot().await;

        let t = table(&["Phone", "Fee"], &[&["1", "1200"], &["2", "900"]]);
        let report = mapper().propose(&t, &schema, None).await.unwrap();
        assert_eq!(report.header("Fee").unwrap().proposed_field(), Some("fee_amount"));
    }

    #[tokio::test]
    async fn explicit_key_header_must_exist() {
        let t = table(&["Name"], &[&["a"]]);
        let err = mapper().propose(&t, &schema().await, Some("Mobile")).await.unwrap_err();
        assert!(matches!(
            err,
            outreach_core::Error::Mapping(MappingError::UnknownHeader(_))
        ));
    }

    struct FailingScorer;

    #[async_trait]
    impl ScoringStrategy for FailingScorer {
        fn name(&self) -> &str {
            "remote"
        }

        async fn score(&self, _request: &ScoringRequest) -> Result<ScoreMatrix> {
            Err(MappingError::Scoring {
                strategy: "remote".into(),
                reason: "service unavailable".into(),
            }
            .into())
        }
    }

    struct SlowScorer;

    #[async_trait]
    impl ScoringStrategy for SlowScorer {
        fn name(&self) -> &str {
            "slow"
        }

        async fn score(&self, request: &ScoringRequest) -> Result<ScoreMatrix> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(vec![vec![1.0; request.fields.len()]; request.headers.len()])
        }
    }

    #[tokio::test]
    async fn failing_strategy_falls_back_with_warning() {
        let cfg = IngestConfig::default();
        let m = IngestionMapper::with_strategy(Arc::new(FailingScorer), &cfg.synonyms, MapperSettings::from(&cfg));
        let t = table(&["Phone", "Name"], &[&["1", "Priya"]]);
        let report = m.propose(&t, &schema().await, None).await.unwrap();
        assert_eq!(report.strategy, "lexical");
        assert!(report.warnings.iter().any(|w| w.contains("service unavailable")));
        assert_eq!(report.header("Name").unwrap().proposed_field(), Some("student_name"));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_strategy_times_out() {
        let cfg = IngestConfig::default();
        let m = IngestionMapper::with_strategy(Arc::new(SlowScorer), &cfg.synonyms, MapperSettings::from(&cfg));
        let t = table(&["Phone", "Name"], &[&["1", "Priya"]]);
        let report = m.propose(&t, &schema().await, None).await.unwrap();
        assert_eq!(report.strategy, "lexical");
        assert!(report.warnings.iter().any(|w| w.contains("timed out")));
    }
}
