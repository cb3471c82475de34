//! Ingestion Mapper for Outreach.
//!
//! Two steps, never merged: [`IngestionMapper::propose`] suggests which
//! header holds which field, and [`BatchCommitter::commit`] applies a
//! mapping the caller has confirmed.
//!
//! - [`table`]: CSV and pre-split tabular input
//! - [`scoring`]: pluggable confidence scoring with a lexical fallback
//! - [`infer`]: column type inference from samples
//! - [`mapper`]: per-header proposals
//! - [`commit`]: row-granular validation and writes

pub mod commit;
pub mod infer;
pub mod mapper;
pub mod scoring;
pub mod table;

pub use commit::{AcceptedRow, BatchCommitter, CommitReport, CommitTotals, ConfirmedMapping, HeaderAction, QuarantinedRow};
pub use infer::infer_type;
pub use mapper::{
    Candidate, ConfidenceBand, HeaderMapping, HeaderStatus, IngestionMapper, MapperSettings, MappingReport,
    UnmappedReason,
};
pub use scoring::{FieldProfile, LexicalScorer, ScoreMatrix, ScoringRequest, ScoringStrategy};
pub use table::{Table, TableRow};
