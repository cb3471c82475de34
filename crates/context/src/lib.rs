//! Context Construction Engine for Outreach.
//!
//! Turns a selection of context notes and one record into a spoken-script
//! text block. The merge is a pure function of its inputs, so results are
//! cached under a content hash and shared between concurrent callers.
//!
//! Pipeline, per [`ContextEngine::build`]:
//! 1. order notes (class, priority, override, creation)
//! 2. resolve `{{field}}` placeholders, omitting clauses whose value is missing
//! 3. drop later near-duplicate blocks
//! 4. fit the length budget

pub mod budget;
pub mod cache;
pub mod engine;
pub mod format;
pub mod handoff;
pub mod template;

pub use cache::{CacheStats, ContextCache};
pub use engine::{Construction, ConstructionInput, ContextEngine, EngineSettings};
pub use format::ValueFormatter;
pub use handoff::HandoffStore;
