//! # Outreach Core
//!
//! Domain types, traits, and error definitions for the dynamic schema and
//! context construction engine. This crate has **no framework
//! dependencies**: it defines the model every other crate builds on.
//!
//! ## Layout
//!
//! - [`field`] / [`value`]: the dynamic schema vocabulary and typed values
//! - [`record`] / [`note`]: the entities the stores hold
//! - [`context`]: the constructed script artifact and its provenance
//! - [`report`] / [`error`]: structured validation reports and the error taxonomy
//! - [`store`]: storage traits, implemented in `outreach-store`
//! - [`similarity`] / [`hash`]: shared text and hashing helpers
//! - [`event`]: domain events
//! - [`keylock`]: per-key async locks for write serialization and single-flight

pub mod context;
pub mod error;
pub mod event;
pub mod field;
pub mod hash;
pub mod keylock;
pub mod note;
pub mod record;
pub mod report;
pub mod similarity;
pub mod store;
pub mod value;

// Re-export key types at crate root for ergonomics
pub use context::{ConstructedContext, LengthBudget, NoteFate, NoteProvenance, Provenance};
pub use error::{
    ConflictError, EntityKind, Error, MappingError, Result, Rule, SchemaError, StoreError,
    ValidationError,
};
pub use event::{DomainEvent, EventBus};
pub use keylock::KeyLocks;
pub use field::{FieldDefinition, FieldPatch, FieldSpec, FieldType, ValidationRules};
pub use note::{
    ContextNote, ContextSelection, NoteClass, NoteFilter, NotePatch, NoteSpec, SelectionEntry,
};
pub use record::{Attributes, Record, RecordFilter, RecordStatus, UpsertOutcome};
pub use report::{Issue, Severity, Subject, ValidationReport};
pub use store::{NoteRepository, RecordStore};
pub use value::{AttributeValue, Money, TypedValue};
