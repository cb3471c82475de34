//! Field Schema Registry for Outreach.
//!
//! Operators define typed attributes at runtime; every record write is
//! validated against the active definitions.
//!
//! - [`FieldRegistry`]: define, update, deactivate, list and reorder fields
//! - [`SchemaSnapshot`]: a versioned view used to validate whole records
//! - [`validate`]: per-type value checks
//! - [`catalog`]: the field types and the rule keys each accepts

pub mod catalog;
pub mod registry;
pub mod snapshot;
pub mod validate;

pub use catalog::{field_type_catalog, FieldTypeInfo};
pub use registry::{FieldChange, FieldRegistry, FormSchema};
pub use snapshot::{AttributeCheck, SchemaSnapshot};
pub use validate::validate_value;
