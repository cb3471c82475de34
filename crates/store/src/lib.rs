//! Storage backends for Outreach.
//!
//! Both backends keep everything in process memory behind a tokio
//! `RwLock`. They implement the `outreach_core::store` traits, so a
//! database-backed implementation can replace them without touching callers.

pub mod notes;
pub mod records;

pub use notes::InMemoryNoteRepository;
pub use records::InMemoryRecordStore;
