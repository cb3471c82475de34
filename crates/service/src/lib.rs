//! Outreach service facade.
//!
//! Wires the field registry, the record and note stores, the ingestion
//! mapper and the context engine into the three contracts callers use:
//! schema management, ingestion, and context construction.
//!
//! Every mutation publishes a [`DomainEvent`](outreach_core::DomainEvent)
//! on the shared [`EventBus`].

mod context;
mod ingest;
mod notes;
mod records;
mod schema;
pub mod seed;

use outreach_config::AppConfig;
use outreach_context::{ContextEngine, EngineSettings};
use outreach_core::event::EventBus;
use outreach_core::keylock::KeyLocks;
use outreach_core::store::{NoteRepository, RecordStore};
use outreach_ingest::{BatchCommitter, IngestionMapper, MapperSettings, ScoringStrategy};
use outreach_schema::FieldRegistry;
use outreach_store::{InMemoryNoteRepository, InMemoryRecordStore};
use std::sync::Arc;
use tracing::info;

pub use context::ContextRequest;
pub use records::{RecordWrite, Revalidation};
pub use schema::FieldUpdate;
pub use seed::{SeedRecord, SeedSummary, WorkspaceSeed};

/// Attempts at a validated write before giving up on a schema that keeps changing.
const WRITE_ATTEMPTS: usize = 3;

pub struct OutreachService {
    config: AppConfig,
    registry: FieldRegistry,
    records: Arc<dyn RecordStore>,
    notes: Arc<dyn NoteRepository>,
    mapper: IngestionMapper,
    committer: BatchCommitter,
    engine: ContextEngine,
    locks: Arc<KeyLocks>,
    events: Arc<EventBus>,
}

impl OutreachService {
    /// A service over in-memory stores.
    pub fn new(config: AppConfig) -> Self {
        Self::with_stores(
            config,
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(InMemoryNoteRepository::new()),
        )
    }

    pub fn with_stores(config: AppConfig, records: Arc<dyn RecordStore>, notes: Arc<dyn NoteRepository>) -> Self {
        let registry = FieldRegistry::new();
        let locks = Arc::new(KeyLocks::new());
        let mapper = IngestionMapper::lexical(&config.ingest.synonyms, MapperSettings::from(&config.ingest));
        let committer = BatchCommitter::new(
            registry.clone(),
            Arc::clone(&records),
            Arc::clone(&locks),
            config.ingest.commit_concurrency,
        );
        let engine = ContextEngine::new(EngineSettings::from(&config.context));

        info!(
            records = records.name(),
            notes = notes.name(),
            template_version = %config.context.template_version,
            "Outreach service initialized"
        );

        Self {
            config,
            registry,
            records,
            notes,
            mapper,
            committer,
            engine,
            locks,
            events: Arc::new(EventBus::default()),
        }
    }

    /// Score headers with `strategy`, keeping the lexical scorer as fallback.
    pub fn with_scoring_strategy(mut self, strategy: Arc<dyn ScoringStrategy>) -> Self {
        info!(strategy = strategy.name(), "Custom scoring strategy installed");
        self.mapper = IngestionMapper::with_strategy(
            strategy,
            &self.config.ingest.synonyms,
            MapperSettings::from(&self.config.ingest),
        );
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn engine(&self) -> &ContextEngine {
        &self.engine
    }
}
