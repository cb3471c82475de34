//! Domain event system — decoupled notification between components.
//!
//! Schema changes, batch commits and context constructions are published
//! here; subscribers (audit logs, dashboards) react without coupling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::trace;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    FieldDefined {
        name: String,
        schema_version: u64,
        timestamp: DateTime<Utc>,
    },

    /// A field changed; `affected_records` were flagged for revalidation.
    FieldUpdated {
        name: String,
        schema_version: u64,
        affected_records: usize,
        timestamp: DateTime<Utc>,
    },

    FieldDeactivated {
        name: String,
        schema_version: u64,
        timestamp: DateTime<Utc>,
    },

    BatchCommitted {
        accepted: usize,
        quarantined: usize,
        timestamp: DateTime<Utc>,
    },

    RecordWritten {
        key: String,
        created: bool,
        timestamp: DateTime<Utc>,
    },

    NoteChanged {
        note_id: String,
        operation: String, // "create", "update", "delete"
        timestamp: DateTime<Utc>,
    },

    ContextConstructed {
        record_key: String,
        context_hash: String,
        cached: bool,
        truncated: bool,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        if self.sender.send(Arc::new(event)).is_err() {
            trace!("Domain event published with no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
