//! The construction pipeline: order, resolve, de-duplicate, fit, cache.

use outreach_config::{ContextConfig, LocaleConfig};
use outreach_core::context::{ConstructedContext, LengthBudget, NoteFate, NoteProvenance, Provenance};
use outreach_core::hash::PartsHasher;
use outreach_core::keylock::KeyLocks;
use outreach_core::note::{ContextNote, ContextSelection};
use outreach_core::record::Record;
use outreach_core::similarity::block_similarity;
use outreach_core::value::AttributeValue;
use outreach_schema::SchemaSnapshot;
use std::cmp::Ordering as CmpOrdering;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::budget::{fit, Block, BlockOutcome};
use crate::cache::{CacheStats, ContextCache};
use crate::format::ValueFormatter;
use crate::handoff::HandoffStore;
use crate::template::render;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub template_version: String,
    /// Later blocks at least this similar to an earlier one are dropped.
    pub dedup_threshold: f32,
    pub default_budget: LengthBudget,
    pub separator: String,
    pub cache_capacity: usize,
    pub handoff_ttl: Duration,
    pub locale: LocaleConfig,
}

impl From<&ContextConfig> for EngineSettings {
    fn from(cfg: &ContextConfig) -> Self {
        Self {
            template_version: cfg.template_version.clone(),
            dedup_threshold: cfg.dedup_threshold,
            default_budget: LengthBudget::Chars(cfg.default_budget_chars),
            separator: cfg.paragraph_separator.clone(),
            cache_capacity: cfg.cache_capacity,
            handoff_ttl: Duration::from_secs(cfg.handoff_ttl_secs),
            locale: cfg.locale.clone(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&ContextConfig::default())
    }
}

/// Everything a construction depends on.
#[derive(Debug, Clone, Copy)]
pub struct ConstructionInput<'a> {
    pub record: &'a Record,
    /// The notes named by `selection`. Ids with no note here are skipped.
    pub notes: &'a [ContextNote],
    pub selection: &'a ContextSelection,
    pub schema: &'a SchemaSnapshot,
    /// Falls back to the configured default.
    pub budget: Option<LengthBudget>,
}

#[derive(Debug, Clone)]
pub struct Construction {
    pub context: Arc<ConstructedContext>,
    /// Served without recomputation.
    pub cached: bool,
}

/// A selected note in merge position.
struct Slot<'a> {
    note: &'a ContextNote,
    position: usize,
    order: Option<i32>,
}

/// Primary before secondary, then priority (desc), then explicit order
/// override (set before unset), then creation, then selection position.
fn merge_order(a: &Slot<'_>, b: &Slot<'_>) -> CmpOrdering {
    let by_override = match (a.order, b.order) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => CmpOrdering::Less,
        (None, Some(_)) => CmpOrdering::Greater,
        (None, None) => CmpOrdering::Equal,
    };
    a.note
        .class
        .cmp(&b.note.class)
        .then(b.note.priority.cmp(&a.note.priority))
        .then(by_override)
        .then(a.note.created_at.cmp(&b.note.created_at))
        .then(a.position.cmp(&b.position))
}

pub struct ContextEngine {
    settings: EngineSettings,
    formatter: ValueFormatter,
    cache: ContextCache,
    inflight: KeyLocks,
    handoff: HandoffStore,
    computations: AtomicU64,
}

impl ContextEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            formatter: ValueFormatter::new(settings.locale.clone()),
            cache: ContextCache::new(settings.cache_capacity),
            inflight: KeyLocks::new(),
            handoff: HandoffStore::new(settings.handoff_ttl),
            computations: AtomicU64::new(0),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Build (or fetch) the context and hand it off for the record.
    pub async fn construct(&self, input: ConstructionInput<'_>) -> Construction {
        let construction = self.resolve(input).await;
        self.handoff.put(Arc::clone(&construction.context)).await;
        info!(
            record_key = %construction.context.record_key,
            context_hash = %construction.context.context_hash,
            cached = construction.cached,
            truncated = construction.context.truncated,
            "Context constructed"
        );
        construction
    }

    /// Same as [`construct`](Self::construct) without the hand-off.
    pub async fn preview(&self, input: ConstructionInput<'_>) -> Construction {
        self.resolve(input).await
    }

    pub async fn handoff(&self, record_key: &str) -> Option<Arc<ConstructedContext>> {
        self.handoff.get(record_key).await
    }

    pub async fn cleanup_expired(&self) -> usize {
        self.handoff.cleanup_expired().await
    }

    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// How many constructions were actually computed (not served from cache).
    pub fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    /// Cache lookup with single-flight: concurrent callers for one hash
    /// wait for the first and share its result.
    async fn resolve(&self, input: ConstructionInput<'_>) -> Construction {
        let hash = self.context_hash(&input);
        if let Some(hit) = self.cache.get(&hash).await {
            return Construction {
                context: hit,
                cached: true,
            };
        }

        let _guard = self.inflight.acquire(&hash).await;
        if let Some(hit) = self.cache.peek(&hash).await {
            debug!(context_hash = %hash, "Joined in-flight construction");
            return Construction {
                context: hit,
                cached: true,
            };
        }

        let context = Arc::new(self.build(&input, hash.clone()));
        self.computations.fetch_add(1, Ordering::Relaxed);
        self.cache.insert(hash, Arc::clone(&context)).await;
        Construction {
            context,
            cached: false,
        }
    }

    /// Hash of every input that can change the output.
    pub fn context_hash(&self, input: &ConstructionInput<'_>) -> String {
        let budget = self.budget(input);
        let mut h = PartsHasher::new("constructed-context/v1");
        h.str(&self.settings.template_version)
            .str(&budget.describe())
            .str(&self.settings.dedup_threshold.to_string())
            .str(&self.settings.separator)
            .str(&format!("{:?}", self.settings.locale))
            .str(&input.schema.fingerprint())
            .str(&input.record.key);

        for (name, value) in &input.record.attributes {
            let tag = value.typed().map(|v| v.field_type().as_str()).unwrap_or("unschematized");
            h.str(name).str(tag).str(&value.to_raw().to_string());
        }

        let notes = index_notes(input.notes);
        let mut seen = HashSet::new();
        for entry in input.selection.entries.iter().filter(|e| seen.insert(e.note_id.as_str())) {
            let order = entry.order.map(|o| o.to_string()).unwrap_or_default();
            let content = notes
                .get(entry.note_id.as_str())
                .map(|n| n.content_hash())
                .unwrap_or_default();
            h.str(&entry.note_id).str(&order).str(&content);
        }
        h.finish()
    }

    fn budget(&self, input: &ConstructionInput<'_>) -> LengthBudget {
        input.budget.unwrap_or(self.settings.default_budget)
    }

    /// The pure merge. Same inputs, same output.
    pub fn build(&self, input: &ConstructionInput<'_>, context_hash: String) -> ConstructedContext {
        let budget = self.budget(input);
        let notes = index_notes(input.notes);

        let mut seen = HashSet::new();
        let mut slots: Vec<Slot<'_>> = input
            .selection
            .entries
            .iter()
            .filter(|e| seen.insert(e.note_id.as_str()))
            .enumerate()
            .filter_map(|(position, entry)| {
                notes.get(entry.note_id.as_str()).map(|&note| Slot {
                    note,
                    position,
                    order: entry.order,
                })
            })
            .collect();
        slots.sort_by(merge_order);

        let mut provenance: Vec<NoteProvenance> = Vec::with_capacity(slots.len());
        let mut blocks: Vec<Block> = Vec::new();
        // (provenance index, fields used) per block
        let mut block_meta: Vec<(usize, BTreeSet<String>)> = Vec::new();

        for slot in &slots {
            let note = slot.note;
            let mut entry = NoteProvenance {
                note_id: note.id.clone(),
                content_hash: note.content_hash(),
                fate: NoteFate::Included,
                omitted_fields: Vec::new(),
            };
            if !note.active {
                entry.fate = NoteFate::Inactive;
                provenance.push(entry);
                continue;
            }

            let rendered = render(&note.body, |name| self.lookup(input, name));
            entry.omitted_fields = rendered.missing.iter().cloned().collect();
            if rendered.is_empty() {
                entry.fate = NoteFate::OmittedMissingFields {
                    fields: entry.omitted_fields.clone(),
                };
                provenance.push(entry);
                continue;
            }

            let earlier = block_meta.iter().zip(&blocks).find(|(_, b)| {
                block_similarity(&b.text, &rendered.text) >= self.settings.dedup_threshold
            });
            if let Some(((index, _), _)) = earlier {
                entry.fate = NoteFate::DuplicateOf {
                    note_id: provenance[*index].note_id.clone(),
                };
                provenance.push(entry);
                continue;
            }

            block_meta.push((provenance.len(), rendered.used));
            blocks.push(Block {
                class: note.class,
                text: rendered.text,
            });
            provenance.push(entry);
        }

        let fitted = fit(&blocks, &self.settings.separator, budget);
        let mut fields = BTreeSet::new();
        for ((index, used), outcome) in block_meta.into_iter().zip(fitted.outcomes) {
            match outcome {
                BlockOutcome::Kept => fields.extend(used),
                BlockOutcome::Truncated => {
                    provenance[index].fate = NoteFate::Truncated;
                    fields.extend(used);
                }
                BlockOutcome::Dropped => provenance[index].fate = NoteFate::DroppedForBudget,
            }
        }

        debug!(
            record_key = %input.record.key,
            notes = provenance.len(),
            blocks = blocks.len(),
            truncated = fitted.truncated,
            "Context built"
        );

        ConstructedContext {
            record_key: input.record.key.clone(),
            text: fitted.text,
            provenance: Provenance {
                notes: provenance,
                fields: fields.into_iter().collect(),
            },
            truncated: fitted.truncated,
            context_hash,
            template_version: self.settings.template_version.clone(),
            budget,
        }
    }

    /// Formatted value for `name`, or `None` when it must be omitted: no
    /// active field, no stored value, or a value whose type no longer
    /// matches the definition.
    fn lookup(&self, input: &ConstructionInput<'_>, name: &str) -> Option<String> {
        let def = input.schema.field(name)?;
        let value = input.record.attributes.get(&def.name)?;
        if !input.schema.conforms(&def.name, value) {
            return None;
        }
        match value {
            AttributeValue::Typed(typed) => Some(self.formatter.format(typed)),
            AttributeValue::Unschematized(_) => None,
        }
    }
}

impl Default for ContextEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

fn index_notes(notes: &[ContextNote]) -> HashMap<&str, &ContextNote> {
    let mut index = HashMap::with_capacity(notes.len());
    for note in notes {
        index.entry(note.id.as_str()).or_insert(note);
    }
    index
}
