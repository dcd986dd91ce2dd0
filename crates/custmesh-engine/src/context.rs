//! Shared per-workflow context memory.
//!
//! A thread-safe map from workflow identifier to an append-only action
//! log plus a merge-only metadata map. Agents consult it to make
//! context-aware decisions; the engine uses it for inspection. It knows
//! nothing about workflows or agents above it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use custmesh_protocols::message::ContextSnapshot;
use custmesh_protocols::types::{Id, Metadata};

/// One workflow's recorded history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextEntry {
    /// Set when the entry is created; absent on the empty default
    /// returned for unknown identifiers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// Append-only, unbounded.
    #[serde(default)]
    pub previous_actions: Vec<String>,
    /// Merge-only; last write wins per key.
    #[serde(default)]
    pub metadata: Metadata,
}

impl ContextEntry {
    fn fresh() -> Self {
        Self {
            created_at: Some(Utc::now()),
            previous_actions: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// Snapshot suitable for attaching to an outgoing message.
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            previous_actions: self.previous_actions.clone(),
            metadata: self.metadata.clone(),
            last_updated: Some(Utc::now()),
        }
    }
}

/// Thread-safe in-memory context store.
///
/// Every operation takes one coarse lock around the whole map for the
/// duration of the read/write. Contention stays low because the number
/// of live workflows is capped by the engine's concurrency ceiling.
#[derive(Default)]
pub struct ContextStore {
    store: Mutex<HashMap<Id, ContextEntry>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new workflow context and return its identifier.
    pub fn create_workflow_context(&self) -> Id {
        let workflow_id = Uuid::new_v4().to_string();
        let mut store = self.store.lock();
        store.insert(workflow_id.clone(), ContextEntry::fresh());
        workflow_id
    }

    /// Retrieve the context for a workflow.
    ///
    /// Never fails: an unknown identifier yields a structurally-empty
    /// entry. Whether absence is an error is the caller's call.
    pub fn get_context(&self, workflow_id: &str) -> ContextEntry {
        let store = self.store.lock();
        store.get(workflow_id).cloned().unwrap_or_default()
    }

    /// Append an action and/or merge metadata, creating the entry lazily.
    pub fn update_context(
        &self,
        workflow_id: &str,
        action: Option<&str>,
        metadata: Option<Metadata>,
    ) {
        let mut store = self.store.lock();
        let entry = store
            .entry(workflow_id.to_string())
            .or_insert_with(ContextEntry::fresh);
        if let Some(action) = action {
            entry.previous_actions.push(action.to_string());
        }
        if let Some(metadata) = metadata {
            entry.metadata.extend(metadata);
        }
    }

    /// Replace an existing entry with a fresh empty one. No-op if absent.
    pub fn reset_context(&self, workflow_id: &str) {
        let mut store = self.store.lock();
        if store.contains_key(workflow_id) {
            store.insert(workflow_id.to_string(), ContextEntry::fresh());
        }
    }

    /// Snapshot of all known workflow identifiers. Order is unspecified.
    pub fn list_workflows(&self) -> Vec<Id> {
        let store = self.store.lock();
        store.keys().cloned().collect()
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
