//! In-memory job store.
//!
//! Thread-safe backend using an RwLock-guarded map. Entries are not
//! persisted across restarts; external persistence can be layered on
//! through the serde derives on `ScheduledEntry`.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{EntryFailure, EntryState, JobStore, ScheduledEntry, StoreError};
use crate::core::types::JobId;

/// In-memory store backend.
pub struct InMemoryStore {
    entries: RwLock<HashMap<JobId, ScheduledEntry>>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryStore {
    async fn insert(&self, entry: ScheduledEntry) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let id = entry.job_id().clone();
        if entries.contains_key(&id) {
            return Err(StoreError::DuplicateJob(id));
        }
        entries.insert(id, entry);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<ScheduledEntry, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn update_state(&self, id: &JobId, next: EntryState) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !entry.state.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: entry.state,
                to: next,
            });
        }
        entry.state = next;
        Ok(())
    }

    async fn record_failure(&self, id: &JobId, failure: EntryFailure) -> Result<(), StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if !entry.state.can_transition_to(EntryState::Failed) {
            return Err(StoreError::InvalidTransition {
                from: entry.state,
                to: EntryState::Failed,
            });
        }
        entry.state = EntryState::Failed;
        entry.failure = Some(failure);
        Ok(())
    }

    async fn remove(&self, id: &JobId) -> Result<ScheduledEntry, StoreError> {
        let mut entries = self.entries.write().map_err(|_| StoreError::LockPoisoned)?;
        entries
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn list(&self) -> Result<Vec<ScheduledEntry>, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut result: Vec<_> = entries.values().cloned().collect();
        result.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(result)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let entries = self.entries.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(entries.len())
    }
}
