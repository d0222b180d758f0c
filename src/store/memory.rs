//! In-memory document store.
//!
//! Behaves like the remote store from a session's point of view: writes are
//! echoed to subscribers, snapshots from "other devices" can be pushed in, and
//! failures can be injected for the next N writes.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

use super::{DocumentStore, StoreError, Subscription};
use crate::project::document::with_last_edited;
use crate::project::ProjectId;

type SnapshotSender = mpsc::UnboundedSender<Result<Value, StoreError>>;

#[derive(Debug, Default)]
struct MemoryState {
    documents: BTreeMap<ProjectId, Value>,
    subscribers: HashMap<ProjectId, Vec<SnapshotSender>>,
    writes: usize,
    failed_writes: usize,
    fail_next: usize,
}

impl MemoryState {
    fn notify(&mut self, id: &ProjectId, snapshot: Result<Value, StoreError>) {
        if let Some(senders) = self.subscribers.get_mut(id) {
            senders.retain(|tx| tx.send(snapshot.clone()).is_ok());
        }
    }
}

/// Shared in-memory store. Clones share the same documents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    write_delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: Delay every write, keeping it in flight for `delay`.
    pub fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a document without counting it as a write or notifying anyone.
    pub fn seed(&self, id: ProjectId, document: Value) {
        self.lock().documents.insert(id, document);
    }

    /// Simulates another device writing `document`: stores it and pushes the
    /// snapshot to subscribers.
    pub fn push_remote(&self, id: &ProjectId, document: Value) {
        let mut state = self.lock();
        state.documents.insert(id.clone(), document.clone());
        state.notify(id, Ok(document));
    }

    /// Pushes an error to a project's subscribers.
    pub fn push_error(&self, id: &ProjectId, error: StoreError) {
        self.lock().notify(id, Err(error));
    }

    /// Makes the next `count` writes fail with `StoreError::Unavailable`.
    pub fn fail_next_writes(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Number of successful writes.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    pub fn failed_write_count(&self) -> usize {
        self.lock().failed_writes
    }

    /// Current stored document, if any.
    pub fn document(&self, id: &ProjectId) -> Option<Value> {
        self.lock().documents.get(id).cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_project(&self, id: &ProjectId) -> Result<Value, StoreError> {
        self.document(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn write_project(
        &self,
        id: &ProjectId,
        document: Value,
        last_edited: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            state.failed_writes += 1;
            return Err(StoreError::Unavailable("injected write failure".to_string()));
        }

        let stored = with_last_edited(document, last_edited);
        state.documents.insert(id.clone(), stored.clone());
        state.writes += 1;
        state.notify(id, Ok(stored));
        Ok(())
    }

    async fn subscribe_project(&self, id: &ProjectId) -> Result<Subscription, StoreError> {
        let (tx, subscription) = Subscription::channel();
        self.lock()
            .subscribers
            .entry(id.clone())
            .or_default()
            .push(tx);
        Ok(subscription)
    }

    async fn list_projects(&self) -> Result<Vec<(ProjectId, Value)>, StoreError> {
        Ok(self
            .lock()
            .documents
            .iter()
            .map(|(id, doc)| (id.clone(), doc.clone()))
            .collect())
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), StoreError> {
        let mut state = self.lock();
        state.documents.remove(id);
        state.subscribers.remove(id);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
