//! Persistence collaborator contract.
//!
//! A `DocumentStore` holds one JSON document per project, addressed by
//! [`ProjectId`]. The sync session reads and subscribes once, then writes the
//! current project whenever the policy decides local edits must persist.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::project::ProjectId;

pub use memory::MemoryStore;

/// Failure reported by a document store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("No stored project with id {0}")]
    NotFound(ProjectId),

    /// Transient failure (offline, timeout). Retrying may succeed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store refused the write (permissions, validation).
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Remote per-user document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a project's raw document.
    async fn read_project(&self, id: &ProjectId) -> Result<Value, StoreError>;

    /// Writes a serialized project. The store records `last_edited` as the
    /// document's `lastEdited` marker.
    async fn write_project(
        &self,
        id: &ProjectId,
        document: Value,
        last_edited: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Subscribes to snapshots of one project, including echoes of this
    /// client's own writes.
    async fn subscribe_project(&self, id: &ProjectId) -> Result<Subscription, StoreError>;

    /// Lists every stored project document.
    async fn list_projects(&self) -> Result<Vec<(ProjectId, Value)>, StoreError>;

    /// Deletes a project. Deleting a missing project is not an error.
    async fn delete_project(&self, id: &ProjectId) -> Result<(), StoreError>;
}

/// Stream of snapshots (or errors) for one project. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<Result<Value, StoreError>>,
}

impl Subscription {
    /// Creates a subscription and the sender a store feeds it through.
    pub fn channel() -> (mpsc::UnboundedSender<Result<Value, StoreError>>, Self) {
        let (tx, receiver) = mpsc::unbounded_channel();
        (tx, Self { receiver })
    }

    /// Next snapshot, or `None` once the store closes the stream.
    pub async fn next(&mut self) -> Option<Result<Value, StoreError>> {
        self.receiver.recv().await
    }

    pub fn unsubscribe(mut self) {
        self.receiver.close();
    }
}
