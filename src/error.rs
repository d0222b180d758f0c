//! Error types for the CreativeBlock core.

use thiserror::Error;

#[cfg(feature = "sync")]
use crate::store::StoreError;

/// Result type alias for core operations.
pub type CreativeResult<T> = Result<T, CreativeError>;

/// Errors that can occur while editing, encoding or syncing projects.
#[derive(Error, Debug)]
pub enum CreativeError {
    /// Index out of bounds for an operation that requires an existing element.
    #[error("Index {index} out of bounds for list of length {length}")]
    IndexOutOfBounds { index: usize, length: usize },

    /// A document could not be decoded into the object model.
    #[error("Decode error at {path}: {reason}")]
    Decode { path: String, reason: String },

    /// Failure reported by the external document store.
    #[cfg(feature = "sync")]
    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),

    /// Replica structure is invalid.
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    /// No project with this id exists.
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// The sync session loop has shut down.
    #[error("Sync session closed")]
    SessionClosed,

    /// Automerge error during replica operations.
    #[error("Automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    /// Autosurgeon hydration error.
    #[error("Hydration error: {0}")]
    Hydrate(#[from] autosurgeon::HydrateError),

    /// Autosurgeon reconcile error.
    #[error("Reconcile error: {0}")]
    Reconcile(#[from] autosurgeon::ReconcileError),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CreativeError {
    /// Creates an IndexOutOfBounds error.
    pub fn index_out_of_bounds(index: usize, length: usize) -> Self {
        Self::IndexOutOfBounds { index, length }
    }

    /// Creates a Decode error for the given document path.
    pub fn decode(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a SchemaViolation error.
    pub fn schema_violation(msg: impl Into<String>) -> Self {
        Self::SchemaViolation(msg.into())
    }

    /// Creates a ProjectNotFound error.
    pub fn project_not_found(id: impl Into<String>) -> Self {
        Self::ProjectNotFound(id.into())
    }

    /// Creates a Serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Returns true for structural decode failures.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

impl From<serde_json::Error> for CreativeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
