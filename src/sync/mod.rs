//! Synchronization between a local project and the document store.
//!
//! - `policy`: the synchronous decision logic (when to write, what to do with remote snapshots)
//! - `session`: the async task that drives a policy against a `DocumentStore`
//! - `config`: session tuning

pub mod config;
pub mod policy;
pub mod session;

pub use config::SyncConfig;
pub use policy::{DiscardReason, PendingWrite, RemoteOutcome, SyncPolicy};
pub use session::{SyncEvent, SyncEvents, SyncSession};
