//! CreativeBlock core - projects, ideas and content modules with a
//! local-first sync discipline.
//!
//! A `Project` holds ordered `Idea`s, and each idea holds ordered `IdeaModule`s
//! (text, image, video, audio, sheet music). The crate provides:
//!
//! - **Content model**: plain values with tolerant removes and index-checked updates
//! - **Serialization**: lossless JSON documents with `kind`-tagged modules, plus
//!   decoding of older untagged shapes
//! - **Replica**: an Automerge document kept in step via Autosurgeon, whose
//!   heads tell the sync layer whether local edits are unsent
//! - **Sync** (feature `sync`): one task per open project that coalesces edits
//!   into single writes and merges remote snapshots without reverting in-flight edits
//!
//! # Example
//!
//! ```rust
//! use creativeblock::{Category, Idea, IdeaModule, Project};
//!
//! let mut project = Project::new("Album").with_category(Category::Music);
//!
//! let mut chorus = Idea::new("Chorus");
//! chorus.add_module(IdeaModule::text("la la la"));
//! chorus.add_module(IdeaModule::audio("file:///hum.m4a"));
//! project.add_idea(chorus);
//!
//! let document = project.to_document();
//! assert_eq!(document["ideas"][0]["modules"][1]["kind"], "audio");
//! assert_eq!(Project::from_document(&document).unwrap(), project);
//! ```

pub mod error;
pub mod project;

#[cfg(feature = "sync")]
pub mod store;
#[cfg(feature = "sync")]
pub mod sync;

// Re-exports for convenience
pub use error::{CreativeError, CreativeResult};
pub use project::{
    AudioModule, Category, CategoryFilter, Idea, IdeaModule, ImageModule, ModuleKind, Project,
    ProjectId, ProjectLibrary, ProjectManager, ProjectSummary, SheetMusicModule, TextModule,
    VideoModule,
};

#[cfg(feature = "wasm")]
pub use project::JsProjectManager;

#[cfg(feature = "sync")]
pub use store::{DocumentStore, MemoryStore, StoreError};
#[cfg(feature = "sync")]
pub use sync::{SyncConfig, SyncEvent, SyncSession};
