//! Project content model.
//!
//! This module provides:
//! - `module`: the IdeaModule variant set (Text, Image, Video, Audio, SheetMusic)
//! - `model`: Idea, Project, Category and ProjectId
//! - `document`: lossless mapping to and from plain JSON documents
//! - `manager`: ProjectManager, the Automerge-backed replica a session edits
//! - `library`: per-user project collection keyed by ProjectId
//! - `wasm`: WASM bindings for the hosting app (JsProjectManager)

pub mod document;
pub mod library;
pub mod manager;
pub mod model;
pub mod module;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use library::{ProjectLibrary, ProjectSummary};
pub use manager::ProjectManager;
pub use model::{Category, CategoryFilter, Idea, Project, ProjectId};
pub use module::{
    AudioModule, IdeaModule, ImageModule, ModuleKind, SheetMusicModule, TextModule, VideoModule,
};

#[cfg(feature = "wasm")]
pub use wasm::JsProjectManager;
