//! Core ProjectManager implementation with hybrid operations pattern.
//!
//! `ProjectManager` is the local replica of one open project. It wraps an
//! Automerge document and provides:
//! - High-level operations via autosurgeon (hydrate/reconcile) for idea and module edits
//! - Targeted project-field updates via direct put operations (O(1) instead of O(N))
//! - Change heads, which the sync policy compares to detect unsent local edits

use automerge::{
    transaction::Transactable, AutoCommit, ChangeHash, ObjId, Prop, ReadDoc, ScalarValue, Value,
    ROOT,
};
use autosurgeon::{hydrate, reconcile};

use super::model::{Category, Idea, Project};
use super::module::IdeaModule;
use crate::error::{CreativeError, CreativeResult};

/// The replica a session edits.
///
/// Uses a hybrid approach:
/// - `update_state()` / `try_update_state()` for structural edits (hydrate/reconcile)
/// - `set_title()`, `set_is_public()`, `set_category()`, `set_idea_title()` for targeted puts
///
/// # Caching Strategy
///
/// `cached_state` holds the hydrated `Project` and is invalidated on any direct mutation.
pub struct ProjectManager {
    doc: AutoCommit,
    /// Cached hydrated state - invalidated after direct document mutations.
    cached_state: Option<Project>,
}

impl ProjectManager {
    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Creates a replica seeded with `project`.
    pub fn new(project: Project) -> CreativeResult<Self> {
        let mut doc = AutoCommit::new();
        reconcile(&mut doc, &project)?;
        Ok(Self {
            doc,
            cached_state: Some(project),
        })
    }

    /// Creates a replica from a project JSON document.
    pub fn from_document(document: &serde_json::Value) -> CreativeResult<Self> {
        Self::new(Project::from_document(document)?)
    }

    /// Creates a replica from saved binary data (offline cache).
    pub fn from_bytes(bytes: &[u8]) -> CreativeResult<Self> {
        let doc = AutoCommit::load(bytes)?;
        Ok(Self {
            doc,
            cached_state: None,
        })
    }

    /// Saves the replica to binary format.
    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    /// Returns the current heads.
    pub fn get_heads(&mut self) -> Vec<ChangeHash> {
        self.doc.get_heads()
    }

    /// True when the replica has changed since `heads` were taken.
    pub fn has_changes_since(&mut self, heads: &[ChangeHash]) -> bool {
        let mut current = self.doc.get_heads();
        let mut other = heads.to_vec();
        current.sort();
        other.sort();
        current != other
    }

    /// Gets the actor ID for this replica.
    pub fn actor_id(&self) -> String {
        self.doc.get_actor().to_hex_string()
    }

    // =========================================================================
    // HIGH-LEVEL OPERATIONS (via Hydrate/Reconcile)
    // =========================================================================

    /// Hydrates the whole project.
    pub fn get_state(&mut self) -> CreativeResult<Project> {
        if let Some(ref cached) = self.cached_state {
            return Ok(cached.clone());
        }
        let state: Project = hydrate(&self.doc)?;
        self.cached_state = Some(state.clone());
        Ok(state)
    }

    /// Applies `f` to the project, then reconciles back to the document.
    pub fn update_state<F>(&mut self, f: F) -> CreativeResult<()>
    where
        F: FnOnce(&mut Project),
    {
        self.try_update_state(|state| {
            f(state);
            Ok(())
        })
    }

    /// Like `update_state`, but `f` may fail; on failure nothing is written.
    pub fn try_update_state<F, R>(&mut self, f: F) -> CreativeResult<R>
    where
        F: FnOnce(&mut Project) -> CreativeResult<R>,
    {
        let mut state = self.get_state()?;
        let out = f(&mut state)?;
        reconcile(&mut self.doc, &state)?;
        self.cached_state = Some(state);
        Ok(out)
    }

    /// Replaces the whole project (remote snapshot adoption).
    pub fn replace_state(&mut self, project: Project) -> CreativeResult<()> {
        self.update_state(|state| *state = project)
    }

    /// Appends an idea.
    pub fn add_idea(&mut self, idea: Idea) -> CreativeResult<()> {
        self.update_state(|state| state.add_idea(idea))
    }

    /// Appends a blank-titled idea.
    pub fn add_blank_idea(&mut self) -> CreativeResult<()> {
        self.update_state(|state| state.add_blank_idea())
    }

    /// Removes an idea; out of range is a no-op.
    pub fn remove_idea(&mut self, index: usize) -> CreativeResult<()> {
        self.update_state(|state| state.remove_idea(index))
    }

    /// Replaces an idea wholesale.
    pub fn update_idea(&mut self, index: usize, idea: Idea) -> CreativeResult<()> {
        self.try_update_state(|state| state.update_idea(index, idea))
    }

    /// Gets an idea by index.
    pub fn get_idea(&mut self, index: usize) -> CreativeResult<Option<Idea>> {
        let state = self.get_state()?;
        Ok(state.idea(index).cloned())
    }

    /// Appends a module to an idea.
    pub fn add_module(&mut self, idea_index: usize, module: IdeaModule) -> CreativeResult<()> {
        self.try_update_state(|state| {
            state.edit_idea(idea_index, |idea| {
                idea.add_module(module);
                Ok(())
            })
        })
    }

    /// Removes a module; an out-of-range idea or module index is a no-op.
    pub fn remove_module(&mut self, idea_index: usize, module_index: usize) -> CreativeResult<()> {
        self.update_state(|state| {
            let _ = state.edit_idea(idea_index, |idea| {
                idea.remove_module(module_index);
                Ok(())
            });
        })
    }

    /// Replaces a module wholesale.
    pub fn update_module(
        &mut self,
        idea_index: usize,
        module_index: usize,
        module: IdeaModule,
    ) -> CreativeResult<()> {
        self.try_update_state(|state| {
            state.edit_idea(idea_index, |idea| idea.update_module(module_index, module))
        })
    }

    // =========================================================================
    // TARGETED UPDATES (Direct put, O(1))
    // =========================================================================

    /// Sets the project title directly (O(1)).
    pub fn set_title(&mut self, title: &str) -> CreativeResult<()> {
        self.cached_state = None;
        self.doc.put(&ROOT, "title", ScalarValue::Str(title.into()))?;
        Ok(())
    }

    /// Sets the visibility flag directly (O(1)).
    pub fn set_is_public(&mut self, is_public: bool) -> CreativeResult<()> {
        self.cached_state = None;
        self.doc
            .put(&ROOT, "is_public", ScalarValue::Boolean(is_public))?;
        Ok(())
    }

    /// Sets the category directly (O(1)).
    pub fn set_category(&mut self, category: Category) -> CreativeResult<()> {
        self.cached_state = None;
        self.doc
            .put(&ROOT, "category", ScalarValue::Str(category.as_str().into()))?;
        Ok(())
    }

    /// Sets one idea's title directly (O(1)).
    pub fn set_idea_title(&mut self, index: usize, title: &str) -> CreativeResult<()> {
        let ideas_obj = self.get_obj_at(&ROOT, "ideas")?;
        let length = self.doc.length(&ideas_obj);
        if index >= length {
            return Err(CreativeError::index_out_of_bounds(index, length));
        }
        let idea_obj = self.get_obj_at(&ideas_obj, index)?;
        self.cached_state = None;
        self.doc
            .put(&idea_obj, "title", ScalarValue::Str(title.into()))?;
        Ok(())
    }

    // =========================================================================
    // DOCUMENTS
    // =========================================================================

    /// Encodes the current state as a project JSON document.
    pub fn to_document(&mut self) -> CreativeResult<serde_json::Value> {
        Ok(self.get_state()?.to_document())
    }

    /// Writes a raw root scalar, bypassing the model.
    #[cfg(test)]
    pub(crate) fn put_raw(&mut self, key: &str, value: ScalarValue) -> CreativeResult<()> {
        self.cached_state = None;
        self.doc.put(&ROOT, key, value)?;
        Ok(())
    }

    // =========================================================================
    // INTERNAL HELPERS
    // =========================================================================

    /// Gets an object ID at a map key or list index.
    fn get_obj_at<P: Into<Prop>>(&self, parent: &ObjId, prop: P) -> CreativeResult<ObjId> {
        let prop = prop.into();
        match self.doc.get(parent, prop.clone()) {
            Ok(Some((Value::Object(_), obj_id))) => Ok(obj_id),
            Ok(Some(_)) => Err(CreativeError::schema_violation(format!(
                "{:?} is not an object",
                prop
            ))),
            Ok(None) => Err(CreativeError::schema_violation(format!(
                "{:?} is missing",
                prop
            ))),
            Err(e) => Err(CreativeError::Automerge(e)),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
