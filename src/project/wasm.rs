//! WASM bindings for the project replica.
//!
//! JavaScript-friendly wrapper around `ProjectManager`. Values cross the
//! boundary in their document form (`kind`-tagged modules, `isPublic`).

use automerge::ChangeHash;
use js_sys::{Array, Uint8Array};
use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::prelude::*;

use super::manager::ProjectManager;
use super::model::{Category, Idea, Project};
use super::module::IdeaModule;
use crate::error::CreativeError;

/// Serialize a value to JsValue with maps as plain JS objects (not Map).
fn to_js_value<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&Serializer::new().serialize_maps_as_objects(true))
}

/// Parses hex-encoded change hashes; malformed entries are skipped.
fn parse_heads(heads: &Array) -> Vec<ChangeHash> {
    heads
        .iter()
        .filter_map(|v| {
            let bytes = hex::decode(v.as_string()?).ok()?;
            let arr: [u8; 32] = bytes.try_into().ok()?;
            Some(ChangeHash(arr))
        })
        .collect()
}

// =============================================================================
// ERROR CONVERSION
// =============================================================================

impl From<CreativeError> for JsValue {
    fn from(err: CreativeError) -> JsValue {
        JsValue::from_str(&err.to_string())
    }
}

macro_rules! js_result {
    ($expr:expr) => {
        $expr.map_err(|e: CreativeError| JsValue::from(e))
    };
}

// =============================================================================
// MAIN WRAPPER TYPE
// =============================================================================

/// JavaScript-friendly wrapper around ProjectManager.
#[wasm_bindgen]
pub struct JsProjectManager {
    inner: ProjectManager,
}

#[wasm_bindgen]
impl JsProjectManager {
    /// Creates a replica for a new, empty project.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const manager = new JsProjectManager('My album');
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(title: &str) -> Result<JsProjectManager, JsValue> {
        let inner = js_result!(ProjectManager::new(Project::new(title)))?;
        Ok(JsProjectManager { inner })
    }

    /// Creates a replica from a project document object.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const manager = JsProjectManager.fromDocument(snapshot.data());
    /// ```
    #[wasm_bindgen(js_name = fromDocument)]
    pub fn from_document(document: JsValue) -> Result<JsProjectManager, JsValue> {
        let document: serde_json::Value = from_value(document)?;
        let inner = js_result!(ProjectManager::from_document(&document))?;
        Ok(JsProjectManager { inner })
    }

    /// Loads from saved bytes (Uint8Array).
    #[wasm_bindgen(js_name = fromBytes)]
    pub fn from_bytes(bytes: &[u8]) -> Result<JsProjectManager, JsValue> {
        let inner = js_result!(ProjectManager::from_bytes(bytes))?;
        Ok(JsProjectManager { inner })
    }

    /// Saves to bytes (returns Uint8Array).
    #[wasm_bindgen(js_name = toBytes)]
    pub fn to_bytes(&mut self) -> Uint8Array {
        let bytes = self.inner.save();
        Uint8Array::from(&bytes[..])
    }

    /// Gets the project as a document object.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const doc = manager.toDocument();
    /// console.log(doc.ideas[0].modules[0].kind); // "text"
    /// ```
    #[wasm_bindgen(js_name = toDocument)]
    pub fn to_document(&mut self) -> Result<JsValue, JsValue> {
        let document = js_result!(self.inner.to_document())?;
        Ok(to_js_value(&document)?)
    }

    #[wasm_bindgen(js_name = actorId)]
    pub fn actor_id(&self) -> String {
        self.inner.actor_id()
    }

    /// Gets the current heads as hex strings.
    #[wasm_bindgen(js_name = getHeads)]
    pub fn get_heads(&mut self) -> Array {
        let array = Array::new();
        for head in self.inner.get_heads() {
            array.push(&JsValue::from_str(&head.to_string()));
        }
        array
    }

    /// True when the replica changed since `heads` (from `getHeads`).
    ///
    /// # Example (JavaScript)
    /// ```js
    /// const sent = manager.getHeads();
    /// // ... edits ...
    /// if (manager.hasChangesSince(sent)) { await save(manager.toDocument()); }
    /// ```
    #[wasm_bindgen(js_name = hasChangesSince)]
    pub fn has_changes_since(&mut self, heads: Array) -> bool {
        let heads = parse_heads(&heads);
        self.inner.has_changes_since(&heads)
    }
}

// =============================================================================
// PROJECT FIELDS
// =============================================================================

#[wasm_bindgen]
impl JsProjectManager {
    #[wasm_bindgen(js_name = setTitle)]
    pub fn set_title(&mut self, title: &str) -> Result<(), JsValue> {
        js_result!(self.inner.set_title(title))
    }

    /// Sets the category label ("Music", "Art", "Software", "Writing", or "").
    #[wasm_bindgen(js_name = setCategory)]
    pub fn set_category(&mut self, label: &str) -> Result<(), JsValue> {
        let category = Category::parse(label)
            .ok_or_else(|| JsValue::from_str(&format!("Unknown category: {}", label)))?;
        js_result!(self.inner.set_category(category))
    }

    #[wasm_bindgen(js_name = setPublic)]
    pub fn set_public(&mut self, is_public: bool) -> Result<(), JsValue> {
        js_result!(self.inner.set_is_public(is_public))
    }
}

// =============================================================================
// IDEA AND MODULE METHODS
// =============================================================================

#[wasm_bindgen]
impl JsProjectManager {
    /// Appends an idea document (`{ title, modules }`).
    #[wasm_bindgen(js_name = addIdea)]
    pub fn add_idea(&mut self, idea: JsValue) -> Result<(), JsValue> {
        let idea: Idea = from_value(idea)?;
        js_result!(self.inner.add_idea(idea))
    }

    #[wasm_bindgen(js_name = addBlankIdea)]
    pub fn add_blank_idea(&mut self) -> Result<(), JsValue> {
        js_result!(self.inner.add_blank_idea())
    }

    /// Removes an idea; out of range does nothing.
    #[wasm_bindgen(js_name = removeIdea)]
    pub fn remove_idea(&mut self, index: usize) -> Result<(), JsValue> {
        js_result!(self.inner.remove_idea(index))
    }

    #[wasm_bindgen(js_name = updateIdea)]
    pub fn update_idea(&mut self, index: usize, idea: JsValue) -> Result<(), JsValue> {
        let idea: Idea = from_value(idea)?;
        js_result!(self.inner.update_idea(index, idea))
    }

    #[wasm_bindgen(js_name = setIdeaTitle)]
    pub fn set_idea_title(&mut self, index: usize, title: &str) -> Result<(), JsValue> {
        js_result!(self.inner.set_idea_title(index, title))
    }

    /// Gets an idea document, or null if out of range.
    #[wasm_bindgen(js_name = getIdea)]
    pub fn get_idea(&mut self, index: usize) -> Result<JsValue, JsValue> {
        match js_result!(self.inner.get_idea(index))? {
            Some(idea) => Ok(to_js_value(&idea)?),
            None => Ok(JsValue::NULL),
        }
    }

    /// Appends a module document to an idea.
    ///
    /// # Example (JavaScript)
    /// ```js
    /// manager.addModule(0, { kind: 'image', imageRef: 'file:///a.png', caption: '' });
    /// ```
    #[wasm_bindgen(js_name = addModule)]
    pub fn add_module(&mut self, idea_index: usize, module: JsValue) -> Result<(), JsValue> {
        let module: IdeaModule = from_value(module)?;
        js_result!(self.inner.add_module(idea_index, module))
    }

    #[wasm_bindgen(js_name = removeModule)]
    pub fn remove_module(&mut self, idea_index: usize, module_index: usize) -> Result<(), JsValue> {
        js_result!(self.inner.remove_module(idea_index, module_index))
    }

    #[wasm_bindgen(js_name = updateModule)]
    pub fn update_module(
        &mut self,
        idea_index: usize,
        module_index: usize,
        module: JsValue,
    ) -> Result<(), JsValue> {
        let module: IdeaModule = from_value(module)?;
        js_result!(self.inner.update_module(idea_index, module_index, module))
    }
}
