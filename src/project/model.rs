//! Data models for projects and ideas.
//!
//! `Project` and `Idea` are plain values mutated only through their own
//! operations. They use autosurgeon derives so the session replica can
//! reconcile them into an Automerge document.

use std::fmt;

use autosurgeon::{Hydrate, HydrateError, Reconcile, Reconciler};
use autosurgeon::reconcile::NoKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::document::{decode_idea, decode_project, encode_idea, encode_project};
use super::module::IdeaModule;
use crate::error::{CreativeError, CreativeResult};

// =============================================================================
// PROJECT ID
// =============================================================================

/// Stable project identity. Stores and libraries address projects by id, never
/// by title, since titles may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Generates a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ProjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ProjectId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

// =============================================================================
// CATEGORY
// =============================================================================

/// Project category label. Early projects have none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Category {
    #[default]
    Uncategorized,
    Music,
    Art,
    Software,
    Writing,
}

impl Category {
    pub const LABELED: [Category; 4] = [
        Category::Music,
        Category::Art,
        Category::Software,
        Category::Writing,
    ];

    /// The stored label; empty for `Uncategorized`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Uncategorized => "",
            Category::Music => "Music",
            Category::Art => "Art",
            Category::Software => "Software",
            Category::Writing => "Writing",
        }
    }

    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "" => Some(Category::Uncategorized),
            "Music" => Some(Category::Music),
            "Art" => Some(Category::Art),
            "Software" => Some(Category::Software),
            "Writing" => Some(Category::Writing),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Reconcile for Category {
    type Key<'a> = NoKey;

    fn reconcile<R: Reconciler>(&self, mut reconciler: R) -> Result<(), R::Error> {
        reconciler.str(self.as_str())
    }
}

impl Hydrate for Category {
    fn hydrate_string(label: &'_ str) -> Result<Self, HydrateError> {
        Category::parse(label)
            .ok_or_else(|| HydrateError::unexpected("a category label", label.to_string()))
    }
}

/// Project-list filter: everything, or one category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(Category),
}

impl CategoryFilter {
    pub fn matches(&self, category: Category) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(c) => *c == category,
        }
    }

    /// Parses a filter label; `"All"` selects everything.
    pub fn parse(label: &str) -> Option<Self> {
        if label == "All" {
            return Some(CategoryFilter::All);
        }
        Category::parse(label).map(CategoryFilter::Only)
    }
}

// =============================================================================
// IDEA
// =============================================================================

/// A titled, ordered list of content modules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Reconcile, Hydrate, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub struct Idea {
    title: String,
    modules: Vec<IdeaModule>,
}

impl Idea {
    /// Creates an idea with no modules.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            modules: Vec::new(),
        }
    }

    /// Creates an idea with an initial module list.
    pub fn with_modules(title: impl Into<String>, modules: Vec<IdeaModule>) -> Self {
        Self {
            title: title.into(),
            modules,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Read view of the modules, in insertion order.
    pub fn modules(&self) -> &[IdeaModule] {
        &self.modules
    }

    pub fn module(&self, index: usize) -> Option<&IdeaModule> {
        self.modules.get(index)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Appends a module.
    pub fn add_module(&mut self, module: IdeaModule) {
        self.modules.push(module);
    }

    /// Removes the module at `index`, shifting later modules down. Out of range
    /// (including an empty idea) is a no-op.
    pub fn remove_module(&mut self, index: usize) {
        if index < self.modules.len() {
            self.modules.remove(index);
        }
    }

    /// Replaces the module at `index` wholesale.
    pub fn update_module(&mut self, index: usize, module: IdeaModule) -> CreativeResult<()> {
        let length = self.modules.len();
        let slot = self
            .modules
            .get_mut(index)
            .ok_or_else(|| CreativeError::index_out_of_bounds(index, length))?;
        *slot = module;
        Ok(())
    }

    /// Replaces the whole module list.
    pub fn replace_modules(&mut self, modules: Vec<IdeaModule>) {
        self.modules = modules;
    }

    pub fn to_document(&self) -> Value {
        encode_idea(self)
    }

    pub fn from_document(value: &Value) -> CreativeResult<Self> {
        decode_idea(value, "idea")
    }
}

impl From<Idea> for Value {
    fn from(idea: Idea) -> Self {
        idea.to_document()
    }
}

impl TryFrom<Value> for Idea {
    type Error = CreativeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Idea::from_document(&value)
    }
}

// =============================================================================
// PROJECT
// =============================================================================

/// A titled, categorized, ordered list of ideas. Ideas are addressed by
/// position; duplicate titles are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Reconcile, Hydrate, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub struct Project {
    title: String,
    category: Category,
    is_public: bool,
    ideas: Vec<Idea>,
}

impl Project {
    /// Creates an uncategorized, private project with no ideas.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Builder: Set category.
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Builder: Set visibility.
    pub fn with_public(mut self, is_public: bool) -> Self {
        self.is_public = is_public;
        self
    }

    /// Builder: Set the initial ideas.
    pub fn with_ideas(mut self, ideas: Vec<Idea>) -> Self {
        self.ideas = ideas;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn set_category(&mut self, category: Category) {
        self.category = category;
    }

    pub fn is_public(&self) -> bool {
        self.is_public
    }

    pub fn set_is_public(&mut self, is_public: bool) {
        self.is_public = is_public;
    }

    /// Read view of the ideas, in insertion order.
    pub fn ideas(&self) -> &[Idea] {
        &self.ideas
    }

    pub fn idea(&self, index: usize) -> Option<&Idea> {
        self.ideas.get(index)
    }

    pub fn idea_count(&self) -> usize {
        self.ideas.len()
    }

    /// Appends an idea.
    pub fn add_idea(&mut self, idea: Idea) {
        self.ideas.push(idea);
    }

    /// Appends a blank-titled idea.
    pub fn add_blank_idea(&mut self) {
        self.ideas.push(Idea::new(""));
    }

    /// Removes the idea at `index`. Out of range is a no-op.
    pub fn remove_idea(&mut self, index: usize) {
        if index < self.ideas.len() {
            self.ideas.remove(index);
        }
    }

    /// Replaces the idea at `index` wholesale.
    pub fn update_idea(&mut self, index: usize, idea: Idea) -> CreativeResult<()> {
        let length = self.ideas.len();
        let slot = self
            .ideas
            .get_mut(index)
            .ok_or_else(|| CreativeError::index_out_of_bounds(index, length))?;
        *slot = idea;
        Ok(())
    }

    /// Runs `f` against the idea at `index`, for module-level edits.
    pub fn edit_idea<F, R>(&mut self, index: usize, f: F) -> CreativeResult<R>
    where
        F: FnOnce(&mut Idea) -> CreativeResult<R>,
    {
        let length = self.ideas.len();
        let idea = self
            .ideas
            .get_mut(index)
            .ok_or_else(|| CreativeError::index_out_of_bounds(index, length))?;
        f(idea)
    }

    pub fn to_document(&self) -> Value {
        encode_project(self)
    }

    pub fn from_document(value: &Value) -> CreativeResult<Self> {
        decode_project(value)
    }
}

impl From<Project> for Value {
    fn from(project: Project) -> Self {
        project.to_document()
    }
}

impl TryFrom<Value> for Project {
    type Error = CreativeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Project::from_document(&value)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::module::ModuleKind;

    #[test]
    fn test_idea_title() {
        let mut idea = Idea::new("");
        idea.set_title("NewTitle");
        assert_eq!(idea.title(), "NewTitle");
    }

    #[test]
    fn test_add_modules() {
        let mut idea = Idea::new("");
        idea.add_module(IdeaModule::default());
        idea.add_module(IdeaModule::default());
        assert_eq!(idea.modules().len(), 2);
    }

    #[test]
    fn test_modules_keep_insertion_order() {
        let mut idea = Idea::new("order");
        for n in 0..5 {
            idea.add_module(IdeaModule::text(n.to_string()));
        }
        let payloads: Vec<&str> = idea.modules().iter().map(|m| m.payload()).collect();
        assert_eq!(payloads, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_remove_modules_shifts_down() {
        let mut idea = Idea::new("");
        idea.add_module(IdeaModule::text("a"));
        idea.add_module(IdeaModule::text("b"));
        idea.add_module(IdeaModule::text("c"));
        idea.remove_module(0);
        idea.remove_module(0);
        assert_eq!(idea.modules().len(), 1);
        assert_eq!(idea.modules()[0].payload(), "c");
    }

    #[test]
    fn test_remove_module_from_empty_is_noop() {
        let mut idea = Idea::new("");
        idea.remove_module(0);
        assert!(idea.modules().is_empty());
    }

    #[test]
    fn test_remove_module_out_of_bounds_is_noop() {
        let mut idea = Idea::new("");
        idea.add_module(IdeaModule::default());
        idea.add_module(IdeaModule::default());
        idea.remove_module(3);
        assert_eq!(idea.module_count(), 2);
    }

    #[test]
    fn test_update_module() {
        let mut idea = Idea::new("");
        idea.add_module(IdeaModule::text("draft"));
        idea.update_module(0, IdeaModule::audio("file:///take1.m4a"))
            .unwrap();
        assert_eq!(idea.module(0).unwrap().kind(), ModuleKind::Audio);

        let err = idea.update_module(1, IdeaModule::default()).unwrap_err();
        assert!(matches!(
            err,
            CreativeError::IndexOutOfBounds { index: 1, length: 1 }
        ));
    }

    #[test]
    fn test_replace_modules() {
        let mut idea = Idea::with_modules("i", vec![IdeaModule::text("a")]);
        idea.replace_modules(vec![IdeaModule::video("v"), IdeaModule::audio("a")]);
        assert_eq!(idea.module_count(), 2);
        assert_eq!(idea.module(0).unwrap().kind(), ModuleKind::Video);
    }

    #[test]
    fn test_project_title() {
        let mut project = Project::new("Test");
        project.set_title("NewTitle");
        assert_eq!(project.title(), "NewTitle");
        project.set_title("");
        assert_eq!(project.title(), "");
    }

    #[test]
    fn test_project_accessors() {
        let mut project = Project::new("Test").with_category(Category::Art);
        assert_eq!(project.category(), Category::Art);
        assert!(!project.is_public());
        project.set_is_public(true);
        assert!(project.is_public());
        project.set_category(Category::Software);
        assert_eq!(project.category(), Category::Software);
    }

    #[test]
    fn test_add_ideas() {
        let mut project = Project::new("Test").with_category(Category::Music);
        project.add_idea(Idea::new("test1"));
        project.add_idea(Idea::new("test2"));
        project.add_idea(Idea::new("test3"));
        assert_eq!(project.ideas().len(), 3);
    }

    #[test]
    fn test_add_blank_idea() {
        let mut project = Project::new("Test");
        project.add_blank_idea();
        assert_eq!(project.ideas()[0].title(), "");
    }

    #[test]
    fn test_remove_ideas_takes_correct_index() {
        let mut project = Project::new("Test").with_category(Category::Music);
        project.add_idea(Idea::new("t1"));
        project.add_idea(Idea::new("t2"));
        project.add_idea(Idea::new("t3"));
        project.remove_idea(0);
        project.remove_idea(0);
        assert_eq!(project.ideas().len(), 1);
        assert_eq!(project.ideas()[0].title(), "t3");
    }

    #[test]
    fn test_update_idea() {
        let mut project = Project::new("Test").with_category(Category::Music);
        project.add_idea(Idea::new("test1"));
        project.update_idea(0, Idea::new("testUpdate")).unwrap();
        assert_eq!(project.ideas()[0].title(), "testUpdate");
    }

    #[test]
    fn test_update_idea_out_of_range() {
        let mut project = Project::new("Test");
        let err = project.update_idea(0, Idea::new("x")).unwrap_err();
        assert!(matches!(
            err,
            CreativeError::IndexOutOfBounds { index: 0, length: 0 }
        ));
    }

    #[test]
    fn test_remove_idea_from_empty_and_out_of_bounds() {
        let mut project = Project::new("Test").with_category(Category::Music);
        project.remove_idea(0);
        assert!(project.ideas().is_empty());

        project.add_idea(Idea::new("test1"));
        project.add_idea(Idea::new("test2"));
        project.remove_idea(3);
        assert_eq!(project.idea_count(), 2);
    }

    #[test]
    fn test_duplicate_titles_allowed() {
        let mut project = Project::new("Dupes");
        project.add_idea(Idea::new("same"));
        project.add_idea(Idea::new("same"));
        project.remove_idea(1);
        assert_eq!(project.idea_count(), 1);
    }

    #[test]
    fn test_edit_idea() {
        let mut project = Project::new("p");
        project.add_idea(Idea::new("i"));
        project
            .edit_idea(0, |idea| {
                idea.add_module(IdeaModule::text("hello"));
                Ok(())
            })
            .unwrap();
        assert_eq!(project.ideas()[0].module_count(), 1);

        assert!(project.edit_idea(5, |_| Ok(())).is_err());
    }

    #[test]
    fn test_category_labels() {
        for category in Category::LABELED {
            assert_eq!(Category::parse(category.as_str()), Some(category));
        }
        assert_eq!(Category::parse(""), Some(Category::Uncategorized));
        assert_eq!(Category::parse("music"), None);
    }

    #[test]
    fn test_category_filter() {
        assert!(CategoryFilter::All.matches(Category::Art));
        assert!(CategoryFilter::Only(Category::Art).matches(Category::Art));
        assert!(!CategoryFilter::Only(Category::Art).matches(Category::Music));
        assert_eq!(CategoryFilter::parse("All"), Some(CategoryFilter::All));
        assert_eq!(
            CategoryFilter::parse("Writing"),
            Some(CategoryFilter::Only(Category::Writing))
        );
    }

    #[test]
    fn test_project_ids_are_unique() {
        assert_ne!(ProjectId::new(), ProjectId::new());
        assert_eq!(ProjectId::from("abc").as_str(), "abc");
    }

    #[test]
    fn test_project_serde_uses_document_form() {
        let project = Project::new("Serde").with_category(Category::Art);
        let json = serde_json::to_string(&project).unwrap();
        assert!(json.contains("\"isPublic\":false"));
        let back: Project = serde_json::from_str(&json).unwrap();
        assert_eq!(back, project);
    }
}
