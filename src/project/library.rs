//! Per-user project collection.
//!
//! Projects are kept in creation order and addressed by [`ProjectId`]; titles
//! may repeat.

use std::collections::HashMap;

use serde::Serialize;

use super::model::{Category, CategoryFilter, Project, ProjectId};
use crate::error::{CreativeError, CreativeResult};

#[cfg(feature = "sync")]
use crate::store::DocumentStore;

/// One row of a project listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub id: ProjectId,
    pub title: String,
    pub category: String,
    pub is_public: bool,
    pub idea_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ProjectLibrary {
    order: Vec<ProjectId>,
    projects: HashMap<ProjectId, Project>,
}

impl ProjectLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every project the store lists. A document that fails to decode
    /// fails the whole load.
    #[cfg(feature = "sync")]
    pub async fn load(store: &dyn DocumentStore) -> CreativeResult<Self> {
        let mut library = Self::new();
        for (id, document) in store.list_projects().await? {
            let project = Project::from_document(&document).map_err(|err| match err {
                CreativeError::Decode { path, reason } => {
                    CreativeError::decode(format!("{}:{}", id, path), reason)
                }
                other => other,
            })?;
            library.insert(id, project);
        }
        tracing::debug!(count = library.len(), "loaded project library");
        Ok(library)
    }

    /// Adds a project under a fresh id.
    pub fn create(&mut self, project: Project) -> ProjectId {
        let id = ProjectId::new();
        self.insert(id.clone(), project);
        id
    }

    /// Inserts or replaces a project. A replaced project keeps its position.
    pub fn insert(&mut self, id: ProjectId, project: Project) {
        if self.projects.insert(id.clone(), project).is_none() {
            self.order.push(id);
        }
    }

    pub fn get(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.get(id)
    }

    pub fn get_mut(&mut self, id: &ProjectId) -> Option<&mut Project> {
        self.projects.get_mut(id)
    }

    /// Like `get`, but a missing id is an error.
    pub fn require(&self, id: &ProjectId) -> CreativeResult<&Project> {
        self.get(id)
            .ok_or_else(|| CreativeError::project_not_found(id.as_str()))
    }

    /// Removes a project; a missing id is a no-op.
    pub fn remove(&mut self, id: &ProjectId) -> Option<Project> {
        let removed = self.projects.remove(id)?;
        self.order.retain(|other| other != id);
        Some(removed)
    }

    pub fn ids(&self) -> &[ProjectId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Projects matching `filter`, in library order.
    pub fn filter(&self, filter: CategoryFilter) -> Vec<(&ProjectId, &Project)> {
        self.order
            .iter()
            .filter_map(|id| self.projects.get(id).map(|p| (id, p)))
            .filter(|(_, p)| filter.matches(p.category()))
            .collect()
    }

    pub fn summaries(&self, filter: CategoryFilter) -> Vec<ProjectSummary> {
        self.filter(filter)
            .into_iter()
            .map(|(id, project)| ProjectSummary {
                id: id.clone(),
                title: project.title().to_string(),
                category: project.category().as_str().to_string(),
                is_public: project.is_public(),
                idea_count: project.idea_count(),
            })
            .collect()
    }

    /// Number of projects per labeled category; uncategorized projects are not counted.
    pub fn category_counts(&self) -> Vec<(Category, usize)> {
        Category::LABELED
            .iter()
            .map(|c| (*c, self.filter(CategoryFilter::Only(*c)).len()))
            .collect()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::model::Idea;

    fn library() -> (ProjectLibrary, ProjectId, ProjectId, ProjectId) {
        let mut lib = ProjectLibrary::new();
        let a = lib.create(Project::new("Album").with_category(Category::Music));
        let b = lib.create(Project::new("Album").with_category(Category::Art));
        let mut poems = Project::new("Poems").with_category(Category::Writing);
        poems.add_idea(Idea::new("haiku"));
        let c = lib.create(poems);
        (lib, a, b, c)
    }

    #[test]
    fn test_duplicate_titles_are_distinct_projects() {
        let (mut lib, a, b, _) = library();
        assert_eq!(lib.len(), 3);

        lib.get_mut(&b).unwrap().set_title("Sketches");
        assert_eq!(lib.get(&a).unwrap().title(), "Album");
        assert_eq!(lib.get(&b).unwrap().title(), "Sketches");
    }

    #[test]
    fn test_filter_by_category() {
        let (lib, a, _, c) = library();
        assert_eq!(lib.filter(CategoryFilter::All).len(), 3);

        let music = lib.filter(CategoryFilter::Only(Category::Music));
        assert_eq!(music.len(), 1);
        assert_eq!(music[0].0, &a);

        let summaries = lib.summaries(CategoryFilter::Only(Category::Writing));
        assert_eq!(summaries[0].id, c);
        assert_eq!(summaries[0].idea_count, 1);
        assert_eq!(summaries[0].category, "Writing");
    }

    #[test]
    fn test_remove_is_tolerant_and_keeps_order() {
        let (mut lib, a, b, c) = library();
        assert!(lib.remove(&b).is_some());
        assert!(lib.remove(&b).is_none());
        assert!(lib.remove(&ProjectId::from("nope")).is_none());
        assert_eq!(lib.ids(), &[a, c]);
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let (mut lib, a, b, c) = library();
        lib.insert(b.clone(), Project::new("Replaced"));
        assert_eq!(lib.ids(), &[a, b.clone(), c]);
        assert_eq!(lib.require(&b).unwrap().title(), "Replaced");
        assert!(matches!(
            lib.require(&ProjectId::from("x")),
            Err(CreativeError::ProjectNotFound(_))
        ));
    }

    #[test]
    fn test_category_counts() {
        let (lib, ..) = library();
        let counts = lib.category_counts();
        assert!(counts.contains(&(Category::Music, 1)));
        assert!(counts.contains(&(Category::Software, 0)));
    }

    #[test]
    fn test_summary_serializes_camel_case() {
        let (lib, ..) = library();
        let json = serde_json::to_value(&lib.summaries(CategoryFilter::All)[2]).unwrap();
        assert_eq!(json["ideaCount"], 1);
        assert_eq!(json["isPublic"], false);
    }

    #[cfg(feature = "sync")]
    #[tokio::test]
    async fn test_load_from_store() {
        use crate::store::MemoryStore;
        use serde_json::json;

        let store = MemoryStore::new();
        store.seed(ProjectId::from("p1"), json!({"title": "One", "category": "Art"}));
        store.seed(ProjectId::from("p2"), json!({"title": "Two", "ideas": ["legacy"]}));

        let lib = ProjectLibrary::load(&store).await.unwrap();
        assert_eq!(lib.len(), 2);
        assert_eq!(lib.get(&ProjectId::from("p2")).unwrap().idea_count(), 1);

        store.seed(ProjectId::from("p3"), json!({"title": "Bad", "category": 7}));
        let err = ProjectLibrary::load(&store).await.unwrap_err();
        match err {
            CreativeError::Decode { path, .. } => assert_eq!(path, "p3:category"),
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
