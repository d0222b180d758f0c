//! Content counts used for validation and the `--stats` report.

use std::collections::BTreeMap;

use creativeblock::{ModuleKind, Project};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStats {
    pub ideas: usize,
    pub modules: usize,
    pub by_kind: BTreeMap<&'static str, usize>,
}

impl ProjectStats {
    pub fn of(project: &Project) -> Self {
        let mut by_kind: BTreeMap<&'static str, usize> =
            ModuleKind::ALL.iter().map(|k| (k.as_str(), 0)).collect();
        let mut modules = 0;
        for idea in project.ideas() {
            for module in idea.modules() {
                *by_kind.entry(module.kind().as_str()).or_default() += 1;
                modules += 1;
            }
        }
        Self {
            ideas: project.idea_count(),
            modules,
            by_kind,
        }
    }

    /// Describes the first difference from `expected`, if any.
    pub fn mismatch(&self, expected: &ProjectStats) -> Option<String> {
        if self.ideas != expected.ideas {
            return Some(format!(
                "idea count mismatch (expected {}, got {})",
                expected.ideas, self.ideas
            ));
        }
        for (kind, count) in &expected.by_kind {
            let got = self.by_kind.get(kind).copied().unwrap_or(0);
            if got != *count {
                return Some(format!(
                    "{} module count mismatch (expected {}, got {})",
                    kind, count, got
                ));
            }
        }
        None
    }
}
