//! Project model and its tree projection.

use serde::{Deserialize, Serialize};

/// Project or sub-project as seen by service callers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Gateway-assigned id. Must be `None` on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Materialized sub-projects; empty unless the project was read as a tree.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default)]
    pub modified_by: Option<String>,
}

impl Project {
    /// Creates an unsaved project with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Id or empty string for unsaved projects.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or_default()
    }
}

/// Company-rooted tree of project ids, titles and resource ref ids.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectTreeNode {
    pub id: String,
    pub title: String,
    pub projects: Vec<ProjectTreeNode>,
    /// Ids of the active resource refs of this project.
    pub resources: Vec<String>,
}
