//! Resource reference model.

use serde::{Deserialize, Serialize};

/// Resource id reported for assignments that reference no resource.
pub const UNDEFINED_RESOURCE_ID: &str = "UNDEF";

/// Assignment of an external resource to a project.
///
/// Removing a `ResourceRef` never touches the referenced resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    /// Gateway-assigned id. Must be `None` on add.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub resource_id: String,
    /// Display copy of the resource name.
    #[serde(default)]
    pub resource_name: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default)]
    pub modified_by: Option<String>,
}

impl ResourceRef {
    /// Creates an unsaved reference to `resource_id`.
    pub fn new(resource_id: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_name: resource_name.into(),
            ..Self::default()
        }
    }
}
