//! Company model.
//!
//! A company is a customer owning a project hierarchy. It is stored as an
//! activity tracker of type customer project group.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Company as seen by service callers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    /// Gateway-assigned id. Must be `None` on create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Id of the customer organisation account.
    #[serde(default)]
    pub org_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub modified_at: Option<i64>,
    #[serde(default)]
    pub modified_by: Option<String>,
}

impl Company {
    /// Creates an unsaved company with the given title.
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

    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Stable list ordering: case-insensitive title, then exact title, then id.
    pub fn compare_by_title(left: &Company, right: &Company) -> Ordering {
        left.title
            .to_lowercase()
            .cmp(&right.title.to_lowercase())
            .then_with(|| left.title.cmp(&right.title))
            .then_with(|| left.id.cmp(&right.id))
    }
}

#[cfg(test)]
mod tests {
    use super::Company;

    fn company(id: &str, title: &str) -> Company {
        Company {
            id: Some(id.to_string()),
            ..Company::new(title)
        }
    }

    #[test]
    fn comparator_ignores_case_and_breaks_ties_by_id() {
        let mut companies = vec![
            company("3", "beta"),
            company("2", "Alpha"),
            company("1", "Beta"),
            company("0", "beta"),
        ];
        companies.sort_by(Company::compare_by_title);
        let ids: Vec<_> = companies
            .iter()
            .map(|c| c.id.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["2", "1", "0", "3"]);
    }
}
