//! Translation between kernel objects and service models.
//!
//! # Responsibility
//! - Project trackers, activities and resource assignments into `Company`,
//!   `Project` and `ResourceRef`.
//! - Build the writable kernel fields (name, description) from service models.
//!
//! # Invariants
//! - Functions are pure; they never call the gateway.
//! - Audit metadata is copied through unchanged.
//! - External ids are the last segment of the kernel object's path.

use crate::model::company::Company;
use crate::model::crm::{
    Activity, ActivityTracker, CrmObject, FieldChanges, NewActivityParams, NewResourceAssignment,
    NewTracker, ObjectPath, ResourceAssignment, ResourceRole, PRIORITY_NA,
};
use crate::model::project::Project;
use crate::model::resource_ref::{ResourceRef, UNDEFINED_RESOURCE_ID};

/// Maps a customer project group to a company.
pub fn map_to_company(tracker: &ActivityTracker) -> Company {
    Company {
        id: Some(tracker.id().to_string()),
        title: tracker.name.clone(),
        description: tracker.description.clone(),
        org_id: tracker.customer_id.clone(),
        created_at: Some(tracker.audit.created_at),
        created_by: Some(tracker.audit.created_by.clone()),
        modified_at: Some(tracker.audit.modified_at),
        modified_by: Some(tracker.audit.modified_by.clone()),
    }
}

/// Maps an activity to a project without children.
pub fn map_to_project(activity: &Activity) -> Project {
    Project {
        id: Some(activity.id().to_string()),
        title: activity.name.clone(),
        description: activity.description.clone(),
        projects: Vec::new(),
        created_at: Some(activity.audit.created_at),
        created_by: Some(activity.audit.created_by.clone()),
        modified_at: Some(activity.audit.modified_at),
        modified_by: Some(activity.audit.modified_by.clone()),
    }
}

/// Maps a resource assignment to a resource ref.
///
/// The live resource name wins over the name recorded on the assignment.
pub fn map_to_resource_ref(assignment: &ResourceAssignment) -> ResourceRef {
    ResourceRef {
        id: Some(assignment.id().to_string()),
        resource_id: assignment
            .resource_id
            .clone()
            .unwrap_or_else(|| UNDEFINED_RESOURCE_ID.to_string()),
        resource_name: assignment
            .resource_name
            .clone()
            .unwrap_or_else(|| assignment.name.clone()),
        created_at: Some(assignment.audit.created_at),
        created_by: Some(assignment.audit.created_by.clone()),
        modified_at: Some(assignment.audit.modified_at),
        modified_by: Some(assignment.audit.modified_by.clone()),
    }
}

pub fn company_changes(company: &Company) -> FieldChanges {
    FieldChanges {
        name: company.title.clone(),
        description: company.description.clone(),
    }
}

pub fn project_changes(project: &Project) -> FieldChanges {
    FieldChanges {
        name: project.title.clone(),
        description: project.description.clone(),
    }
}

pub fn new_tracker(company: &Company) -> NewTracker {
    NewTracker {
        name: company.title.clone(),
        description: company.description.clone(),
    }
}

/// Projects are scheduled at creation time with priority n/a.
pub fn new_activity_params(project: &Project) -> NewActivityParams {
    NewActivityParams {
        name: project.title.clone(),
        description: project.description.clone(),
        scheduled_start: None,
        scheduled_end: None,
        priority: PRIORITY_NA,
    }
}

/// Builds a member assignment of `resource_id` recording `name` for display.
pub fn new_resource_assignment(resource_id: &str, name: &str) -> NewResourceAssignment {
    NewResourceAssignment {
        name: name.to_string(),
        resource_id: Some(resource_id.to_string()),
        role: ResourceRole::Member,
    }
}

/// Accepts either a bare id or a full XRI path and returns the bare id.
pub fn normalize_id(id: &str) -> String {
    match ObjectPath::parse(id) {
        Some(path) => path.last_segment().to_string(),
        None => id.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        map_to_company, map_to_project, map_to_resource_ref, new_activity_params, normalize_id,
    };
    use crate::model::crm::{
        Activity, ActivityTracker, AuditInfo, EntityState, ObjectPath, ResourceAssignment,
        ResourceRole, ACTIVITY_PACKAGE, PRIORITY_NA,
    };
    use crate::model::project::Project;

    fn root() -> ObjectPath {
        ObjectPath::segment_root(ACTIVITY_PACKAGE, "CRX", "Standard")
    }

    fn audit() -> AuditInfo {
        AuditInfo {
            created_at: 1_000,
            created_by: "alice".to_string(),
            modified_at: 2_000,
            modified_by: "bob".to_string(),
        }
    }

    #[test]
    fn company_id_is_independent_of_provider_and_segment() {
        let tracker = ActivityTracker {
            path: ObjectPath::segment_root(ACTIVITY_PACKAGE, "Other", "Demo")
                .descendant(&["activityTracker", "T1"]),
            name: "Acme Corp".to_string(),
            description: Some("customer".to_string()),
            customer_id: Some("ORG1".to_string()),
            state: EntityState::Active,
            audit: audit(),
        };
        let company = map_to_company(&tracker);
        assert_eq!(company.id.as_deref(), Some("T1"));
        assert_eq!(company.title, "Acme Corp");
        assert_eq!(company.org_id.as_deref(), Some("ORG1"));
        assert_eq!(company.created_by.as_deref(), Some("alice"));
        assert_eq!(company.modified_at, Some(2_000));
    }

    #[test]
    fn project_mapping_leaves_children_empty() {
        let activity = Activity {
            path: root().descendant(&["activity", "A1"]),
            tracker_id: "T1".to_string(),
            name: "Phase 1".to_string(),
            description: None,
            scheduled_start: None,
            scheduled_end: None,
            priority: 0,
            state: EntityState::Active,
            audit: audit(),
        };
        let project = map_to_project(&activity);
        assert_eq!(project.id.as_deref(), Some("A1"));
        assert!(project.projects.is_empty());
    }

    #[test]
    fn resource_ref_falls_back_when_resource_is_unresolved() {
        let assignment = ResourceAssignment {
            path: root().descendant(&["activity", "A1", "assignedResource", "R1"]),
            activity_id: "A1".to_string(),
            resource_id: None,
            resource_name: None,
            name: "Jane Doe".to_string(),
            role: ResourceRole::Member,
            state: EntityState::Active,
            audit: audit(),
        };
        let resource_ref = map_to_resource_ref(&assignment);
        assert_eq!(resource_ref.id.as_deref(), Some("R1"));
        assert_eq!(resource_ref.resource_id, "UNDEF");
        assert_eq!(resource_ref.resource_name, "Jane Doe");
    }

    #[test]
    fn new_project_is_scheduled_by_the_kernel_with_priority_na() {
        let params = new_activity_params(&Project::new("Phase 1").with_description("kickoff"));
        assert_eq!(params.name, "Phase 1");
        assert_eq!(params.description.as_deref(), Some("kickoff"));
        assert_eq!(params.scheduled_start, None);
        assert_eq!(params.scheduled_end, None);
        assert_eq!(params.priority, PRIORITY_NA);
    }

    #[test]
    fn normalize_id_strips_xri_prefix() {
        assert_eq!(
            normalize_id("xri://@openmdx*org.opencrx.kernel.activity1/provider/CRX/segment/Standard/activity/A1"),
            "A1"
        );
        assert_eq!(normalize_id(" A1 "), "A1");
    }
}
