//! CRM gateway contract.
//!
//! # Responsibility
//! - Provide lookup-by-id, query, create, and transactional mutation over the
//!   kernel's trackers, activities, accounts, resources and assignments.
//!
//! # Invariants
//! - `transaction` commits when `body` succeeds and rolls back otherwise.
//! - List queries return deterministic order: name, then id (assignments in
//!   insertion order).

use crate::db::DbError;
use crate::model::crm::{
    Activity, ActivityClass, ActivityCreator, ActivityLinkType, ActivityTracker, EntityState,
    FieldChanges, LegalEntity, NewActivityParams, NewResourceAssignment, NewTracker, Resource,
    ResourceAssignment,
};
use thiserror::Error;

/// Result type used by gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Errors from gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Underlying SQLite/bootstrap error.
    #[error(transparent)]
    Db(#[from] DbError),
    /// Mutation addressed an object that does not exist.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    /// Connection schema is not at the expected migrated version.
    #[error("gateway requires schema version {expected_version}, got {actual_version}")]
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    #[error("gateway requires table `{0}`")]
    MissingRequiredTable(&'static str),
    /// Persisted data cannot be converted to a valid kernel object.
    #[error("invalid persisted data: {0}")]
    InvalidData(String),
}

impl From<rusqlite::Error> for GatewayError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Which activities of a tracker a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityScope {
    /// Activities that are not the child of another activity of the same tracker.
    TopLevel,
    /// Every activity assigned to the tracker.
    All,
}

/// Gateway into the CRM activity kernel.
pub trait CrmGateway {
    /// Runs `body` in one transaction; commits on `Ok`, rolls back on `Err`.
    fn transaction<T, F>(&self, body: F) -> GatewayResult<T>
    where
        Self: Sized,
        F: FnOnce(&Self) -> GatewayResult<T>;

    /// Loads a customer project group by id, disabled ones included.
    fn find_tracker(&self, tracker_id: &str) -> GatewayResult<Option<ActivityTracker>>;
    /// Lists customer project groups ordered by name.
    fn list_customer_project_groups(
        &self,
        include_disabled: bool,
    ) -> GatewayResult<Vec<ActivityTracker>>;
    /// Creates a customer project group with its customer assignment and incident creator.
    fn create_customer_project_group(
        &self,
        tracker: &NewTracker,
        customer: &LegalEntity,
    ) -> GatewayResult<ActivityTracker>;
    fn update_tracker(&self, tracker_id: &str, changes: &FieldChanges) -> GatewayResult<()>;
    fn set_tracker_state(&self, tracker_id: &str, state: EntityState) -> GatewayResult<()>;

    /// Loads a legal entity account by id, disabled ones included.
    fn find_legal_entity(&self, account_id: &str) -> GatewayResult<Option<LegalEntity>>;
    /// Finds the oldest active legal entity with exactly this name.
    fn find_legal_entity_by_name(&self, name: &str) -> GatewayResult<Option<LegalEntity>>;
    fn create_legal_entity(&self, name: &str) -> GatewayResult<LegalEntity>;

    /// Loads an activity by id, disabled ones included.
    fn find_activity(&self, activity_id: &str) -> GatewayResult<Option<Activity>>;
    fn list_tracker_activities(
        &self,
        tracker_id: &str,
        scope: ActivityScope,
        include_disabled: bool,
    ) -> GatewayResult<Vec<Activity>>;
    /// Lists activities holding a `link_type` link to `target_id`.
    fn list_linked_activities(
        &self,
        target_id: &str,
        link_type: ActivityLinkType,
        include_disabled: bool,
    ) -> GatewayResult<Vec<Activity>>;
    fn find_activity_creator(
        &self,
        tracker_id: &str,
        activity_class: ActivityClass,
    ) -> GatewayResult<Option<ActivityCreator>>;
    /// Creates an activity through the creator; it is assigned to the creator's tracker.
    fn new_activity(
        &self,
        creator: &ActivityCreator,
        params: &NewActivityParams,
    ) -> GatewayResult<Activity>;
    /// Records `from_id` <link_type> `to_id`.
    fn link_activities(
        &self,
        from_id: &str,
        to_id: &str,
        link_type: ActivityLinkType,
    ) -> GatewayResult<()>;
    fn update_activity(&self, activity_id: &str, changes: &FieldChanges) -> GatewayResult<()>;
    fn set_activity_state(&self, activity_id: &str, state: EntityState) -> GatewayResult<()>;

    /// Loads a resource by id, disabled ones included.
    fn find_resource(&self, resource_id: &str) -> GatewayResult<Option<Resource>>;
    fn create_resource(&self, name: &str, contact_id: Option<&str>) -> GatewayResult<Resource>;

    /// Lists assignments of one activity in insertion order.
    fn list_resource_assignments(
        &self,
        activity_id: &str,
        include_disabled: bool,
    ) -> GatewayResult<Vec<ResourceAssignment>>;
    /// Loads an assignment of one activity, disabled ones included.
    fn find_resource_assignment(
        &self,
        activity_id: &str,
        assignment_id: &str,
    ) -> GatewayResult<Option<ResourceAssignment>>;
    fn create_resource_assignment(
        &self,
        activity_id: &str,
        assignment: &NewResourceAssignment,
    ) -> GatewayResult<ResourceAssignment>;
    fn set_resource_assignment_state(
        &self,
        activity_id: &str,
        assignment_id: &str,
        state: EntityState,
    ) -> GatewayResult<()>;
}
