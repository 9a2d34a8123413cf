//! Precondition checks shared by the services.

use crate::mapper::normalize_id;
use crate::model::crm::{Activity, ActivityTracker, CrmObject};
use crate::repo::crm_gateway::CrmGateway;
use crate::service::error::{ServiceError, ServiceResult};

/// Loads an active company tracker or fails with `NotFound`.
pub(crate) fn active_company<G: CrmGateway>(
    gateway: &G,
    company_id: &str,
) -> ServiceResult<ActivityTracker> {
    let id = normalize_id(company_id);
    gateway
        .find_tracker(&id)?
        .filter(CrmObject::is_active)
        .ok_or_else(|| ServiceError::NotFound(format!("no company with ID <{id}> found")))
}

/// Loads an active project of `company` or fails with `NotFound`.
pub(crate) fn active_project<G: CrmGateway>(
    gateway: &G,
    company: &ActivityTracker,
    project_id: &str,
) -> ServiceResult<Activity> {
    let id = normalize_id(project_id);
    gateway
        .find_activity(&id)?
        .filter(|activity| activity.is_active() && activity.tracker_id == company.id())
        .ok_or_else(|| ServiceError::NotFound(format!("no project with ID <{id}> found")))
}

/// Trims a title and rejects blank ones.
pub(crate) fn normalize_title(title: &str, entity: &str) -> ServiceResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(format!(
            "{entity} must contain a valid title"
        )));
    }
    Ok(trimmed.to_string())
}

/// Builds the error for a client-supplied id: `Duplicate` when it exists,
/// `Validation` otherwise.
pub(crate) fn client_id_error(entity: &str, id: &str, exists: bool) -> ServiceError {
    if exists {
        ServiceError::Duplicate(format!("{entity} with ID <{id}> exists already"))
    } else {
        ServiceError::Validation(format!(
            "{entity} <{id}> contains an ID generated on the client; this is not allowed"
        ))
    }
}
