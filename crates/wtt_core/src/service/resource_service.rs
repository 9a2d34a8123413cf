//! Resource assignment use-case service.
//!
//! # Responsibility
//! - Attach external resources to projects as `ResourceRef`s.
//! - Detach them by disabling the assignment; the resource itself is never touched.
//!
//! # Invariants
//! - Every mutation runs in one gateway transaction.
//! - `ResourcePolicy` decides whether dangling resources and repeated active
//!   assignments are accepted.

use crate::config::ResourcePolicy;
use crate::mapper::{map_to_resource_ref, new_resource_assignment, normalize_id};
use crate::model::crm::{Activity, CrmObject, EntityState};
use crate::model::query::ListQuery;
use crate::model::resource_ref::ResourceRef;
use crate::repo::crm_gateway::CrmGateway;
use crate::service::error::{mutation_failed, ServiceError, ServiceResult};
use crate::service::guard::{active_company, active_project, client_id_error};
use log::{debug, info};

const MODULE: &str = "resources";

/// Resource assignment service facade.
pub struct ResourceService<G: CrmGateway> {
    gateway: G,
    policy: ResourcePolicy,
}

impl<G: CrmGateway> ResourceService<G> {
    /// Creates service with the default (strict) policy.
    pub fn new(gateway: G) -> Self {
        Self::with_policy(gateway, ResourcePolicy::default())
    }

    pub fn with_policy(gateway: G, policy: ResourcePolicy) -> Self {
        Self { gateway, policy }
    }

    pub fn policy(&self) -> ResourcePolicy {
        self.policy
    }

    /// Lists active resource refs of a project in assignment order.
    pub fn list_resource_refs(
        &self,
        company_id: &str,
        project_id: &str,
        query: &ListQuery,
    ) -> ServiceResult<Vec<ResourceRef>> {
        let project = self.project(company_id, project_id)?;
        let refs: Vec<ResourceRef> = self
            .gateway
            .list_resource_assignments(project.id(), false)?
            .iter()
            .map(map_to_resource_ref)
            .collect();
        debug!(
            "event=resource_ref_list module={MODULE} status=ok project_id={} total={}",
            project.id(),
            refs.len()
        );
        Ok(query.apply(refs))
    }

    pub fn count_resource_refs(&self, company_id: &str, project_id: &str) -> ServiceResult<usize> {
        Ok(self
            .list_resource_refs(company_id, project_id, &ListQuery::unbounded())?
            .len())
    }

    /// Assigns a resource to a project with the member role.
    pub fn add_resource_ref(
        &self,
        company_id: &str,
        project_id: &str,
        resource_ref: &ResourceRef,
    ) -> ServiceResult<ResourceRef> {
        let project = self.project(company_id, project_id)?;
        if let Some(client_id) = resource_ref.id.as_deref() {
            let id = normalize_id(client_id);
            let exists = self
                .gateway
                .find_resource_assignment(project.id(), &id)?
                .is_some();
            return Err(client_id_error("resource ref", &id, exists));
        }

        let resource_id = normalize_id(&resource_ref.resource_id);
        if resource_id.is_empty() {
            return Err(ServiceError::Validation(
                "resource ref must reference a resource".to_string(),
            ));
        }

        let resource = self
            .gateway
            .find_resource(&resource_id)?
            .filter(CrmObject::is_active);
        if resource.is_none() && self.policy.require_active_resource {
            return Err(ServiceError::NotFound(format!(
                "no resource with ID <{resource_id}> found"
            )));
        }

        if self.policy.unique_active_assignment {
            let assigned = self
                .gateway
                .list_resource_assignments(project.id(), false)?
                .iter()
                .any(|assignment| assignment.resource_id.as_deref() == Some(resource_id.as_str()));
            if assigned {
                return Err(ServiceError::Duplicate(format!(
                    "resource <{resource_id}> is already assigned to project <{}>",
                    project.id()
                )));
            }
        }

        let name = resource
            .as_ref()
            .map_or(resource_ref.resource_name.as_str(), |resource| {
                resource.name.as_str()
            });
        let assignment = self
            .gateway
            .transaction(|gateway| {
                gateway.create_resource_assignment(
                    project.id(),
                    &new_resource_assignment(&resource_id, name),
                )
            })
            .map_err(|err| mutation_failed(MODULE, "resource_ref_add", project.id(), err))?;

        info!(
            "event=resource_ref_add module={MODULE} status=ok project_id={} resource_ref_id={} resolved={}",
            project.id(),
            assignment.id(),
            resource.is_some()
        );
        Ok(map_to_resource_ref(&assignment))
    }

    /// Disables one resource ref of a project.
    pub fn remove_resource_ref(
        &self,
        company_id: &str,
        project_id: &str,
        resource_ref_id: &str,
    ) -> ServiceResult<()> {
        let project = self.project(company_id, project_id)?;
        let id = normalize_id(resource_ref_id);
        let assignment = self
            .gateway
            .find_resource_assignment(project.id(), &id)?
            .filter(CrmObject::is_active)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("no resource ref with ID <{id}> found"))
            })?;

        self.gateway
            .transaction(|gateway| {
                gateway.set_resource_assignment_state(
                    project.id(),
                    assignment.id(),
                    EntityState::Disabled,
                )
            })
            .map_err(|err| mutation_failed(MODULE, "resource_ref_remove", assignment.id(), err))?;
        info!(
            "event=resource_ref_remove module={MODULE} status=ok project_id={} resource_ref_id={}",
            project.id(),
            assignment.id()
        );
        Ok(())
    }

    /// Disables every active assignment of `resource_id` on a project.
    pub fn remove_resource(
        &self,
        company_id: &str,
        project_id: &str,
        resource_id: &str,
    ) -> ServiceResult<()> {
        let project = self.project(company_id, project_id)?;
        let resource_id = normalize_id(resource_id);
        let matching: Vec<String> = self
            .gateway
            .list_resource_assignments(project.id(), false)?
            .iter()
            .filter(|assignment| assignment.resource_id.as_deref() == Some(resource_id.as_str()))
            .map(|assignment| assignment.id().to_string())
            .collect();
        if matching.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "resource <{resource_id}> is not assigned to project <{}>",
                project.id()
            )));
        }

        self.gateway
            .transaction(|gateway| {
                for assignment_id in &matching {
                    gateway.set_resource_assignment_state(
                        project.id(),
                        assignment_id,
                        EntityState::Disabled,
                    )?;
                }
                Ok(())
            })
            .map_err(|err| mutation_failed(MODULE, "resource_remove", project.id(), err))?;
        info!(
            "event=resource_remove module={MODULE} status=ok project_id={} resource_id={} removed={}",
            project.id(),
            resource_id,
            matching.len()
        );
        Ok(())
    }

    fn project(&self, company_id: &str, project_id: &str) -> ServiceResult<Activity> {
        let company = active_company(&self.gateway, company_id)?;
        active_project(&self.gateway, &company, project_id)
    }
}
