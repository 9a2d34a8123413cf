//! Company/project hierarchy use-case service.
//!
//! # Responsibility
//! - Company CRUD on top of customer project groups.
//! - Project and sub-project CRUD on top of activities linked by `is-child-of`.
//! - Tree materialization and recursive soft-delete cascades.
//!
//! # Invariants
//! - Ids are gateway-assigned; a client-supplied id is always rejected.
//! - A project belongs to the company whose tracker it is assigned to; links
//!   into another company's tracker are never followed.
//! - Tree materialization visits every node at most once and aborts with
//!   `ServiceError::Internal` on a revisit.
//! - Company delete is atomic; project delete cascades best-effort, one
//!   transaction per node.

use crate::mapper::{
    company_changes, map_to_company, map_to_project, new_activity_params, new_tracker,
    normalize_id, project_changes,
};
use crate::model::company::Company;
use crate::model::crm::{
    Activity, ActivityClass, ActivityLinkType, ActivityTracker, CrmObject, EntityState,
};
use crate::model::project::{Project, ProjectTreeNode};
use crate::model::query::ListQuery;
use crate::repo::crm_gateway::{ActivityScope, CrmGateway, GatewayResult};
use crate::service::error::{mutation_failed, ServiceError, ServiceResult};
use crate::service::guard::{
    active_company, active_project, client_id_error, normalize_title,
};
use log::{debug, error, info, warn};
use std::collections::HashSet;

const MODULE: &str = "hierarchy";

/// Company/project hierarchy service facade.
pub struct HierarchyService<G: CrmGateway> {
    gateway: G,
}

impl<G: CrmGateway> HierarchyService<G> {
    /// Creates service from gateway implementation.
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Lists active companies sorted by title, then applies the window.
    pub fn list_companies(&self, query: &ListQuery) -> ServiceResult<Vec<Company>> {
        let mut companies: Vec<Company> = self
            .gateway
            .list_customer_project_groups(false)?
            .iter()
            .filter(|tracker| tracker.is_active())
            .map(map_to_company)
            .collect();
        companies.sort_by(Company::compare_by_title);
        let total = companies.len();
        let companies = query.apply(companies);
        debug!(
            "event=company_list module={MODULE} status=ok total={} returned={} position={} query={:?}",
            total,
            companies.len(),
            query.position,
            query.query
        );
        Ok(companies)
    }

    pub fn count_companies(&self) -> ServiceResult<usize> {
        Ok(self.list_companies(&ListQuery::unbounded())?.len())
    }

    /// Creates a company and its customer organisation link.
    ///
    /// # Contract
    /// - Client id: `Duplicate` when it names an existing company, else `Validation`.
    /// - Blank title: `Validation`.
    /// - `org_id`, when given, must name an active legal entity (`Validation`);
    ///   otherwise the legal entity is found by title or created.
    pub fn create_company(&self, company: &Company) -> ServiceResult<Company> {
        if let Some(client_id) = company.id.as_deref() {
            let id = normalize_id(client_id);
            let exists = self.gateway.find_tracker(&id)?.is_some();
            return Err(client_id_error("company", &id, exists));
        }
        let title = normalize_title(&company.title, "company")?;

        let customer = match company.org_id.as_deref() {
            Some(org_id) => {
                let org_id = normalize_id(org_id);
                let entity = self
                    .gateway
                    .find_legal_entity(&org_id)?
                    .filter(|entity| entity.is_active())
                    .ok_or_else(|| {
                        ServiceError::Validation(format!(
                            "company references unknown organisation <{org_id}>"
                        ))
                    })?;
                Some(entity)
            }
            None => None,
        };

        let fields = Company {
            title,
            ..company.clone()
        };
        let tracker = self
            .gateway
            .transaction(|gateway| {
                let customer = match customer {
                    Some(entity) => entity,
                    None => match gateway.find_legal_entity_by_name(&fields.title)? {
                        Some(entity) => entity,
                        None => gateway.create_legal_entity(&fields.title)?,
                    },
                };
                gateway.create_customer_project_group(&new_tracker(&fields), &customer)
            })
            .map_err(|err| mutation_failed(MODULE, "company_create", &fields.title, err))?;

        let created = map_to_company(&tracker);
        info!(
            "event=company_create module={MODULE} status=ok company_id={} org_id={}",
            tracker.id(),
            created.org_id.as_deref().unwrap_or_default()
        );
        Ok(created)
    }

    pub fn read_company(&self, company_id: &str) -> ServiceResult<Company> {
        let tracker = active_company(&self.gateway, company_id)?;
        Ok(map_to_company(&tracker))
    }

    /// Replaces title and description of a company.
    pub fn update_company(&self, company_id: &str, company: &Company) -> ServiceResult<Company> {
        let tracker = active_company(&self.gateway, company_id)?;
        let fields = Company {
            title: normalize_title(&company.title, "company")?,
            ..company.clone()
        };
        self.gateway
            .transaction(|gateway| gateway.update_tracker(tracker.id(), &company_changes(&fields)))
            .map_err(|err| mutation_failed(MODULE, "company_update", tracker.id(), err))?;
        info!(
            "event=company_update module={MODULE} status=ok company_id={}",
            tracker.id()
        );
        self.read_company(tracker.id())
    }

    /// Disables a company and every active project assigned to it in one
    /// transaction. Projects of other companies stay untouched even when linked
    /// below one of its projects.
    pub fn delete_company(&self, company_id: &str) -> ServiceResult<()> {
        let tracker = active_company(&self.gateway, company_id)?;
        let disabled = self
            .gateway
            .transaction(|gateway| {
                gateway.set_tracker_state(tracker.id(), EntityState::Disabled)?;
                let projects =
                    gateway.list_tracker_activities(tracker.id(), ActivityScope::All, false)?;
                for project in &projects {
                    gateway.set_activity_state(project.id(), EntityState::Disabled)?;
                }
                Ok(projects.len())
            })
            .map_err(|err| mutation_failed(MODULE, "company_delete", tracker.id(), err))?;
        info!(
            "event=company_delete module={MODULE} status=ok company_id={} projects_disabled={}",
            tracker.id(),
            disabled
        );
        Ok(())
    }

    /// Lists top-level projects of a company without children.
    pub fn list_projects(&self, company_id: &str, query: &ListQuery) -> ServiceResult<Vec<Project>> {
        let tracker = active_company(&self.gateway, company_id)?;
        let activities =
            self.gateway
                .list_tracker_activities(tracker.id(), ActivityScope::TopLevel, false)?;
        Ok(query.apply(activities.iter().map(map_to_project).collect()))
    }

    /// Lists projects of a company.
    ///
    /// - `as_tree = true`: top-level projects with their full sub-project trees.
    /// - `as_tree = false`: every project of the company, flat, no children.
    pub fn list_all_projects(
        &self,
        company_id: &str,
        as_tree: bool,
        query: &ListQuery,
    ) -> ServiceResult<Vec<Project>> {
        let tracker = active_company(&self.gateway, company_id)?;
        if !as_tree {
            let activities =
                self.gateway
                    .list_tracker_activities(tracker.id(), ActivityScope::All, false)?;
            return Ok(query.apply(activities.iter().map(map_to_project).collect()));
        }

        let roots = query.apply(self.gateway.list_tracker_activities(
            tracker.id(),
            ActivityScope::TopLevel,
            false,
        )?);
        let mut visited = HashSet::new();
        roots
            .iter()
            .map(|root| self.materialize(root, &mut visited))
            .collect()
    }

    pub fn count_projects(&self, company_id: &str) -> ServiceResult<usize> {
        Ok(self
            .list_projects(company_id, &ListQuery::unbounded())?
            .len())
    }

    /// Returns the company's project tree with resource ref ids per project.
    pub fn read_as_tree(&self, company_id: &str) -> ServiceResult<ProjectTreeNode> {
        let tracker = active_company(&self.gateway, company_id)?;
        let roots =
            self.gateway
                .list_tracker_activities(tracker.id(), ActivityScope::TopLevel, false)?;
        let mut visited = HashSet::new();
        let projects = roots
            .iter()
            .map(|root| self.tree_node(root, &mut visited))
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(ProjectTreeNode {
            id: tracker.id().to_string(),
            title: tracker.name.clone(),
            projects,
            resources: Vec::new(),
        })
    }

    /// Creates a top-level project of a company.
    pub fn create_project(&self, company_id: &str, project: &Project) -> ServiceResult<Project> {
        let tracker = active_company(&self.gateway, company_id)?;
        let fields = self.validate_new_project(project)?;
        self.create_activity(&tracker, &fields, None)
    }

    /// Creates a project linked as child of `parent_id`.
    pub fn create_subproject(
        &self,
        company_id: &str,
        parent_id: &str,
        project: &Project,
    ) -> ServiceResult<Project> {
        let tracker = active_company(&self.gateway, company_id)?;
        let parent = active_project(&self.gateway, &tracker, parent_id)?;
        let fields = self.validate_new_project(project)?;
        self.create_activity(&tracker, &fields, Some(&parent))
    }

    /// Reads a project with its sub-project tree.
    pub fn read_project(&self, company_id: &str, project_id: &str) -> ServiceResult<Project> {
        let tracker = active_company(&self.gateway, company_id)?;
        let activity = active_project(&self.gateway, &tracker, project_id)?;
        self.materialize(&activity, &mut HashSet::new())
    }

    /// Reads a sub-project of `project_id` with its own sub-project tree.
    pub fn read_subproject(
        &self,
        company_id: &str,
        project_id: &str,
        subproject_id: &str,
    ) -> ServiceResult<Project> {
        let tracker = active_company(&self.gateway, company_id)?;
        let subproject = self.active_subproject(&tracker, project_id, subproject_id)?;
        self.materialize(&subproject, &mut HashSet::new())
    }

    /// Lists direct sub-projects of a project without children.
    pub fn list_subprojects(
        &self,
        company_id: &str,
        project_id: &str,
        query: &ListQuery,
    ) -> ServiceResult<Vec<Project>> {
        let tracker = active_company(&self.gateway, company_id)?;
        let parent = active_project(&self.gateway, &tracker, project_id)?;
        let children = self.children(&parent, false)?;
        Ok(query.apply(children.iter().map(map_to_project).collect()))
    }

    pub fn count_subprojects(&self, company_id: &str, project_id: &str) -> ServiceResult<usize> {
        Ok(self
            .list_subprojects(company_id, project_id, &ListQuery::unbounded())?
            .len())
    }

    /// Replaces title and description of a project.
    pub fn update_project(
        &self,
        company_id: &str,
        project_id: &str,
        project: &Project,
    ) -> ServiceResult<Project> {
        let tracker = active_company(&self.gateway, company_id)?;
        let activity = active_project(&self.gateway, &tracker, project_id)?;
        self.update_activity(&activity, project)?;
        self.read_project(tracker.id(), activity.id())
    }

    /// Replaces title and description of a sub-project.
    pub fn update_subproject(
        &self,
        company_id: &str,
        project_id: &str,
        subproject_id: &str,
        project: &Project,
    ) -> ServiceResult<Project> {
        let tracker = active_company(&self.gateway, company_id)?;
        let subproject = self.active_subproject(&tracker, project_id, subproject_id)?;
        self.update_activity(&subproject, project)?;
        self.read_subproject(tracker.id(), project_id, subproject.id())
    }

    /// Disables a project and, best-effort, all of its descendants.
    pub fn delete_project(&self, company_id: &str, project_id: &str) -> ServiceResult<()> {
        let tracker = active_company(&self.gateway, company_id)?;
        let activity = active_project(&self.gateway, &tracker, project_id)?;
        self.disable_cascade(&activity)
    }

    /// Disables a sub-project and, best-effort, all of its descendants.
    pub fn delete_subproject(
        &self,
        company_id: &str,
        project_id: &str,
        subproject_id: &str,
    ) -> ServiceResult<()> {
        let tracker = active_company(&self.gateway, company_id)?;
        let subproject = self.active_subproject(&tracker, project_id, subproject_id)?;
        self.disable_cascade(&subproject)
    }

    fn validate_new_project(&self, project: &Project) -> ServiceResult<Project> {
        if let Some(client_id) = project.id.as_deref() {
            let id = normalize_id(client_id);
            let exists = self.gateway.find_activity(&id)?.is_some();
            return Err(client_id_error("project", &id, exists));
        }
        Ok(Project {
            title: normalize_title(&project.title, "project")?,
            projects: Vec::new(),
            ..project.clone()
        })
    }

    fn create_activity(
        &self,
        tracker: &ActivityTracker,
        fields: &Project,
        parent: Option<&Activity>,
    ) -> ServiceResult<Project> {
        let creator = self
            .gateway
            .find_activity_creator(tracker.id(), ActivityClass::Incident)?
            .ok_or_else(|| {
                error!(
                    "event=project_create module={MODULE} status=error error_code=missing_activity_creator company_id={}",
                    tracker.id()
                );
                ServiceError::internal(format!(
                    "company <{}> has no incident activity creator",
                    tracker.id()
                ))
            })?;

        let activity = self
            .gateway
            .transaction(|gateway| {
                let activity = gateway.new_activity(&creator, &new_activity_params(fields))?;
                if let Some(parent) = parent {
                    gateway.link_activities(
                        activity.id(),
                        parent.id(),
                        ActivityLinkType::IsChildOf,
                    )?;
                }
                Ok(activity)
            })
            .map_err(|err| mutation_failed(MODULE, "project_create", tracker.id(), err))?;

        info!(
            "event=project_create module={MODULE} status=ok company_id={} project_id={} parent_id={}",
            tracker.id(),
            activity.id(),
            parent.map(|parent| parent.id()).unwrap_or("-")
        );
        Ok(map_to_project(&activity))
    }

    fn update_activity(&self, activity: &Activity, project: &Project) -> ServiceResult<()> {
        let fields = Project {
            title: normalize_title(&project.title, "project")?,
            ..project.clone()
        };
        self.gateway
            .transaction(|gateway| gateway.update_activity(activity.id(), &project_changes(&fields)))
            .map_err(|err| mutation_failed(MODULE, "project_update", activity.id(), err))?;
        info!(
            "event=project_update module={MODULE} status=ok project_id={}",
            activity.id()
        );
        Ok(())
    }

    fn active_subproject(
        &self,
        tracker: &ActivityTracker,
        project_id: &str,
        subproject_id: &str,
    ) -> ServiceResult<Activity> {
        let parent = active_project(&self.gateway, tracker, project_id)?;
        let subproject = active_project(&self.gateway, tracker, subproject_id)?;
        let linked = self
            .children(&parent, false)?
            .iter()
            .any(|child| child.id() == subproject.id());
        if !linked {
            return Err(ServiceError::NotFound(format!(
                "no sub-project with ID <{}> found under project <{}>",
                subproject.id(),
                parent.id()
            )));
        }
        Ok(subproject)
    }

    fn materialize(
        &self,
        activity: &Activity,
        visited: &mut HashSet<String>,
    ) -> ServiceResult<Project> {
        enter_node(activity, visited)?;
        let mut project = map_to_project(activity);
        for child in self.children(activity, false)? {
            project.projects.push(self.materialize(&child, visited)?);
        }
        Ok(project)
    }

    fn tree_node(
        &self,
        activity: &Activity,
        visited: &mut HashSet<String>,
    ) -> ServiceResult<ProjectTreeNode> {
        enter_node(activity, visited)?;
        let resources = self
            .gateway
            .list_resource_assignments(activity.id(), false)?
            .iter()
            .map(|assignment| assignment.id().to_string())
            .collect();
        let projects = self
            .children(activity, false)?
            .iter()
            .map(|child| self.tree_node(child, visited))
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(ProjectTreeNode {
            id: activity.id().to_string(),
            title: activity.name.clone(),
            projects,
            resources,
        })
    }

    fn disable_cascade(&self, root: &Activity) -> ServiceResult<()> {
        self.gateway
            .transaction(|gateway| gateway.set_activity_state(root.id(), EntityState::Disabled))
            .map_err(|err| mutation_failed(MODULE, "project_delete", root.id(), err))?;

        let mut visited = HashSet::from([root.id().to_string()]);
        let failures = self.disable_descendants(root, &mut visited);
        if failures == 0 {
            info!(
                "event=project_delete module={MODULE} status=ok project_id={} descendants_visited={}",
                root.id(),
                visited.len() - 1
            );
        } else {
            warn!(
                "event=project_delete module={MODULE} status=partial project_id={} descendants_visited={} failures={}",
                root.id(),
                visited.len() - 1,
                failures
            );
        }
        Ok(())
    }

    /// Direct sub-projects of `parent` within the parent's company.
    fn children(
        &self,
        parent: &Activity,
        include_disabled: bool,
    ) -> GatewayResult<Vec<Activity>> {
        let mut children = self.gateway.list_linked_activities(
            parent.id(),
            ActivityLinkType::IsChildOf,
            include_disabled,
        )?;
        children.retain(|child| child.tracker_id == parent.tracker_id);
        Ok(children)
    }

    /// Depth-first disable below `parent`; returns the number of failures.
    ///
    /// Disabled children are walked too, so active descendants left behind by an
    /// earlier partial cascade are still reached.
    fn disable_descendants(&self, parent: &Activity, visited: &mut HashSet<String>) -> usize {
        let children = match self.children(parent, true) {
            Ok(children) => children,
            Err(err) => {
                warn!(
                    "event=project_cascade module={MODULE} status=error project_id={} error={}",
                    parent.id(),
                    err
                );
                return 1;
            }
        };

        let mut failures = 0;
        for child in children {
            if !visited.insert(child.id().to_string()) {
                warn!(
                    "event=project_cascade module={MODULE} status=skipped error_code=cycle project_id={}",
                    child.id()
                );
                continue;
            }
            if child.is_active() {
                if let Err(err) = self.gateway.transaction(|gateway| {
                    gateway.set_activity_state(child.id(), EntityState::Disabled)
                }) {
                    warn!(
                        "event=project_cascade module={MODULE} status=error project_id={} error={}",
                        child.id(),
                        err
                    );
                    failures += 1;
                }
            }
            failures += self.disable_descendants(&child, visited);
        }
        failures
    }
}

fn enter_node(activity: &Activity, visited: &mut HashSet<String>) -> ServiceResult<()> {
    if visited.insert(activity.id().to_string()) {
        return Ok(());
    }
    error!(
        "event=project_tree module={MODULE} status=error error_code=cycle project_id={}",
        activity.id()
    );
    Err(ServiceError::internal(format!(
        "project hierarchy revisits project <{}>",
        activity.id()
    )))
}
