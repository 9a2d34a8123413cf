//! Core domain logic for the work-time-tracking hierarchy service.
//! Companies, projects and resource refs are projected onto a CRM activity
//! kernel reached through the `CrmGateway` contract.

pub mod config;
pub mod db;
pub mod logging;
pub mod mapper;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{GatewayConfig, ResourcePolicy};
pub use logging::{default_log_level, init_logging, LoggingError};
pub use model::company::Company;
pub use model::project::{Project, ProjectTreeNode};
pub use model::query::ListQuery;
pub use model::resource_ref::{ResourceRef, UNDEFINED_RESOURCE_ID};
pub use repo::crm_gateway::{CrmGateway, GatewayError, GatewayResult};
pub use repo::sqlite_gateway::SqliteCrmGateway;
pub use service::error::{ServiceError, ServiceResult};
pub use service::hierarchy_service::HierarchyService;
pub use service::resource_service::ResourceService;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
