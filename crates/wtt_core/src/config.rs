//! Immutable configuration values injected at construction time.
//!
//! # Responsibility
//! - Carry CRM routing parameters (provider, segment, acting principal) to the gateway.
//! - Make resource-assignment policy switches explicit.
//!
//! # Invariants
//! - Values are never mutated after a gateway/service has been built from them.

use serde::{Deserialize, Serialize};

const DEFAULT_PROVIDER_NAME: &str = "CRX";
const DEFAULT_SEGMENT_NAME: &str = "Standard";
const DEFAULT_PRINCIPAL: &str = "admin-Standard";

/// Routing and identity parameters of the CRM kernel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Provider path segment, e.g. `CRX`.
    pub provider_name: String,
    /// Segment path segment, e.g. `Standard`.
    pub segment_name: String,
    /// Principal recorded in audit columns for every write.
    pub principal: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            segment_name: DEFAULT_SEGMENT_NAME.to_string(),
            principal: DEFAULT_PRINCIPAL.to_string(),
        }
    }
}

impl GatewayConfig {
    /// Returns a copy acting as another principal.
    pub fn with_principal(mut self, principal: impl Into<String>) -> Self {
        self.principal = principal.into();
        self
    }
}

/// Policy switches for resource assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResourcePolicy {
    /// Reject assignments whose resource is missing or disabled.
    pub require_active_resource: bool,
    /// Reject a second active assignment of the same resource on one project.
    pub unique_active_assignment: bool,
}

impl Default for ResourcePolicy {
    fn default() -> Self {
        Self {
            require_active_resource: true,
            unique_active_assignment: true,
        }
    }
}

impl ResourcePolicy {
    /// Policy that accepts dangling resources and repeated assignments.
    pub fn permissive() -> Self {
        Self {
            require_active_resource: false,
            unique_active_assignment: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GatewayConfig, ResourcePolicy};

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let config: GatewayConfig =
            serde_json::from_str(r#"{"segmentName":"Demo"}"#).expect("config should parse");
        assert_eq!(config.provider_name, "CRX");
        assert_eq!(config.segment_name, "Demo");
        assert_eq!(config.principal, "admin-Standard");
    }

    #[test]
    fn default_policy_is_strict() {
        let policy = ResourcePolicy::default();
        assert!(policy.require_active_resource);
        assert!(policy.unique_active_assignment);
        assert_ne!(policy, ResourcePolicy::permissive());
    }
}
