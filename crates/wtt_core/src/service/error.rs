//! Error taxonomy shared by hierarchy and resource services.

use crate::repo::crm_gateway::GatewayError;
use log::error;
use thiserror::Error;

/// Result type used by service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced to service callers.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Caller-supplied data violates a precondition.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Referenced entity does not exist or is disabled.
    #[error("not found: {0}")]
    NotFound(String),
    /// Caller-supplied id collides with an existing entity.
    #[error("duplicate: {0}")]
    Duplicate(String),
    /// Gateway failure or missing kernel configuration.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<GatewayError>,
    },
}

impl ServiceError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Stable short code used in log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::Duplicate(_) => "duplicate",
            Self::Internal { .. } => "internal",
        }
    }
}

impl From<GatewayError> for ServiceError {
    fn from(value: GatewayError) -> Self {
        Self::Internal {
            message: value.to_string(),
            source: Some(value),
        }
    }
}

/// Logs a failed mutation and converts it to `ServiceError::Internal`.
pub(crate) fn mutation_failed(
    module: &'static str,
    event: &'static str,
    target_id: &str,
    err: GatewayError,
) -> ServiceError {
    error!("event={event} module={module} status=error target_id={target_id} error={err}");
    ServiceError::from(err)
}
