//! Hierarchy and resource-assignment use-case services.
//!
//! # Responsibility
//! - Enforce company/project/resource-ref invariants above the gateway.
//! - Keep callers decoupled from kernel object shapes and storage details.
//!
//! # Invariants
//! - Disabled kernel objects are reported as `NotFound` at every read boundary.
//! - Precondition failures are raised before any mutating gateway call.

pub mod error;
mod guard;
pub mod hierarchy_service;
pub mod resource_service;
