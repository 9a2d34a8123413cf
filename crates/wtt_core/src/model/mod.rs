//! Domain models of the work-time-tracking service and the foreign CRM objects
//! they are projected from.
//!
//! # Responsibility
//! - Define the plain data models returned to callers (`Company`, `Project`,
//!   `ResourceRef`, `ProjectTreeNode`).
//! - Define the kernel object shapes handed out by the gateway (`crm`).
//!
//! # Invariants
//! - Public models never expose the disabled flag.
//! - Ids are opaque strings assigned by the gateway.

pub mod company;
pub mod crm;
pub mod project;
pub mod query;
pub mod resource_ref;
