//! Repository gateway contract and persistence implementations.
//!
//! # Responsibility
//! - Define the contract through which services reach the CRM kernel's object graph.
//! - Isolate SQLite query details from hierarchy/resource orchestration.
//!
//! # Invariants
//! - Queries exclude disabled objects unless `include_disabled` is requested.
//! - Mutations that address a missing object return `GatewayError::NotFound`.

pub mod crm_gateway;
pub mod sqlite_gateway;
