//! `svcbroker-core`: domain primitives shared by the broker crates.
//!
//! This crate contains **pure domain** types (no threads, no IO): the service
//! instance being provisioned, the `Spec` it was created from, and the error
//! model used at the domain boundary.

pub mod error;
pub mod id;
pub mod instance;

pub use error::{DomainError, DomainResult};
pub use id::InstanceId;
pub use instance::{Parameters, ServiceInstance, Spec};
