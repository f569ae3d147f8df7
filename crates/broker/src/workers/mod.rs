//! Background consumers of the result channel.

pub mod provision_subscriber;

pub use provision_subscriber::{ProvisionWorkSubscriber, WorkerHandle};
