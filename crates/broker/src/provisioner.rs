//! Contract for the component that actually provisions a service instance.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use svcbroker_core::ServiceInstance;

/// Credentials extracted from a freshly provisioned instance.
pub type ExtractedCredentials = Map<String, JsonValue>;

/// Successful provisioning result.
#[derive(Debug, Clone, PartialEq)]
pub struct Provisioned<C> {
    /// Name of the pod/worker that ran the provisioning.
    pub pod_name: String,
    pub credentials: C,
}

impl<C> Provisioned<C> {
    pub fn new(pod_name: impl Into<String>, credentials: C) -> Self {
        Self {
            pod_name: pod_name.into(),
            credentials,
        }
    }
}

/// Why a provisioning attempt failed.
///
/// Only the `Display` text crosses the result channel.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{0}")]
    Failed(String),

    #[error("sandbox setup failed: {0}")]
    Sandbox(String),

    #[error("pod {pod} failed: {reason}")]
    PodFailed { pod: String, reason: String },

    #[error("provisioner panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProvisionError {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }
}

/// Performs the provisioning side effect for one service instance.
///
/// Called synchronously from a job's own thread; may block for as long as the
/// underlying orchestration takes. On `Ok`, both the pod name and the
/// credentials must be populated.
pub trait Provisioner: Send + Sync + 'static {
    type Credentials: Serialize;

    fn provision(
        &self,
        instance: &ServiceInstance,
    ) -> Result<Provisioned<Self::Credentials>, ProvisionError>;
}
