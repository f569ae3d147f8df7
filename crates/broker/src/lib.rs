//! Provisioning job engine: runs provision jobs off the request path and
//! reports each job's terminal outcome on a result channel.

pub mod config;
pub mod dispatcher;
pub mod jobs;
pub mod provisioner;
pub mod workers;

pub use config::{BrokerConfig, ConfigError};
pub use dispatcher::{DispatchError, ProvisionDispatcher};
pub use jobs::{
    EngineError, InMemoryJobStateStore, InvalidProvisionMsg, JobHandle, JobMethod, JobState, JobStateError,
    JobStateStore, JobStatus, ProvisionJob, ProvisionMsg, ProvisionOutcome, Work, WorkEngine,
};
pub use provisioner::{ExtractedCredentials, ProvisionError, Provisioned, Provisioner};
pub use workers::{ProvisionWorkSubscriber, WorkerHandle};
