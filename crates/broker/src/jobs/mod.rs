//! Provision job system: one job, one thread, one result message.
//!
//! ## Design
//!
//! - A `ProvisionJob` owns one fully resolved service instance and runs once
//! - The `WorkEngine` runs every job on its own thread; callers never block
//! - Success and failure both become a single `ProvisionMsg` on the result channel
//! - No retries, no cancellation, no persistence of the queue
//!
//! ## Components
//!
//! - `ProvisionMsg`: terminal, serializable outcome of one job
//! - `ProvisionJob`: invokes the provisioner and reports the outcome
//! - `WorkEngine`: spawns jobs and hands them the shared result channel
//! - `JobStateStore`: consumer-side record of each job's status

pub mod engine;
pub mod message;
pub mod provision;
pub mod state;

pub use engine::{EngineError, JobHandle, Work, WorkEngine, new_job_token, validate_token};
pub use message::{InvalidProvisionMsg, ProvisionMsg, ProvisionOutcome};
pub use provision::ProvisionJob;
pub use state::{InMemoryJobStateStore, JobMethod, JobState, JobStateError, JobStateStore, JobStatus};
