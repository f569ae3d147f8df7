//! Request-path entry point for provisioning.
//!
//! ```text
//! provision(instance)
//!   ↓
//! 1. Pick the job token (caller-supplied and validated, or generated)
//!   ↓
//! 2. Record the job as in progress; a token already on record is refused
//!   ↓
//! 3. Start a ProvisionJob on the engine and return the token
//! ```
//!
//! The in-progress record is written before the job starts, so a fast job's
//! terminal result can never be overwritten by it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use svcbroker_core::ServiceInstance;
use svcbroker_events::ResultChannel;

use crate::jobs::{
    EngineError, JobHandle, JobMethod, JobState, JobStateError, JobStateStore, ProvisionJob,
    ProvisionMsg, WorkEngine, new_job_token, validate_token,
};
use crate::provisioner::Provisioner;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    State(#[from] JobStateError),
}

/// Starts provision jobs and records their initial state.
pub struct ProvisionDispatcher<P, C, S>
where
    P: Provisioner,
{
    provisioner: Arc<P>,
    engine: WorkEngine<C>,
    store: S,
}

impl<P, C, S> ProvisionDispatcher<P, C, S>
where
    P: Provisioner,
    C: ResultChannel<ProvisionMsg> + 'static,
    S: JobStateStore,
{
    pub fn new(provisioner: Arc<P>, engine: WorkEngine<C>, store: S) -> Self {
        Self {
            provisioner,
            engine,
            store,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Start provisioning `instance` without waiting for it.
    ///
    /// Returns the job handle; its token is the correlation token that will
    /// appear on the result message.
    pub fn provision(
        &self,
        instance: ServiceInstance,
        token: Option<String>,
    ) -> Result<JobHandle, DispatchError> {
        let token = match token {
            Some(t) => validate_token(t)?,
            None => new_job_token(),
        };

        // One job per token: an in-flight or finished token is never reused.
        let state = JobState::in_progress(token.clone(), &instance, JobMethod::Provision);
        self.store.insert_new(state.clone())?;

        let instance_id = instance.id();
        let job = ProvisionJob::new(instance, Arc::clone(&self.provisioner));

        match self.engine.start_new_job(Some(token.clone()), job) {
            Ok(handle) => {
                info!(instance_id = %instance_id, job_token = %token, "provision job dispatched");
                Ok(handle)
            }
            Err(err) => {
                warn!(instance_id = %instance_id, job_token = %token, error = %err, "provision job not started");
                // The job never ran, so no result will arrive for this token.
                if let Err(store_err) = self.store.set_state(state.failed(err.to_string())) {
                    warn!(job_token = %token, error = %store_err, "failed to record dispatch failure");
                }
                Err(err.into())
            }
        }
    }
}
