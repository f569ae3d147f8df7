use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use svcbroker_events::Subscription;

use crate::jobs::{EngineError, JobState, JobStateError, JobStateStore, JobStatus, ProvisionMsg};

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }

    /// Wait for the worker to stop on its own (all producers dropped).
    pub fn join(mut self) {
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Folds provision results into a job state store.
///
/// - Failed results mark the job `Failed` with the reported error
/// - Successful results store the credentials, then mark the job `Succeeded`
/// - Store errors are logged; the worker keeps consuming
#[derive(Debug)]
pub struct ProvisionWorkSubscriber;

impl ProvisionWorkSubscriber {
    /// Spawn a worker thread consuming `subscription` until shutdown or until
    /// every producer has gone away.
    pub fn spawn<S>(
        name: &str,
        subscription: Subscription<ProvisionMsg>,
        store: S,
        poll_interval: Duration,
    ) -> Result<WorkerHandle, EngineError>
    where
        S: JobStateStore + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let worker = name.to_string();

        let join = thread::Builder::new().name(worker.clone()).spawn(move || {
            subscriber_loop(&worker, subscription, shutdown_rx, &store, poll_interval)
        })?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }

    /// Apply one provision result to the store (for testing or synchronous use).
    pub fn handle_message<S>(store: &S, msg: &ProvisionMsg) -> Result<JobState, JobStateError>
    where
        S: JobStateStore + ?Sized,
    {
        let mut state = JobState::from_provision_msg(msg)?;

        let mut credentials: Option<serde_json::Value> = None;
        if state.status == JobStatus::Succeeded {
            match serde_json::from_str(msg.msg()) {
                Ok(value) => credentials = Some(value),
                Err(err) => {
                    state = state.failed(format!("invalid credentials payload: {err}"));
                }
            }
        }

        // Credentials are only written once the state transition is accepted,
        // so a late or duplicate result leaves the store untouched.
        store.set_state(state.clone())?;
        if let Some(credentials) = credentials {
            store.set_credentials(state.instance_id, credentials)?;
        }
        Ok(state)
    }
}

fn subscriber_loop<S>(
    name: &str,
    sub: Subscription<ProvisionMsg>,
    shutdown_rx: mpsc::Receiver<()>,
    store: &S,
    tick: Duration,
) where
    S: JobStateStore,
{
    info!(worker = name, "provision subscriber started");

    loop {
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(msg) => match ProvisionWorkSubscriber::handle_message(store, &msg) {
                Ok(state) => debug!(
                    worker = name,
                    job_token = %state.token,
                    status = ?state.status,
                    "job state updated"
                ),
                Err(err) => warn!(
                    worker = name,
                    job_token = %msg.job_token(),
                    error = %err,
                    "failed to record provision result"
                ),
            },
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(worker = name, "provision subscriber stopped");
}
