//! Consumer-side job state: what the result channel has told us so far.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use svcbroker_core::{InstanceId, ServiceInstance};

use super::message::{ProvisionMsg, ProvisionOutcome};

/// Which broker operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMethod {
    Provision,
}

/// Job execution status as seen by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Dispatched; no result received yet
    InProgress,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Recorded state of one job, keyed by instance and token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobState {
    pub token: String,
    pub instance_id: InstanceId,
    pub spec_id: String,
    pub method: JobMethod,
    pub status: JobStatus,
    pub podname: Option<String>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobState {
    /// State recorded when a job is dispatched.
    pub fn in_progress(token: impl Into<String>, instance: &ServiceInstance, method: JobMethod) -> Self {
        Self {
            token: token.into(),
            instance_id: instance.id(),
            spec_id: instance.spec_id().to_string(),
            method,
            status: JobStatus::InProgress,
            podname: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    /// Terminal state derived from a provision result.
    pub fn from_provision_msg(msg: &ProvisionMsg) -> Result<Self, JobStateError> {
        let instance_id = msg
            .instance_uuid()
            .parse()
            .map_err(|e| JobStateError::InvalidMessage(format!("{e}")))?;

        let (status, podname, error) = match msg.outcome() {
            ProvisionOutcome::Succeeded { podname, .. } => {
                (JobStatus::Succeeded, Some(podname.to_string()), None)
            }
            ProvisionOutcome::Failed { error } => (JobStatus::Failed, None, Some(error.to_string())),
        };

        Ok(Self {
            token: msg.job_token().to_string(),
            instance_id,
            spec_id: msg.spec_id().to_string(),
            method: JobMethod::Provision,
            status,
            podname,
            error,
            updated_at: Utc::now(),
        })
    }

    /// Mark this state failed with the given reason.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.status = JobStatus::Failed;
        self.podname = None;
        self.error = Some(error.into());
        self.updated_at = Utc::now();
        self
    }
}

/// Job state store error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum JobStateError {
    /// A terminal state is never replaced; results are delivered once per token.
    #[error("job {token} already finished as {status:?}")]
    AlreadyTerminal { token: String, status: JobStatus },
    /// The token is already in use for this instance (in flight or finished).
    #[error("job {token} already exists as {status:?}")]
    AlreadyExists { token: String, status: JobStatus },
    #[error("invalid job result: {0}")]
    InvalidMessage(String),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Job state persistence.
pub trait JobStateStore: Send + Sync {
    /// Insert or update the state for `(state.instance_id, state.token)`.
    fn set_state(&self, state: JobState) -> Result<(), JobStateError>;

    /// Insert the state only if nothing is recorded for its key yet.
    fn insert_new(&self, state: JobState) -> Result<(), JobStateError>;

    fn get_state(&self, instance_id: InstanceId, token: &str) -> Result<Option<JobState>, JobStateError>;

    /// All job states recorded for an instance, oldest update first.
    fn list_for_instance(&self, instance_id: InstanceId) -> Result<Vec<JobState>, JobStateError>;

    /// Store the credentials a successful provision produced.
    fn set_credentials(&self, instance_id: InstanceId, credentials: JsonValue) -> Result<(), JobStateError>;

    fn get_credentials(&self, instance_id: InstanceId) -> Result<Option<JsonValue>, JobStateError>;
}

impl<S> JobStateStore for Arc<S>
where
    S: JobStateStore + ?Sized,
{
    fn set_state(&self, state: JobState) -> Result<(), JobStateError> {
        (**self).set_state(state)
    }

    fn insert_new(&self, state: JobState) -> Result<(), JobStateError> {
        (**self).insert_new(state)
    }

    fn get_state(&self, instance_id: InstanceId, token: &str) -> Result<Option<JobState>, JobStateError> {
        (**self).get_state(instance_id, token)
    }

    fn list_for_instance(&self, instance_id: InstanceId) -> Result<Vec<JobState>, JobStateError> {
        (**self).list_for_instance(instance_id)
    }

    fn set_credentials(&self, instance_id: InstanceId, credentials: JsonValue) -> Result<(), JobStateError> {
        (**self).set_credentials(instance_id, credentials)
    }

    fn get_credentials(&self, instance_id: InstanceId) -> Result<Option<JsonValue>, JobStateError> {
        (**self).get_credentials(instance_id)
    }
}

/// In-memory job state store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryJobStateStore {
    states: RwLock<HashMap<(InstanceId, String), JobState>>,
    credentials: RwLock<HashMap<InstanceId, JsonValue>>,
}

impl InMemoryJobStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> JobStateError {
    JobStateError::Storage("lock poisoned".to_string())
}

impl JobStateStore for InMemoryJobStateStore {
    fn set_state(&self, state: JobState) -> Result<(), JobStateError> {
        let mut states = self.states.write().map_err(poisoned)?;
        let key = (state.instance_id, state.token.clone());

        if let Some(existing) = states.get(&key) {
            if existing.status.is_terminal() {
                return Err(JobStateError::AlreadyTerminal {
                    token: state.token,
                    status: existing.status,
                });
            }
        }

        states.insert(key, state);
        Ok(())
    }

    fn insert_new(&self, state: JobState) -> Result<(), JobStateError> {
        let mut states = self.states.write().map_err(poisoned)?;
        let key = (state.instance_id, state.token.clone());

        if let Some(existing) = states.get(&key) {
            return Err(JobStateError::AlreadyExists {
                token: state.token,
                status: existing.status,
            });
        }

        states.insert(key, state);
        Ok(())
    }

    fn get_state(&self, instance_id: InstanceId, token: &str) -> Result<Option<JobState>, JobStateError> {
        let states = self.states.read().map_err(poisoned)?;
        Ok(states.get(&(instance_id, token.to_string())).cloned())
    }

    fn list_for_instance(&self, instance_id: InstanceId) -> Result<Vec<JobState>, JobStateError> {
        let states = self.states.read().map_err(poisoned)?;
        let mut out: Vec<JobState> = states
            .values()
            .filter(|s| s.instance_id == instance_id)
            .cloned()
            .collect();
        out.sort_by_key(|s| s.updated_at);
        Ok(out)
    }

    fn set_credentials(&self, instance_id: InstanceId, credentials: JsonValue) -> Result<(), JobStateError> {
        self.credentials
            .write()
            .map_err(poisoned)?
            .insert(instance_id, credentials);
        Ok(())
    }

    fn get_credentials(&self, instance_id: InstanceId) -> Result<Option<JsonValue>, JobStateError> {
        Ok(self.credentials.read().map_err(poisoned)?.get(&instance_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use svcbroker_core::{Parameters, Spec};

    use super::*;

    fn instance() -> ServiceInstance {
        ServiceInstance::new(InstanceId::new(), Spec::new("SPEC1", "fq", "img"), Parameters::new()).unwrap()
    }

    #[test]
    fn state_follows_provision_outcome() {
        let instance = instance();

        let ok = JobState::from_provision_msg(&ProvisionMsg::success("T1", &instance, "pod-1", "{}")).unwrap();
        assert_eq!(ok.status, JobStatus::Succeeded);
        assert_eq!(ok.podname.as_deref(), Some("pod-1"));
        assert_eq!(ok.instance_id, instance.id());

        let failed =
            JobState::from_provision_msg(&ProvisionMsg::failure("T2", &instance, "quota")).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("quota"));
        assert_eq!(failed.podname, None);
    }

    #[test]
    fn malformed_instance_uuid_is_rejected() {
        let msg: ProvisionMsg = serde_json::from_value(serde_json::json!({
            "instance_uuid": "nope",
            "job_token": "T1",
            "spec_id": "SPEC1",
            "podname": "",
            "msg": "",
            "error": "x",
        }))
        .unwrap();

        assert!(matches!(
            JobState::from_provision_msg(&msg),
            Err(JobStateError::InvalidMessage(_))
        ));
    }

    #[test]
    fn in_progress_can_be_completed_once() {
        let store = InMemoryJobStateStore::new();
        let instance = instance();

        store
            .set_state(JobState::in_progress("T1", &instance, JobMethod::Provision))
            .unwrap();
        assert_eq!(
            store.get_state(instance.id(), "T1").unwrap().unwrap().status,
            JobStatus::InProgress
        );

        let done = JobState::from_provision_msg(&ProvisionMsg::success("T1", &instance, "pod-1", "{}")).unwrap();
        store.set_state(done.clone()).unwrap();

        let err = store.set_state(done).unwrap_err();
        assert!(matches!(err, JobStateError::AlreadyTerminal { status: JobStatus::Succeeded, .. }));
    }

    #[test]
    fn insert_new_refuses_any_existing_key() {
        let store = InMemoryJobStateStore::new();
        let instance = instance();

        store
            .insert_new(JobState::in_progress("T1", &instance, JobMethod::Provision))
            .unwrap();
        let err = store
            .insert_new(JobState::in_progress("T1", &instance, JobMethod::Provision))
            .unwrap_err();

        assert!(matches!(err, JobStateError::AlreadyExists { status: JobStatus::InProgress, .. }));
    }

    #[test]
    fn lists_only_the_requested_instance() {
        let store = InMemoryJobStateStore::new();
        let a = instance();
        let b = instance();

        store.set_state(JobState::in_progress("T1", &a, JobMethod::Provision)).unwrap();
        store.set_state(JobState::in_progress("T2", &a, JobMethod::Provision)).unwrap();
        store.set_state(JobState::in_progress("T3", &b, JobMethod::Provision)).unwrap();

        let tokens: Vec<String> = store
            .list_for_instance(a.id())
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect();
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains(&"T1".to_string()));
        assert!(tokens.contains(&"T2".to_string()));
    }

    #[test]
    fn credentials_are_kept_per_instance() {
        let store = InMemoryJobStateStore::arc();
        let instance = instance();

        assert_eq!(store.get_credentials(instance.id()).unwrap(), None);
        store
            .set_credentials(instance.id(), serde_json::json!({"user": "u"}))
            .unwrap();

        assert_eq!(
            store.get_credentials(instance.id()).unwrap(),
            Some(serde_json::json!({"user": "u"}))
        );
    }
}
