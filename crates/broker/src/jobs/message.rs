//! Terminal outcome of a provision job, as carried on the result channel.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use svcbroker_core::ServiceInstance;
use svcbroker_events::WorkMsg;

/// Error text used when a failure arrives without a description.
const UNDESCRIBED_FAILURE: &str = "provision failed without an error description";
const MISSING_PODNAME: &str = "provision reported success without a pod name";
const MISSING_CREDENTIALS: &str = "provision reported success without credentials";

/// A decoded message where neither or both outcome sides are populated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid provision message for job {token}: {reason}")]
pub struct InvalidProvisionMsg {
    pub token: String,
    pub reason: &'static str,
}

/// Result of one provision job.
///
/// Wire form is flat JSON with a fixed field order:
/// `instance_uuid, job_token, spec_id, podname, msg, error`.
/// Exactly one of `error` and (`podname`, `msg`) is non-empty. The
/// constructors keep it that way and decoding rejects messages that break it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireProvisionMsg")]
pub struct ProvisionMsg {
    instance_uuid: String,
    job_token: String,
    spec_id: String,
    podname: String,
    msg: String,
    error: String,
}

#[derive(Deserialize)]
struct WireProvisionMsg {
    instance_uuid: String,
    job_token: String,
    spec_id: String,
    podname: String,
    msg: String,
    error: String,
}

impl TryFrom<WireProvisionMsg> for ProvisionMsg {
    type Error = InvalidProvisionMsg;

    fn try_from(wire: WireProvisionMsg) -> Result<Self, Self::Error> {
        let failed = !wire.error.is_empty();
        let succeeded = !wire.podname.is_empty() && !wire.msg.is_empty();
        let reason = match (failed, succeeded) {
            (true, false) if wire.podname.is_empty() && wire.msg.is_empty() => None,
            (false, true) => None,
            (true, _) => Some("failure carries success fields"),
            (false, false) => Some("neither error nor pod name and credentials are set"),
        };
        if let Some(reason) = reason {
            return Err(InvalidProvisionMsg {
                token: wire.job_token,
                reason,
            });
        }

        Ok(Self {
            instance_uuid: wire.instance_uuid,
            job_token: wire.job_token,
            spec_id: wire.spec_id,
            podname: wire.podname,
            msg: wire.msg,
            error: wire.error,
        })
    }
}

/// Borrowed, tagged view of a [`ProvisionMsg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome<'a> {
    Succeeded { podname: &'a str, credentials: &'a str },
    Failed { error: &'a str },
}

impl ProvisionMsg {
    /// Successful outcome carrying the pod name and the serialized credentials.
    ///
    /// An empty pod name or credentials payload turns this into a failure.
    pub fn success(
        token: impl Into<String>,
        instance: &ServiceInstance,
        podname: impl Into<String>,
        credentials_json: impl Into<String>,
    ) -> Self {
        let podname = podname.into();
        let msg = credentials_json.into();
        if podname.is_empty() {
            return Self::failure(token, instance, MISSING_PODNAME);
        }
        if msg.is_empty() {
            return Self::failure(token, instance, MISSING_CREDENTIALS);
        }
        Self {
            instance_uuid: instance.id().to_string(),
            job_token: token.into(),
            spec_id: instance.spec_id().to_string(),
            podname,
            msg,
            error: String::new(),
        }
    }

    /// Failed outcome; `podname` and `msg` stay empty.
    pub fn failure(token: impl Into<String>, instance: &ServiceInstance, error: impl Into<String>) -> Self {
        let mut error = error.into();
        if error.is_empty() {
            error = UNDESCRIBED_FAILURE.to_string();
        }
        Self {
            instance_uuid: instance.id().to_string(),
            job_token: token.into(),
            spec_id: instance.spec_id().to_string(),
            podname: String::new(),
            msg: String::new(),
            error,
        }
    }

    pub fn instance_uuid(&self) -> &str {
        &self.instance_uuid
    }

    pub fn job_token(&self) -> &str {
        &self.job_token
    }

    pub fn spec_id(&self) -> &str {
        &self.spec_id
    }

    pub fn podname(&self) -> &str {
        &self.podname
    }

    /// Serialized credentials (empty on failure).
    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn error(&self) -> &str {
        &self.error
    }

    pub fn is_failure(&self) -> bool {
        !self.error.is_empty()
    }

    pub fn outcome(&self) -> ProvisionOutcome<'_> {
        if self.is_failure() {
            ProvisionOutcome::Failed { error: &self.error }
        } else {
            ProvisionOutcome::Succeeded {
                podname: &self.podname,
                credentials: &self.msg,
            }
        }
    }

    /// Canonical JSON encoding.
    ///
    /// Never fails: if encoding is impossible the error is rendered as an
    /// error-shaped document with the same fields.
    pub fn render(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|err| {
            serde_json::json!({
                "instance_uuid": self.instance_uuid,
                "job_token": self.job_token,
                "spec_id": self.spec_id,
                "podname": "",
                "msg": "",
                "error": err.to_string(),
            })
            .to_string()
        })
    }
}

impl WorkMsg for ProvisionMsg {
    fn render(&self) -> String {
        ProvisionMsg::render(self)
    }

    fn job_token(&self) -> &str {
        &self.job_token
    }
}
