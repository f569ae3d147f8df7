//! The provision job.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{error, info, warn};

use svcbroker_core::ServiceInstance;
use svcbroker_events::ResultChannel;
use svcbroker_observability::metrics::{self, JobOutcome};

use super::engine::Work;
use super::message::ProvisionMsg;
use crate::provisioner::{ProvisionError, Provisioned, Provisioner};

/// Runs one provisioning attempt for one service instance.
///
/// Every path through [`ProvisionJob::run`] ends in exactly one
/// [`ProvisionMsg`] on the result channel; nothing is returned to the caller.
pub struct ProvisionJob<P: Provisioner> {
    instance: ServiceInstance,
    provisioner: Arc<P>,
}

impl<P: Provisioner> ProvisionJob<P> {
    pub fn new(instance: ServiceInstance, provisioner: Arc<P>) -> Self {
        Self {
            instance,
            provisioner,
        }
    }

    pub fn instance(&self) -> &ServiceInstance {
        &self.instance
    }

    /// Provision, then send the outcome on `channel`.
    ///
    /// Blocks for as long as the provisioner does; meant to be called from a
    /// dedicated thread (see `WorkEngine`).
    pub fn run<C>(self, token: &str, channel: &C)
    where
        C: ResultChannel<ProvisionMsg> + ?Sized,
    {
        metrics::provision_job_started();

        let (msg, outcome) = self.execute(token);
        metrics::provision_job_finished(outcome);

        if let Err(err) = channel.send(msg) {
            warn!(
                instance_id = %self.instance.id(),
                job_token = %token,
                error = %err,
                "result channel rejected provision result; outcome dropped"
            );
        }
    }

    fn execute(&self, token: &str) -> (ProvisionMsg, JobOutcome) {
        let instance = &self.instance;

        let provisioned = match self.invoke() {
            Ok(p) if p.pod_name.is_empty() => {
                Err(ProvisionError::failed("provisioner returned no pod name"))
            }
            other => other,
        };

        let provisioned = match provisioned {
            Ok(p) => p,
            Err(err) => {
                error!(
                    instance_id = %instance.id(),
                    job_token = %token,
                    spec_id = %instance.spec_id(),
                    failure = "operation",
                    error = %err,
                    "provision failed"
                );
                return (
                    ProvisionMsg::failure(token, instance, err.to_string()),
                    JobOutcome::OperationFailed,
                );
            }
        };

        let credentials = match serde_json::to_string(&provisioned.credentials) {
            Ok(json) => json,
            Err(err) => {
                error!(
                    instance_id = %instance.id(),
                    job_token = %token,
                    spec_id = %instance.spec_id(),
                    pod = %provisioned.pod_name,
                    failure = "encoding",
                    error = %err,
                    "provisioned credentials could not be encoded"
                );
                return (
                    ProvisionMsg::failure(token, instance, err.to_string()),
                    JobOutcome::EncodingFailed,
                );
            }
        };

        info!(
            instance_id = %instance.id(),
            job_token = %token,
            pod = %provisioned.pod_name,
            "provision succeeded"
        );

        (
            ProvisionMsg::success(token, instance, provisioned.pod_name, credentials),
            JobOutcome::Succeeded,
        )
    }

    fn invoke(&self) -> Result<Provisioned<P::Credentials>, ProvisionError> {
        // A panicking provisioner still has to produce a result message.
        panic::catch_unwind(AssertUnwindSafe(|| self.provisioner.provision(&self.instance)))
            .unwrap_or_else(|payload| Err(ProvisionError::Panicked(panic_text(payload.as_ref()))))
    }
}

impl<P: Provisioner> Work<ProvisionMsg> for ProvisionJob<P> {
    fn run<C>(self, token: &str, channel: &C)
    where
        C: ResultChannel<ProvisionMsg> + ?Sized,
    {
        ProvisionJob::run(self, token, channel)
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
