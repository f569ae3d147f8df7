//! Provision job counters.
//!
//! These are fire-and-forget: with no recorder installed every call is a no-op,
//! and no call can block or fail the job that makes it.

pub const JOBS_STARTED: &str = "svcbroker.provision_jobs.started.total";
pub const JOBS_FINISHED: &str = "svcbroker.provision_jobs.finished.total";

/// How a provision job ended, as reported to metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    /// The provisioner reported failure.
    OperationFailed,
    /// Provisioning succeeded but its credentials could not be encoded.
    EncodingFailed,
}

impl JobOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded => "succeeded",
            JobOutcome::OperationFailed => "operation_failed",
            JobOutcome::EncodingFailed => "encoding_failed",
        }
    }
}

pub fn provision_job_started() {
    ::metrics::counter!(JOBS_STARTED).increment(1);
}

pub fn provision_job_finished(outcome: JobOutcome) {
    ::metrics::counter!(JOBS_FINISHED, "outcome" => outcome.as_str()).increment(1);
}
