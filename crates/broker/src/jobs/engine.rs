//! Work engine: runs each job on its own thread against a shared result channel.

use std::sync::Arc;
use std::thread;

use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use svcbroker_events::ResultChannel;

use crate::config::BrokerConfig;

/// A unit of work that reports exactly one result on a channel.
///
/// `run` consumes the work, so a job can only ever be executed once.
pub trait Work<M>: Send + 'static {
    fn run<C>(self, token: &str, channel: &C)
    where
        C: ResultChannel<M> + ?Sized;
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid job token: {0}")]
    InvalidToken(String),

    #[error("failed to spawn job thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("job {0} panicked")]
    Panicked(String),
}

/// Generate a fresh job token.
pub fn new_job_token() -> String {
    Uuid::now_v7().to_string()
}

/// Handle to a started job.
///
/// Dropping the handle detaches the job; it still runs to completion.
#[derive(Debug)]
pub struct JobHandle {
    token: String,
    join: thread::JoinHandle<()>,
}

impl JobHandle {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn into_token(self) -> String {
        self.token
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the job thread to exit.
    pub fn join(self) -> Result<String, EngineError> {
        match self.join.join() {
            Ok(()) => Ok(self.token),
            Err(_) => Err(EngineError::Panicked(self.token)),
        }
    }
}

/// Starts jobs on independent threads.
///
/// The engine holds the producer side of the result channel; each job gets a
/// shared reference to it and sends its single result there. The engine never
/// reads from or closes the channel.
#[derive(Debug)]
pub struct WorkEngine<C> {
    channel: Arc<C>,
    thread_prefix: String,
}

impl<C> Clone for WorkEngine<C> {
    fn clone(&self) -> Self {
        Self {
            channel: Arc::clone(&self.channel),
            thread_prefix: self.thread_prefix.clone(),
        }
    }
}

impl<C> WorkEngine<C>
where
    C: Send + Sync + 'static,
{
    pub fn new(channel: C) -> Self {
        Self::with_config(channel, &BrokerConfig::default())
    }

    pub fn with_config(channel: C, config: &BrokerConfig) -> Self {
        Self::from_shared(Arc::new(channel), config)
    }

    /// Use a channel that is also held elsewhere (e.g. a bus the caller subscribes to).
    pub fn from_shared(channel: Arc<C>, config: &BrokerConfig) -> Self {
        Self {
            channel,
            thread_prefix: config.job_thread_prefix.clone(),
        }
    }

    pub fn channel(&self) -> &Arc<C> {
        &self.channel
    }

    /// Start `work` on a new thread and return immediately.
    ///
    /// When `token` is `None` a fresh one is generated. The token is handed to
    /// the job and echoed in its result message.
    pub fn start_new_job<M, W>(&self, token: Option<String>, work: W) -> Result<JobHandle, EngineError>
    where
        W: Work<M>,
        C: ResultChannel<M>,
        M: 'static,
    {
        let token = match token {
            Some(t) => validate_token(t)?,
            None => new_job_token(),
        };

        let channel = Arc::clone(&self.channel);
        let job_token = token.clone();
        let join = thread::Builder::new()
            .name(format!("{}-{}", self.thread_prefix, token))
            .spawn(move || work.run(&job_token, &*channel))?;

        debug!(job_token = %token, "job started");

        Ok(JobHandle { token, join })
    }
}

/// Reject tokens that cannot name a job (blank, or containing NUL).
pub fn validate_token(token: String) -> Result<String, EngineError> {
    if token.trim().is_empty() {
        return Err(EngineError::InvalidToken("token must not be empty".to_string()));
    }
    // Thread names cannot carry interior NULs.
    if token.contains('\0') {
        return Err(EngineError::InvalidToken("token must not contain NUL".to_string()));
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    struct Echo(&'static str);

    impl Work<String> for Echo {
        fn run<C>(self, token: &str, channel: &C)
        where
            C: ResultChannel<String> + ?Sized,
        {
            let _ = channel.send(format!("{token}:{}", self.0));
        }
    }

    #[test]
    fn runs_work_with_supplied_token() {
        let (tx, rx) = mpsc::channel::<String>();
        let engine = WorkEngine::new(tx);

        let handle = engine.start_new_job(Some("T1".to_string()), Echo("hello")).unwrap();
        assert_eq!(handle.join().unwrap(), "T1");

        assert_eq!(rx.recv().unwrap(), "T1:hello");
    }

    #[test]
    fn generates_token_when_none_supplied() {
        let (tx, rx) = mpsc::channel::<String>();
        let engine = WorkEngine::new(tx);

        let token = engine.start_new_job(None, Echo("x")).unwrap().join().unwrap();

        assert!(Uuid::parse_str(&token).is_ok());
        assert_eq!(rx.recv().unwrap(), format!("{token}:x"));
    }

    #[test]
    fn rejects_blank_and_nul_tokens() {
        let (tx, _rx) = mpsc::channel::<String>();
        let engine = WorkEngine::new(tx);

        let blank = engine.start_new_job(Some("  ".to_string()), Echo("x"));
        let nul = engine.start_new_job(Some("a\0b".to_string()), Echo("x"));

        assert!(matches!(blank, Err(EngineError::InvalidToken(_))));
        assert!(matches!(nul, Err(EngineError::InvalidToken(_))));
    }

    #[test]
    fn job_thread_is_named_after_token() {
        let (tx, rx) = mpsc::channel::<String>();
        let engine = WorkEngine::with_config(
            tx,
            &BrokerConfig {
                job_thread_prefix: "prov".to_string(),
                ..BrokerConfig::default()
            },
        );

        struct ThreadName;
        impl Work<String> for ThreadName {
            fn run<C>(self, _token: &str, channel: &C)
            where
                C: ResultChannel<String> + ?Sized,
            {
                let name = thread::current().name().unwrap_or_default().to_string();
                let _ = channel.send(name);
            }
        }

        engine.start_new_job(Some("T7".to_string()), ThreadName).unwrap().join().unwrap();

        assert_eq!(rx.recv().unwrap(), "prov-T7");
    }
}
