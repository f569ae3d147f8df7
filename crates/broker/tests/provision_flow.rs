//! End-to-end: dispatcher → job threads → result bus → subscriber → job state.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use serde::Serialize;

use svcbroker_broker::{
    BrokerConfig, InMemoryJobStateStore, JobStateStore, JobStatus, ProvisionDispatcher, ProvisionError,
    ProvisionJob, ProvisionMsg, ProvisionWorkSubscriber, Provisioned, Provisioner, WorkEngine,
};
use svcbroker_core::{InstanceId, Parameters, ServiceInstance, Spec};
use svcbroker_events::InMemoryResultBus;

#[derive(Serialize)]
struct Creds {
    user: String,
    pass: String,
}

/// Fails for instances whose `fail` parameter is set, succeeds otherwise.
struct ParamDriven;

impl Provisioner for ParamDriven {
    type Credentials = Creds;

    fn provision(&self, instance: &ServiceInstance) -> Result<Provisioned<Creds>, ProvisionError> {
        if let Some(reason) = instance.parameters().get("fail").and_then(|v| v.as_str()) {
            return Err(ProvisionError::failed(reason));
        }
        Ok(Provisioned::new(
            format!("pod-{}", instance.id()),
            Creds {
                user: "u".to_string(),
                pass: "p".to_string(),
            },
        ))
    }
}

/// Blocks until released, to observe that callers do not wait on jobs.
struct Gated {
    release: Mutex<mpsc::Receiver<()>>,
}

impl Provisioner for Gated {
    type Credentials = ();

    fn provision(&self, _: &ServiceInstance) -> Result<Provisioned<()>, ProvisionError> {
        let release = self
            .release
            .lock()
            .map_err(|_| ProvisionError::failed("gate poisoned"))?;
        release
            .recv()
            .map_err(|_| ProvisionError::failed("gate dropped"))?;
        Ok(Provisioned::new("pod-gated", ()))
    }
}

fn instance_with(params: Parameters) -> ServiceInstance {
    ServiceInstance::new(
        InstanceId::new(),
        Spec::new("SPEC1", "dh-postgresql", "postgresql-apb"),
        params,
    )
    .unwrap()
}

fn failing(reason: &str) -> ServiceInstance {
    let mut params = Parameters::new();
    params.insert("fail".to_string(), reason.into());
    instance_with(params)
}

#[test]
fn concurrent_jobs_each_report_once() {
    BrokerConfig::default().init_logging();

    let (tx, rx) = mpsc::channel::<ProvisionMsg>();
    let engine = WorkEngine::new(tx);
    let provisioner = Arc::new(ParamDriven);

    let n = 32;
    let mut expected = HashSet::new();
    let mut handles = Vec::new();
    for i in 0..n {
        let token = format!("T{i}");
        let instance = if i % 3 == 0 {
            failing("resource quota exceeded")
        } else {
            instance_with(Parameters::new())
        };
        expected.insert(token.clone());
        let job = ProvisionJob::new(instance, Arc::clone(&provisioner));
        handles.push(engine.start_new_job(Some(token), job).unwrap());
    }
    for handle in handles {
        handle.join().unwrap();
    }
    drop(engine);

    let msgs: Vec<ProvisionMsg> = rx.iter().collect();
    assert_eq!(msgs.len(), n);

    let tokens: HashSet<String> = msgs.iter().map(|m| m.job_token().to_string()).collect();
    assert_eq!(tokens, expected);

    for msg in &msgs {
        assert_eq!(msg.spec_id(), "SPEC1");
        let failed = !msg.error().is_empty();
        let succeeded = !msg.podname().is_empty() && !msg.msg().is_empty();
        assert!(failed ^ succeeded, "{msg:?}");
        if succeeded {
            assert_eq!(msg.podname(), format!("pod-{}", msg.instance_uuid()));
            assert_eq!(msg.msg(), r#"{"user":"u","pass":"p"}"#);
        } else {
            assert_eq!(msg.error(), "resource quota exceeded");
        }
    }
}

#[test]
fn caller_is_not_blocked_by_running_job() {
    let (release_tx, release_rx) = mpsc::channel();
    let provisioner = Arc::new(Gated {
        release: Mutex::new(release_rx),
    });

    let (tx, rx) = mpsc::channel::<ProvisionMsg>();
    let engine = WorkEngine::new(tx);

    let handle = engine
        .start_new_job(None, ProvisionJob::new(instance_with(Parameters::new()), provisioner))
        .unwrap();

    // The job is parked inside the provisioner; nothing has been reported.
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    assert!(!handle.is_finished());

    release_tx.send(()).unwrap();
    let token = handle.join().unwrap();

    let msg = rx.recv().unwrap();
    assert_eq!(msg.job_token(), token);
    assert_eq!(msg.podname(), "pod-gated");
    assert_eq!(msg.msg(), "null");
}

#[test]
fn subscriber_tracks_dispatched_jobs() {
    svcbroker_observability::init();

    let config = BrokerConfig {
        subscriber_poll_interval: Duration::from_millis(10),
        ..BrokerConfig::default()
    };

    let bus = Arc::new(InMemoryResultBus::<ProvisionMsg>::new());
    let store = InMemoryJobStateStore::arc();
    let subscriber = ProvisionWorkSubscriber::spawn(
        "provision-subscriber",
        bus.subscribe(),
        Arc::clone(&store),
        config.subscriber_poll_interval,
    )
    .unwrap();

    let engine = WorkEngine::from_shared(Arc::clone(&bus), &config);
    let dispatcher = ProvisionDispatcher::new(Arc::new(ParamDriven), engine, Arc::clone(&store));

    let ok = instance_with(Parameters::new());
    let bad = failing("resource quota exceeded");
    let (ok_id, bad_id) = (ok.id(), bad.id());

    let ok_token = dispatcher.provision(ok, None).unwrap().join().unwrap();
    let bad_token = dispatcher
        .provision(bad, Some("T-bad".to_string()))
        .unwrap()
        .join()
        .unwrap();
    assert_eq!(bad_token, "T-bad");

    // Every producer (engine, dispatcher, test) drops its handle on the bus,
    // which disconnects the subscription once the backlog is drained.
    drop(dispatcher);
    drop(bus);
    subscriber.join();

    let ok_state = store.get_state(ok_id, &ok_token).unwrap().unwrap();
    assert_eq!(ok_state.status, JobStatus::Succeeded);
    assert_eq!(ok_state.podname, Some(format!("pod-{ok_id}")));
    assert_eq!(
        store.get_credentials(ok_id).unwrap(),
        Some(serde_json::json!({"user": "u", "pass": "p"}))
    );

    let bad_state = store.get_state(bad_id, "T-bad").unwrap().unwrap();
    assert_eq!(bad_state.status, JobStatus::Failed);
    assert_eq!(bad_state.error.as_deref(), Some("resource quota exceeded"));
    assert_eq!(store.get_credentials(bad_id).unwrap(), None);
}
