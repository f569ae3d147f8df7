use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use ::metrics::{Counter, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit};

/// Counts every counter increment made while it is the local recorder.
///
/// Gauges and histograms are discarded.
#[derive(Debug, Default)]
pub struct CountingRecorder {
    counters: Mutex<HashMap<Key, Arc<AtomicU64>>>,
}

impl CountingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` on the current thread with this recorder installed.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        ::metrics::with_local_recorder(self, f)
    }

    /// Total for `name` across all label sets.
    pub fn count(&self, name: &str) -> u64 {
        self.sum(|key| key.name() == name)
    }

    /// Total for `name` where label `label` equals `value`.
    pub fn count_with(&self, name: &str, label: &str, value: &str) -> u64 {
        self.sum(|key| {
            key.name() == name && key.labels().any(|l| l.key() == label && l.value() == value)
        })
    }

    fn sum(&self, matches: impl Fn(&Key) -> bool) -> u64 {
        let Ok(counters) = self.counters.lock() else {
            return 0;
        };
        counters
            .iter()
            .filter(|(key, _)| matches(key))
            .map(|(_, cell)| cell.load(Ordering::SeqCst))
            .sum()
    }
}

impl Recorder for CountingRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        let Ok(mut counters) = self.counters.lock() else {
            return Counter::noop();
        };
        let cell = counters
            .entry(key.clone())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)));
        Counter::from_arc(Arc::clone(cell))
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
