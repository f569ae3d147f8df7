//! Tracing, logging, metrics (shared setup).

/// Initialize process-wide observability (tracing/logging) with the default filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Job counters.
pub mod metrics;

/// In-process recorder for asserting on counters in tests.
#[cfg(any(test, feature = "testing"))]
pub mod testing;
