//! Metrics sink injected at construction, never a global static.
//!
//! [`MirrorMetrics`] times every backend operation and bumps an operation
//! counter through the `metrics` facade crate: one counter per
//! `{operation, kind, result}` and one histogram per operation latency.

use std::time::Duration;

/// Records mirror operation outcomes and latencies.
///
/// Implementors must be cheap to call from the mutation path: the default
/// implementation below forwards to the globally-registered `metrics`
/// recorder, but nothing here requires a process-wide singleton -- a
/// caller can hand the [`crate::controller::MirrorController`] any
/// implementation, including one that forwards to an in-process test
/// collector.
pub trait MirrorMetrics: Send + Sync {
    /// Record one completed operation.
    ///
    /// `operation` is a short dotted name like `"path.set"` or
    /// `"field.search"`; `kind` is the resource kind the operation targeted
    /// (or `"-"` when the operation isn't kind-scoped); `ok` is whether the
    /// operation completed without a backend failure.
    fn record(&self, operation: &'static str, kind: &str, ok: bool, elapsed: Duration);
}

/// Forwards to the process-wide `metrics` recorder via `counter!`/`histogram!`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultMetrics;

impl MirrorMetrics for DefaultMetrics {
    fn record(&self, operation: &'static str, kind: &str, ok: bool, elapsed: Duration) {
        let result = if ok { "ok" } else { "err" };
        metrics::counter!(
            "mirror_operations_total",
            "operation" => operation,
            "kind" => kind.to_string(),
            "result" => result,
        )
        .increment(1);
        metrics::histogram!(
            "mirror_operation_duration_seconds",
            "operation" => operation,
            "kind" => kind.to_string(),
        )
        .record(elapsed.as_secs_f64());
    }
}

/// Discards everything. Used by tests and embedders who don't want the
/// `metrics` dependency wired up at all.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl MirrorMetrics for NoopMetrics {
    fn record(&self, _operation: &'static str, _kind: &str, _ok: bool, _elapsed: Duration) {}
}
