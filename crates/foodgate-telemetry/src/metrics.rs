//! Gate decision metrics

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counter of gate checks, labelled by `outcome`
pub const CHECKS_TOTAL: &str = "foodgate_checks_total";

/// Counter of fail-open conversions, labelled by error `kind`
pub const ERRORS_TOTAL: &str = "foodgate_errors_total";

/// Histogram of end-to-end check latency
pub const CHECK_LATENCY_US: &str = "foodgate_check_latency_us";

/// How a single gate check ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateOutcome {
    /// Classified as food, request proceeds
    Pass,
    /// Confidently not food, request is blocked
    Reject,
    /// Classification failed, request proceeds anyway
    FailOpen {
        /// Root error kind
        kind: &'static str,
    },
}

impl GateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Reject => "reject",
            Self::FailOpen { .. } => "fail_open",
        }
    }
}

/// Metrics collector for gate decisions
#[derive(Clone)]
pub struct GateMetrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    checks: AtomicU64,
    passed: AtomicU64,
    rejected: AtomicU64,
    fail_open: AtomicU64,
    total_latency_us: AtomicU64,
}

impl GateMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                checks: AtomicU64::new(0),
                passed: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                fail_open: AtomicU64::new(0),
                total_latency_us: AtomicU64::new(0),
            }),
        }
    }

    /// Record one finished check
    pub fn record(&self, outcome: GateOutcome, latency_us: u64) {
        let inner = &self.inner;
        inner.checks.fetch_add(1, Ordering::Relaxed);
        inner
            .total_latency_us
            .fetch_add(latency_us, Ordering::Relaxed);

        match outcome {
            GateOutcome::Pass => {
                inner.passed.fetch_add(1, Ordering::Relaxed);
            }
            GateOutcome::Reject => {
                inner.rejected.fetch_add(1, Ordering::Relaxed);
            }
            GateOutcome::FailOpen { kind } => {
                inner.fail_open.fetch_add(1, Ordering::Relaxed);
                metrics::counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
            }
        }

        metrics::counter!(CHECKS_TOTAL, "outcome" => outcome.as_str()).increment(1);
        metrics::histogram!(CHECK_LATENCY_US).record(latency_us as f64);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> GateMetricsSnapshot {
        GateMetricsSnapshot {
            checks: self.inner.checks.load(Ordering::Relaxed),
            passed: self.inner.passed.load(Ordering::Relaxed),
            rejected: self.inner.rejected.load(Ordering::Relaxed),
            fail_open: self.inner.fail_open.load(Ordering::Relaxed),
            total_latency_us: self.inner.total_latency_us.load(Ordering::Relaxed),
        }
    }
}

impl Default for GateMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of current metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateMetricsSnapshot {
    pub checks: u64,
    pub passed: u64,
    pub rejected: u64,
    pub fail_open: u64,
    pub total_latency_us: u64,
}

impl GateMetricsSnapshot {
    /// Average latency per check
    pub fn avg_latency_us(&self) -> u64 {
        if self.checks == 0 {
            0
        } else {
            self.total_latency_us / self.checks
        }
    }

    /// Share of checks that blocked the request
    pub fn rejection_rate(&self) -> f64 {
        if self.checks == 0 {
            0.0
        } else {
            self.rejected as f64 / self.checks as f64
        }
    }

    /// Share of checks that failed open
    pub fn fail_open_rate(&self) -> f64 {
        if self.checks == 0 {
            0.0
        } else {
            self.fail_open as f64 / self.checks as f64
        }
    }
}

/// Register descriptions with the installed recorder
pub fn describe_metrics() {
    metrics::describe_counter!(CHECKS_TOTAL, "Total number of food gate checks by outcome");
    metrics::describe_counter!(
        ERRORS_TOTAL,
        "Classification errors converted to fail-open passes, by error kind"
    );
    metrics::describe_histogram!(
        CHECK_LATENCY_US,
        metrics::Unit::Microseconds,
        "End-to-end food gate check latency in microseconds"
    );
}
