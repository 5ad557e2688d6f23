//! FoodGate Telemetry
//!
//! Decision counters and latency accounting for the food gate.
//!
//! Provides:
//! - An in-process collector with cheap atomic counters and snapshots
//! - `metrics` facade counters and histograms for any installed recorder

pub mod metrics;

pub use crate::metrics::{describe_metrics, GateMetrics, GateMetricsSnapshot, GateOutcome};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::metrics::{GateMetrics, GateMetricsSnapshot, GateOutcome};
}
