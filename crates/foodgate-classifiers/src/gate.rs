//! Fail-open food gate
//!
//! The gate is what the request layer talks to. It never returns an error:
//! a classifier failure of any kind lets the request through, and only a
//! successful, below-threshold classification blocks it.
//!
//! A failed model load is not retried by `check`. Until the host calls
//! [`FoodGate::warmup`] again (or resets the engine), every check fails open
//! with the recorded load error. [`FoodGate::status`] reports the failure.

use crate::classifier::FoodClassifier;
use crate::config::ClassifierConfig;
use crate::engine::{EngineStatus, InferenceEngine};
use foodgate_core::{Error, ImageInput, Result};
use foodgate_telemetry::{GateMetrics, GateMetricsSnapshot, GateOutcome};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Gate decision handed back to the request layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GateCheckResult {
    /// Forward the image to the downstream model
    pub should_proceed: bool,

    /// Food confidence on pass, rejection confidence on reject, 0 on error
    pub food_confidence: f32,

    /// Wall-clock time spent in the gate
    pub processing_time_ms: f64,

    /// Why the image was blocked, or which error was swallowed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl GateCheckResult {
    fn pass(confidence: f32, processing_time_ms: f64) -> Self {
        Self {
            should_proceed: true,
            food_confidence: confidence,
            processing_time_ms,
            rejection_reason: None,
        }
    }

    fn reject(confidence: f32, processing_time_ms: f64) -> Self {
        // Reported as confidence in the rejection, not in food
        let rejection_confidence = 1.0 - confidence;
        Self {
            should_proceed: false,
            food_confidence: rejection_confidence,
            processing_time_ms,
            rejection_reason: Some(format!(
                "Image classified as non-food ({:.1}%)",
                rejection_confidence * 100.0
            )),
        }
    }

    fn fail_open(message: impl std::fmt::Display, processing_time_ms: f64) -> Self {
        Self {
            should_proceed: true,
            food_confidence: 0.0,
            processing_time_ms,
            rejection_reason: Some(format!("Classification error: {message}")),
        }
    }
}

/// Effective gate configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Engine the gate runs on
    pub engine: String,

    /// Classifier configuration after defaults and overrides
    pub classifier: ClassifierConfig,
}

/// Food/non-food pre-filter in front of the remote vision model
pub struct FoodGate {
    classifier: FoodClassifier,
    metrics: GateMetrics,
}

impl FoodGate {
    /// Create a gate over a shared engine
    pub fn new(engine: Arc<dyn InferenceEngine>, config: ClassifierConfig) -> Result<Self> {
        Ok(Self::from_classifier(FoodClassifier::new(engine, config)?))
    }

    /// Wrap an existing classifier
    pub fn from_classifier(classifier: FoodClassifier) -> Self {
        Self {
            classifier,
            metrics: GateMetrics::new(),
        }
    }

    /// Decide whether the image should be forwarded
    pub async fn check(&self, image: &ImageInput) -> GateCheckResult {
        let start = Instant::now();

        let outcome = AssertUnwindSafe(self.classifier.classify(image))
            .catch_unwind()
            .await;

        let elapsed = start.elapsed();
        let processing_time_ms = elapsed.as_secs_f64() * 1000.0;
        let latency_us = elapsed.as_micros() as u64;

        let (result, gate_outcome) = match outcome {
            Ok(Ok(classification)) if classification.is_food => (
                GateCheckResult::pass(classification.confidence, processing_time_ms),
                GateOutcome::Pass,
            ),
            Ok(Ok(classification)) => (
                GateCheckResult::reject(classification.confidence, processing_time_ms),
                GateOutcome::Reject,
            ),
            Ok(Err(err)) => {
                if err.is_input_error() {
                    debug!(error = %err, kind = err.kind(), "Unreadable image, failing open");
                } else {
                    warn!(error = %err, kind = err.kind(), "Food gate failing open");
                }
                (
                    GateCheckResult::fail_open(err.root_cause(), processing_time_ms),
                    GateOutcome::FailOpen { kind: err.kind() },
                )
            }
            Err(_) => {
                let err = Error::internal("classifier panicked");
                warn!(error = %err, "Food gate failing open");
                (
                    GateCheckResult::fail_open(&err, processing_time_ms),
                    GateOutcome::FailOpen { kind: err.kind() },
                )
            }
        };

        debug!(
            should_proceed = result.should_proceed,
            food_confidence = result.food_confidence,
            processing_time_ms,
            "Food gate decision"
        );
        self.metrics.record(gate_outcome, latency_us);
        result
    }

    /// Load the model ahead of the first request. Failures are logged, not returned.
    ///
    /// Also the way to retry after a failed load.
    pub async fn warmup(&self) {
        let start = Instant::now();
        match self.classifier.engine().load_model().await {
            Ok(()) => debug!(
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Food gate warm"
            ),
            Err(err) => warn!(error = %err, "Food gate warmup failed, checks will fail open"),
        }
    }

    /// Copy of the effective configuration
    pub fn config(&self) -> GateConfig {
        GateConfig {
            engine: self.classifier.engine().name().to_string(),
            classifier: self.classifier.config().clone(),
        }
    }

    /// Engine health for readiness probes
    pub fn status(&self) -> EngineStatus {
        self.classifier.engine().status()
    }

    /// Decision counters
    pub fn metrics(&self) -> GateMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// The wrapped classifier
    pub fn classifier(&self) -> &FoodClassifier {
        &self.classifier
    }

    /// The shared engine
    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        self.classifier.engine()
    }
}
