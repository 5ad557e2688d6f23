//! Process-wide default gate
//!
//! Convenience for callers that do not wire their own gate. The instance is
//! built on first use with the default configuration (threshold 0.6) and the
//! candle engine when the `ml-models` feature is enabled, otherwise the
//! always-food stub. Applications that need a different engine install their
//! own gate at startup.

use crate::config::ClassifierConfig;
use crate::engine::{AlwaysFoodStub, InferenceEngine};
use crate::gate::FoodGate;
use parking_lot::{const_mutex, Mutex};
use std::sync::Arc;

static DEFAULT_GATE: Mutex<Option<Arc<FoodGate>>> = const_mutex(None);

/// The shared default gate, created on first call
pub fn default_gate() -> Arc<FoodGate> {
    let mut slot = DEFAULT_GATE.lock();
    Arc::clone(slot.get_or_insert_with(|| Arc::new(build_default_gate())))
}

/// Replace the default gate, returning the previous one
pub fn install_default_gate(gate: Arc<FoodGate>) -> Option<Arc<FoodGate>> {
    DEFAULT_GATE.lock().replace(gate)
}

/// Unload the default gate's model and drop the instance.
///
/// The next [`default_gate`] call builds a fresh gate whose first check
/// triggers a new load.
pub fn reset_default_gate() {
    let previous = DEFAULT_GATE.lock().take();
    if let Some(gate) = previous {
        gate.engine().reset();
    }
}

fn build_default_gate() -> FoodGate {
    let config = ClassifierConfig::default();
    let engine = default_engine(&config);
    tracing::info!(engine = %engine.name(), "Creating default food gate");

    match FoodGate::new(Arc::clone(&engine), config) {
        Ok(gate) => gate,
        Err(err) => {
            // Only reachable if the built-in defaults stop validating
            tracing::error!(error = %err, "Default gate config rejected, using stub engine");
            FoodGate::from_classifier(crate::classifier::FoodClassifier::unchecked(
                Arc::new(AlwaysFoodStub::new()),
                ClassifierConfig::default(),
            ))
        }
    }
}

#[cfg(feature = "ml-models")]
fn default_engine(config: &ClassifierConfig) -> Arc<dyn InferenceEngine> {
    Arc::new(crate::engine::RealEngine::candle(config))
}

#[cfg(not(feature = "ml-models"))]
fn default_engine(_config: &ClassifierConfig) -> Arc<dyn InferenceEngine> {
    Arc::new(AlwaysFoodStub::new())
}
