//! FoodGate Classifiers
//!
//! On-device food/non-food gate placed in front of an expensive remote
//! vision model.
//!
//! Pipeline, leaf first:
//! - `taxonomy`: curated ImageNet classes that are food or imply food
//! - `preprocess`: decode, resize to 224x224, ImageNet-normalize, channel-first
//! - `engine`: lazily loaded model shared across requests, loaded exactly once
//! - `classifier`: softmax, top-k and aggregate food confidence against a threshold
//! - `gate`: timing, metrics and the fail-open policy
//!
//! The gate targets low single-digit milliseconds per image on CPU.

pub mod classifier;
pub mod config;
pub mod default_gate;
pub mod engine;
pub mod gate;
pub mod preprocess;
pub mod runtime;
pub mod scoring;
pub mod taxonomy;

pub use classifier::{ClassificationResult, ClassifyOptions, DetectedClass, FoodClassifier};
pub use config::{Architecture, ClassifierConfig, ConfigOverrides, DeviceSpec, ModelSourceSpec};
pub use default_gate::{default_gate, install_default_gate, reset_default_gate};
pub use engine::{AlwaysFoodStub, EngineState, EngineStatus, InferenceEngine, RealEngine};
pub use gate::{FoodGate, GateCheckResult, GateConfig};
pub use preprocess::{preprocess, PreprocessedImage};
pub use runtime::{ImageModel, ModelLoader};
pub use taxonomy::{is_actual_food, is_food_class, label_name, ClassIndex, FoodCategory};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, FoodClassifier};
    pub use crate::config::ClassifierConfig;
    pub use crate::engine::{AlwaysFoodStub, InferenceEngine, RealEngine};
    pub use crate::gate::{FoodGate, GateCheckResult};
    pub use foodgate_core::ImageInput;
}
