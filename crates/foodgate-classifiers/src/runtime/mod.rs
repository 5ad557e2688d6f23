//! Inference runtime seam
//!
//! The engine only knows these two traits. The concrete tensor runtime
//! (candle, or a test double) is chosen by whoever builds the engine.

use crate::preprocess::PreprocessedImage;
use foodgate_core::Result;
use std::sync::Arc;

#[cfg(feature = "ml-models")]
pub mod candle;

#[cfg(feature = "ml-models")]
pub use self::candle::{CandleModel, CandleModelLoader};

/// A loaded model with immutable weights.
///
/// `forward` may be called concurrently from many tasks.
pub trait ImageModel: Send + Sync {
    /// Run one image through the network and return raw logits, one per class
    fn forward(&self, input: &PreprocessedImage) -> Result<Vec<f32>>;

    /// Length of the vector returned by `forward`
    fn num_classes(&self) -> usize;

    /// Model name for logs and status output
    fn name(&self) -> &str;
}

/// Loads a model from wherever its weights live.
///
/// `load` is blocking and may be slow; the engine runs it off the async
/// executor and calls it at most once per load attempt.
pub trait ModelLoader: Send + Sync {
    /// Read weights and build the model
    fn load(&self) -> Result<Arc<dyn ImageModel>>;

    /// Where the weights come from, for status output
    fn describe(&self) -> String;
}
