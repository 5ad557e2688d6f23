//! FoodGate Core
//!
//! Core types and error handling shared across FoodGate components.
//!
//! This crate provides:
//! - The error taxonomy used by the preprocessor, inference engine, classifier and gate
//! - The `ImageInput` payload type accepting raw bytes or base64 text

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ImageInput, MAX_PAYLOAD_BYTES};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::ImageInput;
}
