//! Error types for FoodGate

/// Result type alias using FoodGate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for FoodGate operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Image payload missing, empty, oversized, or not an image payload at all
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Payload bytes could not be decoded as an image
    #[error("decode error: {0}")]
    Decode(String),

    /// Model weights missing, unreadable, or incompatible with the runtime
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// Inference requested before a successful model load
    #[error("model not loaded")]
    NotLoaded,

    /// Forward pass or output reduction failed
    #[error("inference error: {0}")]
    Inference(String),

    /// Any failure inside the classify pipeline, wrapping its cause
    #[error("classification error: {source}")]
    Classification {
        #[source]
        source: Box<Error>,
    },

    /// Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Filesystem errors
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML configuration parse errors
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic internal errors
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new model load error
    pub fn model_load(msg: impl Into<String>) -> Self {
        Self::ModelLoad(msg.into())
    }

    /// Create a new inference error
    pub fn inference(msg: impl Into<String>) -> Self {
        Self::Inference(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an error as a classification failure.
    ///
    /// Already-wrapped errors are returned unchanged so the chain stays one level deep.
    pub fn classification(source: Error) -> Self {
        match source {
            wrapped @ Self::Classification { .. } => wrapped,
            other => Self::Classification {
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through `Classification` wrappers
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Classification { source } => source.root_cause(),
            other => other,
        }
    }

    /// Stable short name of the root cause, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self.root_cause() {
            Self::InvalidInput(_) => "invalid_input",
            Self::Decode(_) => "decode",
            Self::ModelLoad(_) => "model_load",
            Self::NotLoaded => "not_loaded",
            Self::Inference(_) => "inference",
            Self::Classification { .. } => "classification",
            Self::Config(_) => "config",
            Self::Timeout(_) => "timeout",
            Self::Io(_) => "io",
            Self::Serialization(_) | Self::Yaml(_) => "serialization",
            Self::Internal(_) => "internal",
        }
    }

    /// True when the root cause is a malformed image payload
    pub fn is_input_error(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::InvalidInput(_) | Self::Decode(_)
        )
    }
}
