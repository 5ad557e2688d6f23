//! Configuration for the classifier and gate

use foodgate_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Threshold used when none is configured
pub const DEFAULT_THRESHOLD: f32 = 0.6;

/// Square input resolution of the ImageNet ResNet family
pub const DEFAULT_INPUT_SIZE: u32 = 224;

/// Output classes of an ImageNet-1k classifier
pub const DEFAULT_NUM_CLASSES: usize = 1000;

/// Classifier configuration.
///
/// The model is expected to be an ImageNet-1k ResNet exported to safetensors.
/// Inputs are normalized with the ImageNet training statistics
/// (mean `[0.485, 0.456, 0.406]`, std `[0.229, 0.224, 0.225]`, RGB, channel-first),
/// see [`crate::preprocess::IMAGENET_MEAN`]. Weights trained with other
/// statistics will classify poorly without a matching preprocessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Where to load model weights from
    #[serde(default)]
    pub model: ModelSourceSpec,

    /// Network architecture of the weights
    #[serde(default)]
    pub architecture: Architecture,

    /// Minimum aggregate food confidence to declare an image food
    #[serde(default = "default_threshold")]
    pub threshold: f32,

    /// Verbose per-classification logging
    #[serde(default)]
    pub debug: bool,

    /// Square resolution images are resized to
    #[serde(default = "default_input_size")]
    pub input_size: u32,

    /// Length of the model's score vector
    #[serde(default = "default_num_classes")]
    pub num_classes: usize,

    /// Upper bound on a single model load
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Number of best classes kept for diagnostics
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Device to run inference on
    #[serde(default)]
    pub device: DeviceSpec,
}

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ModelSourceSpec {
    /// Local safetensors file
    Local { path: PathBuf },

    /// Hugging Face Hub
    HuggingFace {
        repo_id: String,
        filename: String,
        revision: Option<String>,
    },
}

impl Default for ModelSourceSpec {
    fn default() -> Self {
        Self::Local {
            path: default_model_path(),
        }
    }
}

impl ModelSourceSpec {
    /// Local path, if the model is loaded from disk
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::Local { path } => Some(path),
            Self::HuggingFace { .. } => None,
        }
    }

    /// Short description for logs and status output
    pub fn describe(&self) -> String {
        match self {
            Self::Local { path } => path.display().to_string(),
            Self::HuggingFace {
                repo_id,
                filename,
                revision,
            } => format!(
                "hf://{}@{}/{}",
                repo_id,
                revision.as_deref().unwrap_or("main"),
                filename
            ),
        }
    }
}

/// Supported classifier architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    #[default]
    Resnet18,
    Resnet34,
    Resnet50,
}

impl Architecture {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resnet18 => "resnet18",
            Self::Resnet34 => "resnet34",
            Self::Resnet50 => "resnet50",
        }
    }
}

/// Device specification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda,
    Metal,
}

/// Partial configuration applied on top of a full config
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigOverrides {
    pub model_path: Option<PathBuf>,
    pub threshold: Option<f32>,
    pub debug: Option<bool>,
}

impl ConfigOverrides {
    /// Override only the threshold
    pub fn threshold(threshold: f32) -> Self {
        Self {
            threshold: Some(threshold),
            ..Default::default()
        }
    }

    /// Check whether any field is set
    pub fn is_empty(&self) -> bool {
        self.model_path.is_none() && self.threshold.is_none() && self.debug.is_none()
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model: ModelSourceSpec::default(),
            architecture: Architecture::default(),
            threshold: DEFAULT_THRESHOLD,
            debug: false,
            input_size: DEFAULT_INPUT_SIZE,
            num_classes: DEFAULT_NUM_CLASSES,
            load_timeout_ms: default_load_timeout_ms(),
            top_k: default_top_k(),
            device: DeviceSpec::default(),
        }
    }
}

impl ClassifierConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Configuration with a local model path and defaults elsewhere
    pub fn with_model_path(path: impl Into<PathBuf>) -> Self {
        Self {
            model: ModelSourceSpec::Local { path: path.into() },
            ..Default::default()
        }
    }

    /// Set the decision threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Enable verbose logging
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Copy of this config with the overrides applied, validated
    pub fn merged(&self, overrides: &ConfigOverrides) -> Result<Self> {
        let mut merged = self.clone();
        if let Some(path) = &overrides.model_path {
            merged.model = ModelSourceSpec::Local { path: path.clone() };
        }
        if let Some(threshold) = overrides.threshold {
            merged.threshold = threshold;
        }
        if let Some(debug) = overrides.debug {
            merged.debug = debug;
        }
        merged.validate()?;
        Ok(merged)
    }

    /// Reject values the pipeline cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::config(format!(
                "threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        if self.input_size == 0 {
            return Err(Error::config("input_size must be positive"));
        }
        if self.num_classes == 0 {
            return Err(Error::config("num_classes must be positive"));
        }
        if self.top_k == 0 {
            return Err(Error::config("top_k must be positive"));
        }
        if self.load_timeout_ms == 0 {
            return Err(Error::config("load_timeout_ms must be positive"));
        }
        Ok(())
    }

    /// Model load deadline
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/resnet18.safetensors")
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

fn default_input_size() -> u32 {
    DEFAULT_INPUT_SIZE
}

fn default_num_classes() -> usize {
    DEFAULT_NUM_CLASSES
}

fn default_load_timeout_ms() -> u64 {
    30_000
}

fn default_top_k() -> usize {
    5
}
