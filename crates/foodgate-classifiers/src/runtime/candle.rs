//! Candle-backed ResNet runtime

use super::{ImageModel, ModelLoader};
use crate::config::{Architecture, ClassifierConfig, DeviceSpec, ModelSourceSpec};
use crate::preprocess::PreprocessedImage;
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Func, VarBuilder};
use candle_transformers::models::resnet;
use foodgate_core::{Error, Result};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::path::PathBuf;
use std::sync::Arc;

/// Loads ImageNet ResNet weights from a safetensors file
#[derive(Debug, Clone)]
pub struct CandleModelLoader {
    source: ModelSourceSpec,
    architecture: Architecture,
    device: DeviceSpec,
    num_classes: usize,
    input_size: u32,
}

impl CandleModelLoader {
    /// Build a loader from the classifier configuration
    pub fn from_config(config: &ClassifierConfig) -> Self {
        Self {
            source: config.model.clone(),
            architecture: config.architecture,
            device: config.device,
            num_classes: config.num_classes,
            input_size: config.input_size,
        }
    }

    /// Resolve model path from source
    fn resolve_weights(&self) -> Result<PathBuf> {
        match &self.source {
            ModelSourceSpec::Local { path } => {
                if !path.exists() {
                    return Err(Error::model_load(format!(
                        "Model file not found: {}",
                        path.display()
                    )));
                }
                Ok(path.clone())
            }
            ModelSourceSpec::HuggingFace {
                repo_id,
                filename,
                revision,
            } => {
                tracing::info!(
                    repo = %repo_id,
                    file = %filename,
                    "Fetching weights from Hugging Face"
                );

                let api = Api::new()
                    .map_err(|e| Error::model_load(format!("Failed to initialize HF API: {e}")))?;
                let repo = api.repo(Repo::with_revision(
                    repo_id.clone(),
                    RepoType::Model,
                    revision.clone().unwrap_or_else(|| "main".to_string()),
                ));

                repo.get(filename).map_err(|e| {
                    Error::model_load(format!("Failed to download model from HF: {e}"))
                })
            }
        }
    }

    fn create_device(&self) -> Result<Device> {
        match self.device {
            DeviceSpec::Cpu => Ok(Device::Cpu),
            DeviceSpec::Cuda => Device::new_cuda(0)
                .map_err(|e| Error::model_load(format!("Failed to create CUDA device: {e}"))),
            DeviceSpec::Metal => Device::new_metal(0)
                .map_err(|e| Error::model_load(format!("Failed to create Metal device: {e}"))),
        }
    }

    fn build(&self, vb: VarBuilder<'static>) -> candle_core::Result<Func<'static>> {
        match self.architecture {
            Architecture::Resnet18 => resnet::resnet18(self.num_classes, vb),
            Architecture::Resnet34 => resnet::resnet34(self.num_classes, vb),
            Architecture::Resnet50 => resnet::resnet50(self.num_classes, vb),
        }
    }
}

impl ModelLoader for CandleModelLoader {
    fn load(&self) -> Result<Arc<dyn ImageModel>> {
        let weights = self.resolve_weights()?;
        let device = self.create_device()?;

        // SAFETY: the weights file is memory-mapped read-only and must not be
        // modified while the model is alive.
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[&weights], DType::F32, &device)
                .map_err(|e| Error::model_load(format!("Failed to load weights: {e}")))?
        };

        let network = self.build(vb).map_err(|e| {
            Error::model_load(format!(
                "Weights in {} do not match {}: {e}",
                weights.display(),
                self.architecture.as_str()
            ))
        })?;

        let model = CandleModel {
            name: format!("candle-{}", self.architecture.as_str()),
            network,
            device,
            num_classes: self.num_classes,
        };

        // One dry pass surfaces shape mismatches at load time and warms the allocator
        let side = self.input_size as usize;
        let probe = PreprocessedImage::zeros(side);
        let logits = model
            .forward(&probe)
            .map_err(|e| Error::model_load(format!("Model failed its probe inference: {e}")))?;
        if logits.len() != self.num_classes {
            return Err(Error::model_load(format!(
                "Model produces {} scores, expected {}",
                logits.len(),
                self.num_classes
            )));
        }

        tracing::info!(
            model = %model.name,
            weights = %weights.display(),
            "Loaded candle image model"
        );

        Ok(Arc::new(model))
    }

    fn describe(&self) -> String {
        format!("{} ({})", self.source.describe(), self.architecture.as_str())
    }
}

/// A ResNet held in memory by candle
pub struct CandleModel {
    name: String,
    network: Func<'static>,
    device: Device,
    num_classes: usize,
}

impl ImageModel for CandleModel {
    fn forward(&self, input: &PreprocessedImage) -> Result<Vec<f32>> {
        let [c, h, w] = input.shape();

        let logits = Tensor::from_slice(input.data(), (c, h, w), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .and_then(|t| self.network.forward(&t))
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(|e| Error::inference(format!("Model forward pass failed: {e}")))?;

        Ok(logits)
    }

    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn name(&self) -> &str {
        &self.name
    }
}
