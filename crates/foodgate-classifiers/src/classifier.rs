//! Food classifier: preprocessing, inference and score reduction

use crate::config::ClassifierConfig;
use crate::engine::{EngineState, InferenceEngine};
use crate::preprocess::preprocess;
use crate::scoring::{actual_food_mass, argmax, food_mass, softmax, top_k};
use crate::taxonomy::{self, ClassIndex, FoodCategory};
use foodgate_core::{Error, ImageInput, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// One class of the score vector with its label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedClass {
    /// Class index
    pub index: ClassIndex,

    /// Curated label, or `class_<index>` for classes outside the taxonomy
    pub label: String,

    /// Softmax probability of this class
    pub score: f32,

    /// Taxonomy category
    pub category: FoodCategory,
}

impl DetectedClass {
    fn new(index: ClassIndex, score: f32) -> Self {
        let label = taxonomy::label_name(index)
            .map(str::to_string)
            .unwrap_or_else(|| format!("class_{index}"));
        Self {
            index,
            label,
            score,
            category: taxonomy::category(index),
        }
    }
}

/// Result of classifying one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Aggregate food confidence reached the threshold
    pub is_food: bool,

    /// Probability mass on food and food-related classes (0.0-1.0)
    pub confidence: f32,

    /// Probability mass on actual food classes only (0.0-1.0)
    pub actual_food_confidence: f32,

    /// Top-1 class, for diagnostics only
    pub detected_class: Option<DetectedClass>,

    /// Best classes, highest first
    pub top_classes: Vec<DetectedClass>,

    /// Threshold the decision was made against
    pub threshold: f32,

    /// Latency in microseconds
    pub latency_us: u64,
}

/// Per-call adjustments to the classifier configuration
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ClassifyOptions {
    pub threshold: Option<f32>,
    pub debug: Option<bool>,
}

impl ClassifyOptions {
    /// Use a different threshold for this call
    pub fn with_threshold(threshold: f32) -> Self {
        Self {
            threshold: Some(threshold),
            debug: None,
        }
    }
}

/// Decides food vs. not food for a single image
pub struct FoodClassifier {
    engine: Arc<dyn InferenceEngine>,
    config: ClassifierConfig,
}

impl FoodClassifier {
    /// Create a classifier over a shared engine
    pub fn new(engine: Arc<dyn InferenceEngine>, config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { engine, config })
    }

    pub(crate) fn unchecked(engine: Arc<dyn InferenceEngine>, config: ClassifierConfig) -> Self {
        Self { engine, config }
    }

    /// The engine this classifier runs on
    pub fn engine(&self) -> &Arc<dyn InferenceEngine> {
        &self.engine
    }

    /// Effective configuration
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify with the configured threshold
    pub async fn classify(&self, image: &ImageInput) -> Result<ClassificationResult> {
        self.classify_with(image, ClassifyOptions::default()).await
    }

    /// Classify with per-call overrides.
    ///
    /// Every failure is returned as [`Error::Classification`] wrapping the
    /// preprocessor or engine error that caused it.
    pub async fn classify_with(
        &self,
        image: &ImageInput,
        options: ClassifyOptions,
    ) -> Result<ClassificationResult> {
        self.run_pipeline(image, options)
            .await
            .map_err(Error::classification)
    }

    async fn run_pipeline(
        &self,
        image: &ImageInput,
        options: ClassifyOptions,
    ) -> Result<ClassificationResult> {
        let start = Instant::now();

        let threshold = options.threshold.unwrap_or(self.config.threshold);
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::config(format!(
                "threshold must be within [0, 1], got {threshold}"
            )));
        }
        let debug = options.debug.unwrap_or(self.config.debug);

        self.ensure_ready().await?;

        let tensor = preprocess(image, self.config.input_size)?;
        let logits = self.engine.run(&tensor).await?;
        if logits.len() != self.config.num_classes {
            return Err(Error::inference(format!(
                "model returned {} scores, expected {}",
                logits.len(),
                self.config.num_classes
            )));
        }

        let probs = softmax(&logits)?;
        let confidence = food_mass(&probs);
        let actual_food_confidence = actual_food_mass(&probs);
        let detected_class = argmax(&probs).map(|(index, score)| DetectedClass::new(index, score));
        let top_classes: Vec<DetectedClass> = top_k(&probs, self.config.top_k)
            .into_iter()
            .map(|(index, score)| DetectedClass::new(index, score))
            .collect();

        let is_food = confidence >= threshold;
        let latency_us = start.elapsed().as_micros() as u64;

        if debug {
            let (width, height) = tensor.original_dimensions();
            let top: Vec<String> = top_classes
                .iter()
                .map(|c| format!("{}={:.3}", c.label, c.score))
                .collect();
            tracing::info!(
                is_food,
                confidence,
                actual_food_confidence,
                threshold,
                ?top,
                width,
                height,
                latency_us,
                "Food classification"
            );
        } else {
            tracing::trace!(is_food, confidence, latency_us, "Food classification");
        }

        Ok(ClassificationResult {
            is_food,
            confidence,
            actual_food_confidence,
            detected_class,
            top_classes,
            threshold,
            latency_us,
        })
    }

    async fn ensure_ready(&self) -> Result<()> {
        match self.engine.state() {
            EngineState::Ready => Ok(()),
            EngineState::Unloaded | EngineState::Loading => self.engine.load_model().await,
            EngineState::Failed => {
                let reason = self
                    .engine
                    .status()
                    .last_error
                    .unwrap_or_else(|| "previous load failed".to_string());
                Err(Error::model_load(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::AlwaysFoodStub;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png() -> ImageInput {
        let mut buf = Cursor::new(Vec::new());
        RgbImage::from_pixel(16, 16, Rgb([120, 80, 40]))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        ImageInput::from(buf.into_inner())
    }

    fn stub_classifier() -> FoodClassifier {
        FoodClassifier::new(Arc::new(AlwaysFoodStub::new()), ClassifierConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_stub_classifies_food() {
        let classifier = stub_classifier();
        let result = classifier.classify(&png()).await.unwrap();

        assert!(result.is_food);
        assert!(result.confidence > 0.99);
        let top = result.detected_class.unwrap();
        assert_eq!(top.label, "pizza");
        assert_eq!(top.category, FoodCategory::Food);
        assert_eq!(result.top_classes.len(), 5);
        assert!(classifier.engine().is_ready());
    }

    #[tokio::test]
    async fn test_decode_error_is_wrapped() {
        let classifier = stub_classifier();
        let err = classifier
            .classify(&ImageInput::from(vec![0xff, 0xd8, 0xff, 0x00]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Classification { .. }));
        assert!(matches!(err.root_cause(), Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_invalid_threshold_override() {
        let classifier = stub_classifier();
        let err = classifier
            .classify_with(&png(), ClassifyOptions::with_threshold(2.0))
            .await
            .unwrap_err();
        assert!(matches!(err.root_cause(), Error::Config(_)));
    }

    #[test]
    fn test_new_validates_config() {
        let config = ClassifierConfig::default().with_threshold(-0.1);
        assert!(FoodClassifier::new(Arc::new(AlwaysFoodStub::new()), config).is_err());
    }
}
