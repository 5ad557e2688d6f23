//! Test doubles for the inference runtime
//!
//! `ScriptedModel` recognizes a handful of synthetic "scenes" by the mean
//! color of the preprocessed image and returns fixed logits for each, so
//! scenario tests run without model weights.

#![allow(dead_code)]

use foodgate_classifiers::preprocess::{IMAGENET_MEAN, IMAGENET_STD};
use foodgate_classifiers::{
    ClassifierConfig, FoodGate, ImageModel, InferenceEngine, ModelLoader, PreprocessedImage,
    RealEngine,
};
use foodgate_core::{Error, ImageInput, Result};
use image::{ImageFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

pub const NUM_CLASSES: usize = 1000;

pub const CARBONARA: usize = 959;
pub const PLATE: usize = 923;
pub const SOUP_BOWL: usize = 809;
pub const LAPTOP: usize = 620;
pub const NOTEBOOK: usize = 681;

/// Synthetic photos the scripted model knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    /// Plate of pasta: carbonara on top, plate second
    Pasta,
    /// Laptop on a desk: nothing food-related
    Laptop,
    /// Empty dinner plate: plate on top, soup bowl second
    EmptyPlate,
    /// Model has no idea: all logits equal
    Uncertain,
}

impl Scene {
    pub const ALL: [Scene; 4] = [Scene::Pasta, Scene::Laptop, Scene::EmptyPlate, Scene::Uncertain];

    fn color(&self) -> [u8; 3] {
        match self {
            Scene::Pasta => [230, 200, 90],
            Scene::Laptop => [40, 40, 48],
            Scene::EmptyPlate => [250, 250, 250],
            Scene::Uncertain => [30, 140, 220],
        }
    }

    fn logits(&self) -> Vec<f32> {
        let mut logits = vec![0.0; NUM_CLASSES];
        match self {
            Scene::Pasta => {
                logits[CARBONARA] = 10.0;
                logits[PLATE] = 8.0;
            }
            Scene::Laptop => {
                logits[LAPTOP] = 10.0;
                logits[NOTEBOOK] = 8.0;
            }
            Scene::EmptyPlate => {
                logits[PLATE] = 10.0;
                logits[SOUP_BOWL] = 7.0;
            }
            Scene::Uncertain => {}
        }
        logits
    }

    /// Encoded PNG of this scene
    pub fn png(&self) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        RgbImage::from_pixel(64, 48, Rgb(self.color()))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    pub fn input(&self) -> ImageInput {
        ImageInput::from(self.png())
    }
}

fn mean_rgb(input: &PreprocessedImage) -> [f32; 3] {
    let [_, h, w] = input.shape();
    let plane = h * w;
    let mut out = [0.0; 3];
    for (c, value) in out.iter_mut().enumerate() {
        let sum: f32 = input.data()[c * plane..(c + 1) * plane].iter().sum();
        *value = (sum / plane as f32 * IMAGENET_STD[c] + IMAGENET_MEAN[c]) * 255.0;
    }
    out
}

/// Model that maps the nearest known scene color to scripted logits
pub struct ScriptedModel;

impl ImageModel for ScriptedModel {
    fn forward(&self, input: &PreprocessedImage) -> Result<Vec<f32>> {
        let rgb = mean_rgb(input);
        let scene = Scene::ALL
            .iter()
            .min_by(|a, b| {
                let da = distance(rgb, a.color());
                let db = distance(rgb, b.color());
                da.total_cmp(&db)
            })
            .copied()
            .unwrap_or(Scene::Uncertain);
        Ok(scene.logits())
    }

    fn num_classes(&self) -> usize {
        NUM_CLASSES
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn distance(a: [f32; 3], b: [u8; 3]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - *y as f32).powi(2))
        .sum()
}

/// Model returning a fixed logit vector regardless of input
pub struct FixedLogitsModel(pub Vec<f32>);

impl ImageModel for FixedLogitsModel {
    fn forward(&self, _input: &PreprocessedImage) -> Result<Vec<f32>> {
        Ok(self.0.clone())
    }

    fn num_classes(&self) -> usize {
        self.0.len()
    }

    fn name(&self) -> &str {
        "fixed-logits"
    }
}

/// Model that panics on every forward pass
pub struct PanickingModel;

impl ImageModel for PanickingModel {
    fn forward(&self, _input: &PreprocessedImage) -> Result<Vec<f32>> {
        panic!("tensor shape mismatch deep inside the runtime")
    }

    fn num_classes(&self) -> usize {
        NUM_CLASSES
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// How a [`CountingLoader`] behaves on each call
#[derive(Clone, Copy)]
pub enum LoadBehavior {
    Succeed,
    Fail,
    /// Fail on the first call, succeed afterwards
    FailOnce,
}

/// Loader that counts calls and can be slowed down or made to fail
pub struct CountingLoader {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    behavior: LoadBehavior,
    model: Arc<dyn ImageModel>,
}

impl CountingLoader {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            behavior: LoadBehavior::Succeed,
            model: Arc::new(ScriptedModel),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_behavior(mut self, behavior: LoadBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn with_model(mut self, model: Arc<dyn ImageModel>) -> Self {
        self.model = model;
        self
    }

    /// Shared handle to the call counter
    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl ModelLoader for CountingLoader {
    fn load(&self) -> Result<Arc<dyn ImageModel>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let fail = match self.behavior {
            LoadBehavior::Succeed => false,
            LoadBehavior::Fail => true,
            LoadBehavior::FailOnce => call == 0,
        };
        if fail {
            return Err(Error::model_load("weights file is corrupt"));
        }
        Ok(Arc::clone(&self.model))
    }

    fn describe(&self) -> String {
        "counting-loader".to_string()
    }
}

static TRACING: Once = Once::new();

/// Route engine and gate logs through the test harness; `RUST_LOG` filters them
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("foodgate=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Engine over a loader with a generous timeout
pub fn engine_with(loader: CountingLoader) -> Arc<RealEngine> {
    init_tracing();
    Arc::new(RealEngine::new("test-engine", Arc::new(loader), Duration::from_secs(10)))
}

/// Gate over a scripted engine; returns the loader call counter too
pub fn scripted_gate(threshold: f32) -> (FoodGate, Arc<AtomicUsize>) {
    let loader = CountingLoader::new().with_delay(Duration::from_millis(50));
    let calls = loader.calls();
    let engine: Arc<dyn InferenceEngine> = engine_with(loader);
    let config = ClassifierConfig::default().with_threshold(threshold);
    let gate = FoodGate::new(engine, config).unwrap();
    (gate, calls)
}
