//! Inference engines and their load state machine
//!
//! An engine owns at most one loaded model. Loading is the only operation
//! that needs coordination: every caller that finds the engine unloaded
//! joins the same in-flight load future, so the loader runs once and all of
//! them observe the same outcome. Once ready, `run` touches only immutable
//! weights and needs no locking beyond cloning an `Arc`.

use crate::preprocess::PreprocessedImage;
use crate::runtime::{ImageModel, ModelLoader};
use crate::taxonomy::ClassIndex;
use async_trait::async_trait;
use foodgate_core::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Coarse engine state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineState {
    Unloaded,
    Loading,
    Ready,
    Failed,
}

/// Health snapshot for readiness endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    /// Engine name
    pub engine: String,

    /// Current state
    pub state: EngineState,

    /// Message of the most recent failed load, cleared on success or reset
    pub last_error: Option<String>,

    /// Number of underlying load operations started
    pub load_attempts: u64,

    /// Where the weights come from
    pub model: Option<String>,
}

/// An inference engine shared by every classification in the process
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// Load the model.
    ///
    /// No-op when ready; joins the in-flight load when loading; starts a new
    /// load when unloaded or failed.
    async fn load_model(&self) -> Result<()>;

    /// Score one preprocessed image. Fails with [`Error::NotLoaded`] unless ready.
    async fn run(&self, input: &PreprocessedImage) -> Result<Vec<f32>>;

    /// Current state
    fn state(&self) -> EngineState;

    /// Whether `run` will find a model
    fn is_ready(&self) -> bool {
        self.state() == EngineState::Ready
    }

    /// Drop the model and return to `Unloaded`
    fn reset(&self);

    /// Health snapshot
    fn status(&self) -> EngineStatus;

    /// Engine name
    fn name(&self) -> &str;
}

type LoadOutcome = std::result::Result<Arc<dyn ImageModel>, String>;
type LoadFuture = Shared<BoxFuture<'static, LoadOutcome>>;

enum Slot {
    Unloaded,
    Loading { generation: u64, load: LoadFuture },
    Ready(Arc<dyn ImageModel>),
    Failed,
}

/// Engine backed by real model weights
pub struct RealEngine {
    name: String,
    loader: Arc<dyn ModelLoader>,
    load_timeout: Duration,
    slot: Mutex<Slot>,
    last_error: Mutex<Option<String>>,
    generation: AtomicU64,
    load_attempts: Arc<AtomicU64>,
}

impl RealEngine {
    /// Create an unloaded engine around a model loader
    pub fn new(
        name: impl Into<String>,
        loader: Arc<dyn ModelLoader>,
        load_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            loader,
            load_timeout,
            slot: Mutex::new(Slot::Unloaded),
            last_error: Mutex::new(None),
            generation: AtomicU64::new(0),
            load_attempts: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Engine using candle with the weights named in `config`
    #[cfg(feature = "ml-models")]
    pub fn candle(config: &crate::config::ClassifierConfig) -> Self {
        let loader = crate::runtime::CandleModelLoader::from_config(config);
        Self::new(
            format!("candle-{}", config.architecture.as_str()),
            Arc::new(loader),
            config.load_timeout(),
        )
    }

    fn start_load(&self) -> LoadFuture {
        let loader = Arc::clone(&self.loader);
        let attempts = Arc::clone(&self.load_attempts);
        let timeout = self.load_timeout;

        async move {
            attempts.fetch_add(1, Ordering::SeqCst);
            let task = tokio::task::spawn_blocking(move || loader.load());

            match tokio::time::timeout(timeout, task).await {
                Ok(Ok(Ok(model))) => Ok(model),
                Ok(Ok(Err(e))) => Err(match e {
                    Error::ModelLoad(msg) => msg,
                    other => other.to_string(),
                }),
                Ok(Err(join)) => Err(format!("model load task failed: {join}")),
                Err(_) => Err(Error::Timeout(timeout).to_string()),
            }
        }
        .boxed()
        .shared()
    }

    /// Record the outcome of load `generation`, unless a reset superseded it
    fn settle(&self, generation: u64, outcome: &LoadOutcome) {
        let mut slot = self.slot.lock();
        let current = matches!(&*slot, Slot::Loading { generation: g, .. } if *g == generation);
        if !current {
            return;
        }

        match outcome {
            Ok(model) => {
                info!(
                    engine = %self.name,
                    model = %model.name(),
                    num_classes = model.num_classes(),
                    "Model ready"
                );
                *slot = Slot::Ready(Arc::clone(model));
                *self.last_error.lock() = None;
            }
            Err(msg) => {
                error!(engine = %self.name, error = %msg, "Model load failed");
                *slot = Slot::Failed;
                *self.last_error.lock() = Some(msg.clone());
            }
        }
    }

    fn ready_model(&self) -> Option<Arc<dyn ImageModel>> {
        match &*self.slot.lock() {
            Slot::Ready(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }
}

#[async_trait]
impl InferenceEngine for RealEngine {
    async fn load_model(&self) -> Result<()> {
        let (generation, load) = {
            let mut slot = self.slot.lock();
            match &*slot {
                Slot::Ready(_) => return Ok(()),
                Slot::Loading { generation, load } => (*generation, load.clone()),
                Slot::Unloaded | Slot::Failed => {
                    let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(engine = %self.name, model = %self.loader.describe(), "Loading model");
                    let load = self.start_load();
                    *slot = Slot::Loading {
                        generation,
                        load: load.clone(),
                    };
                    (generation, load)
                }
            }
        };

        let outcome = load.await;
        self.settle(generation, &outcome);
        outcome.map(|_| ()).map_err(Error::ModelLoad)
    }

    async fn run(&self, input: &PreprocessedImage) -> Result<Vec<f32>> {
        let model = self.ready_model().ok_or(Error::NotLoaded)?;
        let logits = model.forward(input)?;
        if logits.len() != model.num_classes() {
            return Err(Error::inference(format!(
                "{} returned {} scores, declares {}",
                model.name(),
                logits.len(),
                model.num_classes()
            )));
        }
        Ok(logits)
    }

    fn state(&self) -> EngineState {
        match &*self.slot.lock() {
            Slot::Unloaded => EngineState::Unloaded,
            Slot::Loading { .. } => EngineState::Loading,
            Slot::Ready(_) => EngineState::Ready,
            Slot::Failed => EngineState::Failed,
        }
    }

    fn reset(&self) {
        let mut slot = self.slot.lock();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *slot = Slot::Unloaded;
        *self.last_error.lock() = None;
        info!(engine = %self.name, "Engine reset");
    }

    fn status(&self) -> EngineStatus {
        let state = self.state();
        EngineStatus {
            engine: self.name.clone(),
            state,
            last_error: self.last_error.lock().clone(),
            load_attempts: self.load_attempts.load(Ordering::SeqCst),
            model: Some(self.loader.describe()),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Class the stub puts all of its mass on (ImageNet "pizza")
pub const STUB_FOOD_CLASS: ClassIndex = 963;

/// Engine for deployments that cannot ship a model.
///
/// Loads instantly and scores every image as confidently food, so the gate
/// lets everything through. The score vector length must match the
/// classifier's `num_classes`.
pub struct AlwaysFoodStub {
    num_classes: usize,
    loaded: AtomicBool,
    load_attempts: AtomicU64,
}

impl AlwaysFoodStub {
    /// Stub sized for an ImageNet-1k classifier
    pub fn new() -> Self {
        Self {
            num_classes: crate::config::DEFAULT_NUM_CLASSES,
            loaded: AtomicBool::new(false),
            load_attempts: AtomicU64::new(0),
        }
    }

    /// Stub producing score vectors of a custom length.
    ///
    /// The length must leave room for [`STUB_FOOD_CLASS`].
    pub fn with_num_classes(num_classes: usize) -> Result<Self> {
        if num_classes <= STUB_FOOD_CLASS {
            return Err(Error::config(format!(
                "always-food stub needs more than {STUB_FOOD_CLASS} classes, got {num_classes}"
            )));
        }
        Ok(Self {
            num_classes,
            ..Self::new()
        })
    }
}

impl Default for AlwaysFoodStub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceEngine for AlwaysFoodStub {
    async fn load_model(&self) -> Result<()> {
        if !self.loaded.swap(true, Ordering::SeqCst) {
            self.load_attempts.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn run(&self, _input: &PreprocessedImage) -> Result<Vec<f32>> {
        if !self.loaded.load(Ordering::SeqCst) {
            return Err(Error::NotLoaded);
        }
        let mut logits = vec![0.0; self.num_classes];
        logits[STUB_FOOD_CLASS] = 50.0;
        Ok(logits)
    }

    fn state(&self) -> EngineState {
        if self.loaded.load(Ordering::SeqCst) {
            EngineState::Ready
        } else {
            EngineState::Unloaded
        }
    }

    fn reset(&self) {
        self.loaded.store(false, Ordering::SeqCst);
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            engine: self.name().to_string(),
            state: self.state(),
            last_error: None,
            load_attempts: self.load_attempts.load(Ordering::SeqCst),
            model: None,
        }
    }

    fn name(&self) -> &str {
        "always-food-stub"
    }
}
