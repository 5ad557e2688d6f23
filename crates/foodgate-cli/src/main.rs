//! FoodGate CLI
//!
//! Runs images through the food gate and prints one JSON decision per line.
//! Logs go to stderr so stdout stays machine-readable.

use anyhow::Result;
use clap::{Parser, Subcommand};
use foodgate_classifiers::{AlwaysFoodStub, EngineState, FoodGate, InferenceEngine};
use foodgate_core::ImageInput;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{error, info};

mod config;

use config::{AppConfig, EngineKind};

#[derive(Parser, Debug)]
#[command(name = "foodgate")]
#[command(about = "Food/non-food image gate", long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Model weights (safetensors)
    #[arg(short, long, env = "FOODGATE_MODEL", global = true)]
    model: Option<PathBuf>,

    /// Minimum food confidence (0.0-1.0)
    #[arg(short, long, env = "FOODGATE_THRESHOLD", global = true)]
    threshold: Option<f32>,

    /// Log every classification with its top classes
    #[arg(long, global = true)]
    debug: bool,

    /// Use the always-food engine instead of loading a model
    #[arg(long, global = true)]
    stub: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check images; `-` reads one image from stdin
    Check {
        /// Image files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Treat file contents as base64 text (data URLs accepted)
        #[arg(long)]
        base64: bool,

        /// Print Prometheus metrics to stderr when done
        #[arg(long)]
        metrics: bool,
    },
    /// Load the model and print engine status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.json_logs);

    let config = AppConfig::load(&cli)?;
    info!(
        engine = ?config.engine,
        model = %config.classifier.model.describe(),
        threshold = config.classifier.threshold,
        "Configuration loaded"
    );

    match &cli.command {
        Command::Check {
            files,
            base64,
            metrics,
        } => {
            let metrics_handle = if *metrics { Some(init_metrics()?) } else { None };
            let gate = build_gate(&config)?;
            gate.warmup().await;

            let failures = check_files(&gate, files, *base64).await?;

            let snapshot = gate.metrics();
            info!(
                checks = snapshot.checks,
                passed = snapshot.passed,
                rejected = snapshot.rejected,
                fail_open = snapshot.fail_open,
                avg_latency_us = snapshot.avg_latency_us(),
                "Done"
            );
            if let Some(handle) = metrics_handle {
                eprint!("{}", handle.render());
            }

            if failures > 0 {
                anyhow::bail!("{failures} file(s) could not be read");
            }
        }
        Command::Status => {
            let gate = build_gate(&config)?;
            gate.warmup().await;

            let status = gate.status();
            let report = json!({ "config": gate.config(), "status": status });
            println!("{}", serde_json::to_string_pretty(&report)?);

            if status.state == EngineState::Failed {
                anyhow::bail!("model failed to load");
            }
        }
    }

    Ok(())
}

/// Run every file through the gate, printing one JSON line each.
/// Returns the number of files that could not be read.
async fn check_files(gate: &FoodGate, files: &[PathBuf], base64: bool) -> Result<usize> {
    let mut failures = 0;

    for path in files {
        let name = path.display().to_string();
        let line = match read_input(path, base64).await {
            Ok(input) => {
                let result = gate.check(&input).await;
                let mut line = serde_json::to_value(&result)?;
                line["file"] = json!(name);
                line
            }
            Err(err) => {
                error!(file = %name, error = %err, "Failed to read image");
                failures += 1;
                json!({ "file": name, "error": err.to_string() })
            }
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    Ok(failures)
}

async fn read_input(path: &Path, base64: bool) -> std::io::Result<ImageInput> {
    let bytes = if path == Path::new("-") {
        let mut buf = Vec::new();
        tokio::io::stdin().read_to_end(&mut buf).await?;
        buf
    } else {
        tokio::fs::read(path).await?
    };

    if base64 {
        Ok(ImageInput::from_base64(String::from_utf8_lossy(&bytes).into_owned()))
    } else {
        Ok(ImageInput::from(bytes))
    }
}

/// Wire the configured engine into a gate
fn build_gate(config: &AppConfig) -> Result<FoodGate> {
    let engine: Arc<dyn InferenceEngine> = match config.engine {
        EngineKind::Stub => Arc::new(AlwaysFoodStub::with_num_classes(
            config.classifier.num_classes,
        )?),
        EngineKind::Candle => candle_engine(config)?,
    };
    info!(engine = %engine.name(), "Food gate ready");
    Ok(FoodGate::new(engine, config.classifier.clone())?)
}

#[cfg(feature = "ml-models")]
fn candle_engine(config: &AppConfig) -> Result<Arc<dyn InferenceEngine>> {
    Ok(Arc::new(foodgate_classifiers::RealEngine::candle(
        &config.classifier,
    )))
}

#[cfg(not(feature = "ml-models"))]
fn candle_engine(_config: &AppConfig) -> Result<Arc<dyn InferenceEngine>> {
    anyhow::bail!("built without the ml-models feature, use --stub")
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("foodgate=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("foodgate=info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// Initialize metrics exporter and return handle for rendering
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    foodgate_telemetry::describe_metrics();

    info!("Metrics recorder installed");
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foodgate_classifiers::ClassifierConfig;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png() -> ImageInput {
        let mut buf = Cursor::new(Vec::new());
        RgbImage::from_pixel(16, 16, Rgb([90, 140, 60]))
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        ImageInput::from(buf.into_inner())
    }

    fn stub_config(num_classes: usize) -> AppConfig {
        AppConfig {
            engine: EngineKind::Stub,
            classifier: ClassifierConfig {
                num_classes,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_stub_gate_uses_configured_classes() {
        let gate = build_gate(&stub_config(1001)).unwrap();

        let result = gate.check(&png()).await;

        assert!(result.should_proceed);
        assert!(result.rejection_reason.is_none(), "{:?}", result.rejection_reason);
        assert!(result.food_confidence > 0.99);
    }

    #[test]
    fn test_stub_gate_rejects_too_few_classes() {
        assert!(build_gate(&stub_config(100)).is_err());
    }
}
