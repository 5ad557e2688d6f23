//! CLI configuration

use foodgate_classifiers::{ClassifierConfig, ConfigOverrides};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which inference engine the CLI wires into the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// ResNet weights through candle
    #[default]
    Candle,
    /// Scores everything as food
    Stub,
}

/// Configuration file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Inference engine
    #[serde(default)]
    pub engine: EngineKind,

    /// Classifier settings
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl AppConfig {
    /// Load configuration from file and CLI overrides
    pub fn load(cli: &crate::Cli) -> anyhow::Result<Self> {
        let mut config = match config_path(cli.config.as_deref()) {
            Some(path) => {
                info!(path = %path.display(), "Loading configuration");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };

        // Apply CLI overrides
        let overrides = ConfigOverrides {
            model_path: cli.model.clone(),
            threshold: cli.threshold,
            debug: cli.debug.then_some(true),
        };
        if !overrides.is_empty() {
            config.classifier = config.classifier.merged(&overrides)?;
        }

        if cli.stub {
            config.engine = EngineKind::Stub;
        }

        Ok(config)
    }

    /// Parse and validate a YAML file
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content)?;
        config.classifier.validate()?;
        Ok(config)
    }
}

/// File to read: the explicit path if it exists, else the per-user default
fn config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Some(path.to_path_buf());
        }
        warn!(path = %path.display(), "Configuration file not found, using defaults");
        return None;
    }

    default_config_path().filter(|path| path.exists())
}

/// `<config dir>/foodgate/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("foodgate").join("config.yaml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn cli(args: &[&str]) -> crate::Cli {
        let mut argv = vec!["foodgate"];
        argv.extend_from_slice(args);
        argv.push("status");
        crate::Cli::parse_from(argv)
    }

    fn yaml_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_file_then_overrides() {
        let file = yaml_file(
            r#"
engine: candle
classifier:
  model:
    path: "/srv/models/resnet34.safetensors"
  architecture: resnet34
  threshold: 0.4
"#,
        );
        let path = file.path().to_str().unwrap();

        let config = AppConfig::load(&cli(&["--config", path])).unwrap();
        assert_eq!(config.engine, EngineKind::Candle);
        assert_eq!(config.classifier.threshold, 0.4);

        let config =
            AppConfig::load(&cli(&["--config", path, "--threshold", "0.2", "--debug", "--stub"]))
                .unwrap();
        assert_eq!(config.engine, EngineKind::Stub);
        assert_eq!(config.classifier.threshold, 0.2);
        assert!(config.classifier.debug);
        assert_eq!(
            config.classifier.model.local_path(),
            Some(Path::new("/srv/models/resnet34.safetensors"))
        );
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load(&cli(&["--config", "/nonexistent/foodgate.yaml"])).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let file = yaml_file("classifier:\n  threshold: 3.0\n");
        let path = file.path().to_str().unwrap();
        assert!(AppConfig::load(&cli(&["--config", path])).is_err());

        let file = yaml_file("{}");
        let path = file.path().to_str().unwrap();
        assert!(AppConfig::load(&cli(&["--config", path, "--threshold=-1"])).is_err());
    }
}
