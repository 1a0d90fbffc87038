use crate::error::Result;
use crate::ml::models::ClassifierConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Environment variable naming an optional configuration file
pub const CONFIG_PATH_ENV: &str = "TRIAGE_CONFIG_PATH";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Classifier hyper-parameters
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Default file locations
    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load configuration: embedded defaults, then a file, then `TRIAGE__*` variables.
    ///
    /// An explicit `path` must exist; otherwise the file named by
    /// `TRIAGE_CONFIG_PATH` (or `config/triage.toml`) is used when present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let file = match path {
            Some(path) => config::File::from(path.to_path_buf()).required(true),
            None => {
                let fallback = std::env::var(CONFIG_PATH_ENV)
                    .unwrap_or_else(|_| "config/triage.toml".to_string());
                config::File::with_name(&fallback).required(false)
            }
        };

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(file)
            .add_source(env)
            .build()?
            .try_deserialize()?;

        config.classifier.validate()?;
        Ok(config)
    }
}

/// Environment overrides (prefix: TRIAGE__)
fn environment() -> config::Environment {
    config::Environment::with_prefix("TRIAGE")
        .separator("__")
        .try_parsing(true)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            observability: ObservabilityConfig::default(),
            classifier: ClassifierConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level filter used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[serde(default)]
    pub json_logs: bool,

    /// Service name
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            service_name: default_service_name(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Training CSV used when the CLI is not given one
    pub dataset: Option<PathBuf>,

    /// Model artifact written after training and read for prediction
    pub model: Option<PathBuf>,
}

// Default value functions

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "complaint-triage".to_string()
}
