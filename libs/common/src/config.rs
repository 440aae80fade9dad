//! Layered configuration for the dose-calc tools
//!
//! Priority (highest to lowest):
//! 1. Environment variables prefixed `DOSECALC_` (nested keys split on `__`)
//! 2. The explicit config file, or `config/dosecalc.yaml` when it exists
//! 3. Built-in defaults

use dose_calc::EvaluatorConfig;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

/// Config file picked up when no path is given
pub const DEFAULT_CONFIG_PATH: &str = "config/dosecalc.yaml";

/// Prefix of overriding environment variables
pub const CONFIG_ENV_PREFIX: &str = "DOSECALC_";

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. "info" or "warn,dose_calc=debug"
    pub level: String,
    /// Emit JSON events
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete tool configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DosecalcConfig {
    pub evaluator: EvaluatorConfig,
    pub logging: LoggingConfig,
}

impl DosecalcConfig {
    /// Load from defaults, a config file and the environment
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_prefix(path, CONFIG_ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        figment = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                debug!("Loading configuration from {}", path.display());
                merge_file(figment, path)?
            },
            None => figment.merge(Yaml::file(DEFAULT_CONFIG_PATH)),
        };

        let config: Self = figment
            .merge(Env::prefixed(env_prefix).split("__"))
            .extract()
            .map_err(|e| Error::Config(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the evaluator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.evaluator.max_depth == 0 {
            return Err(Error::Config(
                "evaluator.max_depth must be at least 1".to_string(),
            ));
        }
        if self.evaluator.max_depth > dose_calc::MAX_DEPTH_LIMIT {
            return Err(Error::Config(format!(
                "evaluator.max_depth must be at most {}",
                dose_calc::MAX_DEPTH_LIMIT
            )));
        }
        if self.evaluator.default_decimal_places > dose_calc::evaluator::MAX_DECIMAL_PLACES {
            return Err(Error::Config(format!(
                "evaluator.default_decimal_places must be at most {}",
                dose_calc::evaluator::MAX_DECIMAL_PLACES
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::Config("logging.level cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::Config("Config file must have an extension".to_string()))?;

    match extension {
        "yaml" | "yml" => Ok(figment.merge(Yaml::file(path))),
        "toml" => Ok(figment.merge(Toml::file(path))),
        "json" => Ok(figment.merge(Json::file(path))),
        _ => Err(Error::Config(format!(
            "Unsupported config file format: {}",
            extension
        ))),
    }
}
