//! Settings for the `metaes` binary and embedding hosts
//!
//! Sources are layered, later ones winning:
//! 1. built-in defaults
//! 2. an optional TOML file (`metaes.toml` in the working directory, or an
//!    explicit path)
//! 3. `METAES__SECTION__KEY` environment variables, after loading `.env`
//!
//! ```ignore
//! let settings = Settings::builder().config_path("metaes.toml").build()?;
//! let config = settings.evaluation_config();
//! ```

use crate::interpreter::interceptor::{self, EvaluationConfig, Interceptor};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

const DEFAULT_CONFIG_FILE: &str = "metaes.toml";
const ENV_PREFIX: &str = "METAES";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid setting `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub evaluation: EvaluationSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluationSettings {
    /// Register a stable reference for every identifier read
    pub use_references: bool,
    /// Abort after this many node evaluations; 0 disables the budget
    pub step_budget: usize,
    /// Memoize parsed trees per source text
    pub cache_parses: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Settings {
    pub fn builder() -> SettingsBuilder {
        SettingsBuilder::default()
    }

    /// Defaults, `metaes.toml` if present, then the environment
    pub fn load() -> Result<Self, ConfigError> {
        Settings::builder().build()
    }

    /// Evaluation options derived from these settings
    pub fn evaluation_config(&self) -> EvaluationConfig {
        let config = EvaluationConfig::new().with_references(self.evaluation.use_references);
        match self.step_budget() {
            Some(budget) => config.with_interceptor(budget),
            None => config,
        }
    }

    pub fn step_budget(&self) -> Option<Interceptor> {
        match self.evaluation.step_budget {
            0 => None,
            limit => Some(interceptor::step_budget(limit)),
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "logging.filter",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(self)
    }
}

#[derive(Debug, Default)]
pub struct SettingsBuilder {
    config_path: Option<PathBuf>,
    skip_env: bool,
    overrides: Vec<(String, String)>,
}

impl SettingsBuilder {
    /// Explicit config file; unlike the default file it must exist
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Ignore `.env` and process environment variables
    pub fn skip_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    /// Highest-priority override, e.g. `("evaluation.step_budget", "100")`
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.push((key.into(), value.into()));
        self
    }

    pub fn build(self) -> Result<Settings, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("evaluation.use_references", false)?
            .set_default("evaluation.step_budget", 0)?
            .set_default("evaluation.cache_parses", true)?
            .set_default("logging.filter", "metaes=info,console=info")?;

        builder = match &self.config_path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.clone()));
                }
                builder.add_source(config::File::from(path.as_path()).required(true))
            }
            None => builder.add_source(config::File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false)),
        };

        if !self.skip_env {
            if let Ok(path) = dotenvy::dotenv() {
                debug!(path = %path.display(), "loaded .env");
            }
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        for (key, value) in self.overrides {
            builder = builder.set_override(key, value)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()
    }
}
