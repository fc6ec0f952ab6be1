//! `emend.toml` loading.
//!
//! Lookup order: an explicit `--config` path, then `$EMEND_CONFIG`, then
//! `./emend.toml` if it exists, else built-in defaults. Completion
//! environment overrides (`EMEND_COMPLETION_URL`, `EMEND_MODEL`) apply last.

use std::path::{Path, PathBuf};

use emend_completion::CompletionConfig;
use emend_pipeline::PipelineConfig;
use emend_review::ReviewConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "EMEND_CONFIG";

/// Config file looked for in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "emend.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmendConfig {
    pub pipeline: PipelineConfig,
    pub completion: CompletionConfig,
    pub review: ReviewConfig,
}

impl EmendConfig {
    /// Parse TOML text.
    ///
    /// # Errors
    /// Returns `Parse` for malformed TOML and `Invalid` for out-of-range values.
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file.
    ///
    /// # Errors
    /// Returns `Read` if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Pick the config file to load, if any.
    #[must_use]
    pub fn resolve_path(
        explicit: Option<&Path>,
        from_env: Option<PathBuf>,
        working_dir: &Path,
    ) -> Option<PathBuf> {
        explicit.map(Path::to_path_buf).or(from_env).or_else(|| {
            let local = working_dir.join(DEFAULT_CONFIG_FILE);
            local.is_file().then_some(local)
        })
    }

    /// Load using the standard lookup order and environment overrides.
    ///
    /// # Errors
    /// Returns an error if a selected file cannot be read, parsed, or
    /// validated.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let working_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

        let mut config = match Self::resolve_path(explicit, from_env, &working_dir) {
            Some(path) => {
                debug!(path = %path.display(), "Loading config file");
                Self::from_file(&path)?
            }
            None => {
                debug!("No config file found, using defaults");
                Self::default()
            }
        };
        config.completion = config.completion.with_env_overrides();
        Ok(config)
    }

    /// Reject out-of-range values in every section.
    ///
    /// # Errors
    /// Returns `Invalid` naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid { reason };
        self.pipeline.validate().map_err(|e| invalid(e.to_string()))?;
        self.completion
            .validate()
            .map_err(|e| invalid(e.to_string()))?;
        self.review.validate().map_err(|e| invalid(e.to_string()))
    }
}
