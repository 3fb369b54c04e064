//! Layered runtime configuration.
//!
//! # Responsibility
//! - Describe database and logging settings with usable defaults.
//! - Load them from an optional file overlaid with `ENTITIES__*` environment
//!   variables.
//!
//! # Invariants
//! - Missing sections and keys fall back to defaults.
//! - An explicitly named file must exist.

use config::{Config, Environment, File};
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "ENTITIES";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_DATABASE_PATH: &str = "entities.sqlite3";

/// Configuration loading failure.
#[derive(Debug)]
pub enum ConfigError {
    Config {
        source: config::ConfigError,
        context: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config { source, context } => write!(f, "{context}: {source}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config { source, .. } => Some(source),
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitiesConfig {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path. Created and migrated on open.
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

/// `[logging]` section. Logging stays off until `dir` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `trace|debug|info|warn|error`; build-mode default when unset.
    pub level: Option<String>,
    /// Absolute directory for rolling log files.
    pub dir: Option<PathBuf>,
}

/// Loads configuration from `path` (when given) and the process environment.
///
/// Environment keys use the `ENTITIES__` prefix and `__` between sections,
/// e.g. `ENTITIES__DATABASE__PATH`.
///
/// # Errors
/// Fails when a named file is missing or malformed, or values do not
/// deserialize into [`EntitiesConfig`].
pub fn load_config(path: Option<&Path>) -> Result<EntitiesConfig, ConfigError> {
    load_with_env(path, None)
}

fn load_with_env(
    path: Option<&Path>,
    env: Option<HashMap<String, String>>,
) -> Result<EntitiesConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        info!("event=config_load module=config status=start source=file");
        builder = builder.add_source(File::from(path).required(true));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .source(env),
    );

    builder
        .build()
        .map_err(|source| ConfigError::Config {
            source,
            context: "failed to build config",
        })?
        .try_deserialize::<EntitiesConfig>()
        .map_err(|source| ConfigError::Config {
            source,
            context: "failed to deserialize config",
        })
}
