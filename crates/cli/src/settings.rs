// Copyright 2025 LLM Observatory Contributors
// SPDX-License-Identifier: Apache-2.0

//! Layered CLI settings.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `bench-history.toml` when present)
//! 3. environment variables, e.g. `BENCH_HISTORY__REGRESSION__ALERT_THRESHOLD=0.2`

use bench_history_core::RegressionConfig;
use bench_history_storage::StoreOptions;
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Settings file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "bench-history.toml";

/// Prefix of environment overrides.
pub const ENV_PREFIX: &str = "BENCH_HISTORY";

/// Settings errors.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A source could not be read or deserialized.
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// Regression settings are out of range.
    #[error("invalid regression settings: {0}")]
    Regression(#[from] bench_history_core::ConfigError),

    /// A store setting is out of range.
    #[error("invalid store settings: {0}")]
    Store(String),
}

/// History store settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// History file; `.js` selects the dashboard `data.js` encoding.
    pub path: PathBuf,
    /// Repository URL recorded in a new history.
    pub repo_url: String,
    /// Bound on each load or save, in milliseconds.
    pub io_timeout_ms: u64,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::from("dev/bench/data.js"),
            repo_url: String::new(),
            io_timeout_ms: 10_000,
        }
    }
}

impl StoreSettings {
    /// Store options derived from these settings.
    pub fn options(&self) -> StoreOptions {
        StoreOptions::new(self.repo_url.clone())
            .with_io_timeout(Duration::from_millis(self.io_timeout_ms))
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// All CLI settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// History store.
    pub store: StoreSettings,
    /// Regression detection.
    pub regression: RegressionConfig,
    /// Logging.
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from the file and the process environment.
    pub fn load(config_file: Option<&Path>) -> Result<Self, SettingsError> {
        Self::load_with_env(config_file, None)
    }

    /// Load settings, reading environment overrides from `env` instead of
    /// the process environment when given.
    pub fn load_with_env(
        config_file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, SettingsError> {
        let file = match config_file {
            Some(path) => File::from(path).format(FileFormat::Toml).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE)
                .format(FileFormat::Toml)
                .required(false),
        };

        let settings: Settings = Config::builder()
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), SettingsError> {
        self.regression.validate()?;
        if self.store.io_timeout_ms == 0 {
            return Err(SettingsError::Store(
                "io_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.store.path.as_os_str().is_empty() {
            return Err(SettingsError::Store("path must not be empty".to_string()));
        }
        Ok(())
    }
}
