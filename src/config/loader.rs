//! Configuration Loader
//!
//! Environment-aware layered loading built on the `config` crate. Layers, lowest
//! precedence first:
//!
//! 1. [`ShutdownConfig::default`]
//! 2. `<dir>/cluster-shutdown.yaml` (optional)
//! 3. `<dir>/cluster-shutdown.<environment>.yaml` (optional)
//! 4. `CLUSTER_SHUTDOWN__SECTION__KEY` environment variables

use super::error::{ConfigResult, ConfigurationError};
use super::ShutdownConfig;
use config::{Config, Environment, File};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CONFIG_FILE_STEM: &str = "cluster-shutdown";
const ENV_PREFIX: &str = "CLUSTER_SHUTDOWN";
const DEFAULT_CONFIG_DIRECTORY: &str = "/etc/cluster-shutdown";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: ShutdownConfig,
    environment: String,
    config_directory: PathBuf,
}

impl ConfigManager {
    /// Load configuration with environment auto-detection
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        Self::load_from_directory(None)
    }

    /// Load configuration from a specific directory
    pub fn load_from_directory(config_dir: Option<PathBuf>) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();
        Self::load_from_directory_with_env(config_dir, &environment)
    }

    /// Load configuration from a specific directory with explicit environment.
    ///
    /// An explicitly named directory must exist; the default directory may be absent,
    /// in which case only defaults and environment variables apply.
    pub fn load_from_directory_with_env(
        config_dir: Option<PathBuf>,
        environment: &str,
    ) -> ConfigResult<Arc<ConfigManager>> {
        if let Some(dir) = &config_dir {
            if !dir.is_dir() {
                return Err(ConfigurationError::DirectoryNotFound { path: dir.clone() });
            }
        }
        Self::load_with_overrides(config_dir, environment, None)
    }

    fn load_with_overrides(
        config_dir: Option<PathBuf>,
        environment: &str,
        env_overrides: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let config_directory =
            config_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIRECTORY));

        debug!(
            "Loading configuration for environment '{}' from directory: {}",
            environment,
            config_directory.display()
        );

        let defaults = Config::try_from(&ShutdownConfig::default())
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        let base_file = Self::config_file(&config_directory, None);
        let env_file = Self::config_file(&config_directory, Some(environment));

        let config: ShutdownConfig = Config::builder()
            .add_source(defaults)
            .add_source(File::from(base_file).required(false))
            .add_source(File::from(env_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("storage.transport_types")
                    .source(env_overrides),
            )
            .build()
            .and_then(Config::try_deserialize)
            .map_err(|e| ConfigurationError::load_error(environment, e))?;

        config.validate()?;

        info!(
            environment = %environment,
            config_directory = %config_directory.display(),
            graceful_timeout_seconds = config.escalation.graceful_timeout_seconds,
            liveness_budget_seconds = config.hosts.liveness_budget_seconds,
            "⚙️ CONFIG: Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment: environment.to_string(),
            config_directory,
        }))
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &ShutdownConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Configuration rendered as JSON for `validate-config` and debug logging
    pub fn debug_config(&self) -> serde_json::Value {
        serde_json::json!({
            "environment": self.environment,
            "config_directory": self.config_directory.display().to_string(),
            "config": self.config,
        })
    }

    /// Detect the current environment from environment variables
    pub fn detect_environment() -> String {
        env::var("CLUSTER_SHUTDOWN_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "production".to_string())
            .to_lowercase()
    }

    fn config_file(dir: &Path, environment: Option<&str>) -> PathBuf {
        match environment {
            Some(env) => dir.join(format!("{CONFIG_FILE_STEM}.{env}.yaml")),
            None => dir.join(format!("{CONFIG_FILE_STEM}.yaml")),
        }
    }
}
