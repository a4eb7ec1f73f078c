//! Configuration for program synthesis and controller sessions.
//!
//! Loaded with `figment` from a TOML file, then overridden by `TORO_`-prefixed environment
//! variables (`TORO_CONTROLLER_TASK=T_ROB2`). Every field has a default, so an empty or
//! missing file yields a usable configuration.
//!
//! ```toml
//! [application]
//! name = "cell-7"
//! log_level = "debug"
//!
//! [controller]
//! task = "T_ROB1"
//! module = "MainModule"
//!
//! [catalog]
//! speeds = [5.0, 50.0, 500.0]
//! zones = [0.0, 10.0, 50.0]
//!
//! [streaming]
//! window = 8
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::controller::session::DEFAULT_TASK;
use crate::controller::transport::UserInfo;
use crate::error::ToroError;
use crate::motion::catalog::{MotionCatalog, STANDARD_SPEED_LEVELS, STANDARD_ZONE_LEVELS};
use crate::program::compiler::TargetCompiler;
use crate::tracking::window::WindowConfig;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/toro.toml";

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file or environment could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] figment::Error),

    /// The configuration was read but is inconsistent.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToroConfig {
    /// Application-wide settings.
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Controller connection and program locations.
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Speed and zone catalogs.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Target streaming ring.
    #[serde(default)]
    pub streaming: StreamingConfig,
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Name used in log output.
    #[serde(default = "default_app_name")]
    pub name: String,
    /// One of trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            log_level: default_log_level(),
        }
    }
}

/// Controller connection and program locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Task the session operates on.
    #[serde(default = "default_task")]
    pub task: String,
    /// Module generated programs are written to.
    #[serde(default = "default_module")]
    pub module: String,
    /// Program descriptor file name.
    #[serde(default = "default_program_file")]
    pub program_file: String,
    /// Logon user name.
    #[serde(default = "default_user")]
    pub user: String,
    /// Logon password.
    #[serde(default = "default_password")]
    pub password: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            task: default_task(),
            module: default_module(),
            program_file: default_program_file(),
            user: default_user(),
            password: default_password(),
        }
    }
}

/// Speed and zone catalog levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Speed levels in mm/s, strictly ascending.
    #[serde(default = "default_speeds")]
    pub speeds: Vec<f64>,
    /// Zone radii in mm, strictly ascending.
    #[serde(default = "default_zones")]
    pub zones: Vec<f64>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            speeds: default_speeds(),
            zones: default_zones(),
        }
    }
}

/// Streaming ring parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Ring size.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Motion-pointer lead before a slot is refilled.
    #[serde(default = "default_feed_margin")]
    pub feed_margin: usize,
    /// Program-pointer lead before a slot is retired.
    #[serde(default = "default_retire_margin")]
    pub retire_margin: usize,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            feed_margin: default_feed_margin(),
            retire_margin: default_retire_margin(),
        }
    }
}

fn default_app_name() -> String {
    "rust_toro".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_task() -> String {
    DEFAULT_TASK.to_string()
}

fn default_module() -> String {
    "MainModule".to_string()
}

fn default_program_file() -> String {
    "MainProgram.pgf".to_string()
}

fn default_user() -> String {
    "Default User".to_string()
}

fn default_password() -> String {
    "robotics".to_string()
}

fn default_speeds() -> Vec<f64> {
    STANDARD_SPEED_LEVELS.to_vec()
}

fn default_zones() -> Vec<f64> {
    STANDARD_ZONE_LEVELS.to_vec()
}

fn default_window() -> usize {
    8
}

fn default_feed_margin() -> usize {
    2
}

fn default_retire_margin() -> usize {
    1
}

impl ToroConfig {
    /// Loads [`DEFAULT_CONFIG_PATH`] plus environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Loads `path` plus `TORO_` environment overrides, then validates.
    ///
    /// A missing file is not an error; defaults fill every field.
    ///
    /// # Errors
    /// `LoadError` when the TOML is malformed or a value has the wrong type,
    /// `ValidationError` when [`validate`](Self::validate) rejects the result.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: Self = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("TORO_").split("_"))
            .extract()
            .map_err(ConfigError::LoadError)?;

        config.validate()?;
        Ok(config)
    }

    /// Checks:
    /// - log level is one of trace, debug, info, warn, error
    /// - task and module names are not empty
    /// - both catalogs are non-empty, finite and strictly ascending
    /// - streaming margins fit the window
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.controller.task.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "controller.task cannot be empty".to_string(),
            ));
        }
        if self.controller.module.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "controller.module cannot be empty".to_string(),
            ));
        }

        self.speed_catalog()?;
        self.zone_catalog()?;

        self.window_config()
            .validate()
            .map_err(|e| validation_error("streaming", e))?;

        Ok(())
    }

    /// Speed catalog built from `catalog.speeds`.
    pub fn speed_catalog(&self) -> Result<MotionCatalog, ConfigError> {
        MotionCatalog::from_levels("v", &self.catalog.speeds)
            .map_err(|e| validation_error("catalog.speeds", e))
    }

    /// Zone catalog built from `catalog.zones`.
    pub fn zone_catalog(&self) -> Result<MotionCatalog, ConfigError> {
        MotionCatalog::from_levels("z", &self.catalog.zones)
            .map_err(|e| validation_error("catalog.zones", e))
    }

    /// Target compiler using the configured catalogs.
    pub fn compiler(&self) -> Result<TargetCompiler, ConfigError> {
        Ok(TargetCompiler::new(self.speed_catalog()?, self.zone_catalog()?))
    }

    /// Logon credentials.
    pub fn user(&self) -> UserInfo {
        UserInfo::new(&self.controller.user, &self.controller.password)
    }

    /// Streaming ring parameters.
    pub fn window_config(&self) -> WindowConfig {
        WindowConfig {
            window: self.streaming.window,
            feed_margin: self.streaming.feed_margin,
            retire_margin: self.streaming.retire_margin,
        }
    }
}

fn validation_error(section: &str, err: ToroError) -> ConfigError {
    let detail = match err {
        ToroError::InvalidCatalog(msg) | ToroError::Configuration(msg) => msg,
        other => other.to_string(),
    };
    ConfigError::ValidationError(format!("{section}: {detail}"))
}
