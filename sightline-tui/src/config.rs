//! Configuration loading for the sightline terminal.
//!
//! All fields are required unless explicitly marked optional. No defaults.

use serde::Deserialize;
use sightline_core::{AnimationTimings, EngineSettings, ResolutionSettings};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the config file when `--config` is absent.
pub const CONFIG_ENV: &str = "SIGHTLINE_CONFIG";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TuiConfig {
    pub api_base_url: String,
    pub auth: AuthConfig,
    pub request_timeout_ms: u64,
    pub tick_interval_ms: u64,
    pub persistence_path: PathBuf,
    pub log_path: PathBuf,
    pub default_scope: String,
    pub theme: ThemeConfig,
    pub animation: AnimationConfig,
    pub resolution: ResolutionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    pub api_key: Option<String>,
    pub jwt: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemeConfig {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnimationConfig {
    pub fade_ms: u64,
    pub pulse_ms: u64,
    pub hold_ms: u64,
    pub stagger_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolutionConfig {
    pub confirm_threshold: usize,
    pub identifier_ratio: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or SIGHTLINE_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl TuiConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: TuiConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(invalid("api_base_url", "must not be empty"));
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(invalid("api_base_url", "must be an http(s) URL"));
        }
        if self.auth.api_key.is_none() && self.auth.jwt.is_none() {
            return Err(invalid("auth", "api_key or jwt must be provided"));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms", "must be > 0"));
        }
        if self.tick_interval_ms == 0 {
            return Err(invalid("tick_interval_ms", "must be > 0"));
        }
        if self.persistence_path.as_os_str().is_empty() {
            return Err(invalid("persistence_path", "must not be empty"));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(invalid("log_path", "must not be empty"));
        }
        if self.default_scope.trim().is_empty() {
            return Err(invalid("default_scope", "must not be empty"));
        }
        if self.theme.name.to_ascii_lowercase() != "nightgrid" {
            return Err(invalid("theme.name", "only 'nightgrid' is supported"));
        }
        if self.animation.fade_ms == 0 {
            return Err(invalid("animation.fade_ms", "must be > 0"));
        }
        if self.animation.pulse_ms == 0 {
            return Err(invalid("animation.pulse_ms", "must be > 0"));
        }
        if self.resolution.confirm_threshold == 0 {
            return Err(invalid("resolution.confirm_threshold", "must be > 0"));
        }
        let ratio = self.resolution.identifier_ratio;
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(invalid("resolution.identifier_ratio", "must be in (0, 1]"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Engine settings derived from the animation and resolution sections.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            resolution: ResolutionSettings {
                confirm_threshold: self.resolution.confirm_threshold,
                identifier_ratio: self.resolution.identifier_ratio,
            },
            animation: AnimationTimings {
                fade: Duration::from_millis(self.animation.fade_ms),
                pulse: Duration::from_millis(self.animation.pulse_ms),
                hold: Duration::from_millis(self.animation.hold_ms),
                stagger: Duration::from_millis(self.animation.stagger_ms),
            },
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.to_string(),
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
