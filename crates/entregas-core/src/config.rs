//! Application configuration management.
//!
//! Configuration is stored at `~/.config/entregas/config.json`. Any field can
//! be overridden from the environment:
//!
//! - `ENTREGAS_API_BASE_URL`
//! - `ENTREGAS_API_TIMEOUT_MS`
//! - `ENTREGAS_AUTH_SCHEME` (`token` or `bearer`)
//! - `ENTREGAS_CREDENTIAL_STORE` (`file` or `keyring`)
//!
//! Overrides only live for the current process; they are never written back.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::AuthScheme;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "entregas";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Production backend
const DEFAULT_BASE_URL: &str = "https://entregasplus.onrender.com";

/// The hosted backend cold-starts slowly, so the default is generous.
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

const DEFAULT_PROFILE: &str = "default";

pub const ENV_BASE_URL: &str = "ENTREGAS_API_BASE_URL";
pub const ENV_TIMEOUT_MS: &str = "ENTREGAS_API_TIMEOUT_MS";
pub const ENV_AUTH_SCHEME: &str = "ENTREGAS_AUTH_SCHEME";
pub const ENV_CREDENTIAL_STORE: &str = "ENTREGAS_CREDENTIAL_STORE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not find {0} directory")]
    NoDirectory(&'static str),

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Keyring,
}

impl FromStr for CredentialBackend {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "keyring" => Ok(Self::Keyring),
            "file" => Ok(Self::File),
            _ => Err(()),
        }
    }
}

impl fmt::Display for CredentialBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Keyring => "keyring",
            Self::File => "file",
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    pub timeout_ms: u64,
    pub auth_scheme: AuthScheme,
    /// Names the session; each profile has its own stored token.
    pub profile: String,
    pub credential_backend: CredentialBackend,
    pub last_email: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            auth_scheme: AuthScheme::default(),
            profile: DEFAULT_PROFILE.to_string(),
            credential_backend: CredentialBackend::default(),
            last_email: None,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Remember the last login email in the config file.
    ///
    /// Only that field changes on disk; environment overrides in effect for
    /// this process are not persisted.
    pub fn remember_email(email: &str) -> Result<(), ConfigError> {
        Self::remember_email_at(&Self::config_path()?, email)
    }

    fn remember_email_at(path: &Path, email: &str) -> Result<(), ConfigError> {
        let mut stored = Self::load_from(path)?;
        stored.last_email = Some(email.to_string());
        stored.save_to(path)
    }

    fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// The profile names a directory, so it must be a single plain path component
    pub fn validate(&self) -> Result<(), ConfigError> {
        let profile = self.profile.as_str();
        let plain = !profile.trim().is_empty()
            && profile != "."
            && profile != ".."
            && !profile.contains(['/', '\\'])
            && !profile.chars().any(char::is_control);
        if !plain {
            return Err(ConfigError::InvalidValue {
                key: "profile",
                value: self.profile.clone(),
            });
        }
        Ok(())
    }

    /// Apply overrides from `lookup`, which maps a variable name to its value
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL).filter(|v| !v.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = value
                .trim()
                .parse()
                .ok()
                .filter(|ms| *ms > 0)
                .ok_or(ConfigError::InvalidValue { key: ENV_TIMEOUT_MS, value })?;
        }
        if let Some(value) = lookup(ENV_AUTH_SCHEME) {
            self.auth_scheme = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: ENV_AUTH_SCHEME, value })?;
        }
        if let Some(value) = lookup(ENV_CREDENTIAL_STORE) {
            self.credential_backend = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue { key: ENV_CREDENTIAL_STORE, value })?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf, ConfigError> {
        self.validate()?;
        let cache_dir = dirs::cache_dir().ok_or(ConfigError::NoDirectory("cache"))?;
        Ok(cache_dir.join(APP_NAME).join(&self.profile))
    }
}
