use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "MediConn";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Lab-report uploads are abandoned after this many seconds.
pub const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 30;

/// Share tokens stay valid for one day.
pub const DEFAULT_SHARE_TTL_HOURS: i64 = 24;

/// Accepted ranges for the numeric settings.
pub const UPLOAD_TIMEOUT_SECS_RANGE: RangeInclusive<u64> = 1..=600;
pub const SHARE_TTL_HOURS_RANGE: RangeInclusive<i64> = 1..=24 * 365;

const DEFAULT_AUTH_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";
const DEFAULT_FIRESTORE_BASE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_LAB_API_URL: &str = "http://localhost:8000";
const DEFAULT_SHARE_BASE_URL: &str = "https://mediconn.netlify.app/";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "mediconn_lib=info,warn"
}

/// Get the application data directory.
/// Falls back to the working directory when no home directory exists
/// (service accounts, some CI containers).
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("MediConn")
}

/// Path of the local SQLite document store.
pub fn local_store_path() -> PathBuf {
    app_data_dir().join("records.db")
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Invalid config file {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

/// Runtime settings for the remote collaborators.
///
/// Loaded from an optional JSON file, then overridden field by field by
/// `MEDICONN_*` environment variables.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Web API key of the identity provider project.
    pub api_key: String,
    /// Document database project id.
    pub project_id: String,
    pub auth_base_url: String,
    pub firestore_base_url: String,
    /// Base URL of the lab-report analysis service.
    pub lab_api_url: String,
    pub upload_timeout_secs: u64,
    pub share_base_url: String,
    pub share_ttl_hours: i64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            project_id: String::new(),
            auth_base_url: DEFAULT_AUTH_BASE_URL.into(),
            firestore_base_url: DEFAULT_FIRESTORE_BASE_URL.into(),
            lab_api_url: DEFAULT_LAB_API_URL.into(),
            upload_timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
            share_base_url: DEFAULT_SHARE_BASE_URL.into(),
            share_ttl_hours: DEFAULT_SHARE_TTL_HOURS,
        }
    }
}

impl AppConfig {
    /// Load from a JSON file (if given) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.check_ranges("upload_timeout_secs", "share_ttl_hours")?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("MEDICONN_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = lookup("MEDICONN_PROJECT_ID") {
            self.project_id = v;
        }
        if let Some(v) = lookup("MEDICONN_AUTH_URL") {
            self.auth_base_url = v;
        }
        if let Some(v) = lookup("MEDICONN_FIRESTORE_URL") {
            self.firestore_base_url = v;
        }
        if let Some(v) = lookup("MEDICONN_LAB_API_URL") {
            self.lab_api_url = v;
        }
        if let Some(v) = lookup("MEDICONN_SHARE_URL") {
            self.share_base_url = v;
        }
        if let Some(v) = lookup("MEDICONN_UPLOAD_TIMEOUT_SECS") {
            self.upload_timeout_secs = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MEDICONN_UPLOAD_TIMEOUT_SECS",
                value: v.clone(),
            })?;
        }
        if let Some(v) = lookup("MEDICONN_SHARE_TTL_HOURS") {
            self.share_ttl_hours = v.parse().map_err(|_| ConfigError::InvalidValue {
                key: "MEDICONN_SHARE_TTL_HOURS",
                value: v.clone(),
            })?;
        }
        self.check_ranges("MEDICONN_UPLOAD_TIMEOUT_SECS", "MEDICONN_SHARE_TTL_HOURS")
    }

    /// Keys name the setting's source in the error.
    fn check_ranges(&self, timeout_key: &'static str, ttl_key: &'static str) -> Result<(), ConfigError> {
        if !UPLOAD_TIMEOUT_SECS_RANGE.contains(&self.upload_timeout_secs) {
            return Err(ConfigError::InvalidValue {
                key: timeout_key,
                value: self.upload_timeout_secs.to_string(),
            });
        }
        if !SHARE_TTL_HOURS_RANGE.contains(&self.share_ttl_hours) {
            return Err(ConfigError::InvalidValue {
                key: ttl_key,
                value: self.share_ttl_hours.to_string(),
            });
        }
        Ok(())
    }

    /// Settings needed to reach the identity provider and document database.
    pub fn require_remote(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("api_key"));
        }
        if self.project_id.trim().is_empty() {
            return Err(ConfigError::Missing("project_id"));
        }
        Ok(())
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }
}
