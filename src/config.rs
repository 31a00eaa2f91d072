//! Runtime configuration.
//!
//! Read from a TOML file (`--config`, or `config.toml` in the platform config
//! directory), then overridden by environment variables:
//!
//! | Variable              | Setting                |
//! |-----------------------|------------------------|
//! | `PULSE_DB`            | `data_file`            |
//! | `PULSE_NARRATIVE_URL` | `narrative.endpoint`   |
//! | `OPENAI_API_KEY`      | `narrative.api_key`    |
//! | `PULSE_MODEL`         | `narrative.model`      |

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::storage::default_db_path;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The JSON file holding every task.
    pub data_file: PathBuf,
    pub narrative: NarrativeConfig,
    pub server: ServerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: default_db_path(),
            narrative: NarrativeConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    /// Full URL of a narrative endpoint. Takes precedence over `api_key`.
    pub endpoint: Option<String>,
    /// Base URL of the completion API, without `/v1`.
    pub api_base: String,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on one narrative request.
    pub timeout_secs: u64,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_base: "https://api.openai.com".into(),
            api_key: None,
            model: "gpt-4o-mini".into(),
            max_tokens: 300,
            temperature: 0.7,
            timeout_secs: 15,
        }
    }
}

impl NarrativeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: "127.0.0.1:8787".into() }
    }
}

/// `config.toml` in the platform config directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("progress-pulse");
        p.push("config.toml");
        p
    })
}

impl Config {
    /// Parses a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        toml::from_str(&s).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Loads `explicit` if given (it must exist), else the default file if it
    /// exists, else defaults; then applies environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_config_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok());
        debug!(data_file = %config.data_file.display(), "configuration loaded");
        Ok(config)
    }

    /// Applies overrides looked up through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let var = |key: &str| var(key).filter(|v| !v.trim().is_empty());
        if let Some(db) = var("PULSE_DB") {
            self.data_file = PathBuf::from(db);
        }
        if let Some(url) = var("PULSE_NARRATIVE_URL") {
            self.narrative.endpoint = Some(url);
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.narrative.api_key = Some(key);
        }
        if let Some(model) = var("PULSE_MODEL") {
            self.narrative.model = model;
        }
    }

    /// Where the dashboard writes its log, next to the data file.
    pub fn log_dir(&self) -> PathBuf {
        self.data_file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
