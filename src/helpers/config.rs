use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::error::{Result, TimekeeperError};

pub const DEFAULT_MAX_RETRIES: u32 = 5;

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

/// Connection settings for the Timekeeper service.
#[derive(Deserialize, Clone)]
pub struct TimekeeperConfig {
    #[serde(alias = "ws_url")]
    pub service_url: String,
    pub api_key: String,
    pub shared_secret: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

// Keeps secrets out of logs.
impl std::fmt::Debug for TimekeeperConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimekeeperConfig")
            .field("service_url", &self.service_url)
            .field("api_key", &"***")
            .field("shared_secret", &"***")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

pub trait ConfigProvider {
    fn load(&self) -> Result<TimekeeperConfig>;
}

/// Reads settings from a local YAML file.
pub struct YamlFileProvider {
    path: PathBuf,
}

impl YamlFileProvider {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ConfigProvider for YamlFileProvider {
    fn load(&self) -> Result<TimekeeperConfig> {
        info!("Loading Timekeeper config from {}", self.path.display());

        let text = std::fs::read_to_string(&self.path).map_err(|source| {
            error!("Failed to read config {}: {}", self.path.display(), source);
            TimekeeperError::ConfigRead {
                path: self.path.clone(),
                source,
            }
        })?;

        let config: TimekeeperConfig =
            serde_yaml::from_str(&text).map_err(|source| TimekeeperError::ConfigParse {
                path: self.path.clone(),
                source,
            })?;

        info!("Loaded config for service {}", config.service_url);
        Ok(config)
    }
}

/// Reads `TIMEKEEPER_*` environment variables.
pub struct EnvProvider {
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl EnvProvider {
    pub fn new() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            lookup: Box::new(lookup),
        }
    }

    fn required(&self, name: &str) -> Result<String> {
        (self.lookup)(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| TimekeeperError::MissingSetting(name.to_string()))
    }
}

impl Default for EnvProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigProvider for EnvProvider {
    fn load(&self) -> Result<TimekeeperConfig> {
        info!("Loading Timekeeper config from environment");

        let max_retries = match (self.lookup)("TIMEKEEPER_MAX_RETRIES") {
            Some(raw) => raw.parse().map_err(|_| {
                TimekeeperError::MissingSetting(format!("TIMEKEEPER_MAX_RETRIES={}", raw))
            })?,
            None => DEFAULT_MAX_RETRIES,
        };

        Ok(TimekeeperConfig {
            service_url: self.required("TIMEKEEPER_SERVICE_URL")?,
            api_key: self.required("TIMEKEEPER_API_KEY")?,
            shared_secret: self.required("TIMEKEEPER_SHARED_SECRET")?,
            max_retries,
        })
    }
}
