//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the backend base URL, which storage backend holds the session, and the
//! last identifier used to log in.
//!
//! Configuration is stored at `~/.config/scanward/config.json`. The
//! `SCANWARD_API_URL` and `SCANWARD_STORAGE` environment variables override
//! the file.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::client::DEFAULT_API_BASE_URL;
use crate::auth::StorageKind;

/// Application name used for config/data directory paths
const APP_NAME: &str = "scanward";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_API_URL: &str = "SCANWARD_API_URL";
const ENV_STORAGE: &str = "SCANWARD_STORAGE";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub storage: StorageKind,
    pub last_identifier: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Load the config file, falling back to defaults, then apply
    /// environment overrides.
    pub fn load_with_env() -> Self {
        let mut config = match Self::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Self::default()
            }
        };
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url);
        }
        if let Some(raw) = var(ENV_STORAGE) {
            match StorageKind::parse(&raw) {
                Some(kind) => self.storage = kind,
                None => warn!(value = %raw, "Ignoring unknown {}", ENV_STORAGE),
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn data_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME))
    }
}
