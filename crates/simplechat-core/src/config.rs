use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::DEFAULT_API_BASE;
use crate::error::{ApiError, Result};

pub const ENV_API_BASE: &str = "SIMPLE_CHAT_API_BASE";
pub const ENV_VECTOR_STORE_ID: &str = "SIMPLE_CHAT_VECTOR_STORE_ID";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub vector_store_id: Option<String>,
    /// Last user that logged in, prefilled on the login screen
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub skip_login: bool,
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            vector_store_id: None,
            username: None,
            skip_login: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from the user config dir, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    pub fn save_username(username: &str) -> Result<()> {
        let path = Self::config_path()?;
        let mut config = Self::load_from(&path).unwrap_or_default();
        config.username = Some(username.to_string());
        config.save_to(&path)
    }

    /// Apply overrides from a variable lookup (normally the process env).
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(base) = lookup(ENV_API_BASE).filter(|v| !v.trim().is_empty()) {
            self.api_base = base;
        }
        if let Some(id) = lookup(ENV_VECTOR_STORE_ID).filter(|v| !v.trim().is_empty()) {
            self.vector_store_id = Some(id);
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| ApiError::Config("Could not determine config directory".to_string()))?;

        Ok(config_dir.join("simple-chat").join("config.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::new();
        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.vector_store_id, None);
        assert!(!config.skip_login);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config, Config::new());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let config = Config {
            api_base: "https://chat.example.com".to_string(),
            vector_store_id: Some("vs_123".to_string()),
            username: Some("ada".to_string()),
            skip_login: true,
        };
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"vector_store_id":"vs_9"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.api_base, "http://localhost:8000");
        assert_eq!(config.vector_store_id.as_deref(), Some("vs_9"));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::new();
        config.apply_env(|key| match key {
            ENV_API_BASE => Some("http://10.0.0.2:9000".to_string()),
            ENV_VECTOR_STORE_ID => Some(String::new()),
            _ => None,
        });
        assert_eq!(config.api_base, "http://10.0.0.2:9000");
        assert_eq!(config.vector_store_id, None);
    }
}
