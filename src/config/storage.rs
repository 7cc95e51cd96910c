//! Config file storage
//!
//! Reads and writes `config.json` under the platform config directory.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use super::types::ClientConfig;

/// Environment variable overriding `llm.api_key`
pub const API_KEY_ENV: &str = "TERMPILOT_API_KEY";

/// Environment variable overriding `backend.default_port`
pub const BACKEND_PORT_ENV: &str = "TERMPILOT_BACKEND_PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Get the termpilot config directory
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("termpilot"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Get the default config file path
pub fn config_file() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.json"))
}

/// Load a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ClientConfig, ConfigError> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = serde_json::from_str(&content)?;
        info!("Loaded config from {:?}", path);
        config
    } else {
        debug!("No config at {:?}, using defaults", path);
        ClientConfig::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.validate().map_err(ConfigError::Invalid)?;

    Ok(config)
}

/// Write a config file, creating parent directories as needed.
pub fn save_config(path: &Path, config: &ClientConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

fn apply_env_overrides(config: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup(API_KEY_ENV).filter(|k| !k.is_empty()) {
        config.llm.api_key = Some(key);
    }
    if let Some(port) = lookup(BACKEND_PORT_ENV).and_then(|p| p.parse::<u16>().ok()) {
        config.backend.default_port = port;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let config = load_config(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.agent.max_attempts, 15);
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = ClientConfig::default();
        config.backend.host = "10.0.0.5".to_string();
        config.agent.safe_mode = false;
        save_config(&path, &config).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded.backend.host, "10.0.0.5");
        assert!(!loaded.agent.safe_mode);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"agent": {"max_memory_messages": 0}}"#).unwrap();

        assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ClientConfig::default();
        apply_env_overrides(&mut config, |key| match key {
            API_KEY_ENV => Some("sk-test".to_string()),
            BACKEND_PORT_ENV => Some("4555".to_string()),
            _ => None,
        });

        assert_eq!(config.llm.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.backend.default_port, 4555);
    }
}
