//! Configuration management for the cpu client

mod client;
pub mod serde_utils;

pub use client::ClientConfig;

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cpu")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("client.toml")
}

/// Default private key for cpu users
pub fn default_key_file() -> PathBuf {
    home_dir().join(".ssh").join("cpu_rsa")
}

/// Default OpenSSH client config
pub fn default_ssh_config_path() -> PathBuf {
    home_dir().join(".ssh").join("config")
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_default()
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/.ssh/id")), home.join(".ssh/id"));
            assert_eq!(expand_tilde(Path::new("~")), home);
        }
        assert_eq!(expand_tilde(Path::new("/abs/~")), PathBuf::from("/abs/~"));
        assert_eq!(expand_tilde(Path::new("~user/x")), PathBuf::from("~user/x"));
    }

    #[test]
    fn test_default_paths() {
        assert!(default_config_path().ends_with("cpu/client.toml"));
        assert!(default_key_file().ends_with(".ssh/cpu_rsa"));
    }

    #[test]
    fn test_load_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<ClientConfig, _> = load_config(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_config_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "mount_root = [").unwrap();
        let result: Result<ClientConfig, _> = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
