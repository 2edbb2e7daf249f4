//! CLI configuration handling.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_BASE_URL: &str = "http://localhost:5015";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Backend base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Logging level.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Path to the token file.
    #[serde(default)]
    pub token_path: Option<PathBuf>,

    /// Path to the configuration file that was loaded.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            log_level: default_log_level(),
            token_path: None,
            config_path: PathBuf::new(),
        }
    }
}

impl CliConfig {
    /// Where session tokens are stored.
    pub fn token_path(&self) -> PathBuf {
        self.token_path.clone().unwrap_or_else(|| {
            project_dirs()
                .map(|d| d.data_dir().join("tokens.json"))
                .unwrap_or_else(|| PathBuf::from(".filtervault-tokens.json"))
        })
    }
}

/// Load configuration from the default location or create defaults.
pub fn load_config() -> Result<CliConfig> {
    let dirs = project_dirs();
    let config_path = dirs
        .as_ref()
        .map(|d| d.config_dir().join("filtervault.toml"))
        .unwrap_or_else(|| PathBuf::from("filtervault.toml"));

    load_config_from(config_path)
}

fn load_config_from(config_path: PathBuf) -> Result<CliConfig> {
    let mut config = if config_path.exists() {
        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {:?}", config_path))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", config_path))?
    } else {
        CliConfig::default()
    };

    config.config_path = config_path;
    Ok(config)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "filtervault", "filtervault")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_parse_partial_config() {
        let config: CliConfig = toml::from_str("base_url = \"https://api.example.com\"").unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filtervault.toml");
        std::fs::write(
            &path,
            "base_url = \"https://api.example.com\"\nlog_level = \"debug\"\n",
        )
        .unwrap();

        let config = load_config_from(path.clone()).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.config_path, path);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(dir.path().join("filtervault.toml")).unwrap();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.log_level, "info");
    }
}
