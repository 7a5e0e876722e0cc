//! Configuration loading for mkit services
//!
//! Settings resolve with ENV → TOML file → compiled default priority.
//! Each service applies its own `MKIT_*` environment overrides on top of
//! the shared TOML shape defined here.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// TOML configuration file shape
///
/// All fields are optional in the file; missing values fall back to the
/// compiled defaults below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    /// Path to the staging database file
    pub database_path: PathBuf,

    /// HTTP listen port for the intake service
    pub listen_port: u16,

    /// Upstream serial verification service (Otoplus). Optional; when
    /// absent the verification step of the validator is skipped.
    pub otoplus: Option<EndpointConfig>,

    /// External core system (Otomax) insert endpoint
    pub otomax: EndpointConfig,

    /// Photo search service. Optional, read-only.
    pub photos: Option<EndpointConfig>,

    /// Business validation rules
    pub rules: RulesConfig,
}

/// Base URL plus request timeout for an external HTTP collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Validation rule parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Required serial number length (fixed-length alphanumeric)
    pub serial_length: usize,

    /// Allowed denominations. Empty means any positive amount.
    pub allowed_denominations: Vec<i64>,

    /// Days a terminal record is retained before purge is permitted
    pub purge_retention_days: i64,
}

fn default_timeout_ms() -> u64 {
    5000
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            serial_length: 16,
            allowed_denominations: Vec::new(),
            purge_retention_days: 7,
        }
    }
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("mkit-iv.db"),
            listen_port: 5831,
            otoplus: None,
            otomax: EndpointConfig {
                base_url: "http://127.0.0.1:9090".to_string(),
                timeout_ms: default_timeout_ms(),
            },
            photos: None,
            rules: RulesConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
    }
}

/// Write configuration back to a TOML file (best-effort, atomic rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize config failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Resolve the config file path with ENV → default priority
///
/// `MKIT_IV_CONFIG` overrides the compiled default of `mkit-iv.toml` in the
/// current working directory.
pub fn config_file_path() -> PathBuf {
    if let Ok(path) = std::env::var("MKIT_IV_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("mkit-iv.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = TomlConfig::load(Path::new("/nonexistent/mkit-iv.toml")).unwrap();
        assert_eq!(config.listen_port, 5831);
        assert_eq!(config.rules.serial_length, 16);
        assert!(config.otoplus.is_none());
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mkit-iv.toml");

        let mut config = TomlConfig::default();
        config.listen_port = 6000;
        config.rules.allowed_denominations = vec![5000, 10000];
        write_toml_config(&config, &path).unwrap();

        let loaded = TomlConfig::load(&path).unwrap();
        assert_eq!(loaded.listen_port, 6000);
        assert_eq!(loaded.rules.allowed_denominations, vec![5000, 10000]);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mkit-iv.toml");
        std::fs::write(&path, "listen_port = 7000\n").unwrap();

        let loaded = TomlConfig::load(&path).unwrap();
        assert_eq!(loaded.listen_port, 7000);
        assert_eq!(loaded.rules.purge_retention_days, 7);
    }
}
