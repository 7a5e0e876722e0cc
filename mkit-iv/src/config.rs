//! Configuration resolution for mkit-iv
//!
//! ENV → TOML → default priority. Environment variables let deployments
//! override individual endpoints without touching the config file.

use std::path::PathBuf;
use tracing::info;

use mkit_common::config::{self, EndpointConfig, TomlConfig};
use mkit_common::Result;

/// Resolve the effective service configuration
pub fn resolve_config() -> Result<TomlConfig> {
    let path = config::config_file_path();
    let mut config = TomlConfig::load(&path)?;

    if let Ok(db) = std::env::var("MKIT_IV_DATABASE") {
        config.database_path = PathBuf::from(db);
        info!("Database path overridden from environment");
    }
    if let Ok(port) = std::env::var("MKIT_IV_PORT") {
        config.listen_port = port.parse().map_err(|_| {
            mkit_common::Error::Config(format!("MKIT_IV_PORT is not a port number: {}", port))
        })?;
        info!("Listen port overridden from environment");
    }
    if let Ok(url) = std::env::var("MKIT_OTOMAX_URL") {
        let timeout_ms = config.otomax.timeout_ms;
        config.otomax = EndpointConfig { base_url: url, timeout_ms };
        info!("Otomax endpoint overridden from environment");
    }
    if let Ok(url) = std::env::var("MKIT_OTOPLUS_URL") {
        let timeout_ms = config.otoplus.as_ref().map(|e| e.timeout_ms).unwrap_or(5000);
        config.otoplus = Some(EndpointConfig { base_url: url, timeout_ms });
        info!("Otoplus endpoint overridden from environment");
    }
    if let Ok(url) = std::env::var("MKIT_PHOTOS_URL") {
        let timeout_ms = config.photos.as_ref().map(|e| e.timeout_ms).unwrap_or(5000);
        config.photos = Some(EndpointConfig { base_url: url, timeout_ms });
        info!("Photo service endpoint overridden from environment");
    }

    Ok(config)
}
