//! Configuration management

use std::path::{Path, PathBuf};

use ancon_api::ServiceConfig;
use anyhow::{Context, Result};

/// Get default config path
pub fn default_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".ancon").join("config.toml"))
}

/// Resolve the config: the explicit file, else the default file if present,
/// else defaults. `ANCON_*` variables apply on top.
pub fn load(path: Option<&str>) -> Result<ServiceConfig> {
    let config = match path {
        Some(path) => ServiceConfig::load(path)?,
        None => match default_path() {
            Ok(default) if default.exists() => ServiceConfig::load(&default)?,
            _ => ServiceConfig::default(),
        },
    };
    Ok(config.with_env_overrides()?)
}

/// Write a default config unless one exists. Returns the path.
pub fn init(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        let config = ServiceConfig {
            db_path: path.parent().map(|dir| dir.join("db")),
            ..ServiceConfig::default()
        };
        config.save(path)?;
    }
    Ok(path.to_path_buf())
}
