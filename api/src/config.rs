//! Service configuration

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// When new versions are created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionPolicy {
    /// Only `save_version` creates a version.
    #[default]
    Explicit,
    /// Every successful write saves a version under the same lock.
    AutoSave,
}

impl FromStr for VersionPolicy {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "explicit" => Ok(Self::Explicit),
            "auto_save" | "autosave" | "auto" => Ok(Self::AutoSave),
            other => Err(ServiceError::Config(format!("unknown version policy: {}", other))),
        }
    }
}

impl fmt::Display for VersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::AutoSave => write!(f, "auto_save"),
        }
    }
}

/// Proof service configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// RocksDB directory; `None` keeps the tree in memory only
    pub db_path: Option<PathBuf>,

    /// Version to resume from on startup (0 = latest)
    pub load_version: i64,

    pub version_policy: VersionPolicy,
}

impl ServiceConfig {
    pub const ENV_DB_PATH: &'static str = "ANCON_DB_PATH";
    pub const ENV_LOAD_VERSION: &'static str = "ANCON_LOAD_VERSION";
    pub const ENV_VERSION_POLICY: &'static str = "ANCON_VERSION_POLICY";

    /// Load config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ServiceError::Config(format!("{}: {}", path.display(), e)))?;
        toml::from_str(&content).map_err(|e| ServiceError::Config(e.to_string()))
    }

    /// Save config to a TOML file, creating the parent directory
    pub fn save(&self, path: impl AsRef<Path>) -> ServiceResult<()> {
        let path = path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|e| ServiceError::Config(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ServiceError::Config(format!("{}: {}", parent.display(), e)))?;
        }
        std::fs::write(path, content)
            .map_err(|e| ServiceError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Defaults overridden by the `ANCON_*` environment variables
    pub fn from_env() -> ServiceResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply the `ANCON_*` environment variables on top of this config
    pub fn with_env_overrides(mut self) -> ServiceResult<Self> {
        if let Ok(path) = std::env::var(Self::ENV_DB_PATH) {
            self.db_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        if let Ok(version) = std::env::var(Self::ENV_LOAD_VERSION) {
            self.load_version = version.parse().map_err(|_| {
                ServiceError::Config(format!(
                    "{} must be an integer, got {:?}",
                    Self::ENV_LOAD_VERSION,
                    version
                ))
            })?;
        }
        if let Ok(policy) = std::env::var(Self::ENV_VERSION_POLICY) {
            self.version_policy = policy.parse()?;
        }
        Ok(self)
    }
}
