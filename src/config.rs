use std::{
    fs,
    io::ErrorKind as IoErrorKind,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{helper, MerlionError, Result, StoreKind, APP_DIR_NAME};

const CONFIG_FILE: &str = "config.json";

/// One configured backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultDescriptor {
    pub provider: StoreKind,
    #[serde(default)]
    pub name: String,
    /// Vault directory for `file`; ignored by the other providers.
    #[serde(default)]
    pub path: String,
}

impl VaultDescriptor {
    pub fn new(provider: StoreKind, name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            path: path.into(),
        }
    }
}

/// User settings stored as `<config dir>/merlion/config.json`.
///
/// Besides the vault list these are display preferences for the UI; the
/// library only carries them through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserConfig {
    pub theme: String,
    pub info_hidden: bool,
    pub info_bottom: bool,
    pub compact_view: bool,
    pub default_to_cloud: bool,
    pub vaults: Vec<VaultDescriptor>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            theme: "neotokyo".to_string(),
            info_hidden: false,
            info_bottom: true,
            compact_view: false,
            default_to_cloud: false,
            vaults: Vec::new(),
        }
    }
}

impl UserConfig {
    /// Default location of the config file.
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir().ok_or_else(|| MerlionError::ConfigError {
            message: "could not determine the user config directory".to_string(),
        })?;
        Ok(base.join(APP_DIR_NAME).join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Reads the config at `path`, writing the defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == IoErrorKind::NotFound => {
                info!("No config at {}, writing defaults", path.display());
                let config = Self::default();
                config.save_to(path)?;
                return Ok(config);
            }
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&text).map_err(|e| MerlionError::ConfigError {
            message: format!("failed to parse {}: {}", path.display(), e),
        })?;
        debug!(
            "Loaded config from {} with {} vaults",
            path.display(),
            config.vaults.len()
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            helper::ensure_dir(parent, 0o700)?;
        }
        let data = serde_json::to_vec_pretty(self)?;
        helper::atomic_write(path, &data, 0o600)
    }

    /// Adds a vault, renaming an existing entry with the same provider and path.
    pub fn add_vault(&mut self, vault: VaultDescriptor) {
        match self
            .vaults
            .iter_mut()
            .find(|v| v.provider == vault.provider && v.path == vault.path)
        {
            Some(existing) => existing.name = vault.name,
            None => self.vaults.push(vault),
        }
    }

    /// Drops every vault of `provider`, returning how many were removed.
    pub fn remove_vaults(&mut self, provider: StoreKind) -> usize {
        let before = self.vaults.len();
        self.vaults.retain(|v| v.provider != provider);
        before - self.vaults.len()
    }
}
