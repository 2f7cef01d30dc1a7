use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::backup::{BackupStrategy, DEFAULT_KEEP, DEFAULT_PREFIX};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolodexConfig {
    pub database: PathBuf,
    pub backup: BackupConfig,
}

impl Default for RolodexConfig {
    fn default() -> Self {
        Self {
            database: default_database_path_in(Path::new("")),
            backup: BackupConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    /// Take a backup when the application shuts down
    pub on_close: bool,
    pub keep_count: usize,
    pub strategy: BackupStrategy,
    pub prefix: String,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("data"),
            on_close: true,
            keep_count: DEFAULT_KEEP,
            strategy: BackupStrategy::default(),
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("rolodex.toml")
}

pub fn default_database_path_in(base: &Path) -> PathBuf {
    base.join("data").join("crm.db")
}

/// Load the config file, falling back to defaults when it does not exist
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RolodexConfig> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(RolodexConfig::default());
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: RolodexConfig = toml::from_str(&contents)?;
    Ok(config)
}

pub fn write_config(path: &Path, config: &RolodexConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("rolodex.toml already exists at {} (pass --force to replace it)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Create the directory that will hold the CRM database file
pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    match db_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            std::fs::create_dir_all(dir)
                .map_err(|e| anyhow::anyhow!("cannot create database directory {}: {}", dir.display(), e))?;
        }
        _ => {}
    }
    Ok(())
}
