//! Locates the inkcrystal configuration file.
//!
//! `INKCRYSTAL_CONFIG_DIR` overrides the platform config directory reported by
//! `directories-next`; an explicit `--config` path wins over both.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use directories_next::ProjectDirs;
use inkconfig::InkConfig;

pub const ENV_CONFIG_DIR: &str = "INKCRYSTAL_CONFIG_DIR";
pub const CONFIG_FILE_NAME: &str = "config.toml";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "inkcrystal";
const APPLICATION: &str = "inkcrystal";

/// Directory the default config file lives in.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(value) = env::var_os(ENV_CONFIG_DIR) {
        if !value.is_empty() {
            return Ok(PathBuf::from(value));
        }
    }
    let dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
        .ok_or_else(|| anyhow!("failed to determine user directories"))?;
    Ok(dirs.config_dir().to_path_buf())
}

/// A parsed config plus the directory relative sources resolve against.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: InkConfig,
    pub base_dir: Option<PathBuf>,
}

/// Loads `explicit` when given (it must exist), otherwise the default config
/// file when present, otherwise built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    let path = match explicit {
        Some(path) => {
            if !path.is_file() {
                bail!("config file {} does not exist", path.display());
            }
            Some(path.to_path_buf())
        }
        None => {
            let candidate = config_dir()?.join(CONFIG_FILE_NAME);
            candidate.is_file().then_some(candidate)
        }
    };

    let Some(path) = path else {
        tracing::debug!("no config file found; using defaults");
        return Ok(LoadedConfig {
            config: InkConfig::default(),
            base_dir: None,
        });
    };

    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config = InkConfig::from_toml_str(&raw)
        .with_context(|| format!("failed to load config {}", path.display()))?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(LoadedConfig {
        config,
        base_dir: path.parent().map(Path::to_path_buf),
    })
}
