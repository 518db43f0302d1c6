use std::fs;
use std::path::{Path, PathBuf};

use color_eyre::eyre::{WrapErr, eyre};
use tracing::debug;

use crate::config::AppConfig;

const CONFIG_DIR: &str = "asyncmd";
const CONFIG_FILE: &str = "config.toml";

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(CONFIG_DIR).join(CONFIG_FILE))
}

/// Load the config from `path`, or from the default location when `None`.
///
/// A missing default file yields the defaults; a missing explicit file is an error.
pub fn load(path: Option<&Path>) -> color_eyre::Result<AppConfig> {
    let path = match path {
        Some(path) if !path.exists() => {
            return Err(eyre!("Config file not found: {}", path.display()));
        }
        Some(path) => path.to_path_buf(),
        None => match config_path() {
            Some(path) if path.exists() => path,
            Some(path) => {
                debug!(?path, "Config file not found, using defaults");
                return Ok(AppConfig::default());
            }
            None => {
                debug!("No config directory found, using defaults");
                return Ok(AppConfig::default());
            }
        },
    };

    let content = fs::read_to_string(&path)
        .wrap_err_with(|| format!("Failed to read {}", path.display()))?;
    let config: AppConfig =
        toml::from_str(&content).wrap_err_with(|| format!("Invalid config {}", path.display()))?;
    debug!(?path, "Loaded config");
    Ok(config)
}
