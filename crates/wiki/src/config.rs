use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use wiki_core::SystemConfig;

/// Settings read from `wiki.toml`.
///
/// ```toml
/// data_directory = "/srv/wiki"
/// log_level = "info"
///
/// [system]
/// idle_timeout_ms = 300000
/// recent_limit = 10
/// propagate_tags_on_update = true
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_directory: Option<PathBuf>,
    pub log_level: Option<String>,
    pub system: SystemConfig,
}

impl Config {
    /// Precedence: defaults < file < `DATA_DIRECTORY` / command line.
    pub fn load(config_file: Option<&Path>, data_directory: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(dir) = data_directory {
            config.data_directory = Some(dir);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn data_directory(&self) -> Result<&Path> {
        match &self.data_directory {
            Some(dir) => Ok(dir),
            None => bail!("No data directory: set DATA_DIRECTORY, pass --data-directory or add data_directory to the config file"),
        }
    }
}
