//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_codec::{CodecConfig, Language, Selection};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Messages and signals to keep; all of them when absent
    #[serde(default)]
    pub selection: Selection,
    #[serde(default)]
    pub codec: CodecConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    /// Prefix of the generated files and identifiers
    pub library_name: Option<String>,
    /// Language of the generated library ("c" or "cpp")
    #[serde(default)]
    pub language: Language,
    /// Directory the generated files are written to
    pub out_dir: Option<PathBuf>,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    log::debug!(
        "Config: max_dlc={}, overflow={:?}",
        config.codec.max_dlc,
        config.codec.overflow
    );
    Ok(config)
}
