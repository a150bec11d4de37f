use std::path::{Path, PathBuf};

use anyhow::Context;
use steel_services::EngineConfig;
use tracing::{debug, warn};

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("steelvoice")
        .join("config.toml")
}

/// Load the engine config, falling back to defaults when the file is
/// missing or unreadable
pub fn load_config(path: Option<&Path>) -> EngineConfig {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    let Ok(text) = std::fs::read_to_string(&path) else {
        debug!(path = %path.display(), "No config file, using defaults");
        return EngineConfig::default();
    };
    match toml::from_str(&text) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), "Ignoring unparseable config: {}", e);
            EngineConfig::default()
        }
    }
}

pub fn save_config(config: &EngineConfig, path: Option<&Path>) -> anyhow::Result<PathBuf> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let text = toml::to_string_pretty(config).context("serializing config")?;
    std::fs::write(&path, text).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}
