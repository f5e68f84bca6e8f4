//! Application settings.
//!
//! Settings are persisted as JSON under the user configuration directory,
//! e.g. `~/.config/cartbench/settings.json` on Linux.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::tools::{ConsoleEncoding, ToolId};

/// Subdirectory name under the user config directory.
const CONFIG_DIR: &str = "cartbench";

/// User-tunable settings for the orchestration core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Encoding used to decode subprocess console output.
    #[serde(default)]
    pub console_encoding: ConsoleEncoding,
    /// Explicit tool binary locations. Tools not listed here are resolved
    /// from PATH.
    #[serde(default)]
    pub tool_paths: HashMap<ToolId, PathBuf>,
}

/// Returns the path of the settings file.
pub fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CONFIG_DIR)
        .join("settings.json")
}

/// Loads settings from disk, falling back to defaults when the file is
/// missing or unreadable as JSON. A corrupt settings file must never keep
/// the application from starting.
pub fn load_settings() -> Result<Settings> {
    load_settings_from(&settings_path())
}

/// Saves settings to disk, creating parent directories as needed.
pub fn save_settings(settings: &Settings) -> Result<()> {
    save_settings_to(settings, &settings_path())
}

fn load_settings_from(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = %path.display(), "no settings file, using defaults");
        return Ok(Settings::default());
    }

    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read settings: {}", path.display()))?;

    match serde_json::from_str(&data) {
        Ok(settings) => Ok(settings),
        Err(e) => {
            warn!(error = %e, "settings file is corrupt, using defaults");
            Ok(Settings::default())
        }
    }
}

fn save_settings_to(settings: &Settings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(settings).context("Failed to serialize settings")?;
    fs::write(path, json).with_context(|| format!("Failed to write settings: {}", path.display()))
}
