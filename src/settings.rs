use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::DB_FILENAME;
use crate::error::{AppError, Result};

const APP_DIR: &str = "hotel-recon";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Hotel name shown by `status`
    #[serde(default)]
    pub property_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: home().join("Documents").join(APP_DIR).to_string_lossy().into_owned(),
            property_name: String::new(),
        }
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// `~/.config/hotel-recon/settings.json`
pub fn settings_file() -> PathBuf {
    home().join(".config").join(APP_DIR).join("settings.json")
}

impl Settings {
    pub fn load() -> Self {
        Self::load_from(&settings_file())
    }

    /// Missing or malformed files yield the defaults.
    fn load_from(path: &Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Ignoring unreadable {}: {e}", path.display());
            Self::default()
        })
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&settings_file())
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|e| AppError::Settings(e.to_string()))?;
        std::fs::write(path, format!("{json}\n"))?;
        Ok(())
    }

    pub fn db_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(DB_FILENAME)
    }
}

/// Expand a leading `~` and anchor relative paths at the working directory.
pub fn expand_path(path: &str) -> String {
    let expanded = match path.strip_prefix('~') {
        Some(rest) => PathBuf::from(format!("{}{rest}", home().display())),
        None => PathBuf::from(path),
    };
    let absolute = if expanded.is_relative() {
        std::env::current_dir().map(|cwd| cwd.join(&expanded)).unwrap_or(expanded)
    } else {
        expanded
    };
    std::fs::canonicalize(&absolute)
        .unwrap_or(absolute)
        .to_string_lossy()
        .into_owned()
}
