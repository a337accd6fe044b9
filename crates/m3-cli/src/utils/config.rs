//! Application configuration management utilities.

use camino::Utf8PathBuf;
use m3_mod_definition::Game;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;

/// Application-wide configuration stored in config.toml.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    /// Shared asset library that mods may reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_library_dir: Option<Utf8PathBuf>,

    /// Installation roots keyed by game name (`ME3`, `LE1`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub game_roots: BTreeMap<String, Utf8PathBuf>,
}

impl AppConfig {
    pub fn game_root(&self, game: Game) -> Option<&Utf8PathBuf> {
        self.game_roots.get(&game.to_string())
    }

    pub fn set_game_root(&mut self, game: Game, root: Utf8PathBuf) {
        self.game_roots.insert(game.to_string(), root);
    }
}

/// Returns the directory where the current executable resides.
pub fn install_dir() -> Option<Utf8PathBuf> {
    let exe = env::current_exe().ok()?;
    let parent = exe.parent()?;
    Utf8PathBuf::from_path_buf(parent.to_path_buf()).ok()
}

/// Returns a config file path located next to the executable.
pub fn config_path(file_name: &str) -> Option<Utf8PathBuf> {
    install_dir().map(|dir| dir.join(file_name))
}

/// Returns the default configuration file path (config.toml).
pub fn default_config_path() -> Option<Utf8PathBuf> {
    config_path("config.toml")
}

/// Loads the application configuration from config.toml.
/// Returns default configuration if file doesn't exist or cannot be parsed.
pub fn load_config() -> AppConfig {
    let Some(path) = default_config_path() else {
        return AppConfig::default();
    };
    let Ok(content) = fs::read_to_string(&path) else {
        return AppConfig::default();
    };
    parse_config(&content).unwrap_or_else(|e| {
        tracing::warn!("Ignoring unreadable config {}: {}", path, e);
        AppConfig::default()
    })
}

fn parse_config(content: &str) -> io::Result<AppConfig> {
    toml::from_str(content).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Saves the application configuration to config.toml.
pub fn save_config(cfg: &AppConfig) -> io::Result<()> {
    let path = default_config_path().ok_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "Could not determine config path")
    })?;
    let content = toml::to_string_pretty(cfg).map_err(io::Error::other)?;
    fs::write(path, content)
}
