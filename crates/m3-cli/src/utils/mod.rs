use crate::errors::CliError;
use camino::{Utf8Path, Utf8PathBuf};
use m3_mod_definition::Game;

pub mod config;

#[macro_export]
macro_rules! println_pad {
    ($($arg:tt)*) => {{
        let __s = format!($($arg)*);
        for __line in __s.lines() {
            println!("    {}", __line);
        }
    }};
}

/// Fail with a diagnostic if `path` does not exist.
pub fn require_exists(path: &Utf8Path) -> Result<(), CliError> {
    if path.exists() {
        Ok(())
    } else {
        Err(CliError::file_not_found(path))
    }
}

pub fn parse_game(value: &str) -> Result<Game, CliError> {
    value.parse().map_err(|_| CliError::InvalidGame {
        value: value.to_string(),
    })
}

/// Use the explicit root if given, otherwise the configured one.
pub fn game_root(game: Game, explicit: Option<String>) -> Result<Utf8PathBuf, CliError> {
    match explicit {
        Some(root) => Ok(Utf8PathBuf::from(root)),
        None => config::load_config()
            .game_root(game)
            .cloned()
            .ok_or_else(|| CliError::game_root_not_configured(game)),
    }
}

/// Format a byte count for display.
pub fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
