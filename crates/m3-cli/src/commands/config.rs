use crate::errors::CliError;
use crate::utils::config::{self, AppConfig};
use crate::utils::parse_game;
use camino::Utf8PathBuf;
use colored::Colorize;
use miette::Result;

fn save(cfg: &AppConfig) -> Result<()> {
    config::save_config(cfg).map_err(|e| miette::miette!("Failed to save config: {}", e))
}

/// Print a config path entry with status indicator
fn print_path_config(name: &str, path: Option<&Utf8PathBuf>) {
    match path {
        Some(p) => {
            let status = if p.is_dir() {
                "✓".bright_green()
            } else {
                "✗".bright_red()
            };
            println!("  {} {} {}", format!("{}:", name).bright_white(), p, status);
        }
        None => {
            println!(
                "  {} {}",
                format!("{}:", name).bright_white(),
                "(not set)".bright_yellow()
            );
        }
    }
}

pub fn show_config() -> Result<()> {
    let cfg = config::load_config();
    let config_path = config::default_config_path()
        .map(|p| p.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    println!();
    println!("  {} {}", "config_file:".bright_white(), config_path);
    print_path_config("mod_library_dir", cfg.mod_library_dir.as_ref());
    for (game, root) in &cfg.game_roots {
        print_path_config(&format!("game_roots.{game}"), Some(root));
    }
    println!();
    Ok(())
}

pub fn set_game_root(game: String, path: String) -> Result<()> {
    let game = parse_game(&game)?;
    let path = Utf8PathBuf::from(path);
    if !path.is_dir() {
        return Err(CliError::file_not_found(path).into());
    }

    let mut cfg = config::load_config();
    cfg.set_game_root(game, path.clone());
    save(&cfg)?;

    println!(
        "{} {} {}",
        "✓ Game root set for".bright_green().bold(),
        game.to_string().bright_white().bold(),
        path.as_str().bright_green()
    );
    Ok(())
}

pub fn set_library_dir(path: String) -> Result<()> {
    let path = Utf8PathBuf::from(path);
    let mut cfg = config::load_config();
    cfg.mod_library_dir = Some(path.clone());
    save(&cfg)?;

    println!(
        "{} {}",
        "✓ Mod library set to".bright_green().bold(),
        path.as_str().bright_green()
    );
    Ok(())
}
