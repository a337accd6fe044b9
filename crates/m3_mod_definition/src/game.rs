use serde::{Deserialize, Serialize};
use std::fmt;

/// A supported game.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Game {
    ME1,
    ME2,
    ME3,
    LE1,
    LE2,
    LE3,
}

impl Game {
    pub const ALL: [Game; 6] = [
        Game::ME1,
        Game::ME2,
        Game::ME3,
        Game::LE1,
        Game::LE2,
        Game::LE3,
    ];

    /// Whether this is a Legendary Edition remaster.
    pub fn is_legendary(self) -> bool {
        matches!(self, Game::LE1 | Game::LE2 | Game::LE3)
    }

    /// Trilogy position of the game (1, 2 or 3), regardless of edition.
    pub fn generation(self) -> u8 {
        match self {
            Game::ME1 | Game::LE1 => 1,
            Game::ME2 | Game::LE2 => 2,
            Game::ME3 | Game::LE3 => 3,
        }
    }

    /// The DLC directory, relative to the game root.
    ///
    /// Example: `BIOGame/DLC` for ME3
    pub fn dlc_relative_dir(self) -> &'static str {
        match self {
            Game::ME1 => "DLC",
            Game::ME2 | Game::LE1 | Game::LE2 => "BioGame/DLC",
            Game::ME3 | Game::LE3 => "BIOGame/DLC",
        }
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Game::ME1 => "ME1",
            Game::ME2 => "ME2",
            Game::ME3 => "ME3",
            Game::LE1 => "LE1",
            Game::LE2 => "LE2",
            Game::LE3 => "LE3",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Game {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Game::ALL
            .into_iter()
            .find(|game| game.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown game '{s}'"))
    }
}
