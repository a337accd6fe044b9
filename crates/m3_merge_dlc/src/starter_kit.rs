//! Seam to the starter kit DLC generator, which scaffolds an empty DLC folder
//! (mount file, startup package, string table, config bundle).

use crate::error::Result;
use camino::Utf8PathBuf;
use m3_mod_definition::Game;

/// ME3 mount flag: the DLC loads in single player.
pub const ME3_LOADS_IN_SINGLEPLAYER: u8 = 0x08;

/// Mount file flag of a generated DLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountFlag {
    /// Game 3 style flag byte.
    Game3(u8),
    /// Game 1 and 2 style flag with the single-player-only marker.
    Legacy { flags: u8, single_player_only: bool },
}

/// Everything the generator needs to scaffold a DLC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarterKitOptions {
    pub game: Game,
    /// Directory the DLC folder is created in (the game's DLC directory).
    pub output_dir: Utf8PathBuf,
    pub internal_name: String,
    pub internal_tlk_id: u32,
    pub developer: String,
    pub mount_priority: u32,
    pub module_number: u32,
    pub mount_flag: MountFlag,
    /// Folder name without the `DLC_MOD_` prefix.
    pub dlc_folder_suffix: String,
    /// Whether to also generate a mod definition for the DLC.
    pub generate_mod_definition: bool,
}

impl StarterKitOptions {
    /// Full folder name of the generated DLC.
    pub fn dlc_folder_name(&self) -> String {
        format!("DLC_MOD_{}", self.dlc_folder_suffix)
    }
}

/// Creates a DLC folder from [`StarterKitOptions`].
pub trait StarterKitGenerator {
    /// Scaffold `options.output_dir/options.dlc_folder_name()`.
    fn generate(&self, options: &StarterKitOptions) -> Result<()>;
}

impl<F> StarterKitGenerator for F
where
    F: Fn(&StarterKitOptions) -> Result<()>,
{
    fn generate(&self, options: &StarterKitOptions) -> Result<()> {
        self(options)
    }
}
