//! The merge DLC: a synthetic DLC folder, owned by the mod manager, that
//! collects the output of merge operations (string tables, config, plot data).
//!
//! The folder is always regenerated from scratch. A fresh GUID is written into
//! its `_metacmm.txt` on every generation so that other tools can tell one
//! instance of the merge DLC from the next.

mod error;
pub mod metacmm;
pub mod starter_kit;

pub use error::{MergeDlcError, Result};
pub use metacmm::{MetaCmm, METACMM_FILE_NAME};
pub use starter_kit::{
    MountFlag, StarterKitGenerator, StarterKitOptions, ME3_LOADS_IN_SINGLEPLAYER,
};

use camino::{Utf8Path, Utf8PathBuf};
use m3_install::InstallTarget;
use m3_mod_definition::Game;
use uuid::Uuid;

/// Folder name of the merge DLC.
pub const MERGE_DLC_FOLDER_NAME: &str = "DLC_MOD_M3_MERGE";

/// Extended attribute holding the instance GUID.
pub const MERGE_DLC_GUID_ATTRIBUTE: &str = "MergeDLCGUID";

pub const MERGE_DLC_INTERNAL_NAME: &str = "ME3Tweaks Mod Manager Merge DLC";
pub const MERGE_DLC_DEVELOPER: &str = "ME3Tweaks Mod Manager";
pub const MERGE_DLC_TLK_ID: u32 = 1928304430;
pub const MERGE_DLC_MOUNT_PRIORITY: u32 = 1900000000;
pub const MERGE_DLC_MODULE_NUMBER: u32 = 48955;

const MERGE_DLC_MOD_NAME: &str = "ME3Tweaks Mod Manager Auto-Generated Merge DLC";
const MERGE_DLC_VERSION: &str = "1.0";

/// A generated merge DLC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeDlc {
    path: Utf8PathBuf,
    guid: Uuid,
}

impl MergeDlc {
    /// Location of the merge DLC on `target`.
    pub fn path_for(target: &InstallTarget) -> Utf8PathBuf {
        target.dlc_dir().join(MERGE_DLC_FOLDER_NAME)
    }

    /// Starter kit options used to scaffold the merge DLC for `game`.
    pub fn starter_kit_options(game: Game, output_dir: Utf8PathBuf) -> StarterKitOptions {
        let mount_flag = if game.generation() == 3 {
            MountFlag::Game3(ME3_LOADS_IN_SINGLEPLAYER)
        } else {
            MountFlag::Legacy {
                flags: 0,
                single_player_only: true,
            }
        };

        StarterKitOptions {
            game,
            output_dir,
            internal_name: MERGE_DLC_INTERNAL_NAME.to_string(),
            internal_tlk_id: MERGE_DLC_TLK_ID,
            developer: MERGE_DLC_DEVELOPER.to_string(),
            mount_priority: MERGE_DLC_MOUNT_PRIORITY,
            module_number: MERGE_DLC_MODULE_NUMBER,
            mount_flag,
            dlc_folder_suffix: MERGE_DLC_FOLDER_NAME
                .trim_start_matches("DLC_MOD_")
                .to_string(),
            generate_mod_definition: false,
        }
    }

    /// Generate a fresh merge DLC on `target`, replacing any existing one.
    ///
    /// `correlation_id` identifies the installer session and is recorded in
    /// the marker file. If anything fails after the folder was created, the
    /// partial folder is removed before the error is returned.
    pub fn generate(
        target: &InstallTarget,
        correlation_id: &str,
        generator: &dyn StarterKitGenerator,
    ) -> Result<Self> {
        let game = target.game();
        if game.generation() == 1 {
            return Err(MergeDlcError::UnsupportedGame(game));
        }

        Self::remove(target)?;

        let path = Self::path_for(target);
        let options = Self::starter_kit_options(game, target.dlc_dir());
        tracing::info!("Generating merge DLC at {}", path);

        match Self::scaffold(&path, &options, correlation_id, generator) {
            Ok(guid) => {
                tracing::info!("Generated merge DLC {} with GUID {}", path, guid);
                Ok(Self { path, guid })
            }
            Err(e) => {
                if path.exists() {
                    if let Err(cleanup) = std::fs::remove_dir_all(&path) {
                        tracing::warn!(
                            "Failed to clean up partial merge DLC {}: {}",
                            path,
                            cleanup
                        );
                    }
                }
                Err(e)
            }
        }
    }

    fn scaffold(
        path: &Utf8Path,
        options: &StarterKitOptions,
        correlation_id: &str,
        generator: &dyn StarterKitGenerator,
    ) -> Result<Uuid> {
        std::fs::create_dir_all(&options.output_dir)?;
        generator.generate(options)?;
        std::fs::create_dir_all(path)?;

        let guid = Uuid::new_v4();
        let meta = MetaCmm {
            mod_name: MERGE_DLC_MOD_NAME.to_string(),
            version: MERGE_DLC_VERSION.to_string(),
            installed_by: env!("CARGO_PKG_VERSION").to_string(),
            installer_instance_id: correlation_id.to_string(),
            extended_attributes: [(MERGE_DLC_GUID_ATTRIBUTE.to_string(), guid.to_string())]
                .into_iter()
                .collect(),
            ..MetaCmm::default()
        };
        meta.write(&path.join(METACMM_FILE_NAME))?;
        Ok(guid)
    }

    /// Delete the merge DLC from `target` if present. Returns whether a folder
    /// was removed.
    pub fn remove(target: &InstallTarget) -> Result<bool> {
        let path = Self::path_for(target);
        if !path.exists() {
            return Ok(false);
        }
        tracing::info!("Removing merge DLC {}", path);
        std::fs::remove_dir_all(&path)?;
        Ok(true)
    }

    /// GUID of the merge DLC currently on `target`, if there is one and its
    /// marker can be read.
    pub fn current_guid(target: &InstallTarget) -> Option<Uuid> {
        let marker = Self::path_for(target).join(METACMM_FILE_NAME);
        if !marker.is_file() {
            return None;
        }

        let meta = match MetaCmm::read(&marker) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Could not read {}: {}", marker, e);
                return None;
            }
        };
        let value = meta.extended_attributes.get(MERGE_DLC_GUID_ATTRIBUTE)?;
        match Uuid::parse_str(value) {
            Ok(guid) => Some(guid),
            Err(e) => {
                tracing::warn!("Could not parse merge DLC GUID '{}': {}", value, e);
                None
            }
        }
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// GUID assigned to this instance.
    pub fn guid(&self) -> Uuid {
        self.guid
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn target(game: Game) -> (tempfile::TempDir, InstallTarget) {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap().to_path_buf();
        (dir, InstallTarget::new(game, root))
    }

    /// Writes a mount file into the requested folder and remembers the options.
    #[derive(Default)]
    struct FakeGenerator {
        seen: RefCell<Vec<StarterKitOptions>>,
    }

    impl StarterKitGenerator for FakeGenerator {
        fn generate(&self, options: &StarterKitOptions) -> Result<()> {
            let cooked = options
                .output_dir
                .join(options.dlc_folder_name())
                .join("CookedPCConsole");
            std::fs::create_dir_all(&cooked)?;
            std::fs::write(cooked.join("Mount.dlc"), b"mount")?;
            self.seen.borrow_mut().push(options.clone());
            Ok(())
        }
    }

    #[test]
    fn test_generate_writes_marker_with_fresh_guid() {
        let (_dir, target) = target(Game::LE3);
        let generator = FakeGenerator::default();

        let first = MergeDlc::generate(&target, "session-1", &generator).unwrap();
        assert!(first.path().join("CookedPCConsole/Mount.dlc").is_file());
        assert_eq!(MergeDlc::current_guid(&target), Some(first.guid()));

        let meta = MetaCmm::read(&first.path().join(METACMM_FILE_NAME)).unwrap();
        assert_eq!(meta.installer_instance_id, "session-1");

        let second = MergeDlc::generate(&target, "session-2", &generator).unwrap();
        assert_ne!(first.guid(), second.guid());
        assert_eq!(MergeDlc::current_guid(&target), Some(second.guid()));

        let seen = generator.seen.borrow();
        assert_eq!(seen[0].dlc_folder_name(), MERGE_DLC_FOLDER_NAME);
        assert_eq!(seen[0].mount_flag, MountFlag::Game3(ME3_LOADS_IN_SINGLEPLAYER));
        assert_eq!(seen[0].internal_tlk_id, 1928304430);
        assert_eq!(seen[0].output_dir, target.dlc_dir());
    }

    #[test]
    fn test_game2_uses_single_player_only_flag() {
        let options = MergeDlc::starter_kit_options(Game::ME2, "dlc".into());
        assert_eq!(
            options.mount_flag,
            MountFlag::Legacy {
                flags: 0,
                single_player_only: true
            }
        );
        assert_eq!(options.dlc_folder_suffix, "M3_MERGE");
    }

    #[test]
    fn test_game1_is_refused() {
        for game in [Game::ME1, Game::LE1] {
            let (_dir, target) = target(game);
            let generator = FakeGenerator::default();
            let err = MergeDlc::generate(&target, "x", &generator).unwrap_err();
            assert!(matches!(err, MergeDlcError::UnsupportedGame(g) if g == game));
            assert!(generator.seen.borrow().is_empty());
        }
    }

    #[test]
    fn test_failed_generation_leaves_no_folder() {
        let (_dir, target) = target(Game::ME3);
        let failing = |options: &StarterKitOptions| -> Result<()> {
            std::fs::create_dir_all(options.output_dir.join(options.dlc_folder_name()))?;
            Err(MergeDlcError::Generator("out of disk".to_string()))
        };

        let err = MergeDlc::generate(&target, "x", &failing).unwrap_err();
        assert!(matches!(err, MergeDlcError::Generator(_)));
        assert!(!MergeDlc::path_for(&target).exists());
    }

    #[test]
    fn test_remove_is_idempotent() {
        let (_dir, target) = target(Game::ME2);
        MergeDlc::generate(&target, "x", &FakeGenerator::default()).unwrap();

        assert!(MergeDlc::remove(&target).unwrap());
        assert!(!MergeDlc::remove(&target).unwrap());
        assert_eq!(MergeDlc::current_guid(&target), None);
    }

    #[test]
    fn test_unparsable_guid_is_none() {
        let (_dir, target) = target(Game::LE2);
        let path = MergeDlc::path_for(&target);
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(
            path.join(METACMM_FILE_NAME),
            "Merge\n1.0\n1\nx\n[EXTENDEDATTRIBUTE]MergeDLCGUID=not-a-guid\n",
        )
        .unwrap();

        assert_eq!(MergeDlc::current_guid(&target), None);
    }
}
