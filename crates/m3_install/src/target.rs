//! The game installation a mod is being installed onto.
//!
//! [`InstallTarget`] is a snapshot of what is installed. It is either built by
//! hand or taken from disk with [`InstallTarget::probe`]; the resolver never
//! touches the filesystem itself.

use crate::error::Result;
use crate::mapping::normalize_path;
use camino::{Utf8Path, Utf8PathBuf};
use m3_mod_definition::Game;
use std::collections::BTreeMap;

/// Size of the stub `Default.sfar` left behind once an ME3 DLC archive has
/// been unpacked.
pub const UNPACKED_ARCHIVE_STUB_SIZE: u64 = 32;

/// ME3 test patch archive, relative to the game root.
pub const TEST_PATCH_ARCHIVE: &str = "BIOGame/Patches/PCConsole/Patch_001.sfar";

/// How an official DLC is present on the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DlcState {
    NotInstalled,
    /// Loose files on disk.
    Unpacked,
    /// Still inside its archive.
    Packed { archive: Utf8PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InstalledDlc {
    folder: String,
    state: DlcState,
}

/// A game installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    game: Game,
    root: Utf8PathBuf,
    /// Keyed by lowercase folder name.
    dlc: BTreeMap<String, InstalledDlc>,
    test_patch: DlcState,
}

impl InstallTarget {
    /// A target with no DLC installed.
    pub fn new(game: Game, root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            game,
            root: root.into(),
            dlc: BTreeMap::new(),
            test_patch: DlcState::NotInstalled,
        }
    }

    /// Record a DLC folder. `NotInstalled` removes it.
    pub fn with_dlc(mut self, folder: &str, state: DlcState) -> Self {
        let key = normalize_path(folder);
        match state {
            DlcState::NotInstalled => {
                self.dlc.remove(&key);
            }
            state => {
                self.dlc.insert(
                    key,
                    InstalledDlc {
                        folder: folder.to_string(),
                        state,
                    },
                );
            }
        }
        self
    }

    pub fn with_test_patch(mut self, state: DlcState) -> Self {
        self.test_patch = state;
        self
    }

    pub fn game(&self) -> Game {
        self.game
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Absolute DLC directory of the installation.
    pub fn dlc_dir(&self) -> Utf8PathBuf {
        self.root.join(self.game.dlc_relative_dir())
    }

    /// State of a DLC folder, compared case-insensitively.
    pub fn dlc_state(&self, folder: &str) -> DlcState {
        self.dlc
            .get(&normalize_path(folder))
            .map(|dlc| dlc.state.clone())
            .unwrap_or(DlcState::NotInstalled)
    }

    pub fn has_dlc(&self, folder: &str) -> bool {
        self.dlc.contains_key(&normalize_path(folder))
    }

    /// Installed DLC folder names.
    pub fn installed_dlc(&self) -> impl Iterator<Item = &str> {
        self.dlc.values().map(|dlc| dlc.folder.as_str())
    }

    pub fn test_patch_state(&self) -> &DlcState {
        &self.test_patch
    }

    /// Inspect an installation on disk.
    ///
    /// Every folder in the DLC directory counts as installed. On ME3, a
    /// folder whose `CookedPCConsole/Default.sfar` is larger than the unpacked
    /// stub is still packed; the test patch archive is classified the same
    /// way.
    pub fn probe(game: Game, root: &Utf8Path) -> Result<Self> {
        let mut target = Self::new(game, root);
        let dlc_dir = target.dlc_dir();

        if dlc_dir.is_dir() {
            for entry in dlc_dir.read_dir_utf8()? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let folder = entry.file_name().to_string();
                let state = match game {
                    Game::ME3 => {
                        archive_state(&entry.path().join("CookedPCConsole").join("Default.sfar"))?
                            .unwrap_or(DlcState::Unpacked)
                    }
                    _ => DlcState::Unpacked,
                };
                tracing::debug!("Found DLC {} ({:?})", folder, state);
                target = target.with_dlc(&folder, state);
            }
        } else {
            tracing::warn!("DLC directory {} does not exist", dlc_dir);
        }

        if game == Game::ME3 {
            if let Some(state) = archive_state(&root.join(TEST_PATCH_ARCHIVE))? {
                target.test_patch = state;
            }
        }

        tracing::info!(
            "Probed {} installation at {}: {} DLC folders",
            game,
            root,
            target.dlc.len()
        );
        Ok(target)
    }
}

/// `None` if the archive does not exist.
fn archive_state(archive: &Utf8Path) -> Result<Option<DlcState>> {
    if !archive.is_file() {
        return Ok(None);
    }
    let size = archive.metadata()?.len();
    Ok(Some(if size == UNPACKED_ARCHIVE_STUB_SIZE {
        DlcState::Unpacked
    } else {
        DlcState::Packed {
            archive: archive.to_path_buf(),
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Utf8Path, len: usize) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, vec![0u8; len]).unwrap();
    }

    #[test]
    fn test_probe_me3() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let dlc = root.join("BIOGame/DLC");
        write(&dlc.join("DLC_CON_MP1/CookedPCConsole/Default.sfar"), 32);
        write(&dlc.join("DLC_CON_MP2/CookedPCConsole/Default.sfar"), 4096);
        write(&dlc.join("DLC_MOD_Example/CookedPCConsole/Startup.pcc"), 10);
        write(&root.join(TEST_PATCH_ARCHIVE), 64);

        let target = InstallTarget::probe(Game::ME3, root).unwrap();

        assert_eq!(target.dlc_state("dlc_con_mp1"), DlcState::Unpacked);
        assert_eq!(
            target.dlc_state("DLC_CON_MP2"),
            DlcState::Packed {
                archive: dlc.join("DLC_CON_MP2/CookedPCConsole/Default.sfar")
            }
        );
        assert_eq!(target.dlc_state("DLC_MOD_Example"), DlcState::Unpacked);
        assert_eq!(target.dlc_state("DLC_CON_MP3"), DlcState::NotInstalled);
        assert!(matches!(target.test_patch_state(), DlcState::Packed { .. }));
    }

    #[test]
    fn test_probe_missing_dlc_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8Path::from_path(dir.path()).unwrap();
        let target = InstallTarget::probe(Game::LE2, root).unwrap();
        assert_eq!(target.installed_dlc().count(), 0);
        assert_eq!(target.test_patch_state(), &DlcState::NotInstalled);
    }

    #[test]
    fn test_with_dlc_not_installed_removes() {
        let target = InstallTarget::new(Game::ME2, "/games/me2")
            .with_dlc("DLC_MOD_A", DlcState::Unpacked)
            .with_dlc("dlc_mod_a", DlcState::NotInstalled);
        assert!(!target.has_dlc("DLC_MOD_A"));
        assert_eq!(target.dlc_dir(), Utf8PathBuf::from("/games/me2/BioGame/DLC"));
    }
}
