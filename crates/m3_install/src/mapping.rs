//! Resolver output: which source goes to which destination, by which delivery
//! mechanism.

use crate::target::InstallTarget;
use camino::{Utf8Path, Utf8PathBuf};
use m3_mod_definition::{Game, JobHeader, SourceLocation};
use std::collections::BTreeMap;

/// Normalize a destination into a lookup key: `/` separators, no leading
/// separator, lowercase. Game filesystems are case-insensitive.
pub fn normalize_path(path: &str) -> String {
    clean_path(path).to_lowercase()
}

/// Use `/` separators and drop leading separators, keeping the case.
pub fn clean_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

/// Payload reference of an installed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallSourceFile {
    pub location: SourceLocation,
    /// The source was put in place by a selected alternate.
    pub alt_applied: bool,
    /// Name of the alternate responsible, if any.
    pub alternate: Option<String>,
}

impl InstallSourceFile {
    pub fn base(location: SourceLocation) -> Self {
        Self {
            location,
            alt_applied: false,
            alternate: None,
        }
    }

    pub fn from_alternate(location: SourceLocation, alternate: &str) -> Self {
        Self {
            location,
            alt_applied: true,
            alternate: Some(alternate.to_string()),
        }
    }

    /// Human readable origin, used in conflict reports.
    pub fn describe(&self) -> String {
        match &self.alternate {
            Some(alternate) => format!("{} (alternate '{}')", self.location, alternate),
            None => self.location.to_string(),
        }
    }
}

/// A destination in a job's file set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedFile {
    /// Destination as declared, with `/` separators and its original case.
    pub destination: String,
    pub source: InstallSourceFile,
}

/// Case-insensitive destination -> file map of one job.
pub type FileMap = BTreeMap<String, MappedFile>;

/// A job installed as loose files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedJobMapping {
    pub header: JobHeader,
    pub files: FileMap,
    /// Top level content folders installed by a `CUSTOMDLC` job.
    pub dlc_folders: Vec<String>,
}

impl UnpackedJobMapping {
    /// Directory, relative to the game root, that this job's destinations are
    /// relative to. Empty for jobs addressed from the game root.
    pub fn destination_root(&self, game: Game) -> &'static str {
        match self.header {
            JobHeader::CustomDlc => game.dlc_relative_dir(),
            _ => "",
        }
    }

    /// Destination of `file` relative to the game root.
    pub fn qualified_destination(&self, game: Game, file: &MappedFile) -> String {
        match self.destination_root(game) {
            "" => file.destination.clone(),
            root => format!("{}/{}", root, file.destination),
        }
    }
}

/// A job installed by rewriting entries inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackedJobMapping {
    pub header: JobHeader,
    pub archive: Utf8PathBuf,
    /// In-archive entry path -> file. Keys are case-insensitive within the
    /// archive.
    pub files: FileMap,
}

/// A job left out of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedJob {
    pub header: JobHeader,
    pub reason: String,
}

/// Roots that relative sources are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveContext {
    /// The mod's own storage folder.
    pub mod_root: Utf8PathBuf,
    /// The shared asset library, if the mod uses one.
    pub library_dir: Option<Utf8PathBuf>,
}

impl ResolveContext {
    pub fn new(mod_root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            mod_root: mod_root.into(),
            library_dir: None,
        }
    }

    pub fn with_library_dir(mut self, library_dir: impl Into<Utf8PathBuf>) -> Self {
        self.library_dir = Some(library_dir.into());
        self
    }
}

/// A resolved, conflict-free installation plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallMapping {
    pub(crate) game: Game,
    pub(crate) context: ResolveContext,
    pub(crate) unpacked: Vec<UnpackedJobMapping>,
    pub(crate) packed: Vec<PackedJobMapping>,
    pub(crate) skipped_jobs: Vec<SkippedJob>,
}

impl InstallMapping {
    pub fn game(&self) -> Game {
        self.game
    }

    pub fn context(&self) -> &ResolveContext {
        &self.context
    }

    /// Jobs installed as loose files, in declaration order.
    pub fn unpacked_jobs(&self) -> &[UnpackedJobMapping] {
        &self.unpacked
    }

    /// Jobs installed into archives, in declaration order.
    pub fn packed_jobs(&self) -> &[PackedJobMapping] {
        &self.packed
    }

    pub fn skipped_jobs(&self) -> &[SkippedJob] {
        &self.skipped_jobs
    }

    /// Every loose file keyed by its destination relative to the game root.
    pub fn unpacked_files(&self) -> impl Iterator<Item = (String, &MappedFile)> + '_ {
        self.unpacked.iter().flat_map(move |job| {
            job.files
                .values()
                .map(move |file| (job.qualified_destination(self.game, file), file))
        })
    }

    /// Total number of files in the plan.
    pub fn file_count(&self) -> usize {
        self.unpacked.iter().map(|job| job.files.len()).sum::<usize>()
            + self.packed.iter().map(|job| job.files.len()).sum::<usize>()
    }

    /// Content folders installed by `CUSTOMDLC` jobs.
    pub fn custom_dlc_folders(&self) -> impl Iterator<Item = &str> {
        self.unpacked
            .iter()
            .flat_map(|job| job.dlc_folders.iter().map(String::as_str))
    }

    /// Content folders of this mod that the target does not have yet.
    pub fn newly_introduced_dlc(&self, target: &InstallTarget) -> Vec<String> {
        self.custom_dlc_folders()
            .filter(|folder| !target.has_dlc(folder))
            .map(str::to_string)
            .collect()
    }

    /// Absolute path of a source on disk. In-memory sources have none; so do
    /// shared library sources when no library directory is configured.
    pub fn source_path(&self, file: &InstallSourceFile) -> Option<Utf8PathBuf> {
        let join = |root: &Utf8Path, relative: &str| root.join(clean_path(relative));
        match &file.location {
            SourceLocation::ModStorage(path) => Some(join(&self.context.mod_root, path)),
            SourceLocation::SharedLibrary(path) => self
                .context
                .library_dir
                .as_deref()
                .map(|library| join(library, path)),
            SourceLocation::InMemory(_) => None,
        }
    }

    /// Read the bytes of a source.
    pub fn load_source(&self, file: &InstallSourceFile) -> crate::Result<Vec<u8>> {
        if let SourceLocation::InMemory(bytes) = &file.location {
            return Ok(bytes.clone());
        }
        let path = self.source_path(file).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no shared library configured for {}", file.location),
            )
        })?;
        Ok(std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path() {
        assert_eq!(
            normalize_path("\\BIOGame\\CookedPCConsole\\Startup.pcc"),
            "biogame/cookedpcconsole/startup.pcc"
        );
        assert_eq!(clean_path("/BIOGame/DLC"), "BIOGame/DLC");
    }

    #[test]
    fn test_source_path() {
        let mapping = InstallMapping {
            game: Game::ME3,
            context: ResolveContext::new("/mods/example").with_library_dir("/library"),
            unpacked: vec![],
            packed: vec![],
            skipped_jobs: vec![],
        };

        let file = InstallSourceFile::base(SourceLocation::ModStorage("BASEGAME\\a.pcc".into()));
        assert_eq!(
            mapping.source_path(&file).unwrap(),
            Utf8PathBuf::from("/mods/example/BASEGAME/a.pcc")
        );

        let file = InstallSourceFile::base(SourceLocation::SharedLibrary("tex/b.tfc".into()));
        assert_eq!(
            mapping.source_path(&file).unwrap(),
            Utf8PathBuf::from("/library/tex/b.tfc")
        );

        let file = InstallSourceFile::base(SourceLocation::InMemory(vec![1, 2]));
        assert_eq!(mapping.source_path(&file), None);
        assert_eq!(mapping.load_source(&file).unwrap(), vec![1, 2]);
    }
}
