use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Kind of an installation job, which decides where its files may go.
///
/// Headers compare case-insensitively, so `dlc_con_mp1` and `DLC_CON_MP1`
/// name the same job. The spelling that was parsed is kept for display.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(try_from = "String", into = "String")]
pub enum JobHeader {
    Basegame,
    CustomDlc,
    Localization,
    /// ME3 only.
    BalanceChanges,
    /// ME1 only.
    Me1Config,
    /// ME3 only. Installs into the multiplayer test patch archive.
    TestPatch,
    /// Files of an official DLC, identified by its folder name
    /// (e.g. `DLC_CON_MP1`).
    OfficialDlc(String),
}

impl JobHeader {
    /// Serialized name of the job header.
    pub fn as_str(&self) -> &str {
        match self {
            JobHeader::Basegame => "BASEGAME",
            JobHeader::CustomDlc => "CUSTOMDLC",
            JobHeader::Localization => "LOCALIZATION",
            JobHeader::BalanceChanges => "BALANCE_CHANGES",
            JobHeader::Me1Config => "ME1_CONFIG",
            JobHeader::TestPatch => "TESTPATCH",
            JobHeader::OfficialDlc(folder) => folder,
        }
    }
}

impl JobHeader {
    fn rank(&self) -> u8 {
        match self {
            JobHeader::Basegame => 0,
            JobHeader::CustomDlc => 1,
            JobHeader::Localization => 2,
            JobHeader::BalanceChanges => 3,
            JobHeader::Me1Config => 4,
            JobHeader::TestPatch => 5,
            JobHeader::OfficialDlc(_) => 6,
        }
    }

    fn folded(&self) -> impl Iterator<Item = u8> + '_ {
        self.as_str().bytes().map(|b| b.to_ascii_uppercase())
    }
}

impl PartialEq for JobHeader {
    fn eq(&self, other: &Self) -> bool {
        self.rank() == other.rank() && self.as_str().eq_ignore_ascii_case(other.as_str())
    }
}

impl Eq for JobHeader {}

impl Hash for JobHeader {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        for byte in self.folded() {
            byte.hash(state);
        }
    }
}

impl Ord for JobHeader {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.folded().cmp(other.folded()))
    }
}

impl PartialOrd for JobHeader {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for JobHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for JobHeader {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ok(match value.to_ascii_uppercase().as_str() {
            "BASEGAME" => JobHeader::Basegame,
            "CUSTOMDLC" => JobHeader::CustomDlc,
            "LOCALIZATION" => JobHeader::Localization,
            "BALANCE_CHANGES" => JobHeader::BalanceChanges,
            "ME1_CONFIG" => JobHeader::Me1Config,
            "TESTPATCH" => JobHeader::TestPatch,
            upper if upper.starts_with("DLC_") && upper.len() > 4 => {
                JobHeader::OfficialDlc(value)
            }
            _ => return Err(format!("unknown job header '{value}'")),
        })
    }
}

impl From<JobHeader> for String {
    fn from(header: JobHeader) -> Self {
        header.as_str().to_string()
    }
}

/// Where the bytes of an installed file come from.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceLocation {
    /// Path relative to the mod's own storage folder.
    ModStorage(String),
    /// Path relative to the shared asset library.
    SharedLibrary(String),
    /// Content generated at install time.
    #[serde(skip)]
    InMemory(Vec<u8>),
}

impl SourceLocation {
    /// A location for `file` underneath this one. In-memory sources have no
    /// children and are returned unchanged.
    pub fn join(&self, file: &str) -> SourceLocation {
        let join = |base: &str| {
            let base = base.trim_end_matches(['/', '\\']);
            if base.is_empty() {
                file.to_string()
            } else {
                format!("{base}/{file}")
            }
        };
        match self {
            SourceLocation::ModStorage(base) => SourceLocation::ModStorage(join(base)),
            SourceLocation::SharedLibrary(base) => SourceLocation::SharedLibrary(join(base)),
            SourceLocation::InMemory(bytes) => SourceLocation::InMemory(bytes.clone()),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceLocation::ModStorage(path) => write!(f, "{path}"),
            SourceLocation::SharedLibrary(path) => write!(f, "library:{path}"),
            SourceLocation::InMemory(bytes) => write!(f, "<{} bytes in memory>", bytes.len()),
        }
    }
}

/// A declared file of a job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Destination path, relative to the job's installation surface.
    ///
    /// Example: `BIOGame/CookedPCConsole/Startup.pcc` for a `BASEGAME` job,
    /// `DLC_MOD_Example/CookedPCConsole/Default.sfar` for a `CUSTOMDLC` job
    pub destination: String,
    pub source: SourceLocation,
}

/// A single operation an alternate option performs on a job's file set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AlternateOperation {
    /// Install an additional file. Fails on an existing destination unless
    /// `overrides_existing` is set.
    Add {
        destination: String,
        source: SourceLocation,
        #[serde(default)]
        overrides_existing: bool,
    },
    /// Drop a file from the set. Missing destinations are ignored.
    Remove { destination: String },
    /// Swap the source of an existing file.
    Replace {
        destination: String,
        source: SourceLocation,
    },
    /// Add every `root/file` as `target_dir/file`.
    AddMultiList {
        root: SourceLocation,
        target_dir: String,
        files: Vec<String>,
    },
    /// Remove every `target_dir/file`.
    RemoveMultiList {
        target_dir: String,
        files: Vec<String>,
    },
}

/// A user-selectable modification of a job's file set.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AlternateOption {
    /// Unique name within the job
    pub name: String,

    /// Mutually exclusive group. At most one option of a group may be selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Operations applied in order when the option is selected
    #[serde(default)]
    pub operations: Vec<AlternateOperation>,
}

/// One logical unit of a mod, e.g. "base game files" or "files of DLC X".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct InstallationJob {
    pub header: JobHeader,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileEntry>,

    /// Alternate options, in the order they are applied
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<AlternateOption>,
}

impl InstallationJob {
    pub fn alternate(&self, name: &str) -> Option<&AlternateOption> {
        self.alternates.iter().find(|alt| alt.name == name)
    }
}
