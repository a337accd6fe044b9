//! Error types for resolution and installation.
//!
//! [`resolve`](crate::resolve) is pure and fails only with a [`ResolveError`].
//! Everything that touches the disk or an archive returns [`Result<T>`], which
//! wraps resolution failures alongside I/O and archive errors.

use camino::Utf8PathBuf;
use m3_mod_definition::{Game, JobHeader};
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons a mod cannot be turned into an installation plan.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// Two sources want the same destination without a sanctioned override.
    #[error("Conflicting destination '{destination}' in job {job}: {existing} and {incoming} both install it")]
    Conflict {
        job: JobHeader,
        destination: String,
        existing: String,
        incoming: String,
    },

    /// The job kind has no installation surface on this game.
    #[error("Job {job} cannot be installed on {game}")]
    UnsupportedGameForJob { game: Game, job: JobHeader },

    /// The mod was written for another game than the target.
    #[error("Mod targets {mod_game} but the installation target is {target_game}")]
    GameMismatch { mod_game: Game, target_game: Game },

    /// A `replace` operation points at a destination that is not in the set.
    #[error("Alternate '{alternate}' of job {job} replaces '{destination}', which is not being installed")]
    ReplaceTargetMissing {
        job: JobHeader,
        alternate: String,
        destination: String,
    },

    /// A selected alternate does not exist on the job (or the job does not
    /// exist in the mod).
    #[error("Job {job} has no alternate named '{name}'")]
    UnknownAlternate { job: JobHeader, name: String },

    /// More than one option of a mutually exclusive group is selected.
    #[error("Job {job} has several options selected in exclusive group '{group}': {}", selected.join(", "))]
    ExclusiveGroupViolation {
        job: JobHeader,
        group: String,
        selected: Vec<String>,
    },
}

/// Errors raised while inspecting a target or applying a plan.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The packed mapping references entries the archive does not contain.
    /// Reported before anything is written.
    #[error("Archive {archive} is missing {} entries: {}", entries.len(), entries.join(", "))]
    MissingArchiveEntry {
        archive: Utf8PathBuf,
        entries: Vec<String>,
    },

    /// Failure reported by an archive implementation.
    #[error("Archive error: {0}")]
    Archive(String),
}
