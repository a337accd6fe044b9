use camino::Utf8PathBuf;
use m3_install::ResolveError;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("No game root configured for {game}")]
    #[diagnostic(
        code(config::game_root_missing),
        help("Pass --game-root or run 'm3 config set-game-root {game} <path>'")
    )]
    GameRootNotConfigured { game: String },

    #[error("File not found: {path}")]
    #[diagnostic(
        code(file::not_found),
        help("Make sure the file exists and the path is correct")
    )]
    FileNotFound { path: Utf8PathBuf },

    #[error("Invalid alternate selection: {value}")]
    #[diagnostic(
        code(resolve::invalid_selection),
        help("Selections are written as JOB=ALTERNATE, e.g. BASEGAME=\"Night lighting\"")
    )]
    InvalidSelection { value: String },

    #[error("Invalid game: {value}")]
    #[diagnostic(
        code(config::invalid_game),
        help("Valid games are ME1, ME2, ME3, LE1, LE2 and LE3")
    )]
    InvalidGame { value: String },

    #[error("The mod cannot be installed")]
    #[diagnostic(
        code(resolve::failed),
        help("Check the selected alternates and the jobs declared in the mod definition")
    )]
    Resolve {
        #[source]
        source: ResolveError,
    },

    #[error("Container error")]
    #[diagnostic(code(container::error))]
    Container {
        #[from]
        source: m3_container::ContainerError,
    },

    #[error("Mod definition error")]
    #[diagnostic(
        code(mod_definition::error),
        help("Check the moddef.json or moddef.toml file for syntax errors")
    )]
    ModDefinition {
        #[from]
        source: m3_mod_definition::ModDefinitionError,
    },

    #[error("Installation target error")]
    #[diagnostic(code(install::error))]
    Install {
        #[from]
        source: m3_install::Error,
    },

    #[error("Merge DLC error")]
    #[diagnostic(code(merge_dlc::error))]
    MergeDlc {
        #[from]
        source: m3_merge_dlc::MergeDlcError,
    },

    #[error("IO operation failed")]
    #[diagnostic(code(io::operation_failed))]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn game_root_not_configured(game: impl ToString) -> Self {
        Self::GameRootNotConfigured {
            game: game.to_string(),
        }
    }

    pub fn file_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn invalid_selection(value: impl Into<String>) -> Self {
        Self::InvalidSelection {
            value: value.into(),
        }
    }
}

impl From<ResolveError> for CliError {
    fn from(source: ResolveError) -> Self {
        Self::Resolve { source }
    }
}
