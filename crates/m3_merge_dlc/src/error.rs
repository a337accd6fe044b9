use m3_mod_definition::Game;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, MergeDlcError>;

#[derive(Error, Debug)]
pub enum MergeDlcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Game 1 merges into the base game directly and has no merge DLC.
    #[error("{0} does not support a merge DLC")]
    UnsupportedGame(Game),

    /// The starter kit generator failed to scaffold the DLC.
    #[error("Starter kit generation failed: {0}")]
    Generator(String),

    #[error("Invalid _metacmm.txt: {0}")]
    InvalidMetaCmm(String),
}
