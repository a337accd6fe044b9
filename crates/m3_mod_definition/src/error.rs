use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModDefinitionError>;

#[derive(Error, Debug)]
pub enum ModDefinitionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON mod definition: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid TOML mod definition: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Unsupported mod definition format: {0} (expected .json or .toml)")]
    UnsupportedFormat(String),

    #[error("Invalid mod definition: {0}")]
    Invalid(String),
}
