use parley_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool: {0}")]
    InvalidTool(#[from] CoreError),
}

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read tool manifest: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse tool manifest: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
