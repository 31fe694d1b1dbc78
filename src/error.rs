//! Error types for the terrain engine.

use thiserror::Error;

use crate::world::FixtureHandle;

#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Save data ended early while reading {0}")]
    TruncatedSave(&'static str),

    #[error("Invalid save data: {0}")]
    InvalidSave(String),

    #[error("Unknown physics fixture {0:?}")]
    UnknownFixture(FixtureHandle),

    #[error("Unknown light occluder {0}")]
    UnknownOccluder(u64),
}

pub type Result<T> = std::result::Result<T, TerrainError>;
