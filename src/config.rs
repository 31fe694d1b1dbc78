//! Layered configuration: built-in defaults, then an optional TOML file, then
//! `GROUND_*` environment variables.
//!
//! | Key                      | Default | Description                          |
//! |--------------------------|---------|--------------------------------------|
//! | `GROUND_CHUNK_SIZE`      | `512`   | Chunk side length (world units)      |
//! | `GROUND_ACTIVE_CHUNKS`   | `3`     | Active square side, in chunks (odd)  |
//! | `GROUND_DAMAGE_MERGE`    | `union` | `union` or `xor`                     |
//! | `GROUND_MULTITHREADED`   | `true`  | Background chunk placement           |
//!
//! Chunk size and the noise constants are not written to save files; they
//! must match between the session that saved and the one that loads.

use std::path::Path;

use config::{Config, Environment, File, FileFormat};

use crate::error::{Result, TerrainError};
use crate::types::TerrainConfig;

pub const ENV_PREFIX: &str = "GROUND";

/// Load a [`TerrainConfig`] from `path` (if given) and the environment.
pub fn load(path: Option<&Path>) -> Result<TerrainConfig> {
    let mut builder = Config::builder();

    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
    }

    let config: TerrainConfig = builder
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()?
        .try_deserialize()?;

    validate(&config)?;
    Ok(config)
}

/// Reject configurations the engine cannot page with.
pub fn validate(config: &TerrainConfig) -> Result<()> {
    if config.chunk_size <= 0 {
        return Err(TerrainError::InvalidConfig(format!(
            "chunk_size must be positive, got {}",
            config.chunk_size
        )));
    }
    if config.active_chunks <= 0 || config.active_chunks % 2 == 0 {
        return Err(TerrainError::InvalidConfig(format!(
            "active_chunks must be a positive odd number, got {}",
            config.active_chunks
        )));
    }
    for (name, value) in [
        ("surface_step", config.surface_step),
        ("cave_cell", config.cave_cell),
        ("grass_spacing", config.grass_spacing),
        ("tree_spacing", config.tree_spacing),
    ] {
        if value <= 0 {
            return Err(TerrainError::InvalidConfig(format!(
                "{name} must be positive, got {value}"
            )));
        }
    }
    if config.low_freq_divisor == 0.0 || config.high_freq_divisor == 0.0 || config.cave_divisor == 0.0
    {
        return Err(TerrainError::InvalidConfig(
            "noise divisors must be non-zero".into(),
        ));
    }
    Ok(())
}
