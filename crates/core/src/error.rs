//! Error types for the simulation core.

use thiserror::Error;

/// Codec input-validation failures (fail fast, never wrap).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("block type {0} does not fit in 4 bits")]
    BlockType(u32),
    #[error("power field {0} exceeds 7")]
    PowerField(u32),
    #[error("owner id {0} exceeds 127")]
    OwnerId(u32),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config value for {field}: {msg}")]
    Invalid { field: &'static str, msg: String },
}
