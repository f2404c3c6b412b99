//! Error types for the simulation core.
//!
//! Most lookups in the core return `Option` and never fail; errors are reserved for
//! programming mistakes at the seams (duplicate keys, misconfigured worlds) and for
//! per-entity pathfinding failures that the seeking system absorbs.

use thiserror::Error;

/// Errors raised by the indexed entity store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("duplicate key {key} in unique index '{index}'")]
    DuplicateKey { index: &'static str, key: String },
}

/// Errors raised while solving a local path.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathfindingError {
    #[error("start cell ({x}, {y}) lies outside the local grid")]
    StartOutOfBounds { x: i32, y: i32 },

    #[error("goal cell ({x}, {y}) lies outside the local grid")]
    GoalOutOfBounds { x: i32, y: i32 },
}

/// Errors raised by world configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Errors raised by the engine control surface.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("engine must be started from within a tokio runtime")]
    NoRuntime,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
