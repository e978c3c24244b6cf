//! Error types.
//!
//! Gameplay itself has no error paths: invalid flips are no-ops and
//! persistence failures are swallowed by the engine. These types surface
//! from catalog loading, configuration parsing, the snapshot stores and the
//! async session driver.

use thiserror::Error;

/// Errors loading a fragment catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Catalog JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Catalog contains no fragments.
    #[error("Catalog is empty")]
    Empty,

    /// Two fragments share an id.
    #[error("Duplicate fragment id: {0}")]
    DuplicateId(String),
}

/// Errors from snapshot stores.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Store is not accepting reads or writes.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Snapshot parsed but failed structural validation.
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(&'static str),
}

/// Errors in engine configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config JSON could not be parsed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `pairs` must be at least 1.
    #[error("pairs must be at least 1")]
    ZeroPairs,

    /// `maxDistortions` must be at least 1.
    #[error("maxDistortions must be at least 1")]
    ZeroMaxDistortions,
}

/// Errors talking to a running session task.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The session task has stopped.
    #[error("Session closed")]
    Closed,
}
