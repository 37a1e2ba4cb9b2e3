//! Error taxonomy for the engine.
//!
//! Each leaf error type carries only what its callers need to either render
//! a user-visible apology or persist a technical detail for the dashboard.

use thiserror::Error;

/// Storage-layer failures: anything the database rejected.
#[derive(Debug, Error)]
pub enum StorageFailure {
    #[error("database initialization error: {0}")]
    Init(String),

    #[error("database migration error: {0}")]
    Migration(String),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::Error),

    #[error("diesel error: {0}")]
    Diesel(#[from] diesel::result::Error),
}

/// The language model call failed (timeout, 5xx, network).
#[derive(Debug, Error)]
#[error("completion failed: {0}")]
pub struct CompletionFailure(pub String);

/// A cron expression cannot produce a next fire time.
#[derive(Debug, Error)]
#[error("cron parse failure: {0}")]
pub struct ParseFailure(pub String);

/// The chat transport failed to deliver a message.
#[derive(Debug, Error)]
#[error("transport failure: {0}")]
pub struct TransportFailure(pub String);

/// Top-level error type threaded through the engine's async tasks.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Storage(#[from] StorageFailure),

    #[error(transparent)]
    Completion(#[from] CompletionFailure),

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error(transparent)]
    Transport(#[from] TransportFailure),

    #[error("unauthorized chat")]
    Authorization,

    #[error("not found: {0}")]
    NotFound(String),
}
