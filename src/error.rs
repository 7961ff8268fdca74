// Error types for the nowsync library.
// Covers connection, transport, unknown-kind, and timestamp parse failures.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NowSyncError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("authentication failed: invalid credentials")]
    Unauthorized,

    #[error("no matching identity for user {0}")]
    IdentityNotFound(String),

    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("record kind not recognized: {0}")]
    UnknownKind(String),

    #[error("invalid remote timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, NowSyncError>;
