// src/error.rs

//! Crate-wide error type.
//!
//! Every fallible boundary in this crate (filesystem, SQLite, header
//! parsing, archive framing, dependency resolution) returns `Result<T>`.
//! Library code does not panic on malformed input.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    IoError(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path traversal attempt: {0}")]
    PathTraversal(String),

    #[error("initialization error: {0}")]
    InitError(String),

    #[error("transaction error: {0}")]
    TransactionError(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("conflict: {0}")]
    ConflictError(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("unsupported codec: {0}")]
    Codec(String),

    #[error("malformed header: {0}")]
    Header(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("file state machine error: {0}")]
    Fsm(String),

    #[error("dependency resolution error: {0}")]
    Resolver(String),
}

impl From<crate::hash::HashError> for Error {
    fn from(e: crate::hash::HashError) -> Self {
        Error::InvalidPath(e.to_string())
    }
}

impl From<crate::compression::CompressionError> for Error {
    fn from(e: crate::compression::CompressionError) -> Self {
        Error::Codec(e.to_string())
    }
}
