// src/error.rs

//! Crate-wide error type
//!
//! Parsers that are self-contained keep their own error enums
//! (`GavParseError`, `VersionParseError`, `FilterParseError`); they convert
//! into [`Error`] so callers can use `?` across module boundaries.

use thiserror::Error;

use crate::gav::GavParseError;
use crate::metadata::filter::FilterParseError;
use crate::version::VersionParseError;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input detected at the point of parsing
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid GAV: {0}")]
    Gav(#[from] GavParseError),

    #[error("Invalid version: {0}")]
    Version(#[from] VersionParseError),

    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterParseError),

    /// Caller passed an argument the operation cannot work with
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Not found: {0}")]
    NotFoundError(String),

    /// Fatal resolution failure (missing mandatory unit, unsatisfiable requirement)
    #[error("Resolution failed: {0}")]
    ResolutionError(String),

    /// Deliberately unsupported operation, e.g. a mutation on a read-only adapter
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Remote access attempted while running offline
    #[error("Cannot access {0} in offline mode")]
    OfflineError(String),

    #[error("Download failed: {0}")]
    DownloadError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Mirroring failed: {0}")]
    MirrorError(String),

    /// The operation was cancelled through its progress monitor
    #[error("Operation cancelled")]
    Cancelled,
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::ParseError(format!("JSON: {e}"))
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::ConfigError(e.to_string())
    }
}

impl Error {
    /// True for the cancellation signal, which callers propagate unchanged
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
