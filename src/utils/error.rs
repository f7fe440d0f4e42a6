//! Unified Error Handling System
//!
//! Centralized error types for the DCS registry, the configuration loader and
//! the command dispatch client. Most of these never escape the crate boundary:
//! loader errors are logged and the offending branch skipped, and dispatch
//! errors are folded into a result code.

use std::path::PathBuf;
use thiserror::Error;

/// Enumeration of all error types in the crate
#[derive(Error, Debug)]
pub enum DcsError {
    /// Malformed configuration document
    #[error("Config parse error [{path}]: {message}")]
    ConfigParse { path: PathBuf, message: String },

    /// A non-optional include could not be located
    #[error("Include file not found: {file} (from {parent})")]
    IncludeNotFound { file: String, parent: PathBuf },

    /// An include refers back to a file that is still being loaded
    #[error("Recursive include of {0}")]
    IncludeCycle(PathBuf),

    /// Invalid arguments error
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Dispatch host name could not be resolved
    #[error("Unknown host: {0}")]
    UnknownHost(String),

    /// Connection, read, or write failure on the dispatch channel
    #[error("Transmit failure: {0}")]
    Transmit(String),

    /// System I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Data parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Resource not found error
    #[error("Resource not found: {0}")]
    NotFound(String),
}

impl From<std::num::ParseIntError> for DcsError {
    fn from(error: std::num::ParseIntError) -> Self {
        DcsError::ParseError(error.to_string())
    }
}

impl From<serde_json::Error> for DcsError {
    fn from(error: serde_json::Error) -> Self {
        DcsError::ParseError(error.to_string())
    }
}

impl From<std::net::AddrParseError> for DcsError {
    fn from(error: std::net::AddrParseError) -> Self {
        DcsError::ParseError(error.to_string())
    }
}

impl From<toml::de::Error> for DcsError {
    fn from(error: toml::de::Error) -> Self {
        DcsError::ParseError(error.to_string())
    }
}

/// Standardized result type for the entire crate
pub type Result<T> = std::result::Result<T, DcsError>;
