// src/error.rs

use thiserror::Error;

/// Core error types for rsdnf
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Initialization error
    #[error("Failed to initialize: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Configuration file does not exist
    #[error("Configuration file \"{0}\" not found")]
    MissingConfig(String),

    /// Configuration file exists but cannot be read
    #[error("Cannot read configuration file \"{path}\": {reason}")]
    InaccessibleConfig { path: String, reason: String },

    /// Malformed configuration file
    #[error("{path}:{line}: {message}")]
    ConfigParse {
        path: String,
        line: usize,
        message: String,
    },

    /// Invalid value for a configuration option
    #[error("Invalid value \"{value}\" for option \"{option}\"")]
    InvalidOptionValue { option: String, value: String },

    /// Write to an option that was locked after setup
    #[error("Option is locked: {0}")]
    OptionLocked(String),

    /// Option name not known to the configuration
    #[error("Unknown configuration option \"{0}\"")]
    UnknownOption(String),

    /// Command-line usage error not caught by the argument parser
    #[error("{0}")]
    ArgumentParser(String),

    /// A repository with the same id is already configured
    #[error("Repository \"{0}\" already exists")]
    RepoIdAlreadyExists(String),

    /// Repository lookup failure
    #[error("Repository \"{0}\" not found")]
    RepoNotFound(String),

    /// Network or file fetch failure
    #[error("Download error: {0}")]
    DownloadError(String),

    /// Metadata checksum mismatch
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Metadata or package parse failure
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Lookup failure for packages, groups or history entries
    #[error("{0}")]
    NotFoundError(String),

    /// Goal resolution problems
    #[error("Failed to resolve the transaction:\n{}", .0.join("\n"))]
    Resolve(Vec<String>),
}

/// Result type alias using rsdnf's Error type
pub type Result<T> = std::result::Result<T, Error>;
