//! Error types for the MediPredict core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering configuration, account storage and the clinic directory.

use std::path::PathBuf;

/// Top-level error type for the MediPredict core library.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Account error: {0}")]
    Account(#[from] AccountError),

    #[error("Clinic directory error: {0}")]
    Clinic(#[from] ClinicError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Configuration parse error: {message}")]
    ParseError { message: String },
}

/// Errors from the account store.
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Username already taken: {username}")]
    UsernameTaken { username: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Stored password hash is malformed")]
    MalformedHash,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Account store error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Account store lock poisoned")]
    LockPoisoned,
}

/// Errors from the clinic directory.
#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("Unknown city: {city}")]
    UnknownCity { city: String },

    #[error("Failed to read clinic directory {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse clinic directory: {message}")]
    Parse { message: String },
}

/// A type alias for results using the top-level `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;
