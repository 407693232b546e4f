//! Error types for the Lance library.
//!
//! All fallible operations return [`Result`], whose error type is the
//! [`LanceError`] enum.
//!
//! # Examples
//!
//! ```
//! use lance::error::{LanceError, Result};
//!
//! fn resolve(field: &str) -> Result<()> {
//!     Err(LanceError::no_such_field(field))
//! }
//!
//! match resolve("title") {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! Calling `advance` on a matcher with a target lower than a previous target
//! is a programming error and panics; it has no variant here.

use std::io;

use thiserror::Error;

/// The main error type for Lance operations.
#[derive(Error, Debug)]
pub enum LanceError {
    /// A query or sort specification references a field the schema lacks.
    #[error("No such field: {0}")]
    NoSuchField(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query-related errors (uncompilable or malformed queries).
    #[error("Query error: {0}")]
    Query(String),

    /// Schema-related errors
    #[error("Schema error: {0}")]
    Schema(String),

    /// Index and segment errors
    #[error("Index error: {0}")]
    Index(String),

    /// I/O errors surfaced by a storage backend
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Worker pool construction errors
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),

    /// Errors reported by external collaborators through `anyhow`
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with LanceError.
pub type Result<T> = std::result::Result<T, LanceError>;

impl LanceError {
    /// Create a new no-such-field error.
    pub fn no_such_field<S: Into<String>>(field: S) -> Self {
        LanceError::NoSuchField(field.into())
    }

    /// Create a new configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        LanceError::Config(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        LanceError::Query(msg.into())
    }

    /// Create a new schema error.
    pub fn schema<S: Into<String>>(msg: S) -> Self {
        LanceError::Schema(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        LanceError::Index(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LanceError::Other(msg.into())
    }

    /// Whether this error was detected before any matching started.
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            LanceError::NoSuchField(_) | LanceError::Config(_) | LanceError::Query(_)
        )
    }
}
