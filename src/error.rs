//! Global error handling for treesnap
//!
//! Only fatal conditions travel through this type. Per-node walk problems,
//! hashing failures and per-entry extraction failures are logged and recorded
//! where they happen instead.

use std::io;
use thiserror::Error;

/// Global error type for treesnap operations
#[derive(Error, Debug)]
pub enum TreeSnapError {
    /// File system errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON processing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed glob pattern
    #[error("Invalid pattern: {0}")]
    Pattern(String),

    /// Walk errors that cannot be skipped (root unreadable, unrelated I/O failure)
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Malformed snapshot input
    #[error("Invalid snapshot: {0}")]
    Snapshot(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(String),

    /// Unexpected error
    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

/// Specialized Result type for treesnap operations
pub type Result<T> = std::result::Result<T, TreeSnapError>;

/// Creates a TreeSnapError with a formatted message
#[macro_export]
macro_rules! error {
    ($error_type:ident, $($arg:tt)*) => {
        $crate::error::TreeSnapError::$error_type(format!($($arg)*))
    };
}

/// Returns an error result with a formatted message
#[macro_export]
macro_rules! bail {
    ($error_type:ident, $($arg:tt)*) => {
        return Err($crate::error!($error_type, $($arg)*))
    };
}

/// Ensures a condition is true, otherwise returns an error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $error_type:ident, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($error_type, $($arg)*)
        }
    };
}

/// Extension trait for adding context to errors
pub trait ResultExt<T, E> {
    /// Add additional context to an error
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E: std::error::Error + 'static> ResultExt<T, E> for std::result::Result<T, E> {
    fn with_context<C, F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        self.map_err(|e| {
            let context = f();
            TreeSnapError::Unexpected(format!("{}: {}", context, e))
        })
    }
}
