//! Storage error handling
//!
//! Typed errors for the persistent store with descriptive messages and
//! recovery suggestions. Every variant is scoped to a single operation: a
//! failure never leaves other rows corrupted.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use super::connection::StoreLocation;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StorageError {
    /// The database could not be opened; the next acquire retries
    ///
    /// Callers that waited on the same failed open all receive the same
    /// underlying error.
    #[error("Store unavailable at {location}: {source}")]
    Unavailable {
        location: StoreLocation,
        #[source]
        source: Arc<rusqlite::Error>,
    },

    /// Failed to create the data directory holding the database
    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Table creation or default seeding failed
    #[error("Failed to initialize schema: {0}")]
    Schema(#[source] rusqlite::Error),

    /// A query failed
    #[error("Failed to {operation}: {source}")]
    Read {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// A write failed; the row is left as it was
    #[error("Failed to {operation}: {source}")]
    Write {
        operation: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    /// Attempted to modify or delete the reserved category
    #[error("Category '{0}' is reserved and cannot be modified or deleted")]
    ProtectedCategory(String),

    /// A previous operation panicked while holding the connection
    #[error("Database connection is poisoned")]
    Poisoned,

    /// The blocking task running a storage operation failed
    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl StorageError {
    pub fn read(operation: &'static str, source: rusqlite::Error) -> Self {
        StorageError::Read { operation, source }
    }

    pub fn write(operation: &'static str, source: rusqlite::Error) -> Self {
        StorageError::Write { operation, source }
    }

    /// Check if retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StorageError::Unavailable { .. }
                | StorageError::CreateDirectory { .. }
                | StorageError::Schema(_)
                | StorageError::Read { .. }
                | StorageError::Write { .. }
                | StorageError::Task(_)
        )
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StorageError::Unavailable { .. } => {
                Some("Check that the data directory exists and is writable, then try again.")
            }
            StorageError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StorageError::Schema(_) => Some("Restart the app to retry initialization."),
            StorageError::Read { .. } | StorageError::Write { .. } => Some("Try again."),
            StorageError::Poisoned => Some("Restart the app."),
            _ => None,
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure() -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_FULL),
            Some("database or disk is full".to_string()),
        )
    }

    #[test]
    fn test_unavailable_is_retryable() {
        let err = StorageError::Unavailable {
            location: StoreLocation::File(PathBuf::from("/missing/hyperhold.db")),
            source: Arc::new(sqlite_failure()),
        };

        assert!(err.is_retryable());
        assert!(err.recovery_suggestion().is_some());
        assert!(err.to_string().contains("/missing/hyperhold.db"));
    }

    #[test]
    fn test_write_error_display() {
        let err = StorageError::write("save link", sqlite_failure());
        let msg = err.to_string();
        assert!(msg.contains("save link"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_protected_category_not_retryable() {
        let err = StorageError::ProtectedCategory("all".to_string());
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("reserved"));
        assert!(err.recovery_suggestion().is_none());
    }
}
