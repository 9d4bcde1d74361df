//! Crate-level errors
//!
//! Storage failures carry the typed [`StorageError`]; input rejected before
//! it reaches the store is a [`Error::Validation`].

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum Error {
    /// The store could not complete the operation
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Caller-supplied input was rejected
    #[error("Invalid input: {0}")]
    Validation(String),
}

impl Error {
    /// Check if retrying the same operation may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(e) => e.is_retryable(),
            Error::Validation(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
