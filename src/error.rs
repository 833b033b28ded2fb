// Error taxonomy for store operations

use crate::key::Key;

/// Errors surfaced by store operations
///
/// Errors are cloneable so a failed open can be handed to every caller that
/// awaited it. A missing record is not an error: `get` returns `Ok(None)`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    /// The database could not be opened or upgraded
    #[error("failed to open database: {0}")]
    Connection(String),

    /// `add` was called with an id that is already stored
    #[error("a record with id {0} already exists")]
    DuplicateKey(Key),

    /// A read or write transaction aborted
    #[error("transaction aborted: {0}")]
    Transaction(String),

    /// The value is not plain data or carries no usable id
    #[error("value cannot be stored: {0}")]
    Normalize(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl StoreError {
    pub(crate) fn connection(err: impl std::fmt::Display) -> Self {
        StoreError::Connection(err.to_string())
    }

    pub(crate) fn transaction(err: impl std::fmt::Display) -> Self {
        StoreError::Transaction(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
