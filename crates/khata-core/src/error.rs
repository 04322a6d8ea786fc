use std::path::PathBuf;
use thiserror::Error;

/// Failures of the persistence collaborator.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("cannot access ledger file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The persisted document exists but cannot be parsed. The in-memory state
    /// can no longer be trusted, so callers should stop the session.
    #[error("ledger file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot encode ledger: {0}")]
    Encode(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StoreError::Corrupt { .. })
    }
}

/// Errors surfaced by ledger operations.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("no customer named {0:?}")]
    NotFound(String),
    #[error("customer name is empty")]
    EmptyName,
    #[error("paid amount cannot be negative: {0}")]
    NegativePayment(crate::money::Money),
    /// Only [`crate::dues::clear_due`] may write settlement entries.
    #[error("{0:?} is reserved for due clearances")]
    ReservedDescription(String),
    /// The mutation is applied in memory but the flush failed.
    #[error("ledger not saved: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;
