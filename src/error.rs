//! Error types for ledger_cells

use crate::model::Hash;
use thiserror::Error;

/// Result type alias for ledger_cells operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while encoding, resolving or storing cells
///
/// Broken caller contracts (an unknown set operator code, for instance)
/// are not represented here: they panic.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed bytes at decode time. Never repaired.
    #[error("Format error: {0}")]
    Format(String),

    /// A soft ref's hash could not be resolved from cache or store.
    /// Recoverable by fetching the data elsewhere and retrying.
    #[error("Missing data: {0}")]
    MissingData(Hash),

    /// A constructed value violates a structural invariant
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// A store handed back data that does not match what was asked for
    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid store file: {0}")]
    InvalidFile(String),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn format(msg: impl Into<String>) -> Self {
        Error::Format(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidStructure(msg.into())
    }

    /// True for [`Error::MissingData`]
    pub fn is_missing_data(&self) -> bool {
        matches!(self, Error::MissingData(_))
    }

    /// True for [`Error::Format`]
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }

    /// The unresolved hash, if this is a missing-data error
    pub fn missing_hash(&self) -> Option<Hash> {
        match self {
            Error::MissingData(h) => Some(*h),
            _ => None,
        }
    }
}
