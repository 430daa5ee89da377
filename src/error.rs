//! Error types for the synchronization engine

use thiserror::Error;

/// Errors surfaced by listing and transfer operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// A remote listing failed. Fatal to the walk that issued it.
    #[error("Failed to read directory {path}: {reason}")]
    DirectoryRead { path: String, reason: String },

    /// A destination directory could not be created. Fatal to the folder transfer.
    #[error("Failed to create directory {path}: {reason}")]
    DirectoryCreate { path: String, reason: String },

    /// A single file could not be read or written.
    #[error("File transfer failed for {path}: {reason}")]
    FileTransfer { path: String, reason: String },

    #[error("Failed to build URL for {input}: {reason}")]
    UrlEncoding { input: String, reason: String },

    #[error("Connection to {endpoint} failed: {reason}")]
    Connection { endpoint: String, reason: String },
}

impl TransferError {
    pub(crate) fn directory_read(path: &str, err: &anyhow::Error) -> Self {
        TransferError::DirectoryRead {
            path: path.to_string(),
            reason: format!("{err:#}"),
        }
    }

    pub(crate) fn directory_create(path: &str, err: &anyhow::Error) -> Self {
        TransferError::DirectoryCreate {
            path: path.to_string(),
            reason: format!("{err:#}"),
        }
    }
}
