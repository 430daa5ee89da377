//! Recursive folder synchronization between two WebDAV endpoints.
//!
//! Files and directory trees are copied from a source endpoint (the
//! "cloud") to a destination endpoint (the "NAS"). [`TransferClient`] is
//! the entry point; the engine functions it is built from are exported for
//! callers that manage their own sessions.

// Module declarations
mod client;
mod error;
mod operations;
pub mod path;
mod propfind;
mod session;
mod types;

// Public API exports
pub use client::TransferClient;
pub use error::TransferError;
pub use operations::list::list_directory;
pub use operations::transfer::{transfer_file, transfer_folder, transfer_many};
pub use operations::walk::walk;
pub use session::{ByteStream, RemoteSession, SessionConnector, WebDavConnector, WebDavSession};
pub use types::{
    DEFAULT_MAX_WALK_DEPTH, DEFAULT_REQUEST_TIMEOUT_SECS, Endpoint, EndpointConfig, FolderItem,
    RemoteEntry, TransferClientConfig, TransferOutcome, TransferResult, TransferStatus,
};

// Re-export commonly used external types for convenience
pub use async_trait::async_trait;
pub use bytes::Bytes;
