/// Module for listing a single remote directory
pub(crate) mod list;

/// Module for transferring files and folders between endpoints
pub(crate) mod transfer;

/// Module for recursively discovering a remote subtree
pub(crate) mod walk;
