use tracing::{debug, error};

use crate::error::TransferError;
use crate::path::{canonical, decode_path, path_url};
use crate::session::RemoteSession;
use crate::types::RemoteEntry;

/// Lists the contents of a remote directory
///
/// # Arguments
///
/// * `session` - Session for the endpoint to browse
/// * `raw_path` - Directory path as supplied by the caller, plain or
///   percent-encoded; normalized here
///
/// # Returns
///
/// The directory's entries sorted by name. The directory itself is never
/// part of the result, even when the server reports it.
///
/// # Errors
///
/// Returns [`TransferError::DirectoryRead`] if the listing fails, including
/// when the directory does not exist, and [`TransferError::UrlEncoding`] if
/// the session's base URL is unusable.
pub async fn list_directory(
    session: &dyn RemoteSession,
    raw_path: &str,
) -> Result<Vec<RemoteEntry>, TransferError> {
    list_path(session, &decode_path(raw_path)).await
}

/// Lists `path`, a canonical path of exact remote names
pub(crate) async fn list_path(
    session: &dyn RemoteSession,
    path: &str,
) -> Result<Vec<RemoteEntry>, TransferError> {
    let url = path_url(session.base_url(), path)?;
    debug!("Listing {:?}", url);

    let listing = session.list(&url).await.map_err(|e| {
        error!("Failed to list {:?}: {:#}", url, e);
        TransferError::directory_read(display_path(path), &e)
    })?;

    let mut entries: Vec<RemoteEntry> = listing
        .into_iter()
        .filter(|entry| canonical(&entry.path) != path)
        .collect();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

pub(crate) fn display_path(path: &str) -> &str {
    if path.is_empty() { "/" } else { path }
}
