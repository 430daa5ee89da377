use std::time::Instant;
use tracing::{debug, info};

use crate::error::TransferError;
use crate::operations::list::{display_path, list_path};
use crate::path::{combine, decode_path};
use crate::session::RemoteSession;
use crate::types::{FolderItem, RemoteEntry};

/// Recursively enumerates the subtree below `root_path`
///
/// `root_path` may be plain or percent-encoded. Item paths hold the exact
/// names reported by the listings.
///
/// Items come back in pre-order: a directory always precedes everything
/// beneath it, and siblings are ordered by name. The root itself is not
/// included. Traversal uses an explicit stack. Listing a directory whose
/// children would sit more than `max_depth` levels below the root fails
/// the walk.
///
/// # Errors
///
/// Any listing failure, at any depth, fails the whole walk with
/// [`TransferError::DirectoryRead`] naming the directory that could not be
/// read. No partial result is returned.
pub async fn walk(
    session: &dyn RemoteSession,
    root_path: &str,
    max_depth: usize,
) -> Result<Vec<FolderItem>, TransferError> {
    walk_path(session, &decode_path(root_path), max_depth).await
}

/// Walks below `root`, a canonical path of exact remote names
pub(crate) async fn walk_path(
    session: &dyn RemoteSession,
    root: &str,
    max_depth: usize,
) -> Result<Vec<FolderItem>, TransferError> {
    let walk_time = Instant::now();
    check_depth(root, 0, max_depth)?;

    let mut items = Vec::new();
    let mut stack: Vec<(FolderItem, usize)> = Vec::new();
    push_children(&mut stack, list_path(session, root).await?, root, "", 1);

    while let Some((item, depth)) = stack.pop() {
        if item.is_directory {
            check_depth(&item.full_path, depth, max_depth)?;
            debug!("Descending into {:?}", item.full_path);
            let children = list_path(session, &item.full_path).await?;
            push_children(
                &mut stack,
                children,
                &item.full_path,
                &item.relative_path,
                depth + 1,
            );
        }
        items.push(item);
    }

    info!(
        "Walked {:?}: {} items. Time taken {:?}",
        display_path(root),
        items.len(),
        walk_time.elapsed()
    );
    Ok(items)
}

/// A directory at `depth` may only be listed if its children stay within the cap
fn check_depth(path: &str, depth: usize, max_depth: usize) -> Result<(), TransferError> {
    if depth >= max_depth {
        return Err(TransferError::DirectoryRead {
            path: display_path(path).to_string(),
            reason: format!("exceeds maximum walk depth of {max_depth}"),
        });
    }
    Ok(())
}

// Pushed in reverse so the smallest name is popped first.
fn push_children(
    stack: &mut Vec<(FolderItem, usize)>,
    entries: Vec<RemoteEntry>,
    parent_full: &str,
    parent_relative: &str,
    depth: usize,
) {
    for entry in entries.into_iter().rev() {
        let relative_path = if parent_relative.is_empty() {
            entry.name.clone()
        } else {
            format!("{parent_relative}/{}", entry.name)
        };
        stack.push((
            FolderItem {
                full_path: combine(parent_full, &entry.name),
                file_name: entry.name,
                relative_path,
                is_directory: entry.is_directory,
            },
            depth,
        ));
    }
}
