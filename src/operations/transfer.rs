use anyhow::{Context, anyhow};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::TransferError;
use crate::operations::walk::walk_path;
use crate::path::{basename, combine, decode_path, parent, path_url};
use crate::session::RemoteSession;
use crate::types::{TransferOutcome, TransferResult, TransferStatus};

/// Copies one file from `source` into `destination_dir` on `destination`
///
/// The destination file keeps the source file's name. When it already
/// exists and `overwrite` is off the source is never read and the outcome is
/// [`TransferStatus::SkippedExists`]. Transport failures on either side are
/// reported as [`TransferStatus::Failed`]; this function does not return
/// errors. Both paths may be plain or percent-encoded; the outcome is keyed
/// by the resolved source path.
pub async fn transfer_file(
    source: &dyn RemoteSession,
    destination: &dyn RemoteSession,
    source_path: &str,
    destination_dir: &str,
    overwrite: bool,
) -> TransferOutcome {
    transfer_path(
        source,
        destination,
        decode_path(source_path),
        &decode_path(destination_dir),
        overwrite,
    )
    .await
}

/// Copies `source_path` into `destination_dir`, both canonical paths of
/// exact remote names
async fn transfer_path(
    source: &dyn RemoteSession,
    destination: &dyn RemoteSession,
    source_path: String,
    destination_dir: &str,
    overwrite: bool,
) -> TransferOutcome {
    let status = match copy_file(source, destination, &source_path, destination_dir, overwrite)
        .await
    {
        Ok(status) => status,
        Err(e) => {
            error!(
                "Transfer failed [{:?} -> {:?}]: {:#}",
                source_path, destination_dir, e
            );
            TransferStatus::Failed(format!("{e:#}"))
        }
    };

    TransferOutcome {
        item: source_path,
        status,
    }
}

async fn copy_file(
    source: &dyn RemoteSession,
    destination: &dyn RemoteSession,
    source_path: &str,
    destination_dir: &str,
    overwrite: bool,
) -> Result<TransferStatus, anyhow::Error> {
    let file_name = basename(source_path);
    if file_name.is_empty() {
        return Err(anyhow!("source path does not name a file"));
    }

    let target_path = combine(destination_dir, file_name);
    let target_url = path_url(destination.base_url(), &target_path)?;

    if !overwrite
        && destination
            .exists(&target_url)
            .await
            .context("destination existence check failed")?
    {
        warn!(
            "Skipping {:?}: {:?} exists and overwrite is off",
            source_path, target_path
        );
        return Ok(TransferStatus::SkippedExists);
    }

    let source_url = path_url(source.base_url(), source_path)?;
    info!("Transfer started: {:?} -> {:?}", source_url, target_url);
    let transfer_time = Instant::now();

    let body = source
        .get(&source_url)
        .await
        .context("failed to read source file")?;
    destination
        .put(&target_url, body)
        .await
        .context("failed to write destination file")?;

    info!(
        "File {:?} transferred. Time taken {:?}",
        file_name,
        transfer_time.elapsed()
    );
    Ok(TransferStatus::Transferred)
}

/// Copies each `(source_path, destination_dir)` pair in order
///
/// Every item is independent: a failure is recorded in the result and the
/// remaining items still run. Never returns an error.
pub async fn transfer_many(
    source: &dyn RemoteSession,
    destination: &dyn RemoteSession,
    entries: &[(String, String)],
    overwrite: bool,
) -> TransferResult {
    let batch_time = Instant::now();
    let mut outcomes = Vec::with_capacity(entries.len());

    for (source_path, destination_dir) in entries {
        outcomes.push(
            transfer_file(source, destination, source_path, destination_dir, overwrite).await,
        );
    }

    let result = TransferResult::from_outcomes(outcomes);
    info!(
        "Batch transfer finished: {}/{} succeeded. Time taken {:?}",
        result.success_count(),
        result.total_count(),
        batch_time.elapsed()
    );
    result
}

/// Copies the folder at `folder_path` into `destination_dir`
///
/// The folder is recreated under its own name inside `destination_dir`.
/// That top-level folder is ensured first. The source subtree is then
/// walked, every destination directory is created, and only then are files
/// copied, each one independently. Outcomes are keyed by the file's path
/// relative to the copied folder. Directories are not counted in the result
/// totals.
///
/// Because the top-level folder is created before the source is read, a
/// failed walk leaves that folder behind, empty, on the destination.
///
/// # Errors
///
/// * [`TransferError::DirectoryCreate`] if any destination directory cannot
///   be created
/// * [`TransferError::DirectoryRead`] if any part of the source cannot be listed
pub async fn transfer_folder(
    source: &dyn RemoteSession,
    destination: &dyn RemoteSession,
    folder_path: &str,
    destination_dir: &str,
    overwrite: bool,
    max_depth: usize,
) -> Result<TransferResult, TransferError> {
    let folder = decode_path(folder_path);
    let destination_dir = decode_path(destination_dir);
    let folder_time = Instant::now();

    let target_root = match basename(&folder) {
        "" => destination_dir.clone(),
        name => combine(&destination_dir, name),
    };
    info!("Folder transfer started: {:?} -> {:?}", folder, target_root);

    ensure_directory(destination, &target_root).await?;

    let items = walk_path(source, &folder, max_depth).await?;

    for dir in items.iter().filter(|item| item.is_directory) {
        ensure_directory(destination, &combine(&target_root, &dir.relative_path)).await?;
    }

    let mut outcomes = Vec::new();
    for file in items.iter().filter(|item| !item.is_directory) {
        let target_dir = combine(&target_root, parent(&file.relative_path));
        let mut outcome = transfer_path(
            source,
            destination,
            file.full_path.clone(),
            &target_dir,
            overwrite,
        )
        .await;
        outcome.item = file.relative_path.clone();
        outcomes.push(outcome);
    }

    let result = TransferResult::from_outcomes(outcomes);
    info!(
        "Folder {:?} transferred: {}/{} succeeded. Time taken {:?}",
        folder,
        result.success_count(),
        result.total_count(),
        folder_time.elapsed()
    );
    Ok(result)
}

/// Creates `path` on `session` unless it is already there
pub(crate) async fn ensure_directory(
    session: &dyn RemoteSession,
    path: &str,
) -> Result<(), TransferError> {
    if path.is_empty() {
        return Ok(());
    }
    let url = path_url(session.base_url(), path)?;

    match session.exists(&url).await {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(e) => return Err(TransferError::directory_create(path, &e)),
    }

    if let Err(e) = session.mkdir(&url).await {
        // Someone else may have created it in the meantime.
        if matches!(session.exists(&url).await, Ok(true)) {
            return Ok(());
        }
        error!("Failed to create directory {:?}: {:#}", path, e);
        return Err(TransferError::directory_create(path, &e));
    }

    info!("Created directory {:?}", path);
    Ok(())
}
