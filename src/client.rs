use std::sync::Arc;
use tracing::{info, warn};

use crate::error::TransferError;
use crate::operations::{list, transfer};
use crate::session::{RemoteSession, SessionConnector, WebDavConnector};
use crate::types::{
    Endpoint, RemoteEntry, TransferClientConfig, TransferClientConfigArc, TransferResult,
    TransferStatus,
};

/// Client for browsing endpoints and moving data from the cloud to the NAS
///
/// Every call opens its own pair of sessions and closes them before it
/// returns, so one client can serve many concurrent calls.
#[derive(Clone)]
pub struct TransferClient {
    pub(crate) config: TransferClientConfigArc,
    pub(crate) connector: Arc<dyn SessionConnector>,
}

impl std::fmt::Debug for TransferClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferClient")
            .field("config", &*self.config)
            .finish_non_exhaustive()
    }
}

impl TransferClient {
    /// Creates a client that talks WebDAV over HTTP(S)
    ///
    /// # Example
    ///
    /// ```ignore
    /// let client = TransferClient::new(TransferClientConfig::from_env()?);
    /// let result = client.transfer_folder("/docs", "/backup", false).await?;
    /// ```
    pub fn new(config: TransferClientConfig) -> Self {
        let connector = WebDavConnector::new(config.request_timeout());
        Self::with_connector(config, Arc::new(connector))
    }

    /// Creates a client that opens sessions through `connector`
    pub fn with_connector(config: TransferClientConfig, connector: Arc<dyn SessionConnector>) -> Self {
        Self {
            config: config.into(),
            connector,
        }
    }

    pub fn config(&self) -> &TransferClientConfig {
        &self.config
    }

    /// Lists a directory on either endpoint
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Which endpoint to browse
    /// * `raw_path` - Directory path; normalized before use
    ///
    /// # Returns
    ///
    /// The directory's entries, sorted by name, without the directory itself
    pub async fn list_entries(
        &self,
        endpoint: Endpoint,
        raw_path: &str,
    ) -> Result<Vec<RemoteEntry>, TransferError> {
        let session = self.open(endpoint).await?;
        let result = list::list_directory(session.as_ref(), raw_path).await;
        release(endpoint, session).await;
        result
    }

    /// Copies a single file from the cloud into `destination_dir` on the NAS
    ///
    /// # Returns
    ///
    /// `Ok(true)` when the file was copied, `Ok(false)` when it was skipped
    /// because the destination exists and `overwrite` is off.
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::FileTransfer`] if reading or writing failed,
    /// or a connection error if a session could not be opened.
    pub async fn transfer_single(
        &self,
        source_path: &str,
        destination_dir: &str,
        overwrite: bool,
    ) -> Result<bool, TransferError> {
        let (source, destination) = self.open_pair().await?;
        let outcome = transfer::transfer_file(
            source.as_ref(),
            destination.as_ref(),
            source_path,
            destination_dir,
            overwrite,
        )
        .await;
        release_pair(source, destination).await;

        match outcome.status {
            TransferStatus::Transferred => Ok(true),
            TransferStatus::SkippedExists => Ok(false),
            TransferStatus::Failed(reason) => Err(TransferError::FileTransfer {
                path: outcome.item,
                reason,
            }),
        }
    }

    /// Copies several cloud files into `destination_dir` on the NAS
    ///
    /// Individual failures are reported in the result, never as errors.
    pub async fn transfer_multiple(
        &self,
        source_paths: &[String],
        destination_dir: &str,
        overwrite: bool,
    ) -> Result<TransferResult, TransferError> {
        if source_paths.is_empty() {
            return Ok(TransferResult::from_outcomes(Vec::new()));
        }

        let entries: Vec<(String, String)> = source_paths
            .iter()
            .map(|path| (path.clone(), destination_dir.to_string()))
            .collect();

        info!(
            "Transferring {} files into {:?}",
            entries.len(),
            destination_dir
        );
        let (source, destination) = self.open_pair().await?;
        let result =
            transfer::transfer_many(source.as_ref(), destination.as_ref(), &entries, overwrite)
                .await;
        release_pair(source, destination).await;
        Ok(result)
    }

    /// Recreates the cloud folder `folder_path` inside `destination_dir` on the NAS
    ///
    /// # Errors
    ///
    /// Fails outright if the source tree cannot be fully listed or a
    /// destination directory cannot be created. Per-file failures are
    /// reported in the result.
    pub async fn transfer_folder(
        &self,
        folder_path: &str,
        destination_dir: &str,
        overwrite: bool,
    ) -> Result<TransferResult, TransferError> {
        let (source, destination) = self.open_pair().await?;
        let result = transfer::transfer_folder(
            source.as_ref(),
            destination.as_ref(),
            folder_path,
            destination_dir,
            overwrite,
            self.config.max_walk_depth,
        )
        .await;
        release_pair(source, destination).await;
        result
    }

    async fn open(&self, endpoint: Endpoint) -> Result<Box<dyn RemoteSession>, TransferError> {
        self.connector.open(self.config.endpoint(endpoint)).await
    }

    async fn open_pair(
        &self,
    ) -> Result<(Box<dyn RemoteSession>, Box<dyn RemoteSession>), TransferError> {
        let source = self.open(Endpoint::Cloud).await?;
        match self.open(Endpoint::Nas).await {
            Ok(destination) => Ok((source, destination)),
            Err(e) => {
                release(Endpoint::Cloud, source).await;
                Err(e)
            }
        }
    }
}

async fn release_pair(source: Box<dyn RemoteSession>, destination: Box<dyn RemoteSession>) {
    release(Endpoint::Cloud, source).await;
    release(Endpoint::Nas, destination).await;
}

/// Closes a session; a close failure never masks the operation's result
async fn release(endpoint: Endpoint, mut session: Box<dyn RemoteSession>) {
    if let Err(e) = session.close().await {
        warn!("Failed to close {} session: {:#}", endpoint, e);
    }
}
