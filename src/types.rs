use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default per-request timeout applied by the HTTP transport
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Default cap on directory nesting during a recursive walk
pub const DEFAULT_MAX_WALK_DEPTH: usize = 64;

/// One item returned by a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub name: String,
    /// Normalized path relative to the endpoint base URL
    pub path: String,
    pub size: u64,
    pub is_directory: bool,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One node discovered during a recursive walk
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderItem {
    pub file_name: String,
    /// Path below the walk root, without a leading slash (`sub/b.txt`)
    pub relative_path: String,
    /// Normalized source path (`/docs/sub/b.txt`)
    pub full_path: String,
    pub is_directory: bool,
}

/// The two endpoints the engine moves data between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Source filesystem
    Cloud,
    /// Destination filesystem
    Nas,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Cloud => f.write_str("cloud"),
            Endpoint::Nas => f.write_str("nas"),
        }
    }
}

/// Result of moving a single file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "camelCase")]
pub enum TransferStatus {
    Transferred,
    /// The destination already existed and overwrite was off; the source was not read
    SkippedExists,
    Failed(String),
}

/// Per-item outcome, keyed by a relative or full path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub item: String,
    pub status: TransferStatus,
}

impl TransferOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, TransferStatus::Transferred)
    }
}

/// Aggregate result of a multi-file or folder transfer
///
/// `failed_files` lists every file that was not transferred, including files
/// skipped because they already existed. `skipped_files` lists only the
/// latter so callers can tell the two apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResult {
    total_count: usize,
    success_count: usize,
    failed_files: Vec<String>,
    skipped_files: Vec<String>,
    outcomes: Vec<TransferOutcome>,
}

impl TransferResult {
    pub(crate) fn from_outcomes(outcomes: Vec<TransferOutcome>) -> Self {
        let mut success_count = 0;
        let mut failed_files = Vec::new();
        let mut skipped_files = Vec::new();

        for outcome in &outcomes {
            match &outcome.status {
                TransferStatus::Transferred => success_count += 1,
                TransferStatus::SkippedExists => {
                    skipped_files.push(outcome.item.clone());
                    failed_files.push(outcome.item.clone());
                }
                TransferStatus::Failed(_) => failed_files.push(outcome.item.clone()),
            }
        }

        Self {
            total_count: outcomes.len(),
            success_count,
            failed_files,
            skipped_files,
            outcomes,
        }
    }

    /// Number of files considered; directories are not counted
    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn success_count(&self) -> usize {
        self.success_count
    }

    pub fn failed_files(&self) -> &[String] {
        &self.failed_files
    }

    pub fn skipped_files(&self) -> &[String] {
        &self.skipped_files
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped_files.len()
    }

    pub fn outcomes(&self) -> &[TransferOutcome] {
        &self.outcomes
    }

    pub fn is_all_success(&self) -> bool {
        self.success_count == self.total_count
    }
}

/// Location and credentials of one WebDAV endpoint
#[derive(Clone, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

impl EndpointConfig {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for EndpointConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Configuration for a [`crate::TransferClient`]
#[derive(Debug, Clone, Deserialize)]
pub struct TransferClientConfig {
    pub cloud: EndpointConfig,
    pub nas: EndpointConfig,
    /// Timeout applied to every HTTP request, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Deepest directory level a folder walk may descend to
    #[serde(default = "default_max_walk_depth")]
    pub max_walk_depth: usize,
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_walk_depth() -> usize {
    DEFAULT_MAX_WALK_DEPTH
}

impl TransferClientConfig {
    /// Creates a configuration with default timeout and walk depth
    pub fn new(cloud: EndpointConfig, nas: EndpointConfig) -> Self {
        Self {
            cloud,
            nas,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_walk_depth: DEFAULT_MAX_WALK_DEPTH,
        }
    }

    /// Parses a JSON document such as
    /// `{"cloud": {...}, "nas": {...}, "request_timeout_secs": 30}`
    pub fn from_json(json: &str) -> Result<Self, anyhow::Error> {
        serde_json::from_str(json).context("invalid transfer client configuration")
    }

    /// Reads the configuration from `WEBDAV_*` environment variables
    pub fn from_env() -> Result<Self, anyhow::Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup using the same
    /// keys as [`TransferClientConfig::from_env`]
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} is not set"));

        let cloud = EndpointConfig::new(
            required("WEBDAV_CLOUD_URL")?,
            required("WEBDAV_CLOUD_USERNAME")?,
            required("WEBDAV_CLOUD_PASSWORD")?,
        );
        let nas = EndpointConfig::new(
            required("WEBDAV_NAS_URL")?,
            required("WEBDAV_NAS_USERNAME")?,
            required("WEBDAV_NAS_PASSWORD")?,
        );

        let mut config = Self::new(cloud, nas);
        if let Some(raw) = lookup("WEBDAV_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid WEBDAV_REQUEST_TIMEOUT_SECS: {raw:?}"))?;
        }
        if let Some(raw) = lookup("WEBDAV_MAX_WALK_DEPTH") {
            config.max_walk_depth = raw
                .trim()
                .parse()
                .with_context(|| format!("invalid WEBDAV_MAX_WALK_DEPTH: {raw:?}"))?;
        }
        Ok(config)
    }

    pub fn endpoint(&self, endpoint: Endpoint) -> &EndpointConfig {
        match endpoint {
            Endpoint::Cloud => &self.cloud,
            Endpoint::Nas => &self.nas,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Internal configuration wrapper with Arc for shared ownership
#[derive(Debug, Clone)]
pub(crate) struct TransferClientConfigArc {
    pub(crate) inner: Arc<TransferClientConfig>,
}

impl From<TransferClientConfig> for TransferClientConfigArc {
    fn from(config: TransferClientConfig) -> Self {
        Self {
            inner: Arc::new(config),
        }
    }
}

impl std::ops::Deref for TransferClientConfigArc {
    type Target = TransferClientConfig;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
