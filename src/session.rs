use anyhow::{Context, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use reqwest::{Client, Method, StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::TransferError;
use crate::path::{basename, canonical, percent_decode};
use crate::propfind::{PROPFIND_BODY, parse_multistatus};
use crate::types::{EndpointConfig, RemoteEntry};

/// Stream of file content chunks moving between two sessions
pub type ByteStream = BoxStream<'static, Result<Bytes, anyhow::Error>>;

/// A short-lived connection context to one remote endpoint
///
/// Every method takes a fully encoded URL under [`RemoteSession::base_url`].
/// A session belongs to exactly one orchestration call and must be closed
/// once that call finishes, whatever its outcome.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Base URL every request URL is built from
    fn base_url(&self) -> &str;

    /// Lists a collection. The collection itself may appear in the result.
    async fn list(&self, url: &str) -> Result<Vec<RemoteEntry>, anyhow::Error>;

    async fn exists(&self, url: &str) -> Result<bool, anyhow::Error>;

    async fn mkdir(&self, url: &str) -> Result<(), anyhow::Error>;

    /// Opens a read stream over a remote file
    async fn get(&self, url: &str) -> Result<ByteStream, anyhow::Error>;

    /// Writes a remote file from `body`, consuming the stream
    async fn put(&self, url: &str, body: ByteStream) -> Result<(), anyhow::Error>;

    /// Releases the underlying connection resources
    async fn close(&mut self) -> Result<(), anyhow::Error>;
}

/// Factory for sessions against a configured endpoint
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn open(&self, endpoint: &EndpointConfig)
    -> Result<Box<dyn RemoteSession>, TransferError>;
}

/// Opens [`WebDavSession`]s over HTTP(S)
#[derive(Debug, Clone)]
pub struct WebDavConnector {
    request_timeout: Duration,
}

impl WebDavConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

#[async_trait]
impl SessionConnector for WebDavConnector {
    async fn open(
        &self,
        endpoint: &EndpointConfig,
    ) -> Result<Box<dyn RemoteSession>, TransferError> {
        let session = WebDavSession::connect(endpoint, self.request_timeout)?;
        Ok(Box::new(session))
    }
}

/// WebDAV session backed by a dedicated HTTP client
pub struct WebDavSession {
    client: Option<Client>,
    base_url: String,
    /// Decoded, canonical path component of the base URL
    base_path: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for WebDavSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavSession")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("closed", &self.client.is_none())
            .finish()
    }
}

impl WebDavSession {
    /// Creates a session for `endpoint`
    ///
    /// # Errors
    ///
    /// Returns [`TransferError::UrlEncoding`] if the base URL does not parse
    /// and [`TransferError::Connection`] if the HTTP client cannot be built.
    pub fn connect(
        endpoint: &EndpointConfig,
        request_timeout: Duration,
    ) -> Result<Self, TransferError> {
        let base_url = endpoint.base_url.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url).map_err(|e| TransferError::UrlEncoding {
            input: endpoint.base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(TransferError::Connection {
                endpoint: base_url,
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransferError::Connection {
                endpoint: base_url.clone(),
                reason: e.to_string(),
            })?;

        info!("Opened WebDAV session for {:?} as {:?}", base_url, endpoint.username);
        Ok(Self {
            client: Some(client),
            base_path: canonical(&percent_decode(parsed.path())),
            base_url,
            username: endpoint.username.clone(),
            password: endpoint.password.clone(),
        })
    }

    fn client(&self) -> Result<&Client, anyhow::Error> {
        self.client
            .as_ref()
            .ok_or_else(|| anyhow!("WebDAV session for {} is already closed", self.base_url))
    }

    fn request(&self, method: Method, url: &str) -> Result<reqwest::RequestBuilder, anyhow::Error> {
        Ok(self
            .client()?
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password)))
    }

    fn propfind_method() -> Result<Method, anyhow::Error> {
        Method::from_bytes(b"PROPFIND").context("invalid method")
    }

    /// Maps an href from a multistatus body to a path relative to the base URL.
    /// Names are kept exactly as the server reports them.
    fn href_to_path(&self, request_url: &Url, href: &str) -> String {
        let absolute = request_url
            .join(href)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| href.to_string());
        let decoded = canonical(&percent_decode(&absolute));
        match decoded.strip_prefix(&self.base_path) {
            Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.to_string(),
            _ => decoded,
        }
    }
}

#[async_trait]
impl RemoteSession for WebDavSession {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list(&self, url: &str) -> Result<Vec<RemoteEntry>, anyhow::Error> {
        debug!("PROPFIND {}", url);
        let request_url = Url::parse(url).with_context(|| format!("invalid URL {url}"))?;
        let response = self
            .request(Self::propfind_method()?, url)?
            .header("Depth", "1")
            .header("Content-Type", "application/xml")
            .body(PROPFIND_BODY)
            .send()
            .await
            .with_context(|| format!("PROPFIND {url} failed"))?;

        let status = response.status();
        if status != StatusCode::MULTI_STATUS {
            return Err(anyhow!("PROPFIND {url} returned {status}"));
        }
        let body = response.text().await.context("failed to read PROPFIND body")?;

        let entries = parse_multistatus(&body)?
            .into_iter()
            .map(|raw| {
                let path = self.href_to_path(&request_url, &raw.href);
                let name = match basename(&path) {
                    "" => raw.display_name.clone().unwrap_or_default(),
                    name => name.to_string(),
                };
                RemoteEntry {
                    name,
                    path,
                    size: raw.content_length.unwrap_or(0),
                    is_directory: raw.is_collection,
                    last_modified: raw.last_modified,
                }
            })
            .collect();
        Ok(entries)
    }

    async fn exists(&self, url: &str) -> Result<bool, anyhow::Error> {
        let response = self
            .request(Self::propfind_method()?, url)?
            .header("Depth", "0")
            .header("Content-Type", "application/xml")
            .body(PROPFIND_BODY)
            .send()
            .await
            .with_context(|| format!("PROPFIND {url} failed"))?;

        match response.status() {
            StatusCode::MULTI_STATUS | StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(anyhow!("existence check on {url} returned {status}")),
        }
    }

    async fn mkdir(&self, url: &str) -> Result<(), anyhow::Error> {
        debug!("MKCOL {}", url);
        let method = Method::from_bytes(b"MKCOL").context("invalid method")?;
        let response = self
            .request(method, url)?
            .send()
            .await
            .with_context(|| format!("MKCOL {url} failed"))?;

        match response.status() {
            StatusCode::CREATED | StatusCode::OK => Ok(()),
            status => Err(anyhow!("MKCOL {url} returned {status}")),
        }
    }

    async fn get(&self, url: &str) -> Result<ByteStream, anyhow::Error> {
        debug!("GET {}", url);
        let response = self
            .request(Method::GET, url)?
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("GET {url} returned {status}"));
        }
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(anyhow::Error::from))
            .boxed())
    }

    async fn put(&self, url: &str, body: ByteStream) -> Result<(), anyhow::Error> {
        debug!("PUT {}", url);
        let response = self
            .request(Method::PUT, url)?
            .body(reqwest::Body::wrap_stream(body))
            .send()
            .await
            .with_context(|| format!("PUT {url} failed"))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(anyhow!("PUT {url} returned {status}"))
        }
    }

    async fn close(&mut self) -> Result<(), anyhow::Error> {
        match self.client.take() {
            Some(client) => {
                drop(client);
                debug!("Closed WebDAV session for {:?}", self.base_url);
                Ok(())
            }
            None => {
                warn!("WebDAV session for {:?} was already closed", self.base_url);
                Err(anyhow!("WebDAV session already closed"))
            }
        }
    }
}
