#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

use webdav_sync::path::{basename, canonical, parent, percent_decode};
use webdav_sync::{
    ByteStream, Bytes, EndpointConfig, RemoteEntry, RemoteSession, SessionConnector,
    TransferClient, TransferClientConfig, TransferError,
};

pub const CLOUD_URL: &str = "http://cloud.test/dav";
pub const NAS_URL: &str = "http://nas.test/webdav/";

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

#[derive(Debug, Default)]
struct MemoryFs {
    nodes: BTreeMap<String, Node>,
    calls: Vec<String>,
    fail_list: HashSet<String>,
    fail_exists: HashSet<String>,
    fail_mkdir: HashSet<String>,
    fail_get: HashSet<String>,
    fail_put: HashSet<String>,
    broken_stream: HashSet<String>,
    opens: usize,
    closes: usize,
}

/// In-memory remote filesystem shared by every session opened on it
#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
    inner: Arc<Mutex<MemoryFs>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: &str) -> &Self {
        let mut fs = self.inner.lock().unwrap();
        let mut current = String::new();
        for segment in canonical(path).split('/').filter(|s| !s.is_empty()) {
            current.push('/');
            current.push_str(segment);
            fs.nodes.entry(current.clone()).or_insert(Node::Dir);
        }
        self
    }

    pub fn add_file(&self, path: &str, content: &[u8]) -> &Self {
        let path = canonical(path);
        self.add_dir(parent(&path));
        self.inner
            .lock()
            .unwrap()
            .nodes
            .insert(path, Node::File(content.to_vec()));
        self
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        match self.inner.lock().unwrap().nodes.get(&canonical(path)) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    pub fn is_dir(&self, path: &str) -> bool {
        let path = canonical(path);
        path.is_empty() || matches!(self.inner.lock().unwrap().nodes.get(&path), Some(Node::Dir))
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn calls_starting_with(&self, verb: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(verb))
            .collect()
    }

    pub fn opens(&self) -> usize {
        self.inner.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }

    pub fn fail_list(&self, path: &str) -> &Self {
        self.inner.lock().unwrap().fail_list.insert(canonical(path));
        self
    }

    pub fn fail_exists(&self, path: &str) -> &Self {
        self.inner.lock().unwrap().fail_exists.insert(canonical(path));
        self
    }

    pub fn fail_mkdir(&self, path: &str) -> &Self {
        self.inner.lock().unwrap().fail_mkdir.insert(canonical(path));
        self
    }

    pub fn fail_get(&self, path: &str) -> &Self {
        self.inner.lock().unwrap().fail_get.insert(canonical(path));
        self
    }

    pub fn fail_put(&self, path: &str) -> &Self {
        self.inner.lock().unwrap().fail_put.insert(canonical(path));
        self
    }

    /// The read stream for `path` yields one chunk and then an error
    pub fn break_stream(&self, path: &str) -> &Self {
        self.inner
            .lock()
            .unwrap()
            .broken_stream
            .insert(canonical(path));
        self
    }

    pub fn session(&self, base_url: &str) -> MemorySession {
        self.inner.lock().unwrap().opens += 1;
        MemorySession {
            base_url: base_url.trim_end_matches('/').to_string(),
            remote: self.clone(),
            closed: false,
        }
    }

    fn record(&self, call: String) {
        self.inner.lock().unwrap().calls.push(call);
    }
}

pub struct MemorySession {
    base_url: String,
    remote: MemoryRemote,
    closed: bool,
}

impl MemorySession {
    fn path_of(&self, url: &str) -> Result<String, anyhow::Error> {
        if self.closed {
            return Err(anyhow!("session closed"));
        }
        let rest = url
            .strip_prefix(&self.base_url)
            .ok_or_else(|| anyhow!("{url} is not under {}", self.base_url))?;
        Ok(canonical(&percent_decode(rest)))
    }
}

#[async_trait]
impl RemoteSession for MemorySession {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn list(&self, url: &str) -> Result<Vec<RemoteEntry>, anyhow::Error> {
        let path = self.path_of(url)?;
        self.remote.record(format!("list {path}"));
        let fs = self.remote.inner.lock().unwrap();
        if fs.fail_list.contains(&path) {
            return Err(anyhow!("PROPFIND {url} returned 500 Internal Server Error"));
        }

        let entry = |path: &str, node: &Node| RemoteEntry {
            name: basename(path).to_string(),
            path: path.to_string(),
            size: match node {
                Node::File(content) => content.len() as u64,
                Node::Dir => 0,
            },
            is_directory: matches!(node, Node::Dir),
            last_modified: None,
        };

        let this = if path.is_empty() {
            Node::Dir
        } else {
            fs.nodes
                .get(&path)
                .cloned()
                .ok_or_else(|| anyhow!("PROPFIND {url} returned 404 Not Found"))?
        };

        // Servers report the collection itself first; children come back
        // in reverse order so callers cannot rely on listing order.
        let mut entries = vec![entry(path.as_str(), &this)];
        if matches!(this, Node::Dir) {
            entries.extend(
                fs.nodes
                    .iter()
                    .rev()
                    .filter(|(candidate, _)| parent(candidate) == path)
                    .map(|(candidate, node)| entry(candidate.as_str(), node)),
            );
        }
        Ok(entries)
    }

    async fn exists(&self, url: &str) -> Result<bool, anyhow::Error> {
        let path = self.path_of(url)?;
        self.remote.record(format!("exists {path}"));
        let fs = self.remote.inner.lock().unwrap();
        if fs.fail_exists.contains(&path) {
            return Err(anyhow!("existence check on {url} returned 503"));
        }
        Ok(path.is_empty() || fs.nodes.contains_key(&path))
    }

    async fn mkdir(&self, url: &str) -> Result<(), anyhow::Error> {
        let path = self.path_of(url)?;
        self.remote.record(format!("mkdir {path}"));
        let mut fs = self.remote.inner.lock().unwrap();
        if fs.fail_mkdir.contains(&path) {
            return Err(anyhow!("MKCOL {url} returned 403 Forbidden"));
        }
        if fs.nodes.contains_key(&path) {
            return Err(anyhow!("MKCOL {url} returned 405 Method Not Allowed"));
        }
        let parent_path = parent(&path);
        if !parent_path.is_empty() && !matches!(fs.nodes.get(parent_path), Some(Node::Dir)) {
            return Err(anyhow!("MKCOL {url} returned 409 Conflict"));
        }
        fs.nodes.insert(path, Node::Dir);
        Ok(())
    }

    async fn get(&self, url: &str) -> Result<ByteStream, anyhow::Error> {
        let path = self.path_of(url)?;
        self.remote.record(format!("get {path}"));
        let fs = self.remote.inner.lock().unwrap();
        if fs.fail_get.contains(&path) {
            return Err(anyhow!("GET {url} returned 500 Internal Server Error"));
        }
        let content = match fs.nodes.get(&path) {
            Some(Node::File(content)) => content.clone(),
            _ => return Err(anyhow!("GET {url} returned 404 Not Found")),
        };

        let mut chunks: Vec<Result<Bytes, anyhow::Error>> = content
            .chunks(4)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        if fs.broken_stream.contains(&path) {
            chunks.truncate(1);
            chunks.push(Err(anyhow!("connection reset while reading {url}")));
        }
        Ok(stream::iter(chunks).boxed())
    }

    async fn put(&self, url: &str, mut body: ByteStream) -> Result<(), anyhow::Error> {
        let path = self.path_of(url)?;
        self.remote.record(format!("put {path}"));
        {
            let fs = self.remote.inner.lock().unwrap();
            if fs.fail_put.contains(&path) {
                return Err(anyhow!("PUT {url} returned 507 Insufficient Storage"));
            }
            if !matches!(fs.nodes.get(parent(&path)), Some(Node::Dir)) && !parent(&path).is_empty()
            {
                return Err(anyhow!("PUT {url} returned 409 Conflict"));
            }
        }

        let mut content = Vec::new();
        while let Some(chunk) = body.next().await {
            content.extend_from_slice(&chunk?);
        }

        self.remote
            .inner
            .lock()
            .unwrap()
            .nodes
            .insert(path, Node::File(content));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), anyhow::Error> {
        if self.closed {
            return Err(anyhow!("session closed twice"));
        }
        self.closed = true;
        self.remote.inner.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Opens memory sessions on the cloud or NAS remote by base URL
pub struct MemoryConnector {
    pub cloud: MemoryRemote,
    pub nas: MemoryRemote,
    pub refuse_nas: bool,
}

#[async_trait]
impl SessionConnector for MemoryConnector {
    async fn open(
        &self,
        endpoint: &EndpointConfig,
    ) -> Result<Box<dyn RemoteSession>, TransferError> {
        if endpoint.base_url == CLOUD_URL {
            Ok(Box::new(self.cloud.session(&endpoint.base_url)))
        } else if endpoint.base_url == NAS_URL && !self.refuse_nas {
            Ok(Box::new(self.nas.session(&endpoint.base_url)))
        } else {
            Err(TransferError::Connection {
                endpoint: endpoint.base_url.clone(),
                reason: "connection refused".to_string(),
            })
        }
    }
}

pub fn config() -> TransferClientConfig {
    TransferClientConfig::new(
        EndpointConfig::new(CLOUD_URL, "cloud-user", "cloud-pass"),
        EndpointConfig::new(NAS_URL, "nas-user", "nas-pass"),
    )
}

pub fn client(cloud: &MemoryRemote, nas: &MemoryRemote) -> TransferClient {
    TransferClient::with_connector(
        config(),
        Arc::new(MemoryConnector {
            cloud: cloud.clone(),
            nas: nas.clone(),
            refuse_nas: false,
        }),
    )
}

/// Cloud tree with `/docs/a.txt` (10 bytes) and `/docs/sub/b.txt` (5 bytes)
pub fn docs_tree() -> MemoryRemote {
    let cloud = MemoryRemote::new();
    cloud.add_file("/docs/a.txt", b"0123456789");
    cloud.add_file("/docs/sub/b.txt", b"hello");
    cloud
}

/// NAS with an empty `/backup` directory
pub fn empty_backup() -> MemoryRemote {
    let nas = MemoryRemote::new();
    nas.add_dir("/backup");
    nas
}
