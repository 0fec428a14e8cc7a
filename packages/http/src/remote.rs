//! Read-through store over HTTP.
//!
//! ## Protocol
//!
//! - `read(path)` → `GET {base}/{path}` → raw response body
//! - `metadata(path)` → `HEAD {base}/{path}`
//!
//! Anything that would modify the origin fails with `VfsError::ReadOnly`.
//!
//! ## Example
//!
//! ```ignore
//! use gitsalt_http::RemoteFs;
//! use gitsalt_vfs::{FileSystem, vpath};
//!
//! let mut store = RemoteFs::new("https://git.example.com/repos/", Duration::from_secs(30))?;
//! let head = store.read(&vpath!("/project.git/HEAD"))?;
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use bytes::Bytes;
use url::Url;

use gitsalt_vfs::{DirEntry, EntryKind, FileSystem, VfsError, VfsPath};

use crate::executor::{HttpExecutor, ReqwestExecutor};
use crate::types::{HttpRequest, HttpResponse};
use crate::Error;

/// Byte budget of the body cache when none is given.
pub const DEFAULT_CACHE_LIMIT: u64 = 4 * 1024 * 1024;

/// Bodies of earlier reads, bounded by a byte budget. The oldest entries are
/// evicted first.
#[derive(Debug)]
struct BodyCache {
    bodies: BTreeMap<VfsPath, Bytes>,
    order: VecDeque<VfsPath>,
    limit: u64,
    used: u64,
}

impl BodyCache {
    fn new(limit: u64) -> Self {
        Self {
            bodies: BTreeMap::new(),
            order: VecDeque::new(),
            limit,
            used: 0,
        }
    }

    fn get(&self, path: &VfsPath) -> Option<&Bytes> {
        self.bodies.get(path)
    }

    fn contains(&self, path: &VfsPath) -> bool {
        self.bodies.contains_key(path)
    }

    fn insert(&mut self, path: &VfsPath, body: Bytes) {
        let size = body.len() as u64;
        if size > self.limit {
            log::debug!("Not caching {} ({} bytes over budget)", path, size);
            return;
        }
        self.remove(path);
        while self.used + size > self.limit {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if let Some(evicted) = self.bodies.remove(&oldest) {
                self.used -= evicted.len() as u64;
                log::debug!("Evicted {} from cache", oldest);
            }
        }
        self.used += size;
        self.order.push_back(path.clone());
        self.bodies.insert(path.clone(), body);
    }

    fn remove(&mut self, path: &VfsPath) {
        if let Some(old) = self.bodies.remove(path) {
            self.used -= old.len() as u64;
            self.order.retain(|p| p != path);
        }
    }

    fn clear(&mut self) {
        self.bodies.clear();
        self.order.clear();
        self.used = 0;
    }
}

/// A store whose files are fetched from an origin server on demand.
pub struct RemoteFs {
    executor: Box<dyn HttpExecutor>,
    base_url: Url,
    cache: Option<BodyCache>,
}

impl RemoteFs {
    /// Connect to `base_url` with a reqwest client using `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, Error> {
        let executor = ReqwestExecutor::new(timeout)?;
        Self::with_executor(base_url, Box::new(executor))
    }

    pub fn with_executor(base_url: &str, executor: Box<dyn HttpExecutor>) -> Result<Self, Error> {
        let mut base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidUrl {
                message: format!("{} cannot be used as a base URL", base_url),
            });
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            executor,
            base_url,
            cache: None,
        })
    }

    /// Keep the bodies of successful reads, up to [`DEFAULT_CACHE_LIMIT`]
    /// bytes, and serve repeat reads locally.
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(|| BodyCache::new(DEFAULT_CACHE_LIMIT));
        self
    }

    /// Cache bodies of successful reads within `limit` bytes in total.
    pub fn with_cache_limit(mut self, limit: u64) -> Self {
        self.cache = Some(BodyCache::new(limit));
        self
    }

    /// Bytes currently held by the body cache.
    pub fn cached_bytes(&self) -> u64 {
        self.cache.as_ref().map_or(0, |c| c.used)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Drop every cached body.
    pub fn invalidate(&mut self) {
        if let Some(cache) = &mut self.cache {
            cache.clear();
        }
    }

    /// Build the full URL for a path. Components are percent-encoded.
    fn build_url(&self, path: &VfsPath) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        if path.is_root() {
            return Ok(url);
        }
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl {
                message: format!("{} cannot be used as a base URL", self.base_url),
            })?
            .pop_if_empty()
            .extend(path.iter());
        Ok(url)
    }

    fn send(&self, request: HttpRequest) -> Result<HttpResponse, VfsError> {
        self.executor
            .execute(&request)
            .map_err(|message| VfsError::Transport { message })
    }

    fn read_only(path: &VfsPath) -> VfsError {
        VfsError::ReadOnly { path: path.clone() }
    }
}

impl FileSystem for RemoteFs {
    fn read(&mut self, path: &VfsPath) -> Result<Option<Bytes>, VfsError> {
        if let Some(data) = self.cache.as_ref().and_then(|c| c.get(path)) {
            return Ok(Some(data.clone()));
        }

        let url = self.build_url(path)?;
        let response = self.send(HttpRequest::get(url.as_str()))?;

        if response.is_not_found() {
            return Ok(None);
        }
        if !response.is_success() {
            log::warn!("GET {} returned {}", url, response.status);
            return Err(VfsError::Fetch {
                url: url.to_string(),
                status: response.status,
            });
        }

        if let Some(cache) = &mut self.cache {
            cache.insert(path, response.body.clone());
        }
        Ok(Some(response.body))
    }

    fn write(&mut self, path: &VfsPath, _data: Bytes) -> Result<(), VfsError> {
        Err(Self::read_only(path))
    }

    fn create_dir(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        Err(Self::read_only(path))
    }

    fn remove(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        Err(Self::read_only(path))
    }

    fn list(&mut self, _path: &VfsPath) -> Result<Vec<DirEntry>, VfsError> {
        Err(VfsError::NotSupported { operation: "list" })
    }

    fn metadata(&mut self, path: &VfsPath) -> Result<Option<EntryKind>, VfsError> {
        if path.is_root() {
            return Ok(Some(EntryKind::Directory));
        }
        if self.cache.as_ref().is_some_and(|c| c.contains(path)) {
            return Ok(Some(EntryKind::File));
        }

        let url = self.build_url(path)?;
        let response = self.send(HttpRequest::head(url.as_str()))?;
        match response.status {
            404 => Ok(None),
            _ if response.is_success() => Ok(Some(EntryKind::File)),
            status => Err(VfsError::Fetch {
                url: url.to_string(),
                status,
            }),
        }
    }

    fn is_read_only(&self) -> bool {
        true
    }
}
