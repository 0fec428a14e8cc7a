//! Opening storage areas for each backend kind.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use gitsalt_http::RemoteFs;
use gitsalt_vfs::{code, BackendKind, DiskFs, FileSystem, MemoryFs, MountEntry, VfsError, VfsPath};

use crate::area::{Backend, FileSystemHandle};
use crate::value::ResourceId;

/// Why an area could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("storage quota of {requested} bytes denied")]
    QuotaDenied { requested: u64 },

    #[error("{message}")]
    HostUnavailable { code: i32, message: String },

    #[error("store error: {0}")]
    Store(#[from] VfsError),

    #[error("remote error: {0}")]
    Remote(#[from] gitsalt_http::Error),
}

impl BackendError {
    /// Status code reported on `ERR|` messages.
    pub fn code(&self) -> i32 {
        match self {
            BackendError::QuotaDenied { .. } => code::NO_QUOTA,
            BackendError::HostUnavailable { code, .. } => *code,
            BackendError::Store(e) => e.code(),
            BackendError::Remote(_) => code::FAILED,
        }
    }
}

/// The host's storage API.
///
/// Both calls block the worker until the host answers.
pub trait HostStorage: Send {
    /// Request a durable area of at least `expected_size` bytes.
    fn request_area(&mut self, expected_size: u64) -> Result<Box<dyn FileSystem>, BackendError>;

    /// Open the area the host handed over as `resource`, rooted at `source`
    /// inside it (empty for its root).
    fn attach(
        &mut self,
        resource: ResourceId,
        source: &str,
    ) -> Result<Box<dyn FileSystem>, BackendError>;
}

/// Host storage backed by directories on the local disk.
///
/// Persistent areas live under `<root>/persistent`. Host-provided areas are
/// directories registered up front under a resource id.
#[derive(Debug)]
pub struct DirectoryHost {
    root: PathBuf,
    max_quota: Option<u64>,
    resources: BTreeMap<ResourceId, PathBuf>,
}

impl DirectoryHost {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_quota: None,
            resources: BTreeMap::new(),
        }
    }

    /// Deny persistent requests larger than `max_quota` bytes.
    pub fn with_max_quota(mut self, max_quota: u64) -> Self {
        self.max_quota = Some(max_quota);
        self
    }

    /// Make `dir` available as `resource`.
    pub fn register(&mut self, resource: ResourceId, dir: impl Into<PathBuf>) {
        self.resources.insert(resource, dir.into());
    }

    fn unavailable(err: VfsError) -> BackendError {
        BackendError::HostUnavailable {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

impl HostStorage for DirectoryHost {
    fn request_area(&mut self, expected_size: u64) -> Result<Box<dyn FileSystem>, BackendError> {
        if let Some(max) = self.max_quota {
            if expected_size > max {
                log::warn!(
                    "Denying persistent area of {} bytes (limit {})",
                    expected_size,
                    max
                );
                return Err(BackendError::QuotaDenied {
                    requested: expected_size,
                });
            }
        }

        let fs = DiskFs::open(self.root.join("persistent"), Some(expected_size))
            .map_err(Self::unavailable)?;
        Ok(Box::new(fs))
    }

    fn attach(
        &mut self,
        resource: ResourceId,
        source: &str,
    ) -> Result<Box<dyn FileSystem>, BackendError> {
        let base = self
            .resources
            .get(&resource)
            .ok_or_else(|| BackendError::HostUnavailable {
                code: code::BAD_RESOURCE,
                message: format!("unknown filesystem resource {}", resource),
            })?;

        let mut dir = base.clone();
        if !source.is_empty() {
            dir.extend(VfsPath::parse(source).map_err(VfsError::from)?.iter());
        }

        let fs = DiskFs::open(dir, None).map_err(Self::unavailable)?;
        Ok(Box::new(fs))
    }
}

/// What to open for one area, one variant per backend kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AreaConfig {
    Ephemeral,
    Persistent {
        expected_size: u64,
    },
    Remote {
        base_url: String,
        timeout: Duration,
        /// Byte budget of the body cache; `None` disables caching.
        cache_limit: Option<u64>,
    },
    HostProvided {
        resource: ResourceId,
        source: String,
    },
}

impl AreaConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            AreaConfig::Ephemeral => BackendKind::Ephemeral,
            AreaConfig::Persistent { .. } => BackendKind::Persistent,
            AreaConfig::Remote { .. } => BackendKind::Remote,
            AreaConfig::HostProvided { .. } => BackendKind::HostProvided,
        }
    }

    /// The mount-table entry describing this area at `target`.
    pub fn mount_entry(&self, target: &str) -> MountEntry {
        let entry = MountEntry::new(target, self.kind());
        match self {
            AreaConfig::Ephemeral => entry,
            AreaConfig::Persistent { expected_size } => entry
                .with_option("type", "PERSISTENT")
                .with_option("expected_size", expected_size.to_string()),
            AreaConfig::Remote {
                base_url,
                cache_limit,
                ..
            } => {
                let entry = entry
                    .with_source(base_url.as_str())
                    .with_option("cache_content", cache_limit.is_some().to_string());
                match cache_limit {
                    Some(limit) => entry.with_option("cache_limit", limit.to_string()),
                    None => entry,
                }
            }
            AreaConfig::HostProvided { resource, source } => entry
                .with_source(source.as_str())
                .with_option("filesystem_resource", resource.to_string()),
        }
    }

    /// Open the area. The returned handle is `Ready`.
    pub fn open(&self, host: &mut dyn HostStorage) -> Result<FileSystemHandle, BackendError> {
        let mut handle = FileSystemHandle::new(self.kind());
        handle.begin_open();
        log::debug!("Opening {} area", self.kind());

        let backend = match self {
            AreaConfig::Ephemeral => Backend::Ephemeral(MemoryFs::new()),
            AreaConfig::Persistent { expected_size } => {
                Backend::Persistent(host.request_area(*expected_size)?)
            }
            AreaConfig::Remote {
                base_url,
                timeout,
                cache_limit,
            } => {
                let fs = RemoteFs::new(base_url, *timeout)?;
                Backend::Remote(match cache_limit {
                    Some(limit) => fs.with_cache_limit(*limit),
                    None => fs,
                })
            }
            AreaConfig::HostProvided { resource, source } => {
                Backend::HostProvided(host.attach(*resource, source)?)
            }
        };

        handle.complete(backend);
        Ok(handle)
    }
}
