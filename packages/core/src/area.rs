//! Opened storage areas and their readiness.

use std::fmt;

use gitsalt_http::RemoteFs;
use gitsalt_vfs::{BackendKind, FileSystem, MemoryFs};

/// Lifecycle of an area: `Uninitialized → Opening → Ready | Failed`.
/// `Ready` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    Uninitialized,
    Opening,
    Ready,
    Failed(String),
}

impl ReadinessState {
    pub fn is_ready(&self) -> bool {
        matches!(self, ReadinessState::Ready)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReadinessState::Ready | ReadinessState::Failed(_))
    }
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessState::Uninitialized => write!(f, "uninitialized"),
            ReadinessState::Opening => write!(f, "opening"),
            ReadinessState::Ready => write!(f, "ready"),
            ReadinessState::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// The store behind an area, one variant per backend kind.
pub enum Backend {
    Ephemeral(MemoryFs),
    Persistent(Box<dyn FileSystem>),
    Remote(RemoteFs),
    HostProvided(Box<dyn FileSystem>),
}

impl Backend {
    pub fn kind(&self) -> BackendKind {
        match self {
            Backend::Ephemeral(_) => BackendKind::Ephemeral,
            Backend::Persistent(_) => BackendKind::Persistent,
            Backend::Remote(_) => BackendKind::Remote,
            Backend::HostProvided(_) => BackendKind::HostProvided,
        }
    }

    pub fn store(&mut self) -> &mut dyn FileSystem {
        match self {
            Backend::Ephemeral(fs) => fs,
            Backend::Persistent(fs) => fs.as_mut(),
            Backend::Remote(fs) => fs,
            Backend::HostProvided(fs) => fs.as_mut(),
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}

/// An opened (or failed) storage area. Owned by the worker.
#[derive(Debug)]
pub struct FileSystemHandle {
    kind: BackendKind,
    readiness: ReadinessState,
    backend: Option<Backend>,
}

impl FileSystemHandle {
    pub fn new(kind: BackendKind) -> Self {
        Self {
            kind,
            readiness: ReadinessState::Uninitialized,
            backend: None,
        }
    }

    /// A handle that is already `Ready` with `backend`.
    pub fn ready(backend: Backend) -> Self {
        let mut handle = Self::new(backend.kind());
        handle.begin_open();
        handle.complete(backend);
        handle
    }

    /// A handle that is already `Failed`.
    pub fn failed(kind: BackendKind, reason: impl Into<String>) -> Self {
        let mut handle = Self::new(kind);
        handle.fail(reason);
        handle
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn readiness(&self) -> &ReadinessState {
        &self.readiness
    }

    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// `Uninitialized → Opening`. No effect in any other state.
    pub fn begin_open(&mut self) {
        if self.readiness == ReadinessState::Uninitialized {
            self.readiness = ReadinessState::Opening;
        }
    }

    /// `Opening → Ready`. No effect in any other state.
    pub fn complete(&mut self, backend: Backend) {
        if self.readiness == ReadinessState::Opening {
            self.kind = backend.kind();
            self.backend = Some(backend);
            self.readiness = ReadinessState::Ready;
        }
    }

    /// Move a non-terminal handle to `Failed`.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if !self.readiness.is_terminal() {
            self.readiness = ReadinessState::Failed(reason.into());
        }
    }

    /// The store, only once the area is `Ready`.
    pub fn store(&mut self) -> Option<&mut dyn FileSystem> {
        if !self.readiness.is_ready() {
            return None;
        }
        self.backend.as_mut().map(Backend::store)
    }
}
