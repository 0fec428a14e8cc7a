//! Error types for namespace operations.

use crate::path::{PathError, VfsPath};

/// Numeric status codes reported to the host alongside error messages.
pub mod code {
    pub const OK: i32 = 0;
    pub const FAILED: i32 = -2;
    pub const BAD_ARGUMENT: i32 = -4;
    pub const BAD_RESOURCE: i32 = -5;
    pub const NOT_SUPPORTED_INTERFACE: i32 = -6;
    pub const NO_ACCESS: i32 = -7;
    pub const NO_SPACE: i32 = -9;
    pub const NO_QUOTA: i32 = -10;
    pub const IN_PROGRESS: i32 = -11;
    pub const NOT_SUPPORTED: i32 = -12;
    pub const FILE_NOT_FOUND: i32 = -20;
    pub const FILE_EXISTS: i32 = -21;
}

/// Errors from reading or writing through a store.
#[derive(Debug, thiserror::Error)]
pub enum VfsError {
    #[error("path error: {0}")]
    Path(#[from] PathError),

    #[error("no such file or directory: {path}")]
    NotFound { path: VfsPath },

    #[error("not a directory: {path}")]
    NotADirectory { path: VfsPath },

    #[error("is a directory: {path}")]
    IsADirectory { path: VfsPath },

    #[error("read-only filesystem: {path}")]
    ReadOnly { path: VfsPath },

    #[error("quota of {quota} bytes exceeded ({required} bytes required)")]
    QuotaExceeded { quota: u64, required: u64 },

    /// The area mounted at `prefix` never became ready.
    #[error("filesystem at {prefix} is unavailable: {reason}")]
    Unavailable { prefix: VfsPath, reason: String },

    #[error("fetch of {url} failed with HTTP status {status}")]
    Fetch { url: String, status: u16 },

    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("operation not supported: {operation}")]
    NotSupported { operation: &'static str },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VfsError {
    /// Status code reported on `ERR|` messages.
    pub fn code(&self) -> i32 {
        match self {
            VfsError::Path(_) => code::BAD_ARGUMENT,
            VfsError::NotFound { .. } => code::FILE_NOT_FOUND,
            VfsError::ReadOnly { .. } => code::NO_ACCESS,
            VfsError::QuotaExceeded { .. } => code::NO_SPACE,
            VfsError::NotSupported { .. } => code::NOT_SUPPORTED,
            VfsError::NotADirectory { .. }
            | VfsError::IsADirectory { .. }
            | VfsError::Unavailable { .. }
            | VfsError::Fetch { .. }
            | VfsError::Transport { .. }
            | VfsError::Io(_) => code::FAILED,
        }
    }
}

/// Errors from mount table mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MountError {
    #[error("invalid mount prefix '{target}': {reason}")]
    InvalidPrefix { target: String, reason: String },

    #[error("mount at {target} is busy ({open_handles} open handles)")]
    Busy { target: VfsPath, open_handles: usize },

    #[error("the root mount cannot be removed")]
    RootRequired,

    #[error("nothing is mounted at {target}")]
    NotMounted { target: VfsPath },
}

impl MountError {
    pub fn code(&self) -> i32 {
        match self {
            MountError::InvalidPrefix { .. } => code::BAD_ARGUMENT,
            MountError::Busy { .. } => code::IN_PROGRESS,
            MountError::RootRequired => code::NO_ACCESS,
            MountError::NotMounted { .. } => code::FILE_NOT_FOUND,
        }
    }
}
