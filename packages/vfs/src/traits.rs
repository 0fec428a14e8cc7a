//! The store interface every backend implements.

use bytes::Bytes;

use crate::{VfsError, VfsPath};

/// What lives at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Length in bytes for files, zero for directories.
    pub size: u64,
}

/// Byte-level file operations on paths.
///
/// Paths given to a store are relative to wherever the store is mounted:
/// a store mounted at `/grvfs` sees `/grvfs/repo/HEAD` as `/repo/HEAD`.
///
/// # Object Safety
///
/// This trait is object-safe: you can use `Box<dyn FileSystem>`.
pub trait FileSystem: Send {
    /// Read a whole file.
    ///
    /// * `Ok(None)` - nothing exists at the path.
    /// * `Ok(Some(bytes))` - the file contents.
    /// * `Err(VfsError::IsADirectory)` - the path is a directory.
    fn read(&mut self, path: &VfsPath) -> Result<Option<Bytes>, VfsError>;

    /// Create or replace a file. Missing parent directories are created.
    fn write(&mut self, path: &VfsPath, data: Bytes) -> Result<(), VfsError>;

    /// Create a directory and any missing parents.
    fn create_dir(&mut self, path: &VfsPath) -> Result<(), VfsError>;

    /// Remove a file, or a directory together with everything below it.
    fn remove(&mut self, path: &VfsPath) -> Result<(), VfsError>;

    /// List a directory, sorted by name.
    fn list(&mut self, path: &VfsPath) -> Result<Vec<DirEntry>, VfsError>;

    /// Kind of the entry at `path`, `None` if absent.
    fn metadata(&mut self, path: &VfsPath) -> Result<Option<EntryKind>, VfsError>;

    fn is_read_only(&self) -> bool {
        false
    }
}

impl<T: FileSystem + ?Sized> FileSystem for Box<T> {
    fn read(&mut self, path: &VfsPath) -> Result<Option<Bytes>, VfsError> {
        self.as_mut().read(path)
    }

    fn write(&mut self, path: &VfsPath, data: Bytes) -> Result<(), VfsError> {
        self.as_mut().write(path, data)
    }

    fn create_dir(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        self.as_mut().create_dir(path)
    }

    fn remove(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        self.as_mut().remove(path)
    }

    fn list(&mut self, path: &VfsPath) -> Result<Vec<DirEntry>, VfsError> {
        self.as_mut().list(path)
    }

    fn metadata(&mut self, path: &VfsPath) -> Result<Option<EntryKind>, VfsError> {
        self.as_mut().metadata(path)
    }

    fn is_read_only(&self) -> bool {
        self.as_ref().is_read_only()
    }
}

impl<T: FileSystem + ?Sized> FileSystem for &mut T {
    fn read(&mut self, path: &VfsPath) -> Result<Option<Bytes>, VfsError> {
        (**self).read(path)
    }

    fn write(&mut self, path: &VfsPath, data: Bytes) -> Result<(), VfsError> {
        (**self).write(path, data)
    }

    fn create_dir(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        (**self).create_dir(path)
    }

    fn remove(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        (**self).remove(path)
    }

    fn list(&mut self, path: &VfsPath) -> Result<Vec<DirEntry>, VfsError> {
        (**self).list(path)
    }

    fn metadata(&mut self, path: &VfsPath) -> Result<Option<EntryKind>, VfsError> {
        (**self).metadata(path)
    }

    fn is_read_only(&self) -> bool {
        (**self).is_read_only()
    }
}
