//! Directory-rooted store on the local disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::{DirEntry, EntryKind, FileSystem, VfsError, VfsPath};

/// A store that maps namespace paths onto files under a root directory.
///
/// Durable areas handed out by the host live here. An optional quota bounds
/// the total size of regular files below the root; usage is measured once on
/// open and tracked on every write and remove after that.
#[derive(Debug)]
pub struct DiskFs {
    root: PathBuf,
    quota: Option<u64>,
    used: u64,
}

impl DiskFs {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, quota: Option<u64>) -> Result<Self, VfsError> {
        let root = root.into();
        fs::create_dir_all(&root)?;

        let attr = fs::metadata(&root)?;
        if !attr.is_dir() {
            return Err(VfsError::Io(io::Error::other(format!(
                "store root {} is not a directory",
                root.display()
            ))));
        }
        if attr.permissions().readonly() {
            return Err(VfsError::Io(io::Error::other(format!(
                "store root {} is not writable",
                root.display()
            ))));
        }

        let root = root.canonicalize()?;
        let used = Self::measure(&root);
        if let Some(quota) = quota {
            if used > quota {
                return Err(VfsError::QuotaExceeded {
                    quota,
                    required: used,
                });
            }
        }

        log::debug!(
            "Opened disk store at {} ({} bytes in use)",
            root.display(),
            used
        );
        Ok(Self { root, quota, used })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn quota(&self) -> Option<u64> {
        self.quota
    }

    pub fn usage(&self) -> u64 {
        self.used
    }

    fn measure(dir: &Path) -> u64 {
        walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.metadata().ok())
            .map(|meta| meta.len())
            .sum()
    }

    fn file_path(&self, path: &VfsPath) -> PathBuf {
        let mut file_path = self.root.clone();
        file_path.extend(path.iter());
        file_path
    }

    fn map_io(err: io::Error, path: &VfsPath) -> VfsError {
        match err.kind() {
            io::ErrorKind::NotFound => VfsError::NotFound { path: path.clone() },
            _ => VfsError::Io(err),
        }
    }
}

impl FileSystem for DiskFs {
    fn read(&mut self, path: &VfsPath) -> Result<Option<Bytes>, VfsError> {
        let file_path = self.file_path(path);
        log::debug!("Reading {}...", file_path.display());

        match fs::metadata(&file_path) {
            Ok(meta) if meta.is_dir() => Err(VfsError::IsADirectory { path: path.clone() }),
            Ok(_) => Ok(Some(Bytes::from(fs::read(&file_path)?))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(VfsError::Io(err)),
        }
    }

    fn write(&mut self, path: &VfsPath, data: Bytes) -> Result<(), VfsError> {
        if path.is_root() {
            return Err(VfsError::IsADirectory { path: path.clone() });
        }
        let file_path = self.file_path(path);
        log::debug!("Writing {}...", file_path.display());

        let previous = match fs::metadata(&file_path) {
            Ok(meta) if meta.is_dir() => {
                return Err(VfsError::IsADirectory { path: path.clone() })
            }
            Ok(meta) => meta.len(),
            Err(_) => 0,
        };
        let required = self.used - previous.min(self.used) + data.len() as u64;
        if let Some(quota) = self.quota {
            if required > quota {
                return Err(VfsError::QuotaExceeded { quota, required });
            }
        }

        if let Some(parent) = path.parent() {
            self.create_dir(&parent)?;
        }
        fs::write(&file_path, &data)?;
        self.used = required;
        Ok(())
    }

    fn create_dir(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        let mut current = VfsPath::root();
        for component in &path.components {
            current.components.push(component.clone());
            if self.file_path(&current).is_file() {
                return Err(VfsError::NotADirectory { path: current });
            }
        }
        fs::create_dir_all(self.file_path(path))?;
        Ok(())
    }

    fn remove(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        let file_path = self.file_path(path);
        let meta = fs::metadata(&file_path).map_err(|e| Self::map_io(e, path))?;

        if meta.is_dir() {
            let freed = Self::measure(&file_path);
            if path.is_root() {
                for entry in fs::read_dir(&file_path)? {
                    let entry = entry?;
                    if entry.file_type()?.is_dir() {
                        fs::remove_dir_all(entry.path())?;
                    } else {
                        fs::remove_file(entry.path())?;
                    }
                }
            } else {
                fs::remove_dir_all(&file_path)?;
            }
            self.used = self.used.saturating_sub(freed);
        } else {
            fs::remove_file(&file_path)?;
            self.used = self.used.saturating_sub(meta.len());
        }
        log::debug!("Removed {}", file_path.display());
        Ok(())
    }

    fn list(&mut self, path: &VfsPath) -> Result<Vec<DirEntry>, VfsError> {
        let file_path = self.file_path(path);
        let meta = fs::metadata(&file_path).map_err(|e| Self::map_io(e, path))?;
        if !meta.is_dir() {
            return Err(VfsError::NotADirectory { path: path.clone() });
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&file_path)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                kind: if meta.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                },
                size: if meta.is_dir() { 0 } else { meta.len() },
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn metadata(&mut self, path: &VfsPath) -> Result<Option<EntryKind>, VfsError> {
        match fs::metadata(self.file_path(path)) {
            Ok(meta) if meta.is_dir() => Ok(Some(EntryKind::Directory)),
            Ok(_) => Ok(Some(EntryKind::File)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(VfsError::Io(err)),
        }
    }
}
