//! Process-local store with no durability.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::{DirEntry, EntryKind, FileSystem, VfsError, VfsPath};

#[derive(Debug, Clone)]
enum Node {
    File(Bytes),
    Dir,
}

/// An in-memory tree of directories and files.
///
/// Backs the ephemeral root of every namespace. An optional byte quota caps
/// the total size of stored file contents.
///
/// ```rust
/// use gitsalt_vfs::{FileSystem, MemoryFs, vpath};
///
/// let mut fs = MemoryFs::new();
/// fs.write(&vpath!("/repo/README"), "hello".into()).unwrap();
/// assert_eq!(fs.read(&vpath!("/repo/README")).unwrap().unwrap(), "hello");
/// ```
#[derive(Debug, Clone)]
pub struct MemoryFs {
    nodes: BTreeMap<VfsPath, Node>,
    quota: Option<u64>,
    used: u64,
}

impl MemoryFs {
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(VfsPath::root(), Node::Dir);
        Self {
            nodes,
            quota: None,
            used: 0,
        }
    }

    /// Create a store that refuses writes beyond `quota` bytes in total.
    pub fn with_quota(quota: u64) -> Self {
        Self {
            quota: Some(quota),
            ..Self::new()
        }
    }

    pub fn quota(&self) -> Option<u64> {
        self.quota
    }

    /// Total bytes of file contents currently stored.
    pub fn usage(&self) -> u64 {
        self.used
    }

    fn ensure_dir(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        let mut current = VfsPath::root();
        for component in &path.components {
            current.components.push(component.clone());
            match self.nodes.get(&current) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => {
                    return Err(VfsError::NotADirectory { path: current });
                }
                None => {
                    self.nodes.insert(current.clone(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn subtree(&self, path: &VfsPath) -> impl Iterator<Item = (&VfsPath, &Node)> + '_ {
        let prefix = path.clone();
        self.nodes
            .range(path.clone()..)
            .take_while(move |(p, _)| p.has_prefix(&prefix))
    }
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemoryFs {
    fn read(&mut self, path: &VfsPath) -> Result<Option<Bytes>, VfsError> {
        match self.nodes.get(path) {
            Some(Node::File(data)) => Ok(Some(data.clone())),
            Some(Node::Dir) => Err(VfsError::IsADirectory { path: path.clone() }),
            None => Ok(None),
        }
    }

    fn write(&mut self, path: &VfsPath, data: Bytes) -> Result<(), VfsError> {
        let parent = path
            .parent()
            .ok_or_else(|| VfsError::IsADirectory { path: path.clone() })?;

        let previous = match self.nodes.get(path) {
            Some(Node::Dir) => return Err(VfsError::IsADirectory { path: path.clone() }),
            Some(Node::File(old)) => old.len() as u64,
            None => 0,
        };
        let required = self.used - previous + data.len() as u64;
        if let Some(quota) = self.quota {
            if required > quota {
                return Err(VfsError::QuotaExceeded { quota, required });
            }
        }

        self.ensure_dir(&parent)?;
        self.nodes.insert(path.clone(), Node::File(data));
        self.used = required;
        Ok(())
    }

    fn create_dir(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        self.ensure_dir(path)
    }

    fn remove(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        if !self.nodes.contains_key(path) {
            return Err(VfsError::NotFound { path: path.clone() });
        }

        let doomed: Vec<VfsPath> = self
            .subtree(path)
            .filter(|(p, _)| !p.is_root())
            .map(|(p, _)| p.clone())
            .collect();
        for p in doomed {
            if let Some(Node::File(data)) = self.nodes.remove(&p) {
                self.used -= data.len() as u64;
            }
        }
        Ok(())
    }

    fn list(&mut self, path: &VfsPath) -> Result<Vec<DirEntry>, VfsError> {
        match self.nodes.get(path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(VfsError::NotADirectory { path: path.clone() }),
            None => return Err(VfsError::NotFound { path: path.clone() }),
        }

        let depth = path.len() + 1;
        Ok(self
            .subtree(path)
            .filter(|(p, _)| p.len() == depth)
            .filter_map(|(p, node)| {
                let name = p.file_name()?.to_string();
                Some(match node {
                    Node::File(data) => DirEntry {
                        name,
                        kind: EntryKind::File,
                        size: data.len() as u64,
                    },
                    Node::Dir => DirEntry {
                        name,
                        kind: EntryKind::Directory,
                        size: 0,
                    },
                })
            })
            .collect())
    }

    fn metadata(&mut self, path: &VfsPath) -> Result<Option<EntryKind>, VfsError> {
        Ok(self.nodes.get(path).map(|node| match node {
            Node::File(_) => EntryKind::File,
            Node::Dir => EntryKind::Directory,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vpath;

    #[test]
    fn write_creates_parents() {
        let mut fs = MemoryFs::new();
        fs.write(&vpath!("/a/b/c.txt"), Bytes::from_static(b"abc"))
            .unwrap();

        assert_eq!(fs.metadata(&vpath!("/a")).unwrap(), Some(EntryKind::Directory));
        assert_eq!(fs.metadata(&vpath!("/a/b")).unwrap(), Some(EntryKind::Directory));
        assert_eq!(
            fs.read(&vpath!("/a/b/c.txt")).unwrap(),
            Some(Bytes::from_static(b"abc"))
        );
    }

    #[test]
    fn read_missing_is_none() {
        let mut fs = MemoryFs::new();
        assert_eq!(fs.read(&vpath!("/nope")).unwrap(), None);
    }

    #[test]
    fn read_directory_is_error() {
        let mut fs = MemoryFs::new();
        fs.create_dir(&vpath!("/dir")).unwrap();
        assert!(matches!(
            fs.read(&vpath!("/dir")),
            Err(VfsError::IsADirectory { .. })
        ));
        assert!(matches!(
            fs.write(&VfsPath::root(), Bytes::new()),
            Err(VfsError::IsADirectory { .. })
        ));
    }

    #[test]
    fn file_in_the_way_of_directory() {
        let mut fs = MemoryFs::new();
        fs.write(&vpath!("/file"), Bytes::from_static(b"x")).unwrap();
        assert!(matches!(
            fs.write(&vpath!("/file/child"), Bytes::new()),
            Err(VfsError::NotADirectory { .. })
        ));
    }

    #[test]
    fn quota_counts_replacements() {
        let mut fs = MemoryFs::with_quota(8);
        fs.write(&vpath!("/a"), Bytes::from_static(b"12345")).unwrap();
        fs.write(&vpath!("/a"), Bytes::from_static(b"12345678"))
            .unwrap();
        assert_eq!(fs.usage(), 8);

        let err = fs.write(&vpath!("/b"), Bytes::from_static(b"1")).unwrap_err();
        assert!(matches!(
            err,
            VfsError::QuotaExceeded {
                quota: 8,
                required: 9
            }
        ));
        assert_eq!(fs.read(&vpath!("/b")).unwrap(), None);
    }

    #[test]
    fn remove_subtree_releases_usage() {
        let mut fs = MemoryFs::new();
        fs.write(&vpath!("/repo/a"), Bytes::from_static(b"aaa")).unwrap();
        fs.write(&vpath!("/repo/sub/b"), Bytes::from_static(b"bb"))
            .unwrap();
        fs.write(&vpath!("/repository"), Bytes::from_static(b"c"))
            .unwrap();
        assert_eq!(fs.usage(), 6);

        fs.remove(&vpath!("/repo")).unwrap();
        assert_eq!(fs.usage(), 1);
        assert_eq!(fs.metadata(&vpath!("/repo/sub")).unwrap(), None);
        assert_eq!(fs.metadata(&vpath!("/repository")).unwrap(), Some(EntryKind::File));
        assert!(matches!(
            fs.remove(&vpath!("/repo")),
            Err(VfsError::NotFound { .. })
        ));
    }

    #[test]
    fn remove_root_keeps_root() {
        let mut fs = MemoryFs::new();
        fs.write(&vpath!("/a"), Bytes::from_static(b"a")).unwrap();
        fs.remove(&VfsPath::root()).unwrap();
        assert_eq!(fs.metadata(&VfsPath::root()).unwrap(), Some(EntryKind::Directory));
        assert!(fs.list(&VfsPath::root()).unwrap().is_empty());
    }

    #[test]
    fn list_direct_children_only() {
        let mut fs = MemoryFs::new();
        fs.write(&vpath!("/d/x"), Bytes::from_static(b"xx")).unwrap();
        fs.write(&vpath!("/d/sub/y"), Bytes::from_static(b"y")).unwrap();

        let entries = fs.list(&vpath!("/d")).unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry {
                    name: "sub".to_string(),
                    kind: EntryKind::Directory,
                    size: 0
                },
                DirEntry {
                    name: "x".to_string(),
                    kind: EntryKind::File,
                    size: 2
                },
            ]
        );
        assert!(matches!(
            fs.list(&vpath!("/d/x")),
            Err(VfsError::NotADirectory { .. })
        ));
    }
}
