//! The namespace seen by tasks: the mount table plus every bound area.

use std::collections::BTreeMap;

use gitsalt_vfs::{
    Bytes, DirEntry, EntryKind, FileSystem, MemoryFs, MountEntry, MountError, MountTable,
    VfsError, VfsPath,
};

use crate::area::{Backend, FileSystemHandle, ReadinessState};

/// Routes every file operation to the area owning the path, by
/// longest-prefix match.
///
/// Lives on the worker; nothing in here is locked.
#[derive(Debug)]
pub struct Vfs {
    table: MountTable,
    areas: BTreeMap<VfsPath, FileSystemHandle>,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    /// A namespace with only the ephemeral root.
    pub fn new() -> Self {
        let mut areas = BTreeMap::new();
        areas.insert(
            VfsPath::root(),
            FileSystemHandle::ready(Backend::Ephemeral(MemoryFs::new())),
        );
        Self {
            table: MountTable::new(),
            areas,
        }
    }

    pub fn mount_table(&self) -> &MountTable {
        &self.table
    }

    /// Register `entry` and bind `handle` at its target, replacing whatever
    /// was mounted there.
    pub fn bind(
        &mut self,
        entry: MountEntry,
        handle: FileSystemHandle,
    ) -> Result<Option<MountEntry>, MountError> {
        let target = VfsPath::parse(&entry.target).map_err(|e| MountError::InvalidPrefix {
            target: entry.target.clone(),
            reason: e.to_string(),
        })?;

        let previous = self.table.mount(entry)?;
        if let ReadinessState::Failed(reason) = handle.readiness() {
            log::warn!("Bound failed area at {}: {}", target, reason);
        }
        self.areas.insert(target, handle);
        Ok(previous)
    }

    /// Remove the mount at exactly `target` and close its area.
    pub fn unbind(&mut self, target: &str) -> Result<MountEntry, MountError> {
        let entry = self.table.unmount(target)?;
        if let Ok(target) = VfsPath::parse(&entry.target) {
            self.areas.remove(&target);
        }
        Ok(entry)
    }

    /// The area bound at exactly `target`.
    pub fn area(&self, target: &VfsPath) -> Option<&FileSystemHandle> {
        self.areas.get(target)
    }

    /// The prefix of the mount owning `path`, and `path` relative to it.
    pub fn owner(&self, path: &VfsPath) -> Option<(VfsPath, VfsPath)> {
        let (_, suffix) = self.table.route(path)?;
        let prefix = VfsPath {
            components: path.components[..path.len() - suffix.len()].to_vec(),
        };
        Some((prefix, suffix))
    }

    /// Pin the mount owning `path` so it cannot be unmounted. Returns the
    /// pinned prefix, to be passed back to [`release`](Self::release).
    pub fn acquire(&mut self, path: &VfsPath) -> Option<VfsPath> {
        let (prefix, _) = self.owner(path)?;
        self.table.acquire(&prefix).ok()?;
        Some(prefix)
    }

    pub fn release(&mut self, prefix: &VfsPath) {
        self.table.release(prefix);
    }

    fn area_for(&mut self, path: &VfsPath) -> Result<(&mut dyn FileSystem, VfsPath), VfsError> {
        let (prefix, suffix) = self
            .owner(path)
            .ok_or_else(|| VfsError::NotFound { path: path.clone() })?;

        let handle = self
            .areas
            .get_mut(&prefix)
            .ok_or_else(|| VfsError::Unavailable {
                prefix: prefix.clone(),
                reason: "no area bound".to_string(),
            })?;
        if !handle.is_ready() {
            return Err(VfsError::Unavailable {
                reason: handle.readiness().to_string(),
                prefix,
            });
        }

        let store = handle.store().ok_or_else(|| VfsError::Unavailable {
            prefix: prefix.clone(),
            reason: "no store".to_string(),
        })?;
        Ok((store, suffix))
    }

    /// Names of mount points directly below `path`.
    fn child_mounts(&self, path: &VfsPath) -> Vec<String> {
        self.table
            .entries()
            .filter_map(|entry| VfsPath::parse(&entry.target).ok())
            .filter(|target| target.len() == path.len() + 1 && target.has_prefix(path))
            .filter_map(|target| target.file_name().map(str::to_string))
            .collect()
    }

    fn is_mount_point(&self, path: &VfsPath) -> bool {
        self.table.get(path).is_some()
    }
}

impl FileSystem for Vfs {
    fn read(&mut self, path: &VfsPath) -> Result<Option<Bytes>, VfsError> {
        let (store, suffix) = self.area_for(path)?;
        store.read(&suffix)
    }

    fn write(&mut self, path: &VfsPath, data: Bytes) -> Result<(), VfsError> {
        let (store, suffix) = self.area_for(path)?;
        store.write(&suffix, data)
    }

    fn create_dir(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        let (store, suffix) = self.area_for(path)?;
        store.create_dir(&suffix)
    }

    fn remove(&mut self, path: &VfsPath) -> Result<(), VfsError> {
        let (store, suffix) = self.area_for(path)?;
        store.remove(&suffix)
    }

    fn list(&mut self, path: &VfsPath) -> Result<Vec<DirEntry>, VfsError> {
        let mounts = self.child_mounts(path);
        let (store, suffix) = self.area_for(path)?;
        let mut entries = match store.list(&suffix) {
            Ok(entries) => entries,
            Err(VfsError::NotFound { .. }) if !mounts.is_empty() => Vec::new(),
            Err(e) => return Err(e),
        };

        for name in mounts {
            if !entries.iter().any(|e| e.name == name) {
                entries.push(DirEntry {
                    name,
                    kind: EntryKind::Directory,
                    size: 0,
                });
            }
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn metadata(&mut self, path: &VfsPath) -> Result<Option<EntryKind>, VfsError> {
        if self.is_mount_point(path) {
            return Ok(Some(EntryKind::Directory));
        }
        let (store, suffix) = self.area_for(path)?;
        store.metadata(&suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsalt_vfs::{vpath, BackendKind};

    fn memory_at(vfs: &mut Vfs, target: &str) {
        vfs.bind(
            MountEntry::new(target, BackendKind::Ephemeral),
            FileSystemHandle::ready(Backend::Ephemeral(MemoryFs::new())),
        )
        .unwrap();
    }

    #[test]
    fn root_is_writable_from_the_start() {
        let mut vfs = Vfs::new();
        vfs.write(&vpath!("/tmp/x"), Bytes::from_static(b"x")).unwrap();
        assert_eq!(
            vfs.read(&vpath!("/tmp/x")).unwrap(),
            Some(Bytes::from_static(b"x"))
        );
    }

    #[test]
    fn paths_route_to_the_longest_prefix() {
        let mut vfs = Vfs::new();
        memory_at(&mut vfs, "/grvfs");
        vfs.write(&vpath!("/grvfs/repo/HEAD"), Bytes::from_static(b"ref"))
            .unwrap();

        // The root store never saw the write.
        assert_eq!(vfs.read(&vpath!("/repo/HEAD")).unwrap(), None);
        assert_eq!(
            vfs.owner(&vpath!("/grvfs/repo/HEAD")),
            Some((vpath!("/grvfs"), vpath!("/repo/HEAD")))
        );
    }

    #[test]
    fn failed_area_does_not_fall_through_to_root() {
        let mut vfs = Vfs::new();
        vfs.bind(
            MountEntry::new("/grvfs", BackendKind::Persistent),
            FileSystemHandle::failed(BackendKind::Persistent, "quota denied"),
        )
        .unwrap();

        let err = vfs
            .write(&vpath!("/grvfs/repo"), Bytes::from_static(b"x"))
            .unwrap_err();
        match err {
            VfsError::Unavailable { prefix, reason } => {
                assert_eq!(prefix, vpath!("/grvfs"));
                assert!(reason.contains("quota denied"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(vfs.metadata(&vpath!("/repo")).unwrap(), None);
    }

    #[test]
    fn rebinding_replaces_the_area() {
        let mut vfs = Vfs::new();
        memory_at(&mut vfs, "/chromefs");
        vfs.write(&vpath!("/chromefs/old"), Bytes::from_static(b"1"))
            .unwrap();

        memory_at(&mut vfs, "/chromefs/");
        assert_eq!(vfs.read(&vpath!("/chromefs/old")).unwrap(), None);
        assert_eq!(vfs.mount_table().len(), 2);
    }

    #[test]
    fn list_shows_mount_points() {
        let mut vfs = Vfs::new();
        memory_at(&mut vfs, "/grvfs");
        memory_at(&mut vfs, "/http");
        vfs.write(&vpath!("/notes"), Bytes::from_static(b"n")).unwrap();

        let names: Vec<_> = vfs
            .list(&VfsPath::root())
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["grvfs", "http", "notes"]);
        assert_eq!(
            vfs.metadata(&vpath!("/http")).unwrap(),
            Some(EntryKind::Directory)
        );
    }

    #[test]
    fn pinned_mount_is_busy() {
        let mut vfs = Vfs::new();
        memory_at(&mut vfs, "/grvfs");

        let prefix = vfs.acquire(&vpath!("/grvfs/repo")).unwrap();
        assert_eq!(prefix, vpath!("/grvfs"));
        assert!(matches!(
            vfs.unbind("/grvfs"),
            Err(MountError::Busy { .. })
        ));

        vfs.release(&prefix);
        vfs.unbind("/grvfs").unwrap();
        assert!(vfs.area(&vpath!("/grvfs")).is_none());
        assert!(matches!(vfs.unbind("/"), Err(MountError::RootRequired)));
    }
}
