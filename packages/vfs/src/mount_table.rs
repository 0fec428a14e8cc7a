//! Maps path prefixes to backend descriptors.
//!
//! Lookups use longest-prefix match, and the root prefix `/` always has an
//! entry so every valid path resolves to something:
//!
//! ```rust
//! use gitsalt_vfs::{BackendKind, MountEntry, MountTable};
//!
//! let mut table = MountTable::new();
//! table.mount(MountEntry::new("/grvfs", BackendKind::Persistent)).unwrap();
//!
//! assert_eq!(table.resolve("/grvfs/repo").unwrap().target, "/grvfs");
//! assert_eq!(table.resolve("/elsewhere").unwrap().target, "/");
//! ```

use std::collections::BTreeMap;
use std::fmt;

use crate::path_trie::PathTrie;
use crate::{MountError, VfsPath};

/// The closed set of storage kinds a prefix can be backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// Process-local memory, gone when the instance goes.
    Ephemeral,
    /// Durable, quota-bounded area granted by the host.
    Persistent,
    /// Read-through HTTP.
    Remote,
    /// An area the host handed over by resource reference.
    HostProvided,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ephemeral => "ephemeral",
            BackendKind::Persistent => "persistent",
            BackendKind::Remote => "remote",
            BackendKind::HostProvided => "host_provided",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the mount table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Backend-specific locator, may be empty.
    pub source: String,
    /// Path prefix this entry claims.
    pub target: String,
    pub kind: BackendKind,
    /// Backend configuration such as quota size.
    pub options: BTreeMap<String, String>,
}

impl MountEntry {
    pub fn new(target: impl Into<String>, kind: BackendKind) -> Self {
        Self {
            source: String::new(),
            target: target.into(),
            kind,
            options: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    #[must_use]
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Merge options given in `key=value,key=value` mount-data form.
    #[must_use]
    pub fn with_options_string(mut self, data: &str) -> Self {
        self.options.extend(parse_options(data));
        self
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// Render options back into mount-data form.
    pub fn options_string(&self) -> String {
        self.options
            .iter()
            .map(|(k, v)| {
                if v.is_empty() {
                    k.clone()
                } else {
                    format!("{}={}", k, v)
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Parse `key=value,key=value` mount data. A bare `key` maps to an empty value.
pub fn parse_options(data: &str) -> BTreeMap<String, String> {
    data.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), v.trim().to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

#[derive(Debug, Clone)]
struct Slot {
    entry: MountEntry,
    open_handles: usize,
}

/// Prefix-to-backend map with a permanent root entry.
///
/// This is a plain data structure: it is only ever touched from the worker
/// thread and does no locking of its own.
#[derive(Debug, Clone)]
pub struct MountTable {
    trie: PathTrie<Slot>,
}

impl Default for MountTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MountTable {
    /// A table holding only the ephemeral root.
    pub fn new() -> Self {
        let mut trie = PathTrie::new();
        trie.insert(
            &VfsPath::root(),
            Slot {
                entry: MountEntry::new("/", BackendKind::Ephemeral),
                open_handles: 0,
            },
        );
        Self { trie }
    }

    fn parse_target(target: &str) -> Result<VfsPath, MountError> {
        VfsPath::parse(target).map_err(|e| MountError::InvalidPrefix {
            target: target.to_string(),
            reason: e.to_string(),
        })
    }

    /// Add an entry, replacing any entry at the exact same prefix.
    ///
    /// The target is normalized (`/grvfs/` becomes `/grvfs`). Returns the
    /// replaced entry, if there was one.
    pub fn mount(&mut self, mut entry: MountEntry) -> Result<Option<MountEntry>, MountError> {
        let target = Self::parse_target(&entry.target)?;
        entry.target = target.to_string();

        log::info!(
            "Mounting {} at {} (source '{}')",
            entry.kind,
            entry.target,
            entry.source
        );
        let previous = self.trie.insert(
            &target,
            Slot {
                entry,
                open_handles: 0,
            },
        );
        Ok(previous.map(|slot| slot.entry))
    }

    /// Remove the entry at exactly `target`.
    pub fn unmount(&mut self, target: &str) -> Result<MountEntry, MountError> {
        let target = Self::parse_target(target)?;
        if target.is_root() {
            return Err(MountError::RootRequired);
        }

        match self.trie.get(&target) {
            None => return Err(MountError::NotMounted { target }),
            Some(slot) if slot.open_handles > 0 => {
                return Err(MountError::Busy {
                    open_handles: slot.open_handles,
                    target,
                })
            }
            Some(_) => {}
        }

        log::info!("Unmounting {}", target);
        self.trie
            .remove(&target)
            .map(|slot| slot.entry)
            .ok_or(MountError::NotMounted { target })
    }

    /// The entry owning `path`, by longest matching prefix.
    ///
    /// Falls back to the root entry; `None` only when `path` does not parse.
    pub fn resolve(&self, path: &str) -> Option<&MountEntry> {
        let path = VfsPath::parse(path).ok()?;
        self.route(&path).map(|(entry, _)| entry)
    }

    /// The entry owning `path` together with the path relative to the
    /// entry's prefix.
    pub fn route(&self, path: &VfsPath) -> Option<(&MountEntry, VfsPath)> {
        self.trie
            .find_ancestor(path)
            .map(|(slot, suffix)| (&slot.entry, suffix))
    }

    /// The entry mounted at exactly `target`.
    pub fn get(&self, target: &VfsPath) -> Option<&MountEntry> {
        self.trie.get(target).map(|slot| &slot.entry)
    }

    /// All entries, ordered by prefix.
    pub fn entries(&self) -> impl Iterator<Item = &MountEntry> {
        self.trie.iter().map(|(_, slot)| &slot.entry)
    }

    pub fn len(&self) -> usize {
        self.trie.len()
    }

    /// Always false: the root entry cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    /// Record an open handle on the mount at `target`.
    pub fn acquire(&mut self, target: &VfsPath) -> Result<(), MountError> {
        let slot = self
            .trie
            .get_mut(target)
            .ok_or_else(|| MountError::NotMounted {
                target: target.clone(),
            })?;
        slot.open_handles += 1;
        Ok(())
    }

    /// Drop an open handle recorded by [`acquire`](Self::acquire).
    pub fn release(&mut self, target: &VfsPath) {
        if let Some(slot) = self.trie.get_mut(target) {
            slot.open_handles = slot.open_handles.saturating_sub(1);
        }
    }

    pub fn open_handles(&self, target: &VfsPath) -> usize {
        self.trie.get(target).map_or(0, |slot| slot.open_handles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vpath;

    #[test]
    fn new_table_has_ephemeral_root() {
        let table = MountTable::new();
        assert_eq!(table.len(), 1);
        let root = table.resolve("/").unwrap();
        assert_eq!(root.kind, BackendKind::Ephemeral);
        assert_eq!(root.target, "/");
    }

    #[test]
    fn every_path_resolves() {
        let mut table = MountTable::new();
        table
            .mount(MountEntry::new("/grvfs", BackendKind::Persistent))
            .unwrap();
        table
            .mount(MountEntry::new("/http", BackendKind::Remote))
            .unwrap();

        for path in ["/", "/a", "/grvfs", "/grvfs/x/y", "/http/index.html", "/grv"] {
            assert!(table.resolve(path).is_some(), "{} did not resolve", path);
        }
        assert_eq!(table.resolve("/grv").unwrap().target, "/");
        assert!(table.resolve("not-absolute").is_none());
    }

    #[test]
    fn longest_prefix_wins() {
        let mut table = MountTable::new();
        table
            .mount(MountEntry::new("/a", BackendKind::Persistent))
            .unwrap();
        table
            .mount(MountEntry::new("/a/b", BackendKind::Remote))
            .unwrap();

        let (entry, suffix) = table.route(&vpath!("/a/b/c")).unwrap();
        assert_eq!(entry.target, "/a/b");
        assert_eq!(suffix, vpath!("/c"));

        let (entry, suffix) = table.route(&vpath!("/a/z")).unwrap();
        assert_eq!(entry.target, "/a");
        assert_eq!(suffix, vpath!("/z"));
    }

    #[test]
    fn remount_replaces_entry() {
        let mut table = MountTable::new();
        assert_eq!(
            table
                .mount(MountEntry::new("/data", BackendKind::Ephemeral))
                .unwrap(),
            None
        );
        let replaced = table
            .mount(MountEntry::new("/data/", BackendKind::Persistent).with_source("second"))
            .unwrap()
            .unwrap();

        assert_eq!(replaced.kind, BackendKind::Ephemeral);
        assert_eq!(table.len(), 2);
        let entry = table.resolve("/data/file").unwrap();
        assert_eq!(entry.kind, BackendKind::Persistent);
        assert_eq!(entry.source, "second");
    }

    #[test]
    fn mounting_over_root_replaces_but_keeps_root() {
        let mut table = MountTable::new();
        table
            .mount(MountEntry::new("/", BackendKind::Persistent))
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve("/x").unwrap().kind, BackendKind::Persistent);
        assert_eq!(table.unmount("/"), Err(MountError::RootRequired));
    }

    #[test]
    fn invalid_prefixes_rejected() {
        let mut table = MountTable::new();
        for bad in ["", "relative", "/a/../b"] {
            let err = table
                .mount(MountEntry::new(bad, BackendKind::Ephemeral))
                .unwrap_err();
            assert!(matches!(err, MountError::InvalidPrefix { .. }), "{}", bad);
        }
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn unmount_then_fall_back_to_root() {
        let mut table = MountTable::new();
        table
            .mount(MountEntry::new("/http", BackendKind::Remote))
            .unwrap();

        let removed = table.unmount("/http").unwrap();
        assert_eq!(removed.kind, BackendKind::Remote);
        assert_eq!(table.resolve("/http/x").unwrap().target, "/");
        assert_eq!(
            table.unmount("/http"),
            Err(MountError::NotMounted {
                target: vpath!("/http")
            })
        );
    }

    #[test]
    fn busy_mount_cannot_be_unmounted() {
        let mut table = MountTable::new();
        table
            .mount(MountEntry::new("/grvfs", BackendKind::Persistent))
            .unwrap();

        table.acquire(&vpath!("/grvfs")).unwrap();
        assert_eq!(table.open_handles(&vpath!("/grvfs")), 1);
        assert!(matches!(
            table.unmount("/grvfs"),
            Err(MountError::Busy {
                open_handles: 1,
                ..
            })
        ));

        table.release(&vpath!("/grvfs"));
        assert!(table.unmount("/grvfs").is_ok());
        assert!(table.acquire(&vpath!("/grvfs")).is_err());
    }

    #[test]
    fn entries_in_prefix_order() {
        let mut table = MountTable::new();
        table
            .mount(MountEntry::new("/http", BackendKind::Remote))
            .unwrap();
        table
            .mount(MountEntry::new("/chromefs", BackendKind::HostProvided))
            .unwrap();

        let targets: Vec<_> = table.entries().map(|e| e.target.as_str()).collect();
        assert_eq!(targets, vec!["/", "/chromefs", "/http"]);
    }

    #[test]
    fn options_string_round_trip() {
        let entry = MountEntry::new("/grvfs", BackendKind::Persistent)
            .with_options_string("type=PERSISTENT, expected_size=1048576");
        assert_eq!(entry.option("type"), Some("PERSISTENT"));
        assert_eq!(entry.option("expected_size"), Some("1048576"));
        assert_eq!(
            entry.options_string(),
            "expected_size=1048576,type=PERSISTENT"
        );

        let flags = parse_options("ro,,mode=fast");
        assert_eq!(flags.get("ro").map(String::as_str), Some(""));
        assert_eq!(flags.len(), 2);
    }

    #[test]
    fn backend_kind_names() {
        assert_eq!(BackendKind::HostProvided.to_string(), "host_provided");
        assert_eq!(BackendKind::Ephemeral.as_str(), "ephemeral");
    }
}
