//! gitsalt-vfs: the namespace layer.
//!
//! - `VfsPath`: absolute, normalized paths
//! - `MountTable`: longest-prefix map from path prefixes to backend
//!   descriptors, with a permanent root entry
//! - `FileSystem`: the byte-level store interface every backend implements
//! - `MemoryFs`, `DiskFs`: the local stores behind ephemeral, persistent and
//!   host-provided areas
//!
//! # Example
//!
//! ```rust
//! use gitsalt_vfs::{Bytes, FileSystem, MemoryFs, VfsError, vpath};
//!
//! fn readme(store: &mut dyn FileSystem) -> Result<Option<Bytes>, VfsError> {
//!     store.read(&vpath!("/repo/README.md"))
//! }
//!
//! assert_eq!(readme(&mut MemoryFs::new()).unwrap(), None);
//! ```

pub use bytes::Bytes;

mod disk;
mod error;
mod memory;
pub mod mount_table;
mod path;
mod path_trie;
mod traits;

pub use disk::DiskFs;
pub use error::{code, MountError, VfsError};
pub use memory::MemoryFs;
pub use mount_table::{parse_options, BackendKind, MountEntry, MountTable};
pub use path::{PathError, VfsPath};
pub use path_trie::{PathTrie, PathTrieIter};
pub use traits::{DirEntry, EntryKind, FileSystem};
