//! gitsalt-core: command dispatch and clone tasks over a mounted namespace.
//!
//! An [`Instance`] owns one worker thread. Inbound payloads go through the
//! [`CommandRouter`], which validates them on the caller's thread and queues
//! a task; the worker runs tasks one at a time against the [`Vfs`] and posts
//! results to a [`StatusSink`].
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use gitsalt_core::{
//!     DirectoryHost, HostValue, Instance, InstanceConfig, RecordingSink, UnsupportedEngine,
//! };
//!
//! let dir = tempfile::tempdir().unwrap();
//! let sink = RecordingSink::new();
//! let instance = Instance::start(
//!     InstanceConfig::default(),
//!     Box::new(DirectoryHost::new(dir.path())),
//!     Box::new(UnsupportedEngine),
//!     Arc::new(sink.clone()),
//! )
//! .unwrap();
//!
//! instance.handle_message(&HostValue::from("not a dictionary")).unwrap_err();
//! instance.shutdown();
//!
//! assert!(sink.messages().contains(&"READY|".to_string()));
//! ```

pub mod area;
pub mod backend;
pub mod clone;
pub mod command;
pub mod config;
#[cfg(feature = "git2")]
mod git;
mod instance;
pub mod status;
pub mod value;
pub mod vfs;
pub mod work_queue;
mod worker;

pub use area::{Backend, FileSystemHandle, ReadinessState};
pub use backend::{AreaConfig, BackendError, DirectoryHost, HostStorage};
pub use clone::{CloneEngine, CloneStatus, CloneTask, EngineError, UnsupportedEngine};
pub use command::{Command, CommandKind, CommandRouter, RouteError, ValidationError};
pub use config::{ConfigError, InstanceConfig, PersistentConfig, RemoteConfig};
#[cfg(feature = "git2")]
pub use git::Git2Engine;
pub use instance::{Instance, InstanceError};
pub use status::{RecordingSink, Status, StatusSink};
pub use value::{HostValue, ResourceId};
pub use vfs::Vfs;
pub use work_queue::{QueueClosed, QueueHandle, WorkQueue};
pub use worker::Worker;
