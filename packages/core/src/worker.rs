//! The state owned by the worker thread and the tasks that run on it.

use std::sync::Arc;

use gitsalt_vfs::{BackendKind, MountEntry, MountError};

use crate::area::FileSystemHandle;
use crate::backend::{AreaConfig, HostStorage};
use crate::clone::{CloneEngine, CloneTask};
use crate::command::Command;
use crate::config::InstanceConfig;
use crate::status::{Status, StatusSink};
use crate::value::ResourceId;
use crate::vfs::Vfs;

/// Everything tasks run against. Only ever touched from the worker thread.
pub struct Worker {
    config: InstanceConfig,
    vfs: Vfs,
    host: Box<dyn HostStorage>,
    engine: Box<dyn CloneEngine>,
    sink: Arc<dyn StatusSink>,
}

impl Worker {
    /// The namespace starts with only the ephemeral root.
    pub fn new(
        config: InstanceConfig,
        host: Box<dyn HostStorage>,
        engine: Box<dyn CloneEngine>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            config,
            vfs: Vfs::new(),
            host,
            engine,
            sink,
        }
    }

    pub fn config(&self) -> &InstanceConfig {
        &self.config
    }

    pub fn vfs(&self) -> &Vfs {
        &self.vfs
    }

    pub fn vfs_mut(&mut self) -> &mut Vfs {
        &mut self.vfs
    }

    fn post(&self, status: Status) {
        self.sink.post(status);
    }

    /// Bind `handle` at `entry`'s target, reporting a mount failure.
    fn bind(&mut self, entry: MountEntry, handle: FileSystemHandle) -> bool {
        match self.vfs.bind(entry, handle) {
            Ok(_) => true,
            Err(e) => {
                self.report_mount_error(&e);
                false
            }
        }
    }

    fn report_mount_error(&self, e: &MountError) {
        log::warn!("Mount failed: {}", e);
        self.post(Status::error(e.to_string(), e.code()));
    }

    /// Open and bind every configured area, then announce readiness.
    ///
    /// Always the first task on the queue. `READY|` is only posted when the
    /// persistent area opened.
    pub fn startup(&mut self) {
        let persistent = AreaConfig::Persistent {
            expected_size: self.config.persistent.expected_size,
        };
        let entry = persistent.mount_entry(&self.config.persistent.target);
        let persistent_ready = match persistent.open(self.host.as_mut()) {
            Ok(handle) => self.bind(entry, handle),
            Err(e) => {
                log::warn!("Failed to open persistent area: {}", e);
                let code = e.code();
                self.bind(
                    entry,
                    FileSystemHandle::failed(BackendKind::Persistent, e.to_string()),
                );
                self.post(Status::error("Failed to open file system", code));
                false
            }
        };

        self.mount_remote();

        log::info!("Mounted {} areas", self.vfs.mount_table().len());
        if persistent_ready {
            self.post(Status::Ready);
        }
    }

    /// Bind the remote area at its prefix. Without a base URL the prefix is
    /// still claimed, by a failed area, so it never falls through to the root.
    fn mount_remote(&mut self) {
        let target = self.config.remote.target.clone();
        let Some(base_url) = self.config.remote.base_url.clone() else {
            log::info!("No remote base URL configured, {} is unavailable", target);
            let entry = MountEntry::new(target, BackendKind::Remote);
            self.bind(
                entry,
                FileSystemHandle::failed(BackendKind::Remote, "no base URL configured"),
            );
            return;
        };

        let remote = AreaConfig::Remote {
            base_url,
            timeout: self.config.remote.timeout(),
            cache_limit: self.config.remote.cache_budget(),
        };
        let entry = remote.mount_entry(&target);
        match remote.open(self.host.as_mut()) {
            Ok(handle) => {
                self.bind(entry, handle);
            }
            Err(e) => {
                log::warn!("Failed to open remote area: {}", e);
                let code = e.code();
                self.bind(
                    entry,
                    FileSystemHandle::failed(BackendKind::Remote, e.to_string()),
                );
                self.post(Status::error("Failed to mount remote filesystem", code));
            }
        }
    }

    /// Run one routed command.
    pub fn execute(&mut self, command: Command) {
        match command {
            Command::Clone { full_path, url } => self.clone_repository(full_path, url),
            Command::MountRequest {
                filesystem,
                full_path,
            } => self.mount_host(filesystem, full_path),
        }
    }

    fn clone_repository(&mut self, full_path: String, url: String) {
        let mut task = CloneTask::new(full_path, url);
        let status = task.run(self.engine.as_mut(), &mut self.vfs);
        self.post(status);
    }

    fn mount_host(&mut self, resource: ResourceId, full_path: String) {
        let area = AreaConfig::HostProvided {
            resource,
            source: full_path,
        };
        let entry = area.mount_entry(&self.config.host_target);

        match area.open(self.host.as_mut()) {
            Ok(handle) => match self.vfs.bind(entry, handle) {
                Ok(_) => self.post(Status::stat(format!("filesystem_resource={}", resource))),
                Err(e) => {
                    log::warn!("Failed to bind host filesystem {}: {}", resource, e);
                    self.post(Status::error("Failed to mount host filesystem", e.code()));
                }
            },
            Err(e) => {
                log::warn!("Failed to attach host filesystem {}: {}", resource, e);
                self.post(Status::error("Failed to mount host filesystem", e.code()));
            }
        }
    }
}
