//! Clone tasks and the engine that performs the transfer.

use gitsalt_vfs::{code, FileSystem, VfsPath};

use crate::status::Status;
use crate::vfs::Vfs;

/// Failure reported by a clone engine. Message and code are passed to the
/// host verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct EngineError {
    pub code: i32,
    pub message: String,
}

impl EngineError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// The version-control engine.
///
/// Runs on the worker and may block for as long as the transfer takes. All
/// repository writes go through `fs`.
pub trait CloneEngine: Send {
    fn clone_repository(
        &mut self,
        destination: &str,
        url: &str,
        fs: &mut dyn FileSystem,
    ) -> Result<(), EngineError>;
}

impl<T: CloneEngine + ?Sized> CloneEngine for Box<T> {
    fn clone_repository(
        &mut self,
        destination: &str,
        url: &str,
        fs: &mut dyn FileSystem,
    ) -> Result<(), EngineError> {
        self.as_mut().clone_repository(destination, url, fs)
    }
}

/// An engine for builds without one; every clone fails as not supported.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedEngine;

impl CloneEngine for UnsupportedEngine {
    fn clone_repository(
        &mut self,
        _destination: &str,
        _url: &str,
        _fs: &mut dyn FileSystem,
    ) -> Result<(), EngineError> {
        Err(EngineError::new(
            code::NOT_SUPPORTED,
            "clone is not supported by this build",
        ))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneStatus {
    Pending,
    Running,
    Succeeded,
    Failed(EngineError),
}

/// One accepted clone request.
#[derive(Debug, Clone)]
pub struct CloneTask {
    source_url: String,
    destination_path: String,
    status: CloneStatus,
}

impl CloneTask {
    pub fn new(destination_path: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            destination_path: destination_path.into(),
            status: CloneStatus::Pending,
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn destination_path(&self) -> &str {
        &self.destination_path
    }

    pub fn status(&self) -> &CloneStatus {
        &self.status
    }

    /// Run the clone to completion and return the status to report.
    ///
    /// The mount owning the destination stays pinned while the engine runs.
    pub fn run(&mut self, engine: &mut dyn CloneEngine, vfs: &mut Vfs) -> Status {
        self.status = CloneStatus::Running;
        log::info!(
            "Cloning {} into {}",
            self.source_url,
            self.destination_path
        );

        let pinned = VfsPath::parse(&self.destination_path)
            .ok()
            .and_then(|path| vfs.acquire(&path));
        let result = engine.clone_repository(&self.destination_path, &self.source_url, vfs);
        if let Some(prefix) = &pinned {
            vfs.release(prefix);
        }

        self.status = match result {
            Ok(()) => CloneStatus::Succeeded,
            Err(e) => {
                log::warn!("Clone of {} failed: {} ({})", self.source_url, e, e.code);
                CloneStatus::Failed(e)
            }
        };
        self.report()
    }

    /// The terminal status message.
    ///
    /// Only meaningful once the task has finished; reports an in-progress
    /// error before that.
    pub fn report(&self) -> Status {
        match &self.status {
            CloneStatus::Succeeded => Status::stat(format!(
                "cloned {} into {}",
                self.source_url, self.destination_path
            )),
            CloneStatus::Failed(e) => Status::error(e.message.clone(), e.code),
            CloneStatus::Pending | CloneStatus::Running => {
                Status::error("clone has not finished", code::IN_PROGRESS)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitsalt_vfs::{vpath, Bytes, MountError};

    /// Writes a HEAD file and records what it was asked to do.
    #[derive(Default)]
    struct HeadWriter {
        calls: Vec<(String, String)>,
        busy_during_clone: bool,
    }

    impl CloneEngine for HeadWriter {
        fn clone_repository(
            &mut self,
            destination: &str,
            url: &str,
            fs: &mut dyn FileSystem,
        ) -> Result<(), EngineError> {
            self.calls.push((destination.to_string(), url.to_string()));
            let head = VfsPath::parse(destination)
                .map_err(|e| EngineError::new(code::BAD_ARGUMENT, e.to_string()))?
                .child("HEAD")
                .map_err(|e| EngineError::new(code::BAD_ARGUMENT, e.to_string()))?;
            fs.write(&head, Bytes::from_static(b"ref: refs/heads/main\n"))
                .map_err(|e| EngineError::new(e.code(), e.to_string()))
        }
    }

    struct Refuses;

    impl CloneEngine for Refuses {
        fn clone_repository(
            &mut self,
            _destination: &str,
            _url: &str,
            _fs: &mut dyn FileSystem,
        ) -> Result<(), EngineError> {
            Err(EngineError::new(1, "unsupported URL protocol"))
        }
    }

    #[test]
    fn success_reports_url_and_path() {
        let mut vfs = Vfs::new();
        let mut engine = HeadWriter::default();
        let mut task = CloneTask::new("/ephemeral/repo", "https://example/repo.git");
        assert_eq!(task.status(), &CloneStatus::Pending);

        let status = task.run(&mut engine, &mut vfs);
        assert_eq!(
            status.to_string(),
            "STAT|cloned https://example/repo.git into /ephemeral/repo"
        );
        assert_eq!(task.status(), &CloneStatus::Succeeded);
        assert!(vfs.read(&vpath!("/ephemeral/repo/HEAD")).unwrap().is_some());
    }

    #[test]
    fn engine_failure_is_reported_verbatim() {
        let mut vfs = Vfs::new();
        let mut task = CloneTask::new("/ephemeral/repo", "foo://bar");

        let status = task.run(&mut Refuses, &mut vfs);
        assert_eq!(
            status.to_string(),
            "ERR|unsupported URL protocol -- Error #: 1"
        );
        assert!(matches!(task.status(), CloneStatus::Failed(e) if e.code == 1));
    }

    #[test]
    fn empty_arguments_reach_the_engine() {
        let mut vfs = Vfs::new();
        let mut engine = HeadWriter::default();
        let mut task = CloneTask::new("", "");

        let status = task.run(&mut engine, &mut vfs);
        assert_eq!(engine.calls, vec![(String::new(), String::new())]);
        assert!(status.is_error());
    }

    #[test]
    fn pin_is_released_after_failure() {
        let mut vfs = Vfs::new();
        vfs.bind(
            gitsalt_vfs::MountEntry::new("/grvfs", gitsalt_vfs::BackendKind::Ephemeral),
            crate::area::FileSystemHandle::ready(crate::area::Backend::Ephemeral(
                gitsalt_vfs::MemoryFs::new(),
            )),
        )
        .unwrap();

        let mut task = CloneTask::new("/grvfs/repo", "foo://bar");
        task.run(&mut Refuses, &mut vfs);

        assert_eq!(vfs.mount_table().open_handles(&vpath!("/grvfs")), 0);
        vfs.unbind("/grvfs").unwrap();
        assert!(matches!(vfs.unbind("/"), Err(MountError::RootRequired)));
    }

    #[test]
    fn unsupported_engine_fails_with_not_supported() {
        let mut vfs = Vfs::new();
        let mut task = CloneTask::new("/grvfs/repo", "https://example/repo.git");
        let status = task.run(&mut UnsupportedEngine, &mut vfs);
        assert_eq!(
            status,
            Status::error("clone is not supported by this build", code::NOT_SUPPORTED)
        );
    }

    #[test]
    fn report_before_run_is_in_progress() {
        let task = CloneTask::new("/a", "b");
        assert_eq!(
            task.report(),
            Status::error("clone has not finished", code::IN_PROGRESS)
        );
    }
}
