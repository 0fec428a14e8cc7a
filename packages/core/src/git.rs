//! libgit2-backed clone engine.

use std::fs;
use std::path::Path;

use gitsalt_vfs::{code, Bytes, FileSystem, VfsPath};

use crate::clone::{CloneEngine, EngineError};

/// Clones with libgit2 into a scratch directory, then copies the working
/// tree and `.git` directory into the namespace under the destination.
#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Engine;

impl Git2Engine {
    fn import(
        scratch: &Path,
        destination: &VfsPath,
        fs: &mut dyn FileSystem,
    ) -> Result<u64, EngineError> {
        let mut files = 0;
        fs.create_dir(destination).map_err(store_error)?;

        for entry in walkdir::WalkDir::new(scratch).min_depth(1) {
            let entry = entry.map_err(|e| EngineError::new(code::FAILED, e.to_string()))?;
            let relative = entry
                .path()
                .strip_prefix(scratch)
                .map_err(|e| EngineError::new(code::FAILED, e.to_string()))?;

            let components = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned());
            let relative = VfsPath::try_from_components(components)
                .map_err(|e| EngineError::new(code::BAD_ARGUMENT, e.to_string()))?;
            let target = destination.join(&relative);

            let file_type = entry.file_type();
            if file_type.is_dir() {
                fs.create_dir(&target).map_err(store_error)?;
            } else if file_type.is_file() {
                let data = fs::read(entry.path())
                    .map_err(|e| EngineError::new(code::FAILED, e.to_string()))?;
                fs.write(&target, Bytes::from(data)).map_err(store_error)?;
                files += 1;
            } else {
                log::debug!("Skipping {}", entry.path().display());
            }
        }
        Ok(files)
    }
}

fn store_error(e: gitsalt_vfs::VfsError) -> EngineError {
    EngineError::new(e.code(), e.to_string())
}

impl CloneEngine for Git2Engine {
    fn clone_repository(
        &mut self,
        destination: &str,
        url: &str,
        fs: &mut dyn FileSystem,
    ) -> Result<(), EngineError> {
        let destination = VfsPath::parse(destination)
            .map_err(|e| EngineError::new(code::BAD_ARGUMENT, e.to_string()))?;
        let scratch =
            tempfile::tempdir().map_err(|e| EngineError::new(code::FAILED, e.to_string()))?;

        git2::Repository::clone(url, scratch.path())
            .map_err(|e| EngineError::new(e.raw_code(), e.message()))?;

        let files = Self::import(scratch.path(), &destination, fs)?;
        log::info!("Imported {} files from {} into {}", files, url, destination);
        Ok(())
    }
}
