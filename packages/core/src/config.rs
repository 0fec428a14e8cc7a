//! Instance configuration.
//!
//! Every field has a default, so a config file only needs the settings it
//! changes:
//!
//! ```json
//! { "remote": { "base_url": "https://git.example.com/" } }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use gitsalt_http::DEFAULT_CACHE_LIMIT;
use gitsalt_vfs::VfsPath;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid mount target for {field}: '{target}'")]
    InvalidTarget { field: &'static str, target: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistentConfig {
    pub target: String,
    /// Bytes requested from the host's storage.
    pub expected_size: u64,
}

impl Default for PersistentConfig {
    fn default() -> Self {
        Self {
            target: "/grvfs".to_string(),
            expected_size: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub target: String,
    /// Origin for read-through fetches. Without one the prefix is still
    /// mounted, but every access reports it unavailable.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub cache_content: bool,
    /// Byte budget of the body cache.
    pub cache_limit: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            target: "/http".to_string(),
            base_url: None,
            timeout_secs: 30,
            cache_content: true,
            cache_limit: DEFAULT_CACHE_LIMIT,
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The cache budget to open the remote area with, if caching is on.
    pub fn cache_budget(&self) -> Option<u64> {
        self.cache_content.then_some(self.cache_limit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Name of the worker thread.
    pub worker_name: String,
    pub persistent: PersistentConfig,
    pub remote: RemoteConfig,
    /// Where host-provided areas are attached.
    pub host_target: String,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            worker_name: "file-thread".to_string(),
            persistent: PersistentConfig::default(),
            remote: RemoteConfig::default(),
            host_target: "/chromefs".to_string(),
        }
    }
}

impl InstanceConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Mount targets must be absolute and must not be the root.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let targets = [
            ("persistent.target", &self.persistent.target),
            ("remote.target", &self.remote.target),
            ("host_target", &self.host_target),
        ];
        for (field, target) in targets {
            match VfsPath::parse(target) {
                Ok(path) if !path.is_root() => {}
                _ => {
                    return Err(ConfigError::InvalidTarget {
                        field,
                        target: target.clone(),
                    })
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = InstanceConfig::default();
        assert_eq!(config.worker_name, "file-thread");
        assert_eq!(config.persistent.target, "/grvfs");
        assert_eq!(config.persistent.expected_size, 1048576);
        assert_eq!(config.remote.target, "/http");
        assert_eq!(config.remote.base_url, None);
        assert_eq!(config.remote.timeout(), Duration::from_secs(30));
        assert_eq!(config.remote.cache_budget(), Some(DEFAULT_CACHE_LIMIT));
        assert_eq!(config.host_target, "/chromefs");
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = InstanceConfig::from_json_str(
            r#"{"remote": {"base_url": "https://git.example.com/"}, "persistent": {"expected_size": 42}}"#,
        )
        .unwrap();

        assert_eq!(
            config.remote.base_url.as_deref(),
            Some("https://git.example.com/")
        );
        assert_eq!(config.remote.target, "/http");
        assert_eq!(config.persistent.expected_size, 42);
        assert_eq!(config.persistent.target, "/grvfs");
    }

    #[test]
    fn cache_can_be_bounded_or_disabled() {
        let config =
            InstanceConfig::from_json_str(r#"{"remote": {"cache_limit": 65536}}"#).unwrap();
        assert_eq!(config.remote.cache_budget(), Some(65536));

        let config =
            InstanceConfig::from_json_str(r#"{"remote": {"cache_content": false}}"#).unwrap();
        assert_eq!(config.remote.cache_budget(), None);
    }

    #[test]
    fn root_and_relative_targets_are_rejected() {
        let err = InstanceConfig::from_json_str(r#"{"host_target": "/"}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidTarget {
                field: "host_target",
                ..
            }
        ));

        let err =
            InstanceConfig::from_json_str(r#"{"remote": {"target": "http"}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTarget { .. }));
    }

    #[test]
    fn from_file_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitsalt.json");

        let err = InstanceConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("gitsalt.json"));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            InstanceConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));

        std::fs::write(&path, r#"{"worker_name": "io"}"#).unwrap();
        assert_eq!(InstanceConfig::from_file(&path).unwrap().worker_name, "io");
    }
}
