//! Inbound commands and the router that queues them.

use std::sync::Arc;

use gitsalt_vfs::code;

use crate::status::{Status, StatusSink};
use crate::value::{HostValue, ResourceId};
use crate::work_queue::{QueueClosed, QueueHandle};
use crate::worker::Worker;

/// Which command a payload asks for, read from its `cmd` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Clone,
    MountRequest,
}

impl CommandKind {
    /// `"clone"` selects Clone; any other string is a mount request.
    pub fn from_cmd(cmd: &str) -> Self {
        if cmd == "clone" {
            CommandKind::Clone
        } else {
            CommandKind::MountRequest
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Clone {
        full_path: String,
        url: String,
    },
    MountRequest {
        filesystem: ResourceId,
        full_path: String,
    },
}

/// Why a payload was rejected. The messages are part of the wire protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Message was not a dictionary.")]
    NotADictionary,

    #[error("filesystem was missing or not a resource.")]
    Filesystem,

    #[error("fullPath was missing or not a string.")]
    FullPath,

    #[error("url was missing or not a string.")]
    Url,

    #[error("cmd was missing or not a string.")]
    Cmd,
}

impl Command {
    /// Validate a payload.
    ///
    /// `cmd` is peeked first to learn which fields are required, then the
    /// fields are checked in the order `filesystem`, `fullPath`, `url`,
    /// `cmd`. The first failing check wins.
    pub fn parse(payload: &HostValue) -> Result<Self, ValidationError> {
        let dict = payload
            .as_dictionary()
            .ok_or(ValidationError::NotADictionary)?;
        let string = |key: &str| dict.get(key).and_then(HostValue::as_str);

        let kind = string("cmd").map(CommandKind::from_cmd);

        let filesystem = match kind {
            Some(CommandKind::MountRequest) => Some(
                dict.get("filesystem")
                    .and_then(HostValue::as_resource)
                    .ok_or(ValidationError::Filesystem)?,
            ),
            _ => None,
        };

        let full_path = string("fullPath")
            .ok_or(ValidationError::FullPath)?
            .to_string();

        match kind {
            Some(CommandKind::Clone) => {
                let url = string("url").ok_or(ValidationError::Url)?.to_string();
                Ok(Command::Clone { full_path, url })
            }
            Some(CommandKind::MountRequest) => Ok(Command::MountRequest {
                filesystem: filesystem.ok_or(ValidationError::Filesystem)?,
                full_path,
            }),
            None => Err(ValidationError::Cmd),
        }
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Clone { .. } => CommandKind::Clone,
            Command::MountRequest { .. } => CommandKind::MountRequest,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Closed(#[from] QueueClosed),
}

/// Validates payloads on the calling thread and queues the work.
///
/// Never blocks on the worker. Every rejection is also posted to the sink.
#[derive(Clone)]
pub struct CommandRouter {
    queue: QueueHandle<Worker>,
    sink: Arc<dyn StatusSink>,
}

impl CommandRouter {
    pub fn new(queue: QueueHandle<Worker>, sink: Arc<dyn StatusSink>) -> Self {
        Self { queue, sink }
    }

    pub fn handle(&self, payload: &HostValue) -> Result<(), RouteError> {
        let command = match Command::parse(payload) {
            Ok(command) => command,
            Err(e) => {
                log::debug!("Rejected {} payload: {}", payload.type_name(), e);
                self.sink.post(Status::Invalid(e.to_string()));
                return Err(e.into());
            }
        };

        log::debug!("Queueing {:?}", command.kind());
        if let Err(e) = self
            .queue
            .enqueue(move |worker: &mut Worker| worker.execute(command))
        {
            self.sink.post(Status::error(e.to_string(), code::FAILED));
            return Err(e.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clone_payload() -> HostValue {
        HostValue::dictionary()
            .with("cmd", "clone")
            .with("fullPath", "/grvfs/repo")
            .with("url", "https://example/repo.git")
    }

    #[test]
    fn parses_clone() {
        assert_eq!(
            Command::parse(&clone_payload()).unwrap(),
            Command::Clone {
                full_path: "/grvfs/repo".to_string(),
                url: "https://example/repo.git".to_string(),
            }
        );
    }

    #[test]
    fn clone_does_not_need_filesystem() {
        let payload = clone_payload().with("filesystem", "not a resource");
        assert!(Command::parse(&payload).is_ok());
    }

    #[test]
    fn any_other_cmd_is_a_mount_request() {
        let payload = HostValue::dictionary()
            .with("cmd", "mount")
            .with("filesystem", ResourceId(4))
            .with("fullPath", "/");
        assert_eq!(
            Command::parse(&payload).unwrap(),
            Command::MountRequest {
                filesystem: ResourceId(4),
                full_path: "/".to_string(),
            }
        );
    }

    #[test]
    fn mount_request_does_not_need_url() {
        let payload = HostValue::dictionary()
            .with("cmd", "")
            .with("filesystem", ResourceId(1))
            .with("fullPath", "");
        assert_eq!(
            Command::parse(&payload).unwrap().kind(),
            CommandKind::MountRequest
        );
    }

    #[test]
    fn not_a_dictionary() {
        assert_eq!(
            Command::parse(&HostValue::from("clone")),
            Err(ValidationError::NotADictionary)
        );
    }

    #[test]
    fn checks_run_in_order() {
        // filesystem is reported before fullPath for mount requests.
        let payload = HostValue::dictionary().with("cmd", "mount");
        assert_eq!(Command::parse(&payload), Err(ValidationError::Filesystem));

        let payload = HostValue::dictionary()
            .with("cmd", "mount")
            .with("filesystem", 5i64)
            .with("fullPath", "/");
        assert_eq!(Command::parse(&payload), Err(ValidationError::Filesystem));

        // fullPath before url for clones.
        let payload = HostValue::dictionary().with("cmd", "clone");
        assert_eq!(Command::parse(&payload), Err(ValidationError::FullPath));

        let payload = HostValue::dictionary()
            .with("cmd", "clone")
            .with("fullPath", "/a")
            .with("url", 1i64);
        assert_eq!(Command::parse(&payload), Err(ValidationError::Url));
    }

    #[test]
    fn missing_cmd_needs_only_full_path() {
        let payload = HostValue::dictionary().with("fullPath", "/a");
        assert_eq!(Command::parse(&payload), Err(ValidationError::Cmd));

        let payload = HostValue::dictionary()
            .with("fullPath", "/a")
            .with("cmd", true);
        assert_eq!(Command::parse(&payload), Err(ValidationError::Cmd));

        let payload = HostValue::dictionary();
        assert_eq!(Command::parse(&payload), Err(ValidationError::FullPath));
    }

    #[test]
    fn messages_match_the_wire_protocol() {
        assert_eq!(
            Status::Invalid(ValidationError::NotADictionary.to_string()).to_string(),
            "Error: Message was not a dictionary."
        );
        assert_eq!(
            Status::Invalid(ValidationError::Filesystem.to_string()).to_string(),
            "Error: filesystem was missing or not a resource."
        );
        assert_eq!(
            Status::Invalid(ValidationError::FullPath.to_string()).to_string(),
            "Error: fullPath was missing or not a string."
        );
        assert_eq!(
            Status::Invalid(ValidationError::Url.to_string()).to_string(),
            "Error: url was missing or not a string."
        );
        assert_eq!(
            Status::Invalid(ValidationError::Cmd.to_string()).to_string(),
            "Error: cmd was missing or not a string."
        );
    }
}
