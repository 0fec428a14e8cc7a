//! The status strings posted back to the host.
//!
//! ```text
//! READY|                               default area opened, mounts in place
//! STAT|<message>                       informational
//! ERR|<message> -- Error #: <code>     a task failed
//! Error: <reason>                      a command was rejected before queueing
//! ```

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

/// One outbound status message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ready,
    Stat(String),
    Err { message: String, code: i32 },
    /// Validation failure; rendered without a `|` prefix.
    Invalid(String),
}

impl Status {
    pub fn stat(message: impl Into<String>) -> Self {
        Status::Stat(message.into())
    }

    pub fn error(message: impl Into<String>, code: i32) -> Self {
        Status::Err {
            message: message.into(),
            code,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Err { .. } | Status::Invalid(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ready => write!(f, "READY|"),
            Status::Stat(message) => write!(f, "STAT|{}", message),
            Status::Err { message, code } => write!(f, "ERR|{} -- Error #: {}", message, code),
            Status::Invalid(reason) => write!(f, "Error: {}", reason),
        }
    }
}

/// Where status messages go.
///
/// Posted from both the command-handling thread and the worker.
pub trait StatusSink: Send + Sync {
    fn post(&self, status: Status);
}

impl<F> StatusSink for F
where
    F: Fn(Status) + Send + Sync,
{
    fn post(&self, status: Status) {
        self(status)
    }
}

/// Keeps every posted status in order.
#[derive(Clone, Default)]
pub struct RecordingSink {
    statuses: Arc<Mutex<Vec<Status>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(&self) -> Vec<Status> {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Rendered wire strings, in posting order.
    pub fn messages(&self) -> Vec<String> {
        self.statuses().iter().map(Status::to_string).collect()
    }

    pub fn clear(&self) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl StatusSink for RecordingSink {
    fn post(&self, status: Status) {
        self.statuses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format() {
        assert_eq!(Status::Ready.to_string(), "READY|");
        assert_eq!(
            Status::stat("filesystem_resource=3").to_string(),
            "STAT|filesystem_resource=3"
        );
        assert_eq!(
            Status::error("Failed to open file system", -10).to_string(),
            "ERR|Failed to open file system -- Error #: -10"
        );
        assert_eq!(
            Status::Invalid("cmd was missing or not a string.".into()).to_string(),
            "Error: cmd was missing or not a string."
        );
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::new();
        sink.post(Status::Ready);
        sink.post(Status::stat("one"));
        assert_eq!(sink.messages(), vec!["READY|", "STAT|one"]);

        sink.clear();
        assert!(sink.statuses().is_empty());
    }

    #[test]
    fn closures_are_sinks() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_sink = Arc::clone(&seen);
        let sink = move |status: Status| seen_in_sink.lock().unwrap().push(status.is_error());

        sink.post(Status::Ready);
        sink.post(Status::Invalid("x".into()));
        assert_eq!(*seen.lock().unwrap(), vec![false, true]);
    }
}
