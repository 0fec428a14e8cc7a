//! One embedded instance: a worker, its queue, and the router in front.

use std::io;
use std::sync::Arc;

use gitsalt_vfs::code;

use crate::backend::HostStorage;
use crate::clone::CloneEngine;
use crate::command::{CommandRouter, RouteError};
use crate::config::{ConfigError, InstanceConfig};
use crate::status::{Status, StatusSink};
use crate::value::HostValue;
use crate::work_queue::{QueueClosed, WorkQueue};
use crate::worker::Worker;

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to start worker: {0}")]
    Spawn(#[from] io::Error),

    #[error(transparent)]
    Closed(#[from] QueueClosed),
}

/// Owns the worker for its whole life. Starting an instance queues the
/// startup task before anything else can be queued; dropping it drains the
/// queue and joins the worker.
pub struct Instance {
    queue: WorkQueue<Worker>,
    router: CommandRouter,
}

impl Instance {
    pub fn start(
        config: InstanceConfig,
        host: Box<dyn HostStorage>,
        engine: Box<dyn CloneEngine>,
        sink: Arc<dyn StatusSink>,
    ) -> Result<Self, InstanceError> {
        config.validate()?;
        let name = config.worker_name.clone();
        let worker = Worker::new(config, host, engine, Arc::clone(&sink));

        let panic_sink = Arc::clone(&sink);
        let queue = WorkQueue::start(name, worker, move |message: &str| {
            panic_sink.post(Status::error(
                format!("task panicked: {}", message),
                code::FAILED,
            ));
        })?;
        queue.enqueue(Worker::startup)?;

        let router = CommandRouter::new(queue.handle(), sink);
        Ok(Self { queue, router })
    }

    /// Validate and queue one inbound message.
    pub fn handle_message(&self, payload: &HostValue) -> Result<(), RouteError> {
        self.router.handle(payload)
    }

    /// A router that can be handed to another thread.
    pub fn router(&self) -> CommandRouter {
        self.router.clone()
    }

    /// Queue an arbitrary task behind everything already queued.
    pub fn enqueue<F>(&self, task: F) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut Worker) + Send + 'static,
    {
        self.queue.enqueue(task)
    }

    pub fn pending(&self) -> u64 {
        self.queue.pending()
    }

    pub fn submitted(&self) -> u64 {
        self.queue.submitted()
    }

    /// Block until everything queued so far has run.
    pub fn flush(&self) {
        self.queue.flush()
    }

    /// Stop accepting work, drain the queue, join the worker and return its
    /// final state.
    pub fn shutdown(self) -> Option<Worker> {
        self.queue.shutdown()
    }
}
