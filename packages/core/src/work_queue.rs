//! Single-consumer serialized task runner.
//!
//! One named worker thread owns a piece of state `S` and runs boxed closures
//! against it, one at a time, in the order they were enqueued. Producers hold
//! a cheap [`QueueHandle`] and never touch `S` directly.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

/// A unit of work run on the worker thread.
pub type Task<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

/// The queue no longer accepts work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("worker is not running")]
pub struct QueueClosed;

#[derive(Default)]
struct Progress {
    submitted: u64,
    finished: u64,
    /// The worker thread has returned or unwound.
    exited: bool,
}

struct Shared<S> {
    sender: Mutex<Option<Sender<Task<S>>>>,
    progress: Mutex<Progress>,
    finished: Condvar,
}

impl<S> Shared<S> {
    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn finish_one(&self) {
        self.progress().finished += 1;
        self.finished.notify_all();
    }

    fn mark_exited(&self) {
        self.progress().exited = true;
        self.finished.notify_all();
    }
}

/// Marks the worker as gone however its thread ends, so `flush` never waits
/// on a dead worker.
struct ExitGuard<S>(Arc<Shared<S>>);

impl<S> Drop for ExitGuard<S> {
    fn drop(&mut self) {
        self.0.mark_exited();
    }
}

/// Producer side of a [`WorkQueue`].
pub struct QueueHandle<S> {
    shared: Arc<Shared<S>>,
}

impl<S> Clone for QueueHandle<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S> QueueHandle<S> {
    /// Append a task. Returns without waiting for it to run.
    pub fn enqueue<F>(&self, task: F) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        let sender = self
            .shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(QueueClosed)?;

        // Count before sending so the worker can never finish a task that
        // has not been counted yet.
        let mut progress = self.shared.progress();
        sender.send(Box::new(task)).map_err(|_| QueueClosed)?;
        progress.submitted += 1;
        Ok(())
    }

    /// Tasks enqueued but not yet finished.
    pub fn pending(&self) -> u64 {
        let progress = self.shared.progress();
        progress.submitted - progress.finished
    }

    /// Total tasks ever accepted.
    pub fn submitted(&self) -> u64 {
        self.shared.progress().submitted
    }

    pub fn is_closed(&self) -> bool {
        self.shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// True once the worker thread has ended, normally or by panicking
    /// outside a task.
    pub fn has_exited(&self) -> bool {
        self.shared.progress().exited
    }

    /// Block until every task enqueued before this call has finished, or the
    /// worker thread has ended.
    ///
    /// Must not be called from a task: the worker would wait on itself.
    pub fn flush(&self) {
        let mut progress = self.shared.progress();
        let target = progress.submitted;
        while progress.finished < target && !progress.exited {
            progress = self
                .shared
                .finished
                .wait(progress)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

/// The worker thread plus its queue. Dropping it closes the queue, lets the
/// worker drain what was already enqueued, and joins it.
pub struct WorkQueue<S: Send + 'static> {
    name: String,
    handle: QueueHandle<S>,
    worker: Option<JoinHandle<S>>,
}

impl<S: Send + 'static> WorkQueue<S> {
    /// Spawn the worker thread `name` owning `state`.
    ///
    /// A task that panics is caught, `on_panic` is called with the panic
    /// message, and the worker moves on to the next task.
    pub fn start<P>(name: impl Into<String>, state: S, on_panic: P) -> io::Result<Self>
    where
        P: Fn(&str) + Send + 'static,
    {
        let name = name.into();
        let (sender, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared {
            sender: Mutex::new(Some(sender)),
            progress: Mutex::new(Progress::default()),
            finished: Condvar::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker_name = name.clone();
        let worker = thread::Builder::new().name(name.clone()).spawn(move || {
            let _exit = ExitGuard(Arc::clone(&worker_shared));
            run_worker(&worker_name, state, receiver, &worker_shared, on_panic)
        })?;

        log::info!("Started worker '{}'", name);
        Ok(Self {
            name,
            handle: QueueHandle { shared },
            worker: Some(worker),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> QueueHandle<S> {
        self.handle.clone()
    }

    pub fn enqueue<F>(&self, task: F) -> Result<(), QueueClosed>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.handle.enqueue(task)
    }

    pub fn pending(&self) -> u64 {
        self.handle.pending()
    }

    pub fn submitted(&self) -> u64 {
        self.handle.submitted()
    }

    pub fn flush(&self) {
        self.handle.flush()
    }

    /// Close the queue, wait for the worker to drain it, and hand back the
    /// worker's state. `None` if the worker thread itself died.
    pub fn shutdown(mut self) -> Option<S> {
        self.close_and_join()
    }

    fn close_and_join(&mut self) -> Option<S> {
        self.handle
            .shared
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let worker = self.worker.take()?;
        match worker.join() {
            Ok(state) => {
                log::info!("Stopped worker '{}'", self.name);
                Some(state)
            }
            Err(_) => {
                log::error!("Worker '{}' died", self.name);
                None
            }
        }
    }
}

impl<S: Send + 'static> Drop for WorkQueue<S> {
    fn drop(&mut self) {
        self.close_and_join();
    }
}

fn run_worker<S, P>(
    name: &str,
    mut state: S,
    receiver: Receiver<Task<S>>,
    shared: &Shared<S>,
    on_panic: P,
) -> S
where
    P: Fn(&str),
{
    while let Ok(task) = receiver.recv() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task(&mut state))) {
            let message = panic_message(payload.as_ref());
            log::error!("Task on worker '{}' panicked: {}", name, message);
            on_panic(&message);
        }
        shared.finish_one();
    }
    state
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
