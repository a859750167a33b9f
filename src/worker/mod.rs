//! Worker lifecycle
//!
//! A [`Worker`] is one OS thread running one bound work function. Its state only
//! moves forward:
//!
//! ```text
//! Created ──start()──▶ Started ──(thread runs)──▶ Running ──join()──▶ Joined
//! ```
//!
//! The work function receives a [`WorkerContext`] carrying the worker's identity
//! and start time so it can build its own [`WorkResult`]; workers never print.
//! Channel endpoints are bound by moving them into the work closure, which means
//! they are dropped (closed) on every exit path of the thread, panics included.

mod error;
mod result;

pub use error::WorkerError;
pub use result::{ERROR_COUNT, ErrorMarker, Payload, WorkResult, WorkerId};

use crossbeam::channel::{Receiver, RecvTimeoutError, bounded};
use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lifecycle state of a [`Worker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum WorkerState {
    Created = 0,
    Started = 1,
    Running = 2,
    Joined = 3,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Created,
            1 => WorkerState::Started,
            2 => WorkerState::Running,
            _ => WorkerState::Joined,
        }
    }
}

/// Passed to the work function running inside a worker.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    id: WorkerId,
    name: String,
    started: Instant,
}

impl WorkerContext {
    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Wrap a payload into a result owned by this worker, timed from thread start.
    pub fn result<T>(&self, payload: Payload<T>) -> WorkResult<T> {
        WorkResult {
            payload,
            owner: self.id,
            duration: self.elapsed(),
        }
    }
}

type WorkFn<R> = Box<dyn FnOnce(&WorkerContext) -> R + Send + 'static>;

/// Handle to an independently scheduled unit of work.
pub struct Worker<R> {
    name: String,
    state: Arc<AtomicU8>,
    work: Option<WorkFn<R>>,
    handle: Option<JoinHandle<R>>,
    done_rx: Option<Receiver<()>>,
    id: Option<WorkerId>,
}

impl<R: Send + 'static> Worker<R> {
    /// Bind a work function (and whatever endpoints it captured) to a new worker.
    pub fn create<F>(name: impl Into<String>, work: F) -> Self
    where
        F: FnOnce(&WorkerContext) -> R + Send + 'static,
    {
        Self {
            name: name.into(),
            state: Arc::new(AtomicU8::new(WorkerState::Created as u8)),
            work: Some(Box::new(work)),
            handle: None,
            done_rx: None,
            id: None,
        }
    }

    /// Spawn the thread and begin executing the work function.
    pub fn start(&mut self) -> Result<WorkerId, WorkerError> {
        let work = self
            .work
            .take()
            .ok_or_else(|| WorkerError::AlreadyStarted(self.name.clone()))?;

        let id = WorkerId::next();
        let context = WorkerContext {
            id,
            name: self.name.clone(),
            started: Instant::now(),
        };
        // The sender is never used: it is dropped when the thread exits, which
        // is what join_timeout() waits for.
        let (done_tx, done_rx) = bounded::<()>(0);
        let state = self.state.clone();

        self.state.store(WorkerState::Started as u8, Ordering::SeqCst);
        let spawned = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                let _done = done_tx;
                state.store(WorkerState::Running as u8, Ordering::SeqCst);
                work(&context)
            });

        match spawned {
            Ok(handle) => {
                tracing::debug!(worker = %id, name = %self.name, "worker started");
                self.handle = Some(handle);
                self.done_rx = Some(done_rx);
                self.id = Some(id);
                Ok(id)
            }
            Err(err) => {
                self.state.store(WorkerState::Joined as u8, Ordering::SeqCst);
                Err(WorkerError::Spawn {
                    name: self.name.clone(),
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Block until the worker finishes and return what the work function returned.
    pub fn join(&mut self) -> Result<R, WorkerError> {
        let handle = self.take_handle()?;
        self.finish(handle)
    }

    /// Wait at most `timeout` for the worker to finish.
    ///
    /// `Ok(None)` means it is still running; the worker stays joinable.
    pub fn join_timeout(&mut self, timeout: Duration) -> Result<Option<R>, WorkerError> {
        self.ensure_joinable()?;
        if let Some(done_rx) = &self.done_rx {
            match done_rx.recv_timeout(timeout) {
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            }
        }
        self.join().map(Some)
    }

    pub fn id(&self) -> Option<WorkerId> {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn ensure_joinable(&self) -> Result<(), WorkerError> {
        match self.state() {
            WorkerState::Created => Err(WorkerError::NotStarted(self.name.clone())),
            WorkerState::Joined => Err(WorkerError::AlreadyJoined(self.name.clone())),
            WorkerState::Started | WorkerState::Running => Ok(()),
        }
    }

    fn take_handle(&mut self) -> Result<JoinHandle<R>, WorkerError> {
        self.ensure_joinable()?;
        self.handle
            .take()
            .ok_or_else(|| WorkerError::AlreadyJoined(self.name.clone()))
    }

    fn finish(&mut self, handle: JoinHandle<R>) -> Result<R, WorkerError> {
        let outcome = handle.join();
        self.state.store(WorkerState::Joined as u8, Ordering::SeqCst);
        self.done_rx = None;
        match outcome {
            Ok(value) => {
                tracing::debug!(name = %self.name, "worker joined");
                Ok(value)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(name = %self.name, %message, "worker panicked");
                Err(WorkerError::Panicked {
                    name: self.name.clone(),
                    message,
                })
            }
        }
    }
}

impl<R> std::fmt::Debug for Worker<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("state", &WorkerState::from_u8(self.state.load(Ordering::SeqCst)))
            .finish()
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Message, channel};

    #[test]
    fn test_lifecycle_moves_forward() {
        let mut worker = Worker::create("adder", |_ctx| 2 + 2);
        assert_eq!(worker.state(), WorkerState::Created);
        assert!(worker.id().is_none());

        let id = worker.start().unwrap();
        assert!(worker.state() >= WorkerState::Started);
        assert_eq!(worker.id(), Some(id));

        assert_eq!(worker.join().unwrap(), 4);
        assert_eq!(worker.state(), WorkerState::Joined);
    }

    #[test]
    fn test_lifecycle_misuse_is_rejected() {
        let mut worker = Worker::create("noop", |_ctx| ());
        assert_eq!(
            worker.join().unwrap_err(),
            WorkerError::NotStarted("noop".into())
        );

        worker.start().unwrap();
        assert_eq!(
            worker.start().unwrap_err(),
            WorkerError::AlreadyStarted("noop".into())
        );

        worker.join().unwrap();
        assert_eq!(
            worker.join().unwrap_err(),
            WorkerError::AlreadyJoined("noop".into())
        );
    }

    #[test]
    fn test_panic_becomes_error() {
        let mut worker = Worker::create("boom", |_ctx| -> u8 { panic!("exploded") });
        worker.start().unwrap();
        let err = worker.join().unwrap_err();
        assert_eq!(err.code(), "WORKER_PANICKED");
        assert!(err.to_string().contains("exploded"));
        assert_eq!(worker.state(), WorkerState::Joined);
    }

    #[test]
    fn test_join_timeout_reports_still_running() {
        let (mut gate_tx, mut gate_rx) = channel::<()>();
        let mut worker = Worker::create("gated", move |_ctx| {
            let _ = gate_rx.recv();
            "released"
        });
        worker.start().unwrap();

        assert_eq!(worker.join_timeout(Duration::from_millis(20)).unwrap(), None);
        assert!(worker.state() < WorkerState::Joined);

        gate_tx.send(()).unwrap();
        assert_eq!(
            worker.join_timeout(Duration::from_secs(5)).unwrap(),
            Some("released")
        );
    }

    #[test]
    fn test_panicking_worker_closes_its_endpoint() {
        let (tx, mut rx) = channel::<u32>();
        let mut worker = Worker::<()>::create("dies-holding-sender", move |_ctx| {
            let _tx = tx;
            panic!("lost");
        });
        worker.start().unwrap();
        assert!(worker.join().is_err());
        assert!(rx.recv().unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_context_builds_owned_result() {
        let (mut tx, mut rx) = channel();
        let mut worker = Worker::create("reporter", move |ctx| {
            tx.send(ctx.result(Payload::Value(ctx.name().len()))).unwrap();
            ctx.id()
        });
        worker.start().unwrap();
        let id = worker.join().unwrap();

        match rx.recv().unwrap() {
            Message::Value(result) => {
                assert_eq!(result.owner, id);
                assert_eq!(result.payload, Payload::Value("reporter".len()));
            }
            Message::Sentinel => panic!("unexpected sentinel"),
        }
    }
}
