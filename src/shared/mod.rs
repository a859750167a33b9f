//! Mutex-guarded shared resources
//!
//! [`SharedResource`] is the lock handle the orchestrator creates once and hands
//! (by cloning the handle, not the resource) to every worker that writes to the
//! common sink. The critical section runs under a `MutexGuard`, so the lock is
//! released on every exit path: normal return, `?` propagation, or a panic.

mod append;

pub use append::AppendFile;

use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A resource shared by reference across workers under one lock.
#[derive(Debug)]
pub struct SharedResource<S> {
    inner: Arc<Mutex<S>>,
}

impl<S> Clone for SharedResource<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S> SharedResource<S> {
    pub fn new(resource: S) -> Self {
        Self {
            inner: Arc::new(Mutex::new(resource)),
        }
    }

    /// Run `critical_section` while holding the lock.
    ///
    /// A previous holder that panicked leaves the mutex poisoned; the resource
    /// is still handed out, since each critical section is one complete unit.
    pub fn with_lock<T, F>(&self, critical_section: F) -> Result<T>
    where
        F: FnOnce(&mut S) -> Result<T>,
    {
        let mut guard = self.lock();
        critical_section(&mut guard)
    }

    /// Take the resource back once every other handle has been dropped.
    pub fn into_inner(self) -> Option<S> {
        Arc::try_unwrap(self.inner)
            .ok()
            .map(|mutex| mutex.into_inner().unwrap_or_else(PoisonError::into_inner))
    }

    /// Number of live handles, including this one.
    pub fn handles(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    fn lock(&self) -> MutexGuard<'_, S> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("shared resource lock was poisoned by a panicking holder");
            poisoned.into_inner()
        })
    }
}

impl SharedResource<AppendFile> {
    /// Append one complete line under the lock.
    pub fn append_line(&self, line: &str) -> Result<()> {
        self.with_lock(|file| file.append_line(line))
    }
}
