//! Fan-out / fan-in
//!
//! One worker per key, each with its own result channel. The orchestrator
//! starts them all, joins them all, and only then drains each channel with a
//! bounded wait. A worker that produced nothing (panicked, or closed without
//! sending) is recorded as [`Collected::Missing`] instead of stalling the rest
//! of the collection, so the outcome always has exactly one entry per key.
//!
//! Entries come back in a `BTreeMap`, ordered by key rather than by finish
//! order.

use anyhow::{Result, bail};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::channel::{ChannelError, Message, RecvEnd, channel};
use crate::worker::{Payload, WorkResult, Worker, WorkerError, WorkerId};

/// Why a worker has no result in the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum MissingReason {
    /// Nothing arrived within the collection timeout.
    Timeout,
    /// The channel closed without a result.
    EndOfStream,
    /// The work function panicked.
    Panicked(String),
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReason::Timeout => write!(f, "no result before timeout"),
            MissingReason::EndOfStream => write!(f, "closed without a result"),
            MissingReason::Panicked(message) => write!(f, "panicked: {message}"),
        }
    }
}

/// One key's entry in a fan-in.
#[derive(Debug, Clone, PartialEq)]
pub enum Collected<R> {
    Reported(WorkResult<R>),
    Missing {
        worker: Option<WorkerId>,
        reason: MissingReason,
    },
}

impl<R> Collected<R> {
    pub fn result(&self) -> Option<&WorkResult<R>> {
        match self {
            Collected::Reported(result) => Some(result),
            Collected::Missing { .. } => None,
        }
    }

    pub fn worker(&self) -> Option<WorkerId> {
        match self {
            Collected::Reported(result) => Some(result.owner),
            Collected::Missing { worker, .. } => *worker,
        }
    }
}

/// Everything gathered by one fan-out run.
#[derive(Debug)]
pub struct FanIn<K, R> {
    pub entries: BTreeMap<K, Collected<R>>,
    pub total: Duration,
}

impl<K: Ord, R> FanIn<K, R> {
    pub fn get(&self, key: &K) -> Option<&Collected<R>> {
        self.entries.get(key)
    }

    pub fn missing(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e, Collected::Missing { .. }))
            .count()
    }
}

/// Runs one worker per key and gathers one entry per key.
#[derive(Debug, Clone)]
pub struct FanOut {
    collect_timeout: Duration,
}

impl FanOut {
    pub fn new(collect_timeout: Duration) -> Self {
        Self { collect_timeout }
    }

    pub fn collect_timeout(&self) -> Duration {
        self.collect_timeout
    }

    /// Run `work_fn` once per key on its own worker.
    ///
    /// Keys must be unique. Errors only when a worker cannot be started.
    pub fn run<K, R, F>(&self, keys: impl IntoIterator<Item = K>, work_fn: F) -> Result<FanIn<K, R>>
    where
        K: Ord + Clone + fmt::Display + Send + 'static,
        R: Send + 'static,
        F: Fn(&K) -> Payload<R> + Send + Sync + 'static,
    {
        let started = Instant::now();
        let keys: Vec<K> = keys.into_iter().collect();
        let mut seen = BTreeSet::new();
        for key in &keys {
            if !seen.insert(key) {
                bail!("Duplicate fan-out key '{key}'");
            }
        }

        let work_fn = Arc::new(work_fn);
        let mut running: Vec<(K, Worker<()>, RecvEnd<WorkResult<R>>)> = Vec::with_capacity(keys.len());

        for key in keys {
            let (mut tx, rx) = channel::<WorkResult<R>>();
            let work_fn = work_fn.clone();
            let bound_key = key.clone();
            let mut worker = Worker::create(format!("fanout-{key}"), move |ctx| {
                let result = ctx.result(work_fn(&bound_key));
                if let Err(err) = tx.send(result) {
                    tracing::warn!(worker = %ctx.id(), %err, "result channel closed before send");
                }
                tx.close();
            });
            // The send endpoint now lives only inside the worker.
            worker.start()?;
            running.push((key, worker, rx));
        }
        tracing::info!(workers = running.len(), "fan-out started");

        let mut joined = Vec::with_capacity(running.len());
        for (key, mut worker, rx) in running {
            let panic = worker.join().err().map(|err| {
                tracing::debug!(%key, code = err.code(), recoverable = err.is_recoverable(), "fan-out worker failed");
                match err {
                    WorkerError::Panicked { message, .. } => MissingReason::Panicked(message),
                    other => MissingReason::Panicked(other.to_string()),
                }
            });
            joined.push((key, worker.id(), rx, panic));
        }

        let mut entries = BTreeMap::new();
        for (key, worker, mut rx, panic) in joined {
            let entry = self.collect_one(&key, worker, &mut rx, panic);
            rx.close();
            entries.insert(key, entry);
        }

        let fan_in = FanIn {
            entries,
            total: started.elapsed(),
        };
        tracing::info!(missing = fan_in.missing(), total = ?fan_in.total, "fan-in complete");
        Ok(fan_in)
    }

    /// Take one key's result with a bounded wait.
    ///
    /// After the join every sender is gone, so an empty channel normally ends
    /// in `EndOfStream`; `Timeout` only happens if a sender is still alive.
    fn collect_one<K: fmt::Display, R>(
        &self,
        key: &K,
        worker: Option<WorkerId>,
        rx: &mut RecvEnd<WorkResult<R>>,
        panicked: Option<MissingReason>,
    ) -> Collected<R> {
        let reason = match rx.recv_timeout(self.collect_timeout) {
            Ok(Message::Value(result)) => return Collected::Reported(result),
            Ok(Message::Sentinel) => MissingReason::EndOfStream,
            Err(ChannelError::Timeout(_)) => MissingReason::Timeout,
            Err(_) => panicked.unwrap_or(MissingReason::EndOfStream),
        };
        tracing::warn!(%key, %reason, "missing fan-out result");
        Collected::Missing { worker, reason }
    }
}
