//! Staged pipelines
//!
//! A pipeline is a chain of workers where each stage's output channel is the
//! next stage's input channel:
//!
//! ```text
//! source ──ch0──▶ stage ──ch1──▶ ... ──chN──▶ sink
//! ```
//!
//! The builder creates each channel and moves its two endpoints into exactly the
//! two workers that use them, so no endpoint is ever held by the orchestrator.
//! The source always ends its stream with one sentinel, every stage forwards it
//! exactly once, and the sink stops on it. A panic inside a source, stage or
//! sink closure is recorded as that worker's error and the worker still ends
//! its stream with one sentinel. Channels are FIFO and each stage
//! handles items in arrival order, so surviving items keep their relative order.
//!
//! [`Pipeline::run`] starts the sink first and the source last: a receiver that
//! is already waiting simply blocks until data arrives.
//!
//! ```rust
//! use pipework::pipeline::{Collect, PipelineBuilder};
//!
//! let report = PipelineBuilder::source("numbers", |out| {
//!     for n in 1..=10u32 {
//!         out.send(n)?;
//!     }
//!     Ok(())
//! })
//! .stage("evens", |n| (n % 2 == 0).then_some(n))
//! .sink("collect", Collect::new())
//! .run()?;
//!
//! assert_eq!(report.output, Some(vec![2, 4, 6, 8, 10]));
//! # Ok::<(), anyhow::Error>(())
//! ```

mod sink;
mod stage;

pub use sink::{Collect, Sink};
pub use stage::{StageReport, StageRole, StageState, run_sink, run_source, run_stage};

use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use crate::channel::{RecvEnd, SendEnd, channel};
use crate::worker::Worker;

/// A pipeline still being wired; `T` is the item type of its open tail channel.
pub struct PipelineBuilder<T> {
    stages: Vec<(Worker<StageReport>, StageRole)>,
    tail: RecvEnd<T>,
}

impl<T: Send + 'static> PipelineBuilder<T> {
    /// Start a pipeline with a source that writes into its output channel.
    ///
    /// The sentinel is sent for the source after `produce` returns, whether it
    /// succeeded or not.
    pub fn source<F>(name: impl Into<String>, produce: F) -> Self
    where
        F: FnOnce(&mut SendEnd<T>) -> Result<()> + Send + 'static,
    {
        let (tx, rx) = channel();
        let worker = Worker::create(name, move |ctx| run_source(ctx, tx, produce));
        Self {
            stages: vec![(worker, StageRole::Source)],
            tail: rx,
        }
    }

    /// Append a stage; items for which `transform` returns `None` are dropped.
    pub fn stage<O, F>(mut self, name: impl Into<String>, transform: F) -> PipelineBuilder<O>
    where
        O: Send + 'static,
        F: FnMut(T) -> Option<O> + Send + 'static,
    {
        let (tx, rx) = channel();
        let input = self.tail;
        let worker = Worker::create(name, move |ctx| run_stage(ctx, input, tx, transform));
        self.stages.push((worker, StageRole::Stage));
        PipelineBuilder {
            stages: self.stages,
            tail: rx,
        }
    }

    /// Terminate the pipeline with a sink.
    pub fn sink<S>(self, name: impl Into<String>, sink: S) -> Pipeline<S::Output>
    where
        S: Sink<T>,
    {
        let input = self.tail;
        let sink = Worker::create(name, move |ctx| run_sink(ctx, input, sink));
        Pipeline {
            stages: self.stages,
            sink,
        }
    }
}

/// A fully wired pipeline, ready to run.
pub struct Pipeline<Out> {
    stages: Vec<(Worker<StageReport>, StageRole)>,
    sink: Worker<(StageReport, Option<Out>)>,
}

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct PipelineReport<Out> {
    /// One report per worker, source first, sink last.
    pub stages: Vec<StageReport>,
    /// What the sink produced, if it finished cleanly.
    pub output: Option<Out>,
    pub total: Duration,
}

impl<Out> PipelineReport<Out> {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    pub fn errors(&self) -> impl Iterator<Item = &StageReport> {
        self.stages.iter().filter(|s| !s.is_ok())
    }
}

impl<Out: Send + 'static> Pipeline<Out> {
    /// Start every worker (sink first), join them all, and collect their reports.
    pub fn run(mut self) -> Result<PipelineReport<Out>> {
        let started = Instant::now();
        let workers = self.stages.len() + 1;

        self.sink
            .start()
            .with_context(|| format!("Failed to start sink '{}'", self.sink.name()))?;
        for (worker, _) in self.stages.iter_mut().rev() {
            worker
                .start()
                .with_context(|| format!("Failed to start stage '{}'", worker.name()))?;
        }
        tracing::info!(workers, "pipeline started");

        let mut reports = Vec::with_capacity(workers);
        for (worker, role) in &mut self.stages {
            let report = worker.join().unwrap_or_else(|err| {
                StageReport::from_worker_error(worker.name(), *role, worker.id(), &err)
            });
            reports.push(report);
        }

        let output = match self.sink.join() {
            Ok((report, output)) => {
                reports.push(report);
                output
            }
            Err(err) => {
                reports.push(StageReport::from_worker_error(
                    self.sink.name(),
                    StageRole::Sink,
                    self.sink.id(),
                    &err,
                ));
                None
            }
        };

        let total = started.elapsed();
        tracing::info!(?total, "pipeline finished");
        Ok(PipelineReport {
            stages: reports,
            output,
            total,
        })
    }
}
