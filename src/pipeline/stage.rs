use anyhow::Result;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::{Duration, Instant};

use super::sink::Sink;
use crate::channel::{ChannelError, Message, RecvEnd, SendEnd};
use crate::worker::{WorkerContext, WorkerError, WorkerId, panic_message};

/// Position of a worker in a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageRole {
    Source,
    Stage,
    Sink,
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageRole::Source => write!(f, "source"),
            StageRole::Stage => write!(f, "stage"),
            StageRole::Sink => write!(f, "sink"),
        }
    }
}

/// Where a stage is in its loop.
///
/// ```text
/// WaitingForInput → Processing → Forwarding ─┐
///        ▲                                   │
///        └───────────────────────────────────┘
///        │ sentinel / end of stream
///        ▼
///     Draining → Closed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    WaitingForInput,
    Processing,
    Forwarding,
    Draining,
    Closed,
}

/// What one pipeline worker did, returned from its thread.
#[derive(Debug, Clone)]
pub struct StageReport {
    pub name: String,
    pub role: StageRole,
    pub worker: Option<WorkerId>,
    pub state: StageState,
    /// Values taken from the input channel.
    pub received: usize,
    /// Values sent to the output channel.
    pub forwarded: usize,
    /// The input ended with a sentinel rather than a bare close.
    pub sentinel_seen: bool,
    /// A sentinel was delivered downstream.
    pub sentinel_forwarded: bool,
    pub duration: Duration,
    pub error: Option<String>,
    started: Option<Instant>,
}

impl StageReport {
    fn begin(ctx: &WorkerContext, role: StageRole) -> Self {
        Self {
            name: ctx.name().to_string(),
            role,
            worker: Some(ctx.id()),
            state: StageState::WaitingForInput,
            received: 0,
            forwarded: 0,
            sentinel_seen: false,
            sentinel_forwarded: false,
            duration: Duration::ZERO,
            error: None,
            started: Some(Instant::now()),
        }
    }

    /// Report for a worker whose thread died before it could report.
    pub fn from_worker_error(
        name: &str,
        role: StageRole,
        worker: Option<WorkerId>,
        err: &WorkerError,
    ) -> Self {
        Self {
            name: name.to_string(),
            role,
            worker,
            state: StageState::Closed,
            received: 0,
            forwarded: 0,
            sentinel_seen: false,
            sentinel_forwarded: false,
            duration: Duration::ZERO,
            error: Some(err.to_string()),
            started: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn advance(&mut self, next: StageState) {
        if self.state != next {
            tracing::trace!(stage = %self.name, from = ?self.state, to = ?next, "stage transition");
            self.state = next;
        }
    }

    fn fail(&mut self, err: impl fmt::Display) {
        let message = format!("{err:#}");
        tracing::warn!(stage = %self.name, error = %message, "stage failed");
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    fn fail_panicked(&mut self, panic: &(dyn std::any::Any + Send)) {
        self.fail(format_args!("panicked: {}", panic_message(panic)));
    }

    fn forward_sentinel<T>(&mut self, output: &mut SendEnd<T>) {
        self.advance(StageState::Draining);
        match output.finish() {
            Ok(()) => self.sentinel_forwarded = true,
            Err(err) => self.fail(err),
        }
    }

    fn close(mut self) -> Self {
        self.advance(StageState::Closed);
        if let Some(started) = self.started {
            self.duration = started.elapsed();
        }
        tracing::debug!(
            stage = %self.name,
            role = %self.role,
            received = self.received,
            forwarded = self.forwarded,
            "stage closed"
        );
        self
    }
}

enum Next<T> {
    Item(T),
    Stop,
}

/// Receive the next value, recording how the stream ended.
fn next_item<T>(input: &mut RecvEnd<T>, report: &mut StageReport) -> Next<T> {
    report.advance(StageState::WaitingForInput);
    match input.recv() {
        Ok(Message::Value(item)) => {
            report.advance(StageState::Processing);
            Next::Item(item)
        }
        Ok(Message::Sentinel) => {
            report.sentinel_seen = true;
            Next::Stop
        }
        Err(ChannelError::EndOfStream) => {
            tracing::warn!(stage = %report.name, "upstream closed without a sentinel");
            Next::Stop
        }
        Err(err) => {
            tracing::debug!(stage = %report.name, code = err.code(), recoverable = err.is_recoverable(), "receive failed");
            report.fail(err);
            Next::Stop
        }
    }
}

/// Run a source: produce values, then send the sentinel and close, whatever
/// `produce` returned.
pub fn run_source<T, F>(ctx: &WorkerContext, mut output: SendEnd<T>, produce: F) -> StageReport
where
    F: FnOnce(&mut SendEnd<T>) -> Result<()>,
{
    let mut report = StageReport::begin(ctx, StageRole::Source);
    report.advance(StageState::Processing);
    match panic::catch_unwind(AssertUnwindSafe(|| produce(&mut output))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => report.fail(err),
        Err(panic) => report.fail_panicked(panic.as_ref()),
    }
    report.forwarded = output.sent();
    report.forward_sentinel(&mut output);
    report.close()
}

/// Run an intermediate stage: transform or filter each value and forward the
/// survivors; on end of input forward exactly one sentinel and close both ends.
pub fn run_stage<I, O, F>(
    ctx: &WorkerContext,
    mut input: RecvEnd<I>,
    mut output: SendEnd<O>,
    mut transform: F,
) -> StageReport
where
    F: FnMut(I) -> Option<O>,
{
    let mut report = StageReport::begin(ctx, StageRole::Stage);

    while let Next::Item(item) = next_item(&mut input, &mut report) {
        let out = match panic::catch_unwind(AssertUnwindSafe(|| transform(item))) {
            Ok(Some(out)) => out,
            Ok(None) => continue,
            Err(panic) => {
                report.fail_panicked(panic.as_ref());
                break;
            }
        };
        report.advance(StageState::Forwarding);
        if let Err(err) = output.send(out) {
            report.fail(err);
            break;
        }
    }

    input.close();
    report.received = input.received();
    report.forwarded = output.sent();
    report.forward_sentinel(&mut output);
    report.close()
}

/// Run the terminal stage: feed every value to `sink`, then finalize it.
pub fn run_sink<I, S>(
    ctx: &WorkerContext,
    mut input: RecvEnd<I>,
    mut sink: S,
) -> (StageReport, Option<S::Output>)
where
    S: Sink<I>,
{
    let mut report = StageReport::begin(ctx, StageRole::Sink);

    while let Next::Item(item) = next_item(&mut input, &mut report) {
        match panic::catch_unwind(AssertUnwindSafe(|| sink.consume(item))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                report.fail(err);
                break;
            }
            Err(panic) => {
                report.fail_panicked(panic.as_ref());
                break;
            }
        }
    }

    input.close();
    report.received = input.received();
    report.advance(StageState::Draining);
    let output = match panic::catch_unwind(AssertUnwindSafe(|| sink.finish())) {
        Ok(Ok(output)) => Some(output),
        Ok(Err(err)) => {
            report.fail(err);
            None
        }
        Err(panic) => {
            report.fail_panicked(panic.as_ref());
            None
        }
    };
    (report.close(), output)
}
