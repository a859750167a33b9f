//! Pluggable work functions and one orchestration per pattern
//!
//! | Job | Pattern | Substrate |
//! |-----|---------|-----------|
//! | [`vowels`] | fan-out / fan-in | [`FanOut`](crate::fanout::FanOut) |
//! | [`ips`] | three-stage pipeline | [`PipelineBuilder`](crate::pipeline::PipelineBuilder) |
//! | [`grades`] | shared-lock append, pool batches | [`SharedResource`](crate::shared::SharedResource), [`WorkerPool`](crate::pool::WorkerPool) |
//! | [`movies`] | two-stage pipeline | [`PipelineBuilder`](crate::pipeline::PipelineBuilder) |
//!
//! The work functions are plain synchronous functions with no knowledge of
//! threads; the `run*` functions wire them onto workers and return data for
//! the caller to report.

pub mod grades;
pub mod ips;
pub mod movies;
pub mod vowels;
