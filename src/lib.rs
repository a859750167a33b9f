//! # pipework - concurrent pipelines over OS threads
//!
//! A small substrate for running independent workers connected by
//! single-sender/single-receiver channels, plus four jobs built on it.
//!
//! ## Building blocks
//!
//! - [`channel`]: FIFO channels with an explicit end-of-stream sentinel
//! - [`worker`]: worker lifecycle (create, start, join) and structured results
//! - [`pipeline`]: staged pipelines wired by a typed builder
//! - [`fanout`]: one worker per key, bounded collection, missing-result markers
//! - [`pool`]: fixed-size reusable pool with order-preserving `map_tasks`
//! - [`shared`]: mutex-guarded shared resources and an append-only line file
//! - [`report`]: sorted, serializable run reports
//!
//! ## Quick Start
//!
//! ```bash
//! pipework vowels --input texto.txt
//! pipework ips --count 20
//! pipework grades --mode pool --progress
//! pipework movies --year 1999 --input movies.txt
//! ```

pub mod channel;
pub mod cli;
pub mod config;
pub mod fanout;
pub mod jobs;
pub mod pipeline;
pub mod pool;
pub mod report;
pub mod shared;
pub mod worker;

pub use cli::{Cli, Output};
pub use config::PipeworkConfig;

/// Result type alias for pipework operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
