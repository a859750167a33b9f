//! Fixed-size worker pool for batch execution
//!
//! The pool owns `size` long-lived worker threads fed from one job queue. A batch
//! submitted through [`WorkerPool::map_tasks`] comes back as one [`WorkResult`]
//! per task **in task order**, whichever worker ran it and whenever it finished.
//! A task that fails or panics still fills its slot, with an error payload.
//!
//! # Responsibilities
//!
//! ## What This Module Does:
//! - **Resource Discovery**: sizes the pool from available cores via `num_cpus::get()`
//! - **Task Distribution**: crossbeam queue shared by every worker, unbounded so
//!   submitting a large batch never blocks the orchestrator
//! - **Ordered Collection**: results are slotted by task index before returning
//! - **Reuse**: independent batches run back to back on the same workers
//!
//! ## What This Module Does NOT Do:
//! - **Domain Logic**: task and result types belong to the caller
//! - **Retries**: a failed task is reported once and never resubmitted
//! - **Dynamic Scaling**: the worker count is fixed at construction
//!
//! # Example
//!
//! ```rust
//! use pipework::pool::WorkerPool;
//! use pipework::worker::Payload;
//!
//! let pool = WorkerPool::new(4)?;
//! let results = pool.map_tasks(|n: u32| Payload::Value(n * n), vec![1, 2, 3])?;
//! let squares: Vec<u32> = results.into_iter().filter_map(|r| r.payload.into_value()).collect();
//! assert_eq!(squares, vec![1, 4, 9]);
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! [`WorkResult`]: crate::worker::WorkResult

pub mod core;
pub mod progress;

pub use self::core::{PoolWorkerStats, WorkerPool, calculate_optimal_workers};
pub use progress::BatchProgress;
