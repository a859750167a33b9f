use anyhow::{Context, Result, anyhow, bail};
use crossbeam::channel::{Receiver, Sender, unbounded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use crate::worker::{ErrorMarker, Payload, WorkResult, Worker, WorkerContext, WorkerId, panic_message};

type Job = Box<dyn FnOnce(&WorkerContext) + Send + 'static>;

/// Per-worker statistics returned when the pool shuts down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolWorkerStats {
    pub worker: Option<WorkerId>,
    pub tasks_run: usize,
    pub panicked: bool,
}

/// Fixed-size pool of reusable worker threads
///
/// Workers pull type-erased jobs from one shared queue, so a single pool can run
/// any number of independent batches with different task and result types.
pub struct WorkerPool {
    job_tx: Option<Sender<Job>>,
    workers: Vec<Worker<usize>>,
}

impl WorkerPool {
    /// Start `size` workers that wait for jobs.
    pub fn new(size: usize) -> Result<Self> {
        if size == 0 {
            bail!("Cannot create WorkerPool with 0 workers");
        }

        let (job_tx, job_rx): (Sender<Job>, Receiver<Job>) = unbounded();
        let mut workers = Vec::with_capacity(size);

        for index in 0..size {
            let job_rx = job_rx.clone();
            let mut worker = Worker::create(format!("pool-worker-{index}"), move |ctx| {
                let mut tasks_run = 0;
                while let Ok(job) = job_rx.recv() {
                    job(ctx);
                    tasks_run += 1;
                }
                tasks_run
            });
            worker
                .start()
                .with_context(|| format!("Failed to start pool worker {index}"))?;
            workers.push(worker);
        }

        tracing::debug!(size, "worker pool started");
        Ok(Self {
            job_tx: Some(job_tx),
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    pub fn worker_ids(&self) -> Vec<WorkerId> {
        self.workers.iter().filter_map(|w| w.id()).collect()
    }

    /// Run `work_fn` over every task and return one result per task, in task order.
    pub fn map_tasks<T, R, F>(&self, work_fn: F, tasks: Vec<T>) -> Result<Vec<WorkResult<R>>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Payload<R> + Send + Sync + 'static,
    {
        self.map_tasks_with_progress(work_fn, tasks, None::<fn(usize, usize, WorkerId)>)
    }

    /// [`map_tasks`](Self::map_tasks) with a progress callback
    ///
    /// The reporter receives `(completed, total, worker_id)` after each task and
    /// runs on the worker thread that finished it.
    pub fn map_tasks_with_progress<T, R, F, P>(
        &self,
        work_fn: F,
        tasks: Vec<T>,
        progress_reporter: Option<P>,
    ) -> Result<Vec<WorkResult<R>>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Payload<R> + Send + Sync + 'static,
        P: Fn(usize, usize, WorkerId) + Send + Sync + 'static,
    {
        let total = tasks.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        let job_tx = self
            .job_tx
            .as_ref()
            .ok_or_else(|| anyhow!("Worker pool has been shut down"))?;
        let (result_tx, result_rx) = unbounded::<(usize, WorkResult<R>)>();

        let work_fn = Arc::new(work_fn);
        let progress_reporter = progress_reporter.map(Arc::new);
        let completed = Arc::new(AtomicUsize::new(0));

        for (index, task) in tasks.into_iter().enumerate() {
            let work_fn = work_fn.clone();
            let result_tx = result_tx.clone();
            let progress_reporter = progress_reporter.clone();
            let completed = completed.clone();

            let job: Job = Box::new(move |ctx| {
                let started = Instant::now();
                let payload = panic::catch_unwind(AssertUnwindSafe(|| work_fn(task)))
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        tracing::warn!(task = index, worker = %ctx.id(), %message, "pool task panicked");
                        Payload::Error(ErrorMarker::panicked(message))
                    });
                let result = WorkResult {
                    payload,
                    owner: ctx.id(),
                    duration: started.elapsed(),
                };

                // Report before sending so every callback has run by the time
                // the collector sees the last result.
                let current = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(reporter) = &progress_reporter {
                    let reported = panic::catch_unwind(AssertUnwindSafe(|| reporter(current, total, ctx.id())));
                    if let Err(panic) = reported {
                        tracing::warn!(task = index, message = %panic_message(panic.as_ref()), "progress reporter panicked");
                    }
                }
                if result_tx.send((index, result)).is_err() {
                    tracing::debug!(task = index, "collector dropped before result arrived");
                }
            });

            job_tx
                .send(job)
                .map_err(|_| anyhow!("Worker pool queue is closed"))?;
        }

        // Jobs own the remaining senders; if one is dropped unrun, recv() below
        // fails instead of waiting forever.
        drop(result_tx);
        self.collect_results(result_rx, total)
    }

    fn collect_results<R>(
        &self,
        result_rx: Receiver<(usize, WorkResult<R>)>,
        total: usize,
    ) -> Result<Vec<WorkResult<R>>> {
        let mut slots: Vec<Option<WorkResult<R>>> = (0..total).map(|_| None).collect();

        for received in 0..total {
            let (index, result) = result_rx
                .recv()
                .map_err(|_| anyhow!("Worker pool lost results: got {received} of {total}"))?;
            slots[index] = Some(result);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or_else(|| anyhow!("Task {index} produced no result")))
            .collect()
    }

    /// Close the queue and join every worker.
    pub fn shutdown(mut self) -> Vec<PoolWorkerStats> {
        self.join_workers()
    }

    fn join_workers(&mut self) -> Vec<PoolWorkerStats> {
        // Dropping the only sender ends each worker's recv loop.
        self.job_tx.take();

        let stats = self
            .workers
            .drain(..)
            .map(|mut worker| {
                let id = worker.id();
                match worker.join() {
                    Ok(tasks_run) => PoolWorkerStats {
                        worker: id,
                        tasks_run,
                        panicked: false,
                    },
                    Err(_) => PoolWorkerStats {
                        worker: id,
                        tasks_run: 0,
                        panicked: true,
                    },
                }
            })
            .collect();
        tracing::debug!("worker pool shut down");
        stats
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.join_workers();
        }
    }
}

/// Calculate the worker count from available cores and configuration limits
///
/// ```text
/// 1. Detect available CPU cores: num_cpus::get()
/// 2. Apply percentage: cores * thread_percentage / 100
/// 3. Apply config limit: min(max_threads, percentage_result) if max_threads > 0
/// 4. Ensure minimum: max(1, final_result)
/// ```
pub fn calculate_optimal_workers(max_threads: usize, thread_percentage: u8) -> usize {
    let available_cores = num_cpus::get();

    let workers_by_percentage =
        std::cmp::max(1, (available_cores * thread_percentage as usize) / 100);

    // 0 means use the percentage calculation only
    if max_threads > 0 {
        std::cmp::min(max_threads, workers_by_percentage)
    } else {
        workers_by_percentage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    fn values<R: Clone>(results: &[WorkResult<R>]) -> Vec<Option<R>> {
        results.iter().map(|r| r.payload.value().cloned()).collect()
    }

    #[test]
    fn test_map_tasks_preserves_order() {
        let pool = WorkerPool::new(4).unwrap();
        // Early tasks sleep longest so they finish last.
        let tasks: Vec<u64> = (0..12).collect();
        let results = pool
            .map_tasks(
                |n| {
                    thread::sleep(Duration::from_millis(24 - n * 2));
                    Payload::Value(n * 10)
                },
                tasks,
            )
            .unwrap();

        let expected: Vec<Option<u64>> = (0..12).map(|n| Some(n * 10)).collect();
        assert_eq!(values(&results), expected);
    }

    #[test]
    fn test_more_tasks_than_workers() {
        let pool = WorkerPool::new(2).unwrap();
        let results = pool
            .map_tasks(|n: usize| Payload::Value(n + 1), (0..1000).collect())
            .unwrap();
        assert_eq!(results.len(), 1000);
        assert_eq!(results[999].payload, Payload::Value(1000));

        let owners: std::collections::HashSet<_> = results.iter().map(|r| r.owner).collect();
        assert!(owners.len() <= 2);
        assert!(owners.iter().all(|id| pool.worker_ids().contains(id)));
    }

    #[test]
    fn test_failures_keep_their_slot() {
        let pool = WorkerPool::new(3).unwrap();
        let results = pool
            .map_tasks(
                |n: i32| match n {
                    2 => Payload::error("bad input"),
                    4 => panic!("task four blew up"),
                    _ => Payload::Value(n),
                },
                (0..6).collect(),
            )
            .unwrap();

        assert_eq!(results.len(), 6);
        assert!(results[2].payload.is_error());
        assert!(results[4].payload.is_error());
        assert_eq!(results[5].payload, Payload::Value(5));

        // The pool survives a panicking task.
        let again = pool.map_tasks(|n: i32| Payload::Value(n), vec![1]).unwrap();
        assert_eq!(again[0].payload, Payload::Value(1));
    }

    #[test]
    fn test_sequential_batches_reuse_workers() {
        let pool = WorkerPool::new(2).unwrap();
        let first = pool
            .map_tasks(|s: String| Payload::Value(s.len()), vec!["a".into(), "bbb".into()])
            .unwrap();
        let second = pool
            .map_tasks(|n: u8| Payload::Value(n as f64 / 2.0), vec![1, 2, 3])
            .unwrap();
        assert_eq!(values(&first), vec![Some(1), Some(3)]);
        assert_eq!(values(&second), vec![Some(0.5), Some(1.0), Some(1.5)]);

        let stats = pool.shutdown();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats.iter().map(|s| s.tasks_run).sum::<usize>(), 5);
        assert!(stats.iter().all(|s| !s.panicked));
    }

    #[test]
    fn test_progress_reporter_sees_every_task() {
        let pool = WorkerPool::new(3).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        pool.map_tasks_with_progress(
            |n: u32| Payload::Value(n),
            (0..20).collect(),
            Some(move |current: usize, total: usize, _worker: WorkerId| {
                sink.lock().unwrap().push((current, total));
            }),
        )
        .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen.len(), 20);
        assert_eq!(seen.last(), Some(&(20, 20)));
    }

    #[test]
    fn test_panicking_reporter_keeps_every_result() {
        let pool = WorkerPool::new(1).unwrap();
        let results = pool
            .map_tasks_with_progress(
                |n: u32| Payload::Value(n),
                (0..4).collect(),
                Some(|current: usize, _total: usize, _worker: WorkerId| {
                    if current == 1 {
                        panic!("progress display broke");
                    }
                }),
            )
            .unwrap();

        assert_eq!(values(&results), vec![Some(0), Some(1), Some(2), Some(3)]);
        let stats = pool.shutdown();
        assert!(!stats[0].panicked);
        assert_eq!(stats[0].tasks_run, 4);
    }

    #[test]
    fn test_empty_batch_and_zero_size() {
        let pool = WorkerPool::new(1).unwrap();
        let results = pool.map_tasks(|n: u8| Payload::Value(n), Vec::new()).unwrap();
        assert!(results.is_empty());
        assert!(WorkerPool::new(0).is_err());
    }

    #[test]
    fn test_optimal_workers_calculation() {
        assert!(calculate_optimal_workers(0, 75) >= 1);
        assert!(calculate_optimal_workers(2, 100) <= 2);
        assert!(calculate_optimal_workers(0, 1) >= 1);
    }
}
