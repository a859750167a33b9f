use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::worker::WorkerId;

/// Progress bar for one pool batch
///
/// Cloning shares the same bar, so a clone can be moved into the pool's
/// progress callback while the orchestrator keeps one to finish it.
#[derive(Clone)]
pub struct BatchProgress {
    bar: ProgressBar,
}

impl BatchProgress {
    pub fn new(total: usize, label: &str) -> Self {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>5}/{len:5} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");
        bar.set_style(style);
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar }
    }

    /// A bar that draws nothing; used when progress display is off.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Callback suitable for [`WorkerPool::map_tasks_with_progress`](super::WorkerPool::map_tasks_with_progress).
    pub fn reporter(&self) -> impl Fn(usize, usize, WorkerId) + Send + Sync + 'static {
        let bar = self.bar.clone();
        move |_current, total, worker| {
            bar.set_length(total as u64);
            bar.inc(1);
            bar.set_message(format!("last: {worker}"));
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::WorkerPool;
    use crate::worker::Payload;

    #[test]
    fn test_reporter_tracks_completed_tasks() {
        let progress = BatchProgress::hidden();
        let pool = WorkerPool::new(2).unwrap();
        pool.map_tasks_with_progress(
            |n: u8| Payload::Value(n),
            (0..8).collect(),
            Some(progress.reporter()),
        )
        .unwrap();

        assert_eq!(progress.position(), 8);
        progress.finish("done");
    }
}
