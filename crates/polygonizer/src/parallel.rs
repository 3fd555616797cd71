//! Fixed-size worker pool running one job per worker at a time.
//!
//! Each worker is a tokio task with its own job channel; the job body runs
//! on the blocking thread pool. Completions flow back over one shared
//! channel that [`WorkerPool::start`] drains, dispatching the next pending
//! job onto whichever slot just became free.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::{
    error::{PolygonizerError, Result},
    traits::WorkerTask,
};

/// Workers used when the platform cannot report its parallelism
const FALLBACK_CONCURRENCY: usize = 8;

/// Hardware threads minus one for the caller, never below one
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(FALLBACK_CONCURRENCY)
        .saturating_sub(1)
        .max(1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    /// Upper bound on live workers
    #[schemars(range(min = 1))]
    pub max_workers: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: default_concurrency(),
        }
    }
}

impl PoolConfig {
    pub fn with_max_workers(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
        }
    }
}

struct Dispatch<T> {
    generation: u64,
    index: usize,
    task: T,
}

struct Completion<O> {
    generation: u64,
    slot: usize,
    index: usize,
    result: Result<O>,
}

struct Worker<T> {
    jobs: mpsc::UnboundedSender<Dispatch<T>>,
    handle: JoinHandle<()>,
}

/// Pool of workers reused across batches until [`terminate`](Self::terminate).
pub struct WorkerPool<T: WorkerTask> {
    config: PoolConfig,
    workers: Vec<Worker<T>>,
    busy: Vec<bool>,
    /// Bumped per batch; completions from other batches are dropped
    generation: u64,
    events_tx: mpsc::UnboundedSender<Completion<T::Output>>,
    events_rx: mpsc::UnboundedReceiver<Completion<T::Output>>,
}

impl<T: WorkerTask> WorkerPool<T> {
    pub fn new(config: PoolConfig) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            config: PoolConfig::with_max_workers(config.max_workers),
            workers: Vec::new(),
            busy: Vec::new(),
            generation: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn config(&self) -> PoolConfig {
        self.config
    }

    /// Live workers; zero before the first batch and after `terminate`
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run `jobs` and report through callbacks.
    ///
    /// `on_spawn(started, progress)` fires on every dispatch. Exactly one of
    /// `on_success` (results in input order) or `on_error` fires. Returns
    /// whether the batch succeeded.
    pub async fn start<S, E, P>(&mut self, jobs: Vec<T>, on_success: S, on_error: E, on_spawn: P) -> bool
    where
        S: FnOnce(Vec<T::Output>),
        E: FnOnce(PolygonizerError),
        P: FnMut(usize, f64),
    {
        match self.run_batch(jobs, on_spawn).await {
            Ok(results) => {
                on_success(results);
                true
            }
            Err(err) => {
                on_error(err);
                self.settle().await;
                false
            }
        }
    }

    /// Run `jobs` and collect the results in input order
    pub async fn run(&mut self, jobs: Vec<T>) -> Result<Vec<T::Output>> {
        let outcome = self.run_batch(jobs, |_, _| {}).await;
        if outcome.is_err() {
            self.settle().await;
        }
        outcome
    }

    /// Drop every worker. The next batch spawns a fresh set.
    ///
    /// Jobs already running on the blocking pool finish in the background
    /// and their results are discarded.
    pub fn terminate(&mut self) {
        let count = self.workers.len();
        for worker in self.workers.drain(..) {
            worker.handle.abort();
        }
        self.busy.clear();

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        self.events_tx = events_tx;
        self.events_rx = events_rx;

        info!(workers = count, "worker pool terminated");
    }

    async fn run_batch<P>(&mut self, jobs: Vec<T>, mut on_spawn: P) -> Result<Vec<T::Output>>
    where
        P: FnMut(usize, f64),
    {
        if jobs.is_empty() {
            return Err(PolygonizerError::EmptyBatch);
        }

        // A batch whose future was dropped may still have jobs in flight
        if self.busy.iter().any(|&busy| busy) {
            debug!("waiting for jobs of an abandoned batch");
            self.settle().await;
        }
        self.generation = self.generation.wrapping_add(1);

        let total = jobs.len();
        self.ensure_workers(total.min(self.config.max_workers));

        let mut pending = jobs.into_iter().enumerate();
        let mut results: Vec<Option<T::Output>> = (0..total).map(|_| None).collect();
        let mut started = 0usize;
        let mut completed = 0usize;

        for slot in 0..self.workers.len() {
            let Some((index, task)) = pending.next() else {
                break;
            };
            self.dispatch(slot, index, task)?;
            started += 1;
            on_spawn(started, started as f64 / total as f64);
        }

        while completed < total {
            let Some(done) = self.events_rx.recv().await else {
                return Err(PolygonizerError::PoolClosed);
            };
            if done.generation != self.generation {
                debug!(slot = done.slot, index = done.index, "dropping stale completion");
                continue;
            }
            self.busy[done.slot] = false;

            match done.result {
                Ok(output) => {
                    results[done.index] = Some(output);
                    completed += 1;
                }
                Err(err) => {
                    error!(index = done.index, slot = done.slot, error = %err, "job failed, aborting batch");
                    return Err(err);
                }
            }

            if let Some((index, task)) = pending.next() {
                self.dispatch(done.slot, index, task)?;
                started += 1;
                on_spawn(started, started as f64 / total as f64);
            }
        }

        debug!(jobs = total, workers = self.workers.len(), "batch complete");
        Ok(results.into_iter().flatten().collect())
    }

    fn dispatch(&mut self, slot: usize, index: usize, task: T) -> Result<()> {
        self.workers[slot]
            .jobs
            .send(Dispatch {
                generation: self.generation,
                index,
                task,
            })
            .map_err(|_| PolygonizerError::PoolClosed)?;
        self.busy[slot] = true;
        debug!(slot, index, "dispatched job");
        Ok(())
    }

    /// Wait for in-flight jobs of a failed batch and discard their results
    async fn settle(&mut self) {
        while self.busy.iter().any(|&busy| busy) {
            match self.events_rx.recv().await {
                Some(done) => self.busy[done.slot] = false,
                None => {
                    self.busy.iter_mut().for_each(|busy| *busy = false);
                    return;
                }
            }
        }
    }

    fn ensure_workers(&mut self, count: usize) {
        let before = self.workers.len();
        while self.workers.len() < count {
            let slot = self.workers.len();
            self.workers.push(spawn_worker(slot, self.events_tx.clone()));
            self.busy.push(false);
        }
        if self.workers.len() > before {
            info!(workers = self.workers.len(), spawned = self.workers.len() - before, "worker pool grown");
        }
    }
}

impl<T: WorkerTask> Default for WorkerPool<T> {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

impl<T: WorkerTask> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.handle.abort();
        }
    }
}

fn spawn_worker<T: WorkerTask>(slot: usize, events: mpsc::UnboundedSender<Completion<T::Output>>) -> Worker<T> {
    let (jobs, mut queue) = mpsc::unbounded_channel::<Dispatch<T>>();

    let handle = tokio::spawn(async move {
        while let Some(Dispatch { generation, index, task }) = queue.recv().await {
            let result = match tokio::task::spawn_blocking(move || task.run()).await {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(err)) => Err(PolygonizerError::Worker {
                    index,
                    message: err.to_string(),
                }),
                Err(_) => Err(PolygonizerError::WorkerPanicked { index }),
            };

            let done = Completion {
                generation,
                slot,
                index,
                result,
            };
            if events.send(done).is_err() {
                break;
            }
        }
    });

    Worker { jobs, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug)]
    enum TestJob {
        Square { value: u64, delay_ms: u64 },
        Fail,
        Panic,
    }

    impl WorkerTask for TestJob {
        type Output = u64;

        fn run(self) -> Result<u64> {
            match self {
                TestJob::Square { value, delay_ms } => {
                    std::thread::sleep(Duration::from_millis(delay_ms));
                    Ok(value * value)
                }
                TestJob::Fail => Err(PolygonizerError::InvalidDimensions { width: 0, height: 0 }),
                TestJob::Panic => panic!("job exploded"),
            }
        }
    }

    fn squares(count: u64) -> Vec<TestJob> {
        // Later jobs finish first
        (0..count)
            .map(|value| TestJob::Square {
                value,
                delay_ms: (count - value) * 10,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let mut pool = WorkerPool::new(PoolConfig::with_max_workers(2));
        let mut successes = Vec::new();
        let mut errors = Vec::new();
        let mut spawns = Vec::new();

        let ok = pool
            .start(
                squares(5),
                |results| successes.push(results),
                |err| errors.push(err),
                |started, progress| spawns.push((started, progress)),
            )
            .await;

        assert!(ok);
        assert_eq!(successes, vec![vec![0, 1, 4, 9, 16]]);
        assert!(errors.is_empty());
        assert_eq!(spawns.len(), 5);
        assert_eq!(spawns.last(), Some(&(5, 1.0)));
        assert_eq!(pool.worker_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_batch_is_an_error() {
        let mut pool = WorkerPool::<TestJob>::new(PoolConfig::with_max_workers(2));
        let mut success_called = false;
        let mut error = None;

        let ok = pool
            .start(Vec::new(), |_| success_called = true, |err| error = Some(err), |_, _| {})
            .await;

        assert!(!ok);
        assert!(!success_called);
        assert!(matches!(error, Some(PolygonizerError::EmptyBatch)));
        assert_eq!(pool.worker_count(), 0);
    }

    #[tokio::test]
    async fn test_failure_fails_whole_batch() {
        let mut pool = WorkerPool::new(PoolConfig::with_max_workers(3));
        let jobs = vec![
            TestJob::Square { value: 1, delay_ms: 30 },
            TestJob::Fail,
            TestJob::Square { value: 3, delay_ms: 30 },
            TestJob::Square { value: 4, delay_ms: 0 },
        ];
        let mut success_called = false;
        let mut error = None;

        let ok = pool
            .start(jobs, |_| success_called = true, |err| error = Some(err), |_, _| {})
            .await;

        assert!(!ok);
        assert!(!success_called);
        assert!(matches!(error, Some(PolygonizerError::Worker { index: 1, .. })));

        // The pool stays usable
        let results = pool.run(squares(3)).await.expect("Should run");
        assert_eq!(results, vec![0, 1, 4]);
    }

    #[tokio::test]
    async fn test_panic_is_reported() {
        let mut pool = WorkerPool::new(PoolConfig::with_max_workers(2));
        let result = pool.run(vec![TestJob::Square { value: 2, delay_ms: 0 }, TestJob::Panic]).await;

        assert!(matches!(result, Err(PolygonizerError::WorkerPanicked { index: 1 })));
    }

    #[tokio::test]
    async fn test_terminate_then_restart() {
        let mut pool = WorkerPool::new(PoolConfig::with_max_workers(4));
        assert_eq!(pool.run(squares(2)).await.expect("Should run"), vec![0, 1]);
        assert_eq!(pool.worker_count(), 2);

        pool.terminate();
        assert_eq!(pool.worker_count(), 0);

        assert_eq!(pool.run(squares(6)).await.expect("Should run"), vec![0, 1, 4, 9, 16, 25]);
        assert_eq!(pool.worker_count(), 4);
    }

    #[tokio::test]
    async fn test_abandoned_batch_does_not_leak_into_next() {
        let mut pool = WorkerPool::new(PoolConfig::with_max_workers(2));
        let slow = || {
            (10..13)
                .map(|value| TestJob::Square { value, delay_ms: 100 })
                .collect::<Vec<_>>()
        };

        let abandoned = tokio::time::timeout(Duration::from_millis(10), pool.run(slow())).await;
        assert!(abandoned.is_err());

        let results = pool
            .run(vec![TestJob::Square { value: 9, delay_ms: 0 }])
            .await
            .expect("Should run");
        assert_eq!(results, vec![81]);

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            pool.start(slow(), |_| {}, |_| {}, |_, _| {}),
        )
        .await;
        assert!(abandoned.is_err());

        let mut successes = Vec::new();
        let ok = pool
            .start(squares(3), |results| successes.push(results), |_| {}, |_, _| {})
            .await;
        assert!(ok);
        assert_eq!(successes, vec![vec![0, 1, 4]]);
    }

    #[test]
    fn test_default_concurrency_is_positive() {
        assert!(default_concurrency() >= 1);
        assert_eq!(PoolConfig::with_max_workers(0).max_workers, 1);
    }
}
