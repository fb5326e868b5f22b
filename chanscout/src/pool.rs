use rayon::{ThreadPool, ThreadPoolBuilder};
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::trace;

use crate::errors::{SearchError, SearchResult};
use crate::metrics::ScanMetrics;

/// Fixed-size pool for CPU-bound archive decoding.
///
/// Jobs run on dedicated rayon threads; the async side awaits their result
/// through a oneshot channel, so a download task never blocks the runtime
/// while a member is being decoded. The pool size caps decoding work
/// independently of the download limit.
#[derive(Clone)]
pub struct WorkerPool {
    pool: Arc<ThreadPool>,
    metrics: ScanMetrics,
}

impl WorkerPool {
    pub fn new(size: NonZeroUsize, metrics: ScanMetrics) -> SearchResult<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(size.get())
            .thread_name(|i| format!("chanscout-worker-{}", i))
            .build()
            .map_err(|e| SearchError::worker_pool(e.to_string()))?;
        Ok(Self {
            pool: Arc::new(pool),
            metrics,
        })
    }

    pub fn size(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `job` on a pool thread and waits for its result.
    ///
    /// A panicking job is reported as a [`SearchError::WorkerPool`] instead of
    /// taking the pool thread down.
    pub async fn run<F, T>(&self, job: F) -> SearchResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let metrics = self.metrics.clone();
        self.pool.spawn(move || {
            let outcome = {
                let _active = metrics.enter_pool_job();
                trace!("Worker job started");
                panic::catch_unwind(AssertUnwindSafe(job))
            };
            let _ = tx.send(outcome);
        });

        match rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(SearchError::worker_pool("worker job panicked")),
            Err(_) => Err(SearchError::worker_pool("worker dropped the job")),
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_runs_jobs() {
        let pool = WorkerPool::new(NonZeroUsize::new(2).unwrap(), ScanMetrics::new()).unwrap();
        assert_eq!(pool.size(), 2);
        let value = pool.run(|| 21 * 2).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test]
    async fn test_panics_are_contained() {
        let pool = WorkerPool::new(NonZeroUsize::new(1).unwrap(), ScanMetrics::new()).unwrap();
        let result: SearchResult<()> = pool.run(|| panic!("bad member")).await;
        assert!(matches!(result, Err(SearchError::WorkerPool(_))));

        // The pool keeps working afterwards
        assert_eq!(pool.run(|| "still alive").await.unwrap(), "still alive");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pool_size_bounds_concurrency() {
        let metrics = ScanMetrics::new();
        let pool = WorkerPool::new(NonZeroUsize::new(2).unwrap(), metrics.clone()).unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let jobs: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                let running = Arc::clone(&running);
                let peak = Arc::clone(&peak);
                tokio::spawn(async move {
                    pool.run(move || {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(20));
                        running.fetch_sub(1, Ordering::SeqCst);
                    })
                    .await
                })
            })
            .collect();

        for job in jobs {
            job.await.unwrap().unwrap();
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(metrics.get_stats().peak_pool_active <= 2);
        assert_eq!(metrics.get_stats().pool_active, 0);
    }
}
