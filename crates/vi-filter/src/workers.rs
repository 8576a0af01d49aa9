//! Scanline worker pool.
//!
//! The original hand-rolls a mutex/condvar thread pool (`Parallel` in
//! `parallel.cpp`) whose `run` blocks the caller until every worker has
//! finished a `std::function<void(uint32_t)>` broadcast to it. `rayon`'s
//! `ThreadPool::broadcast` is exactly that primitive, already built and
//! tested, so the pool here is a thin wrapper rather than a port of the
//! condvar bookkeeping.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::{ThreadPool, ThreadPoolBuilder};

/// Failure building the underlying thread pool.
#[derive(Debug)]
pub struct PoolInitError(rayon::ThreadPoolBuildError);

impl fmt::Display for PoolInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to build VI worker pool: {}", self.0)
    }
}

impl std::error::Error for PoolInitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Returned by `run` when called after `close`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolShutdown;

impl fmt::Display for PoolShutdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker pool is shutting down and no longer accepts work")
    }
}

impl std::error::Error for PoolShutdown {}

/// A fixed-size pool of scanline workers.
pub struct WorkerPool {
    pool: ThreadPool,
    accept_work: AtomicBool,
}

impl WorkerPool {
    /// `num_workers == 0` lets rayon pick its own default (the host's
    /// available parallelism), matching the original's
    /// `std::thread::hardware_concurrency()` fallback.
    pub fn new(num_workers: u32) -> Result<Self, PoolInitError> {
        let mut builder = ThreadPoolBuilder::new();
        if num_workers != 0 {
            builder = builder.num_threads(num_workers as usize);
        }
        let pool = builder.build().map_err(PoolInitError)?;
        Ok(Self {
            pool,
            accept_work: AtomicBool::new(true),
        })
    }

    /// Run `task` once per worker thread, passing each its stable
    /// `worker_id` in `0..worker_num()`. Blocks until every worker
    /// returns.
    pub fn run(&self, task: impl Fn(usize) + Sync) -> Result<(), PoolShutdown> {
        if !self.accept_work.load(Ordering::Acquire) {
            return Err(PoolShutdown);
        }
        self.pool.broadcast(|ctx| task(ctx.index()));
        Ok(())
    }

    #[must_use]
    pub fn worker_num(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Stop accepting new work and drop the pool, joining its threads.
    pub fn close(self) {
        self.accept_work.store(false, Ordering::Release);
    }
}
