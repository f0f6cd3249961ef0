//! Worker Pool
//!
//! Bounded offload of CPU-bound work onto tokio's blocking threads, so
//! scheduling loops never run it inline.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Semaphore;

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Worker pool closed")]
    Closed,

    #[error("Worker task failed: {0}")]
    Panicked(String),
}

/// At most `size` jobs run at once; further callers wait for a permit
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Free slots right now
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run `job` on a blocking thread once a slot is free
    pub async fn run<F, T>(&self, job: F) -> Result<T, WorkerError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| WorkerError::Closed)?;

        tokio::task::spawn_blocking(move || {
            let out = job();
            drop(permit);
            out
        })
        .await
        .map_err(|e| WorkerError::Panicked(e.to_string()))
    }

    /// Refuse new jobs; running ones finish
    pub fn close(&self) {
        self.permits.close();
    }
}
