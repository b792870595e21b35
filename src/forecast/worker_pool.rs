use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Default number of concurrent outbound calls from request handlers
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Bounded pool for network and model calls issued on behalf of requests
///
/// Tasks wait for a permit before running, so no more than `capacity`
/// of them are in flight at once.
#[derive(Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `task` once a permit is free
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        // The semaphore is never closed, so acquire only fails after `close()`
        let _permit = self.semaphore.acquire().await.ok();
        task.await
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_SIZE)
    }
}
