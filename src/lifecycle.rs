//! Start/stop plumbing shared by the background workers

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use utoipa::ToSchema;

/// How long `stop` waits for a worker before abandoning it
pub const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of a background worker
///
/// `Stopped -> Starting -> Running -> Stopping -> Stopped`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl WorkerState {
    /// Starting or running; a second `start` is a no-op
    pub fn is_active(&self) -> bool {
        matches!(self, WorkerState::Starting | WorkerState::Running)
    }
}

/// Running flag plus a wake-up used to cut sleeps short on stop
#[derive(Default)]
pub struct WorkerSignal {
    running: AtomicBool,
    wake: Notify,
}

impl WorkerSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self) {
        self.running.store(true, Ordering::Release);
    }

    /// Clear the flag and wake the worker if it is sleeping
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::Release);
        self.wake.notify_one();
    }

    /// Sleep for `duration` unless stopped first
    ///
    /// Returns whether the worker should keep going.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if !self.is_running() {
            return false;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.wake.notified() => {}
        }
        self.is_running()
    }
}

/// Wait for a worker task to finish, giving up after `timeout`
///
/// A worker that does not finish in time is left to run to completion on
/// its own; it is never aborted mid-write.
pub async fn join_with_timeout(name: &str, handle: JoinHandle<()>, timeout: Duration) {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => tracing::debug!("{} worker exited", name),
        Ok(Err(e)) => tracing::error!("❌ {} worker ended abnormally: {}", name, e),
        Err(_) => tracing::warn!(
            "⚠️  {} worker did not stop within {:?}, abandoning it",
            name,
            timeout
        ),
    }
}

/// Text of a caught panic payload
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn test_sleep_interrupted_by_stop() {
        let signal = Arc::new(WorkerSignal::new());
        signal.set_running();

        let sleeper = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.sleep(Duration::from_secs(60)).await })
        };

        let started = Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.request_stop();

        let keep_going = sleeper.await.unwrap();
        assert!(!keep_going);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_sleep_when_stopped_returns_immediately() {
        let signal = WorkerSignal::new();
        assert!(!signal.sleep(Duration::from_secs(60)).await);
    }

    #[tokio::test]
    async fn test_join_with_timeout_abandons_slow_worker() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        });
        let started = Instant::now();
        join_with_timeout("slow", handle, Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_state_is_active() {
        assert!(WorkerState::Running.is_active());
        assert!(WorkerState::Starting.is_active());
        assert!(!WorkerState::Stopping.is_active());
        assert!(!WorkerState::Stopped.is_active());
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
    }
}
