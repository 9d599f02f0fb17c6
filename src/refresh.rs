//! Bounded executor for background refreshes.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;

/// Runs background refreshes on the Tokio runtime, at most `capacity` at a
/// time.
///
/// A refresh needs a [`RefreshSlot`] before it can be spawned. When no slot
/// is free (or the executor is closed) the caller keeps the work and does it
/// inline. Refresh tasks are detached from the caller that submitted them:
/// cancelling the caller does not cancel the refresh.
#[derive(Clone)]
pub struct RefreshExecutor {
    slots: Arc<Semaphore>,
    capacity: usize,
    tracker: TaskTracker,
    running: Arc<Running>,
}

/// Permission to spawn one refresh task.
pub struct RefreshSlot {
    permit: OwnedSemaphorePermit,
    tracker: TaskTracker,
    running: Arc<Running>,
}

/// Count of spawned refreshes that have not finished yet.
#[derive(Default)]
struct Running {
    count: AtomicUsize,
    idle: Notify,
}

/// Held by a refresh task; signals idleness when the last one ends.
struct RunningGuard(Arc<Running>);

impl RunningGuard {
    fn enter(running: Arc<Running>) -> Self {
        running.count.fetch_add(1, Ordering::AcqRel);
        RunningGuard(running)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl RefreshExecutor {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.min(Semaphore::MAX_PERMITS);
        RefreshExecutor {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
            tracker: TaskTracker::new(),
            running: Arc::default(),
        }
    }

    /// Reserve a slot, or `None` if all slots are busy or the executor is
    /// closed.
    pub fn try_reserve(&self) -> Option<RefreshSlot> {
        let permit = self.slots.clone().try_acquire_owned().ok()?;
        Some(RefreshSlot {
            permit,
            tracker: self.tracker.clone(),
            running: self.running.clone(),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of refreshes currently reserved or running.
    pub fn in_flight(&self) -> usize {
        self.capacity - self.slots.available_permits().min(self.capacity)
    }

    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Wait until every refresh spawned so far has finished.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.running.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.running.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Refuse new refreshes and wait for the running ones to finish.
    pub async fn shutdown(&self) {
        self.slots.close();
        self.tracker.close();
        self.tracker.wait().await;
    }
}

impl RefreshSlot {
    /// Spawn the refresh. The slot is freed when the task ends.
    pub fn spawn<F>(self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let RefreshSlot {
            permit,
            tracker,
            running,
        } = self;
        let guard = RunningGuard::enter(running);
        tracker.spawn(async move {
            let _permit = permit;
            let _guard = guard;
            task.await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_capacity_bounds_reservations() {
        let executor = RefreshExecutor::new(2);

        let a = executor.try_reserve().unwrap();
        let _b = executor.try_reserve().unwrap();
        assert!(executor.try_reserve().is_none());
        assert_eq!(executor.in_flight(), 2);

        drop(a);
        assert_eq!(executor.in_flight(), 1);
        assert!(executor.try_reserve().is_some());
    }

    #[tokio::test]
    async fn test_slot_freed_when_task_ends() {
        let executor = RefreshExecutor::new(1);
        let done = Arc::new(AtomicUsize::new(0));

        let counter = done.clone();
        executor.try_reserve().unwrap().spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(executor.try_reserve().is_none());

        executor.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(executor.in_flight(), 0);
        assert!(executor.try_reserve().is_some());
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_work() {
        let executor = RefreshExecutor::new(4);
        executor.shutdown().await;

        assert!(executor.is_closed());
        assert!(executor.try_reserve().is_none());
    }

    #[tokio::test]
    async fn test_zero_capacity_never_reserves() {
        let executor = RefreshExecutor::new(0);
        assert!(executor.try_reserve().is_none());
        assert_eq!(executor.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_waiters_all_return() {
        let executor = RefreshExecutor::new(4);
        for delay in [10, 30] {
            executor.try_reserve().unwrap().spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            });
        }

        let waiters: Vec<_> = (0..4)
            .map(|_| {
                let executor = executor.clone();
                tokio::spawn(async move { executor.wait_idle().await })
            })
            .collect();
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(2), waiter)
                .await
                .expect("waiter hung")
                .unwrap();
        }

        // Idle waits leave the executor open.
        assert!(!executor.is_closed());
        assert!(executor.try_reserve().is_some());
    }

    #[tokio::test]
    async fn test_wait_idle_with_nothing_spawned() {
        let executor = RefreshExecutor::new(1);
        let _reserved = executor.try_reserve().unwrap();
        tokio::time::timeout(Duration::from_millis(100), executor.wait_idle())
            .await
            .expect("idle executor should not block");
    }
}
