//! # Debouncer
//!
//! Single-slot trailing debounce: run an action once the caller has been
//! quiet for a fixed delay.
//!
//! ## Timeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  edits:    e1    e2   e3                     e4                         │
//! │            │     │    │                      │                          │
//! │  timer:    ├─────┤    │                      │                          │
//! │                  ├────┤                      │                          │
//! │                       ├─────── 300ms ──────► save(e3)                   │
//! │                                              ├─────── 300ms ──► save(e4)│
//! │                                                                         │
//! │  Each schedule() replaces the pending action and restarts the delay.   │
//! │  Once an action has started it runs to completion; cancel() and a new  │
//! │  schedule() only affect actions that have not started yet.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct Pending {
    task: JoinHandle<()>,
    fire: oneshot::Sender<()>,
}

/// Cancellable scheduled task with at most one pending action.
///
/// Must be used from within a tokio runtime. Dropping the debouncer cancels
/// the pending action.
pub struct Debouncer {
    delay: Duration,
    pending: Option<Pending>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `action` to run after the delay, replacing any action that
    /// has not started yet.
    pub fn schedule<F>(&mut self, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let (fire, fire_rx) = oneshot::channel::<()>();
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::select! {
                biased;
                signal = fire_rx => {
                    // Sender dropped without sending: cancelled.
                    if signal.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(delay) => {}
            }
            action.await;
        });

        self.pending = Some(Pending { task, fire });
    }

    /// Drops the pending action if it has not started. Returns true if one
    /// was cancelled.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(pending) => !pending.fire.is_closed(),
            None => false,
        }
    }

    /// Starts the pending action now instead of waiting for the delay.
    ///
    /// Returns the handle of the most recently scheduled action (started or
    /// not) so the caller can wait for it, or `None` if nothing was ever
    /// scheduled since the last flush or cancel.
    pub fn flush(&mut self) -> Option<JoinHandle<()>> {
        let pending = self.pending.take()?;
        // Err means the timer already fired and the action is running.
        let _ = pending.fire.send(());
        Some(pending.task)
    }

    /// True if an action is waiting for its delay to elapse.
    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.fire.is_closed())
    }
}

impl std::fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &self.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn bump(count: &Arc<AtomicUsize>, by: usize) -> impl Future<Output = ()> + Send + 'static {
        let count = Arc::clone(count);
        async move {
            count.fetch_add(by, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_quiet_period() {
        let count = counter();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.schedule(bump(&count, 1));
        assert!(debouncer.is_pending());

        tokio::time::sleep(Duration::from_millis(299)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_restarts_window_and_keeps_last_action() {
        let count = counter();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        for by in [1, 10, 100] {
            debouncer.schedule(bump(&count, by));
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        // 600ms since the first schedule, 200ms since the last one.
        assert_eq!(count.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(count.load(Ordering::SeqCst), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let count = counter();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.schedule(bump(&count, 1));
        assert!(debouncer.cancel());
        assert!(!debouncer.cancel());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_runs_pending_action_immediately() {
        let count = counter();
        let mut debouncer = Debouncer::new(Duration::from_millis(300));

        debouncer.schedule(bump(&count, 1));
        let handle = debouncer.flush().unwrap();
        handle.await.unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(debouncer.flush().is_none());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_action_is_not_cancelled() {
        let count = counter();
        let mut debouncer = Debouncer::new(Duration::from_millis(100));

        let slow = {
            let count = Arc::clone(&count);
            async move {
                tokio::time::sleep(Duration::from_millis(500)).await;
                count.fetch_add(1, Ordering::SeqCst);
            }
        };
        debouncer.schedule(slow);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(!debouncer.is_pending());
        assert!(!debouncer.cancel());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
