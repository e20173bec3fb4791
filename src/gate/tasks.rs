//! Cancelable deferred and repeating tasks.
//!
//! Every timer the gate starts goes through a [`TaskRegistry`]. Tasks never
//! touch session state: when they fire they post an event into the gate's
//! queue and the gate reacts on its own turn. All tasks hang off one parent
//! [`CancellationToken`], so a reset can stop every one of them at once.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Stand-in for delays too long to represent as an instant.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Instant `delay` from now, saturating instead of overflowing.
fn deadline_after(delay: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Handle to a task started through a [`TaskRegistry`].
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: u64,
    token: CancellationToken,
}

impl TaskHandle {
    /// Stops the task. Safe to call more than once.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            trace!(task = self.id, "cancelling task");
        }
        self.token.cancel();
    }

    /// Whether the task may still post an event.
    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled()
    }
}

/// Registry of the timers, intervals and one-off futures started for a gate.
#[derive(Debug)]
pub struct TaskRegistry<E> {
    root: CancellationToken,
    tasks: Vec<TaskHandle>,
    next_id: u64,
    tx: mpsc::UnboundedSender<E>,
}

impl<E: Send + 'static> TaskRegistry<E> {
    /// Creates a registry posting events to `tx`.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<E>) -> Self {
        Self {
            root: CancellationToken::new(),
            tasks: Vec::new(),
            next_id: 0,
            tx,
        }
    }

    /// Posts `event` once after `delay`.
    pub fn schedule(&mut self, delay: Duration, event: E) -> TaskHandle {
        // the deadline is fixed now, not when the runtime first polls the task
        let deadline = deadline_after(delay);
        self.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            event
        })
    }

    /// Posts a clone of `event` every `period`, first after one period.
    pub fn repeat(&mut self, period: Duration, event: E) -> TaskHandle
    where
        E: Clone,
    {
        let handle = self.register();
        let token = handle.token.clone();
        let tx = self.tx.clone();
        let id = handle.id;
        let first_tick = deadline_after(period);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(first_tick, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = token.cancelled() => {
                        trace!(task = id, "repeating task cancelled");
                        break;
                    }
                    _ = interval.tick() => {
                        if tx.send(event.clone()).is_err() {
                            token.cancel();
                            break;
                        }
                    }
                }
            }
        });

        handle
    }

    /// Runs `future` and posts its output, unless cancelled first.
    pub fn spawn<F>(&mut self, future: F) -> TaskHandle
    where
        F: Future<Output = E> + Send + 'static,
    {
        let handle = self.register();
        let token = handle.token.clone();
        let tx = self.tx.clone();
        let id = handle.id;

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {
                    trace!(task = id, "task cancelled before completion");
                }
                event = future => {
                    // completed tasks count as inactive from here on
                    token.cancel();
                    let _ = tx.send(event);
                }
            }
        });

        handle
    }

    /// Cancels every task started through this registry.
    pub fn cancel_all(&mut self) {
        self.root.cancel();
        self.root = CancellationToken::new();
        self.tasks.clear();
    }

    /// Number of tasks that may still post an event.
    pub fn active(&mut self) -> usize {
        self.tasks.retain(TaskHandle::is_active);
        self.tasks.len()
    }

    fn register(&mut self) -> TaskHandle {
        self.tasks.retain(TaskHandle::is_active);
        self.next_id += 1;
        let handle = TaskHandle {
            id: self.next_id,
            token: self.root.child_token(),
        };
        self.tasks.push(handle.clone());
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fires_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = TaskRegistry::new(tx);
        let handle = tasks.schedule(Duration::from_millis(3000), "deadline");
        assert!(handle.is_active());

        tokio::time::advance(Duration::from_millis(2999)).await;
        settle().await;
        assert!(rx.try_recv().is_err());

        tokio::time::advance(Duration::from_millis(1)).await;
        settle().await;
        assert_eq!(rx.try_recv(), Ok("deadline"));
        assert!(!handle.is_active());
        assert_eq!(tasks.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_ticks_until_cancelled() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = TaskRegistry::new(tx);
        let handle = tasks.repeat(Duration::from_millis(100), "tick");

        for _ in 0..3 {
            tokio::time::advance(Duration::from_millis(100)).await;
            settle().await;
        }
        let mut ticks = 0;
        while rx.try_recv().is_ok() {
            ticks += 1;
        }
        assert_eq!(ticks, 3);

        handle.cancel();
        settle().await;
        tokio::time::advance(Duration::from_millis(500)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all_stops_everything() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = TaskRegistry::new(tx);
        let deferred = tasks.schedule(Duration::from_millis(300), "deadline");
        let repeating = tasks.repeat(Duration::from_millis(100), "tick");
        assert_eq!(tasks.active(), 2);

        tasks.cancel_all();
        assert_eq!(tasks.active(), 0);
        assert!(!deferred.is_active());
        assert!(!repeating.is_active());

        tokio::time::advance(Duration::from_secs(1)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_registry_usable_after_cancel_all() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = TaskRegistry::new(tx);
        tasks.cancel_all();
        tasks.schedule(Duration::from_millis(10), "fresh");

        tokio::time::advance(Duration::from_millis(10)).await;
        settle().await;
        assert_eq!(rx.try_recv(), Ok("fresh"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrepresentable_delays_never_fire() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = TaskRegistry::new(tx);
        tasks.schedule(Duration::MAX, "deadline");
        tasks.repeat(Duration::MAX, "tick");
        assert_eq!(tasks.active(), 2);

        tokio::time::advance(Duration::from_secs(86_400)).await;
        settle().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(tasks.active(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_ids_stay_unique_across_cancel_all() {
        let (tx, _rx) = mpsc::unbounded_channel::<()>();
        let mut tasks = TaskRegistry::new(tx);
        let first = tasks.schedule(Duration::from_secs(1), ());
        let second = tasks.repeat(Duration::from_secs(1), ());
        tasks.cancel_all();
        let third = tasks.schedule(Duration::from_secs(1), ());

        assert_eq!([first.id, second.id, third.id], [1, 2, 3]);
        first.cancel();
        assert!(third.is_active());
    }

    #[tokio::test]
    async fn test_spawn_posts_future_output() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = TaskRegistry::new(tx);
        tasks.spawn(async { 42 });
        assert_eq!(rx.recv().await, Some(42));
    }
}
