use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle(u64);

/// Cancelable one-shot timers on the tokio runtime. Once shut down, no
/// callback runs and new timers are refused.
#[derive(Clone, Default)]
pub struct TimerQueue {
    next_id: Arc<AtomicU64>,
    pending: Arc<Mutex<HashMap<u64, JoinHandle<()>>>>,
    closed: Arc<AtomicBool>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, delay: Duration, callback: F) -> Option<TimerHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.closed.load(Ordering::SeqCst) {
            tracing::debug!("timer queue closed; dropping scheduled callback");
            return None;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime available; dropping scheduled callback");
            return None;
        };

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let queue = self.clone();
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if queue.take(id) && !queue.closed.load(Ordering::SeqCst) {
                callback();
            }
        });
        pending.insert(id, task);
        Some(TimerHandle(id))
    }

    pub fn cancel(&self, handle: TimerHandle) -> bool {
        let task = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.0);
        match task {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let drained = {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.drain().map(|(_, task)| task).collect::<Vec<_>>()
        };
        if !drained.is_empty() {
            tracing::debug!(count = drained.len(), "canceled pending timers on shutdown");
        }
        for task in drained {
            task.abort();
        }
    }

    fn take(&self, id: u64) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
            .is_some()
    }
}

/// Coalesces bursts of triggers: each trigger replaces the pending one and
/// only the last callback of a burst runs, `delay` after it was triggered.
#[derive(Clone)]
pub struct Debouncer {
    timers: TimerQueue,
    delay_ms: Arc<AtomicU64>,
    slot: Arc<Mutex<Option<TimerHandle>>>,
}

impl Debouncer {
    pub fn new(timers: TimerQueue, delay: Duration) -> Self {
        Self {
            timers,
            delay_ms: Arc::new(AtomicU64::new(delay.as_millis() as u64)),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms.load(Ordering::SeqCst))
    }

    pub fn trigger<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            self.timers.cancel(previous);
        }
        *slot = self.timers.schedule(self.delay(), callback);
    }

    pub fn cancel(&self) -> bool {
        let previous = self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        previous.map(|handle| self.timers.cancel(handle)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{Debouncer, TimerQueue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::time::Duration;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let make = {
            let count = count.clone();
            move || {
                let count = count.clone();
                Box::new(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                }) as Box<dyn FnOnce() + Send>
            }
        };
        (count, make)
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_callback_fires_after_delay() {
        let timers = TimerQueue::new();
        let (count, make) = counter();
        timers.schedule(Duration::from_millis(100), make()).expect("scheduled");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(timers.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn canceled_timer_never_fires() {
        let timers = TimerQueue::new();
        let (count, make) = counter();
        let handle = timers.schedule(Duration::from_millis(100), make()).expect("scheduled");

        assert!(timers.cancel(handle));
        assert!(!timers.cancel(handle));
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_prevents_pending_and_future_callbacks() {
        let timers = TimerQueue::new();
        let (count, make) = counter();
        timers.schedule(Duration::from_millis(100), make()).expect("scheduled");

        timers.shutdown();
        assert!(timers.is_closed());
        assert!(timers.schedule(Duration::from_millis(10), make()).is_none());
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_runs_only_the_last_trigger() {
        let debouncer = Debouncer::new(TimerQueue::new(), Duration::from_millis(150));
        let seen = Arc::new(Mutex::new(Vec::new()));

        for value in 0..5 {
            let seen = seen.clone();
            debouncer.trigger(move || seen.lock().expect("seen lock").push(value));
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(*seen.lock().expect("seen lock"), vec![4]);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_cancel_drops_pending_trigger() {
        let debouncer = Debouncer::new(TimerQueue::new(), Duration::from_millis(150));
        let (count, make) = counter();
        debouncer.trigger(make());
        assert!(debouncer.cancel());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn schedule_without_runtime_is_refused() {
        let timers = TimerQueue::new();
        assert!(timers.schedule(Duration::from_millis(1), || {}).is_none());
    }
}
