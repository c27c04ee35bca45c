//! Trailing-edge debounce
//!
//! Each `schedule` cancels the pending action and arms a new one, so only
//! the last call in a burst runs, `delay` after that call.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;

pub struct Debouncer {
    delay: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Mutex::new(None),
        }
    }

    /// Replace any pending action with `action`, run after the delay.
    /// Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let delay = self.delay;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        });

        if let Some(previous) = self.pending.lock().replace(handle) {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        if let Some(handle) = self.pending.lock().take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::sleep;

    fn bump(debouncer: &Debouncer, count: &Arc<AtomicUsize>) {
        let count = count.clone();
        debouncer.schedule(move || {
            count.fetch_add(1, Ordering::SeqCst);
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_fires_once_after_last_input() {
        let count = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(300));

        bump(&debouncer, &count); // t=0
        sleep(Duration::from_millis(100)).await;
        bump(&debouncer, &count); // t=100
        sleep(Duration::from_millis(50)).await;
        bump(&debouncer, &count); // t=150

        sleep(Duration::from_millis(290)).await; // t=440
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(20)).await; // t=460
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(40)).await;
        bump(&debouncer, &count); // t=500

        sleep(Duration::from_millis(290)).await; // t=790
        assert_eq!(count.load(Ordering::SeqCst), 1);

        sleep(Duration::from_millis(20)).await; // t=810
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_drops_pending_action() {
        let count = Arc::new(AtomicUsize::new(0));
        let debouncer = Debouncer::new(Duration::from_millis(300));

        bump(&debouncer, &count);
        debouncer.cancel();
        assert!(!debouncer.is_pending());

        sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let count = Arc::new(AtomicUsize::new(0));
        {
            let debouncer = Debouncer::new(Duration::from_millis(300));
            bump(&debouncer, &count);
        }

        sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
