use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Cooperative stop flag shared by the two directions of a relay link.
///
/// Transitions once from running to stopped and never back. The flag is
/// advisory: a pump only observes it between reads, so tripping it does not
/// interrupt an in-flight read.
#[derive(Clone, Debug, Default)]
pub struct StopCanary(Arc<AtomicBool>);

impl StopCanary {
    pub fn running(&self) -> bool {
        !self.0.load(Ordering::Relaxed)
    }

    pub fn trip(&self) {
        self.0.store(true, Ordering::Relaxed)
    }
}

/// Wait until a fixed number of parties have signalled.
///
/// `wait` parks on a `Notify` instead of spinning; `count_down` past zero is
/// a no-op.
#[derive(Debug)]
pub struct CountdownLatch {
    remaining: AtomicUsize,
    notify: Notify,
}

impl CountdownLatch {
    pub fn new(parties: usize) -> Self {
        Self {
            remaining: AtomicUsize::new(parties),
            notify: Notify::new(),
        }
    }

    /// Returns the number of parties still outstanding after this call.
    pub fn count_down(&self) -> usize {
        let mut cur = self.remaining.load(Ordering::Acquire);
        loop {
            if cur == 0 {
                return 0;
            }
            match self.remaining.compare_exchange_weak(
                cur,
                cur - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    if cur == 1 {
                        self.notify.notify_waiters();
                    }
                    return cur - 1;
                }
                Err(seen) => cur = seen,
            }
        }
    }

    pub async fn wait(&self) {
        loop {
            // Register before re-checking, or a count_down between the check
            // and the await would be lost.
            let notified = self.notify.notified();
            if self.remaining.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}
