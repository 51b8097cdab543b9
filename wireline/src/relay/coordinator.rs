use crate::common::sync::{CountdownLatch, StopCanary};

/// Joint termination control for the two directions of a relay link.
///
/// The first direction to finish trips the shared stop flag, so the still
/// running direction exits at its next loop check instead of waiting for its
/// own EOF. Once both directions have signalled, `join` resolves and teardown
/// may proceed; this holds even when both directions finish at the same
/// instant.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    latch: CountdownLatch,
    stop: StopCanary,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            latch: CountdownLatch::new(2),
            stop: StopCanary::default(),
        }
    }

    /// Flag observed by both pumps at their loop boundaries.
    pub fn stop_flag(&self) -> StopCanary {
        self.stop.clone()
    }

    /// Called by each direction exactly once, as its last act.
    ///
    /// Tripping the flag is idempotent, so doing it on every call keeps the
    /// first-completion trigger without distinguishing which direction came
    /// first.
    pub fn signal_done(&self) {
        self.stop.trip();
        self.latch.count_down();
    }

    /// Resolves once both directions have signalled.
    pub async fn join(&self) {
        self.latch.wait().await
    }
}
