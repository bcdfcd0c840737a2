use crate::job::CancelToken;
use batsat::Callbacks;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const NO_DEADLINE: u64 = u64::MAX;

/// Solver callbacks that stop a running solve once the token is cancelled or the
/// deadline of the current call has passed.
#[derive(Debug, Clone)]
pub(super) struct InterruptCallbacks {
    token: CancelToken,
    epoch: Instant,
    // nanoseconds since `epoch`, shared with the owning solver so it can be moved per call
    deadline: Arc<AtomicU64>,
}

impl InterruptCallbacks {
    pub(super) fn new(token: CancelToken) -> Self {
        Self {
            token,
            epoch: Instant::now(),
            deadline: Arc::new(AtomicU64::new(NO_DEADLINE)),
        }
    }

    pub(super) fn set_token(&mut self, token: CancelToken) {
        self.token = token;
    }

    pub(super) fn set_deadline(&self, deadline: Option<Instant>) {
        let nanos = deadline.map_or(NO_DEADLINE, |deadline| {
            deadline
                .saturating_duration_since(self.epoch)
                .as_nanos()
                .min(NO_DEADLINE as u128 - 1) as u64
        });
        self.deadline.store(nanos, Ordering::Relaxed);
    }

    pub(super) fn is_triggered(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }

        match self.deadline.load(Ordering::Relaxed) {
            NO_DEADLINE => false,
            nanos => self.epoch.elapsed().as_nanos() >= nanos as u128,
        }
    }
}

impl Callbacks for InterruptCallbacks {
    fn stop(&self) -> bool {
        self.is_triggered()
    }
}
