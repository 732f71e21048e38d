//! Tokio-backed coordinator timers
//!
//! Each armed timer is a sleeping task. On expiry it posts the timer's event to
//! the coordinator's pending set and wakes the worker; it never touches the
//! coordinator itself.

use std::collections::HashMap;
use std::sync::Arc;

use pancoord_core::{PendingEvents, TimerId, TimerService};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::trace;

pub struct TokioTimerService {
    pending: Arc<PendingEvents>,
    wake: Arc<Notify>,
    armed: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioTimerService {
    pub fn new(pending: Arc<PendingEvents>, wake: Arc<Notify>) -> Self {
        Self {
            pending,
            wake,
            armed: HashMap::new(),
        }
    }
}

impl TimerService for TokioTimerService {
    fn arm(&mut self, timer: TimerId, delay_ms: u32) {
        self.disarm(timer);
        trace!("Arming {:?} for {} ms", timer, delay_ms);

        let pending = Arc::clone(&self.pending);
        let wake = Arc::clone(&self.wake);
        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(u64::from(delay_ms))).await;
            pending.post(timer.event());
            wake.notify_one();
        });
        self.armed.insert(timer, handle);
    }

    fn disarm(&mut self, timer: TimerId) {
        if let Some(handle) = self.armed.remove(&timer) {
            handle.abort();
        }
    }

    fn is_armed(&self, timer: TimerId) -> bool {
        self.armed
            .get(&timer)
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for TokioTimerService {
    fn drop(&mut self) {
        for (_, handle) in self.armed.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pancoord_core::CoordEvent;

    #[tokio::test(start_paused = true)]
    async fn expiry_posts_event_and_wakes() {
        let pending = Arc::new(PendingEvents::new());
        let wake = Arc::new(Notify::new());
        let mut timers = TokioTimerService::new(Arc::clone(&pending), Arc::clone(&wake));

        timers.arm(TimerId::JoinPermit, 1000);
        assert!(timers.is_armed(TimerId::JoinPermit));

        wake.notified().await;
        assert!(pending.take().contains(CoordEvent::JoinPermitExpired));
        tokio::task::yield_now().await;
        assert!(!timers.is_armed(TimerId::JoinPermit));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_timer_never_posts() {
        let pending = Arc::new(PendingEvents::new());
        let wake = Arc::new(Notify::new());
        let mut timers = TokioTimerService::new(Arc::clone(&pending), wake);

        timers.arm(TimerId::TricklePa, 100);
        timers.disarm(TimerId::TricklePa);
        sleep(Duration::from_millis(500)).await;

        assert!(!pending.has_pending());
        assert!(!timers.is_armed(TimerId::TricklePa));
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_replaces_deadline() {
        let pending = Arc::new(PendingEvents::new());
        let wake = Arc::new(Notify::new());
        let mut timers = TokioTimerService::new(Arc::clone(&pending), wake);

        timers.arm(TimerId::TricklePc, 100);
        timers.arm(TimerId::TricklePc, 1000);
        sleep(Duration::from_millis(500)).await;
        assert!(!pending.is_pending(CoordEvent::TricklePc));

        sleep(Duration::from_millis(600)).await;
        assert!(pending.is_pending(CoordEvent::TricklePc));
    }
}
