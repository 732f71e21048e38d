//! Deferred work posted by timers
//!
//! Timer expiries happen outside the worker that owns the coordinator. They may
//! only set a flag here; the worker later drains the flags through
//! [`crate::Coordinator::process`] in a fixed order.

use core::sync::atomic::{AtomicU8, Ordering};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Coordinator Events
// ----------------------------------------------------------------------------

/// Work items, listed in the order they are drained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoordEvent {
    /// Advertisement trickle timer expired
    TricklePa,
    /// Configuration trickle timer expired
    TricklePc,
    /// Startup sub-state changed and its action is due
    StateChange,
    /// Join-permit window ran out
    JoinPermitExpired,
}

impl CoordEvent {
    pub const DRAIN_ORDER: [CoordEvent; 4] = [
        CoordEvent::TricklePa,
        CoordEvent::TricklePc,
        CoordEvent::StateChange,
        CoordEvent::JoinPermitExpired,
    ];

    fn bit(self) -> u8 {
        match self {
            CoordEvent::TricklePa => 0x01,
            CoordEvent::TricklePc => 0x02,
            CoordEvent::StateChange => 0x04,
            CoordEvent::JoinPermitExpired => 0x08,
        }
    }
}

/// Snapshot of pending events taken at the start of a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSet(u8);

impl EventSet {
    pub fn contains(&self, event: CoordEvent) -> bool {
        self.0 & event.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Members in drain order
    pub fn iter(self) -> impl Iterator<Item = CoordEvent> {
        CoordEvent::DRAIN_ORDER
            .into_iter()
            .filter(move |event| self.contains(*event))
    }
}

/// Pending-event flags shared between timers and the worker
#[derive(Debug, Default)]
pub struct PendingEvents {
    flags: AtomicU8,
}

impl PendingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag for `event`; returns false when it was already pending
    pub fn post(&self, event: CoordEvent) -> bool {
        self.flags.fetch_or(event.bit(), Ordering::AcqRel) & event.bit() == 0
    }

    /// Clear the flag for `event`; returns whether it was pending
    pub fn cancel(&self, event: CoordEvent) -> bool {
        self.flags.fetch_and(!event.bit(), Ordering::AcqRel) & event.bit() != 0
    }

    /// Atomically take every pending flag
    pub fn take(&self) -> EventSet {
        EventSet(self.flags.swap(0, Ordering::AcqRel))
    }

    pub fn is_pending(&self, event: CoordEvent) -> bool {
        self.flags.load(Ordering::Acquire) & event.bit() != 0
    }

    pub fn has_pending(&self) -> bool {
        self.flags.load(Ordering::Acquire) != 0
    }
}

// ----------------------------------------------------------------------------
// Timer Service
// ----------------------------------------------------------------------------

/// The three one-shot clocks the coordinator owns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerId {
    TricklePa,
    TricklePc,
    JoinPermit,
}

impl TimerId {
    /// Event a timer posts when it fires
    pub fn event(self) -> CoordEvent {
        match self {
            TimerId::TricklePa => CoordEvent::TricklePa,
            TimerId::TricklePc => CoordEvent::TricklePc,
            TimerId::JoinPermit => CoordEvent::JoinPermitExpired,
        }
    }
}

/// One-shot timers backing the trickle and join-permit clocks
///
/// On expiry an implementation posts [`TimerId::event`] to the coordinator's
/// [`PendingEvents`] and wakes the worker. It must not call into the
/// coordinator itself.
pub trait TimerService {
    /// Arm `timer` to fire after `delay_ms`, replacing any earlier arming
    fn arm(&mut self, timer: TimerId, delay_ms: u32);

    /// Cancel `timer`; a no-op when it is not armed
    fn disarm(&mut self, timer: TimerId);

    fn is_armed(&self, timer: TimerId) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn drain_follows_fixed_order() {
        let pending = PendingEvents::new();
        pending.post(CoordEvent::JoinPermitExpired);
        pending.post(CoordEvent::StateChange);
        pending.post(CoordEvent::TricklePa);

        let drained: Vec<_> = pending.take().iter().collect();
        assert_eq!(
            drained,
            [
                CoordEvent::TricklePa,
                CoordEvent::StateChange,
                CoordEvent::JoinPermitExpired
            ]
        );
        assert!(!pending.has_pending());
    }

    #[test]
    fn posting_twice_coalesces() {
        let pending = PendingEvents::new();
        assert!(pending.post(CoordEvent::TricklePc));
        assert!(!pending.post(CoordEvent::TricklePc));
        assert!(pending.is_pending(CoordEvent::TricklePc));
        assert_eq!(pending.take().iter().count(), 1);
    }

    #[test]
    fn cancel_clears_only_that_flag() {
        let pending = PendingEvents::new();
        pending.post(CoordEvent::TricklePa);
        pending.post(CoordEvent::JoinPermitExpired);

        assert!(pending.cancel(CoordEvent::JoinPermitExpired));
        assert!(!pending.cancel(CoordEvent::JoinPermitExpired));
        let drained: Vec<_> = pending.take().iter().collect();
        assert_eq!(drained, [CoordEvent::TricklePa]);
    }

    #[test]
    fn timers_map_to_events() {
        assert_eq!(TimerId::JoinPermit.event(), CoordEvent::JoinPermitExpired);
        assert_eq!(TimerId::TricklePa.event(), CoordEvent::TricklePa);
    }
}
