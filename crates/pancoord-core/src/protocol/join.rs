//! Join-permit window and short-address allocation

use serde::{Deserialize, Serialize};

use crate::types::ShortAddr;

/// Join-permit duration that never expires
pub const JOIN_PERMIT_FOREVER: u32 = 0xFFFF_FFFF;

/// What a join-permit request asks of the MAC and the join timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinPermitAction {
    /// Close the window and cancel the timer
    Close,
    /// Open the window with no expiry
    OpenForever,
    /// Open the window and expire it after the given milliseconds
    OpenFor(u32),
}

impl JoinPermitAction {
    pub fn from_duration(duration_ms: u32) -> Self {
        match duration_ms {
            0 => JoinPermitAction::Close,
            JOIN_PERMIT_FOREVER => JoinPermitAction::OpenForever,
            duration => JoinPermitAction::OpenFor(duration),
        }
    }

    pub fn opens(self) -> bool {
        !matches!(self, JoinPermitAction::Close)
    }
}

/// Whether devices may currently associate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JoinPermitWindow {
    enabled: bool,
    /// Expiry of the running window, when it has one
    expires_after_ms: Option<u32>,
}

impl JoinPermitWindow {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn expires_after_ms(&self) -> Option<u32> {
        self.expires_after_ms
    }

    pub fn apply(&mut self, action: JoinPermitAction) {
        match action {
            JoinPermitAction::Close => self.close(),
            JoinPermitAction::OpenForever => {
                self.enabled = true;
                self.expires_after_ms = None;
            }
            JoinPermitAction::OpenFor(duration) => {
                self.enabled = true;
                self.expires_after_ms = Some(duration);
            }
        }
    }

    pub fn close(&mut self) {
        self.enabled = false;
        self.expires_after_ms = None;
    }
}

/// Sequential short-address pool
///
/// Addresses are handed out in increasing order and never reused for the
/// lifetime of the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortAddrAllocator {
    next: ShortAddr,
}

impl ShortAddrAllocator {
    pub fn new(first: ShortAddr) -> Self {
        Self { next: first }
    }

    pub fn peek(&self) -> ShortAddr {
        self.next
    }

    /// Take the next address, skipping the reserved values
    pub fn allocate(&mut self) -> ShortAddr {
        while !self.next.is_assigned() || self.next == ShortAddr::USE_EXTENDED {
            self.next = self.next.next();
        }
        let addr = self.next;
        self.next = addr.next();
        addr
    }

    /// Keep future allocations above an address already in use
    pub fn reserve_above(&mut self, in_use: ShortAddr) {
        if in_use >= self.next {
            self.next = in_use.next();
        }
    }
}

impl Default for ShortAddrAllocator {
    fn default() -> Self {
        Self::new(ShortAddr::FIRST_DEVICE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_map_to_actions() {
        assert_eq!(JoinPermitAction::from_duration(0), JoinPermitAction::Close);
        assert_eq!(
            JoinPermitAction::from_duration(JOIN_PERMIT_FOREVER),
            JoinPermitAction::OpenForever
        );
        assert_eq!(
            JoinPermitAction::from_duration(1000),
            JoinPermitAction::OpenFor(1000)
        );
    }

    #[test]
    fn window_tracks_expiry() {
        let mut window = JoinPermitWindow::default();
        window.apply(JoinPermitAction::OpenFor(500));
        assert!(window.is_enabled());
        assert_eq!(window.expires_after_ms(), Some(500));
        window.apply(JoinPermitAction::OpenForever);
        assert_eq!(window.expires_after_ms(), None);
        window.apply(JoinPermitAction::Close);
        assert!(!window.is_enabled());
    }

    #[test]
    fn allocator_is_monotonic() {
        let mut pool = ShortAddrAllocator::default();
        assert_eq!(pool.allocate(), ShortAddr::new(1));
        assert_eq!(pool.allocate(), ShortAddr::new(2));
        pool.reserve_above(ShortAddr::new(1));
        assert_eq!(pool.allocate(), ShortAddr::new(3));
        pool.reserve_above(ShortAddr::new(10));
        assert_eq!(pool.allocate(), ShortAddr::new(11));
    }

    #[test]
    fn allocator_skips_reserved_addresses() {
        let mut pool = ShortAddrAllocator::new(ShortAddr::new(0xFFFE));
        assert_eq!(pool.allocate(), ShortAddr::new(0));
    }
}
