//! MAC callback interception
//!
//! The application hands the coordinator its callback table. The coordinator
//! keeps that table and decides, per event kind, whether its own bookkeeping
//! runs first. Application handlers for a kind always run afterwards, in the
//! order they were registered.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use super::primitives::{MacEvent, MacEventKind, MAC_EVENT_KINDS};

/// Application callback for one kind of MAC event
pub type MacHandler = Box<dyn FnMut(&MacEvent) + Send>;

/// The application's MAC callback table
///
/// Each event kind owns an ordered chain of handlers. A kind with no handlers
/// is skipped silently when forwarding.
pub struct MacCallbacks {
    chains: [Vec<MacHandler>; MAC_EVENT_KINDS],
}

impl MacCallbacks {
    pub fn new() -> Self {
        Self {
            chains: Default::default(),
        }
    }

    /// Append a handler to the chain for `kind`
    pub fn on<F>(mut self, kind: MacEventKind, handler: F) -> Self
    where
        F: FnMut(&MacEvent) + Send + 'static,
    {
        self.register(kind, handler);
        self
    }

    pub fn register<F>(&mut self, kind: MacEventKind, handler: F)
    where
        F: FnMut(&MacEvent) + Send + 'static,
    {
        self.chains[kind.index()].push(Box::new(handler));
    }

    pub fn has_handler(&self, kind: MacEventKind) -> bool {
        !self.chains[kind.index()].is_empty()
    }

    /// Invoke every handler registered for the event's kind
    pub fn forward(&mut self, event: &MacEvent) {
        for handler in self.chains[event.kind().index()].iter_mut() {
            handler(event);
        }
    }
}

impl Default for MacCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MacCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for kind in MacEventKind::ALL {
            let count = self.chains[kind.index()].len();
            if count > 0 {
                list.entry(&kind, &count);
            }
        }
        list.finish()
    }
}

// ----------------------------------------------------------------------------
// Intercepted Kinds
// ----------------------------------------------------------------------------

/// Event kinds the coordinator handles before the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterceptSet {
    kinds: [bool; MAC_EVENT_KINDS],
}

impl InterceptSet {
    /// Kinds intercepted in both channel modes
    const ALWAYS: [MacEventKind; 6] = [
        MacEventKind::AssociateIndication,
        MacEventKind::StartConfirm,
        MacEventKind::DisassociateIndication,
        MacEventKind::DisassociateConfirm,
        MacEventKind::DataIndication,
        MacEventKind::CommStatusIndication,
    ];

    /// Beacon-enabled scanning depends on beacons, scan confirms and orphans;
    /// frequency hopping depends on asynchronous frames instead.
    pub fn for_mode(frequency_hopping: bool) -> Self {
        let mut kinds = [false; MAC_EVENT_KINDS];
        for kind in Self::ALWAYS {
            kinds[kind.index()] = true;
        }
        let mode_kinds: &[MacEventKind] = if frequency_hopping {
            &[MacEventKind::AsyncIndication]
        } else {
            &[
                MacEventKind::BeaconNotify,
                MacEventKind::ScanConfirm,
                MacEventKind::OrphanIndication,
            ]
        };
        for kind in mode_kinds {
            kinds[kind.index()] = true;
        }
        Self { kinds }
    }

    pub fn contains(&self, kind: MacEventKind) -> bool {
        self.kinds[kind.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = MacEventKind> + '_ {
        MacEventKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mac::primitives::MacStatus;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_run_in_registration_order() {
        let order = Arc::new(AtomicUsize::new(0));
        let first = order.clone();
        let second = order.clone();
        let mut callbacks = MacCallbacks::new()
            .on(MacEventKind::StartConfirm, move |_| {
                assert_eq!(first.fetch_add(1, Ordering::SeqCst), 0);
            })
            .on(MacEventKind::StartConfirm, move |_| {
                assert_eq!(second.fetch_add(1, Ordering::SeqCst), 1);
            });

        callbacks.forward(&MacEvent::StartConfirm {
            status: MacStatus::Success,
        });
        assert_eq!(order.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn missing_handlers_are_skipped() {
        let mut callbacks = MacCallbacks::new();
        assert!(!callbacks.has_handler(MacEventKind::StartConfirm));
        callbacks.forward(&MacEvent::StartConfirm {
            status: MacStatus::Success,
        });
    }

    #[test]
    fn intercept_set_depends_on_mode() {
        let beacon = InterceptSet::for_mode(false);
        assert!(beacon.contains(MacEventKind::ScanConfirm));
        assert!(beacon.contains(MacEventKind::OrphanIndication));
        assert!(!beacon.contains(MacEventKind::AsyncIndication));

        let hopping = InterceptSet::for_mode(true);
        assert!(hopping.contains(MacEventKind::AsyncIndication));
        assert!(!hopping.contains(MacEventKind::BeaconNotify));

        for set in [beacon, hopping] {
            assert!(set.contains(MacEventKind::AssociateIndication));
            assert!(!set.contains(MacEventKind::PollIndication));
            assert!(!set.contains(MacEventKind::DataConfirm));
        }
        assert_eq!(beacon.iter().count(), 9);
        assert_eq!(hopping.iter().count(), 7);
    }
}
