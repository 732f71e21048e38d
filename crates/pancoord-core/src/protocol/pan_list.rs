//! PAN descriptors heard during a scan session
//!
//! Built from beacon notifications while scanning and consulted once, when the
//! coordinator picks its PAN ID. Entries are unique per (channel, PAN ID).

use smallvec::SmallVec;

use crate::types::PanId;

#[cfg(feature = "std")]
use tracing::debug;

#[cfg(not(feature = "std"))]
use log::debug;

/// A PAN observed on a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanDescriptorEntry {
    pub channel: u8,
    pub pan_id: PanId,
}

/// Bounded, deduplicated list of observed PANs
#[derive(Debug, Clone)]
pub struct PanDescriptorList {
    entries: SmallVec<[PanDescriptorEntry; 8]>,
    capacity: usize,
}

impl PanDescriptorList {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: SmallVec::new(),
            capacity,
        }
    }

    /// Record a PAN; returns false if it was already known or the list is full
    pub fn record(&mut self, channel: u8, pan_id: PanId) -> bool {
        let entry = PanDescriptorEntry { channel, pan_id };
        if self.entries.contains(&entry) {
            return false;
        }
        if self.entries.len() >= self.capacity {
            debug!("PAN descriptor list full, dropping {} on channel {}", pan_id, channel);
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, channel: u8, pan_id: PanId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.channel == channel && entry.pan_id == pan_id)
    }

    /// First PAN ID at or after `pan_id` that no observed PAN uses on `channel`
    ///
    /// Gives up after `max_probes` increments and returns the last candidate
    /// together with `false`.
    pub fn first_free_pan_id(&self, channel: u8, pan_id: PanId, max_probes: u16) -> (PanId, bool) {
        let mut candidate = pan_id;
        for _ in 0..max_probes {
            if !self.contains(channel, candidate) {
                return (candidate, true);
            }
            candidate = candidate.next_candidate();
        }
        let clear = !self.contains(channel, candidate);
        (candidate, clear)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &PanDescriptorEntry> {
        self.entries.iter()
    }
}
