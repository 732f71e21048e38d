//! Persistence boundary
//!
//! Network parameters, the joined-device list and frame counters survive a
//! reboot through a [`NetworkStore`]. Frame counters are only written once they
//! have moved a full save window past the stored value, so flash is not worn
//! by every received frame.

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;
use crate::mac::CapabilityInfo;
use crate::types::{DeviceDescriptor, ExtAddr, NetworkInfo, ShortAddr};

/// Frame-counter advance that triggers a write
pub const FRAME_COUNTER_SAVE_WINDOW: u32 = 25;

/// Persisted record of a joined device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub device: DeviceDescriptor,
    pub capability: CapabilityInfo,
    /// Highest frame counter received from the device that was saved
    pub rx_frame_counter: u32,
}

/// A device record with the table slot it was stored for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDevice {
    pub slot: usize,
    pub record: DeviceRecord,
}

/// Non-volatile record store used by the coordinator
pub trait NetworkStore {
    /// Parameters of the network formed before the last reboot
    fn network_info(&self) -> Option<NetworkInfo>;

    fn save_network_info(&mut self, info: &NetworkInfo) -> Result<(), StoreError>;

    /// Number of persisted device records
    fn device_count(&self) -> usize;

    /// The `index`-th persisted record, in storage order
    fn device_at(&self, index: usize) -> Option<StoredDevice>;

    fn device(&self, ext_addr: &ExtAddr) -> Option<DeviceRecord>;

    fn device_short_addr(&self, ext_addr: &ExtAddr) -> Option<ShortAddr>;

    fn device_ext_addr(&self, short_addr: ShortAddr) -> Option<ExtAddr>;

    /// Add a record or replace the one with the same extended address
    fn save_device(&mut self, slot: usize, record: DeviceRecord) -> Result<(), StoreError>;

    /// Replace the record with the same extended address, keeping its slot
    fn update_device(&mut self, record: DeviceRecord) -> Result<(), StoreError>;

    fn remove_device(&mut self, ext_addr: &ExtAddr) -> Result<(), StoreError>;

    /// Last saved outgoing frame counter
    fn frame_counter(&self) -> Option<u32>;

    fn save_frame_counter(&mut self, counter: u32) -> Result<(), StoreError>;
}

/// Decides when an advancing frame counter is worth persisting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameCounterWindow {
    window: u32,
}

impl FrameCounterWindow {
    pub fn new(window: u32) -> Self {
        Self { window }
    }

    pub fn window(&self) -> u32 {
        self.window
    }

    /// `current` has moved at least one window past `saved`
    pub fn should_save(&self, saved: u32, current: u32) -> bool {
        current >= saved.saturating_add(self.window)
    }

    /// Starting counter after a reboot
    ///
    /// Counters used after the last save were never persisted, so resume one
    /// window past the stored value.
    pub fn resume_from(&self, saved: u32) -> u32 {
        saved.saturating_add(self.window)
    }
}

impl Default for FrameCounterWindow {
    fn default() -> Self {
        Self::new(FRAME_COUNTER_SAVE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saves_only_after_a_full_window() {
        let window = FrameCounterWindow::default();
        assert!(!window.should_save(100, 124));
        assert!(window.should_save(100, 125));
        assert!(window.should_save(0, 25));
        assert!(!window.should_save(u32::MAX - 3, u32::MAX - 1));
    }

    #[test]
    fn resume_skips_unsaved_counters() {
        let window = FrameCounterWindow::new(25);
        assert_eq!(window.resume_from(1000), 1025);
        assert_eq!(window.resume_from(u32::MAX), u32::MAX);
    }
}
