//! Association table
//!
//! A fixed number of slots, each either empty or holding one associated device.
//! Slot indices are stable: restore places a persisted device back into the
//! slot it occupied before, and removal empties a slot without shifting others.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};

use crate::mac::CapabilityInfo;
use crate::types::ShortAddr;

// ----------------------------------------------------------------------------
// Device Status
// ----------------------------------------------------------------------------

/// Liveness and request-tracking bits of an associated device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DeviceStatus(u16);

impl DeviceStatus {
    pub const ALIVE: u16 = 0x0001;
    pub const CONFIG_SENT: u16 = 0x0100;
    pub const CONFIG_RESPONSE: u16 = 0x0200;
    pub const TRACKING_SENT: u16 = 0x1000;
    pub const TRACKING_RESPONSE: u16 = 0x2000;
    pub const TRACKING_RETRY: u16 = 0x4000;
    pub const TRACKING_ERROR: u16 = 0x8000;

    /// Both configuration bits
    pub const CONFIG_MASK: u16 = Self::CONFIG_SENT | Self::CONFIG_RESPONSE;

    /// All tracking bits
    pub const TRACKING_MASK: u16 = Self::TRACKING_SENT
        | Self::TRACKING_RESPONSE
        | Self::TRACKING_RETRY
        | Self::TRACKING_ERROR;

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True when the bits selected by `mask` equal `value`
    pub fn matches(self, mask: u16, value: u16) -> bool {
        self.0 & mask == value
    }

    pub fn is_alive(self) -> bool {
        self.0 & Self::ALIVE != 0
    }

    pub fn config_sent(self) -> bool {
        self.0 & Self::CONFIG_SENT != 0
    }

    pub fn has_config_response(self) -> bool {
        self.0 & Self::CONFIG_RESPONSE != 0
    }

    pub fn tracking_sent(self) -> bool {
        self.0 & Self::TRACKING_SENT != 0
    }

    pub fn has_tracking_response(self) -> bool {
        self.0 & Self::TRACKING_RESPONSE != 0
    }

    pub fn tracking_retry(self) -> bool {
        self.0 & Self::TRACKING_RETRY != 0
    }

    pub fn tracking_error(self) -> bool {
        self.0 & Self::TRACKING_ERROR != 0
    }

    fn set(&mut self, bits: u16) {
        self.0 |= bits;
    }

    fn clear(&mut self, bits: u16) {
        self.0 &= !bits;
    }

    pub fn mark_alive(&mut self) {
        self.set(Self::ALIVE);
    }

    pub fn mark_config_sent(&mut self) {
        self.set(Self::CONFIG_SENT);
    }

    pub fn mark_tracking_sent(&mut self) {
        self.set(Self::TRACKING_SENT);
    }

    /// Outcome of a configuration request reported by the data confirm
    pub fn record_config_confirm(&mut self, delivered: bool) {
        if delivered {
            self.set(Self::CONFIG_MASK | Self::ALIVE);
        } else {
            self.clear(Self::CONFIG_SENT);
        }
    }

    /// Outcome of a tracking request reported by the data confirm
    ///
    /// A second consecutive failure escalates retry to error.
    pub fn record_tracking_confirm(&mut self, delivered: bool) {
        if delivered {
            self.clear(Self::TRACKING_RETRY);
        } else if self.tracking_retry() {
            self.clear(Self::TRACKING_RETRY);
            self.set(Self::TRACKING_ERROR);
        } else {
            self.set(Self::TRACKING_RETRY);
        }
        self.clear(Self::TRACKING_SENT);
    }

    /// The device answered a tracking request
    pub fn record_tracking_response(&mut self) {
        self.clear(Self::TRACKING_RETRY | Self::TRACKING_ERROR);
        self.set(Self::TRACKING_RESPONSE | Self::ALIVE);
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Associated Device
// ----------------------------------------------------------------------------

/// One occupied slot of the association table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociatedDevice {
    pub short_addr: ShortAddr,
    pub capability: CapabilityInfo,
    pub rssi: i8,
    pub status: DeviceStatus,
}

impl AssociatedDevice {
    pub fn new(short_addr: ShortAddr, capability: CapabilityInfo) -> Self {
        Self {
            short_addr,
            capability,
            rssi: 0,
            status: DeviceStatus::default(),
        }
    }
}

// ----------------------------------------------------------------------------
// Association Table
// ----------------------------------------------------------------------------

/// Why a table insertion was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertError {
    /// Every slot is occupied
    Full,
    /// The requested slot is occupied or out of range
    SlotUnavailable { slot: usize },
    /// The short address already occupies a slot
    Duplicate { slot: usize },
    /// The sentinel address cannot be stored
    Unassigned,
}

/// Fixed-capacity table of associated devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationTable {
    slots: Box<[Option<AssociatedDevice>]>,
}

impl AssociationTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: alloc::vec![None; capacity].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub fn get(&self, slot: usize) -> Option<&AssociatedDevice> {
        self.slots.get(slot).and_then(Option::as_ref)
    }

    pub fn is_slot_free(&self, slot: usize) -> bool {
        matches!(self.slots.get(slot), Some(None))
    }

    /// Insert into the lowest free slot
    pub fn insert(&mut self, device: AssociatedDevice) -> Result<usize, InsertError> {
        self.check_insertable(&device)?;
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(InsertError::Full)?;
        self.slots[slot] = Some(device);
        Ok(slot)
    }

    /// Insert at `slot`, only if that slot is free
    pub fn insert_at(&mut self, slot: usize, device: AssociatedDevice) -> Result<(), InsertError> {
        self.check_insertable(&device)?;
        if !self.is_slot_free(slot) {
            return Err(InsertError::SlotUnavailable { slot });
        }
        self.slots[slot] = Some(device);
        Ok(())
    }

    fn check_insertable(&self, device: &AssociatedDevice) -> Result<(), InsertError> {
        if !device.short_addr.is_assigned() {
            return Err(InsertError::Unassigned);
        }
        match self.find_by_short_addr(device.short_addr) {
            Some((slot, _)) => Err(InsertError::Duplicate { slot }),
            None => Ok(()),
        }
    }

    /// Empty `slot`, returning what it held
    pub fn clear_slot(&mut self, slot: usize) -> Option<AssociatedDevice> {
        self.slots.get_mut(slot).and_then(Option::take)
    }

    /// Empty every slot
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    pub fn find_by_short_addr(&self, short_addr: ShortAddr) -> Option<(usize, &AssociatedDevice)> {
        self.iter()
            .find(|(_, device)| device.short_addr == short_addr)
    }

    pub fn find_by_short_addr_mut(&mut self, short_addr: ShortAddr) -> Option<&mut AssociatedDevice> {
        self.slots
            .iter_mut()
            .flatten()
            .find(|device| device.short_addr == short_addr)
    }

    /// First device whose status bits under `mask` equal `value`
    pub fn find_by_status(&self, mask: u16, value: u16) -> Option<(usize, &AssociatedDevice)> {
        self.iter()
            .find(|(_, device)| device.status.matches(mask, value))
    }

    /// Occupied slots with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &AssociatedDevice)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|device| (index, device)))
    }

    pub fn short_addrs(&self) -> Vec<ShortAddr> {
        self.iter().map(|(_, device)| device.short_addr).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(addr: u16) -> AssociatedDevice {
        AssociatedDevice::new(ShortAddr::new(addr), CapabilityInfo::default())
    }

    #[test]
    fn insert_uses_lowest_free_slot() {
        let mut table = AssociationTable::new(3);
        assert_eq!(table.insert(device(1)), Ok(0));
        assert_eq!(table.insert(device(2)), Ok(1));
        table.clear_slot(0);
        assert_eq!(table.insert(device(3)), Ok(0));
        assert_eq!(table.find_by_short_addr(ShortAddr::new(2)).map(|(s, _)| s), Some(1));
    }

    #[test]
    fn duplicates_and_sentinel_rejected() {
        let mut table = AssociationTable::new(3);
        table.insert(device(7)).unwrap();
        assert_eq!(table.insert(device(7)), Err(InsertError::Duplicate { slot: 0 }));
        assert_eq!(
            table.insert(AssociatedDevice::new(ShortAddr::UNASSIGNED, CapabilityInfo::default())),
            Err(InsertError::Unassigned)
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn full_table_refuses_insert() {
        let mut table = AssociationTable::new(2);
        table.insert(device(1)).unwrap();
        table.insert(device(2)).unwrap();
        assert!(table.is_full());
        assert_eq!(table.insert(device(3)), Err(InsertError::Full));
    }

    #[test]
    fn insert_at_respects_occupied_slots() {
        let mut table = AssociationTable::new(4);
        table.insert_at(2, device(9)).unwrap();
        assert_eq!(
            table.insert_at(2, device(10)),
            Err(InsertError::SlotUnavailable { slot: 2 })
        );
        assert_eq!(
            table.insert_at(8, device(10)),
            Err(InsertError::SlotUnavailable { slot: 8 })
        );
        assert_eq!(table.get(2).map(|d| d.short_addr), Some(ShortAddr::new(9)));
    }

    #[test]
    fn status_lookup_matches_masked_value() {
        let mut table = AssociationTable::new(3);
        table.insert(device(1)).unwrap();
        table.insert(device(2)).unwrap();
        table
            .find_by_short_addr_mut(ShortAddr::new(2))
            .unwrap()
            .status
            .record_config_confirm(true);

        let (slot, found) = table
            .find_by_status(DeviceStatus::CONFIG_MASK, DeviceStatus::CONFIG_MASK)
            .unwrap();
        assert_eq!(slot, 1);
        assert!(found.status.is_alive());

        // Device 1 has no config bits, so it matches an all-clear query first
        let (slot, _) = table.find_by_status(DeviceStatus::CONFIG_MASK, 0).unwrap();
        assert_eq!(slot, 0);
        assert!(table.find_by_status(DeviceStatus::TRACKING_ERROR, DeviceStatus::TRACKING_ERROR).is_none());
    }

    #[test]
    fn config_confirm_failure_clears_sent() {
        let mut status = DeviceStatus::default();
        status.mark_config_sent();
        status.record_config_confirm(false);
        assert!(!status.config_sent());
        assert!(!status.is_alive());
    }

    #[test]
    fn tracking_failures_escalate() {
        let mut status = DeviceStatus::default();
        status.mark_tracking_sent();
        status.record_tracking_confirm(false);
        assert!(status.tracking_retry());
        assert!(!status.tracking_sent());

        status.mark_tracking_sent();
        status.record_tracking_confirm(false);
        assert!(!status.tracking_retry());
        assert!(status.tracking_error());

        status.record_tracking_response();
        assert!(!status.tracking_error());
        assert!(status.has_tracking_response());
        assert!(status.is_alive());
    }

    #[test]
    fn tracking_success_clears_retry() {
        let mut status = DeviceStatus::from_bits(DeviceStatus::TRACKING_RETRY | DeviceStatus::TRACKING_SENT);
        status.record_tracking_confirm(true);
        assert_eq!(status.bits(), 0);
    }
}
