//! In-memory network store
//!
//! Keeps records in insertion order so `device_at` pages through them the way
//! a flash-backed list would. The whole store is serde-serializable, which lets
//! a host persist it between runs as an ordered record list.

use hashbrown::HashMap;
use pancoord_core::{
    DeviceRecord, ExtAddr, NetworkInfo, NetworkStore, ShortAddr, StoreError, StoredDevice,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Device slots a default store holds
pub const DEFAULT_STORE_CAPACITY: usize = 64;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "StoreSnapshot", from = "StoreSnapshot")]
pub struct MemoryNetworkStore {
    network: Option<NetworkInfo>,
    devices: HashMap<ExtAddr, StoredDevice>,
    order: Vec<ExtAddr>,
    frame_counter: Option<u32>,
    capacity: usize,
    writes: usize,
}

/// Serialized form: records as an ordered list
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreSnapshot {
    network: Option<NetworkInfo>,
    devices: Vec<StoredDevice>,
    frame_counter: Option<u32>,
    capacity: usize,
}

impl From<MemoryNetworkStore> for StoreSnapshot {
    fn from(store: MemoryNetworkStore) -> Self {
        Self {
            network: store.network,
            devices: store.devices().copied().collect(),
            frame_counter: store.frame_counter,
            capacity: store.capacity,
        }
    }
}

impl From<StoreSnapshot> for MemoryNetworkStore {
    fn from(snapshot: StoreSnapshot) -> Self {
        let mut store = Self::with_capacity(snapshot.capacity);
        store.network = snapshot.network;
        store.frame_counter = snapshot.frame_counter;
        for stored in snapshot.devices {
            let ext = stored.record.device.ext_addr;
            if store.devices.insert(ext, stored).is_none() {
                store.order.push(ext);
            }
        }
        store
    }
}

impl Default for MemoryNetworkStore {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STORE_CAPACITY)
    }
}

impl MemoryNetworkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            network: None,
            devices: HashMap::new(),
            order: Vec::new(),
            frame_counter: None,
            capacity,
            writes: 0,
        }
    }

    /// Number of writes since creation, a stand-in for flash wear
    pub fn writes(&self) -> usize {
        self.writes
    }

    pub fn devices(&self) -> impl Iterator<Item = &StoredDevice> {
        self.order.iter().filter_map(|ext| self.devices.get(ext))
    }
}

impl NetworkStore for MemoryNetworkStore {
    fn network_info(&self) -> Option<NetworkInfo> {
        self.network
    }

    fn save_network_info(&mut self, info: &NetworkInfo) -> Result<(), StoreError> {
        self.network = Some(*info);
        self.writes += 1;
        Ok(())
    }

    fn device_count(&self) -> usize {
        self.order.len()
    }

    fn device_at(&self, index: usize) -> Option<StoredDevice> {
        self.order
            .get(index)
            .and_then(|ext| self.devices.get(ext))
            .copied()
    }

    fn device(&self, ext_addr: &ExtAddr) -> Option<DeviceRecord> {
        self.devices.get(ext_addr).map(|stored| stored.record)
    }

    fn device_short_addr(&self, ext_addr: &ExtAddr) -> Option<ShortAddr> {
        self.device(ext_addr).map(|record| record.device.short_addr)
    }

    fn device_ext_addr(&self, short_addr: ShortAddr) -> Option<ExtAddr> {
        self.devices()
            .find(|stored| stored.record.device.short_addr == short_addr)
            .map(|stored| stored.record.device.ext_addr)
    }

    fn save_device(&mut self, slot: usize, record: DeviceRecord) -> Result<(), StoreError> {
        let ext = record.device.ext_addr;
        if !self.devices.contains_key(&ext) {
            if self.order.len() >= self.capacity {
                return Err(StoreError::DeviceListFull {
                    capacity: self.capacity,
                });
            }
            self.order.push(ext);
        }
        debug!("Storing device {} in slot {}", ext, slot);
        self.devices.insert(ext, StoredDevice { slot, record });
        self.writes += 1;
        Ok(())
    }

    fn update_device(&mut self, record: DeviceRecord) -> Result<(), StoreError> {
        let stored = self
            .devices
            .get_mut(&record.device.ext_addr)
            .ok_or(StoreError::NotFound)?;
        trace!(
            "Updating device {} rx frame counter to {}",
            record.device.ext_addr,
            record.rx_frame_counter
        );
        stored.record = record;
        self.writes += 1;
        Ok(())
    }

    fn remove_device(&mut self, ext_addr: &ExtAddr) -> Result<(), StoreError> {
        self.devices.remove(ext_addr).ok_or(StoreError::NotFound)?;
        self.order.retain(|ext| ext != ext_addr);
        self.writes += 1;
        Ok(())
    }

    fn frame_counter(&self) -> Option<u32> {
        self.frame_counter
    }

    fn save_frame_counter(&mut self, counter: u32) -> Result<(), StoreError> {
        self.frame_counter = Some(counter);
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pancoord_core::mac::CapabilityInfo;
    use pancoord_core::{DeviceDescriptor, PanId};

    fn record(short: u16, last: u8) -> DeviceRecord {
        DeviceRecord {
            device: DeviceDescriptor::new(
                PanId::new(0x1234),
                ShortAddr::new(short),
                ExtAddr::new([0, 0, 0, 0, 0, 0, 0, last]),
            ),
            capability: CapabilityInfo::from_byte(0x8e),
            rx_frame_counter: 0,
        }
    }

    #[test]
    fn paging_follows_insertion_order() {
        let mut store = MemoryNetworkStore::new();
        store.save_device(3, record(7, 0xA)).unwrap();
        store.save_device(1, record(2, 0xB)).unwrap();

        assert_eq!(store.device_count(), 2);
        assert_eq!(store.device_at(0).map(|stored| stored.slot), Some(3));
        assert_eq!(store.device_at(1).map(|stored| stored.slot), Some(1));
        assert_eq!(store.device_at(2), None);
    }

    #[test]
    fn save_replaces_by_extended_address() {
        let mut store = MemoryNetworkStore::new();
        store.save_device(0, record(1, 0xA)).unwrap();
        store.save_device(4, record(9, 0xA)).unwrap();

        assert_eq!(store.device_count(), 1);
        assert_eq!(
            store.device_short_addr(&ExtAddr::new([0, 0, 0, 0, 0, 0, 0, 0xA])),
            Some(ShortAddr::new(9))
        );
    }

    #[test]
    fn capacity_is_enforced_for_new_devices_only() {
        let mut store = MemoryNetworkStore::with_capacity(1);
        store.save_device(0, record(1, 0xA)).unwrap();
        assert_eq!(
            store.save_device(1, record(2, 0xB)),
            Err(StoreError::DeviceListFull { capacity: 1 })
        );
        assert!(store.save_device(0, record(1, 0xA)).is_ok());
    }

    #[test]
    fn remove_and_lookup() {
        let mut store = MemoryNetworkStore::new();
        store.save_device(0, record(1, 0xA)).unwrap();
        store.save_device(1, record(2, 0xB)).unwrap();

        store
            .remove_device(&ExtAddr::new([0, 0, 0, 0, 0, 0, 0, 0xA]))
            .unwrap();
        assert_eq!(store.device_count(), 1);
        assert_eq!(
            store.device_ext_addr(ShortAddr::new(2)),
            Some(ExtAddr::new([0, 0, 0, 0, 0, 0, 0, 0xB]))
        );
        assert_eq!(
            store.remove_device(&ExtAddr::new([0, 0, 0, 0, 0, 0, 0, 0xA])),
            Err(StoreError::NotFound)
        );
    }

    #[test]
    fn snapshot_keeps_storage_order() {
        let mut store = MemoryNetworkStore::with_capacity(4);
        store.save_device(5, record(3, 0xC)).unwrap();
        store.save_device(0, record(1, 0xA)).unwrap();
        store.save_frame_counter(77).unwrap();

        let restored = MemoryNetworkStore::from(StoreSnapshot::from(store));
        assert_eq!(restored.device_at(0).map(|stored| stored.slot), Some(5));
        assert_eq!(restored.device_at(1).map(|stored| stored.slot), Some(0));
        assert_eq!(restored.frame_counter(), Some(77));
        assert_eq!(restored.writes(), 0);
    }

    #[test]
    fn update_requires_existing_record() {
        let mut store = MemoryNetworkStore::new();
        let mut device = record(1, 0xA);
        assert_eq!(store.update_device(device), Err(StoreError::NotFound));

        store.save_device(2, device).unwrap();
        device.rx_frame_counter = 50;
        store.update_device(device).unwrap();
        assert_eq!(store.device_at(0).map(|stored| stored.slot), Some(2));
        assert_eq!(
            store.device(&device.device.ext_addr).map(|r| r.rx_frame_counter),
            Some(50)
        );
    }
}
