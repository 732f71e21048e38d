//! Software key table
//!
//! Stands in for the MAC security PIB: one network key with its outgoing frame
//! counter, and a bounded table of trusted devices.

use hashbrown::HashMap;
use pancoord_core::{
    ExtAddr, KeyTableInit, PanId, SecurityError, SecurityService, ShortAddr, KEY_LEN,
};
use tracing::{debug, warn};

/// Device entries a default key table holds
pub const DEFAULT_DEVICE_TABLE_SIZE: usize = 64;

/// Trusted device entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceEntry {
    pub pan_id: PanId,
    pub short_addr: ShortAddr,
    pub frame_counter: u32,
}

#[derive(Debug, Clone)]
pub struct SoftwareSecurity {
    key: Option<KeyTableInit>,
    devices: HashMap<ExtAddr, DeviceEntry>,
    capacity: usize,
}

impl Default for SoftwareSecurity {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_DEVICE_TABLE_SIZE)
    }
}

impl SoftwareSecurity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            key: None,
            devices: HashMap::new(),
            capacity,
        }
    }

    /// The loaded network key, if any
    pub fn key(&self) -> Option<&KeyTableInit> {
        self.key.as_ref()
    }

    pub fn device(&self, ext_addr: &ExtAddr) -> Option<DeviceEntry> {
        self.devices.get(ext_addr).copied()
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

impl SecurityService for SoftwareSecurity {
    fn init_key_table(&mut self, init: &KeyTableInit) -> Result<(), SecurityError> {
        if init.key == [0u8; KEY_LEN] {
            warn!("Refusing all-zero network key");
            return Err(SecurityError::KeyImportFailed {
                reason: "all-zero key".to_string(),
            });
        }
        debug!(
            "Loaded network key index {} with frame counter {}",
            init.key_index, init.frame_counter
        );
        self.key = Some(init.clone());
        Ok(())
    }

    fn add_device(
        &mut self,
        pan_id: PanId,
        short_addr: ShortAddr,
        ext_addr: &ExtAddr,
        frame_counter: u32,
    ) -> Result<(), SecurityError> {
        if !self.devices.contains_key(ext_addr) && self.devices.len() >= self.capacity {
            return Err(SecurityError::DeviceTableFull {
                capacity: self.capacity,
            });
        }
        self.devices.insert(
            *ext_addr,
            DeviceEntry {
                pan_id,
                short_addr,
                frame_counter,
            },
        );
        Ok(())
    }

    fn remove_device(&mut self, ext_addr: &ExtAddr) -> Result<(), SecurityError> {
        self.devices
            .remove(ext_addr)
            .map(|_| ())
            .ok_or(SecurityError::DeviceNotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pancoord_core::config::SecurityConfig;
    use pancoord_core::SecurityEnvelope;

    fn ext(last: u8) -> ExtAddr {
        ExtAddr::new([0, 0, 0, 0, 0, 0, 0, last])
    }

    #[test]
    fn zero_key_rejected() {
        let envelope = SecurityEnvelope::from_config(&SecurityConfig::default());
        let mut security = SoftwareSecurity::new();
        let result = security.init_key_table(&envelope.key_table_init([0; KEY_LEN], 0));
        assert!(matches!(result, Err(SecurityError::KeyImportFailed { .. })));
        assert!(security.key().is_none());
    }

    #[test]
    fn key_loaded_with_frame_counter() {
        let envelope = SecurityEnvelope::from_config(&SecurityConfig::default());
        let mut security = SoftwareSecurity::new();
        security
            .init_key_table(&envelope.key_table_init([7; KEY_LEN], 300))
            .unwrap();
        assert_eq!(security.key().map(|key| key.frame_counter), Some(300));
    }

    #[test]
    fn device_table_bounded() {
        let mut security = SoftwareSecurity::with_capacity(1);
        let pan = PanId::new(1);
        security.add_device(pan, ShortAddr::new(1), &ext(1), 0).unwrap();
        assert_eq!(
            security.add_device(pan, ShortAddr::new(2), &ext(2), 0),
            Err(SecurityError::DeviceTableFull { capacity: 1 })
        );
        // Re-adding a known device refreshes it
        security.add_device(pan, ShortAddr::new(1), &ext(1), 40).unwrap();
        assert_eq!(security.device(&ext(1)).map(|entry| entry.frame_counter), Some(40));
    }

    #[test]
    fn remove_unknown_device_fails() {
        let mut security = SoftwareSecurity::new();
        assert_eq!(security.remove_device(&ext(1)), Err(SecurityError::DeviceNotFound));
    }
}
