//! MAC security boundary
//!
//! Key material lives in a [`SecurityService`]; the coordinator only tells it
//! which devices to trust. Stamping and validating the security fields of
//! frames is done here, from configuration.

use serde::{Deserialize, Serialize};

use crate::config::SecurityConfig;
use crate::errors::SecurityError;
use crate::mac::{KeyIdMode, SecurityLevel, SecurityParams, KEY_SOURCE_LEN};
use crate::types::{ExtAddr, PanId, ShortAddr};

/// Length of the network key
pub const KEY_LEN: usize = 16;

/// Key-id lookup data of the network key: key source followed by key index
pub fn key_lookup_data(key_source: &[u8; KEY_SOURCE_LEN], key_index: u8) -> [u8; 9] {
    let mut lookup = [0u8; 9];
    lookup[..KEY_SOURCE_LEN].copy_from_slice(key_source);
    lookup[KEY_SOURCE_LEN] = key_index;
    lookup
}

/// Everything needed to load the network key into the MAC key table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTableInit {
    pub key: [u8; KEY_LEN],
    pub frame_counter: u32,
    pub key_source: [u8; KEY_SOURCE_LEN],
    pub key_index: u8,
    pub lookup_data: [u8; 9],
    pub security_level: SecurityLevel,
}

/// Key and device tables of the MAC security layer
pub trait SecurityService {
    /// Load the network key with its starting outgoing frame counter
    fn init_key_table(&mut self, init: &KeyTableInit) -> Result<(), SecurityError>;

    /// Trust a device for frames protected with the network key
    fn add_device(
        &mut self,
        pan_id: PanId,
        short_addr: ShortAddr,
        ext_addr: &ExtAddr,
        frame_counter: u32,
    ) -> Result<(), SecurityError>;

    /// Drop a device and any key material negotiated for it
    fn remove_device(&mut self, ext_addr: &ExtAddr) -> Result<(), SecurityError>;
}

/// Security fields used by every protected frame the coordinator handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityEnvelope {
    enabled: bool,
    level: SecurityLevel,
    key_id_mode: KeyIdMode,
    key_index: u8,
    key_source: [u8; KEY_SOURCE_LEN],
}

impl SecurityEnvelope {
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            enabled: config.enabled,
            level: config.level,
            key_id_mode: config.key_id_mode,
            key_index: config.key_index,
            key_source: config.key_source,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Security fields for an outgoing frame; all clear when security is off
    pub fn fill(&self) -> SecurityParams {
        if !self.enabled {
            return SecurityParams::default();
        }
        SecurityParams {
            key_source: self.key_source,
            security_level: self.level,
            key_id_mode: self.key_id_mode,
            key_index: self.key_index,
        }
    }

    /// An incoming frame used the expected security level
    pub fn check(&self, params: &SecurityParams) -> bool {
        !self.enabled || params.security_level == self.level
    }

    pub fn key_table_init(&self, key: [u8; KEY_LEN], frame_counter: u32) -> KeyTableInit {
        KeyTableInit {
            key,
            frame_counter,
            key_source: self.key_source,
            key_index: self.key_index,
            lookup_data: key_lookup_data(&self.key_source, self.key_index),
            security_level: self.level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enabled() -> SecurityEnvelope {
        SecurityEnvelope::from_config(&SecurityConfig::default())
    }

    #[test]
    fn fill_stamps_configured_fields() {
        let params = enabled().fill();
        assert_eq!(params.security_level, SecurityLevel::EncMic32);
        assert_eq!(params.key_id_mode, KeyIdMode::EightByte);
        assert_eq!(params.key_index, 3);
        assert_eq!(params.key_source, [0x33; 8]);
    }

    #[test]
    fn check_requires_matching_level() {
        let envelope = enabled();
        assert!(envelope.check(&envelope.fill()));
        assert!(!envelope.check(&SecurityParams::default()));
    }

    #[test]
    fn disabled_security_accepts_everything() {
        let config = SecurityConfig {
            enabled: false,
            ..SecurityConfig::default()
        };
        let envelope = SecurityEnvelope::from_config(&config);
        assert_eq!(envelope.fill(), SecurityParams::default());
        assert!(envelope.check(&SecurityParams::default()));
    }

    #[test]
    fn lookup_data_appends_key_index() {
        let lookup = key_lookup_data(&[0x33; 8], 3);
        assert_eq!(&lookup[..8], &[0x33; 8]);
        assert_eq!(lookup[8], 3);
    }
}
