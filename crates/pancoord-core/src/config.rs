//! Coordinator configuration
//!
//! One struct per concern, gathered into [`CoordinatorConfig`]. Every struct has
//! a `Default` matching a typical sub-GHz deployment and a `testing()` preset
//! with short timers.

use alloc::string::String;
use alloc::vec::Vec;

use crate::mac::{KeyIdMode, SecurityLevel, KEY_SOURCE_LEN, NET_NAME_MAX_LEN};
use crate::security::KEY_LEN;
use crate::types::{ChannelMask, PanId, ShortAddr};

// ----------------------------------------------------------------------------
// Network Configuration
// ----------------------------------------------------------------------------

/// Parameters of the network the coordinator forms
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NetworkConfig {
    /// PAN ID to form; bumped during startup if a neighbor already uses it
    pub pan_id: PanId,
    /// Channels considered when scanning and starting
    pub channel_mask: ChannelMask,
    pub channel_page: u8,
    pub phy_id: u8,
    /// Scan duration exponent passed to the MAC
    pub scan_duration: u8,
    /// 15 for a non-beacon network
    pub beacon_order: u8,
    pub superframe_order: u8,
    /// Association table capacity
    pub max_devices: usize,
    /// Distinct PANs remembered per scan session
    pub pan_descriptor_capacity: usize,
    /// PAN-ID increments tried before starting on a colliding ID
    pub max_pan_id_probes: u16,
    /// The coordinator's own short address
    pub short_addr: ShortAddr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            pan_id: PanId::DEFAULT,
            channel_mask: ChannelMask::from_channels(&[0]),
            channel_page: 9,
            phy_id: 1,
            scan_duration: 5,
            beacon_order: 15,
            superframe_order: 15,
            max_devices: 50,
            pan_descriptor_capacity: 16,
            max_pan_id_probes: 16,
            short_addr: ShortAddr::new(0xAABB),
        }
    }
}

impl NetworkConfig {
    /// Small table and scan list for tests
    pub fn testing() -> Self {
        Self {
            max_devices: 8,
            pan_descriptor_capacity: 8,
            scan_duration: 2,
            ..Self::default()
        }
    }

    /// Builder method for the forming PAN ID
    pub fn with_pan_id(mut self, pan_id: PanId) -> Self {
        self.pan_id = pan_id;
        self
    }

    /// Builder method for the scan and start channels
    pub fn with_channels(mut self, channels: &[u8]) -> Self {
        self.channel_mask = ChannelMask::from_channels(channels);
        self
    }

    /// Builder method for the association table capacity
    pub fn with_max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = max_devices;
        self
    }
}

// ----------------------------------------------------------------------------
// Frequency Hopping Configuration
// ----------------------------------------------------------------------------

/// Wi-SUN frequency-hopping parameters
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FrequencyHoppingConfig {
    pub enabled: bool,
    /// Channels the unicast and broadcast schedules hop over
    pub channel_mask: ChannelMask,
    /// Channels asynchronous frames are sent on
    pub async_channel_mask: ChannelMask,
    pub unicast_dwell_ms: u8,
    pub broadcast_dwell_ms: u8,
    /// Broadcast schedule interval in milliseconds
    pub broadcast_interval_ms: u32,
    pub num_non_sleep_devices: u16,
    pub num_sleep_devices: u16,
    /// Network name carried in PA frames and matched on received async frames
    pub net_name: Vec<u8>,
}

impl Default for FrequencyHoppingConfig {
    fn default() -> Self {
        let channels: Vec<u8> = (0..=128u8).collect();
        Self {
            enabled: false,
            channel_mask: ChannelMask::from_channels(&channels),
            async_channel_mask: ChannelMask::from_channels(&channels),
            unicast_dwell_ms: 250,
            broadcast_dwell_ms: 100,
            broadcast_interval_ms: 0xFF,
            num_non_sleep_devices: 50,
            num_sleep_devices: 0,
            net_name: b"FHTest".to_vec(),
        }
    }
}

impl FrequencyHoppingConfig {
    /// Hopping over a handful of channels
    pub fn testing() -> Self {
        let channels = [0, 1, 2, 3, 4, 5, 6, 7];
        Self {
            enabled: true,
            channel_mask: ChannelMask::from_channels(&channels),
            async_channel_mask: ChannelMask::from_channels(&channels),
            ..Self::default()
        }
    }

    /// Builder method for the network name
    pub fn with_net_name(mut self, net_name: &[u8]) -> Self {
        self.net_name = net_name.to_vec();
        self
    }
}

// ----------------------------------------------------------------------------
// Trickle Configuration
// ----------------------------------------------------------------------------

/// Interval bounds of the PA and PC trickle timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrickleConfig {
    pub min_interval_ms: u32,
    pub max_interval_ms: u32,
    /// Double the interval on every expiry; otherwise each timer fires once
    pub doubling: bool,
}

impl Default for TrickleConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 6_000,
            max_interval_ms: 96_000,
            doubling: true,
        }
    }
}

impl TrickleConfig {
    pub fn testing() -> Self {
        Self {
            min_interval_ms: 100,
            max_interval_ms: 800,
            doubling: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Security Configuration
// ----------------------------------------------------------------------------

/// MAC security applied to coordinator frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SecurityConfig {
    pub enabled: bool,
    pub level: SecurityLevel,
    pub key_id_mode: KeyIdMode,
    pub key_index: u8,
    pub key_source: [u8; KEY_SOURCE_LEN],
    /// Network key loaded into the MAC key table at startup
    pub default_key: [u8; KEY_LEN],
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: SecurityLevel::EncMic32,
            key_id_mode: KeyIdMode::EightByte,
            key_index: 3,
            key_source: [0x33; KEY_SOURCE_LEN],
            default_key: [
                0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x00,
            ],
        }
    }
}

impl SecurityConfig {
    /// Frames go out in the clear
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

// ----------------------------------------------------------------------------
// Join Configuration
// ----------------------------------------------------------------------------

/// How joining devices are addressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct JoinConfig {
    /// Give a rejoining device the short address persisted for it
    pub reuse_known_addresses: bool,
    /// First short address handed out
    pub first_short_addr: ShortAddr,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            reuse_known_addresses: true,
            first_short_addr: ShortAddr::FIRST_DEVICE,
        }
    }
}

// ----------------------------------------------------------------------------
// Coordinator Configuration
// ----------------------------------------------------------------------------

/// Complete coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct CoordinatorConfig {
    pub network: NetworkConfig,
    pub frequency_hopping: FrequencyHoppingConfig,
    pub trickle: TrickleConfig,
    pub security: SecurityConfig,
    pub join: JoinConfig,
}

impl CoordinatorConfig {
    /// Create new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new builder for CoordinatorConfig
    pub fn builder() -> CoordinatorConfigBuilder {
        CoordinatorConfigBuilder::new()
    }

    /// Beacon-mode network with small capacities
    pub fn testing() -> Self {
        Self {
            network: NetworkConfig::testing(),
            frequency_hopping: FrequencyHoppingConfig::default(),
            trickle: TrickleConfig::testing(),
            security: SecurityConfig::default(),
            join: JoinConfig::default(),
        }
    }

    /// Frequency-hopping network with short trickle intervals
    pub fn frequency_hopping() -> Self {
        Self {
            network: NetworkConfig::testing(),
            frequency_hopping: FrequencyHoppingConfig::testing(),
            trickle: TrickleConfig::testing(),
            security: SecurityConfig::default(),
            join: JoinConfig::default(),
        }
    }

    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    pub fn with_frequency_hopping(mut self, frequency_hopping: FrequencyHoppingConfig) -> Self {
        self.frequency_hopping = frequency_hopping;
        self
    }

    pub fn with_trickle(mut self, trickle: TrickleConfig) -> Self {
        self.trickle = trickle;
        self
    }

    pub fn with_security(mut self, security: SecurityConfig) -> Self {
        self.security = security;
        self
    }

    pub fn with_join(mut self, join: JoinConfig) -> Self {
        self.join = join;
        self
    }

    /// Check the configuration for values the coordinator cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.network.channel_mask.is_empty() {
            return Err("Channel mask cannot be empty".into());
        }
        if !self.network.pan_id.is_usable() {
            return Err("PAN ID must not be 0x0000 or the broadcast ID".into());
        }
        if self.network.max_devices == 0 {
            return Err("Max devices cannot be zero".into());
        }
        if self.network.max_devices > usize::from(u16::MAX) {
            return Err("Max devices cannot exceed the PAN size field".into());
        }
        if self.network.pan_descriptor_capacity == 0 {
            return Err("PAN descriptor capacity cannot be zero".into());
        }
        if !self.network.short_addr.is_assigned() {
            return Err("Coordinator short address must be assigned".into());
        }
        if !self.join.first_short_addr.is_assigned() {
            return Err("First device short address must be assigned".into());
        }

        if self.frequency_hopping.enabled {
            if self.frequency_hopping.channel_mask.is_empty() {
                return Err("Hopping channel mask cannot be empty".into());
            }
            if self.frequency_hopping.async_channel_mask.is_empty() {
                return Err("Async channel mask cannot be empty".into());
            }
            if self.frequency_hopping.net_name.is_empty() {
                return Err("Network name cannot be empty".into());
            }
            if self.frequency_hopping.net_name.len() > NET_NAME_MAX_LEN {
                return Err("Network name exceeds 32 bytes".into());
            }
            if self.trickle.min_interval_ms == 0 {
                return Err("Trickle minimum interval cannot be zero".into());
            }
            if self.trickle.min_interval_ms > self.trickle.max_interval_ms {
                return Err("Trickle minimum interval cannot exceed the maximum".into());
            }
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Configuration Builder Pattern
// ----------------------------------------------------------------------------

/// Builder for CoordinatorConfig that validates on build
#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfigBuilder {
    network: Option<NetworkConfig>,
    frequency_hopping: Option<FrequencyHoppingConfig>,
    trickle: Option<TrickleConfig>,
    security: Option<SecurityConfig>,
    join: Option<JoinConfig>,
}

/// Error type for configuration building
#[derive(Debug, Clone)]
pub struct ConfigBuilderError {
    pub message: String,
}

impl core::fmt::Display for ConfigBuilderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Configuration builder error: {}", self.message)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigBuilderError {}

impl CoordinatorConfigBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn network(mut self, config: NetworkConfig) -> Self {
        self.network = Some(config);
        self
    }

    pub fn frequency_hopping(mut self, config: FrequencyHoppingConfig) -> Self {
        self.frequency_hopping = Some(config);
        self
    }

    pub fn trickle(mut self, config: TrickleConfig) -> Self {
        self.trickle = Some(config);
        self
    }

    pub fn security(mut self, config: SecurityConfig) -> Self {
        self.security = Some(config);
        self
    }

    pub fn join(mut self, config: JoinConfig) -> Self {
        self.join = Some(config);
        self
    }

    /// Use the testing preset as base (can be further customized)
    pub fn testing(self) -> Self {
        Self {
            network: Some(NetworkConfig::testing()),
            frequency_hopping: Some(FrequencyHoppingConfig::default()),
            trickle: Some(TrickleConfig::testing()),
            security: Some(SecurityConfig::default()),
            join: Some(JoinConfig::default()),
        }
    }

    /// Build the configuration with validation
    pub fn build(self) -> Result<CoordinatorConfig, ConfigBuilderError> {
        let config = self.build_unchecked();
        config
            .validate()
            .map_err(|message| ConfigBuilderError { message })?;
        Ok(config)
    }

    /// Build the configuration without validation (use with caution)
    pub fn build_unchecked(self) -> CoordinatorConfig {
        CoordinatorConfig {
            network: self.network.unwrap_or_default(),
            frequency_hopping: self.frequency_hopping.unwrap_or_default(),
            trickle: self.trickle.unwrap_or_default(),
            security: self.security.unwrap_or_default(),
            join: self.join.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validation() {
        assert!(CoordinatorConfig::default().validate().is_ok());
        assert!(CoordinatorConfig::testing().validate().is_ok());
        assert!(CoordinatorConfig::frequency_hopping().validate().is_ok());
    }

    #[test]
    fn test_empty_channel_mask_rejected() {
        let mut config = CoordinatorConfig::default();
        config.network.channel_mask = ChannelMask::empty();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_hopping_checks_only_apply_when_enabled() {
        let mut config = CoordinatorConfig::default();
        config.trickle.min_interval_ms = 0;
        config.frequency_hopping.net_name.clear();
        assert!(config.validate().is_ok());

        config.frequency_hopping.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_trickle_bounds_validated() {
        let config = CoordinatorConfig::frequency_hopping().with_trickle(TrickleConfig {
            min_interval_ms: 1000,
            max_interval_ms: 500,
            doubling: true,
        });
        let err = config.validate().unwrap_err();
        assert!(err.contains("Trickle"));
    }

    #[test]
    fn test_builder_pattern() {
        let config = CoordinatorConfig::builder()
            .testing()
            .network(NetworkConfig::testing().with_channels(&[5]))
            .build()
            .expect("Builder should create valid config");

        assert_eq!(config.network.channel_mask.first(), Some(5));
        assert_eq!(config.trickle, TrickleConfig::testing());
    }

    #[test]
    fn test_builder_validation_error() {
        let result = CoordinatorConfigBuilder::new()
            .network(NetworkConfig::default().with_max_devices(0))
            .build();

        assert!(result
            .unwrap_err()
            .message
            .contains("Max devices cannot be zero"));
    }

    #[test]
    fn test_builder_unchecked() {
        let config = CoordinatorConfigBuilder::new()
            .network(NetworkConfig::default().with_pan_id(PanId::BROADCAST))
            .build_unchecked();

        assert!(config.validate().is_err());
    }
}
