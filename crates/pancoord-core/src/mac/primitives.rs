//! MAC request, confirm and indication primitives
//!
//! These mirror the MLME/MCPS service primitives the coordinator exchanges with
//! the MAC layer. Requests flow out through [`crate::MacService`]; confirms and
//! indications flow back in as [`MacEvent`]s.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::types::{ChannelMask, ExtAddr, PanId, ShortAddr};

// ----------------------------------------------------------------------------
// Status Codes
// ----------------------------------------------------------------------------

/// Outcome carried by MAC confirms and indications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacStatus {
    Success,
    /// Scan completed without receiving any beacon
    NoBeacon,
    NoAck,
    ChannelAccessFailure,
    TransactionExpired,
    TransactionOverflow,
    InvalidParameter,
    ScanInProgress,
    Other(u8),
}

impl MacStatus {
    pub fn is_success(self) -> bool {
        self == MacStatus::Success
    }
}

/// Association decision returned to a joining device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssocStatus {
    Success = 0,
    PanAtCapacity = 1,
    PanAccessDenied = 2,
}

impl AssocStatus {
    pub fn is_success(self) -> bool {
        self == AssocStatus::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisassociateReason {
    /// The coordinator wishes the device to leave
    Coordinator = 1,
    /// The device wishes to leave
    Device = 2,
}

// ----------------------------------------------------------------------------
// Addressing & Capabilities
// ----------------------------------------------------------------------------

/// Source or destination of a MAC frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacAddress {
    Short(ShortAddr),
    Extended(ExtAddr),
}

/// Capability information advertised by a joining device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CapabilityInfo {
    pub pan_coordinator: bool,
    pub ffd: bool,
    pub mains_power: bool,
    pub rx_on_when_idle: bool,
    pub security: bool,
    pub alloc_addr: bool,
}

impl CapabilityInfo {
    /// Decode the capability byte of an association request
    pub fn from_byte(byte: u8) -> Self {
        Self {
            pan_coordinator: byte & 0x01 != 0,
            ffd: byte & 0x02 != 0,
            mains_power: byte & 0x04 != 0,
            rx_on_when_idle: byte & 0x08 != 0,
            security: byte & 0x40 != 0,
            alloc_addr: byte & 0x80 != 0,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut byte = 0;
        if self.pan_coordinator {
            byte |= 0x01;
        }
        if self.ffd {
            byte |= 0x02;
        }
        if self.mains_power {
            byte |= 0x04;
        }
        if self.rx_on_when_idle {
            byte |= 0x08;
        }
        if self.security {
            byte |= 0x40;
        }
        if self.alloc_addr {
            byte |= 0x80;
        }
        byte
    }
}

// ----------------------------------------------------------------------------
// Security Parameters
// ----------------------------------------------------------------------------

/// Length of an auxiliary security header key source
pub const KEY_SOURCE_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum SecurityLevel {
    #[default]
    None = 0,
    Mic32 = 1,
    Mic64 = 2,
    Mic128 = 3,
    Enc = 4,
    EncMic32 = 5,
    EncMic64 = 6,
    EncMic128 = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum KeyIdMode {
    #[default]
    Implicit = 0,
    OneByte = 1,
    FourByte = 2,
    EightByte = 3,
}

/// Security fields stamped on an outgoing frame or read from an incoming one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SecurityParams {
    pub key_source: [u8; KEY_SOURCE_LEN],
    pub security_level: SecurityLevel,
    pub key_id_mode: KeyIdMode,
    pub key_index: u8,
}

// ----------------------------------------------------------------------------
// Requests
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScanType {
    EnergyDetect,
    Active,
    Passive,
    Orphan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRequest {
    pub scan_type: ScanType,
    pub channels: ChannelMask,
    /// Exponent of the per-channel dwell, as defined by the MAC
    pub duration: u8,
    pub channel_page: u8,
    pub phy_id: u8,
    pub max_results: u8,
    /// Beacons below this link quality are ignored
    pub link_quality: u8,
    pub percent_filter: u8,
    pub sec: SecurityParams,
}

/// Multi-PHY management parameters of a start request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MpmParams {
    pub offset_time_slot: u8,
    pub enhanced_beacon_order: u8,
    pub nbpan_enhanced_beacon_order: u16,
}

impl Default for MpmParams {
    fn default() -> Self {
        Self {
            offset_time_slot: 0,
            enhanced_beacon_order: 15,
            nbpan_enhanced_beacon_order: 16383,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRequest {
    pub pan_id: PanId,
    pub logical_channel: u8,
    pub channel_page: u8,
    pub phy_id: u8,
    pub beacon_order: u8,
    pub superframe_order: u8,
    pub pan_coordinator: bool,
    pub battery_life_ext: bool,
    pub coord_realignment: bool,
    pub mpm: MpmParams,
    pub start_frequency_hopping: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociateResponse {
    pub device_address: ExtAddr,
    pub assoc_short_address: ShortAddr,
    pub status: AssocStatus,
    pub sec: SecurityParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisassociateRequest {
    pub device_address: MacAddress,
    pub device_pan_id: PanId,
    pub reason: DisassociateReason,
    /// Sleepy devices are reached through the indirect queue
    pub tx_indirect: bool,
    pub sec: SecurityParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanResponse {
    pub orphan_address: ExtAddr,
    pub short_address: ShortAddr,
    pub associated_member: bool,
    pub sec: SecurityParams,
}

/// Wi-SUN asynchronous frame classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsyncFrameType {
    Advertisement,
    AdvertisementSolicit,
    Config,
    ConfigSolicit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AsyncOperation {
    Start,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncRequest {
    pub operation: AsyncOperation,
    pub frame_type: AsyncFrameType,
    pub channels: ChannelMask,
    pub sec: SecurityParams,
}

// ----------------------------------------------------------------------------
// Confirms & Indications
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BeaconType {
    Normal,
    Enhanced,
}

/// Description of a PAN heard while scanning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanDescriptor {
    pub coord_address: MacAddress,
    pub coord_pan_id: PanId,
    pub logical_channel: u8,
    pub channel_page: u8,
    pub link_quality: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfirm {
    pub status: MacStatus,
    pub scan_type: ScanType,
    /// Energy readings indexed by channel number
    pub energy_detect: Vec<u8>,
    pub pan_descriptors: Vec<PanDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociateIndication {
    pub device_address: ExtAddr,
    pub capability: CapabilityInfo,
    pub sec: SecurityParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisassociateIndication {
    pub device_address: ExtAddr,
    pub reason: DisassociateReason,
    pub sec: SecurityParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisassociateConfirm {
    pub status: MacStatus,
    pub device_address: MacAddress,
    pub pan_id: PanId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataIndication {
    pub src: MacAddress,
    pub dst: MacAddress,
    pub src_pan_id: PanId,
    pub msdu: Vec<u8>,
    pub rssi: i8,
    pub link_quality: u8,
    pub frame_counter: u32,
    pub sec: SecurityParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataConfirm {
    pub status: MacStatus,
    pub msdu_handle: u8,
    pub frame_counter: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommStatusIndication {
    pub status: MacStatus,
    pub src: MacAddress,
    pub dst: MacAddress,
    pub pan_id: PanId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollIndication {
    pub src: MacAddress,
    pub pan_id: PanId,
    pub no_response: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanIndication {
    pub orphan_address: ExtAddr,
    pub sec: SecurityParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BeaconNotifyIndication {
    pub beacon_type: BeaconType,
    pub pan_descriptor: PanDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncIndication {
    pub frame_type: AsyncFrameType,
    pub src: MacAddress,
    pub src_pan_id: PanId,
    pub rssi: i8,
    /// Raw payload information elements of the frame
    pub payload_ies: Vec<u8>,
}

/// Everything the MAC layer delivers back to the coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacEvent {
    ScanConfirm(ScanConfirm),
    StartConfirm { status: MacStatus },
    AssociateIndication(AssociateIndication),
    DisassociateIndication(DisassociateIndication),
    DisassociateConfirm(DisassociateConfirm),
    DataIndication(DataIndication),
    DataConfirm(DataConfirm),
    CommStatusIndication(CommStatusIndication),
    PollIndication(PollIndication),
    OrphanIndication(OrphanIndication),
    BeaconNotify(BeaconNotifyIndication),
    AsyncIndication(AsyncIndication),
}

/// Discriminant of a [`MacEvent`], used to key callback chains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MacEventKind {
    ScanConfirm,
    StartConfirm,
    AssociateIndication,
    DisassociateIndication,
    DisassociateConfirm,
    DataIndication,
    DataConfirm,
    CommStatusIndication,
    PollIndication,
    OrphanIndication,
    BeaconNotify,
    AsyncIndication,
}

/// Number of distinct [`MacEventKind`]s
pub const MAC_EVENT_KINDS: usize = 12;

impl MacEventKind {
    pub const ALL: [MacEventKind; MAC_EVENT_KINDS] = [
        MacEventKind::ScanConfirm,
        MacEventKind::StartConfirm,
        MacEventKind::AssociateIndication,
        MacEventKind::DisassociateIndication,
        MacEventKind::DisassociateConfirm,
        MacEventKind::DataIndication,
        MacEventKind::DataConfirm,
        MacEventKind::CommStatusIndication,
        MacEventKind::PollIndication,
        MacEventKind::OrphanIndication,
        MacEventKind::BeaconNotify,
        MacEventKind::AsyncIndication,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl MacEvent {
    pub fn kind(&self) -> MacEventKind {
        match self {
            MacEvent::ScanConfirm(_) => MacEventKind::ScanConfirm,
            MacEvent::StartConfirm { .. } => MacEventKind::StartConfirm,
            MacEvent::AssociateIndication(_) => MacEventKind::AssociateIndication,
            MacEvent::DisassociateIndication(_) => MacEventKind::DisassociateIndication,
            MacEvent::DisassociateConfirm(_) => MacEventKind::DisassociateConfirm,
            MacEvent::DataIndication(_) => MacEventKind::DataIndication,
            MacEvent::DataConfirm(_) => MacEventKind::DataConfirm,
            MacEvent::CommStatusIndication(_) => MacEventKind::CommStatusIndication,
            MacEvent::PollIndication(_) => MacEventKind::PollIndication,
            MacEvent::OrphanIndication(_) => MacEventKind::OrphanIndication,
            MacEvent::BeaconNotify(_) => MacEventKind::BeaconNotify,
            MacEvent::AsyncIndication(_) => MacEventKind::AsyncIndication,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_byte_round_trips_known_bits() {
        let cap = CapabilityInfo::from_byte(0x8e);
        assert!(cap.ffd);
        assert!(cap.mains_power);
        assert!(cap.rx_on_when_idle);
        assert!(cap.alloc_addr);
        assert!(!cap.pan_coordinator);
        assert!(!cap.security);
        assert_eq!(cap.to_byte(), 0x8e);
    }

    #[test]
    fn event_kind_indexes_are_dense() {
        for (position, kind) in MacEventKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), position);
        }
    }
}
