//! MAC PIB attributes written and read by the coordinator

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::types::{ChannelMask, ExtAddr, PanId, ShortAddr};

/// Longest network name a Wi-SUN netname IE carries
pub const NET_NAME_MAX_LEN: usize = 32;

/// Length of a GTK hash advertised in PAN configuration frames
pub const GTK_HASH_LEN: usize = 8;

/// Standard MAC PIB attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PibAttribute {
    ShortAddress(ShortAddr),
    ExtendedAddress(ExtAddr),
    PanId(PanId),
    LogicalChannel(u8),
    AssociatePermit(bool),
    RxOnWhenIdle(bool),
    SecurityEnabled(bool),
}

/// Identifies a standard attribute for reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PibId {
    ShortAddress,
    ExtendedAddress,
    PanId,
    LogicalChannel,
    AssociatePermit,
    RxOnWhenIdle,
    SecurityEnabled,
}

impl PibAttribute {
    pub fn id(&self) -> PibId {
        match self {
            PibAttribute::ShortAddress(_) => PibId::ShortAddress,
            PibAttribute::ExtendedAddress(_) => PibId::ExtendedAddress,
            PibAttribute::PanId(_) => PibId::PanId,
            PibAttribute::LogicalChannel(_) => PibId::LogicalChannel,
            PibAttribute::AssociatePermit(_) => PibId::AssociatePermit,
            PibAttribute::RxOnWhenIdle(_) => PibId::RxOnWhenIdle,
            PibAttribute::SecurityEnabled(_) => PibId::SecurityEnabled,
        }
    }
}

/// Frequency-hopping PIB attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FhAttribute {
    UnicastChannelFunction(u8),
    BroadcastChannelFunction(u8),
    UnicastDwellInterval(u8),
    BroadcastDwellInterval(u8),
    BroadcastInterval(u32),
    NumNonSleepDevices(u16),
    NumSleepDevices(u16),
    UnicastExcludedChannels(ChannelMask),
    BroadcastExcludedChannels(ChannelMask),
    RoutingCost(u8),
    RoutingMethod(u8),
    EapolReady(u8),
    FanTpsVersion(u8),
    NetName(Vec<u8>),
    PanSize(u16),
    PanVersion(u16),
    GtkHash { index: u8, hash: [u8; GTK_HASH_LEN] },
}
