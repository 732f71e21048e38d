//! Core types for the coordinator control plane
//!
//! Addressing newtypes, the channel bitmap, and the time abstraction shared by
//! every component. Addresses follow IEEE 802.15.4 conventions.

use core::fmt;
use core::ops::{Add, Sub};
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Short Address
// ----------------------------------------------------------------------------

/// 16-bit MAC short address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ShortAddr(u16);

impl ShortAddr {
    /// No short address has been assigned
    #[doc(alias = "INVALID_SHORT_ADDR")]
    pub const UNASSIGNED: Self = Self(0xFFFF);

    /// Device must be addressed by its extended address
    pub const USE_EXTENDED: Self = Self(0xFFFE);

    /// First address handed out to joining devices
    pub const FIRST_DEVICE: Self = Self(0x0001);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    pub fn is_assigned(self) -> bool {
        self != Self::UNASSIGNED
    }

    /// Next address in the sequential allocation order
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for ShortAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl From<u16> for ShortAddr {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

// ----------------------------------------------------------------------------
// Extended Address
// ----------------------------------------------------------------------------

/// 64-bit IEEE extended address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ExtAddr([u8; 8]);

impl ExtAddr {
    /// Erased pattern used by cleared storage and table slots
    pub const ERASED: Self = Self([0xFF; 8]);

    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for ExtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

// ----------------------------------------------------------------------------
// PAN Identifier
// ----------------------------------------------------------------------------

/// 16-bit PAN identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PanId(u16);

impl PanId {
    /// Broadcast PAN ID, never usable for a formed network
    pub const BROADCAST: Self = Self(0xFFFF);

    /// Used when the configured PAN ID is not usable
    pub const DEFAULT: Self = Self(0x0001);

    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Zero and broadcast cannot identify a network this coordinator forms
    pub fn is_usable(self) -> bool {
        self.0 != 0 && self != Self::BROADCAST
    }

    /// Next candidate while probing for a collision-free PAN ID
    pub fn next_candidate(self) -> Self {
        let next = self.0.wrapping_add(1);
        if next == 0 || next == Self::BROADCAST.0 {
            Self::DEFAULT
        } else {
            Self(next)
        }
    }
}

impl fmt::Display for PanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

impl From<u16> for PanId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

// ----------------------------------------------------------------------------
// Channel Mask
// ----------------------------------------------------------------------------

/// Highest number of channels a PHY can expose
pub const MAX_CHANNELS: usize = 129;

/// Bytes needed to hold one bit per channel
pub const CHANNEL_BITMAP_SIZE: usize = 17;

/// Bitmap of enabled channels, bit `n` of byte `n / 8` is channel `n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChannelMask([u8; CHANNEL_BITMAP_SIZE]);

impl ChannelMask {
    pub const fn empty() -> Self {
        Self([0; CHANNEL_BITMAP_SIZE])
    }

    pub const fn from_bytes(bytes: [u8; CHANNEL_BITMAP_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_channels(channels: &[u8]) -> Self {
        let mut mask = Self::empty();
        for &channel in channels {
            mask.insert(channel);
        }
        mask
    }

    pub fn as_bytes(&self) -> &[u8; CHANNEL_BITMAP_SIZE] {
        &self.0
    }

    pub fn contains(&self, channel: u8) -> bool {
        let channel = channel as usize;
        channel < MAX_CHANNELS && self.0[channel / 8] & (1 << (channel % 8)) != 0
    }

    /// Out-of-range channels are ignored
    pub fn insert(&mut self, channel: u8) {
        let channel = channel as usize;
        if channel < MAX_CHANNELS {
            self.0[channel / 8] |= 1 << (channel % 8);
        }
    }

    pub fn remove(&mut self, channel: u8) {
        let channel = channel as usize;
        if channel < MAX_CHANNELS {
            self.0[channel / 8] &= !(1 << (channel % 8));
        }
    }

    pub fn clear(&mut self) {
        self.0 = [0; CHANNEL_BITMAP_SIZE];
    }

    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// Number of enabled channels
    pub fn count(&self) -> usize {
        self.0.iter().map(|byte| byte.count_ones() as usize).sum()
    }

    /// Lowest enabled channel
    pub fn first(&self) -> Option<u8> {
        self.iter().next()
    }

    /// Enabled channels in ascending order
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        (0..MAX_CHANNELS as u8).filter(move |channel| self.contains(*channel))
    }

    /// Every channel not enabled in this mask, within the PHY range
    pub fn complement(&self) -> Self {
        let mut inverted = Self::empty();
        for channel in 0..MAX_CHANNELS as u8 {
            if !self.contains(channel) {
                inverted.insert(channel);
            }
        }
        inverted
    }
}

// ----------------------------------------------------------------------------
// Device & Network Descriptors
// ----------------------------------------------------------------------------

/// Identity of a device on the PAN
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub pan_id: PanId,
    pub short_addr: ShortAddr,
    pub ext_addr: ExtAddr,
}

impl DeviceDescriptor {
    pub fn new(pan_id: PanId, short_addr: ShortAddr, ext_addr: ExtAddr) -> Self {
        Self {
            pan_id,
            short_addr,
            ext_addr,
        }
    }
}

/// Parameters of a formed network, reported on start and persisted for restore
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// The coordinator's own identity
    pub device: DeviceDescriptor,
    pub channel: u8,
    /// Network was formed with frequency hopping
    pub frequency_hopping: bool,
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Add<u64> for Timestamp {
    type Output = Timestamp;

    fn add(self, other: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(other))
    }
}

impl Sub for Timestamp {
    type Output = u64;

    fn sub(self, other: Timestamp) -> u64 {
        self.0.saturating_sub(other.0)
    }
}

impl Timestamp {
    pub fn new(millis: u64) -> Self {
        Self(millis)
    }

    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

/// Source of the current time, injected so timer logic stays deterministic
pub trait TimeSource {
    fn now(&self) -> Timestamp;
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// Monotonic time measured from the moment the source was created
        #[derive(Debug, Clone, Copy)]
        pub struct SystemTimeSource {
            origin: std::time::Instant,
        }

        impl SystemTimeSource {
            pub fn new() -> Self {
                Self {
                    origin: std::time::Instant::now(),
                }
            }
        }

        impl Default for SystemTimeSource {
            fn default() -> Self {
                Self::new()
            }
        }

        impl TimeSource for SystemTimeSource {
            fn now(&self) -> Timestamp {
                Timestamp::new(self.origin.elapsed().as_millis() as u64)
            }
        }
    }
}
