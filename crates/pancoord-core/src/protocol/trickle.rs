//! Trickle timers for Wi-SUN asynchronous frames
//!
//! With frequency hopping enabled the coordinator advertises the PAN (PA frames)
//! and its configuration (PC frames) on exponentially backed-off trickle timers.
//! A solicitation from a neighbor resets the matching timer to its minimum so
//! new devices are answered promptly.

use serde::{Deserialize, Serialize};

use crate::mac::{AsyncFrameType, NeighborSchedule};
use crate::types::{ChannelMask, MAX_CHANNELS};

/// The two asynchronous frame classes driven by trickle timers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameClass {
    /// PAN advertisement
    Advertisement,
    /// PAN configuration
    Configuration,
}

impl FrameClass {
    /// Frame sent when this class's timer expires
    pub fn frame_type(self) -> AsyncFrameType {
        match self {
            FrameClass::Advertisement => AsyncFrameType::Advertisement,
            FrameClass::Configuration => AsyncFrameType::Config,
        }
    }

    /// Class whose timer a received solicitation resets
    pub fn solicited_by(frame_type: AsyncFrameType) -> Option<Self> {
        match frame_type {
            AsyncFrameType::AdvertisementSolicit => Some(FrameClass::Advertisement),
            AsyncFrameType::ConfigSolicit => Some(FrameClass::Configuration),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Trickle Timer
// ----------------------------------------------------------------------------

/// Interval state of one trickle timer; zero means stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrickleTimer {
    interval_ms: u32,
    min_ms: u32,
    max_ms: u32,
    doubling: bool,
}

impl TrickleTimer {
    pub fn new(min_ms: u32, max_ms: u32, doubling: bool) -> Self {
        Self {
            interval_ms: 0,
            min_ms,
            max_ms: max_ms.max(min_ms),
            doubling,
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    pub fn min_ms(&self) -> u32 {
        self.min_ms
    }

    pub fn max_ms(&self) -> u32 {
        self.max_ms
    }

    pub fn is_running(&self) -> bool {
        self.interval_ms > 0
    }

    pub fn is_at_min(&self) -> bool {
        self.interval_ms == self.min_ms
    }

    /// Start at `interval_ms`, clamped into the configured range
    pub fn start(&mut self, interval_ms: u32) -> u32 {
        self.interval_ms = interval_ms.clamp(self.min_ms, self.max_ms);
        self.interval_ms
    }

    /// Advance after an expiry; returns the next interval, zero when stopped
    pub fn expire(&mut self) -> u32 {
        if self.doubling {
            self.interval_ms = self.interval_ms.saturating_mul(2).clamp(self.min_ms, self.max_ms);
        } else {
            self.interval_ms = 0;
        }
        self.interval_ms
    }

    /// Drop back to the minimum interval; false when already there
    pub fn reset(&mut self) -> bool {
        if self.is_at_min() {
            return false;
        }
        self.interval_ms = self.min_ms;
        true
    }
}

/// Delay before the next transmission: uniformly within `[t/2, t)`
pub fn jittered_delay(interval_ms: u32, random: u16) -> u32 {
    let half = interval_ms / 2;
    if half == 0 {
        return interval_ms;
    }
    half + u32::from(random) % half
}

// ----------------------------------------------------------------------------
// Optimal Neighbor Heuristic
// ----------------------------------------------------------------------------

/// Neighbors heard soliciting one frame class since its last transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NeighborObservations {
    fixed_found: bool,
    hopping_found: bool,
    fixed_channels: ChannelMask,
}

impl NeighborObservations {
    pub fn observe(&mut self, schedule: NeighborSchedule) {
        match schedule {
            NeighborSchedule::Fixed(channel) => {
                if usize::from(channel) < MAX_CHANNELS {
                    self.fixed_channels.insert(channel as u8);
                    self.fixed_found = true;
                }
            }
            NeighborSchedule::Hopping => self.hopping_found = true,
        }
    }

    pub fn fixed_found(&self) -> bool {
        self.fixed_found
    }

    pub fn hopping_found(&self) -> bool {
        self.hopping_found
    }

    /// Channels for the next transmission, then forget all observations
    ///
    /// Only fixed-channel neighbors were heard: target their channels.
    /// Otherwise use `default`.
    pub fn take_send_mask(&mut self, default: &ChannelMask) -> ChannelMask {
        let mask = if self.fixed_found && !self.hopping_found {
            self.fixed_channels
        } else {
            *default
        };
        *self = Self::default();
        mask
    }
}

// ----------------------------------------------------------------------------
// Trickle Engine
// ----------------------------------------------------------------------------

/// Timer and neighbor state for one frame class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrickleClass {
    pub timer: TrickleTimer,
    pub neighbors: NeighborObservations,
}

/// Both trickle classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrickleEngine {
    advertisement: TrickleClass,
    configuration: TrickleClass,
}

impl TrickleEngine {
    pub fn new(min_ms: u32, max_ms: u32, doubling: bool) -> Self {
        let class = TrickleClass {
            timer: TrickleTimer::new(min_ms, max_ms, doubling),
            neighbors: NeighborObservations::default(),
        };
        Self {
            advertisement: class,
            configuration: class,
        }
    }

    pub fn class(&self, class: FrameClass) -> &TrickleClass {
        match class {
            FrameClass::Advertisement => &self.advertisement,
            FrameClass::Configuration => &self.configuration,
        }
    }

    pub fn class_mut(&mut self, class: FrameClass) -> &mut TrickleClass {
        match class {
            FrameClass::Advertisement => &mut self.advertisement,
            FrameClass::Configuration => &mut self.configuration,
        }
    }

    pub fn timer(&self, class: FrameClass) -> &TrickleTimer {
        &self.class(class).timer
    }

    /// Staggered initial intervals: PA at the minimum, PC half a minimum later
    pub fn start(&mut self) -> (u32, u32) {
        let min = self.advertisement.timer.min_ms();
        let pa = self.advertisement.timer.start(min);
        let pc = self.configuration.timer.start(min + min / 2);
        (pa, pc)
    }
}
