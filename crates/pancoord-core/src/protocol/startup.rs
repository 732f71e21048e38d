//! Startup and restore state
//!
//! The lifecycle state is what the application observes; the startup state is
//! the internal step of the scan/start sequence. Transitions are driven by the
//! coordinator, the pure helpers here only decide what the next step is.

use core::fmt;
use serde::{Deserialize, Serialize};

use super::pan_list::PanDescriptorList;
use crate::types::ChannelMask;

// ----------------------------------------------------------------------------
// Lifecycle State
// ----------------------------------------------------------------------------

/// Externally visible coordinator state, ordered by progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    InitWaiting,
    StartingCoordinator,
    InitRestoringCoordinator,
    Started,
    Restored,
    JoiningAllowed,
    JoiningNotAllowed,
}

impl LifecycleState {
    pub fn is_joining(self) -> bool {
        matches!(
            self,
            LifecycleState::JoiningAllowed | LifecycleState::JoiningNotAllowed
        )
    }

    /// The network is up (started, restored, or in a join sub-state)
    pub fn is_operational(self) -> bool {
        self >= LifecycleState::Started
    }

    /// States only move forward, except the join sub-states which toggle
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        if self.is_joining() && next.is_joining() {
            return true;
        }
        next > self
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::InitWaiting => "init-waiting",
            LifecycleState::StartingCoordinator => "starting-coordinator",
            LifecycleState::InitRestoringCoordinator => "init-restoring-coordinator",
            LifecycleState::Started => "started",
            LifecycleState::Restored => "restored",
            LifecycleState::JoiningAllowed => "joining-allowed",
            LifecycleState::JoiningNotAllowed => "joining-not-allowed",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Startup State
// ----------------------------------------------------------------------------

/// Step of the scan and start sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StartupState {
    Initialized,
    /// Energy-detect scan is due
    ScanEnergyDetect,
    /// Active scan is due
    ScanActive,
    /// Hopping mode: channel chosen without scanning, start request is due
    ScanEnergyDetectConfirmed,
    /// Active scan done, start request is due
    ScanActiveConfirmed,
    StartConfirmed,
}

impl fmt::Display for StartupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

// ----------------------------------------------------------------------------
// Scan Session
// ----------------------------------------------------------------------------

/// Scratch state of one scan sequence
#[derive(Debug, Clone)]
pub struct ScanSession {
    /// Energy readings of the last energy-detect scan, ascending by channel
    pub energy: alloc::vec::Vec<u8>,
    pub pans: PanDescriptorList,
}

impl ScanSession {
    pub fn new(pan_capacity: usize) -> Self {
        Self {
            energy: alloc::vec::Vec::new(),
            pans: PanDescriptorList::new(pan_capacity),
        }
    }

    /// Forget everything gathered by the previous sequence
    pub fn reset(&mut self) {
        self.energy.clear();
        self.pans.clear();
    }
}

/// Quietest channel of `mask` given per-channel energy readings
///
/// `energy[i]` is the reading for the `i`-th channel number, so channels
/// outside the mask are skipped. Strictly lower energy wins, so ties keep the
/// lowest channel. Without readings the first channel of the mask is used.
pub fn best_channel(mask: &ChannelMask, energy: &[u8]) -> Option<u8> {
    if energy.is_empty() {
        return mask.first();
    }
    let mut best: Option<(u8, u8)> = None;
    for (channel, reading) in energy.iter().enumerate() {
        let Ok(channel) = u8::try_from(channel) else {
            break;
        };
        if !mask.contains(channel) {
            continue;
        }
        match best {
            Some((_, lowest)) if *reading >= lowest => {}
            _ => best = Some((channel, *reading)),
        }
    }
    best.map(|(channel, _)| channel).or_else(|| mask.first())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_moves_forward_only() {
        use LifecycleState::*;
        assert!(InitWaiting.can_transition_to(StartingCoordinator));
        assert!(StartingCoordinator.can_transition_to(Started));
        assert!(InitRestoringCoordinator.can_transition_to(Restored));
        assert!(Started.can_transition_to(JoiningAllowed));
        assert!(JoiningNotAllowed.can_transition_to(JoiningAllowed));
        assert!(JoiningAllowed.can_transition_to(JoiningNotAllowed));
        assert!(!Started.can_transition_to(StartingCoordinator));
        assert!(!JoiningAllowed.can_transition_to(Started));
        assert!(!Started.can_transition_to(Started));
    }

    #[test]
    fn best_channel_picks_lowest_energy_in_mask() {
        let mask = ChannelMask::from_channels(&[1, 2, 3]);
        let energy = [0, 40, 10, 10, 90];
        assert_eq!(best_channel(&mask, &energy), Some(2));
    }

    #[test]
    fn best_channel_ignores_channels_outside_mask() {
        let mask = ChannelMask::from_channels(&[5]);
        let energy = [0, 0, 0, 0, 0, 200, 0];
        assert_eq!(best_channel(&mask, &energy), Some(5));
    }

    #[test]
    fn best_channel_without_readings_uses_first_in_mask() {
        let mask = ChannelMask::from_channels(&[7, 9]);
        assert_eq!(best_channel(&mask, &[]), Some(7));
        assert_eq!(best_channel(&ChannelMask::empty(), &[]), None);
    }

    #[test]
    fn best_channel_falls_back_when_readings_miss_mask() {
        let mask = ChannelMask::from_channels(&[20]);
        assert_eq!(best_channel(&mask, &[3, 4]), Some(20));
    }

    #[test]
    fn scan_session_reset_clears_both_lists() {
        let mut session = ScanSession::new(4);
        session.energy.push(3);
        session.pans.record(1, crate::types::PanId::new(2));
        session.reset();
        assert!(session.energy.is_empty());
        assert!(session.pans.is_empty());
    }
}
