//! Channel utilities for the pancoord harness
//!
//! The simulated MAC delivers confirms and indications on a bounded channel the
//! worker reads from, the same way a radio driver would.

use std::fmt;

use pancoord_core::MacEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    ChannelFull,
    ChannelClosed,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::ChannelFull => write!(f, "Channel buffer is full"),
            ChannelError::ChannelClosed => write!(f, "Channel is closed"),
        }
    }
}

impl std::error::Error for ChannelError {}

pub type MacEventSender = tokio::sync::mpsc::Sender<MacEvent>;
pub type MacEventReceiver = tokio::sync::mpsc::Receiver<MacEvent>;

/// Default depth of the MAC event queue
pub const DEFAULT_MAC_EVENT_BUFFER: usize = 64;

pub fn create_mac_event_channel(buffer_size: usize) -> (MacEventSender, MacEventReceiver) {
    tokio::sync::mpsc::channel(buffer_size)
}

pub trait NonBlockingSend<T> {
    fn try_send_non_blocking(&self, message: T) -> Result<(), ChannelError>;
}

impl NonBlockingSend<MacEvent> for MacEventSender {
    fn try_send_non_blocking(&self, event: MacEvent) -> Result<(), ChannelError> {
        self.try_send(event).map_err(|e| match e {
            tokio::sync::mpsc::error::TrySendError::Full(_) => ChannelError::ChannelFull,
            tokio::sync::mpsc::error::TrySendError::Closed(_) => ChannelError::ChannelClosed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pancoord_core::mac::MacStatus;

    fn start_confirm() -> MacEvent {
        MacEvent::StartConfirm {
            status: MacStatus::Success,
        }
    }

    #[test]
    fn full_and_closed_channels_reported() {
        let (sender, receiver) = create_mac_event_channel(1);
        assert!(sender.try_send_non_blocking(start_confirm()).is_ok());
        assert_eq!(
            sender.try_send_non_blocking(start_confirm()),
            Err(ChannelError::ChannelFull)
        );
        drop(receiver);
        assert_eq!(
            sender.try_send_non_blocking(start_confirm()),
            Err(ChannelError::ChannelClosed)
        );
    }
}
