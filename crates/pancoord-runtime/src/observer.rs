//! Observer that forwards coordinator notifications to the application

use pancoord_core::mac::{AssocStatus, CapabilityInfo};
use pancoord_core::{CoordinatorObserver, DeviceDescriptor, LifecycleState, NetworkInfo, ShortAddr};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

/// What the coordinator reports to the application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    StateChanged(LifecycleState),
    NetworkStarted(NetworkInfo),
    DeviceJoining {
        device: DeviceDescriptor,
        capability: CapabilityInfo,
        status: AssocStatus,
    },
    DeviceLeft(ShortAddr),
}

pub type NotificationSender = mpsc::Sender<Notification>;
pub type NotificationReceiver = mpsc::Receiver<Notification>;

/// Admission decision for a joining device
pub type AdmissionPolicy =
    Box<dyn FnMut(&DeviceDescriptor, &CapabilityInfo) -> AssocStatus + Send>;

/// Applies an admission policy and queues every notification
///
/// Notifications are dropped with a warning when the application falls behind;
/// the worker never blocks on it.
pub struct ChannelObserver {
    sender: NotificationSender,
    policy: AdmissionPolicy,
}

impl ChannelObserver {
    /// Observer that admits every device
    pub fn new(sender: NotificationSender) -> Self {
        Self {
            sender,
            policy: Box::new(|_, _| AssocStatus::Success),
        }
    }

    pub fn with_policy<F>(mut self, policy: F) -> Self
    where
        F: FnMut(&DeviceDescriptor, &CapabilityInfo) -> AssocStatus + Send + 'static,
    {
        self.policy = Box::new(policy);
        self
    }

    fn notify(&self, notification: Notification) {
        if let Err(e) = self.sender.try_send(notification) {
            warn!("Dropping coordinator notification: {}", e);
        }
    }
}

impl CoordinatorObserver for ChannelObserver {
    fn device_joining(&mut self, device: &DeviceDescriptor, capability: &CapabilityInfo) -> AssocStatus {
        let status = (self.policy)(device, capability);
        self.notify(Notification::DeviceJoining {
            device: *device,
            capability: *capability,
            status,
        });
        status
    }

    fn state_changed(&mut self, state: LifecycleState) {
        self.notify(Notification::StateChanged(state));
    }

    fn started(&mut self, info: &NetworkInfo) {
        self.notify(Notification::NetworkStarted(*info));
    }

    fn device_disassociated(&mut self, short_addr: ShortAddr) {
        self.notify(Notification::DeviceLeft(short_addr));
    }
}
