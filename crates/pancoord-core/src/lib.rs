//! PAN Coordinator Control Plane
//!
//! Sans-IO core of an IEEE 802.15.4 / Wi-SUN PAN coordinator: network
//! formation and restore, the association table, join control and the trickle
//! timers that drive asynchronous PA/PC frames. The radio MAC, persistence,
//! key storage and timers are collaborators injected through traits, so the
//! crate is `no_std` compatible and runs unchanged on a host or a gateway.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod mac;
pub mod protocol;
pub mod security;
pub mod store;
pub mod types;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{
    ConfigBuilderError, CoordinatorConfig, CoordinatorConfigBuilder, FrequencyHoppingConfig,
    JoinConfig, NetworkConfig, SecurityConfig, TrickleConfig,
};
pub use coordinator::{
    AdmitAll, Coordinator, CoordinatorInfo, CoordinatorObserver, CoordinatorStats, Services,
};
pub use errors::{CoordError, MacError, Result, SecurityError, StoreError};
pub use events::{CoordEvent, EventSet, PendingEvents, TimerId, TimerService};
pub use mac::{MacCallbacks, MacEvent, MacEventKind, MacService};
pub use protocol::{
    AssociatedDevice, AssociationTable, DeviceStatus, FrameClass, LifecycleState, StartupState,
    JOIN_PERMIT_FOREVER,
};
pub use security::{KeyTableInit, SecurityEnvelope, SecurityService, KEY_LEN};
pub use store::{DeviceRecord, FrameCounterWindow, NetworkStore, StoredDevice};
pub use types::{ChannelMask, DeviceDescriptor, ExtAddr, NetworkInfo, PanId, ShortAddr, Timestamp, TimeSource};

#[cfg(feature = "std")]
pub use types::SystemTimeSource;
