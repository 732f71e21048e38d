//! Coordinator protocol state
//!
//! Pure state containers and decision helpers. None of these call out to a
//! collaborator; the [`crate::Coordinator`] wires them to the MAC, storage and
//! security services.

pub mod assoc_table;
pub mod join;
pub mod pan_list;
pub mod startup;
pub mod trickle;

pub use assoc_table::{AssociatedDevice, AssociationTable, DeviceStatus, InsertError};
pub use join::{JoinPermitAction, JoinPermitWindow, ShortAddrAllocator, JOIN_PERMIT_FOREVER};
pub use pan_list::{PanDescriptorEntry, PanDescriptorList};
pub use startup::{best_channel, LifecycleState, ScanSession, StartupState};
pub use trickle::{jittered_delay, FrameClass, NeighborObservations, TrickleEngine, TrickleTimer};
