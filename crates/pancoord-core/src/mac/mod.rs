//! MAC layer boundary
//!
//! The coordinator never touches the radio directly. It issues requests through
//! [`MacService`] and receives confirms and indications as [`MacEvent`]s, which
//! the [`intercept`] layer routes through the core before the application sees
//! them.

pub mod ie;
pub mod intercept;
pub mod pib;
pub mod primitives;

pub use ie::{NeighborSchedule, WisunIes};
pub use intercept::{InterceptSet, MacCallbacks, MacHandler};
pub use pib::{FhAttribute, PibAttribute, PibId, GTK_HASH_LEN, NET_NAME_MAX_LEN};
pub use primitives::*;

use crate::errors::MacError;

/// Request side of the MAC layer
///
/// Every request returns as soon as it is queued. The outcome, where there is
/// one, arrives later as a [`MacEvent`] on the worker that owns the coordinator,
/// never from inside the request call itself.
pub trait MacService {
    fn scan_request(&mut self, request: ScanRequest) -> Result<(), MacError>;

    fn start_request(&mut self, request: StartRequest) -> Result<(), MacError>;

    fn associate_response(&mut self, response: AssociateResponse) -> Result<(), MacError>;

    fn disassociate_request(&mut self, request: DisassociateRequest) -> Result<(), MacError>;

    fn orphan_response(&mut self, response: OrphanResponse) -> Result<(), MacError>;

    fn async_request(&mut self, request: AsyncRequest) -> Result<(), MacError>;

    /// Begin hopping once the network has started in frequency-hopping mode
    fn start_frequency_hopping(&mut self) -> Result<(), MacError>;

    fn set_attribute(&mut self, attribute: PibAttribute) -> Result<(), MacError>;

    fn get_attribute(&self, id: PibId) -> Result<PibAttribute, MacError>;

    fn set_fh_attribute(&mut self, attribute: FhAttribute) -> Result<(), MacError>;

    /// One byte from the radio's random source
    fn random_byte(&mut self) -> u8;
}
