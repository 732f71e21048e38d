#![doc = "pancoord Harness\n\nSimulated collaborators for driving a coordinator off-target: a MAC that\nanswers requests with queued confirms, an in-memory network store and a\nsoftware key table. Used by the runtime's tests and by integration tests\ndownstream."]

pub mod channels;
pub mod mac;
pub mod security;
pub mod store;

pub use channels::*;
pub use mac::{indications, MacLog, MacRequest, RadioEnvironment, SimulatedMac};
pub use security::SoftwareSecurity;
pub use store::MemoryNetworkStore;
