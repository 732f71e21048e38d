//! pancoord Runtime
//!
//! Drives a [`pancoord_core::Coordinator`] on tokio:
//! - `CoordinatorTask`: the worker that owns the coordinator and serializes
//!   commands, MAC events and timer expiries
//! - `TokioTimerService`: one-shot timers that post to the coordinator's
//!   pending set and wake the worker
//! - `RuntimeBuilder` / `RuntimeHandle`: spawning and talking to the worker

pub mod builder;
pub mod config;
pub mod error;
pub mod observer;
pub mod task;
pub mod timers;

pub use builder::{RuntimeBuilder, RuntimeHandle};
pub use config::{init_logging, LogLevel, RuntimeConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use observer::{AdmissionPolicy, ChannelObserver, Notification, NotificationReceiver};
pub use task::{Command, CommandSender, CoordinatorTask, MacEventReceiver, Setting, StatusUpdate};
pub use timers::TokioTimerService;
