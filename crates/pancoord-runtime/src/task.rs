//! Coordinator worker task
//!
//! One task owns the coordinator. Commands from the application, events from
//! the MAC and timer wake-ups are all serialized through its select loop, so
//! the coordinator is never touched from two places at once.

use std::sync::Arc;

use pancoord_core::mac::MacEvent;
use pancoord_core::{
    AssociatedDevice, ChannelMask, CoordError, Coordinator, CoordinatorInfo, CoordinatorObserver,
    CoordinatorStats, ExtAddr, MacService, NetworkStore, PanId, PendingEvents, SecurityService,
    ShortAddr, KEY_LEN,
};
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, error, info, warn};

use crate::error::RuntimeResult;
use crate::timers::TokioTimerService;

pub type Reply<T> = oneshot::Sender<Result<T, CoordError>>;

pub type CommandSender = mpsc::Sender<Command>;
pub type CommandReceiver = mpsc::Receiver<Command>;
pub type MacEventReceiver = mpsc::Receiver<MacEvent>;

/// Coordinator driven by tokio timers
pub type RuntimeCoordinator<M, S, K, O> = Coordinator<M, S, K, TokioTimerService, O>;

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// Settings that can only change before the network starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Setting {
    FormingPanId(PanId),
    ChannelMask(ChannelMask),
    AsyncChannelMask(ChannelMask),
    DefaultKey([u8; KEY_LEN]),
    FfdShortAddr(ShortAddr),
}

/// Per-device status bookkeeping reported by upper layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusUpdate {
    ConfigSent,
    ConfigConfirm { delivered: bool },
    TrackingSent,
    TrackingConfirm { delivered: bool },
    TrackingResponse,
    Poll,
}

#[derive(Debug)]
pub enum Command {
    StartNetwork {
        reply: Reply<()>,
    },
    RestoreFromStore {
        reply: Reply<bool>,
    },
    SetJoinPermit {
        duration_ms: u32,
        reply: Reply<()>,
    },
    RemoveDevice {
        ext_addr: ExtAddr,
        reply: oneshot::Sender<bool>,
    },
    Disassociate {
        short_addr: ShortAddr,
        rx_on_when_idle: bool,
        reply: Reply<()>,
    },
    Configure {
        setting: Setting,
        reply: Reply<()>,
    },
    RecordStatus {
        short_addr: ShortAddr,
        update: StatusUpdate,
        reply: oneshot::Sender<bool>,
    },
    GetInfo {
        reply: oneshot::Sender<CoordinatorInfo>,
    },
    GetStats {
        reply: oneshot::Sender<CoordinatorStats>,
    },
    GetDevice {
        short_addr: ShortAddr,
        reply: oneshot::Sender<Option<AssociatedDevice>>,
    },
    Shutdown,
}

// ----------------------------------------------------------------------------
// Coordinator Task
// ----------------------------------------------------------------------------

pub struct CoordinatorTask<M, S, K, O> {
    coordinator: RuntimeCoordinator<M, S, K, O>,
    pending: Arc<PendingEvents>,
    wake: Arc<Notify>,
    commands: CommandReceiver,
    mac_events: MacEventReceiver,
    restore_on_start: bool,
    running: bool,
}

impl<M, S, K, O> CoordinatorTask<M, S, K, O>
where
    M: MacService,
    S: NetworkStore,
    K: SecurityService,
    O: CoordinatorObserver,
{
    pub fn new(
        coordinator: RuntimeCoordinator<M, S, K, O>,
        wake: Arc<Notify>,
        commands: CommandReceiver,
        mac_events: MacEventReceiver,
        restore_on_start: bool,
    ) -> Self {
        Self {
            pending: coordinator.pending_events(),
            coordinator,
            wake,
            commands,
            mac_events,
            restore_on_start,
            running: false,
        }
    }

    pub fn coordinator(&self) -> &RuntimeCoordinator<M, S, K, O> {
        &self.coordinator
    }

    /// Load the network key and restore a stored network if configured to
    fn boot(&mut self) -> RuntimeResult<()> {
        let frame_counter = self.coordinator.resume_frame_counter();
        self.coordinator.security_init(frame_counter, None)?;

        if self.restore_on_start && self.coordinator.restore_from_store()? {
            info!("Restored network from store");
        }
        self.drain();
        Ok(())
    }

    pub async fn run(&mut self) -> RuntimeResult<()> {
        info!("Coordinator task starting");
        self.boot()?;
        self.running = true;

        while self.running {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                },
                event = self.mac_events.recv() => match event {
                    Some(event) => self.handle_mac_event(event),
                    None => {
                        warn!("MAC event channel closed, shutting down");
                        break;
                    }
                },
                _ = self.wake.notified() => {}
            }
            self.drain();
        }

        info!("Coordinator task stopped");
        Ok(())
    }

    /// Process until no deferred work is left
    fn drain(&mut self) {
        while self.pending.has_pending() {
            self.coordinator.process();
        }
    }

    fn handle_mac_event(&mut self, event: MacEvent) {
        debug!("MAC event {:?}", event.kind());
        if let MacEvent::DataConfirm(confirm) = &event {
            self.coordinator
                .update_frame_counter(None, confirm.frame_counter);
        }
        self.coordinator.handle_mac_event(&event);
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::StartNetwork { reply } => {
                let _ = reply.send(self.coordinator.start_network());
            }
            Command::RestoreFromStore { reply } => {
                let _ = reply.send(self.coordinator.restore_from_store());
            }
            Command::SetJoinPermit { duration_ms, reply } => {
                let _ = reply.send(self.coordinator.set_join_permit(duration_ms));
            }
            Command::RemoveDevice { ext_addr, reply } => {
                let _ = reply.send(self.coordinator.remove_device(&ext_addr));
            }
            Command::Disassociate {
                short_addr,
                rx_on_when_idle,
                reply,
            } => {
                let result = self
                    .coordinator
                    .send_disassociation_request(short_addr, rx_on_when_idle);
                if let Err(e) = &result {
                    error!("Disassociation of {} failed: {}", short_addr, e);
                }
                let _ = reply.send(result);
            }
            Command::Configure { setting, reply } => {
                let _ = reply.send(self.configure(setting));
            }
            Command::RecordStatus {
                short_addr,
                update,
                reply,
            } => {
                let _ = reply.send(self.record_status(short_addr, update));
            }
            Command::GetInfo { reply } => {
                let _ = reply.send(*self.coordinator.info());
            }
            Command::GetStats { reply } => {
                let _ = reply.send(*self.coordinator.stats());
            }
            Command::GetDevice { short_addr, reply } => {
                let _ = reply.send(self.coordinator.find_device(short_addr).copied());
            }
            Command::Shutdown => {
                info!("Shutdown requested");
                self.running = false;
            }
        }
    }

    fn configure(&mut self, setting: Setting) -> Result<(), CoordError> {
        match setting {
            Setting::FormingPanId(pan_id) => self.coordinator.set_forming_pan_id(pan_id),
            Setting::ChannelMask(mask) => self.coordinator.set_channel_mask(mask),
            Setting::AsyncChannelMask(mask) => self.coordinator.set_async_channel_mask(mask),
            Setting::DefaultKey(key) => self.coordinator.set_default_key(key),
            Setting::FfdShortAddr(short_addr) => self.coordinator.set_ffd_short_addr(short_addr),
        }
    }

    fn record_status(&mut self, short_addr: ShortAddr, update: StatusUpdate) -> bool {
        match update {
            StatusUpdate::ConfigSent => self.coordinator.record_config_sent(short_addr),
            StatusUpdate::ConfigConfirm { delivered } => {
                self.coordinator.record_config_confirm(short_addr, delivered)
            }
            StatusUpdate::TrackingSent => self.coordinator.record_tracking_sent(short_addr),
            StatusUpdate::TrackingConfirm { delivered } => {
                self.coordinator.record_tracking_confirm(short_addr, delivered)
            }
            StatusUpdate::TrackingResponse => self.coordinator.record_tracking_response(short_addr),
            StatusUpdate::Poll => self.coordinator.record_poll(short_addr),
        }
    }
}
