//! Runtime Builder API
//!
//! Assembles a coordinator from its collaborators, spawns the worker task and
//! hands back a [`RuntimeHandle`] for commands and notifications.

use std::sync::Arc;

use pancoord_core::{
    AssociatedDevice, ChannelMask, Coordinator, CoordinatorInfo, CoordinatorObserver,
    CoordinatorStats, ExtAddr, MacCallbacks, MacService, NetworkStore, PanId, PendingEvents,
    SecurityService, Services, ShortAddr, KEY_LEN,
};
use tokio::sync::{mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{init_logging, RuntimeConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::observer::{ChannelObserver, NotificationReceiver};
use crate::task::{
    Command, CommandSender, CoordinatorTask, MacEventReceiver, Reply, Setting, StatusUpdate,
};
use crate::timers::TokioTimerService;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a coordinator worker
pub struct RuntimeBuilder {
    config: RuntimeConfig,
    callbacks: MacCallbacks,
    enable_logging: bool,
}

impl RuntimeBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            callbacks: MacCallbacks::new(),
            enable_logging: false,
        }
    }

    /// Application handlers for MAC events
    pub fn with_callbacks(mut self, callbacks: MacCallbacks) -> Self {
        self.callbacks = callbacks;
        self
    }

    /// Install a console subscriber at the configured level on start
    pub fn with_console_logging(mut self) -> Self {
        self.enable_logging = true;
        self
    }

    /// Spawn a worker whose notifications arrive on the returned receiver
    ///
    /// Every joining device is admitted unless `observer` is customised through
    /// [`RuntimeBuilder::build_with_observer`].
    pub async fn build_and_start<M, S, K>(
        self,
        mac: M,
        store: S,
        security: K,
        mac_events: MacEventReceiver,
    ) -> RuntimeResult<(RuntimeHandle, NotificationReceiver)>
    where
        M: MacService + Send + 'static,
        S: NetworkStore + Send + 'static,
        K: SecurityService + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel(self.config.notification_buffer_size);
        let handle = self
            .build_with_observer(mac, store, security, ChannelObserver::new(sender), mac_events)
            .await?;
        Ok((handle, receiver))
    }

    /// Spawn a worker with a caller-supplied observer
    pub async fn build_with_observer<M, S, K, O>(
        self,
        mac: M,
        store: S,
        security: K,
        observer: O,
        mac_events: MacEventReceiver,
    ) -> RuntimeResult<RuntimeHandle>
    where
        M: MacService + Send + 'static,
        S: NetworkStore + Send + 'static,
        K: SecurityService + Send + 'static,
        O: CoordinatorObserver + Send + 'static,
    {
        if self.enable_logging {
            init_logging(self.config.log_level);
        }
        self.config.validate()?;

        let pending = Arc::new(PendingEvents::new());
        let wake = Arc::new(Notify::new());
        let services = Services {
            mac,
            store,
            security,
            timers: TokioTimerService::new(Arc::clone(&pending), Arc::clone(&wake)),
            observer,
        };
        let coordinator = Coordinator::new(
            self.config.coordinator.clone(),
            services,
            self.callbacks,
            pending,
        )?;

        let (command_sender, command_receiver) = mpsc::channel(self.config.command_buffer_size);
        let mut task = CoordinatorTask::new(
            coordinator,
            wake,
            command_receiver,
            mac_events,
            self.config.restore_on_start,
        );
        let task_handle = tokio::spawn(async move { task.run().await });

        info!("Coordinator runtime started");
        Ok(RuntimeHandle {
            command_sender,
            task_handle: Some(task_handle),
        })
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running coordinator worker
pub struct RuntimeHandle {
    command_sender: CommandSender,
    task_handle: Option<JoinHandle<RuntimeResult<()>>>,
}

impl RuntimeHandle {
    pub fn command_sender(&self) -> CommandSender {
        self.command_sender.clone()
    }

    async fn send(&self, command: Command) -> RuntimeResult<()> {
        self.command_sender
            .send(command)
            .await
            .map_err(|_| RuntimeError::TaskStopped)
    }

    async fn request<T, F>(&self, build: F) -> RuntimeResult<T>
    where
        F: FnOnce(oneshot::Sender<T>) -> Command,
    {
        let (reply, response) = oneshot::channel();
        self.send(build(reply)).await?;
        response.await.map_err(|_| RuntimeError::TaskStopped)
    }

    async fn call<T, F>(&self, build: F) -> RuntimeResult<T>
    where
        F: FnOnce(Reply<T>) -> Command,
    {
        Ok(self.request(build).await??)
    }

    pub async fn start_network(&self) -> RuntimeResult<()> {
        self.call(|reply| Command::StartNetwork { reply }).await
    }

    /// Restore from the store; false when nothing was stored
    pub async fn restore_from_store(&self) -> RuntimeResult<bool> {
        self.call(|reply| Command::RestoreFromStore { reply }).await
    }

    pub async fn set_join_permit(&self, duration_ms: u32) -> RuntimeResult<()> {
        self.call(|reply| Command::SetJoinPermit { duration_ms, reply })
            .await
    }

    pub async fn remove_device(&self, ext_addr: ExtAddr) -> RuntimeResult<bool> {
        self.request(|reply| Command::RemoveDevice { ext_addr, reply })
            .await
    }

    pub async fn disassociate(&self, short_addr: ShortAddr, rx_on_when_idle: bool) -> RuntimeResult<()> {
        self.call(|reply| Command::Disassociate {
            short_addr,
            rx_on_when_idle,
            reply,
        })
        .await
    }

    async fn configure(&self, setting: Setting) -> RuntimeResult<()> {
        self.call(|reply| Command::Configure { setting, reply }).await
    }

    pub async fn set_forming_pan_id(&self, pan_id: PanId) -> RuntimeResult<()> {
        self.configure(Setting::FormingPanId(pan_id)).await
    }

    pub async fn set_channel_mask(&self, mask: ChannelMask) -> RuntimeResult<()> {
        self.configure(Setting::ChannelMask(mask)).await
    }

    pub async fn set_async_channel_mask(&self, mask: ChannelMask) -> RuntimeResult<()> {
        self.configure(Setting::AsyncChannelMask(mask)).await
    }

    pub async fn set_default_key(&self, key: [u8; KEY_LEN]) -> RuntimeResult<()> {
        self.configure(Setting::DefaultKey(key)).await
    }

    pub async fn set_ffd_short_addr(&self, short_addr: ShortAddr) -> RuntimeResult<()> {
        self.configure(Setting::FfdShortAddr(short_addr)).await
    }

    /// Apply a status update; false when the device is unknown
    pub async fn record_status(&self, short_addr: ShortAddr, update: StatusUpdate) -> RuntimeResult<bool> {
        self.request(|reply| Command::RecordStatus {
            short_addr,
            update,
            reply,
        })
        .await
    }

    pub async fn info(&self) -> RuntimeResult<CoordinatorInfo> {
        self.request(|reply| Command::GetInfo { reply }).await
    }

    pub async fn stats(&self) -> RuntimeResult<CoordinatorStats> {
        self.request(|reply| Command::GetStats { reply }).await
    }

    pub async fn device(&self, short_addr: ShortAddr) -> RuntimeResult<Option<AssociatedDevice>> {
        self.request(|reply| Command::GetDevice { short_addr, reply })
            .await
    }

    /// Stop the worker and wait for it to finish
    pub async fn shutdown(&mut self) -> RuntimeResult<()> {
        // The worker may already be gone; joining still reports how it ended
        let _ = self.send(Command::Shutdown).await;
        match self.task_handle.take() {
            Some(handle) => handle
                .await
                .map_err(|e| RuntimeError::TaskPanicked(e.to_string()))?,
            None => Ok(()),
        }
    }
}
