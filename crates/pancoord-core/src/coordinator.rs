//! PAN coordinator
//!
//! [`Coordinator`] owns the protocol state of one PAN: lifecycle and startup
//! states, the association table, the scan session, both trickle timers and
//! the join-permit window. It is driven from a single worker by two entry
//! points:
//!
//! - [`Coordinator::handle_mac_event`] for every confirm and indication the MAC
//!   delivers. Intercepted kinds run the coordinator's bookkeeping first, then
//!   every kind is forwarded to the application's [`MacCallbacks`].
//! - [`Coordinator::process`] whenever [`PendingEvents`] has flags set, which
//!   happens on timer expiry and on every startup state change.

use alloc::sync::Arc;

use crate::config::CoordinatorConfig;
use crate::errors::{CoordError, Result};
use crate::events::{CoordEvent, PendingEvents, TimerId, TimerService};
use crate::mac::{
    AssocStatus, AssociateIndication, AssociateResponse, AsyncIndication, AsyncOperation,
    AsyncRequest, BeaconNotifyIndication, BeaconType, CapabilityInfo, DataIndication,
    DisassociateConfirm, DisassociateIndication, DisassociateReason, DisassociateRequest,
    FhAttribute, InterceptSet, MacAddress, MacCallbacks, MacEvent, MacService,
    MacStatus, MpmParams, NeighborSchedule, OrphanIndication, OrphanResponse, PibAttribute, PibId,
    ScanConfirm, ScanRequest, ScanType, SecurityParams, StartRequest, WisunIes, GTK_HASH_LEN,
};
use crate::protocol::{
    best_channel, jittered_delay, AssociatedDevice, AssociationTable, DeviceStatus, FrameClass,
    InsertError, JoinPermitAction, JoinPermitWindow, LifecycleState, ScanSession,
    ShortAddrAllocator, StartupState, TrickleEngine,
};
use crate::security::{SecurityEnvelope, SecurityService, KEY_LEN};
use crate::store::{DeviceRecord, FrameCounterWindow, NetworkStore};
use crate::types::{ChannelMask, DeviceDescriptor, ExtAddr, NetworkInfo, PanId, ShortAddr};

#[cfg(feature = "std")]
use tracing::{debug, error, info, warn};

#[cfg(not(feature = "std"))]
use log::{debug, error, info, warn};

/// Minimum link quality of beacons kept by an active scan
const SCAN_LINK_QUALITY: u8 = 1;

/// Keep every beacon regardless of the percent filter
const SCAN_PERCENT_FILTER: u8 = 0xFF;

/// Channel function advertised for both schedules: DH1CF hopping
const FH_CHANNEL_FUNCTION_DH1CF: u8 = 2;

/// RSSI written into a slot that was restored or refreshed without a frame
const PLACEHOLDER_RSSI: i8 = 1;

// PA frame contents
const FH_ROUTING_COST: u8 = 0x00;
const FH_ROUTING_METHOD: u8 = 0x01;
const FH_EAPOL_READY: u8 = 0x01;
const FH_FAN_TPS_VERSION: u8 = 0x01;

// PC frame contents
const FH_PAN_VERSION: u16 = 0x0000;
const FH_GTK_COUNT: u8 = 4;

// ----------------------------------------------------------------------------
// Observer
// ----------------------------------------------------------------------------

/// Application policy and notifications
pub trait CoordinatorObserver {
    /// Decide whether a device may join
    fn device_joining(&mut self, device: &DeviceDescriptor, capability: &CapabilityInfo)
        -> AssocStatus;

    fn state_changed(&mut self, _state: LifecycleState) {}

    /// The network formed or was restored
    fn started(&mut self, _info: &NetworkInfo) {}

    fn device_disassociated(&mut self, _short_addr: ShortAddr) {}
}

/// Observer that admits every device and ignores notifications
#[derive(Debug, Clone, Copy, Default)]
pub struct AdmitAll;

impl CoordinatorObserver for AdmitAll {
    fn device_joining(&mut self, _device: &DeviceDescriptor, _capability: &CapabilityInfo) -> AssocStatus {
        AssocStatus::Success
    }
}

// ----------------------------------------------------------------------------
// Coordinator State
// ----------------------------------------------------------------------------

/// Snapshot of the coordinator's own parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CoordinatorInfo {
    pub channel: u8,
    pub pan_id: PanId,
    pub short_addr: ShortAddr,
    pub lifecycle: LifecycleState,
    pub startup: StartupState,
}

/// Asynchronous-frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CoordinatorStats {
    pub pa_solicits_received: u32,
    pub pc_solicits_received: u32,
    pub pa_sent: u32,
    pub pc_sent: u32,
}

/// Collaborators a coordinator is built from
pub struct Services<M, S, K, T, O> {
    pub mac: M,
    pub store: S,
    pub security: K,
    pub timers: T,
    pub observer: O,
}

/// Coordinator for one PAN
pub struct Coordinator<M, S, K, T, O> {
    config: CoordinatorConfig,
    mac: M,
    store: S,
    security: K,
    timers: T,
    observer: O,
    callbacks: MacCallbacks,
    intercepts: InterceptSet,
    pending: Arc<PendingEvents>,
    info: CoordinatorInfo,
    table: AssociationTable,
    scan: ScanSession,
    trickle: TrickleEngine,
    join_window: JoinPermitWindow,
    allocator: ShortAddrAllocator,
    envelope: SecurityEnvelope,
    frame_counters: FrameCounterWindow,
    /// Outgoing frame counter last written to the store
    saved_frame_counter: u32,
    channel_mask: ChannelMask,
    async_channel_mask: ChannelMask,
    default_key: [u8; KEY_LEN],
    stats: CoordinatorStats,
}

impl<M, S, K, T, O> Coordinator<M, S, K, T, O>
where
    M: MacService,
    S: NetworkStore,
    K: SecurityService,
    T: TimerService,
    O: CoordinatorObserver,
{
    /// Validate `config`, take over the application's callbacks and program
    /// the MAC PIB for coordinator operation
    pub fn new(
        config: CoordinatorConfig,
        services: Services<M, S, K, T, O>,
        callbacks: MacCallbacks,
        pending: Arc<PendingEvents>,
    ) -> Result<Self> {
        config.validate().map_err(CoordError::config_error)?;

        let hopping = config.frequency_hopping.enabled;
        let info = CoordinatorInfo {
            channel: 0,
            pan_id: config.network.pan_id,
            short_addr: config.network.short_addr,
            lifecycle: LifecycleState::InitWaiting,
            startup: StartupState::Initialized,
        };

        let mut coordinator = Self {
            table: AssociationTable::new(config.network.max_devices),
            scan: ScanSession::new(config.network.pan_descriptor_capacity),
            trickle: TrickleEngine::new(
                config.trickle.min_interval_ms,
                config.trickle.max_interval_ms,
                config.trickle.doubling,
            ),
            join_window: JoinPermitWindow::default(),
            allocator: ShortAddrAllocator::new(config.join.first_short_addr),
            envelope: SecurityEnvelope::from_config(&config.security),
            frame_counters: FrameCounterWindow::default(),
            saved_frame_counter: 0,
            channel_mask: config.network.channel_mask,
            async_channel_mask: config.frequency_hopping.async_channel_mask,
            default_key: config.security.default_key,
            stats: CoordinatorStats::default(),
            intercepts: InterceptSet::for_mode(hopping),
            mac: services.mac,
            store: services.store,
            security: services.security,
            timers: services.timers,
            observer: services.observer,
            callbacks,
            pending,
            info,
            config,
        };
        coordinator.init_mac()?;
        Ok(coordinator)
    }

    fn init_mac(&mut self) -> Result<()> {
        self.mac.set_attribute(PibAttribute::RxOnWhenIdle(true))?;
        self.mac
            .set_attribute(PibAttribute::ShortAddress(self.info.short_addr))?;

        if !self.config.frequency_hopping.enabled {
            return Ok(());
        }

        let fh = &self.config.frequency_hopping;
        let excluded = fh.channel_mask.complement();
        let attributes = [
            FhAttribute::UnicastChannelFunction(FH_CHANNEL_FUNCTION_DH1CF),
            FhAttribute::BroadcastChannelFunction(FH_CHANNEL_FUNCTION_DH1CF),
            FhAttribute::UnicastDwellInterval(fh.unicast_dwell_ms),
            FhAttribute::BroadcastDwellInterval(fh.broadcast_dwell_ms),
            // Half the application rate keeps the broadcast queue from filling
            FhAttribute::BroadcastInterval(fh.broadcast_interval_ms >> 1),
            // Non-sleep count must be set before the sleep count
            FhAttribute::NumNonSleepDevices(fh.num_non_sleep_devices),
            FhAttribute::NumSleepDevices(fh.num_sleep_devices),
            FhAttribute::UnicastExcludedChannels(excluded),
            FhAttribute::BroadcastExcludedChannels(excluded),
        ];

        self.mac.set_attribute(PibAttribute::AssociatePermit(true))?;
        for attribute in attributes {
            self.mac.set_fh_attribute(attribute)?;
        }
        debug!("Frequency hopping PIB configured");
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn info(&self) -> &CoordinatorInfo {
        &self.info
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn lifecycle_state(&self) -> LifecycleState {
        self.info.lifecycle
    }

    pub fn startup_state(&self) -> StartupState {
        self.info.startup
    }

    /// Channel the network runs on, or was last chosen for it
    pub fn channel(&self) -> u8 {
        self.info.channel
    }

    pub fn phy_id(&self) -> u8 {
        self.config.network.phy_id
    }

    pub fn stats(&self) -> &CoordinatorStats {
        &self.stats
    }

    pub fn table(&self) -> &AssociationTable {
        &self.table
    }

    pub fn trickle(&self) -> &TrickleEngine {
        &self.trickle
    }

    pub fn join_window(&self) -> &JoinPermitWindow {
        &self.join_window
    }

    /// Next short address a new device would receive
    pub fn next_short_addr(&self) -> ShortAddr {
        self.allocator.peek()
    }

    pub fn pending_events(&self) -> Arc<PendingEvents> {
        Arc::clone(&self.pending)
    }

    pub fn callbacks_mut(&mut self) -> &mut MacCallbacks {
        &mut self.callbacks
    }

    /// Event kinds handled by the coordinator before the application
    pub fn intercepts(&self) -> &InterceptSet {
        &self.intercepts
    }

    pub fn mac(&self) -> &M {
        &self.mac
    }

    pub fn mac_mut(&mut self) -> &mut M {
        &mut self.mac
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn security(&self) -> &K {
        &self.security
    }

    pub fn timers(&self) -> &T {
        &self.timers
    }

    pub fn timers_mut(&mut self) -> &mut T {
        &mut self.timers
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn observer_mut(&mut self) -> &mut O {
        &mut self.observer
    }

    // ------------------------------------------------------------------------
    // Pre-start Settings
    // ------------------------------------------------------------------------

    fn require_init_waiting(&self, operation: &'static str) -> Result<()> {
        if self.info.lifecycle != LifecycleState::InitWaiting {
            return Err(CoordError::invalid_state(
                operation,
                alloc::format!("{}", self.info.lifecycle),
            ));
        }
        Ok(())
    }

    pub fn set_forming_pan_id(&mut self, pan_id: PanId) -> Result<()> {
        self.require_init_waiting("set_forming_pan_id")?;
        self.info.pan_id = pan_id;
        Ok(())
    }

    pub fn forming_pan_id(&self) -> PanId {
        self.info.pan_id
    }

    pub fn set_channel_mask(&mut self, mask: ChannelMask) -> Result<()> {
        self.require_init_waiting("set_channel_mask")?;
        self.channel_mask = mask;
        Ok(())
    }

    pub fn channel_mask(&self) -> ChannelMask {
        self.channel_mask
    }

    pub fn set_async_channel_mask(&mut self, mask: ChannelMask) -> Result<()> {
        self.require_init_waiting("set_async_channel_mask")?;
        self.async_channel_mask = mask;
        Ok(())
    }

    pub fn async_channel_mask(&self) -> ChannelMask {
        self.async_channel_mask
    }

    /// Replace the network key and reload the key table with a zero counter
    pub fn set_default_key(&mut self, key: [u8; KEY_LEN]) -> Result<()> {
        self.require_init_waiting("set_default_key")?;
        self.security_init(0, Some(key))
    }

    pub fn default_key(&self) -> [u8; KEY_LEN] {
        self.default_key
    }

    pub fn set_ffd_short_addr(&mut self, short_addr: ShortAddr) -> Result<()> {
        self.require_init_waiting("set_ffd_short_addr")?;
        self.info.short_addr = short_addr;
        Ok(())
    }

    pub fn ffd_short_addr(&self) -> ShortAddr {
        self.info.short_addr
    }

    // ------------------------------------------------------------------------
    // Security
    // ------------------------------------------------------------------------

    /// Load the network key into the MAC key table and enable MAC security
    ///
    /// `key` replaces the configured key when given. A failed import leaves
    /// security disabled in the MAC and is returned to the caller.
    pub fn security_init(&mut self, frame_counter: u32, key: Option<[u8; KEY_LEN]>) -> Result<()> {
        if let Some(key) = key {
            self.default_key = key;
        }
        if !self.envelope.is_enabled() {
            return Ok(());
        }

        let init = self.envelope.key_table_init(self.default_key, frame_counter);
        if let Err(err) = self.security.init_key_table(&init) {
            error!("Network key import failed: {:?}", err);
            return Err(err.into());
        }
        self.saved_frame_counter = frame_counter;
        self.mac.set_attribute(PibAttribute::SecurityEnabled(true))?;
        info!("MAC security initialized, frame counter {}", frame_counter);
        Ok(())
    }

    /// Outgoing frame counter to resume from after a reboot
    pub fn resume_frame_counter(&self) -> u32 {
        self.store
            .frame_counter()
            .map(|saved| self.frame_counters.resume_from(saved))
            .unwrap_or(0)
    }

    pub fn add_security_device(
        &mut self,
        pan_id: PanId,
        short_addr: ShortAddr,
        ext_addr: &ExtAddr,
        frame_counter: u32,
    ) -> Result<()> {
        if !self.envelope.is_enabled() {
            return Ok(());
        }
        self.security
            .add_device(pan_id, short_addr, ext_addr, frame_counter)?;
        Ok(())
    }

    /// Security fields for an outgoing frame
    pub fn security_fill(&self) -> SecurityParams {
        self.envelope.fill()
    }

    /// Whether an incoming frame used the expected security level
    pub fn security_check(&self, params: &SecurityParams) -> bool {
        self.envelope.check(params)
    }

    /// Persist a frame counter once it has moved a full save window
    ///
    /// `None` is the coordinator's own outgoing counter; otherwise the counter
    /// last received from that device.
    pub fn update_frame_counter(&mut self, source: Option<&MacAddress>, counter: u32) {
        let Some(source) = source else {
            if self.frame_counters.should_save(self.saved_frame_counter, counter) {
                match self.store.save_frame_counter(counter) {
                    Ok(()) => self.saved_frame_counter = counter,
                    Err(err) => warn!("Failed to save frame counter {}: {:?}", counter, err),
                }
            }
            return;
        };

        let ext_addr = match source {
            MacAddress::Extended(ext_addr) => Some(*ext_addr),
            MacAddress::Short(short_addr) => self.store.device_ext_addr(*short_addr),
        };
        let Some(mut record) = ext_addr.and_then(|ext_addr| self.store.device(&ext_addr)) else {
            return;
        };
        if self.frame_counters.should_save(record.rx_frame_counter, counter) {
            record.rx_frame_counter = counter;
            if let Err(err) = self.store.update_device(record) {
                warn!(
                    "Failed to save frame counter of {}: {:?}",
                    record.device.short_addr, err
                );
            }
        }
    }

    // ------------------------------------------------------------------------
    // Event Processing
    // ------------------------------------------------------------------------

    /// Drain pending events in their fixed order
    ///
    /// Events posted while the batch runs are left for the next call.
    pub fn process(&mut self) {
        let events = self.pending.take();
        for event in events.iter() {
            match event {
                CoordEvent::TricklePa => self.trickle_expired(FrameClass::Advertisement),
                CoordEvent::TricklePc => self.trickle_expired(FrameClass::Configuration),
                CoordEvent::StateChange => self.process_state(self.info.startup),
                CoordEvent::JoinPermitExpired => self.join_permit_expired(),
            }
        }
    }

    /// Run intercepted bookkeeping, then forward to the application
    pub fn handle_mac_event(&mut self, event: &MacEvent) {
        let kind = event.kind();
        let forward = if self.intercepts.contains(kind) {
            self.intercept(event)
        } else {
            true
        };

        if forward {
            self.callbacks.forward(event);
        } else {
            debug!("Dropped {:?} without forwarding", kind);
        }
    }

    /// Returns false when the event must not reach the application
    fn intercept(&mut self, event: &MacEvent) -> bool {
        match event {
            MacEvent::ScanConfirm(confirm) => self.on_scan_confirm(confirm),
            MacEvent::StartConfirm { status } => self.on_start_confirm(*status),
            MacEvent::AssociateIndication(indication) => self.on_associate_indication(indication),
            MacEvent::DisassociateIndication(indication) => {
                self.on_disassociate_indication(indication)
            }
            MacEvent::DisassociateConfirm(confirm) => self.on_disassociate_confirm(confirm),
            MacEvent::DataIndication(indication) => self.on_data_indication(indication),
            MacEvent::OrphanIndication(indication) => self.on_orphan_indication(indication),
            MacEvent::BeaconNotify(indication) => self.on_beacon_notify(indication),
            MacEvent::AsyncIndication(indication) => return self.on_async_indication(indication),
            MacEvent::CommStatusIndication(_)
            | MacEvent::DataConfirm(_)
            | MacEvent::PollIndication(_) => {}
        }
        true
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    fn update_lifecycle(&mut self, next: LifecycleState) {
        let current = self.info.lifecycle;
        if !current.can_transition_to(next) {
            warn!("Ignoring lifecycle transition {} -> {}", current, next);
            return;
        }
        self.info.lifecycle = next;
        info!("Coordinator state {} -> {}", current, next);
        self.observer.state_changed(next);
    }

    fn switch_state(&mut self, next: StartupState) {
        debug!("Startup state {} -> {}", self.info.startup, next);
        self.info.startup = next;
        self.pending.post(CoordEvent::StateChange);
    }

    /// Form a new network
    ///
    /// Without hopping this scans for the quietest channel and a free PAN ID;
    /// with hopping it starts straight away on the first channel of the mask.
    pub fn start_network(&mut self) -> Result<()> {
        self.require_init_waiting("start_network")?;
        self.update_lifecycle(LifecycleState::StartingCoordinator);

        if self.config.frequency_hopping.enabled {
            self.info.channel = self.channel_mask.first().unwrap_or(0);
            self.switch_state(StartupState::ScanEnergyDetectConfirmed);
        } else {
            self.switch_state(StartupState::ScanEnergyDetect);
        }
        Ok(())
    }

    /// Restart a network formed before a reboot
    ///
    /// Devices come from `devices` when given, otherwise the first
    /// `device_count` records of the store are paged in and registered with
    /// security. Either way allocation continues above the highest restored
    /// short address.
    pub fn restore_network(
        &mut self,
        network: &NetworkInfo,
        device_count: usize,
        devices: Option<&[DeviceRecord]>,
    ) -> Result<()> {
        self.require_init_waiting("restore_network")?;
        self.update_lifecycle(LifecycleState::InitRestoringCoordinator);

        self.info.pan_id = network.device.pan_id;
        if network.frequency_hopping {
            self.mac
                .set_attribute(PibAttribute::ExtendedAddress(network.device.ext_addr))?;
        } else {
            self.info.channel = network.channel;
        }
        self.info.short_addr = network.device.short_addr;
        self.mac
            .set_attribute(PibAttribute::ShortAddress(network.device.short_addr))?;

        self.send_start_request(network.frequency_hopping);

        match devices {
            Some(records) => {
                for record in records.iter().take(device_count) {
                    let device = restored_device(record);
                    if let Err(err) = self.table.insert(device) {
                        warn!("Could not restore {}: {:?}", record.device.short_addr, err);
                    }
                    self.allocator.reserve_above(record.device.short_addr);
                }
            }
            None => {
                for index in 0..device_count {
                    let Some(stored) = self.store.device_at(index) else {
                        warn!("Stored device {} missing during restore", index);
                        continue;
                    };
                    let record = stored.record;
                    let descriptor = record.device;
                    if let Err(err) = self.add_security_device(
                        descriptor.pan_id,
                        descriptor.short_addr,
                        &descriptor.ext_addr,
                        record.rx_frame_counter,
                    ) {
                        warn!("Failed to register {} with security: {:?}", descriptor.ext_addr, err);
                    }
                    match self.table.insert_at(stored.slot, restored_device(&record)) {
                        Ok(()) => {}
                        Err(InsertError::SlotUnavailable { slot }) => {
                            warn!("Restore slot {} already in use, skipping {}", slot, descriptor.short_addr);
                        }
                        Err(err) => {
                            warn!("Could not restore {}: {:?}", descriptor.short_addr, err);
                        }
                    }
                    self.allocator.reserve_above(descriptor.short_addr);
                }
            }
        }

        info!(
            "Restoring PAN {} with {} devices, next short address {}",
            self.info.pan_id,
            self.table.len(),
            self.allocator.peek()
        );
        Ok(())
    }

    /// Restore from the store when it holds a previous network
    ///
    /// Returns false when there is nothing to restore.
    pub fn restore_from_store(&mut self) -> Result<bool> {
        let Some(network) = self.store.network_info() else {
            return Ok(false);
        };
        let count = self.store.device_count();
        self.restore_network(&network, count, None)?;
        Ok(true)
    }

    fn process_state(&mut self, state: StartupState) {
        let hopping = self.config.frequency_hopping.enabled;
        match state {
            StartupState::ScanEnergyDetect if hopping => {
                // Nothing to scan: a failed start goes straight back to starting
                self.switch_state(StartupState::ScanEnergyDetectConfirmed);
            }
            StartupState::ScanEnergyDetect => {
                self.scan.reset();
                self.send_scan_request(ScanType::EnergyDetect);
            }
            StartupState::ScanActive => {
                if !hopping {
                    self.send_scan_request(ScanType::Active);
                }
            }
            StartupState::ScanActiveConfirmed | StartupState::ScanEnergyDetectConfirmed => {
                if self.info.lifecycle.is_operational() {
                    return;
                }
                if !hopping {
                    self.choose_pan_id(self.info.channel);
                    let short_addr = self.info.short_addr;
                    self.set_pib(PibAttribute::ShortAddress(short_addr));
                }
                self.send_start_request(hopping);
            }
            StartupState::StartConfirmed => self.network_started(),
            StartupState::Initialized => {}
        }
    }

    fn network_started(&mut self) {
        let hopping = self.config.frequency_hopping.enabled;
        self.scan.reset();

        let channel = match self.read_pib(PibId::LogicalChannel) {
            Some(PibAttribute::LogicalChannel(channel)) => channel,
            _ => self.info.channel,
        };
        let pan_id = match self.read_pib(PibId::PanId) {
            Some(PibAttribute::PanId(pan_id)) => pan_id,
            _ => self.info.pan_id,
        };
        let ext_addr = match self.read_pib(PibId::ExtendedAddress) {
            Some(PibAttribute::ExtendedAddress(ext_addr)) => ext_addr,
            _ => ExtAddr::ERASED,
        };
        let short_addr = match self.read_pib(PibId::ShortAddress) {
            Some(PibAttribute::ShortAddress(short_addr)) => short_addr,
            _ => self.info.short_addr,
        };
        self.info.channel = channel;
        self.info.pan_id = pan_id;

        let network = NetworkInfo {
            device: DeviceDescriptor::new(pan_id, short_addr, ext_addr),
            channel,
            frequency_hopping: hopping,
        };

        if hopping {
            if let Err(err) = self.mac.start_frequency_hopping() {
                warn!("Failed to start frequency hopping: {:?}", err);
            }
            let (pa, pc) = self.trickle.start();
            self.arm_trickle(FrameClass::Advertisement, pa);
            self.arm_trickle(FrameClass::Configuration, pc);
        }

        if let Err(err) = self.store.save_network_info(&network) {
            warn!("Failed to persist network info: {:?}", err);
        }
        self.observer.started(&network);

        let next = if self.info.lifecycle == LifecycleState::InitRestoringCoordinator {
            LifecycleState::Restored
        } else {
            LifecycleState::Started
        };
        info!("PAN {} up on channel {}", pan_id, channel);
        self.update_lifecycle(next);
    }

    /// Move the PAN ID off any PAN heard on `channel`
    fn choose_pan_id(&mut self, channel: u8) {
        let requested = self.info.pan_id;
        let (pan_id, clear) = self.scan.pans.first_free_pan_id(
            channel,
            requested,
            self.config.network.max_pan_id_probes,
        );
        if !clear {
            warn!(
                "PAN ID still collides after {} probes, starting on {}",
                self.config.network.max_pan_id_probes, pan_id
            );
        } else if pan_id != requested {
            info!("PAN ID {} in use on channel {}, using {}", requested, channel, pan_id);
        }
        self.info.pan_id = pan_id;
    }

    fn send_scan_request(&mut self, scan_type: ScanType) {
        let request = ScanRequest {
            scan_type,
            channels: self.channel_mask,
            duration: self.config.network.scan_duration,
            channel_page: self.config.network.channel_page,
            phy_id: self.config.network.phy_id,
            max_results: u8::try_from(self.channel_mask.count()).unwrap_or(u8::MAX),
            link_quality: SCAN_LINK_QUALITY,
            percent_filter: SCAN_PERCENT_FILTER,
            sec: SecurityParams::default(),
        };
        debug!("Requesting {:?} scan", scan_type);
        if let Err(err) = self.mac.scan_request(request) {
            warn!("{:?} scan request failed: {:?}", scan_type, err);
        }
    }

    fn send_start_request(&mut self, frequency_hopping: bool) {
        let network = &self.config.network;
        let request = StartRequest {
            pan_id: self.info.pan_id,
            logical_channel: self.info.channel,
            channel_page: network.channel_page,
            phy_id: network.phy_id,
            beacon_order: network.beacon_order,
            superframe_order: network.superframe_order,
            pan_coordinator: true,
            battery_life_ext: false,
            coord_realignment: false,
            mpm: MpmParams::default(),
            start_frequency_hopping: frequency_hopping,
        };
        debug!(
            "Requesting start of PAN {} on channel {}",
            request.pan_id, request.logical_channel
        );
        if let Err(err) = self.mac.start_request(request) {
            warn!("Start request failed: {:?}", err);
        }
    }

    fn on_scan_confirm(&mut self, confirm: &ScanConfirm) {
        if !matches!(confirm.status, MacStatus::Success | MacStatus::NoBeacon) {
            warn!("{:?} scan failed: {:?}", confirm.scan_type, confirm.status);
            self.switch_state(StartupState::ScanEnergyDetect);
            return;
        }

        match confirm.scan_type {
            ScanType::EnergyDetect => {
                self.scan.energy.clone_from(&confirm.energy_detect);
                self.switch_state(StartupState::ScanActive);
            }
            ScanType::Active => {
                for descriptor in &confirm.pan_descriptors {
                    self.scan
                        .pans
                        .record(descriptor.logical_channel, descriptor.coord_pan_id);
                }
                if !self.info.lifecycle.is_operational() {
                    if let Some(channel) = best_channel(&self.channel_mask, &self.scan.energy) {
                        self.info.channel = channel;
                    }
                }
                self.switch_state(StartupState::ScanActiveConfirmed);
            }
            ScanType::Passive | ScanType::Orphan => {}
        }
    }

    fn on_start_confirm(&mut self, status: MacStatus) {
        if status.is_success() {
            self.switch_state(StartupState::StartConfirmed);
        } else {
            warn!("Start failed with {:?}, restarting scan", status);
            self.switch_state(StartupState::ScanEnergyDetect);
        }
    }

    fn on_beacon_notify(&mut self, indication: &BeaconNotifyIndication) {
        if indication.beacon_type == BeaconType::Normal {
            let descriptor = &indication.pan_descriptor;
            self.scan
                .pans
                .record(descriptor.logical_channel, descriptor.coord_pan_id);
        }
    }

    // ------------------------------------------------------------------------
    // Join & Removal
    // ------------------------------------------------------------------------

    /// Open or close the join window
    ///
    /// `0` closes it, [`crate::protocol::JOIN_PERMIT_FOREVER`] opens it with
    /// no expiry, anything else opens it for that many milliseconds.
    pub fn set_join_permit(&mut self, duration_ms: u32) -> Result<()> {
        if !self.info.lifecycle.is_operational() {
            return Err(CoordError::invalid_state(
                "set_join_permit",
                alloc::format!("{}", self.info.lifecycle),
            ));
        }

        let action = JoinPermitAction::from_duration(duration_ms);
        self.mac
            .set_attribute(PibAttribute::AssociatePermit(action.opens()))?;
        self.join_window.apply(action);

        match action {
            JoinPermitAction::Close => {
                self.disarm_timer(TimerId::JoinPermit);
                self.update_lifecycle(LifecycleState::JoiningNotAllowed);
            }
            JoinPermitAction::OpenForever => {
                self.disarm_timer(TimerId::JoinPermit);
                self.update_lifecycle(LifecycleState::JoiningAllowed);
            }
            JoinPermitAction::OpenFor(duration) => {
                self.arm_timer(TimerId::JoinPermit, duration);
                self.update_lifecycle(LifecycleState::JoiningAllowed);
            }
        }
        Ok(())
    }

    fn join_permit_expired(&mut self) {
        self.set_pib(PibAttribute::AssociatePermit(false));
        self.join_window.close();
        info!("Join permit expired");
        self.update_lifecycle(LifecycleState::JoiningNotAllowed);
    }

    fn on_associate_indication(&mut self, indication: &AssociateIndication) {
        let ext_addr = indication.device_address;
        let capability = indication.capability;
        let pan_id = self.info.pan_id;
        let reuse = self.config.join.reuse_known_addresses;

        let known = if reuse {
            self.store.device_short_addr(&ext_addr)
        } else {
            None
        };

        let (short_addr, status) = match known {
            None => {
                // Consumed even when the join is refused
                let short_addr = self.allocator.allocate();
                let device = DeviceDescriptor::new(pan_id, short_addr, ext_addr);
                let mut status = self.observer.device_joining(&device, &capability);
                if self.table.is_full() {
                    status = AssocStatus::PanAtCapacity;
                }
                if status.is_success() {
                    self.admit_device(device, capability);
                }
                (short_addr, status)
            }
            Some(short_addr) => {
                let device = DeviceDescriptor::new(pan_id, short_addr, ext_addr);
                let status = self.observer.device_joining(&device, &capability);
                if status.is_success() && self.table.find_by_short_addr(short_addr).is_none() {
                    if let Err(err) = self.table.insert(AssociatedDevice::new(short_addr, capability)) {
                        warn!("No slot for rejoining {}: {:?}", short_addr, err);
                    }
                }
                (short_addr, status)
            }
        };

        info!("Association from {}: {} -> {:?}", ext_addr, short_addr, status);
        let response = AssociateResponse {
            device_address: ext_addr,
            assoc_short_address: short_addr,
            status,
            sec: SecurityParams::default(),
        };
        if let Err(err) = self.mac.associate_response(response) {
            warn!("Associate response to {} failed: {:?}", ext_addr, err);
        }
    }

    fn admit_device(&mut self, device: DeviceDescriptor, capability: CapabilityInfo) {
        let slot = match self
            .table
            .insert(AssociatedDevice::new(device.short_addr, capability))
        {
            Ok(slot) => slot,
            Err(err) => {
                warn!("Could not add {} to the table: {:?}", device.short_addr, err);
                return;
            }
        };

        if let Err(err) =
            self.add_security_device(device.pan_id, device.short_addr, &device.ext_addr, 0)
        {
            warn!("Failed to register {} with security: {:?}", device.ext_addr, err);
        }

        let record = DeviceRecord {
            device,
            capability,
            rx_frame_counter: 0,
        };
        if let Err(err) = self.store.save_device(slot, record) {
            warn!("Failed to persist {}: {:?}", device.ext_addr, err);
        }
    }

    /// Forget a device everywhere; unknown devices are ignored
    ///
    /// Returns whether a table slot was cleared.
    pub fn remove_device(&mut self, ext_addr: &ExtAddr) -> bool {
        let Some(short_addr) = self.store.device_short_addr(ext_addr) else {
            debug!("Remove of unknown device {}", ext_addr);
            return false;
        };
        let Some((slot, _)) = self.table.find_by_short_addr(short_addr) else {
            debug!("Device {} has no table slot", short_addr);
            return false;
        };

        if self.envelope.is_enabled() {
            if let Err(err) = self.security.remove_device(ext_addr) {
                warn!("Failed to drop key material of {}: {:?}", ext_addr, err);
            }
        }
        self.table.clear_slot(slot);
        if let Err(err) = self.store.remove_device(ext_addr) {
            warn!("Failed to remove stored record of {}: {:?}", ext_addr, err);
        }
        info!("Removed device {} ({})", short_addr, ext_addr);
        self.observer.device_disassociated(short_addr);
        true
    }

    /// Ask a device to leave; sleepy devices are reached indirectly
    pub fn send_disassociation_request(&mut self, short_addr: ShortAddr, rx_on_when_idle: bool) -> Result<()> {
        let request = DisassociateRequest {
            device_address: MacAddress::Short(short_addr),
            device_pan_id: self.info.pan_id,
            reason: DisassociateReason::Coordinator,
            tx_indirect: !rx_on_when_idle,
            sec: SecurityParams::default(),
        };
        self.mac.disassociate_request(request)?;
        Ok(())
    }

    fn on_disassociate_indication(&mut self, indication: &DisassociateIndication) {
        if indication.reason == DisassociateReason::Device {
            self.remove_device(&indication.device_address);
        }
    }

    fn on_disassociate_confirm(&mut self, confirm: &DisassociateConfirm) {
        let ext_addr = match confirm.device_address {
            MacAddress::Extended(ext_addr) => Some(ext_addr),
            MacAddress::Short(short_addr) => self.store.device_ext_addr(short_addr),
        };
        match ext_addr {
            Some(ext_addr) => {
                self.remove_device(&ext_addr);
            }
            None => debug!("Disassociate confirm for unknown {:?}", confirm.device_address),
        }
    }

    fn on_data_indication(&mut self, indication: &DataIndication) {
        self.update_frame_counter(Some(&indication.src), indication.frame_counter);
    }

    fn on_orphan_indication(&mut self, indication: &OrphanIndication) {
        let Some(record) = self.store.device(&indication.orphan_address) else {
            debug!("Orphan {} is not ours", indication.orphan_address);
            return;
        };
        let short_addr = record.device.short_addr;
        let response = OrphanResponse {
            orphan_address: record.device.ext_addr,
            short_address: short_addr,
            associated_member: true,
            sec: SecurityParams::default(),
        };
        if let Err(err) = self.mac.orphan_response(response) {
            warn!("Orphan response to {} failed: {:?}", short_addr, err);
        }

        if let Some(device) = self.table.find_by_short_addr_mut(short_addr) {
            device.rssi = PLACEHOLDER_RSSI;
            device.status = DeviceStatus::default();
        }
    }

    // ------------------------------------------------------------------------
    // Device Status
    // ------------------------------------------------------------------------

    pub fn find_device(&self, short_addr: ShortAddr) -> Option<&AssociatedDevice> {
        self.table
            .find_by_short_addr(short_addr)
            .map(|(_, device)| device)
    }

    /// First device whose status bits under `mask` equal `value`
    pub fn find_device_by_status(&self, mask: u16, value: u16) -> Option<&AssociatedDevice> {
        self.table
            .find_by_status(mask, value)
            .map(|(_, device)| device)
    }

    fn update_status<F>(&mut self, short_addr: ShortAddr, update: F) -> bool
    where
        F: FnOnce(&mut DeviceStatus),
    {
        match self.table.find_by_short_addr_mut(short_addr) {
            Some(device) => {
                update(&mut device.status);
                true
            }
            None => false,
        }
    }

    pub fn record_config_sent(&mut self, short_addr: ShortAddr) -> bool {
        self.update_status(short_addr, DeviceStatus::mark_config_sent)
    }

    /// Outcome of a config request to a device
    pub fn record_config_confirm(&mut self, short_addr: ShortAddr, delivered: bool) -> bool {
        self.update_status(short_addr, |status| status.record_config_confirm(delivered))
    }

    pub fn record_tracking_sent(&mut self, short_addr: ShortAddr) -> bool {
        self.update_status(short_addr, DeviceStatus::mark_tracking_sent)
    }

    /// Outcome of a tracking request to a device
    pub fn record_tracking_confirm(&mut self, short_addr: ShortAddr, delivered: bool) -> bool {
        self.update_status(short_addr, |status| status.record_tracking_confirm(delivered))
    }

    pub fn record_tracking_response(&mut self, short_addr: ShortAddr) -> bool {
        self.update_status(short_addr, DeviceStatus::record_tracking_response)
    }

    /// A poll from the device proves it is alive
    pub fn record_poll(&mut self, short_addr: ShortAddr) -> bool {
        self.update_status(short_addr, DeviceStatus::mark_alive)
    }

    // ------------------------------------------------------------------------
    // Trickle Timers
    // ------------------------------------------------------------------------

    /// Disarm `timer` and drop an expiry it already posted
    fn disarm_timer(&mut self, timer: TimerId) {
        self.timers.disarm(timer);
        if self.pending.cancel(timer.event()) {
            debug!("Dropped stale {:?} expiry", timer);
        }
    }

    fn arm_timer(&mut self, timer: TimerId, delay_ms: u32) {
        self.disarm_timer(timer);
        self.timers.arm(timer, delay_ms);
    }

    fn trickle_timer_id(class: FrameClass) -> TimerId {
        match class {
            FrameClass::Advertisement => TimerId::TricklePa,
            FrameClass::Configuration => TimerId::TricklePc,
        }
    }

    /// Arm the class's timer with jitter; zero only disarms
    fn arm_trickle(&mut self, class: FrameClass, interval_ms: u32) {
        let timer = Self::trickle_timer_id(class);
        self.disarm_timer(timer);
        if interval_ms == 0 {
            return;
        }
        let random = u16::from_be_bytes([self.mac.random_byte(), self.mac.random_byte()]);
        let delay = jittered_delay(interval_ms, random);
        debug!("{:?} trickle interval {} ms, firing in {} ms", class, interval_ms, delay);
        self.arm_timer(timer, delay);
    }

    fn trickle_expired(&mut self, class: FrameClass) {
        if !self.config.frequency_hopping.enabled || !self.trickle.timer(class).is_running() {
            return;
        }
        let interval = self.trickle.class_mut(class).timer.expire();
        if interval > 0 {
            self.arm_trickle(class, interval);
        }
        self.send_async_frame(class);
    }

    fn send_async_frame(&mut self, class: FrameClass) {
        if !self.info.lifecycle.is_operational() {
            debug!("Network not started, skipping {:?} frame", class);
            return;
        }

        let channels = self
            .trickle
            .class_mut(class)
            .neighbors
            .take_send_mask(&self.async_channel_mask);

        let sec = match class {
            FrameClass::Advertisement => {
                let pan_size = u16::try_from(self.table.capacity()).unwrap_or(u16::MAX);
                let attributes = [
                    FhAttribute::RoutingCost(FH_ROUTING_COST),
                    FhAttribute::RoutingMethod(FH_ROUTING_METHOD),
                    FhAttribute::EapolReady(FH_EAPOL_READY),
                    FhAttribute::FanTpsVersion(FH_FAN_TPS_VERSION),
                    FhAttribute::NetName(self.config.frequency_hopping.net_name.clone()),
                    FhAttribute::PanSize(pan_size),
                ];
                for attribute in attributes {
                    self.set_fh_pib(attribute);
                }
                self.stats.pa_sent += 1;
                SecurityParams::default()
            }
            FrameClass::Configuration => {
                self.set_fh_pib(FhAttribute::PanVersion(FH_PAN_VERSION));
                for index in 0..FH_GTK_COUNT {
                    let mut hash = [0u8; GTK_HASH_LEN];
                    hash[GTK_HASH_LEN - 1] = index;
                    self.set_fh_pib(FhAttribute::GtkHash { index, hash });
                }
                self.stats.pc_sent += 1;
                self.envelope.fill()
            }
        };

        let request = AsyncRequest {
            operation: AsyncOperation::Start,
            frame_type: class.frame_type(),
            channels,
            sec,
        };
        if let Err(err) = self.mac.async_request(request) {
            warn!("{:?} frame request failed: {:?}", class, err);
        }
    }

    /// Returns false for frames from other networks
    fn on_async_indication(&mut self, indication: &AsyncIndication) -> bool {
        let ies = WisunIes::parse(&indication.payload_ies);
        let ours = ies
            .net_name
            .is_some_and(|name| same_net_name(name, &self.config.frequency_hopping.net_name));
        if !ours {
            debug!("Dropping {:?} from another network", indication.frame_type);
            return false;
        }

        let Some(class) = FrameClass::solicited_by(indication.frame_type) else {
            return true;
        };

        if let Some(schedule) = ies
            .unicast_schedule
            .and_then(NeighborSchedule::from_unicast_schedule)
        {
            self.trickle.class_mut(class).neighbors.observe(schedule);
        }

        match class {
            FrameClass::Advertisement => self.stats.pa_solicits_received += 1,
            FrameClass::Configuration => self.stats.pc_solicits_received += 1,
        }
        if self.trickle.class_mut(class).timer.reset() {
            let min = self.trickle.timer(class).min_ms();
            self.arm_trickle(class, min);
        }
        true
    }

    // ------------------------------------------------------------------------
    // PIB Helpers
    // ------------------------------------------------------------------------

    fn set_pib(&mut self, attribute: PibAttribute) {
        let id = attribute.id();
        if let Err(err) = self.mac.set_attribute(attribute) {
            warn!("Failed to set {:?}: {:?}", id, err);
        }
    }

    fn set_fh_pib(&mut self, attribute: FhAttribute) {
        if let Err(err) = self.mac.set_fh_attribute(attribute) {
            warn!("Failed to set hopping attribute: {:?}", err);
        }
    }

    fn read_pib(&self, id: PibId) -> Option<PibAttribute> {
        match self.mac.get_attribute(id) {
            Ok(attribute) => Some(attribute),
            Err(err) => {
                warn!("Failed to read {:?}: {:?}", id, err);
                None
            }
        }
    }
}

impl<M, S, K, T, O> core::fmt::Debug for Coordinator<M, S, K, T, O> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Coordinator")
            .field("info", &self.info)
            .field("devices", &self.table.len())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

fn restored_device(record: &DeviceRecord) -> AssociatedDevice {
    AssociatedDevice {
        short_addr: record.device.short_addr,
        capability: record.capability,
        rssi: PLACEHOLDER_RSSI,
        status: DeviceStatus::default(),
    }
}

/// Network names compare with trailing zero padding ignored
fn same_net_name(received: &[u8], configured: &[u8]) -> bool {
    fn trim(name: &[u8]) -> &[u8] {
        let end = name.iter().rposition(|byte| *byte != 0).map_or(0, |last| last + 1);
        &name[..end]
    }
    trim(received) == trim(configured)
}
