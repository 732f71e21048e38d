//! Simulated MAC layer
//!
//! [`SimulatedMac`] answers every request the way a cooperative radio would:
//! scans report the configured [`RadioEnvironment`], starts succeed, and each
//! confirm is queued on the MAC event channel instead of being delivered from
//! inside the request. Requests are recorded in a shared [`MacLog`] so tests
//! can inspect them after the MAC has been moved into a coordinator.

use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::HashMap;
use pancoord_core::mac::{
    AssociateResponse, AsyncRequest, CommStatusIndication, DisassociateConfirm,
    DisassociateRequest, FhAttribute, MacAddress, MacStatus, OrphanResponse, PanDescriptor,
    PibAttribute, PibId, ScanConfirm, ScanRequest, ScanType, StartRequest,
};
use pancoord_core::{ChannelMask, ExtAddr, MacError, MacEvent, MacService, PanId, ShortAddr};
use tracing::{debug, warn};

use crate::channels::{ChannelError, MacEventSender, NonBlockingSend};

/// Energy reported for channels the environment does not describe
pub const DEFAULT_ENERGY: u8 = 0x80;

// ----------------------------------------------------------------------------
// Radio Environment
// ----------------------------------------------------------------------------

/// What scans observe: per-channel energy and neighboring PANs
#[derive(Debug, Clone, Default)]
pub struct RadioEnvironment {
    energy: HashMap<u8, u8>,
    neighbors: Vec<PanDescriptor>,
}

impl RadioEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method for the energy measured on a channel
    pub fn with_energy(mut self, channel: u8, level: u8) -> Self {
        self.energy.insert(channel, level);
        self
    }

    /// Builder method for a PAN beaconing on a channel
    pub fn with_neighbor_pan(mut self, channel: u8, pan_id: PanId) -> Self {
        self.neighbors.push(PanDescriptor {
            coord_address: MacAddress::Short(ShortAddr::new(0)),
            coord_pan_id: pan_id,
            logical_channel: channel,
            channel_page: 0,
            link_quality: 0xC0,
        });
        self
    }

    /// Energy readings indexed by channel, up to the highest scanned channel
    fn energy_readings(&self, channels: &ChannelMask) -> Vec<u8> {
        let Some(highest) = channels.iter().last() else {
            return Vec::new();
        };
        (0..=highest)
            .map(|channel| {
                self.energy
                    .get(&channel)
                    .copied()
                    .unwrap_or(DEFAULT_ENERGY)
            })
            .collect()
    }

    fn beacons(&self, channels: &ChannelMask) -> Vec<PanDescriptor> {
        self.neighbors
            .iter()
            .filter(|descriptor| channels.contains(descriptor.logical_channel))
            .copied()
            .collect()
    }
}

// ----------------------------------------------------------------------------
// Request Log
// ----------------------------------------------------------------------------

/// One request issued to the simulated MAC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacRequest {
    Scan(ScanRequest),
    Start(StartRequest),
    AssociateResponse(AssociateResponse),
    Disassociate(DisassociateRequest),
    OrphanResponse(OrphanResponse),
    Async(AsyncRequest),
    StartFrequencyHopping,
}

#[derive(Debug, Default)]
struct LogInner {
    requests: Vec<MacRequest>,
    fh_attributes: Vec<FhAttribute>,
}

/// Shared view of everything the MAC was asked to do
#[derive(Debug, Clone, Default)]
pub struct MacLog {
    inner: Arc<Mutex<LogInner>>,
}

impl MacLog {
    fn lock(&self) -> MutexGuard<'_, LogInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, request: MacRequest) {
        self.lock().requests.push(request);
    }

    pub fn requests(&self) -> Vec<MacRequest> {
        self.lock().requests.clone()
    }

    pub fn scans(&self) -> Vec<ScanRequest> {
        self.filter(|request| match request {
            MacRequest::Scan(scan) => Some(scan.clone()),
            _ => None,
        })
    }

    pub fn starts(&self) -> Vec<StartRequest> {
        self.filter(|request| match request {
            MacRequest::Start(start) => Some(start.clone()),
            _ => None,
        })
    }

    pub fn associate_responses(&self) -> Vec<AssociateResponse> {
        self.filter(|request| match request {
            MacRequest::AssociateResponse(response) => Some(response.clone()),
            _ => None,
        })
    }

    pub fn async_requests(&self) -> Vec<AsyncRequest> {
        self.filter(|request| match request {
            MacRequest::Async(frame) => Some(frame.clone()),
            _ => None,
        })
    }

    pub fn fh_attributes(&self) -> Vec<FhAttribute> {
        self.lock().fh_attributes.clone()
    }

    fn filter<T, F>(&self, select: F) -> Vec<T>
    where
        F: Fn(&MacRequest) -> Option<T>,
    {
        self.lock().requests.iter().filter_map(select).collect()
    }
}

// ----------------------------------------------------------------------------
// Simulated MAC
// ----------------------------------------------------------------------------

/// In-process MAC that confirms every request on the event channel
#[derive(Debug)]
pub struct SimulatedMac {
    ext_addr: ExtAddr,
    events: MacEventSender,
    environment: RadioEnvironment,
    pib: HashMap<PibId, PibAttribute>,
    rng: fastrand::Rng,
    log: MacLog,
}

impl SimulatedMac {
    pub fn new(ext_addr: ExtAddr, events: MacEventSender, environment: RadioEnvironment) -> Self {
        let mut pib = HashMap::new();
        pib.insert(PibId::ExtendedAddress, PibAttribute::ExtendedAddress(ext_addr));
        Self {
            ext_addr,
            events,
            environment,
            pib,
            rng: fastrand::Rng::new(),
            log: MacLog::default(),
        }
    }

    /// Builder method for a reproducible random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = fastrand::Rng::with_seed(seed);
        self
    }

    pub fn log(&self) -> MacLog {
        self.log.clone()
    }

    fn deliver(&self, event: MacEvent) -> Result<(), MacError> {
        debug!("Simulated MAC queued {:?}", event.kind());
        self.events.try_send_non_blocking(event).map_err(|err| match err {
            ChannelError::ChannelFull => MacError::QueueFull,
            ChannelError::ChannelClosed => MacError::Unavailable {
                reason: err.to_string(),
            },
        })
    }

    fn comm_status(&self, dst: ExtAddr, pan_id: PanId) -> MacEvent {
        MacEvent::CommStatusIndication(CommStatusIndication {
            status: MacStatus::Success,
            src: MacAddress::Extended(self.ext_addr),
            dst: MacAddress::Extended(dst),
            pan_id,
        })
    }

    fn pan_id(&self) -> PanId {
        match self.pib.get(&PibId::PanId) {
            Some(PibAttribute::PanId(pan_id)) => *pan_id,
            _ => PanId::BROADCAST,
        }
    }
}

impl MacService for SimulatedMac {
    fn scan_request(&mut self, request: ScanRequest) -> Result<(), MacError> {
        let confirm = match request.scan_type {
            ScanType::EnergyDetect => ScanConfirm {
                status: MacStatus::Success,
                scan_type: ScanType::EnergyDetect,
                energy_detect: self.environment.energy_readings(&request.channels),
                pan_descriptors: Vec::new(),
            },
            scan_type => {
                let mut beacons = self.environment.beacons(&request.channels);
                beacons.truncate(usize::from(request.max_results));
                let status = if beacons.is_empty() {
                    MacStatus::NoBeacon
                } else {
                    MacStatus::Success
                };
                ScanConfirm {
                    status,
                    scan_type,
                    energy_detect: Vec::new(),
                    pan_descriptors: beacons,
                }
            }
        };
        self.log.push(MacRequest::Scan(request));
        self.deliver(MacEvent::ScanConfirm(confirm))
    }

    fn start_request(&mut self, request: StartRequest) -> Result<(), MacError> {
        self.pib
            .insert(PibId::PanId, PibAttribute::PanId(request.pan_id));
        self.pib.insert(
            PibId::LogicalChannel,
            PibAttribute::LogicalChannel(request.logical_channel),
        );
        self.log.push(MacRequest::Start(request));
        self.deliver(MacEvent::StartConfirm {
            status: MacStatus::Success,
        })
    }

    fn associate_response(&mut self, response: AssociateResponse) -> Result<(), MacError> {
        let event = self.comm_status(response.device_address, self.pan_id());
        self.log.push(MacRequest::AssociateResponse(response));
        self.deliver(event)
    }

    fn disassociate_request(&mut self, request: DisassociateRequest) -> Result<(), MacError> {
        let event = MacEvent::DisassociateConfirm(DisassociateConfirm {
            status: MacStatus::Success,
            device_address: request.device_address,
            pan_id: request.device_pan_id,
        });
        self.log.push(MacRequest::Disassociate(request));
        self.deliver(event)
    }

    fn orphan_response(&mut self, response: OrphanResponse) -> Result<(), MacError> {
        let event = self.comm_status(response.orphan_address, self.pan_id());
        self.log.push(MacRequest::OrphanResponse(response));
        self.deliver(event)
    }

    fn async_request(&mut self, request: AsyncRequest) -> Result<(), MacError> {
        debug!(
            "Simulated MAC sending {:?} on {} channels",
            request.frame_type,
            request.channels.count()
        );
        self.log.push(MacRequest::Async(request));
        Ok(())
    }

    fn start_frequency_hopping(&mut self) -> Result<(), MacError> {
        self.log.push(MacRequest::StartFrequencyHopping);
        Ok(())
    }

    fn set_attribute(&mut self, attribute: PibAttribute) -> Result<(), MacError> {
        self.pib.insert(attribute.id(), attribute);
        Ok(())
    }

    fn get_attribute(&self, id: PibId) -> Result<PibAttribute, MacError> {
        self.pib.get(&id).cloned().ok_or_else(|| {
            warn!("Simulated MAC has no value for {:?}", id);
            MacError::UnsupportedAttribute { attribute: "unset" }
        })
    }

    fn set_fh_attribute(&mut self, attribute: FhAttribute) -> Result<(), MacError> {
        self.log.lock().fh_attributes.push(attribute);
        Ok(())
    }

    fn random_byte(&mut self) -> u8 {
        self.rng.u8(..)
    }
}

// ----------------------------------------------------------------------------
// Indication Builders
// ----------------------------------------------------------------------------

/// Frames a simulated neighbor would deliver to the coordinator
pub mod indications {
    use pancoord_core::mac::ie::{
        encode_sub_ie, encode_wisun_group, WISUN_SUB_IE_NET_NAME, WISUN_SUB_IE_US,
    };
    use pancoord_core::mac::{
        AssociateIndication, AsyncFrameType, AsyncIndication, BeaconNotifyIndication, BeaconType,
        CapabilityInfo, DataIndication, DisassociateIndication, DisassociateReason, MacAddress,
        OrphanIndication, PanDescriptor, PollIndication, SecurityParams,
    };
    use pancoord_core::{ExtAddr, MacEvent, PanId, ShortAddr};

    /// Capability of a mains-powered, always-listening device
    pub const MAINS_POWERED: u8 = 0x8e;

    pub fn associate_request(device: ExtAddr, capability: u8) -> MacEvent {
        MacEvent::AssociateIndication(AssociateIndication {
            device_address: device,
            capability: CapabilityInfo::from_byte(capability),
            sec: SecurityParams::default(),
        })
    }

    pub fn leave(device: ExtAddr) -> MacEvent {
        MacEvent::DisassociateIndication(DisassociateIndication {
            device_address: device,
            reason: DisassociateReason::Device,
            sec: SecurityParams::default(),
        })
    }

    pub fn data(src: ShortAddr, pan_id: PanId, frame_counter: u32, msdu: Vec<u8>) -> MacEvent {
        MacEvent::DataIndication(DataIndication {
            src: MacAddress::Short(src),
            dst: MacAddress::Short(ShortAddr::new(0)),
            src_pan_id: pan_id,
            msdu,
            rssi: -50,
            link_quality: 0xC0,
            frame_counter,
            sec: SecurityParams::default(),
        })
    }

    pub fn orphan(device: ExtAddr) -> MacEvent {
        MacEvent::OrphanIndication(OrphanIndication {
            orphan_address: device,
            sec: SecurityParams::default(),
        })
    }

    pub fn poll(src: ShortAddr, pan_id: PanId) -> MacEvent {
        MacEvent::PollIndication(PollIndication {
            src: MacAddress::Short(src),
            pan_id,
            no_response: false,
        })
    }

    pub fn beacon(channel: u8, pan_id: PanId) -> MacEvent {
        MacEvent::BeaconNotify(BeaconNotifyIndication {
            beacon_type: BeaconType::Normal,
            pan_descriptor: PanDescriptor {
                coord_address: MacAddress::Short(ShortAddr::new(0)),
                coord_pan_id: pan_id,
                logical_channel: channel,
                channel_page: 0,
                link_quality: 0xC0,
            },
        })
    }

    /// Unicast schedule of a neighbor listening on one fixed channel
    pub fn fixed_channel_schedule(channel: u16) -> Vec<u8> {
        let mut content = vec![0u8; 8];
        content[6..8].copy_from_slice(&channel.to_le_bytes());
        content
    }

    /// Asynchronous solicitation carrying a network name and optional schedule
    pub fn solicit(
        frame_type: AsyncFrameType,
        src: ExtAddr,
        net_name: &[u8],
        schedule: Option<&[u8]>,
    ) -> MacEvent {
        let mut sub_ies = Vec::new();
        if let Some(schedule) = schedule {
            encode_sub_ie(WISUN_SUB_IE_US, schedule, &mut sub_ies);
        }
        encode_sub_ie(WISUN_SUB_IE_NET_NAME, net_name, &mut sub_ies);
        MacEvent::AsyncIndication(AsyncIndication {
            frame_type,
            src: MacAddress::Extended(src),
            src_pan_id: PanId::BROADCAST,
            rssi: -60,
            payload_ies: encode_wisun_group(&sub_ies),
        })
    }
}
