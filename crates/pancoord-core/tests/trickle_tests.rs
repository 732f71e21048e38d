//! Trickle-driven PA/PC transmission and solicitation handling

use pancoord_core::mac::ie::{encode_sub_ie, encode_wisun_group, WISUN_SUB_IE_NET_NAME, WISUN_SUB_IE_US};
use pancoord_core::mac::{
    AsyncFrameType, AsyncIndication, AsyncOperation, FhAttribute, MacAddress, SecurityParams,
};
use pancoord_core::*;

use test_utils::*;

fn hopping_coordinator() -> TestCoordinator {
    let mut coordinator = create_coordinator(CoordinatorConfig::frequency_hopping());
    start_hopping_network(&mut coordinator);
    coordinator
}

fn fire(coordinator: &mut TestCoordinator, timer: TimerId) {
    assert!(coordinator.timers_mut().fire(timer), "{:?} was not armed", timer);
    coordinator.process();
}

/// Unicast schedule content for a fixed-channel listener
fn fixed_channel_schedule(channel: u16) -> Vec<u8> {
    let mut content = vec![0u8; 8];
    content[6..8].copy_from_slice(&channel.to_le_bytes());
    content
}

fn hopping_schedule() -> Vec<u8> {
    let mut content = vec![0u8; 8];
    content[3] = 2 << 3;
    content
}

fn solicit(frame_type: AsyncFrameType, net_name: &[u8], schedule: Option<Vec<u8>>) -> MacEvent {
    let mut sub_ies = Vec::new();
    if let Some(schedule) = schedule {
        encode_sub_ie(WISUN_SUB_IE_US, &schedule, &mut sub_ies);
    }
    encode_sub_ie(WISUN_SUB_IE_NET_NAME, net_name, &mut sub_ies);
    MacEvent::AsyncIndication(AsyncIndication {
        frame_type,
        src: MacAddress::Extended(ext_addr(0x21)),
        src_pan_id: PanId::BROADCAST,
        rssi: -70,
        payload_ies: encode_wisun_group(&sub_ies),
    })
}

// ----------------------------------------------------------------------------
// Expiry
// ----------------------------------------------------------------------------

#[test]
fn test_pa_expiry_sends_advertisement_and_backs_off() {
    let mut coordinator = hopping_coordinator();
    fire(&mut coordinator, TimerId::TricklePa);

    let request = &coordinator.mac().async_requests[0];
    assert_eq!(request.frame_type, AsyncFrameType::Advertisement);
    assert_eq!(request.operation, AsyncOperation::Start);
    assert_eq!(request.sec, SecurityParams::default());
    assert_eq!(request.channels, coordinator.async_channel_mask());

    let fh = &coordinator.mac().fh_attributes;
    assert!(fh.contains(&FhAttribute::NetName(b"FHTest".to_vec())));
    assert!(fh.contains(&FhAttribute::PanSize(8)));
    assert!(fh.contains(&FhAttribute::RoutingMethod(1)));

    assert_eq!(coordinator.stats().pa_sent, 1);
    assert_eq!(coordinator.trickle().timer(FrameClass::Advertisement).interval_ms(), 200);
    assert_eq!(coordinator.timers().last_delay(TimerId::TricklePa), Some(100));
}

#[test]
fn test_pc_expiry_sends_secured_config() {
    let mut coordinator = hopping_coordinator();
    fire(&mut coordinator, TimerId::TricklePc);

    let request = &coordinator.mac().async_requests[0];
    assert_eq!(request.frame_type, AsyncFrameType::Config);
    assert_eq!(request.sec, coordinator.security_fill());
    assert_ne!(request.sec, SecurityParams::default());

    let hashes: Vec<(u8, [u8; 8])> = coordinator
        .mac()
        .fh_attributes
        .iter()
        .filter_map(|attribute| match attribute {
            FhAttribute::GtkHash { index, hash } => Some((*index, *hash)),
            _ => None,
        })
        .collect();
    assert_eq!(hashes.len(), 4);
    for (index, hash) in hashes {
        assert_eq!(hash[7], index);
        assert!(hash[..7].iter().all(|byte| *byte == 0));
    }
    assert!(coordinator
        .mac()
        .fh_attributes
        .contains(&FhAttribute::PanVersion(0)));
    assert_eq!(coordinator.stats().pc_sent, 1);
}

#[test]
fn test_interval_caps_at_maximum() {
    let mut coordinator = hopping_coordinator();
    for _ in 0..6 {
        fire(&mut coordinator, TimerId::TricklePa);
    }
    assert_eq!(coordinator.trickle().timer(FrameClass::Advertisement).interval_ms(), 800);
    assert_eq!(coordinator.timers().last_delay(TimerId::TricklePa), Some(400));
    assert_eq!(coordinator.stats().pa_sent, 6);
}

#[test]
fn test_no_doubling_stops_after_one_frame() {
    let config = CoordinatorConfig::frequency_hopping().with_trickle(TrickleConfig {
        doubling: false,
        ..TrickleConfig::testing()
    });
    let mut coordinator = create_coordinator(config);
    start_hopping_network(&mut coordinator);

    fire(&mut coordinator, TimerId::TricklePa);
    assert_eq!(coordinator.stats().pa_sent, 1);
    assert!(!coordinator.timers().is_armed(TimerId::TricklePa));
}

#[test]
fn test_beacon_mode_ignores_trickle_events() {
    let mut coordinator = create_coordinator(CoordinatorConfig::testing());
    start_beacon_network(&mut coordinator, 0);
    coordinator.pending_events().post(CoordEvent::TricklePa);
    coordinator.process();
    assert!(coordinator.mac().async_requests.is_empty());
}

// ----------------------------------------------------------------------------
// Solicitations
// ----------------------------------------------------------------------------

#[test]
fn test_solicit_resets_grown_interval() {
    let mut coordinator = hopping_coordinator();
    fire(&mut coordinator, TimerId::TricklePa);
    assert_eq!(coordinator.trickle().timer(FrameClass::Advertisement).interval_ms(), 200);

    coordinator.handle_mac_event(&solicit(AsyncFrameType::AdvertisementSolicit, b"FHTest", None));

    assert_eq!(coordinator.trickle().timer(FrameClass::Advertisement).interval_ms(), 100);
    assert_eq!(coordinator.timers().last_delay(TimerId::TricklePa), Some(50));
    assert_eq!(coordinator.stats().pa_solicits_received, 1);
    assert_eq!(coordinator.stats().pc_solicits_received, 0);
}

#[test]
fn test_solicit_drops_expiry_already_posted() {
    let mut coordinator = hopping_coordinator();
    fire(&mut coordinator, TimerId::TricklePa);
    assert!(coordinator.timers_mut().fire(TimerId::TricklePa));

    coordinator.handle_mac_event(&solicit(AsyncFrameType::AdvertisementSolicit, b"FHTest", None));
    coordinator.process();

    assert_eq!(coordinator.trickle().timer(FrameClass::Advertisement).interval_ms(), 100);
    assert_eq!(coordinator.stats().pa_sent, 1);
    assert!(coordinator.timers().is_armed(TimerId::TricklePa));
}

#[test]
fn test_solicit_at_minimum_keeps_timer() {
    let mut coordinator = hopping_coordinator();
    let armings = coordinator.timers().history.len();

    coordinator.handle_mac_event(&solicit(AsyncFrameType::AdvertisementSolicit, b"FHTest", None));

    assert_eq!(coordinator.timers().history.len(), armings);
    assert_eq!(coordinator.stats().pa_solicits_received, 1);
}

#[test]
fn test_net_name_padding_accepted() {
    let mut coordinator = hopping_coordinator();
    coordinator.handle_mac_event(&solicit(AsyncFrameType::ConfigSolicit, b"FHTest\0\0", None));
    assert_eq!(coordinator.stats().pc_solicits_received, 1);
}

#[test]
fn test_foreign_network_solicit_ignored() {
    let mut coordinator = hopping_coordinator();
    fire(&mut coordinator, TimerId::TricklePa);

    coordinator.handle_mac_event(&solicit(
        AsyncFrameType::AdvertisementSolicit,
        b"OtherNet",
        Some(fixed_channel_schedule(3)),
    ));

    assert_eq!(coordinator.stats().pa_solicits_received, 0);
    assert_eq!(coordinator.trickle().timer(FrameClass::Advertisement).interval_ms(), 200);

    fire(&mut coordinator, TimerId::TricklePa);
    let request = coordinator.mac().async_requests.last().unwrap();
    assert_eq!(request.channels, coordinator.async_channel_mask());
}

#[test]
fn test_fixed_channel_neighbors_narrow_next_frame() {
    let mut coordinator = hopping_coordinator();
    coordinator.handle_mac_event(&solicit(
        AsyncFrameType::AdvertisementSolicit,
        b"FHTest",
        Some(fixed_channel_schedule(3)),
    ));
    coordinator.handle_mac_event(&solicit(
        AsyncFrameType::AdvertisementSolicit,
        b"FHTest",
        Some(fixed_channel_schedule(6)),
    ));

    fire(&mut coordinator, TimerId::TricklePa);
    let request = &coordinator.mac().async_requests[0];
    assert_eq!(request.channels, ChannelMask::from_channels(&[3, 6]));

    // Observations are consumed by the transmission
    fire(&mut coordinator, TimerId::TricklePa);
    let request = &coordinator.mac().async_requests[1];
    assert_eq!(request.channels, coordinator.async_channel_mask());
}

#[test]
fn test_hopping_neighbor_keeps_full_mask() {
    let mut coordinator = hopping_coordinator();
    coordinator.handle_mac_event(&solicit(
        AsyncFrameType::ConfigSolicit,
        b"FHTest",
        Some(fixed_channel_schedule(3)),
    ));
    coordinator.handle_mac_event(&solicit(
        AsyncFrameType::ConfigSolicit,
        b"FHTest",
        Some(hopping_schedule()),
    ));

    fire(&mut coordinator, TimerId::TricklePc);
    let request = &coordinator.mac().async_requests[0];
    assert_eq!(request.channels, coordinator.async_channel_mask());
}

#[test]
fn test_async_frames_wait_for_network() {
    let mut coordinator = create_coordinator(CoordinatorConfig::frequency_hopping());
    coordinator.pending_events().post(CoordEvent::TricklePa);
    coordinator.process();
    assert!(coordinator.mac().async_requests.is_empty());
    assert_eq!(coordinator.stats().pa_sent, 0);
}
