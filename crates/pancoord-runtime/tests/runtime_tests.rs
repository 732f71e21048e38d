//! End-to-end tests of the coordinator worker against the simulated MAC

use std::time::Duration;

use pancoord_core::mac::{AssocStatus, AsyncFrameType, DataConfirm, MacStatus};
use pancoord_core::{
    CoordinatorConfig, DeviceDescriptor, DeviceRecord, ExtAddr, LifecycleState, NetworkInfo,
    NetworkStore, PanId, ShortAddr, StoredDevice, JOIN_PERMIT_FOREVER,
};
use pancoord_harness::{
    create_mac_event_channel, indications, MacEventSender, MacLog, MemoryNetworkStore,
    RadioEnvironment, SimulatedMac, SoftwareSecurity,
};
use pancoord_runtime::{
    Notification, NotificationReceiver, RuntimeBuilder, RuntimeConfig, RuntimeError,
    RuntimeHandle, StatusUpdate,
};
use tokio::time::timeout;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

const COORDINATOR_EXT: ExtAddr = ExtAddr::new([0x00, 0x12, 0x4B, 0x00, 0x00, 0x00, 0x00, 0x01]);

fn device_ext(last: u8) -> ExtAddr {
    ExtAddr::new([0x00, 0x12, 0x4B, 0x00, 0x00, 0x00, 0x10, last])
}

struct TestRuntime {
    handle: RuntimeHandle,
    notifications: NotificationReceiver,
    mac_events: MacEventSender,
    log: MacLog,
}

async fn spawn_runtime(config: RuntimeConfig, store: MemoryNetworkStore) -> TestRuntime {
    let (mac_events, mac_receiver) = create_mac_event_channel(64);
    let mac = SimulatedMac::new(COORDINATOR_EXT, mac_events.clone(), RadioEnvironment::new())
        .with_seed(1);
    let log = mac.log();

    let (handle, notifications) = RuntimeBuilder::new(config)
        .build_and_start(mac, store, SoftwareSecurity::new(), mac_receiver)
        .await
        .expect("runtime should start");

    TestRuntime {
        handle,
        notifications,
        mac_events,
        log,
    }
}

/// Wait for the first notification matching `predicate`
async fn wait_for<F>(notifications: &mut NotificationReceiver, predicate: F) -> Notification
where
    F: Fn(&Notification) -> bool,
{
    timeout(Duration::from_secs(30), async {
        loop {
            let notification = notifications
                .recv()
                .await
                .expect("notification channel should stay open");
            if predicate(&notification) {
                return notification;
            }
        }
    })
    .await
    .expect("notification should arrive")
}

async fn started_runtime(config: CoordinatorConfig) -> TestRuntime {
    let mut runtime = spawn_runtime(
        RuntimeConfig::testing().with_coordinator(config),
        MemoryNetworkStore::new(),
    )
    .await;
    runtime.handle.start_network().await.unwrap();
    wait_for(&mut runtime.notifications, |n| {
        matches!(n, Notification::NetworkStarted(_))
    })
    .await;
    runtime
}

// ----------------------------------------------------------------------------
// Formation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn test_beacon_network_forms_through_scans() {
    let mut runtime = started_runtime(CoordinatorConfig::testing()).await;

    let info = runtime.handle.info().await.unwrap();
    assert_eq!(info.lifecycle, LifecycleState::Started);
    assert_eq!(info.channel, 0);
    assert_eq!(runtime.log.scans().len(), 2);
    assert_eq!(runtime.log.starts().len(), 1);

    runtime.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_second_start_is_rejected() {
    let mut runtime = started_runtime(CoordinatorConfig::testing()).await;

    let err = runtime.handle.start_network().await.unwrap_err();
    assert!(matches!(err, RuntimeError::Coordinator(_)));

    runtime.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_restore_on_start_uses_stored_network() {
    let pan_id = PanId::new(0x4321);
    let mut store = MemoryNetworkStore::new();
    store
        .save_network_info(&NetworkInfo {
            device: DeviceDescriptor::new(pan_id, ShortAddr::new(0xAABB), COORDINATOR_EXT),
            channel: 0,
            frequency_hopping: false,
        })
        .unwrap();
    let stored = StoredDevice {
        slot: 0,
        record: DeviceRecord {
            device: DeviceDescriptor::new(pan_id, ShortAddr::new(7), device_ext(1)),
            capability: pancoord_core::mac::CapabilityInfo::from_byte(indications::MAINS_POWERED),
            rx_frame_counter: 0,
        },
    };
    store.save_device(stored.slot, stored.record).unwrap();

    let mut runtime = spawn_runtime(RuntimeConfig::testing(), store).await;
    wait_for(&mut runtime.notifications, |n| {
        matches!(n, Notification::NetworkStarted(_))
    })
    .await;

    let info = runtime.handle.info().await.unwrap();
    assert_eq!(info.lifecycle, LifecycleState::Restored);
    assert_eq!(info.pan_id, pan_id);
    assert!(runtime.log.scans().is_empty());
    assert!(runtime
        .handle
        .device(ShortAddr::new(7))
        .await
        .unwrap()
        .is_some());

    runtime.handle.shutdown().await.unwrap();
}

// ----------------------------------------------------------------------------
// Join Control
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_join_permit_closes_after_duration() {
    let mut runtime = started_runtime(CoordinatorConfig::testing()).await;

    runtime.handle.set_join_permit(1000).await.unwrap();
    wait_for(&mut runtime.notifications, |n| {
        *n == Notification::StateChanged(LifecycleState::JoiningAllowed)
    })
    .await;

    wait_for(&mut runtime.notifications, |n| {
        *n == Notification::StateChanged(LifecycleState::JoiningNotAllowed)
    })
    .await;
    let info = runtime.handle.info().await.unwrap();
    assert_eq!(info.lifecycle, LifecycleState::JoiningNotAllowed);

    runtime.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_device_joins_and_leaves() {
    let mut runtime = started_runtime(CoordinatorConfig::testing()).await;
    runtime.handle.set_join_permit(JOIN_PERMIT_FOREVER).await.unwrap();

    runtime
        .mac_events
        .send(indications::associate_request(
            device_ext(1),
            indications::MAINS_POWERED,
        ))
        .await
        .unwrap();
    let joining = wait_for(&mut runtime.notifications, |n| {
        matches!(n, Notification::DeviceJoining { .. })
    })
    .await;
    let Notification::DeviceJoining { device, status, .. } = joining else {
        unreachable!();
    };
    assert_eq!(status, AssocStatus::Success);
    assert_eq!(device.short_addr, ShortAddr::new(1));

    let device = runtime.handle.device(ShortAddr::new(1)).await.unwrap();
    assert!(device.is_some());
    assert_eq!(runtime.log.associate_responses().len(), 1);

    assert!(runtime
        .handle
        .record_status(ShortAddr::new(1), StatusUpdate::ConfigSent)
        .await
        .unwrap());
    assert!(!runtime
        .handle
        .record_status(ShortAddr::new(9), StatusUpdate::Poll)
        .await
        .unwrap());

    runtime
        .mac_events
        .send(indications::leave(device_ext(1)))
        .await
        .unwrap();
    let left = wait_for(&mut runtime.notifications, |n| {
        matches!(n, Notification::DeviceLeft(_))
    })
    .await;
    assert_eq!(left, Notification::DeviceLeft(ShortAddr::new(1)));
    assert!(runtime.handle.device(ShortAddr::new(1)).await.unwrap().is_none());

    runtime.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_coordinator_removes_device() {
    let mut runtime = started_runtime(CoordinatorConfig::testing()).await;
    runtime
        .mac_events
        .send(indications::associate_request(
            device_ext(2),
            indications::MAINS_POWERED,
        ))
        .await
        .unwrap();
    wait_for(&mut runtime.notifications, |n| {
        matches!(n, Notification::DeviceJoining { .. })
    })
    .await;

    runtime.handle.disassociate(ShortAddr::new(1), true).await.unwrap();
    let left = wait_for(&mut runtime.notifications, |n| {
        matches!(n, Notification::DeviceLeft(_))
    })
    .await;
    assert_eq!(left, Notification::DeviceLeft(ShortAddr::new(1)));
    assert!(!runtime.handle.remove_device(device_ext(2)).await.unwrap());

    runtime.handle.shutdown().await.unwrap();
}

// ----------------------------------------------------------------------------
// Frequency Hopping
// ----------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_hopping_network_advertises_on_trickle() {
    let mut runtime = started_runtime(CoordinatorConfig::frequency_hopping()).await;

    tokio::time::sleep(Duration::from_millis(2000)).await;
    // Confirms and queries go through the worker, so its timers have run
    let stats = runtime.handle.stats().await.unwrap();
    assert!(stats.pa_sent > 0);
    assert!(stats.pc_sent > 0);

    let frames = runtime.log.async_requests();
    assert!(frames
        .iter()
        .any(|frame| frame.frame_type == AsyncFrameType::Advertisement));
    assert!(frames
        .iter()
        .any(|frame| frame.frame_type == AsyncFrameType::Config));

    runtime.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_data_confirm_is_forwarded() {
    let mut runtime = started_runtime(CoordinatorConfig::testing()).await;

    runtime
        .mac_events
        .send(pancoord_core::MacEvent::DataConfirm(DataConfirm {
            status: MacStatus::Success,
            msdu_handle: 1,
            frame_counter: 30,
        }))
        .await
        .unwrap();
    // A query after the event proves the worker is still serving
    assert!(runtime.handle.info().await.is_ok());

    runtime.handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_settings_rejected_after_start() {
    let mut runtime = started_runtime(CoordinatorConfig::testing()).await;

    assert!(runtime
        .handle
        .set_forming_pan_id(PanId::new(0x2222))
        .await
        .is_err());

    runtime.handle.shutdown().await.unwrap();
    assert!(matches!(
        runtime.handle.info().await,
        Err(RuntimeError::TaskStopped)
    ));
}
