mod common;

use std::collections::BTreeMap;

use android_ble_bridge::error::PlatformError;
use android_ble_bridge::fake::{FakeAdapter, FakeDevice, NativeCall};
use android_ble_bridge::{
    AdapterScanMode, BridgeConfig, ScanFilter, ScanMode, ScanRecord, ScanResult,
};

use common::{count, handle, new_bridge, new_bridge_with, HEART_RATE_SERVICE};

fn scan_result(address: &str, record: Option<ScanRecord>) -> ScanResult {
    ScanResult {
        device: FakeDevice::new(address, None, Vec::new()),
        rssi: -60,
        record,
    }
}

#[test]
fn stop_scan_is_idempotent() {
    let (mut bridge, _native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    let adapter = bridge.create_adapter(handle(1), Some(fake.clone()));

    assert!(adapter.start_scan(&[]));
    assert!(adapter.is_scanning());
    assert!(adapter.stop_scan());
    assert!(!adapter.stop_scan());
    assert!(!adapter.is_scanning());

    let scanner = fake.scanner().unwrap();
    assert_eq!(scanner.stop_calls(), 1);
    assert!(!scanner.is_scanning());
}

#[test]
fn second_start_scan_is_rejected() {
    let (mut bridge, _native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    let adapter = bridge.create_adapter(handle(1), Some(fake.clone()));

    assert!(adapter.start_scan(&[]));
    assert!(!adapter.start_scan(&[]));
    assert_eq!(fake.scanner().unwrap().start_calls(), 1);
    assert!(adapter.is_scanning());
}

#[test]
fn start_scan_preconditions() {
    let (mut bridge, _native) = new_bridge();
    assert!(!bridge.create_adapter(handle(1), None).start_scan(&[]));

    let unauthorized = FakeAdapter::new("00:11:22:33:44:55", "phone");
    unauthorized.set_can_scan(false);
    let adapter = bridge.create_adapter(handle(1), Some(unauthorized.clone()));
    assert!(!adapter.start_scan(&[]));
    assert_eq!(unauthorized.scanner().unwrap().start_calls(), 0);

    let no_scanner = FakeAdapter::new("00:11:22:33:44:55", "phone");
    no_scanner.remove_scanner();
    let adapter = bridge.create_adapter(handle(1), Some(no_scanner));
    assert!(!adapter.start_scan(&[]));
    assert!(!adapter.is_scanning());
}

#[test]
fn rejected_platform_start_leaves_no_session() {
    let (mut bridge, _native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    let scanner = fake.scanner().unwrap();
    scanner.fail_next_start(PlatformError::IllegalArgument("bad filter".into()));
    let adapter = bridge.create_adapter(handle(1), Some(fake));

    assert!(!adapter.start_scan(&[]));
    assert!(!adapter.is_scanning());
    assert!(adapter.start_scan(&[]));
    assert_eq!(scanner.start_calls(), 2);
}

#[test]
fn stop_scan_clears_session_when_platform_fails() {
    let (mut bridge, _native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    let scanner = fake.scanner().unwrap();
    let adapter = bridge.create_adapter(handle(1), Some(fake));

    assert!(adapter.start_scan(&[]));
    scanner.fail_next_stop(PlatformError::IllegalState("adapter is off".into()));
    assert!(adapter.stop_scan());
    assert!(!adapter.is_scanning());
}

#[test]
fn scan_request_carries_filters_and_configured_mode() {
    let (mut bridge, _native) = new_bridge_with(BridgeConfig::default().with_scan_mode(ScanMode::Balanced));
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    let adapter = bridge.create_adapter(handle(1), Some(fake.clone()));

    let filters = [ScanFilter::with_service(HEART_RATE_SERVICE)];
    assert!(adapter.start_scan(&filters));
    let scanner = fake.scanner().unwrap();
    assert_eq!(scanner.last_filters(), filters.to_vec());
    assert_eq!(scanner.last_mode(), Some(ScanMode::Balanced));
}

#[test]
fn scan_result_without_advertisement_forwards_empty_sequences() {
    let (mut bridge, native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    assert!(bridge.create_adapter(handle(7), Some(fake.clone())).start_scan(&[]));

    assert!(fake.scanner().unwrap().deliver(scan_result("AA:00:00:00:00:01", None)));
    assert_eq!(bridge.run_pending(), 1);

    let calls = native.take_calls();
    let [NativeCall::DeviceOnScan(adapter, device)] = calls.as_slice() else {
        panic!("unexpected calls {calls:?}");
    };
    assert_eq!(*adapter, handle(7));
    assert_eq!(device.address.as_str(), "AA:00:00:00:00:01");
    assert_eq!(device.rssi, -60);
    assert!(device.advertised_uuids.is_empty());
    assert!(device.service_data_keys.is_empty());
    assert!(device.service_data_values.is_empty());
    assert!(device.manufacturer_data_keys.is_empty());
    assert!(device.manufacturer_data_values.is_empty());
}

#[test]
fn scan_result_forwards_advertisement() {
    let (mut bridge, native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    assert!(bridge.create_adapter(handle(7), Some(fake.clone())).start_scan(&[]));

    let record = ScanRecord {
        device_name: Some("HRM".into()),
        service_uuids: Some(vec![HEART_RATE_SERVICE]),
        manufacturer_data: Some(BTreeMap::from([(0x0059, vec![1, 2, 3])])),
        tx_power_level: Some(0),
        ..ScanRecord::default()
    };
    fake.scanner()
        .unwrap()
        .deliver(scan_result("AA:00:00:00:00:02", Some(record)));
    bridge.run_pending();

    let calls = native.take_calls();
    let [NativeCall::DeviceOnScan(_, device)] = calls.as_slice() else {
        panic!("unexpected calls {calls:?}");
    };
    assert_eq!(device.advertised_name.as_deref(), Some("HRM"));
    assert_eq!(device.advertised_uuids, vec![HEART_RATE_SERVICE]);
    assert_eq!(device.manufacturer_data_keys, vec![0x0059]);
    assert_eq!(device.manufacturer_data_values, vec![vec![1, 2, 3]]);
    assert_eq!(device.tx_power, Some(0));
    assert!(device.service_data_keys.is_empty());
}

#[test]
fn results_of_a_stopped_session_are_dropped() {
    let (mut bridge, native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    let scanner = fake.scanner().unwrap();
    let adapter = bridge.create_adapter(handle(1), Some(fake));

    assert!(adapter.start_scan(&[]));
    let first_session = scanner.callback().unwrap();
    assert!(adapter.stop_scan());
    assert!(adapter.start_scan(&[]));

    first_session.on_scan_result(1, scan_result("AA:00:00:00:00:01", None));
    first_session.on_scan_failed(2);
    scanner.deliver(scan_result("AA:00:00:00:00:02", None));
    assert_eq!(bridge.run_pending(), 3);

    let calls = native.take_calls();
    assert_eq!(calls.len(), 1, "{calls:?}");
    assert!(matches!(
        &calls[0],
        NativeCall::DeviceOnScan(_, d) if d.address.as_str() == "AA:00:00:00:00:02"
    ));
}

#[test]
fn scan_failure_is_forwarded_as_failure() {
    let (mut bridge, native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    assert!(bridge.create_adapter(handle(3), Some(fake.clone())).start_scan(&[]));

    fake.scanner().unwrap().callback().unwrap().on_scan_failed(2);
    bridge.run_pending();

    let calls = native.take_calls();
    assert!(matches!(calls.as_slice(), [NativeCall::ScanFailed(h, 2)] if *h == handle(3)));
}

#[test]
fn only_on_and_off_states_are_forwarded() {
    let (mut bridge, native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    bridge.create_adapter(handle(1), Some(fake.clone()));

    for state in [13, 10, 11, 12, 42] {
        fake.broadcast_state(state);
    }
    assert_eq!(bridge.run_pending(), 5);

    let calls = native.take_calls();
    assert_eq!(calls.len(), 2, "{calls:?}");
    assert!(matches!(calls[0], NativeCall::AdapterStateChanged(_, false)));
    assert!(matches!(calls[1], NativeCall::AdapterStateChanged(_, true)));
}

#[test]
fn adapter_queries() {
    let (mut bridge, _native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    let adapter = bridge.create_adapter(handle(1), Some(fake.clone()));

    assert!(adapter.is_present());
    assert_eq!(adapter.address(), "00:11:22:33:44:55");
    assert_eq!(adapter.name(), "phone");
    assert!(adapter.is_powered());
    assert!(!adapter.is_discoverable());
    assert!(!adapter.is_discovering());

    fake.set_scan_mode(AdapterScanMode::ConnectableDiscoverable);
    assert!(adapter.is_discoverable());
    fake.set_discovering(true);
    assert!(adapter.is_discovering());
    fake.set_discovering(false);
    assert!(adapter.start_scan(&[]));
    assert!(adapter.is_discovering());

    fake.set_enabled(false);
    assert!(!adapter.is_powered());
    assert!(adapter.set_powered(true));
    assert!(adapter.set_powered(false));
    assert_eq!(fake.power_requests(), vec![true, false]);
}

#[test]
fn absent_adapter_reports_nothing() {
    let (mut bridge, _native) = new_bridge();
    let adapter = bridge.create_adapter(handle(1), None);

    assert!(!adapter.is_present());
    assert_eq!(adapter.address(), "");
    assert_eq!(adapter.name(), "");
    assert!(!adapter.is_powered());
    assert!(!adapter.set_powered(true));
    assert!(!adapter.is_discovering());
    assert!(!adapter.stop_scan());
}

#[test]
fn destroying_adapter_stops_scan_and_silences_callbacks() {
    let (mut bridge, native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    let scanner = fake.scanner().unwrap();
    assert!(bridge.create_adapter(handle(1), Some(fake.clone())).start_scan(&[]));
    let session = scanner.callback().unwrap();
    assert_eq!(fake.receiver_count(), 1);

    bridge.destroy_adapter();
    assert_eq!(scanner.stop_calls(), 1);
    assert_eq!(fake.receiver_count(), 0);
    assert!(bridge.adapter().is_none());

    session.on_scan_result(1, scan_result("AA:00:00:00:00:01", None));
    bridge.run_pending();
    assert_eq!(count(&native.calls(), |_| true), 0);
}

#[test]
fn recreating_adapter_replaces_previous() {
    let (mut bridge, _native) = new_bridge();
    let first = FakeAdapter::new("00:11:22:33:44:55", "phone");
    let second = FakeAdapter::new("00:11:22:33:44:66", "tablet");
    bridge.create_adapter(handle(1), Some(first.clone()));
    bridge.create_adapter(handle(2), Some(second.clone()));

    assert_eq!(first.receiver_count(), 0);
    assert_eq!(second.receiver_count(), 1);
    assert_eq!(bridge.adapter().unwrap().name(), "tablet");
}
