mod common;

use std::cell::Cell;
use std::rc::Rc;
use std::thread;

use android_ble_bridge::fake::{FakeAdapter, NativeCall};
use android_ble_bridge::{
    BluetoothBridge, BridgeConfig, CharacteristicInstanceId, CharacteristicProperties,
    DescriptorInstanceId, DiscoveredDevice, GattStatus, NativeBridge, NativeHandle,
    ProfileState, ServiceInstanceId, Uuid,
};
use futures_lite::future::block_on;

use common::*;

#[test]
fn callbacks_wait_for_dispatch() {
    let (mut bridge, native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    bridge.create_adapter(handle(1), Some(fake.clone()));

    fake.broadcast_state(12);
    assert!(native.calls().is_empty());
    assert_eq!(bridge.run_pending(), 1);
    assert_eq!(native.calls().len(), 1);
    assert_eq!(bridge.run_pending(), 0);
}

#[test]
fn callbacks_from_platform_threads_keep_their_order() {
    let (mut bridge, native) = new_bridge();
    let peripheral = Peripheral::new();
    let gatt = connect_and_discover(&mut bridge, &peripheral);
    native.take_calls();

    let measurement = peripheral.measurement.clone();
    let platform = thread::spawn(move || {
        for value in 0..10u8 {
            measurement.set_current_value(&[value]);
            gatt.callback().on_characteristic_changed(&*measurement);
        }
    });
    platform.join().unwrap();
    assert_eq!(bridge.run_pending(), 10);

    let values: Vec<u8> = native
        .take_calls()
        .into_iter()
        .filter_map(|c| match c {
            NativeCall::CharacteristicChanged(_, v) => Some(v[0]),
            _ => None,
        })
        .collect();
    assert_eq!(values, (0..10).collect::<Vec<_>>());
}

#[test]
fn process_next_waits_for_a_callback() {
    let (mut bridge, native) = new_bridge();
    let peripheral = Peripheral::new();
    let gatt = connect(&mut bridge, &peripheral);

    let platform = thread::spawn(move || {
        gatt.callback().on_connection_state_change(0, ProfileState::Connected);
        gatt
    });
    block_on(bridge.process_next());
    let gatt = platform.join().unwrap();

    assert_eq!(gatt.discover_calls(), 1);
    assert!(matches!(
        native.calls().as_slice(),
        [NativeCall::ConnectionStateChange(_, GattStatus::SUCCESS, true)]
    ));
}

#[test]
fn dropping_the_bridge_closes_connections_and_stops_scans() {
    let (mut bridge, _native) = new_bridge();
    let fake = FakeAdapter::new("00:11:22:33:44:55", "phone");
    assert!(bridge.create_adapter(handle(1), Some(fake.clone())).start_scan(&[]));
    let peripheral = Peripheral::new();
    let gatt = connect(&mut bridge, &peripheral);

    drop(bridge);
    assert_eq!(gatt.close_calls(), 1);
    assert_eq!(fake.scanner().unwrap().stop_calls(), 1);

    // posting to a dropped bridge is harmless
    gatt.callback().on_connection_state_change(0, ProfileState::Disconnected);
}

/// Native side that creates no counterparts and counts everything else.
#[derive(Default)]
struct Declining {
    forwarded: Cell<usize>,
}

impl Declining {
    fn forward(&self) {
        self.forwarded.set(self.forwarded.get() + 1);
    }
}

impl NativeBridge for Declining {
    fn on_adapter_state_changed(&self, _: NativeHandle, _: bool) {
        self.forward();
    }

    fn on_scan_failed(&self, _: NativeHandle, _: i32) {
        self.forward();
    }

    fn create_or_update_device_on_scan(&self, _: NativeHandle, _: DiscoveredDevice) {
        self.forward();
    }

    fn on_connection_state_change(&self, _: NativeHandle, _: GattStatus, _: bool) {
        self.forward();
    }

    fn create_gatt_remote_service(
        &self,
        _: NativeHandle,
        _: &ServiceInstanceId,
        _: Uuid,
    ) -> Option<NativeHandle> {
        None
    }

    fn on_gatt_services_discovered(&self, _: NativeHandle) {
        self.forward();
    }

    fn create_gatt_remote_characteristic(
        &self,
        _: NativeHandle,
        _: &CharacteristicInstanceId,
        _: Uuid,
        _: CharacteristicProperties,
    ) -> Option<NativeHandle> {
        None
    }

    fn on_characteristic_changed(&self, _: NativeHandle, _: &[u8]) {
        self.forward();
    }

    fn on_characteristic_read(&self, _: NativeHandle, _: GattStatus, _: &[u8]) {
        self.forward();
    }

    fn on_characteristic_write(&self, _: NativeHandle, _: GattStatus) {
        self.forward();
    }

    fn create_gatt_remote_descriptor(
        &self,
        _: NativeHandle,
        _: &DescriptorInstanceId,
        _: Uuid,
    ) -> Option<NativeHandle> {
        None
    }

    fn on_descriptor_read(&self, _: NativeHandle, _: GattStatus, _: &[u8]) {
        self.forward();
    }

    fn on_descriptor_write(&self, _: NativeHandle, _: GattStatus) {
        self.forward();
    }
}

#[test]
fn objects_without_counterpart_stay_inert() {
    let native = Rc::new(Declining::default());
    let mut bridge = BluetoothBridge::new(native.clone(), BridgeConfig::default());
    let peripheral = Peripheral::new();
    let gatt = connect_and_discover(&mut bridge, &peripheral);
    // connected and services discovered
    assert_eq!(native.forwarded.get(), 2);

    let device = bridge.device(&peripheral.id()).unwrap();
    let service_id = device.service_ids().next().unwrap().clone();
    assert!(device.service(&service_id).unwrap().native_handle().is_none());
    let id = device
        .resolve_characteristic(peripheral.measurement.platform_id())
        .unwrap()
        .clone();
    let characteristic = device.characteristic(&id).unwrap();
    assert!(characteristic.native_handle().is_none());
    assert_eq!(characteristic.descriptor_ids().len(), 2);
    assert!(characteristic.read_remote_characteristic());

    gatt.callback().on_characteristic_read(&*peripheral.measurement, 0);
    gatt.callback().on_descriptor_read(&*peripheral.descriptors[1], 0);
    bridge.run_pending();
    assert_eq!(native.forwarded.get(), 2);
}
