#![allow(dead_code)]

use std::rc::Rc;
use std::sync::Arc;

use android_ble_bridge::fake::{
    FakeCharacteristic, FakeDescriptor, FakeDevice, FakeGatt, FakeService, NativeCall,
    RecordingNative,
};
use android_ble_bridge::{
    BluetoothBridge, BridgeConfig, CharacteristicInstanceId, DeviceId, NativeHandle,
    ProfileState, Uuid,
};

pub const ADDRESS: &str = "C4:7C:8D:6A:3E:01";

pub const HEART_RATE_SERVICE: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
pub const HEART_RATE_MEASUREMENT: Uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);
pub const CLIENT_CONFIG: Uuid = Uuid::from_u128(0x00002902_0000_1000_8000_00805f9b34fb);

/// Read and notify.
pub const READ_NOTIFY: u32 = 0x12;

pub fn handle(raw: u64) -> NativeHandle {
    NativeHandle::new(raw).unwrap()
}

pub fn new_bridge() -> (BluetoothBridge, Rc<RecordingNative>) {
    new_bridge_with(BridgeConfig::default())
}

pub fn new_bridge_with(config: BridgeConfig) -> (BluetoothBridge, Rc<RecordingNative>) {
    let native = Rc::new(RecordingNative::default());
    let bridge = BluetoothBridge::new(native.clone(), config);
    (bridge, native)
}

/// A heart rate monitor exposing two measurement characteristics with the same UUID,
/// the first of which has two descriptors with the same UUID.
pub struct Peripheral {
    pub device: Arc<FakeDevice>,
    pub measurement: Arc<FakeCharacteristic>,
    pub second_measurement: Arc<FakeCharacteristic>,
    pub descriptors: [Arc<FakeDescriptor>; 2],
}

impl Peripheral {
    pub fn new() -> Self {
        let descriptors = [FakeDescriptor::new(CLIENT_CONFIG), FakeDescriptor::new(CLIENT_CONFIG)];
        let measurement =
            FakeCharacteristic::new(HEART_RATE_MEASUREMENT, 2, READ_NOTIFY, descriptors.to_vec());
        let second_measurement =
            FakeCharacteristic::new(HEART_RATE_MEASUREMENT, 5, READ_NOTIFY, Vec::new());
        let service = FakeService::new(
            HEART_RATE_SERVICE,
            1,
            vec![measurement.clone(), second_measurement.clone()],
        );
        Self {
            device: FakeDevice::new(ADDRESS, Some("HRM"), vec![service]),
            measurement,
            second_measurement,
            descriptors,
        }
    }

    pub fn id(&self) -> DeviceId {
        DeviceId::new(ADDRESS)
    }

    pub fn gatt(&self) -> Arc<FakeGatt> {
        self.device.last_connection().unwrap()
    }
}

/// Creates the device bridge with native handle 1 and starts a connection.
pub fn connect(bridge: &mut BluetoothBridge, peripheral: &Peripheral) -> Arc<FakeGatt> {
    let device = bridge.create_device(handle(1), peripheral.device.clone());
    assert!(device.create_connection());
    peripheral.gatt()
}

/// Connects, discovers services and creates every characteristic and descriptor bridge.
pub fn connect_and_discover(bridge: &mut BluetoothBridge, peripheral: &Peripheral) -> Arc<FakeGatt> {
    let gatt = connect(bridge, peripheral);
    gatt.callback().on_connection_state_change(0, ProfileState::Connected);
    gatt.callback().on_services_discovered(0);
    bridge.run_pending();

    let device = bridge.device(&peripheral.id()).unwrap();
    let service_ids: Vec<_> = device.service_ids().cloned().collect();
    for service_id in service_ids {
        let mut service = device.service(&service_id).unwrap();
        service.create_characteristics();
        let characteristic_ids = service.characteristic_ids().to_vec();
        for characteristic_id in characteristic_ids {
            device
                .characteristic(&characteristic_id)
                .unwrap()
                .create_descriptors();
        }
    }
    gatt
}

pub fn measurement_id(bridge: &mut BluetoothBridge, peripheral: &Peripheral) -> CharacteristicInstanceId {
    let device = bridge.device(&peripheral.id()).unwrap();
    device
        .resolve_characteristic(peripheral.measurement.platform_id())
        .unwrap()
        .clone()
}

pub fn count(calls: &[NativeCall], pred: impl Fn(&NativeCall) -> bool) -> usize {
    calls.iter().filter(|c| pred(c)).count()
}
