//! Deterministic in-memory platform and native side.
//!
//! The fakes record every request made to them and let the caller fire platform
//! callbacks by hand, from any thread. They never produce callbacks on their own.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_lock::Mutex;
use uuid::Uuid;

use crate::callback::{AdapterStateReceiver, GattCallback, ScanCallback, ScanResult};
use crate::error::{GattStatus, PlatformError};
use crate::native::NativeBridge;
use crate::types::{
    AdapterScanMode, BondState, CharacteristicInstanceId, CharacteristicProperties,
    DescriptorInstanceId, DiscoveredDevice, NativeHandle, PlatformId, ScanFilter, ScanMode,
    ServiceInstanceId, Transport, WriteType,
};
use crate::wrappers::{
    AdapterWrapper, CharacteristicWrapper, DescriptorWrapper, DeviceWrapper, GattWrapper,
    LeScannerWrapper, ServiceWrapper,
};

fn next_platform_id() -> PlatformId {
    static NEXT_ID: AtomicU64 = AtomicU64::new(1);
    PlatformId(NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

struct AdapterState {
    enabled: bool,
    discovering: bool,
    scan_mode: AdapterScanMode,
    can_scan: bool,
    scanner: Option<Arc<FakeLeScanner>>,
    receivers: Vec<Arc<AdapterStateReceiver>>,
    power_requests: Vec<bool>,
}

/// A local adapter with an LE scanner, powered on and allowed to scan.
pub struct FakeAdapter {
    address: String,
    name: String,
    state: Mutex<AdapterState>,
}

impl FakeAdapter {
    pub fn new(address: &str, name: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_owned(),
            name: name.to_owned(),
            state: Mutex::new(AdapterState {
                enabled: true,
                discovering: false,
                scan_mode: AdapterScanMode::Connectable,
                can_scan: true,
                scanner: Some(Arc::new(FakeLeScanner::default())),
                receivers: Vec::new(),
                power_requests: Vec::new(),
            }),
        })
    }

    /// The scanner, if the adapter still has one.
    pub fn scanner(&self) -> Option<Arc<FakeLeScanner>> {
        self.state.lock_blocking().scanner.clone()
    }

    pub fn remove_scanner(&self) {
        self.state.lock_blocking().scanner = None;
    }

    pub fn set_can_scan(&self, can_scan: bool) {
        self.state.lock_blocking().can_scan = can_scan;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.state.lock_blocking().enabled = enabled;
    }

    pub fn set_discovering(&self, discovering: bool) {
        self.state.lock_blocking().discovering = discovering;
    }

    pub fn set_scan_mode(&self, scan_mode: AdapterScanMode) {
        self.state.lock_blocking().scan_mode = scan_mode;
    }

    /// Arguments of every `enable`/`disable` request, in order.
    pub fn power_requests(&self) -> Vec<bool> {
        self.state.lock_blocking().power_requests.clone()
    }

    pub fn receiver_count(&self) -> usize {
        self.state.lock_blocking().receivers.len()
    }

    /// Sends a state-changed broadcast with a raw state value to every registered receiver.
    pub fn broadcast_state(&self, raw_state: i32) {
        let receivers = self.state.lock_blocking().receivers.clone();
        for receiver in receivers {
            receiver.on_receive(raw_state);
        }
    }
}

impl AdapterWrapper for FakeAdapter {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn is_enabled(&self) -> bool {
        self.state.lock_blocking().enabled
    }

    fn enable(&self) -> bool {
        self.state.lock_blocking().power_requests.push(true);
        true
    }

    fn disable(&self) -> bool {
        self.state.lock_blocking().power_requests.push(false);
        true
    }

    fn scan_mode(&self) -> AdapterScanMode {
        self.state.lock_blocking().scan_mode
    }

    fn is_discovering(&self) -> bool {
        self.state.lock_blocking().discovering
    }

    fn le_scanner(&self) -> Option<Arc<dyn LeScannerWrapper>> {
        self.scanner().map(|s| s as Arc<dyn LeScannerWrapper>)
    }

    fn can_scan(&self) -> bool {
        self.state.lock_blocking().can_scan
    }

    fn register_state_receiver(&self, receiver: Arc<AdapterStateReceiver>) {
        self.state.lock_blocking().receivers.push(receiver);
    }

    fn unregister_state_receiver(&self, receiver: &Arc<AdapterStateReceiver>) {
        self.state
            .lock_blocking()
            .receivers
            .retain(|r| !Arc::ptr_eq(r, receiver));
    }
}

#[derive(Default)]
struct ScannerState {
    start_calls: usize,
    stop_calls: usize,
    active: Option<Arc<ScanCallback>>,
    fail_next_start: Option<PlatformError>,
    fail_next_stop: Option<PlatformError>,
    last_filters: Vec<ScanFilter>,
    last_mode: Option<ScanMode>,
}

/// An LE scanner that keeps the callback of the running scan.
#[derive(Default)]
pub struct FakeLeScanner {
    state: Mutex<ScannerState>,
}

impl FakeLeScanner {
    pub fn start_calls(&self) -> usize {
        self.state.lock_blocking().start_calls
    }

    pub fn stop_calls(&self) -> usize {
        self.state.lock_blocking().stop_calls
    }

    pub fn is_scanning(&self) -> bool {
        self.state.lock_blocking().active.is_some()
    }

    pub fn last_filters(&self) -> Vec<ScanFilter> {
        self.state.lock_blocking().last_filters.clone()
    }

    pub fn last_mode(&self) -> Option<ScanMode> {
        self.state.lock_blocking().last_mode
    }

    /// Makes the next `start_scan` fail with `error`.
    pub fn fail_next_start(&self, error: PlatformError) {
        self.state.lock_blocking().fail_next_start = Some(error);
    }

    /// Makes the next `stop_scan` fail with `error`.
    pub fn fail_next_stop(&self, error: PlatformError) {
        self.state.lock_blocking().fail_next_stop = Some(error);
    }

    /// The callback of the running scan.
    pub fn callback(&self) -> Option<Arc<ScanCallback>> {
        self.state.lock_blocking().active.clone()
    }

    /// Delivers a scan result to the running scan; returns `false` if none is running.
    pub fn deliver(&self, result: ScanResult) -> bool {
        match self.callback() {
            Some(callback) => {
                callback.on_scan_result(1, result);
                true
            }
            None => false,
        }
    }
}

impl LeScannerWrapper for FakeLeScanner {
    fn start_scan(
        &self,
        filters: &[ScanFilter],
        mode: ScanMode,
        callback: Arc<ScanCallback>,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock_blocking();
        state.start_calls += 1;
        if let Some(err) = state.fail_next_start.take() {
            return Err(err);
        }
        state.last_filters = filters.to_vec();
        state.last_mode = Some(mode);
        state.active = Some(callback);
        Ok(())
    }

    fn stop_scan(&self, callback: &Arc<ScanCallback>) -> Result<(), PlatformError> {
        let mut state = self.state.lock_blocking();
        state.stop_calls += 1;
        if state.active.as_ref().is_some_and(|c| Arc::ptr_eq(c, callback)) {
            state.active = None;
        }
        match state.fail_next_stop.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// A remote device exposing the given services once connected.
pub struct FakeDevice {
    address: String,
    name: Option<String>,
    services: Vec<Arc<FakeService>>,
    state: Mutex<DeviceState>,
}

struct DeviceState {
    bond_state: BondState,
    refuse_connections: bool,
    connections: Vec<Arc<FakeGatt>>,
    last_request: Option<(bool, Transport)>,
}

impl FakeDevice {
    pub fn new(address: &str, name: Option<&str>, services: Vec<Arc<FakeService>>) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_owned(),
            name: name.map(str::to_owned),
            services,
            state: Mutex::new(DeviceState {
                bond_state: BondState::None,
                refuse_connections: false,
                connections: Vec::new(),
                last_request: None,
            }),
        })
    }

    pub fn set_bond_state(&self, bond_state: BondState) {
        self.state.lock_blocking().bond_state = bond_state;
    }

    /// Makes `connect_gatt` return no connection.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock_blocking().refuse_connections = refuse;
    }

    /// Every connection handed out, oldest first.
    pub fn connections(&self) -> Vec<Arc<FakeGatt>> {
        self.state.lock_blocking().connections.clone()
    }

    pub fn last_connection(&self) -> Option<Arc<FakeGatt>> {
        self.state.lock_blocking().connections.last().cloned()
    }

    /// `(auto_connect, transport)` of the last connection request.
    pub fn last_request(&self) -> Option<(bool, Transport)> {
        self.state.lock_blocking().last_request
    }
}

impl DeviceWrapper for FakeDevice {
    fn address(&self) -> String {
        self.address.clone()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn bluetooth_class(&self) -> u32 {
        0x1f00
    }

    fn bond_state(&self) -> BondState {
        self.state.lock_blocking().bond_state
    }

    fn connect_gatt(
        &self,
        auto_connect: bool,
        callback: Arc<GattCallback>,
        transport: Transport,
    ) -> Option<Arc<dyn GattWrapper>> {
        let mut state = self.state.lock_blocking();
        state.last_request = Some((auto_connect, transport));
        if state.refuse_connections {
            return None;
        }
        let gatt = Arc::new(FakeGatt::new(callback, self.services.clone()));
        state.connections.push(gatt.clone());
        Some(gatt)
    }
}

#[derive(Default)]
struct GattState {
    discover_calls: usize,
    disconnect_calls: usize,
    close_calls: usize,
    reads: Vec<PlatformId>,
    writes: Vec<PlatformId>,
    notifications: Vec<(PlatformId, bool)>,
    reject_requests: bool,
}

/// A GATT connection recording the requests made on it.
pub struct FakeGatt {
    callback: Arc<GattCallback>,
    services: Vec<Arc<FakeService>>,
    state: Mutex<GattState>,
}

impl FakeGatt {
    fn new(callback: Arc<GattCallback>, services: Vec<Arc<FakeService>>) -> Self {
        Self {
            callback,
            services,
            state: Mutex::new(GattState::default()),
        }
    }

    /// The callback the bridge registered for this connection.
    pub fn callback(&self) -> &GattCallback {
        &self.callback
    }

    pub fn discover_calls(&self) -> usize {
        self.state.lock_blocking().discover_calls
    }

    pub fn disconnect_calls(&self) -> usize {
        self.state.lock_blocking().disconnect_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock_blocking().close_calls
    }

    pub fn reads(&self) -> Vec<PlatformId> {
        self.state.lock_blocking().reads.clone()
    }

    pub fn writes(&self) -> Vec<PlatformId> {
        self.state.lock_blocking().writes.clone()
    }

    pub fn notifications(&self) -> Vec<(PlatformId, bool)> {
        self.state.lock_blocking().notifications.clone()
    }

    /// Makes every following request report that it could not be queued.
    pub fn reject_requests(&self, reject: bool) {
        self.state.lock_blocking().reject_requests = reject;
    }

    fn request(&self, record: impl FnOnce(&mut GattState)) -> Result<bool, PlatformError> {
        let mut state = self.state.lock_blocking();
        if state.reject_requests {
            return Ok(false);
        }
        record(&mut state);
        Ok(true)
    }
}

impl GattWrapper for FakeGatt {
    fn disconnect(&self) {
        self.state.lock_blocking().disconnect_calls += 1;
    }

    fn close(&self) {
        self.state.lock_blocking().close_calls += 1;
    }

    fn discover_services(&self) -> Result<bool, PlatformError> {
        self.request(|s| s.discover_calls += 1)
    }

    fn services(&self) -> Vec<Arc<dyn ServiceWrapper>> {
        self.services
            .iter()
            .map(|s| s.clone() as Arc<dyn ServiceWrapper>)
            .collect()
    }

    fn read_characteristic(
        &self,
        characteristic: &dyn CharacteristicWrapper,
    ) -> Result<bool, PlatformError> {
        self.request(|s| s.reads.push(characteristic.id()))
    }

    fn write_characteristic(
        &self,
        characteristic: &dyn CharacteristicWrapper,
    ) -> Result<bool, PlatformError> {
        self.request(|s| s.writes.push(characteristic.id()))
    }

    fn set_characteristic_notification(
        &self,
        characteristic: &dyn CharacteristicWrapper,
        enable: bool,
    ) -> Result<bool, PlatformError> {
        self.request(|s| s.notifications.push((characteristic.id(), enable)))
    }

    fn read_descriptor(&self, descriptor: &dyn DescriptorWrapper) -> Result<bool, PlatformError> {
        self.request(|s| s.reads.push(descriptor.id()))
    }

    fn write_descriptor(&self, descriptor: &dyn DescriptorWrapper) -> Result<bool, PlatformError> {
        self.request(|s| s.writes.push(descriptor.id()))
    }
}

pub struct FakeService {
    uuid: Uuid,
    instance_id: i32,
    characteristics: Vec<Arc<FakeCharacteristic>>,
}

impl FakeService {
    pub fn new(uuid: Uuid, instance_id: i32, characteristics: Vec<Arc<FakeCharacteristic>>) -> Arc<Self> {
        Arc::new(Self {
            uuid,
            instance_id,
            characteristics,
        })
    }
}

impl ServiceWrapper for FakeService {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn instance_id(&self) -> i32 {
        self.instance_id
    }

    fn characteristics(&self) -> Vec<Arc<dyn CharacteristicWrapper>> {
        self.characteristics
            .iter()
            .map(|c| c.clone() as Arc<dyn CharacteristicWrapper>)
            .collect()
    }
}

pub struct FakeCharacteristic {
    id: PlatformId,
    uuid: Uuid,
    instance_id: i32,
    properties: u32,
    descriptors: Vec<Arc<FakeDescriptor>>,
    value: Mutex<Vec<u8>>,
    write_type: Mutex<Option<WriteType>>,
}

impl FakeCharacteristic {
    pub fn new(
        uuid: Uuid,
        instance_id: i32,
        properties: u32,
        descriptors: Vec<Arc<FakeDescriptor>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: next_platform_id(),
            uuid,
            instance_id,
            properties,
            descriptors,
            value: Mutex::new(Vec::new()),
            write_type: Mutex::new(None),
        })
    }

    pub fn platform_id(&self) -> PlatformId {
        self.id
    }

    /// Replaces the value, as the platform does before a read or changed callback.
    pub fn set_current_value(&self, value: &[u8]) {
        *self.value.lock_blocking() = value.to_vec();
    }

    pub fn write_type(&self) -> Option<WriteType> {
        *self.write_type.lock_blocking()
    }
}

impl CharacteristicWrapper for FakeCharacteristic {
    fn id(&self) -> PlatformId {
        self.id
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn instance_id(&self) -> i32 {
        self.instance_id
    }

    fn properties(&self) -> u32 {
        self.properties
    }

    fn descriptors(&self) -> Vec<Arc<dyn DescriptorWrapper>> {
        self.descriptors
            .iter()
            .map(|d| d.clone() as Arc<dyn DescriptorWrapper>)
            .collect()
    }

    fn value(&self) -> Vec<u8> {
        self.value.lock_blocking().clone()
    }

    fn set_value(&self, value: &[u8]) -> bool {
        self.set_current_value(value);
        true
    }

    fn set_write_type(&self, write_type: WriteType) {
        *self.write_type.lock_blocking() = Some(write_type);
    }
}

pub struct FakeDescriptor {
    id: PlatformId,
    uuid: Uuid,
    value: Mutex<Vec<u8>>,
}

impl FakeDescriptor {
    pub fn new(uuid: Uuid) -> Arc<Self> {
        Arc::new(Self {
            id: next_platform_id(),
            uuid,
            value: Mutex::new(Vec::new()),
        })
    }

    pub fn platform_id(&self) -> PlatformId {
        self.id
    }

    pub fn set_current_value(&self, value: &[u8]) {
        *self.value.lock_blocking() = value.to_vec();
    }
}

impl DescriptorWrapper for FakeDescriptor {
    fn id(&self) -> PlatformId {
        self.id
    }

    fn uuid(&self) -> Uuid {
        self.uuid
    }

    fn value(&self) -> Vec<u8> {
        self.value.lock_blocking().clone()
    }

    fn set_value(&self, value: &[u8]) -> bool {
        self.set_current_value(value);
        true
    }
}

/// A call received by [`RecordingNative`].
#[derive(Debug, Clone)]
pub enum NativeCall {
    AdapterStateChanged(NativeHandle, bool),
    ScanFailed(NativeHandle, i32),
    DeviceOnScan(NativeHandle, DiscoveredDevice),
    ConnectionStateChange(NativeHandle, GattStatus, bool),
    CreateService(NativeHandle, ServiceInstanceId, NativeHandle),
    ServicesDiscovered(NativeHandle),
    CreateCharacteristic(NativeHandle, CharacteristicInstanceId, CharacteristicProperties, NativeHandle),
    CharacteristicChanged(NativeHandle, Vec<u8>),
    CharacteristicRead(NativeHandle, GattStatus, Vec<u8>),
    CharacteristicWrite(NativeHandle, GattStatus),
    CreateDescriptor(NativeHandle, DescriptorInstanceId, NativeHandle),
    DescriptorRead(NativeHandle, GattStatus, Vec<u8>),
    DescriptorWrite(NativeHandle, GattStatus),
}

/// Native side that records every call and hands out fresh handles on creation.
pub struct RecordingNative {
    calls: RefCell<Vec<NativeCall>>,
    next_handle: Cell<u64>,
}

impl Default for RecordingNative {
    fn default() -> Self {
        Self {
            calls: RefCell::new(Vec::new()),
            // low handles are left to the caller for adapters and devices
            next_handle: Cell::new(1000),
        }
    }
}

impl RecordingNative {
    pub fn calls(&self) -> Vec<NativeCall> {
        self.calls.borrow().clone()
    }

    /// Returns and forgets the calls recorded so far.
    pub fn take_calls(&self) -> Vec<NativeCall> {
        self.calls.take()
    }

    fn record(&self, call: NativeCall) {
        self.calls.borrow_mut().push(call);
    }

    fn new_handle(&self) -> NativeHandle {
        let raw = self.next_handle.get();
        self.next_handle.set(raw + 1);
        NativeHandle::new(raw).unwrap_or_else(|| unreachable!("handles start above zero"))
    }
}

impl NativeBridge for RecordingNative {
    fn on_adapter_state_changed(&self, adapter: NativeHandle, powered: bool) {
        self.record(NativeCall::AdapterStateChanged(adapter, powered));
    }

    fn on_scan_failed(&self, adapter: NativeHandle, error_code: i32) {
        self.record(NativeCall::ScanFailed(adapter, error_code));
    }

    fn create_or_update_device_on_scan(&self, adapter: NativeHandle, device: DiscoveredDevice) {
        self.record(NativeCall::DeviceOnScan(adapter, device));
    }

    fn on_connection_state_change(&self, device: NativeHandle, status: GattStatus, connected: bool) {
        self.record(NativeCall::ConnectionStateChange(device, status, connected));
    }

    fn create_gatt_remote_service(
        &self,
        device: NativeHandle,
        id: &ServiceInstanceId,
        _uuid: Uuid,
    ) -> Option<NativeHandle> {
        let handle = self.new_handle();
        self.record(NativeCall::CreateService(device, id.clone(), handle));
        Some(handle)
    }

    fn on_gatt_services_discovered(&self, device: NativeHandle) {
        self.record(NativeCall::ServicesDiscovered(device));
    }

    fn create_gatt_remote_characteristic(
        &self,
        service: NativeHandle,
        id: &CharacteristicInstanceId,
        _uuid: Uuid,
        properties: CharacteristicProperties,
    ) -> Option<NativeHandle> {
        let handle = self.new_handle();
        self.record(NativeCall::CreateCharacteristic(
            service,
            id.clone(),
            properties,
            handle,
        ));
        Some(handle)
    }

    fn on_characteristic_changed(&self, characteristic: NativeHandle, value: &[u8]) {
        self.record(NativeCall::CharacteristicChanged(characteristic, value.to_vec()));
    }

    fn on_characteristic_read(&self, characteristic: NativeHandle, status: GattStatus, value: &[u8]) {
        self.record(NativeCall::CharacteristicRead(
            characteristic,
            status,
            value.to_vec(),
        ));
    }

    fn on_characteristic_write(&self, characteristic: NativeHandle, status: GattStatus) {
        self.record(NativeCall::CharacteristicWrite(characteristic, status));
    }

    fn create_gatt_remote_descriptor(
        &self,
        characteristic: NativeHandle,
        id: &DescriptorInstanceId,
        _uuid: Uuid,
    ) -> Option<NativeHandle> {
        let handle = self.new_handle();
        self.record(NativeCall::CreateDescriptor(characteristic, id.clone(), handle));
        Some(handle)
    }

    fn on_descriptor_read(&self, descriptor: NativeHandle, status: GattStatus, value: &[u8]) {
        self.record(NativeCall::DescriptorRead(descriptor, status, value.to_vec()));
    }

    fn on_descriptor_write(&self, descriptor: NativeHandle, status: GattStatus) {
        self.record(NativeCall::DescriptorWrite(descriptor, status));
    }
}
