use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, info, trace};

use super::callback::GattCallback;
use super::characteristic::{CharacteristicBridge, CharacteristicEntry};
use super::config::BridgeConfig;
use super::descriptor::{DescriptorBridge, DescriptorEntry};
use super::error::{ErrorKind, GattStatus};
use super::event_receiver::{Dispatcher, GattEvent};
use super::native::NativeBridge;
use super::service::{ServiceBridge, ServiceEntry};
use super::types::{
    BondState, CharacteristicInstanceId, CharacteristicProperties, ConnectionState,
    DescriptorInstanceId, DeviceId, NativeHandle, PlatformId, ProfileState, ServiceInstanceId,
};
use super::util::{queued, OptionExt, ResultExt};
use super::wrappers::{CharacteristicWrapper, DescriptorWrapper, DeviceWrapper, GattWrapper};
use super::Result;

/// Connection serials are unique across device bridges, so a bridge recreated for the
/// same address never accepts callbacks of its predecessor's connections.
fn next_connection_serial() -> u64 {
    static NEXT_SERIAL: AtomicU64 = AtomicU64::new(1);
    NEXT_SERIAL.fetch_add(1, Ordering::Relaxed)
}

/// A GATT connection attempt and the serial its callbacks carry.
struct GattConnection {
    gatt: Arc<dyn GattWrapper>,
    serial: u64,
}

/// Bridge of a remote device.
///
/// Owns the GATT connection and every service, characteristic and descriptor bridge
/// found on it. Child bridges are entries of this arena; [`ServiceBridge`],
/// [`CharacteristicBridge`] and [`DescriptorBridge`] are views borrowing it.
pub struct DeviceBridge {
    id: DeviceId,
    native: Option<NativeHandle>,
    pub(crate) native_bridge: Rc<dyn NativeBridge>,
    device: Arc<dyn DeviceWrapper>,
    connection: Option<GattConnection>,
    state: ConnectionState,
    latest_connection: u64,
    pub(crate) services: HashMap<ServiceInstanceId, ServiceEntry>,
    pub(crate) characteristics: HashMap<CharacteristicInstanceId, CharacteristicEntry>,
    pub(crate) descriptors: HashMap<DescriptorInstanceId, DescriptorEntry>,
    characteristic_ids: HashMap<PlatformId, CharacteristicInstanceId>,
    descriptor_ids: HashMap<PlatformId, DescriptorInstanceId>,
    dispatcher: Dispatcher,
    config: BridgeConfig,
}

impl std::fmt::Debug for DeviceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBridge")
            .field("id", &self.id)
            .field("native", &self.native)
            .field("state", &self.state)
            .field("services", &self.services.len())
            .field("characteristics", &self.characteristics.len())
            .field("descriptors", &self.descriptors.len())
            .finish()
    }
}

impl DeviceBridge {
    pub(crate) fn new(
        native: NativeHandle,
        device: Arc<dyn DeviceWrapper>,
        native_bridge: Rc<dyn NativeBridge>,
        dispatcher: Dispatcher,
        config: BridgeConfig,
    ) -> Self {
        Self {
            id: DeviceId::new(device.address()),
            native: Some(native),
            native_bridge,
            device,
            connection: None,
            state: ConnectionState::Disconnected,
            latest_connection: 0,
            services: HashMap::new(),
            characteristics: HashMap::new(),
            descriptors: HashMap::new(),
            characteristic_ids: HashMap::new(),
            descriptor_ids: HashMap::new(),
            dispatcher,
            config,
        }
    }

    /// Disables active notifications, closes the connection and releases every child bridge.
    pub(crate) fn destroy(mut self) {
        info!("DeviceBridge {} destroyed", self.id);
        self.native = None;
        if let Some(conn) = self.connection.take() {
            for entry in self.characteristics.values().filter(|c| c.notifying) {
                queued(
                    conn.gatt
                        .set_characteristic_notification(entry.characteristic.as_ref(), false),
                )
                .accepted("setCharacteristicNotification");
            }
            conn.gatt.close();
        }
        self.characteristic_ids.clear();
        self.descriptor_ids.clear();
        self.descriptors.clear();
        self.characteristics.clear();
        self.services.clear();
    }

    /// Returns this device’s unique identifier.
    pub fn id(&self) -> DeviceId {
        self.id.clone()
    }

    pub fn address(&self) -> &str {
        self.id.as_str()
    }

    /// The local name for this device.
    pub fn name(&self) -> Option<String> {
        self.device.name()
    }

    pub fn bluetooth_class(&self) -> u32 {
        self.device.bluetooth_class()
    }

    /// The pairing status for this device.
    pub fn is_paired(&self) -> bool {
        self.device.bond_state() == BondState::Bonded
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a connection object is held, which may still be connecting.
    pub fn has_connection(&self) -> bool {
        self.connection.is_some()
    }

    /// Starts a new GATT connection attempt, closing the previous connection if any.
    ///
    /// Returns whether the platform accepted the attempt; the outcome arrives later as a
    /// connection state change.
    pub fn create_connection(&mut self) -> bool {
        self.try_create_connection().accepted("createConnection")
    }

    fn try_create_connection(&mut self) -> Result<()> {
        if let Some(conn) = self.connection.take() {
            info!("closing previous connection to {}", self.id);
            conn.gatt.close();
        }
        self.state = ConnectionState::Disconnected;
        let serial = next_connection_serial();
        self.latest_connection = serial;
        let callback = Arc::new(GattCallback::new(
            self.id.clone(),
            serial,
            self.dispatcher.clone(),
        ));
        let gatt = self
            .device
            .connect_gatt(self.config.auto_connect, callback, self.config.transport)
            .non_null()?;
        info!("connecting to {}", self.id);
        self.connection = Some(GattConnection { gatt, serial });
        self.state = ConnectionState::Connecting;
        Ok(())
    }

    /// Requests disconnection; no-op if there is no connection.
    ///
    /// Local resources are released when the disconnection is reported.
    pub fn disconnect(&mut self) -> bool {
        let Some(conn) = &self.connection else {
            return false;
        };
        conn.gatt.disconnect();
        true
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &ServiceInstanceId> {
        self.services.keys()
    }

    pub fn characteristic_ids(&self) -> impl Iterator<Item = &CharacteristicInstanceId> {
        self.characteristics.keys()
    }

    pub fn descriptor_ids(&self) -> impl Iterator<Item = &DescriptorInstanceId> {
        self.descriptors.keys()
    }

    pub fn service(&mut self, id: &ServiceInstanceId) -> Option<ServiceBridge<'_>> {
        if self.services.contains_key(id) {
            Some(ServiceBridge::new(self, id.clone()))
        } else {
            None
        }
    }

    pub fn characteristic(
        &mut self,
        id: &CharacteristicInstanceId,
    ) -> Option<CharacteristicBridge<'_>> {
        if self.characteristics.contains_key(id) {
            Some(CharacteristicBridge::new(self, id.clone()))
        } else {
            None
        }
    }

    pub fn descriptor(&mut self, id: &DescriptorInstanceId) -> Option<DescriptorBridge<'_>> {
        if self.descriptors.contains_key(id) {
            Some(DescriptorBridge::new(self, id.clone()))
        } else {
            None
        }
    }

    /// Looks up the characteristic bridge registered for a platform object.
    pub fn resolve_characteristic(&self, platform: PlatformId) -> Option<&CharacteristicInstanceId> {
        self.characteristic_ids.get(&platform)
    }

    /// Looks up the descriptor bridge registered for a platform object.
    pub fn resolve_descriptor(&self, platform: PlatformId) -> Option<&DescriptorInstanceId> {
        self.descriptor_ids.get(&platform)
    }

    pub(crate) fn gatt(&self) -> Result<Arc<dyn GattWrapper>> {
        self.connection
            .as_ref()
            .map(|c| c.gatt.clone())
            .ok_or_else(|| ErrorKind::NotConnected.into())
    }

    pub(crate) fn register_characteristic(
        &mut self,
        service: &ServiceInstanceId,
        id: CharacteristicInstanceId,
        characteristic: Arc<dyn CharacteristicWrapper>,
    ) {
        let platform = characteristic.id();
        if let Some(entry) = self.characteristics.get_mut(&id) {
            let previous = entry.characteristic.id();
            if previous != platform {
                trace!("characteristic {id} now backed by a new platform object");
                self.characteristic_ids.remove(&previous);
                entry.characteristic = characteristic;
            }
            self.characteristic_ids.insert(platform, id);
            return;
        }

        let service_native = self.services.get(service).and_then(|s| s.native);
        let native = service_native.and_then(|s| {
            self.native_bridge.create_gatt_remote_characteristic(
                s,
                &id,
                characteristic.uuid(),
                CharacteristicProperties::from_bits(characteristic.properties()),
            )
        });
        self.characteristic_ids.insert(platform, id.clone());
        if let Some(entry) = self.services.get_mut(service) {
            entry.characteristics.push(id.clone());
        }
        self.characteristics.insert(
            id,
            CharacteristicEntry::new(native, service.clone(), characteristic),
        );
    }

    pub(crate) fn register_descriptor(
        &mut self,
        characteristic: &CharacteristicInstanceId,
        id: DescriptorInstanceId,
        descriptor: Arc<dyn DescriptorWrapper>,
    ) {
        let platform = descriptor.id();
        if let Some(entry) = self.descriptors.get_mut(&id) {
            let previous = entry.descriptor.id();
            if previous != platform {
                trace!("descriptor {id} now backed by a new platform object");
                self.descriptor_ids.remove(&previous);
                entry.descriptor = descriptor;
            }
            self.descriptor_ids.insert(platform, id);
            return;
        }

        let characteristic_native = self.characteristics.get(characteristic).and_then(|c| c.native);
        let native = characteristic_native.and_then(|c| {
            self.native_bridge
                .create_gatt_remote_descriptor(c, &id, descriptor.uuid())
        });
        self.descriptor_ids.insert(platform, id.clone());
        if let Some(entry) = self.characteristics.get_mut(characteristic) {
            entry.descriptors.push(id.clone());
        }
        self.descriptors
            .insert(id, DescriptorEntry::new(native, characteristic.clone(), descriptor));
    }

    pub(crate) fn remove_service(&mut self, id: &ServiceInstanceId) {
        let Some(entry) = self.services.remove(id) else {
            return;
        };
        for characteristic in &entry.characteristics {
            self.remove_characteristic(characteristic);
        }
    }

    pub(crate) fn remove_characteristic(&mut self, id: &CharacteristicInstanceId) {
        let Some(entry) = self.characteristics.remove(id) else {
            return;
        };
        if let Some(conn) = &self.connection {
            queued(
                conn.gatt
                    .set_characteristic_notification(entry.characteristic.as_ref(), false),
            )
            .accepted("setCharacteristicNotification");
        }
        for descriptor in &entry.descriptors {
            self.remove_descriptor(descriptor);
        }
        self.characteristic_ids.remove(&entry.characteristic.id());
        if let Some(service) = self.services.get_mut(&entry.service) {
            service.characteristics.retain(|c| c != id);
        }
    }

    pub(crate) fn remove_descriptor(&mut self, id: &DescriptorInstanceId) {
        let Some(entry) = self.descriptors.remove(id) else {
            return;
        };
        self.descriptor_ids.remove(&entry.descriptor.id());
        if let Some(characteristic) = self.characteristics.get_mut(&entry.characteristic) {
            characteristic.descriptors.retain(|d| d != id);
        }
    }

    pub(crate) fn on_gatt_event(&mut self, connection: u64, event: GattEvent) {
        if connection != self.latest_connection {
            debug!(
                "dropping callback of stale connection {connection} to {}: {event:?}",
                self.id
            );
            return;
        }
        match event {
            GattEvent::ConnectionStateChange { status, new_state } => {
                self.on_connection_state_change(status, new_state)
            }
            GattEvent::ServicesDiscovered { status } => self.on_services_discovered(status),
            GattEvent::CharacteristicChanged {
                characteristic,
                value,
            } => {
                let Some(native) = self.characteristic_native(characteristic, "changed") else {
                    return;
                };
                self.native_bridge.on_characteristic_changed(native, &value);
            }
            GattEvent::CharacteristicRead {
                characteristic,
                status,
            } => {
                let Some(native) = self.characteristic_native(characteristic, "read") else {
                    return;
                };
                let value = self.characteristics[&self.characteristic_ids[&characteristic]]
                    .characteristic
                    .value();
                self.native_bridge
                    .on_characteristic_read(native, status, &value);
            }
            GattEvent::CharacteristicWrite {
                characteristic,
                status,
            } => {
                let Some(native) = self.characteristic_native(characteristic, "write") else {
                    return;
                };
                self.native_bridge.on_characteristic_write(native, status);
            }
            GattEvent::DescriptorRead { descriptor, status } => {
                let Some(native) = self.descriptor_native(descriptor, "read") else {
                    return;
                };
                let value = self.descriptors[&self.descriptor_ids[&descriptor]]
                    .descriptor
                    .value();
                self.native_bridge.on_descriptor_read(native, status, &value);
            }
            GattEvent::DescriptorWrite { descriptor, status } => {
                let Some(native) = self.descriptor_native(descriptor, "write") else {
                    return;
                };
                self.native_bridge.on_descriptor_write(native, status);
            }
        }
    }

    fn on_connection_state_change(&mut self, status: GattStatus, new_state: ProfileState) {
        match new_state {
            ProfileState::Connected => match &self.connection {
                Some(conn) => {
                    self.state = ConnectionState::Connected;
                    queued(conn.gatt.discover_services()).accepted("discoverServices");
                }
                None => debug!("{} connected without a connection object", self.id),
            },
            ProfileState::Disconnected => {
                self.state = ConnectionState::Disconnected;
                if let Some(conn) = self.connection.take() {
                    info!("connection {} to {} closed", conn.serial, self.id);
                    conn.gatt.close();
                }
            }
            ProfileState::Connecting | ProfileState::Disconnecting => (),
        }
        if let Some(native) = self.native {
            self.native_bridge.on_connection_state_change(
                native,
                status,
                new_state == ProfileState::Connected,
            );
        }
    }

    fn on_services_discovered(&mut self, status: GattStatus) {
        let Some(conn) = &self.connection else {
            debug!("{} discovered services after its connection was closed", self.id);
            return;
        };
        if !status.is_success() {
            debug!("service discovery on {} finished with status {status}", self.id);
        }
        let services = conn.gatt.services();
        match self.state {
            ConnectionState::Connected | ConnectionState::ServicesDiscovered => {
                self.state = ConnectionState::ServicesDiscovered
            }
            state => debug!("{} discovered services while {state:?}", self.id),
        }
        for service in services {
            let id = ServiceInstanceId::new(&self.id, service.uuid(), service.instance_id());
            if let Some(entry) = self.services.get_mut(&id) {
                entry.service = service;
                continue;
            }
            let native = self.native.and_then(|device| {
                self.native_bridge
                    .create_gatt_remote_service(device, &id, service.uuid())
            });
            self.services.insert(id, ServiceEntry::new(native, service));
        }
        if let Some(native) = self.native {
            self.native_bridge.on_gatt_services_discovered(native);
        }
    }

    fn characteristic_native(&self, platform: PlatformId, what: &str) -> Option<NativeHandle> {
        let Some(id) = self.characteristic_ids.get(&platform) else {
            debug!("characteristic {what} callback for an unregistered characteristic on {}", self.id);
            return None;
        };
        self.characteristics.get(id).and_then(|c| c.native)
    }

    fn descriptor_native(&self, platform: PlatformId, what: &str) -> Option<NativeHandle> {
        let Some(id) = self.descriptor_ids.get(&platform) else {
            debug!("descriptor {what} callback for an unregistered descriptor on {}", self.id);
            return None;
        };
        self.descriptors.get(id).and_then(|d| d.native)
    }
}
