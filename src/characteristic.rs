use std::sync::Arc;

use uuid::Uuid;

use super::device::DeviceBridge;
use super::types::{
    CharacteristicInstanceId, CharacteristicProperties, DescriptorInstanceId, NativeHandle,
    ServiceInstanceId, WriteType,
};
use super::util::{queued, BoolExt, ResultExt};
use super::wrappers::CharacteristicWrapper;
use super::Result;

pub(crate) struct CharacteristicEntry {
    pub(crate) native: Option<NativeHandle>,
    pub(crate) service: ServiceInstanceId,
    pub(crate) characteristic: Arc<dyn CharacteristicWrapper>,
    pub(crate) descriptors: Vec<DescriptorInstanceId>,
    pub(crate) notifying: bool,
}

impl CharacteristicEntry {
    pub(crate) fn new(
        native: Option<NativeHandle>,
        service: ServiceInstanceId,
        characteristic: Arc<dyn CharacteristicWrapper>,
    ) -> Self {
        Self {
            native,
            service,
            characteristic,
            descriptors: Vec::new(),
            notifying: false,
        }
    }
}

/// Bridge of a GATT characteristic, borrowed from its [`DeviceBridge`].
///
/// Read and write requests only report whether the platform queued them; their
/// results arrive later through [`NativeBridge`](crate::NativeBridge).
pub struct CharacteristicBridge<'d> {
    device: &'d mut DeviceBridge,
    id: CharacteristicInstanceId,
}

impl<'d> CharacteristicBridge<'d> {
    pub(crate) fn new(device: &'d mut DeviceBridge, id: CharacteristicInstanceId) -> Self {
        Self { device, id }
    }

    fn entry(&self) -> &CharacteristicEntry {
        &self.device.characteristics[&self.id]
    }

    pub fn id(&self) -> &CharacteristicInstanceId {
        &self.id
    }

    /// The [Uuid] identifying the type of this GATT characteristic.
    pub fn uuid(&self) -> Uuid {
        self.entry().characteristic.uuid()
    }

    /// The properties of this GATT characteristic.
    ///
    /// Only the base property bitmask; the extended properties descriptor is not read.
    pub fn properties(&self) -> CharacteristicProperties {
        CharacteristicProperties::from_bits(self.entry().characteristic.properties())
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.entry().native
    }

    pub fn service_id(&self) -> &ServiceInstanceId {
        &self.entry().service
    }

    pub fn descriptor_ids(&self) -> &[DescriptorInstanceId] {
        &self.entry().descriptors
    }

    pub fn is_notifying(&self) -> bool {
        self.entry().notifying
    }

    /// Requests a read of the remote value.
    pub fn read_remote_characteristic(&self) -> bool {
        self.try_read().accepted("readRemoteCharacteristic")
    }

    fn try_read(&self) -> Result<()> {
        let gatt = self.device.gatt()?;
        queued(gatt.read_characteristic(self.entry().characteristic.as_ref()))
    }

    /// Sets the value to write, then requests the write.
    ///
    /// `write_type` replaces the characteristic's current write type when given.
    pub fn write_remote_characteristic(&self, value: &[u8], write_type: Option<WriteType>) -> bool {
        self.try_write(value, write_type)
            .accepted("writeRemoteCharacteristic")
    }

    fn try_write(&self, value: &[u8], write_type: Option<WriteType>) -> Result<()> {
        let gatt = self.device.gatt()?;
        let characteristic = &self.entry().characteristic;
        if let Some(write_type) = write_type {
            characteristic.set_write_type(write_type);
        }
        characteristic.set_value(value).non_false()?;
        queued(gatt.write_characteristic(characteristic.as_ref()))
    }

    /// Enables or disables local delivery of notifications.
    ///
    /// This does not write the Client Characteristic Configuration descriptor.
    pub fn set_characteristic_notification(&mut self, enabled: bool) -> bool {
        let accepted = self
            .try_set_notification(enabled)
            .accepted("setCharacteristicNotification");
        if accepted {
            if let Some(entry) = self.device.characteristics.get_mut(&self.id) {
                entry.notifying = enabled;
            }
        }
        accepted
    }

    fn try_set_notification(&self, enabled: bool) -> Result<()> {
        let gatt = self.device.gatt()?;
        queued(gatt.set_characteristic_notification(
            self.entry().characteristic.as_ref(),
            enabled,
        ))
    }

    /// Creates a bridge for every descriptor of this characteristic.
    ///
    /// Descriptors are told apart by their position, so repeated UUIDs get distinct
    /// bridges. Descriptors that already have a bridge keep it.
    pub fn create_descriptors(&mut self) {
        let characteristic = self.entry().characteristic.clone();
        for (counter, descriptor) in characteristic.descriptors().into_iter().enumerate() {
            let id = DescriptorInstanceId::new(&self.id, descriptor.uuid(), counter);
            self.device.register_descriptor(&self.id, id, descriptor);
        }
    }

    /// Disables notifications if still connected, then releases this characteristic
    /// and its descriptor bridges.
    pub fn destroy(self) {
        log::trace!("CharacteristicBridge {} destroyed", self.id);
        self.device.remove_characteristic(&self.id);
    }
}
