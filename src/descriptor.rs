use std::sync::Arc;

use super::device::DeviceBridge;
use super::types::{CharacteristicInstanceId, DescriptorInstanceId, NativeHandle};
use super::util::{queued, BoolExt, ResultExt};
use super::wrappers::DescriptorWrapper;
use super::{Result, Uuid};

pub(crate) struct DescriptorEntry {
    pub(crate) native: Option<NativeHandle>,
    pub(crate) characteristic: CharacteristicInstanceId,
    pub(crate) descriptor: Arc<dyn DescriptorWrapper>,
}

impl DescriptorEntry {
    pub(crate) fn new(
        native: Option<NativeHandle>,
        characteristic: CharacteristicInstanceId,
        descriptor: Arc<dyn DescriptorWrapper>,
    ) -> Self {
        Self {
            native,
            characteristic,
            descriptor,
        }
    }
}

/// Bridge of a GATT descriptor, borrowed from its [`DeviceBridge`].
pub struct DescriptorBridge<'d> {
    device: &'d mut DeviceBridge,
    id: DescriptorInstanceId,
}

impl<'d> DescriptorBridge<'d> {
    pub(crate) fn new(device: &'d mut DeviceBridge, id: DescriptorInstanceId) -> Self {
        Self { device, id }
    }

    fn entry(&self) -> &DescriptorEntry {
        &self.device.descriptors[&self.id]
    }

    pub fn id(&self) -> &DescriptorInstanceId {
        &self.id
    }

    /// The [Uuid] identifying the type of this GATT descriptor.
    pub fn uuid(&self) -> Uuid {
        self.entry().descriptor.uuid()
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.entry().native
    }

    pub fn characteristic_id(&self) -> &CharacteristicInstanceId {
        &self.entry().characteristic
    }

    /// Requests a read of the remote value.
    pub fn read_remote_descriptor(&self) -> bool {
        self.try_read().accepted("readRemoteDescriptor")
    }

    fn try_read(&self) -> Result<()> {
        let gatt = self.device.gatt()?;
        queued(gatt.read_descriptor(self.entry().descriptor.as_ref()))
    }

    /// Sets the value to write, then requests the write.
    pub fn write_remote_descriptor(&self, value: &[u8]) -> bool {
        self.try_write(value).accepted("writeRemoteDescriptor")
    }

    fn try_write(&self, value: &[u8]) -> Result<()> {
        let gatt = self.device.gatt()?;
        let descriptor = &self.entry().descriptor;
        descriptor.set_value(value).non_false()?;
        queued(gatt.write_descriptor(descriptor.as_ref()))
    }

    pub fn destroy(self) {
        log::trace!("DescriptorBridge {} destroyed", self.id);
        self.device.remove_descriptor(&self.id);
    }
}
