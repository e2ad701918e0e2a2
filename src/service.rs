use std::sync::Arc;

use super::device::DeviceBridge;
use super::types::{CharacteristicInstanceId, NativeHandle, ServiceInstanceId};
use super::wrappers::ServiceWrapper;

use crate::Uuid;

pub(crate) struct ServiceEntry {
    pub(crate) native: Option<NativeHandle>,
    pub(crate) service: Arc<dyn ServiceWrapper>,
    pub(crate) characteristics: Vec<CharacteristicInstanceId>,
}

impl ServiceEntry {
    pub(crate) fn new(native: Option<NativeHandle>, service: Arc<dyn ServiceWrapper>) -> Self {
        Self {
            native,
            service,
            characteristics: Vec::new(),
        }
    }
}

/// Bridge of a GATT service, borrowed from its [`DeviceBridge`].
pub struct ServiceBridge<'d> {
    device: &'d mut DeviceBridge,
    id: ServiceInstanceId,
}

impl<'d> ServiceBridge<'d> {
    pub(crate) fn new(device: &'d mut DeviceBridge, id: ServiceInstanceId) -> Self {
        Self { device, id }
    }

    fn entry(&self) -> &ServiceEntry {
        &self.device.services[&self.id]
    }

    pub fn id(&self) -> &ServiceInstanceId {
        &self.id
    }

    /// The [Uuid] identifying the type of this GATT service.
    pub fn uuid(&self) -> Uuid {
        self.entry().service.uuid()
    }

    /// The platform's instance id, telling apart services with the same UUID.
    pub fn instance_id(&self) -> i32 {
        self.entry().service.instance_id()
    }

    pub fn native_handle(&self) -> Option<NativeHandle> {
        self.entry().native
    }

    /// Characteristics created so far under this service.
    pub fn characteristic_ids(&self) -> &[CharacteristicInstanceId] {
        &self.entry().characteristics
    }

    /// Creates a bridge for every characteristic of this service.
    ///
    /// Characteristics that already have a bridge keep it, so this may be called again
    /// after services are rediscovered.
    pub fn create_characteristics(&mut self) {
        let service = self.entry().service.clone();
        for characteristic in service.characteristics() {
            let id = CharacteristicInstanceId::new(
                &self.id,
                characteristic.uuid(),
                characteristic.instance_id(),
            );
            self.device
                .register_characteristic(&self.id, id, characteristic);
        }
    }

    /// Releases this service and every characteristic bridge under it.
    pub fn destroy(self) {
        log::trace!("ServiceBridge {} destroyed", self.id);
        self.device.remove_service(&self.id);
    }
}
