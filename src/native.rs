use uuid::Uuid;

use crate::error::GattStatus;
use crate::types::{
    CharacteristicInstanceId, CharacteristicProperties, DescriptorInstanceId, DiscoveredDevice,
    NativeHandle, ServiceInstanceId,
};

/// The native side of the bridge.
///
/// Every call is made on the bridge thread, keyed by the handle of the native
/// counterpart it concerns. Calls are never made for a bridge whose native
/// counterpart has been destroyed.
///
/// The `create_*` methods ask the native side to create the counterpart of a newly
/// found GATT object and return its handle; returning `None` leaves the bridge
/// object in place without a counterpart, so its events are not forwarded.
pub trait NativeBridge {
    fn on_adapter_state_changed(&self, adapter: NativeHandle, powered: bool);

    fn on_scan_failed(&self, adapter: NativeHandle, error_code: i32);

    fn create_or_update_device_on_scan(&self, adapter: NativeHandle, device: DiscoveredDevice);

    fn on_connection_state_change(&self, device: NativeHandle, status: GattStatus, connected: bool);

    fn create_gatt_remote_service(
        &self,
        device: NativeHandle,
        id: &ServiceInstanceId,
        uuid: Uuid,
    ) -> Option<NativeHandle>;

    fn on_gatt_services_discovered(&self, device: NativeHandle);

    fn create_gatt_remote_characteristic(
        &self,
        service: NativeHandle,
        id: &CharacteristicInstanceId,
        uuid: Uuid,
        properties: CharacteristicProperties,
    ) -> Option<NativeHandle>;

    fn on_characteristic_changed(&self, characteristic: NativeHandle, value: &[u8]);

    fn on_characteristic_read(&self, characteristic: NativeHandle, status: GattStatus, value: &[u8]);

    fn on_characteristic_write(&self, characteristic: NativeHandle, status: GattStatus);

    fn create_gatt_remote_descriptor(
        &self,
        characteristic: NativeHandle,
        id: &DescriptorInstanceId,
        uuid: Uuid,
    ) -> Option<NativeHandle>;

    fn on_descriptor_read(&self, descriptor: NativeHandle, status: GattStatus, value: &[u8]);

    fn on_descriptor_write(&self, descriptor: NativeHandle, status: GattStatus);
}
