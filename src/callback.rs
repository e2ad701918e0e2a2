//! Callback receivers handed to the platform.
//!
//! The platform invokes these on its own threads. Each of them captures what it needs
//! from the platform objects right away and posts a [`PlatformEvent`] to the bridge
//! thread; none of them touch bridge state.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{trace, warn};
use uuid::Uuid;

use crate::error::GattStatus;
use crate::event_receiver::{Dispatcher, GattEvent, PlatformEvent};
use crate::types::{AdapterState, DeviceId, DiscoveredDevice, ProfileState};
use crate::wrappers::{CharacteristicWrapper, DescriptorWrapper, DeviceWrapper};

/// Receives adapter state-changed broadcasts.
#[derive(Debug)]
pub struct AdapterStateReceiver {
    dispatcher: Dispatcher,
}

impl AdapterStateReceiver {
    pub(crate) fn new(dispatcher: Dispatcher) -> Self {
        Self { dispatcher }
    }

    /// Called with the raw `EXTRA_STATE` value of the broadcast.
    pub fn on_receive(&self, state: i32) {
        self.dispatcher
            .post(PlatformEvent::AdapterStateChanged(AdapterState::from(state)));
    }
}

/// Advertisement data of one scan result, as reported by the platform.
///
/// Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanRecord {
    pub device_name: Option<String>,
    pub service_uuids: Option<Vec<Uuid>>,
    pub service_data: Option<BTreeMap<Uuid, Vec<u8>>>,
    pub manufacturer_data: Option<BTreeMap<u16, Vec<u8>>>,
    pub tx_power_level: Option<i32>,
    pub advertise_flags: Option<u8>,
}

/// One LE scan result, as reported by the platform.
#[derive(Clone)]
pub struct ScanResult {
    pub device: Arc<dyn DeviceWrapper>,
    pub rssi: i32,
    pub record: Option<ScanRecord>,
}

impl ScanResult {
    pub(crate) fn into_discovered(self) -> DiscoveredDevice {
        let record = self.record.unwrap_or_default();
        let (service_data_keys, service_data_values) =
            record.service_data.unwrap_or_default().into_iter().unzip();
        let (manufacturer_data_keys, manufacturer_data_values) =
            record.manufacturer_data.unwrap_or_default().into_iter().unzip();
        DiscoveredDevice {
            address: DeviceId::new(self.device.address()),
            device: self.device,
            advertised_name: record.device_name,
            rssi: self.rssi,
            advertised_uuids: record.service_uuids.unwrap_or_default(),
            tx_power: record.tx_power_level,
            service_data_keys,
            service_data_values,
            manufacturer_data_keys,
            manufacturer_data_values,
            advertisement_flags: record.advertise_flags,
        }
    }
}

/// Receives the results of one scan session.
///
/// The scanner identifies a session by the identity of this object, see
/// [`LeScannerWrapper::stop_scan`](crate::wrappers::LeScannerWrapper::stop_scan).
#[derive(Debug)]
pub struct ScanCallback {
    session: u64,
    dispatcher: Dispatcher,
}

impl ScanCallback {
    pub(crate) fn new(session: u64, dispatcher: Dispatcher) -> Self {
        Self {
            session,
            dispatcher,
        }
    }

    pub(crate) fn session(&self) -> u64 {
        self.session
    }

    pub fn on_scan_result(&self, callback_type: i32, result: ScanResult) {
        let device = result.into_discovered();
        trace!(
            "onScanResult {callback_type} {} {:?}",
            device.address,
            device.advertised_name
        );
        self.dispatcher.post(PlatformEvent::ScanResult {
            session: self.session,
            device,
        });
    }

    /// Batch results are not requested, so these are only logged.
    pub fn on_batch_scan_results(&self, results: &[ScanResult]) {
        trace!("onBatchScanResults with {} results", results.len());
    }

    pub fn on_scan_failed(&self, error_code: i32) {
        warn!("onScanFailed: {error_code}");
        self.dispatcher.post(PlatformEvent::ScanFailed {
            session: self.session,
            error_code,
        });
    }
}

/// Receives the GATT callbacks of one connection attempt.
#[derive(Debug)]
pub struct GattCallback {
    device: DeviceId,
    connection: u64,
    dispatcher: Dispatcher,
}

impl GattCallback {
    pub(crate) fn new(device: DeviceId, connection: u64, dispatcher: Dispatcher) -> Self {
        Self {
            device,
            connection,
            dispatcher,
        }
    }

    fn post(&self, event: GattEvent) {
        self.dispatcher.post(PlatformEvent::Gatt {
            device: self.device.clone(),
            connection: self.connection,
            event,
        });
    }

    pub fn on_connection_state_change(&self, status: i32, new_state: ProfileState) {
        log::info!(
            "onConnectionStateChange {} status: {status} newState: {new_state:?}",
            self.device
        );
        self.post(GattEvent::ConnectionStateChange {
            status: GattStatus(status),
            new_state,
        });
    }

    pub fn on_services_discovered(&self, status: i32) {
        log::info!("onServicesDiscovered {} status: {status}", self.device);
        self.post(GattEvent::ServicesDiscovered {
            status: GattStatus(status),
        });
    }

    pub fn on_characteristic_changed(&self, characteristic: &dyn CharacteristicWrapper) {
        trace!("onCharacteristicChanged {}", self.device);
        self.post(GattEvent::CharacteristicChanged {
            characteristic: characteristic.id(),
            value: characteristic.value(),
        });
    }

    pub fn on_characteristic_read(&self, characteristic: &dyn CharacteristicWrapper, status: i32) {
        self.post(GattEvent::CharacteristicRead {
            characteristic: characteristic.id(),
            status: GattStatus(status),
        });
    }

    pub fn on_characteristic_write(&self, characteristic: &dyn CharacteristicWrapper, status: i32) {
        self.post(GattEvent::CharacteristicWrite {
            characteristic: characteristic.id(),
            status: GattStatus(status),
        });
    }

    pub fn on_descriptor_read(&self, descriptor: &dyn DescriptorWrapper, status: i32) {
        self.post(GattEvent::DescriptorRead {
            descriptor: descriptor.id(),
            status: GattStatus(status),
        });
    }

    pub fn on_descriptor_write(&self, descriptor: &dyn DescriptorWrapper, status: i32) {
        self.post(GattEvent::DescriptorWrite {
            descriptor: descriptor.id(),
            status: GattStatus(status),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDevice;

    #[test]
    fn missing_advertisement_data_becomes_empty() {
        let result = ScanResult {
            device: FakeDevice::new("11:22:33:44:55:66", None, Vec::new()),
            rssi: -70,
            record: None,
        };
        let device = result.into_discovered();
        assert_eq!(device.address.as_str(), "11:22:33:44:55:66");
        assert!(device.advertised_uuids.is_empty());
        assert!(device.service_data_keys.is_empty() && device.service_data_values.is_empty());
        assert!(device.manufacturer_data_keys.is_empty());
        assert!(device.manufacturer_data_values.is_empty());
        assert_eq!(device.tx_power, None);
    }

    #[test]
    fn advertisement_maps_become_parallel_sequences() {
        let heart_rate = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
        let battery = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);
        let record = ScanRecord {
            device_name: Some("HRM".into()),
            service_uuids: Some(vec![heart_rate]),
            service_data: Some(BTreeMap::from([(battery, vec![80]), (heart_rate, vec![1, 2])])),
            manufacturer_data: Some(BTreeMap::from([(0x004c, vec![0xaa])])),
            tx_power_level: Some(-4),
            advertise_flags: Some(0x06),
        };
        let device = ScanResult {
            device: FakeDevice::new("11:22:33:44:55:66", None, Vec::new()),
            rssi: -40,
            record: Some(record),
        }
        .into_discovered();

        assert_eq!(device.advertised_name.as_deref(), Some("HRM"));
        assert_eq!(device.service_data_keys.len(), device.service_data_values.len());
        let battery_at = device
            .service_data_keys
            .iter()
            .position(|k| *k == battery)
            .unwrap();
        assert_eq!(device.service_data_values[battery_at], vec![80]);
        assert_eq!(device.manufacturer_data_keys, vec![0x004c]);
        assert_eq!(device.manufacturer_data_values, vec![vec![0xaa]]);
        assert_eq!(device.tx_power, Some(-4));
        assert_eq!(device.advertisement_flags, Some(0x06));
    }
}
