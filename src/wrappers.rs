//! Capability traits over the platform Bluetooth primitives.
//!
//! Bridges only ever talk to the platform through these traits, so the same bridge
//! code runs on top of the JNI bindings in `platform` or on top of the `fake` module.
//!
//! Methods returning `Result<bool, PlatformError>` mirror platform calls that may both
//! throw and return `false` when the request could not be queued.

use std::sync::Arc;

use uuid::Uuid;

use crate::callback::{AdapterStateReceiver, GattCallback, ScanCallback};
use crate::error::PlatformError;
use crate::types::{
    AdapterScanMode, BondState, PlatformId, ScanFilter, ScanMode, Transport, WriteType,
};

/// The local Bluetooth adapter.
pub trait AdapterWrapper: Send + Sync {
    fn address(&self) -> String;
    fn name(&self) -> String;
    fn is_enabled(&self) -> bool;
    /// Requests the adapter to turn on; the outcome arrives as a state-changed broadcast.
    fn enable(&self) -> bool;
    /// Requests the adapter to turn off; the outcome arrives as a state-changed broadcast.
    fn disable(&self) -> bool;
    fn scan_mode(&self) -> AdapterScanMode;
    /// Whether a classic discovery is in progress.
    fn is_discovering(&self) -> bool;
    fn le_scanner(&self) -> Option<Arc<dyn LeScannerWrapper>>;
    /// Whether the app holds the location permission and location services are on,
    /// both of which the platform requires for LE scans.
    fn can_scan(&self) -> bool;
    fn register_state_receiver(&self, receiver: Arc<AdapterStateReceiver>);
    fn unregister_state_receiver(&self, receiver: &Arc<AdapterStateReceiver>);
}

/// The platform LE scanner.
pub trait LeScannerWrapper: Send + Sync {
    fn start_scan(
        &self,
        filters: &[ScanFilter],
        mode: ScanMode,
        callback: Arc<ScanCallback>,
    ) -> Result<(), PlatformError>;

    /// Stops the scan started with `callback`, compared by identity.
    fn stop_scan(&self, callback: &Arc<ScanCallback>) -> Result<(), PlatformError>;
}

/// A remote device.
pub trait DeviceWrapper: Send + Sync {
    fn address(&self) -> String;
    fn name(&self) -> Option<String>;
    fn bluetooth_class(&self) -> u32;
    fn bond_state(&self) -> BondState;

    /// Starts a GATT connection attempt; returns `None` if the platform refused it.
    fn connect_gatt(
        &self,
        auto_connect: bool,
        callback: Arc<GattCallback>,
        transport: Transport,
    ) -> Option<Arc<dyn GattWrapper>>;
}

/// An open GATT client connection.
pub trait GattWrapper: Send + Sync {
    fn disconnect(&self);
    fn close(&self);
    fn discover_services(&self) -> Result<bool, PlatformError>;
    fn services(&self) -> Vec<Arc<dyn ServiceWrapper>>;
    fn read_characteristic(
        &self,
        characteristic: &dyn CharacteristicWrapper,
    ) -> Result<bool, PlatformError>;
    fn write_characteristic(
        &self,
        characteristic: &dyn CharacteristicWrapper,
    ) -> Result<bool, PlatformError>;
    fn set_characteristic_notification(
        &self,
        characteristic: &dyn CharacteristicWrapper,
        enable: bool,
    ) -> Result<bool, PlatformError>;
    fn read_descriptor(&self, descriptor: &dyn DescriptorWrapper) -> Result<bool, PlatformError>;
    fn write_descriptor(&self, descriptor: &dyn DescriptorWrapper)
        -> Result<bool, PlatformError>;
}

pub trait ServiceWrapper: Send + Sync {
    fn uuid(&self) -> Uuid;
    fn instance_id(&self) -> i32;
    fn characteristics(&self) -> Vec<Arc<dyn CharacteristicWrapper>>;
}

pub trait CharacteristicWrapper: Send + Sync {
    fn id(&self) -> PlatformId;
    fn uuid(&self) -> Uuid;
    fn instance_id(&self) -> i32;
    fn properties(&self) -> u32;
    fn descriptors(&self) -> Vec<Arc<dyn DescriptorWrapper>>;
    /// The value last read, written or notified; the platform reuses one buffer per object.
    fn value(&self) -> Vec<u8>;
    fn set_value(&self, value: &[u8]) -> bool;
    fn set_write_type(&self, write_type: WriteType);
}

pub trait DescriptorWrapper: Send + Sync {
    fn id(&self) -> PlatformId;
    fn uuid(&self) -> Uuid;
    fn value(&self) -> Vec<u8>;
    fn set_value(&self, value: &[u8]) -> bool;
}
