use std::num::NonZeroU64;
use std::sync::Arc;

use uuid::Uuid;

use crate::wrappers::DeviceWrapper;

/// A platform-specific device identifier (the Bluetooth address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceId(pub(crate) String);

impl DeviceId {
    /// Wraps a platform address.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// The address this identifier wraps.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of an object on the native side of the bridge.
///
/// A bridge whose native counterpart is gone holds no handle at all; the
/// zero value is not representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(NonZeroU64);

impl NativeHandle {
    /// Returns `None` for the null handle `0`.
    pub fn new(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }

    pub fn get(self) -> u64 {
        self.0.get()
    }
}

/// Identity of a platform GATT object, stable for the lifetime of that object.
///
/// Platform callbacks name the characteristic or descriptor they concern by this
/// identity; device bridges map it back to their own entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformId(pub u64);

macro_rules! instance_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

instance_id! {
    /// Composite identity of a GATT service: `{address}/{uuid},{instance id}`.
    ///
    /// Service UUIDs may repeat within one device, the platform instance id tells
    /// them apart.
    ServiceInstanceId
}

instance_id! {
    /// Composite identity of a GATT characteristic: `{service}/{uuid},{instance id}`.
    CharacteristicInstanceId
}

instance_id! {
    /// Composite identity of a GATT descriptor: `{characteristic}/{uuid};{counter}`.
    ///
    /// The platform exposes no instance id for descriptors, so the position among
    /// the characteristic's descriptors is used instead.
    DescriptorInstanceId
}

impl ServiceInstanceId {
    pub(crate) fn new(device: &DeviceId, uuid: Uuid, instance_id: i32) -> Self {
        Self(format!("{device}/{uuid},{instance_id}"))
    }
}

impl CharacteristicInstanceId {
    pub(crate) fn new(service: &ServiceInstanceId, uuid: Uuid, instance_id: i32) -> Self {
        Self(format!("{service}/{uuid},{instance_id}"))
    }
}

impl DescriptorInstanceId {
    pub(crate) fn new(characteristic: &CharacteristicInstanceId, uuid: Uuid, counter: usize) -> Self {
        Self(format!("{characteristic}/{uuid};{counter}"))
    }
}

/// GATT characteristic properties as defined in the Bluetooth Core Specification, Vol 3, Part G, §3.3.1.1.
///
/// Only the base bitmask is exposed. The extended properties descriptor is never
/// read, so `reliable_write` and `writable_auxiliaries` stay `false`.
#[allow(missing_docs)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CharacteristicProperties {
    pub broadcast: bool,
    pub read: bool,
    pub write_without_response: bool,
    pub write: bool,
    pub notify: bool,
    pub indicate: bool,
    pub authenticated_signed_writes: bool,
    pub extended_properties: bool,
    pub reliable_write: bool,
    pub writable_auxiliaries: bool,
}

impl CharacteristicProperties {
    /// Raw transmutation from [`u32`].
    ///
    /// Extended properties are encoded in bits 8 and 9.
    pub fn from_bits(bits: u32) -> Self {
        CharacteristicProperties {
            broadcast: (bits & (1 << 0)) != 0,
            read: (bits & (1 << 1)) != 0,
            write_without_response: (bits & (1 << 2)) != 0,
            write: (bits & (1 << 3)) != 0,
            notify: (bits & (1 << 4)) != 0,
            indicate: (bits & (1 << 5)) != 0,
            authenticated_signed_writes: (bits & (1 << 6)) != 0,
            extended_properties: (bits & (1 << 7)) != 0,
            reliable_write: (bits & (1 << 8)) != 0,
            writable_auxiliaries: (bits & (1 << 9)) != 0,
        }
    }

    /// Raw transmutation to [`u32`].
    pub fn to_bits(self) -> u32 {
        u32::from(self.broadcast)
            | (u32::from(self.read) << 1)
            | (u32::from(self.write_without_response) << 2)
            | (u32::from(self.write) << 3)
            | (u32::from(self.notify) << 4)
            | (u32::from(self.indicate) << 5)
            | (u32::from(self.authenticated_signed_writes) << 6)
            | (u32::from(self.extended_properties) << 7)
            | (u32::from(self.reliable_write) << 8)
            | (u32::from(self.writable_auxiliaries) << 9)
    }
}

/// Write type of a characteristic write, with the platform's numeric values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WriteType {
    NoResponse = 1,
    Default = 2,
    Signed = 4,
}

/// Transport preferred when connecting to a dual-mode device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Transport {
    Auto,
    BrEdr,
    #[default]
    Le,
}

impl From<Transport> for i32 {
    fn from(transport: Transport) -> Self {
        match transport {
            Transport::Auto => 0,
            Transport::BrEdr => 1,
            Transport::Le => 2,
        }
    }
}

/// LE scan duty cycle requested from the platform scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScanMode {
    Opportunistic,
    LowPower,
    Balanced,
    #[default]
    LowLatency,
}

impl From<ScanMode> for i32 {
    fn from(mode: ScanMode) -> Self {
        match mode {
            ScanMode::Opportunistic => -1,
            ScanMode::LowPower => 0,
            ScanMode::Balanced => 1,
            ScanMode::LowLatency => 2,
        }
    }
}

/// Classic scan mode of the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterScanMode {
    None,
    Connectable,
    ConnectableDiscoverable,
}

impl From<i32> for AdapterScanMode {
    fn from(raw: i32) -> Self {
        match raw {
            21 => Self::Connectable,
            23 => Self::ConnectableDiscoverable,
            _ => Self::None,
        }
    }
}

/// Power state reported by the adapter state-changed broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterState {
    Off,
    TurningOn,
    On,
    TurningOff,
    Unknown(i32),
}

impl From<i32> for AdapterState {
    fn from(raw: i32) -> Self {
        match raw {
            10 => Self::Off,
            11 => Self::TurningOn,
            12 => Self::On,
            13 => Self::TurningOff,
            other => Self::Unknown(other),
        }
    }
}

/// Bonding state of a remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BondState {
    None,
    Bonding,
    Bonded,
}

impl From<i32> for BondState {
    fn from(raw: i32) -> Self {
        match raw {
            11 => Self::Bonding,
            12 => Self::Bonded,
            _ => Self::None,
        }
    }
}

/// Profile connection state reported by the connection-state callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProfileState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl From<i32> for ProfileState {
    /// Values the platform never reports for GATT are read as disconnected.
    fn from(raw: i32) -> Self {
        match raw {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Disconnecting,
            _ => Self::Disconnected,
        }
    }
}

/// GATT connection state of a [`DeviceBridge`](crate::DeviceBridge).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Connected, and the platform has reported the service list.
    ServicesDiscovered,
}

/// Scan filter passed to the platform scanner.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScanFilter {
    pub service_uuid: Option<Uuid>,
    pub device_name: Option<String>,
}

impl ScanFilter {
    pub fn with_service(uuid: Uuid) -> Self {
        Self {
            service_uuid: Some(uuid),
            device_name: None,
        }
    }
}

/// A remote device reported by an LE scan, ready to cross the bridge boundary.
///
/// Advertisement data the platform did not report is represented by empty
/// sequences, never by absence.
#[derive(Clone)]
pub struct DiscoveredDevice {
    pub address: DeviceId,
    pub device: Arc<dyn DeviceWrapper>,
    pub advertised_name: Option<String>,
    pub rssi: i32,
    pub advertised_uuids: Vec<Uuid>,
    pub tx_power: Option<i32>,
    pub service_data_keys: Vec<Uuid>,
    pub service_data_values: Vec<Vec<u8>>,
    pub manufacturer_data_keys: Vec<u16>,
    pub manufacturer_data_values: Vec<Vec<u8>>,
    pub advertisement_flags: Option<u8>,
}

impl std::fmt::Debug for DiscoveredDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveredDevice")
            .field("address", &self.address)
            .field("advertised_name", &self.advertised_name)
            .field("rssi", &self.rssi)
            .field("advertised_uuids", &self.advertised_uuids)
            .field("tx_power", &self.tx_power)
            .field("service_data_keys", &self.service_data_keys)
            .field("manufacturer_data_keys", &self.manufacturer_data_keys)
            .field("advertisement_flags", &self.advertisement_flags)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_are_composite() {
        let dev = DeviceId::new("AA:BB:CC:DD:EE:FF");
        let uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
        let service = ServiceInstanceId::new(&dev, uuid, 7);
        assert_eq!(
            service.as_str(),
            "AA:BB:CC:DD:EE:FF/0000180d-0000-1000-8000-00805f9b34fb,7"
        );
        let char_uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);
        let characteristic = CharacteristicInstanceId::new(&service, char_uuid, 9);
        assert!(characteristic.as_str().starts_with(service.as_str()));
        assert!(characteristic.as_str().ends_with("/00002a37-0000-1000-8000-00805f9b34fb,9"));
        let desc = DescriptorInstanceId::new(&characteristic, char_uuid, 0);
        assert!(desc.as_str().ends_with(";0"));
    }

    #[test]
    fn properties_from_base_mask() {
        let props = CharacteristicProperties::from_bits(0x1a);
        assert!(props.read && props.write && props.notify);
        assert!(!props.indicate && !props.reliable_write);
        assert_eq!(props.to_bits(), 0x1a);
    }

    #[test]
    fn null_native_handle_is_rejected() {
        assert!(NativeHandle::new(0).is_none());
        assert_eq!(NativeHandle::new(42).map(NativeHandle::get), Some(42));
    }

    #[test]
    fn adapter_state_from_raw() {
        assert_eq!(AdapterState::from(12), AdapterState::On);
        assert_eq!(AdapterState::from(10), AdapterState::Off);
        assert_eq!(AdapterState::from(-1), AdapterState::Unknown(-1));
    }

    #[test]
    fn platform_constants() {
        assert_eq!(i32::from(ScanMode::Opportunistic), -1);
        assert_eq!(i32::from(ScanMode::default()), 2);
        assert_eq!(i32::from(Transport::default()), 2);
        assert_eq!(i32::from(Transport::BrEdr), 1);
        assert_eq!(AdapterScanMode::from(23), AdapterScanMode::ConnectableDiscoverable);
        assert_eq!(AdapterScanMode::from(22), AdapterScanMode::None);
        assert_eq!(BondState::from(12), BondState::Bonded);
        assert_eq!(BondState::from(-1), BondState::None);
        assert_eq!(ProfileState::from(2), ProfileState::Connected);
        assert_eq!(ProfileState::from(7), ProfileState::Disconnected);
    }
}
