//! Bridges Android Bluetooth LE platform callbacks to a native GATT client.
//!
//! The platform side is reached through the capability traits in [`wrappers`], which
//! the `platform` module implements over `android.bluetooth` on Android; the
//! native side implements [`NativeBridge`]. Platform callbacks arrive on arbitrary
//! threads at receivers such as [`GattCallback`], which queue them; they take effect
//! only when the owning [`BluetoothBridge`] dispatches them on its own thread.
//!
//! Every bridge operation returns immediately with whether the platform accepted the
//! request. Results, if they ever come, are delivered to the [`NativeBridge`].
//!
//! With the `fake` feature, the `fake` module provides a deterministic platform
//! for tests.

pub use adapter::AdapterBridge;
pub use bridge::BluetoothBridge;
pub use callback::{AdapterStateReceiver, GattCallback, ScanCallback, ScanRecord, ScanResult};
pub use characteristic::CharacteristicBridge;
pub use config::BridgeConfig;
pub use descriptor::DescriptorBridge;
pub use device::DeviceBridge;
pub use error::{Error, ErrorKind, GattStatus};
pub use native::NativeBridge;
pub use service::ServiceBridge;

/// Convenience alias for a result with [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

pub use uuid::Uuid;
pub mod error;
#[cfg(any(test, feature = "fake"))]
pub mod fake;
#[cfg(target_os = "android")]
pub mod platform;
mod types;
pub mod wrappers;
pub use types::*;

mod adapter;
mod bridge;
mod callback;
mod characteristic;
mod config;
mod descriptor;
mod device;
mod event_receiver;
mod native;
mod service;
mod util;
