use std::sync::Arc;

use jni::objects::{GlobalRef, JValue};
use log::warn;

use super::callback::{new_gatt_proxy, GattHandler, GATT_CALLBACKS};
use super::gatt::PlatformGatt;
use super::{
    android_context, call_int, call_object, jni_with_env, logged, string, JniResultExt, ObjectIds,
};
use crate::callback::GattCallback;
use crate::types::{BondState, Transport};
use crate::wrappers::{DeviceWrapper, GattWrapper};

/// `BluetoothClass.Device.Major.UNCATEGORIZED`, reported when the platform has no class.
const UNCATEGORIZED_CLASS: u32 = 0x1f00;

/// A remote `BluetoothDevice`.
pub struct PlatformDevice {
    device: GlobalRef,
}

impl PlatformDevice {
    pub(super) fn new(device: GlobalRef) -> Self {
        Self { device }
    }
}

impl DeviceWrapper for PlatformDevice {
    fn address(&self) -> String {
        logged(
            "BluetoothDevice.getAddress",
            jni_with_env(|env| {
                let address =
                    call_object(env, &self.device, "getAddress", "()Ljava/lang/String;", &[])?;
                Ok(string(env, address)?.unwrap_or_default())
            }),
        )
    }

    fn name(&self) -> Option<String> {
        logged(
            "BluetoothDevice.getName",
            jni_with_env(|env| {
                let name = call_object(env, &self.device, "getName", "()Ljava/lang/String;", &[])?;
                string(env, name)
            }),
        )
    }

    fn bluetooth_class(&self) -> u32 {
        let class = jni_with_env(|env| {
            let class = call_object(
                env,
                &self.device,
                "getBluetoothClass",
                "()Landroid/bluetooth/BluetoothClass;",
                &[],
            )?;
            if class.is_null() {
                return Ok(UNCATEGORIZED_CLASS);
            }
            Ok(call_int(env, &class, "getDeviceClass", "()I", &[])? as u32)
        });
        class.unwrap_or_else(|e| {
            warn!("BluetoothDevice.getBluetoothClass failed: {e}");
            UNCATEGORIZED_CLASS
        })
    }

    fn bond_state(&self) -> BondState {
        BondState::from(logged(
            "BluetoothDevice.getBondState",
            jni_with_env(|env| call_int(env, &self.device, "getBondState", "()I", &[])),
        ))
    }

    fn connect_gatt(
        &self,
        auto_connect: bool,
        callback: Arc<GattCallback>,
        transport: Transport,
    ) -> Option<Arc<dyn GattWrapper>> {
        let ids = Arc::new(ObjectIds::default());
        let handle = GATT_CALLBACKS.reserve();
        GATT_CALLBACKS.insert(
            handle,
            GattHandler {
                callback,
                ids: ids.clone(),
            },
        );
        let gatt = jni_with_env(|env| {
            let proxy = new_gatt_proxy(env, handle)?;
            let context = android_context()?;
            let gatt = call_object(
                env,
                &self.device,
                "connectGatt",
                "(Landroid/content/Context;ZLandroid/bluetooth/BluetoothGattCallback;I)Landroid/bluetooth/BluetoothGatt;",
                &[
                    JValue::from(&context),
                    JValue::from(auto_connect),
                    JValue::from(proxy.as_obj()),
                    JValue::Int(transport.into()),
                ],
            )?;
            if gatt.is_null() {
                return Ok(None);
            }
            Ok(Some(env.new_global_ref(&gatt).checked(env)?))
        });
        match gatt {
            Ok(Some(gatt)) => Some(Arc::new(PlatformGatt::new(gatt, ids, handle))),
            Ok(None) => {
                GATT_CALLBACKS.remove(handle);
                None
            }
            Err(e) => {
                warn!("BluetoothDevice.connectGatt failed: {e}");
                GATT_CALLBACKS.remove(handle);
                None
            }
        }
    }
}
