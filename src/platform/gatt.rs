use std::sync::Arc;

use jni::objects::{GlobalRef, JObject, JValue};
use jni::JNIEnv;
use uuid::Uuid;

use super::callback::GATT_CALLBACKS;
use super::{
    bytes, call_bool, call_int, call_object, call_void, for_each_in_list, jni_with_env, logged,
    uuid, JniResultExt, ObjectIds,
};
use crate::error::PlatformError;
use crate::types::{PlatformId, WriteType};
use crate::wrappers::{CharacteristicWrapper, DescriptorWrapper, GattWrapper, ServiceWrapper};

/// A `BluetoothGatt` client connection.
pub struct PlatformGatt {
    gatt: GlobalRef,
    ids: Arc<ObjectIds>,
    callback_handle: i64,
}

impl PlatformGatt {
    pub(super) fn new(gatt: GlobalRef, ids: Arc<ObjectIds>, callback_handle: i64) -> Self {
        Self {
            gatt,
            ids,
            callback_handle,
        }
    }

    fn request(
        &self,
        name: &str,
        sig: &str,
        target: PlatformId,
        extra: Option<bool>,
    ) -> Result<bool, PlatformError> {
        let target = self.ids.object(target).ok_or(PlatformError::NullResult)?;
        jni_with_env(|env| match extra {
            Some(flag) => call_bool(
                env,
                &self.gatt,
                name,
                sig,
                &[JValue::from(target.as_obj()), JValue::from(flag)],
            ),
            None => call_bool(env, &self.gatt, name, sig, &[JValue::from(target.as_obj())]),
        })
    }
}

impl Drop for PlatformGatt {
    fn drop(&mut self) {
        GATT_CALLBACKS.remove(self.callback_handle);
    }
}

impl GattWrapper for PlatformGatt {
    fn disconnect(&self) {
        logged(
            "BluetoothGatt.disconnect",
            jni_with_env(|env| call_void(env, &self.gatt, "disconnect", "()V", &[])),
        )
    }

    fn close(&self) {
        logged(
            "BluetoothGatt.close",
            jni_with_env(|env| call_void(env, &self.gatt, "close", "()V", &[])),
        );
        GATT_CALLBACKS.remove(self.callback_handle);
    }

    fn discover_services(&self) -> Result<bool, PlatformError> {
        jni_with_env(|env| call_bool(env, &self.gatt, "discoverServices", "()Z", &[]))
    }

    fn services(&self) -> Vec<Arc<dyn ServiceWrapper>> {
        let services = jni_with_env(|env| {
            let list = call_object(env, &self.gatt, "getServices", "()Ljava/util/List;", &[])?;
            let mut services: Vec<Arc<dyn ServiceWrapper>> = Vec::new();
            for_each_in_list(env, &list, |env, service| {
                services.push(Arc::new(PlatformService {
                    service: env.new_global_ref(&service).checked(env)?,
                    ids: self.ids.clone(),
                }));
                Ok(())
            })?;
            Ok(services)
        });
        logged("BluetoothGatt.getServices", services)
    }

    fn read_characteristic(
        &self,
        characteristic: &dyn CharacteristicWrapper,
    ) -> Result<bool, PlatformError> {
        self.request(
            "readCharacteristic",
            "(Landroid/bluetooth/BluetoothGattCharacteristic;)Z",
            characteristic.id(),
            None,
        )
    }

    fn write_characteristic(
        &self,
        characteristic: &dyn CharacteristicWrapper,
    ) -> Result<bool, PlatformError> {
        self.request(
            "writeCharacteristic",
            "(Landroid/bluetooth/BluetoothGattCharacteristic;)Z",
            characteristic.id(),
            None,
        )
    }

    fn set_characteristic_notification(
        &self,
        characteristic: &dyn CharacteristicWrapper,
        enable: bool,
    ) -> Result<bool, PlatformError> {
        self.request(
            "setCharacteristicNotification",
            "(Landroid/bluetooth/BluetoothGattCharacteristic;Z)Z",
            characteristic.id(),
            Some(enable),
        )
    }

    fn read_descriptor(&self, descriptor: &dyn DescriptorWrapper) -> Result<bool, PlatformError> {
        self.request(
            "readDescriptor",
            "(Landroid/bluetooth/BluetoothGattDescriptor;)Z",
            descriptor.id(),
            None,
        )
    }

    fn write_descriptor(
        &self,
        descriptor: &dyn DescriptorWrapper,
    ) -> Result<bool, PlatformError> {
        self.request(
            "writeDescriptor",
            "(Landroid/bluetooth/BluetoothGattDescriptor;)Z",
            descriptor.id(),
            None,
        )
    }
}

/// A `BluetoothGattService`.
pub struct PlatformService {
    service: GlobalRef,
    ids: Arc<ObjectIds>,
}

impl ServiceWrapper for PlatformService {
    fn uuid(&self) -> Uuid {
        logged(
            "BluetoothGattService.getUuid",
            jni_with_env(|env| {
                let id = call_object(env, &self.service, "getUuid", "()Ljava/util/UUID;", &[])?;
                uuid(env, &id)
            }),
        )
    }

    fn instance_id(&self) -> i32 {
        logged(
            "BluetoothGattService.getInstanceId",
            jni_with_env(|env| call_int(env, &self.service, "getInstanceId", "()I", &[])),
        )
    }

    fn characteristics(&self) -> Vec<Arc<dyn CharacteristicWrapper>> {
        let characteristics = jni_with_env(|env| {
            let list = call_object(
                env,
                &self.service,
                "getCharacteristics",
                "()Ljava/util/List;",
                &[],
            )?;
            let mut characteristics: Vec<Arc<dyn CharacteristicWrapper>> = Vec::new();
            for_each_in_list(env, &list, |env, characteristic| {
                characteristics.push(Arc::new(PlatformCharacteristic::wrap(
                    env,
                    &characteristic,
                    &self.ids,
                )?));
                Ok(())
            })?;
            Ok(characteristics)
        });
        logged("BluetoothGattService.getCharacteristics", characteristics)
    }
}

/// A `BluetoothGattCharacteristic`, identified by object identity within its connection.
pub struct PlatformCharacteristic {
    id: PlatformId,
    characteristic: GlobalRef,
    ids: Arc<ObjectIds>,
}

impl PlatformCharacteristic {
    pub(super) fn wrap(
        env: &mut JNIEnv<'_>,
        characteristic: &JObject<'_>,
        ids: &Arc<ObjectIds>,
    ) -> Result<Self, PlatformError> {
        let (id, characteristic) = ids.id_of(env, characteristic)?;
        Ok(Self {
            id,
            characteristic,
            ids: ids.clone(),
        })
    }

    fn int(&self, name: &str) -> i32 {
        logged(
            name,
            jni_with_env(|env| call_int(env, &self.characteristic, name, "()I", &[])),
        )
    }
}

impl CharacteristicWrapper for PlatformCharacteristic {
    fn id(&self) -> PlatformId {
        self.id
    }

    fn uuid(&self) -> Uuid {
        logged(
            "BluetoothGattCharacteristic.getUuid",
            jni_with_env(|env| {
                let id =
                    call_object(env, &self.characteristic, "getUuid", "()Ljava/util/UUID;", &[])?;
                uuid(env, &id)
            }),
        )
    }

    fn instance_id(&self) -> i32 {
        self.int("getInstanceId")
    }

    fn properties(&self) -> u32 {
        self.int("getProperties") as u32
    }

    fn descriptors(&self) -> Vec<Arc<dyn DescriptorWrapper>> {
        let descriptors = jni_with_env(|env| {
            let list = call_object(
                env,
                &self.characteristic,
                "getDescriptors",
                "()Ljava/util/List;",
                &[],
            )?;
            let mut descriptors: Vec<Arc<dyn DescriptorWrapper>> = Vec::new();
            for_each_in_list(env, &list, |env, descriptor| {
                descriptors.push(Arc::new(PlatformDescriptor::wrap(
                    env,
                    &descriptor,
                    &self.ids,
                )?));
                Ok(())
            })?;
            Ok(descriptors)
        });
        logged("BluetoothGattCharacteristic.getDescriptors", descriptors)
    }

    fn value(&self) -> Vec<u8> {
        logged(
            "BluetoothGattCharacteristic.getValue",
            jni_with_env(|env| {
                let value = call_object(env, &self.characteristic, "getValue", "()[B", &[])?;
                bytes(env, value)
            }),
        )
    }

    fn set_value(&self, value: &[u8]) -> bool {
        logged(
            "BluetoothGattCharacteristic.setValue",
            jni_with_env(|env| {
                let value = env.byte_array_from_slice(value).checked(env)?;
                call_bool(
                    env,
                    &self.characteristic,
                    "setValue",
                    "([B)Z",
                    &[JValue::from(&value)],
                )
            }),
        )
    }

    fn set_write_type(&self, write_type: WriteType) {
        logged(
            "BluetoothGattCharacteristic.setWriteType",
            jni_with_env(|env| {
                call_void(
                    env,
                    &self.characteristic,
                    "setWriteType",
                    "(I)V",
                    &[JValue::Int(write_type as i32)],
                )
            }),
        )
    }
}

/// A `BluetoothGattDescriptor`, identified by object identity within its connection.
pub struct PlatformDescriptor {
    id: PlatformId,
    descriptor: GlobalRef,
}

impl PlatformDescriptor {
    pub(super) fn wrap(
        env: &mut JNIEnv<'_>,
        descriptor: &JObject<'_>,
        ids: &ObjectIds,
    ) -> Result<Self, PlatformError> {
        let (id, descriptor) = ids.id_of(env, descriptor)?;
        Ok(Self { id, descriptor })
    }
}

impl DescriptorWrapper for PlatformDescriptor {
    fn id(&self) -> PlatformId {
        self.id
    }

    fn uuid(&self) -> Uuid {
        logged(
            "BluetoothGattDescriptor.getUuid",
            jni_with_env(|env| {
                let id = call_object(env, &self.descriptor, "getUuid", "()Ljava/util/UUID;", &[])?;
                uuid(env, &id)
            }),
        )
    }

    fn value(&self) -> Vec<u8> {
        logged(
            "BluetoothGattDescriptor.getValue",
            jni_with_env(|env| {
                let value = call_object(env, &self.descriptor, "getValue", "()[B", &[])?;
                bytes(env, value)
            }),
        )
    }

    fn set_value(&self, value: &[u8]) -> bool {
        logged(
            "BluetoothGattDescriptor.setValue",
            jni_with_env(|env| {
                let value = env.byte_array_from_slice(value).checked(env)?;
                call_bool(env, &self.descriptor, "setValue", "([B)Z", &[JValue::from(&value)])
            }),
        )
    }
}
