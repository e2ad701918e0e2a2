use std::collections::BTreeMap;
use std::sync::Arc;

use jni::objects::{GlobalRef, JObject, JValue};
use jni::JNIEnv;
use log::{debug, warn};

use super::callback::{
    new_receiver_proxy, new_scan_proxy, ScanSession, StateRegistration, SCAN_SESSIONS,
    STATE_RECEIVERS,
};
use super::device::PlatformDevice;
use super::{
    android_context, bytes, call_bool, call_int, call_object, call_void, for_each_in_list,
    java_uuid, jni_with_env, logged, string, uuid, JniResultExt,
};
use crate::callback::{AdapterStateReceiver, ScanCallback, ScanRecord, ScanResult};
use crate::error::PlatformError;
use crate::types::{AdapterScanMode, ScanFilter, ScanMode};
use crate::wrappers::{AdapterWrapper, DeviceWrapper, LeScannerWrapper};

const ACTION_STATE_CHANGED: &str = "android.bluetooth.adapter.action.STATE_CHANGED";
const PERMISSION_GRANTED: i32 = 0;
/// `Build.VERSION_CODES.S`, from which scanning needs `BLUETOOTH_SCAN` instead of location.
const SDK_BLUETOOTH_SCAN_PERMISSION: i32 = 31;
/// `Build.VERSION_CODES.P`, which added `LocationManager.isLocationEnabled`.
const SDK_LOCATION_ENABLED_QUERY: i32 = 28;

/// The local `BluetoothAdapter`.
pub struct PlatformAdapter {
    adapter: GlobalRef,
}

impl PlatformAdapter {
    /// Returns the default adapter, or `None` on a device without Bluetooth.
    pub fn default_adapter() -> Result<Option<Arc<Self>>, PlatformError> {
        jni_with_env(|env| {
            let context = android_context()?;
            let name = env.new_string("bluetooth").checked(env)?;
            let manager = call_object(
                env,
                &context,
                "getSystemService",
                "(Ljava/lang/String;)Ljava/lang/Object;",
                &[JValue::from(&name)],
            )?;
            if manager.is_null() {
                return Ok(None);
            }
            let adapter = call_object(
                env,
                &manager,
                "getAdapter",
                "()Landroid/bluetooth/BluetoothAdapter;",
                &[],
            )?;
            if adapter.is_null() {
                return Ok(None);
            }
            let adapter = env.new_global_ref(&adapter).checked(env)?;
            Ok(Some(Arc::new(Self { adapter })))
        })
    }

    /// Returns the remote device with the given address.
    pub fn remote_device(&self, address: &str) -> Result<Arc<PlatformDevice>, PlatformError> {
        jni_with_env(|env| {
            let address = env.new_string(address).checked(env)?;
            let device = call_object(
                env,
                &self.adapter,
                "getRemoteDevice",
                "(Ljava/lang/String;)Landroid/bluetooth/BluetoothDevice;",
                &[JValue::from(&address)],
            )?;
            if device.is_null() {
                return Err(PlatformError::NullResult);
            }
            Ok(Arc::new(PlatformDevice::new(env.new_global_ref(&device).checked(env)?)))
        })
    }

    fn bool_query(&self, name: &str) -> bool {
        logged(
            name,
            jni_with_env(|env| call_bool(env, &self.adapter, name, "()Z", &[])),
        )
    }

    fn string_query(&self, name: &str) -> String {
        logged(
            name,
            jni_with_env(|env| {
                let s = call_object(env, &self.adapter, name, "()Ljava/lang/String;", &[])?;
                Ok(string(env, s)?.unwrap_or_default())
            }),
        )
    }

    fn try_can_scan(&self) -> Result<bool, PlatformError> {
        jni_with_env(|env| {
            let context = android_context()?;
            let sdk = env
                .get_static_field("android/os/Build$VERSION", "SDK_INT", "I")
                .and_then(|v| v.i())
                .checked(env)?;
            let granted = |env: &mut JNIEnv<'_>, permission: &str| {
                let permission = env.new_string(permission).checked(env)?;
                let result = call_int(
                    env,
                    &context,
                    "checkSelfPermission",
                    "(Ljava/lang/String;)I",
                    &[JValue::from(&permission)],
                )?;
                Ok::<_, PlatformError>(result == PERMISSION_GRANTED)
            };
            if sdk >= SDK_BLUETOOTH_SCAN_PERMISSION {
                return granted(env, "android.permission.BLUETOOTH_SCAN");
            }
            if !granted(env, "android.permission.ACCESS_FINE_LOCATION")? {
                return Ok(false);
            }
            if sdk < SDK_LOCATION_ENABLED_QUERY {
                return Ok(true);
            }
            let name = env.new_string("location").checked(env)?;
            let manager = call_object(
                env,
                &context,
                "getSystemService",
                "(Ljava/lang/String;)Ljava/lang/Object;",
                &[JValue::from(&name)],
            )?;
            if manager.is_null() {
                return Ok(false);
            }
            call_bool(env, &manager, "isLocationEnabled", "()Z", &[])
        })
    }
}

impl AdapterWrapper for PlatformAdapter {
    fn address(&self) -> String {
        self.string_query("getAddress")
    }

    fn name(&self) -> String {
        self.string_query("getName")
    }

    fn is_enabled(&self) -> bool {
        self.bool_query("isEnabled")
    }

    fn enable(&self) -> bool {
        self.bool_query("enable")
    }

    fn disable(&self) -> bool {
        self.bool_query("disable")
    }

    fn scan_mode(&self) -> AdapterScanMode {
        AdapterScanMode::from(logged(
            "getScanMode",
            jni_with_env(|env| call_int(env, &self.adapter, "getScanMode", "()I", &[])),
        ))
    }

    fn is_discovering(&self) -> bool {
        self.bool_query("isDiscovering")
    }

    fn le_scanner(&self) -> Option<Arc<dyn LeScannerWrapper>> {
        let scanner = jni_with_env(|env| {
            let scanner = call_object(
                env,
                &self.adapter,
                "getBluetoothLeScanner",
                "()Landroid/bluetooth/le/BluetoothLeScanner;",
                &[],
            )?;
            if scanner.is_null() {
                return Ok(None);
            }
            Ok(Some(env.new_global_ref(&scanner).checked(env)?))
        });
        let scanner: Arc<dyn LeScannerWrapper> = Arc::new(PlatformScanner {
            scanner: logged("getBluetoothLeScanner", scanner)?,
        });
        Some(scanner)
    }

    fn can_scan(&self) -> bool {
        logged("can_scan", self.try_can_scan())
    }

    fn register_state_receiver(&self, receiver: Arc<AdapterStateReceiver>) {
        let handle = STATE_RECEIVERS.reserve();
        let proxy = jni_with_env(|env| {
            let proxy = new_receiver_proxy(env, handle)?;
            let action = env.new_string(ACTION_STATE_CHANGED).checked(env)?;
            let filter = env
                .new_object(
                    "android/content/IntentFilter",
                    "(Ljava/lang/String;)V",
                    &[JValue::from(&action)],
                )
                .checked(env)?;
            let context = android_context()?;
            call_object(
                env,
                &context,
                "registerReceiver",
                "(Landroid/content/BroadcastReceiver;Landroid/content/IntentFilter;)Landroid/content/Intent;",
                &[JValue::from(proxy.as_obj()), JValue::from(&filter)],
            )?;
            Ok(proxy)
        });
        match proxy {
            Ok(proxy) => STATE_RECEIVERS.insert(handle, StateRegistration { receiver, proxy }),
            Err(e) => warn!("registerReceiver failed: {e}"),
        }
    }

    fn unregister_state_receiver(&self, receiver: &Arc<AdapterStateReceiver>) {
        let Some(registration) =
            STATE_RECEIVERS.take(|r| Arc::ptr_eq(&r.receiver, receiver))
        else {
            debug!("state receiver was never registered");
            return;
        };
        logged(
            "unregisterReceiver",
            jni_with_env(|env| {
                let context = android_context()?;
                call_void(
                    env,
                    &context,
                    "unregisterReceiver",
                    "(Landroid/content/BroadcastReceiver;)V",
                    &[JValue::from(registration.proxy.as_obj())],
                )
            }),
        )
    }
}

/// The `BluetoothLeScanner` of the adapter.
///
/// Sessions are tracked process-wide, so a scan may be stopped through another
/// scanner object than the one that started it.
pub struct PlatformScanner {
    scanner: GlobalRef,
}

fn scan_filters<'local>(
    env: &mut JNIEnv<'local>,
    filters: &[ScanFilter],
) -> Result<JObject<'local>, PlatformError> {
    let list = env.new_object("java/util/ArrayList", "()V", &[]).checked(env)?;
    for filter in filters {
        let mut builder = env
            .new_object("android/bluetooth/le/ScanFilter$Builder", "()V", &[])
            .checked(env)?;
        if let Some(service) = filter.service_uuid {
            let service = java_uuid(env, service)?;
            let service = env
                .new_object(
                    "android/os/ParcelUuid",
                    "(Ljava/util/UUID;)V",
                    &[JValue::from(&service)],
                )
                .checked(env)?;
            builder = call_object(
                env,
                &builder,
                "setServiceUuid",
                "(Landroid/os/ParcelUuid;)Landroid/bluetooth/le/ScanFilter$Builder;",
                &[JValue::from(&service)],
            )?;
        }
        if let Some(name) = &filter.device_name {
            let name = env.new_string(name).checked(env)?;
            builder = call_object(
                env,
                &builder,
                "setDeviceName",
                "(Ljava/lang/String;)Landroid/bluetooth/le/ScanFilter$Builder;",
                &[JValue::from(&name)],
            )?;
        }
        let filter = call_object(
            env,
            &builder,
            "build",
            "()Landroid/bluetooth/le/ScanFilter;",
            &[],
        )?;
        call_bool(env, &list, "add", "(Ljava/lang/Object;)Z", &[JValue::from(&filter)])?;
    }
    Ok(list)
}

fn scan_settings<'local>(
    env: &mut JNIEnv<'local>,
    mode: ScanMode,
) -> Result<JObject<'local>, PlatformError> {
    let builder = env
        .new_object("android/bluetooth/le/ScanSettings$Builder", "()V", &[])
        .checked(env)?;
    let builder = call_object(
        env,
        &builder,
        "setScanMode",
        "(I)Landroid/bluetooth/le/ScanSettings$Builder;",
        &[JValue::Int(mode.into())],
    )?;
    call_object(env, &builder, "build", "()Landroid/bluetooth/le/ScanSettings;", &[])
}

impl LeScannerWrapper for PlatformScanner {
    fn start_scan(
        &self,
        filters: &[ScanFilter],
        mode: ScanMode,
        callback: Arc<ScanCallback>,
    ) -> Result<(), PlatformError> {
        let handle = SCAN_SESSIONS.reserve();
        let proxy = jni_with_env(|env| {
            let proxy = new_scan_proxy(env, handle)?;
            let filters = scan_filters(env, filters)?;
            let settings = scan_settings(env, mode)?;
            call_void(
                env,
                &self.scanner,
                "startScan",
                "(Ljava/util/List;Landroid/bluetooth/le/ScanSettings;Landroid/bluetooth/le/ScanCallback;)V",
                &[
                    JValue::from(&filters),
                    JValue::from(&settings),
                    JValue::from(proxy.as_obj()),
                ],
            )?;
            Ok(proxy)
        })?;
        SCAN_SESSIONS.insert(handle, ScanSession { callback, proxy });
        Ok(())
    }

    fn stop_scan(&self, callback: &Arc<ScanCallback>) -> Result<(), PlatformError> {
        let Some(session) = SCAN_SESSIONS.take(|s| Arc::ptr_eq(&s.callback, callback)) else {
            return Ok(());
        };
        jni_with_env(|env| {
            call_void(
                env,
                &self.scanner,
                "stopScan",
                "(Landroid/bluetooth/le/ScanCallback;)V",
                &[JValue::from(session.proxy.as_obj())],
            )
        })
    }
}

/// Converts an `android.bluetooth.le.ScanResult`.
pub(super) fn scan_result(
    env: &mut JNIEnv<'_>,
    result: &JObject<'_>,
) -> Result<ScanResult, PlatformError> {
    let device = call_object(
        env,
        result,
        "getDevice",
        "()Landroid/bluetooth/BluetoothDevice;",
        &[],
    )?;
    if device.is_null() {
        return Err(PlatformError::NullResult);
    }
    let device: Arc<dyn DeviceWrapper> =
        Arc::new(PlatformDevice::new(env.new_global_ref(&device).checked(env)?));
    let rssi = call_int(env, result, "getRssi", "()I", &[])?;
    let record = call_object(
        env,
        result,
        "getScanRecord",
        "()Landroid/bluetooth/le/ScanRecord;",
        &[],
    )?;
    let record = if record.is_null() {
        None
    } else {
        Some(scan_record(env, &record)?)
    };
    Ok(ScanResult {
        device,
        rssi,
        record,
    })
}

fn scan_record(env: &mut JNIEnv<'_>, record: &JObject<'_>) -> Result<ScanRecord, PlatformError> {
    let name = call_object(env, record, "getDeviceName", "()Ljava/lang/String;", &[])?;
    let device_name = string(env, name)?;

    let uuids = call_object(env, record, "getServiceUuids", "()Ljava/util/List;", &[])?;
    let service_uuids = if uuids.is_null() {
        None
    } else {
        let mut service_uuids = Vec::new();
        for_each_in_list(env, &uuids, |env, parcel| {
            let id = call_object(env, &parcel, "getUuid", "()Ljava/util/UUID;", &[])?;
            service_uuids.push(uuid(env, &id)?);
            Ok(())
        })?;
        Some(service_uuids)
    };

    let data = call_object(env, record, "getServiceData", "()Ljava/util/Map;", &[])?;
    let service_data = if data.is_null() {
        None
    } else {
        let entries = call_object(env, &data, "entrySet", "()Ljava/util/Set;", &[])?;
        let entries = call_object(
            env,
            &entries,
            "toArray",
            "()[Ljava/lang/Object;",
            &[],
        )?;
        let entries = jni::objects::JObjectArray::from(entries);
        let len = env.get_array_length(&entries).checked(env)?;
        let mut service_data = BTreeMap::new();
        for index in 0..len {
            let entry = env.get_object_array_element(&entries, index).checked(env)?;
            let key = call_object(env, &entry, "getKey", "()Ljava/lang/Object;", &[])?;
            let key = call_object(env, &key, "getUuid", "()Ljava/util/UUID;", &[])?;
            let value = call_object(env, &entry, "getValue", "()Ljava/lang/Object;", &[])?;
            service_data.insert(uuid(env, &key)?, bytes(env, value)?);
        }
        Some(service_data)
    };

    let data = call_object(
        env,
        record,
        "getManufacturerSpecificData",
        "()Landroid/util/SparseArray;",
        &[],
    )?;
    let manufacturer_data = if data.is_null() {
        None
    } else {
        let size = call_int(env, &data, "size", "()I", &[])?;
        let mut manufacturer_data = BTreeMap::new();
        for index in 0..size {
            let company = call_int(env, &data, "keyAt", "(I)I", &[JValue::Int(index)])?;
            let value = call_object(
                env,
                &data,
                "valueAt",
                "(I)Ljava/lang/Object;",
                &[JValue::Int(index)],
            )?;
            manufacturer_data.insert(company as u16, bytes(env, value)?);
        }
        Some(manufacturer_data)
    };

    // absent values are reported as Integer.MIN_VALUE and -1
    let tx_power_level = call_int(env, record, "getTxPowerLevel", "()I", &[])?;
    let advertise_flags = call_int(env, record, "getAdvertiseFlags", "()I", &[])?;
    Ok(ScanRecord {
        device_name,
        service_uuids,
        service_data,
        manufacturer_data,
        tx_power_level: (tx_power_level != i32::MIN).then_some(tx_power_level),
        advertise_flags: (advertise_flags >= 0).then_some(advertise_flags as u8),
    })
}
