//! Proxy classes and the native methods they call.
//!
//! A proxy only carries a numeric handle. Native methods look the handle up in a
//! registry, so a callback arriving after its receiver was released is dropped here.

use std::collections::BTreeMap;
use std::ffi::c_void;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

use async_lock::Mutex;
use jni::objects::{GlobalRef, JClass, JObject, JObjectArray, JValue};
use jni::sys::{jint, jlong};
use jni::{JNIEnv, NativeMethod};
use log::{debug, warn};

use super::gatt::{PlatformCharacteristic, PlatformDescriptor};
use super::{android_context, call_object, JniResultExt, ObjectIds};
use crate::callback::{AdapterStateReceiver, GattCallback, ScanCallback, ScanResult};
use crate::error::PlatformError;
use crate::types::ProfileState;

static CLASSES_DEX: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/classes.dex"));

const GATT_PROXY: &str = "rust.androidblebridge.GattCallbackProxy";
const SCAN_PROXY: &str = "rust.androidblebridge.ScanCallbackProxy";
const RECEIVER_PROXY: &str = "rust.androidblebridge.StateReceiverProxy";

pub(super) struct Registry<T> {
    next: AtomicI64,
    entries: Mutex<BTreeMap<i64, T>>,
}

impl<T: Clone> Registry<T> {
    const fn new() -> Self {
        Self {
            next: AtomicI64::new(1),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub(super) fn reserve(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    pub(super) fn insert(&self, handle: i64, value: T) {
        self.entries.lock_blocking().insert(handle, value);
    }

    pub(super) fn get(&self, handle: i64) -> Option<T> {
        self.entries.lock_blocking().get(&handle).cloned()
    }

    pub(super) fn remove(&self, handle: i64) -> Option<T> {
        self.entries.lock_blocking().remove(&handle)
    }

    /// Removes and returns the first entry matching `pred`.
    pub(super) fn take(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        let mut entries = self.entries.lock_blocking();
        let handle = entries.iter().find(|(_, v)| pred(v)).map(|(h, _)| *h)?;
        entries.remove(&handle)
    }
}

#[derive(Clone)]
pub(super) struct GattHandler {
    pub(super) callback: Arc<GattCallback>,
    pub(super) ids: Arc<ObjectIds>,
}

#[derive(Clone)]
pub(super) struct ScanSession {
    pub(super) callback: Arc<ScanCallback>,
    pub(super) proxy: GlobalRef,
}

#[derive(Clone)]
pub(super) struct StateRegistration {
    pub(super) receiver: Arc<AdapterStateReceiver>,
    pub(super) proxy: GlobalRef,
}

pub(super) static GATT_CALLBACKS: Registry<GattHandler> = Registry::new();
pub(super) static SCAN_SESSIONS: Registry<ScanSession> = Registry::new();
pub(super) static STATE_RECEIVERS: Registry<StateRegistration> = Registry::new();

struct ProxyClasses {
    gatt: GlobalRef,
    scan: GlobalRef,
    receiver: GlobalRef,
}

fn proxy_classes(env: &mut JNIEnv<'_>) -> Result<&'static ProxyClasses, PlatformError> {
    static CLASSES: OnceLock<ProxyClasses> = OnceLock::new();
    if let Some(classes) = CLASSES.get() {
        return Ok(classes);
    }
    let classes = load_proxy_classes(env)?;
    Ok(CLASSES.get_or_init(|| classes))
}

fn load_proxy_classes(env: &mut JNIEnv<'_>) -> Result<ProxyClasses, PlatformError> {
    let context = android_context()?;
    let parent = call_object(env, &context, "getClassLoader", "()Ljava/lang/ClassLoader;", &[])?;
    // the loader only reads the buffer, which lives in static memory
    let buffer = unsafe { env.new_direct_byte_buffer(CLASSES_DEX.as_ptr().cast_mut(), CLASSES_DEX.len()) }
        .checked(env)?;
    let loader = env
        .new_object(
            "dalvik/system/InMemoryDexClassLoader",
            "(Ljava/nio/ByteBuffer;Ljava/lang/ClassLoader;)V",
            &[JValue::from(&buffer), JValue::from(&parent)],
        )
        .checked(env)?;

    let gatt = load_class(env, &loader, GATT_PROXY, &gatt_natives())?;
    let scan = load_class(env, &loader, SCAN_PROXY, &scan_natives())?;
    let receiver = load_class(env, &loader, RECEIVER_PROXY, &receiver_natives())?;
    Ok(ProxyClasses {
        gatt,
        scan,
        receiver,
    })
}

fn load_class(
    env: &mut JNIEnv<'_>,
    loader: &JObject<'_>,
    name: &str,
    natives: &[NativeMethod],
) -> Result<GlobalRef, PlatformError> {
    let name = env.new_string(name).checked(env)?;
    let class = call_object(
        env,
        loader,
        "loadClass",
        "(Ljava/lang/String;)Ljava/lang/Class;",
        &[JValue::from(&name)],
    )?;
    let class = JClass::from(class);
    env.register_native_methods(&class, natives).checked(env)?;
    env.new_global_ref(&class).checked(env)
}

fn native(name: &str, sig: &str, fn_ptr: *mut c_void) -> NativeMethod {
    NativeMethod {
        name: name.into(),
        sig: sig.into(),
        fn_ptr,
    }
}

fn new_proxy(
    env: &mut JNIEnv<'_>,
    class: impl FnOnce(&ProxyClasses) -> &GlobalRef,
    handle: i64,
) -> Result<GlobalRef, PlatformError> {
    let classes = proxy_classes(env)?;
    let proxy = env
        .new_object(class(classes), "(J)V", &[JValue::Long(handle)])
        .checked(env)?;
    env.new_global_ref(&proxy).checked(env)
}

/// Creates a `BluetoothGattCallback` proxy for `handle`.
pub(super) fn new_gatt_proxy(env: &mut JNIEnv<'_>, handle: i64) -> Result<GlobalRef, PlatformError> {
    new_proxy(env, |c| &c.gatt, handle)
}

/// Creates a `ScanCallback` proxy for `handle`.
pub(super) fn new_scan_proxy(env: &mut JNIEnv<'_>, handle: i64) -> Result<GlobalRef, PlatformError> {
    new_proxy(env, |c| &c.scan, handle)
}

/// Creates a `BroadcastReceiver` proxy for `handle`.
pub(super) fn new_receiver_proxy(
    env: &mut JNIEnv<'_>,
    handle: i64,
) -> Result<GlobalRef, PlatformError> {
    new_proxy(env, |c| &c.receiver, handle)
}

fn gatt_natives() -> [NativeMethod; 7] {
    [
        native(
            "nativeOnConnectionStateChange",
            "(JII)V",
            gatt_on_connection_state_change as *mut c_void,
        ),
        native(
            "nativeOnServicesDiscovered",
            "(JI)V",
            gatt_on_services_discovered as *mut c_void,
        ),
        native(
            "nativeOnCharacteristicChanged",
            "(JLandroid/bluetooth/BluetoothGattCharacteristic;)V",
            gatt_on_characteristic_changed as *mut c_void,
        ),
        native(
            "nativeOnCharacteristicRead",
            "(JLandroid/bluetooth/BluetoothGattCharacteristic;I)V",
            gatt_on_characteristic_read as *mut c_void,
        ),
        native(
            "nativeOnCharacteristicWrite",
            "(JLandroid/bluetooth/BluetoothGattCharacteristic;I)V",
            gatt_on_characteristic_write as *mut c_void,
        ),
        native(
            "nativeOnDescriptorRead",
            "(JLandroid/bluetooth/BluetoothGattDescriptor;I)V",
            gatt_on_descriptor_read as *mut c_void,
        ),
        native(
            "nativeOnDescriptorWrite",
            "(JLandroid/bluetooth/BluetoothGattDescriptor;I)V",
            gatt_on_descriptor_write as *mut c_void,
        ),
    ]
}

fn scan_natives() -> [NativeMethod; 3] {
    [
        native(
            "nativeOnScanResult",
            "(JILandroid/bluetooth/le/ScanResult;)V",
            scan_on_scan_result as *mut c_void,
        ),
        native(
            "nativeOnBatchScanResults",
            "(J[Landroid/bluetooth/le/ScanResult;)V",
            scan_on_batch_scan_results as *mut c_void,
        ),
        native("nativeOnScanFailed", "(JI)V", scan_on_scan_failed as *mut c_void),
    ]
}

fn receiver_natives() -> [NativeMethod; 1] {
    [native("nativeOnReceive", "(JI)V", receiver_on_receive as *mut c_void)]
}

fn gatt_handler(handle: jlong) -> Option<GattHandler> {
    let handler = GATT_CALLBACKS.get(handle);
    if handler.is_none() {
        debug!("GATT callback for released handle {handle}");
    }
    handler
}

fn with_characteristic(
    env: &mut JNIEnv<'_>,
    handle: jlong,
    characteristic: &JObject<'_>,
    f: impl FnOnce(&GattCallback, &PlatformCharacteristic),
) {
    let Some(handler) = gatt_handler(handle) else {
        return;
    };
    match PlatformCharacteristic::wrap(env, characteristic, &handler.ids) {
        Ok(characteristic) => f(&handler.callback, &characteristic),
        Err(e) => warn!("characteristic callback dropped: {e}"),
    }
}

fn with_descriptor(
    env: &mut JNIEnv<'_>,
    handle: jlong,
    descriptor: &JObject<'_>,
    f: impl FnOnce(&GattCallback, &PlatformDescriptor),
) {
    let Some(handler) = gatt_handler(handle) else {
        return;
    };
    match PlatformDescriptor::wrap(env, descriptor, &handler.ids) {
        Ok(descriptor) => f(&handler.callback, &descriptor),
        Err(e) => warn!("descriptor callback dropped: {e}"),
    }
}

extern "system" fn gatt_on_connection_state_change(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    status: jint,
    new_state: jint,
) {
    if let Some(handler) = gatt_handler(handle) {
        handler
            .callback
            .on_connection_state_change(status, ProfileState::from(new_state));
    }
}

extern "system" fn gatt_on_services_discovered(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    status: jint,
) {
    if let Some(handler) = gatt_handler(handle) {
        handler.callback.on_services_discovered(status);
    }
}

extern "system" fn gatt_on_characteristic_changed(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    characteristic: JObject<'_>,
) {
    with_characteristic(&mut env, handle, &characteristic, |callback, c| {
        callback.on_characteristic_changed(c)
    });
}

extern "system" fn gatt_on_characteristic_read(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    characteristic: JObject<'_>,
    status: jint,
) {
    with_characteristic(&mut env, handle, &characteristic, |callback, c| {
        callback.on_characteristic_read(c, status)
    });
}

extern "system" fn gatt_on_characteristic_write(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    characteristic: JObject<'_>,
    status: jint,
) {
    with_characteristic(&mut env, handle, &characteristic, |callback, c| {
        callback.on_characteristic_write(c, status)
    });
}

extern "system" fn gatt_on_descriptor_read(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    descriptor: JObject<'_>,
    status: jint,
) {
    with_descriptor(&mut env, handle, &descriptor, |callback, d| {
        callback.on_descriptor_read(d, status)
    });
}

extern "system" fn gatt_on_descriptor_write(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    descriptor: JObject<'_>,
    status: jint,
) {
    with_descriptor(&mut env, handle, &descriptor, |callback, d| {
        callback.on_descriptor_write(d, status)
    });
}

extern "system" fn scan_on_scan_result(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    callback_type: jint,
    result: JObject<'_>,
) {
    let Some(session) = SCAN_SESSIONS.get(handle) else {
        return;
    };
    match super::adapter::scan_result(&mut env, &result) {
        Ok(result) => session.callback.on_scan_result(callback_type, result),
        Err(e) => warn!("scan result dropped: {e}"),
    }
}

extern "system" fn scan_on_batch_scan_results(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    results: JObjectArray<'_>,
) {
    let Some(session) = SCAN_SESSIONS.get(handle) else {
        return;
    };
    let converted = (|| -> Result<Vec<ScanResult>, PlatformError> {
        let len = env.get_array_length(&results).checked(&mut env)?;
        let mut converted = Vec::with_capacity(len.max(0) as usize);
        for index in 0..len {
            let result = env.get_object_array_element(&results, index).checked(&mut env)?;
            converted.push(super::adapter::scan_result(&mut env, &result)?);
        }
        Ok(converted)
    })();
    match converted {
        Ok(results) => session.callback.on_batch_scan_results(&results),
        Err(e) => warn!("batch scan results dropped: {e}"),
    }
}

extern "system" fn scan_on_scan_failed(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    error_code: jint,
) {
    if let Some(session) = SCAN_SESSIONS.get(handle) {
        session.callback.on_scan_failed(error_code);
    }
}

extern "system" fn receiver_on_receive(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    state: jint,
) {
    if let Some(registration) = STATE_RECEIVERS.get(handle) {
        registration.receiver.on_receive(state);
    }
}
