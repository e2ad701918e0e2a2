//! Implementations of the [`wrappers`](crate::wrappers) traits over `android.bluetooth`.
//!
//! The Java VM and the application context are taken from [`ndk_context`], which the
//! application glue must have initialized. Platform callbacks reach Rust through the
//! proxy classes in `java/`, compiled into a dex file by the build script and loaded
//! at runtime with an `InMemoryDexClassLoader`.
//!
//! Start from [`PlatformAdapter::default_adapter`]; devices come from scan results
//! or from [`PlatformAdapter::remote_device`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use async_lock::Mutex;
use jni::objects::{GlobalRef, JByteArray, JObject, JString, JValue};
use jni::{JNIEnv, JavaVM};
use log::warn;
use uuid::Uuid;

use crate::error::PlatformError;
use crate::types::PlatformId;

mod adapter;
mod callback;
mod device;
mod gatt;

pub use adapter::{PlatformAdapter, PlatformScanner};
pub use device::PlatformDevice;
pub use gatt::{PlatformCharacteristic, PlatformDescriptor, PlatformGatt, PlatformService};

impl From<jni::errors::Error> for PlatformError {
    fn from(err: jni::errors::Error) -> Self {
        PlatformError::Java(err.to_string())
    }
}

fn java_vm() -> Result<&'static JavaVM, PlatformError> {
    static VM: OnceLock<JavaVM> = OnceLock::new();
    if let Some(vm) = VM.get() {
        return Ok(vm);
    }
    let ptr = ndk_context::android_context().vm();
    if ptr.is_null() {
        return Err(PlatformError::NullResult);
    }
    let vm = unsafe { JavaVM::from_raw(ptr.cast()) }?;
    Ok(VM.get_or_init(|| vm))
}

/// Runs `f` on the current thread's `JNIEnv` inside a fresh local reference frame.
///
/// The thread is attached to the VM permanently if it isn't already.
pub(crate) fn jni_with_env<T>(
    f: impl FnOnce(&mut JNIEnv<'_>) -> Result<T, PlatformError>,
) -> Result<T, PlatformError> {
    let mut env = java_vm()?.attach_current_thread_permanently()?;
    env.with_local_frame(32, |env| f(env))
}

/// Borrows the application context; the reference is owned by the glue code.
fn android_context() -> Result<JObject<'static>, PlatformError> {
    let ptr = ndk_context::android_context().context();
    if ptr.is_null() {
        return Err(PlatformError::NullResult);
    }
    Ok(unsafe { JObject::from_raw(ptr.cast()) })
}

/// Clears the pending exception and converts it.
fn take_exception(env: &mut JNIEnv<'_>) -> PlatformError {
    let Ok(throwable) = env.exception_occurred() else {
        return PlatformError::Java("exception could not be retrieved".into());
    };
    if let Err(e) = env.exception_clear() {
        return PlatformError::Java(e.to_string());
    }
    let message = env
        .call_method(&throwable, "toString", "()Ljava/lang/String;", &[])
        .and_then(|v| v.l())
        .ok()
        .and_then(|s| string(env, s).ok().flatten())
        .unwrap_or_default();
    let is = |env: &mut JNIEnv<'_>, class: &str| {
        env.is_instance_of(&throwable, class).unwrap_or(false)
    };
    if is(env, "java/lang/IllegalArgumentException") {
        PlatformError::IllegalArgument(message)
    } else if is(env, "java/lang/IllegalStateException") {
        PlatformError::IllegalState(message)
    } else if is(env, "java/lang/SecurityException") {
        PlatformError::Security(message)
    } else {
        PlatformError::Java(message)
    }
}

pub(crate) trait JniResultExt<T> {
    /// Converts a failed JNI call, clearing and classifying a thrown exception.
    fn checked(self, env: &mut JNIEnv<'_>) -> Result<T, PlatformError>;
}

impl<T> JniResultExt<T> for jni::errors::Result<T> {
    fn checked(self, env: &mut JNIEnv<'_>) -> Result<T, PlatformError> {
        self.map_err(|e| match e {
            jni::errors::Error::JavaException => take_exception(env),
            e => e.into(),
        })
    }
}

/// Logs a failed query and falls back to the default value.
pub(crate) fn logged<T: Default>(query: &str, result: Result<T, PlatformError>) -> T {
    result.unwrap_or_else(|e| {
        warn!("{query} failed: {e}");
        T::default()
    })
}

pub(crate) fn call_object<'local>(
    env: &mut JNIEnv<'local>,
    obj: &JObject<'_>,
    name: &str,
    sig: &str,
    args: &[JValue<'_, '_>],
) -> Result<JObject<'local>, PlatformError> {
    env.call_method(obj, name, sig, args)
        .and_then(|v| v.l())
        .checked(env)
}

pub(crate) fn call_bool(
    env: &mut JNIEnv<'_>,
    obj: &JObject<'_>,
    name: &str,
    sig: &str,
    args: &[JValue<'_, '_>],
) -> Result<bool, PlatformError> {
    env.call_method(obj, name, sig, args)
        .and_then(|v| v.z())
        .checked(env)
}

pub(crate) fn call_int(
    env: &mut JNIEnv<'_>,
    obj: &JObject<'_>,
    name: &str,
    sig: &str,
    args: &[JValue<'_, '_>],
) -> Result<i32, PlatformError> {
    env.call_method(obj, name, sig, args)
        .and_then(|v| v.i())
        .checked(env)
}

pub(crate) fn call_void(
    env: &mut JNIEnv<'_>,
    obj: &JObject<'_>,
    name: &str,
    sig: &str,
    args: &[JValue<'_, '_>],
) -> Result<(), PlatformError> {
    env.call_method(obj, name, sig, args)
        .and_then(|v| v.v())
        .checked(env)
}

/// Reads a nullable `java.lang.String`.
pub(crate) fn string(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> Result<Option<String>, PlatformError> {
    if obj.is_null() {
        return Ok(None);
    }
    let obj = JString::from(obj);
    let s = env.get_string(&obj).checked(env)?;
    Ok(Some(s.into()))
}

/// Reads a nullable `byte[]`; `null` reads as empty.
pub(crate) fn bytes(env: &mut JNIEnv<'_>, obj: JObject<'_>) -> Result<Vec<u8>, PlatformError> {
    if obj.is_null() {
        return Ok(Vec::new());
    }
    env.convert_byte_array(JByteArray::from(obj)).checked(env)
}

/// Parses a `java.util.UUID` through its canonical string form.
pub(crate) fn uuid(env: &mut JNIEnv<'_>, obj: &JObject<'_>) -> Result<Uuid, PlatformError> {
    let s = call_object(env, obj, "toString", "()Ljava/lang/String;", &[])?;
    let s = string(env, s)?.ok_or(PlatformError::NullResult)?;
    Uuid::parse_str(&s).map_err(|e| PlatformError::Java(format!("bad UUID {s}: {e}")))
}

pub(crate) fn java_uuid<'local>(
    env: &mut JNIEnv<'local>,
    uuid: Uuid,
) -> Result<JObject<'local>, PlatformError> {
    let s = env.new_string(uuid.to_string()).checked(env)?;
    env.call_static_method(
        "java/util/UUID",
        "fromString",
        "(Ljava/lang/String;)Ljava/util/UUID;",
        &[JValue::from(&s)],
    )
    .and_then(|v| v.l())
    .checked(env)
}

/// Visits the elements of a nullable `java.util.List`.
pub(crate) fn for_each_in_list(
    env: &mut JNIEnv<'_>,
    list: &JObject<'_>,
    mut f: impl FnMut(&mut JNIEnv<'_>, JObject<'_>) -> Result<(), PlatformError>,
) -> Result<(), PlatformError> {
    if list.is_null() {
        return Ok(());
    }
    let size = call_int(env, list, "size", "()I", &[])?;
    for index in 0..size {
        let item = call_object(env, list, "get", "(I)Ljava/lang/Object;", &[JValue::Int(index)])?;
        f(env, item)?;
    }
    Ok(())
}

fn next_platform_id() -> PlatformId {
    static NEXT: AtomicU64 = AtomicU64::new(1);
    PlatformId(NEXT.fetch_add(1, Ordering::Relaxed))
}

/// Identities of the Java characteristic and descriptor objects of one connection.
///
/// The platform hands the same objects to callbacks that `getServices` returned, so
/// object identity is what ties a callback to its bridge entry.
#[derive(Default)]
pub(crate) struct ObjectIds {
    known: Mutex<Vec<(GlobalRef, PlatformId)>>,
}

impl ObjectIds {
    pub(crate) fn id_of(
        &self,
        env: &mut JNIEnv<'_>,
        obj: &JObject<'_>,
    ) -> Result<(PlatformId, GlobalRef), PlatformError> {
        let mut known = self.known.lock_blocking();
        for (global, id) in known.iter() {
            if env.is_same_object(global, obj).checked(env)? {
                return Ok((*id, global.clone()));
            }
        }
        let global = env.new_global_ref(obj).checked(env)?;
        let id = next_platform_id();
        known.push((global.clone(), id));
        Ok((id, global))
    }

    pub(crate) fn object(&self, id: PlatformId) -> Option<GlobalRef> {
        self.known
            .lock_blocking()
            .iter()
            .find(|(_, known)| *known == id)
            .map(|(global, _)| global.clone())
    }
}
