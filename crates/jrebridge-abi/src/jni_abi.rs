//! JNI exports consumed by the launcher's Java classes.
//!
//! Symbol names are fixed by the Java package and class that declare the
//! `native` methods; the version script keeps only `Java_*` exported.

use jni::JNIEnv;
use jni::objects::{JClass, JObjectArray, JString};
use jni::sys::{JNI_FALSE, JNI_TRUE, jboolean, jint, jlong};
use log::error;

use crate::bridge;
use crate::error::BridgeError;
use crate::launch::{self, LOG_TARGET};
use crate::logging;
use jrebridge_core::LaunchError;

const UNSATISFIED_LINK_ERROR: &str = "java/lang/UnsatisfiedLinkError";

/// Copy a `String[]` out of the VM, one `read` per element. A null array
/// reads as empty.
fn read_array<T>(
    env: &mut JNIEnv<'_>,
    array: &JObjectArray<'_>,
    read: impl Fn(&mut JNIEnv<'_>, &JString<'_>) -> Result<T, BridgeError>,
) -> Result<Vec<T>, BridgeError> {
    if array.is_null() {
        return Ok(Vec::new());
    }
    let len = env.get_array_length(array)?;
    let mut out = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    for index in 0..len {
        let element = JString::from(env.get_object_array_element(array, index)?);
        let value = read(&mut *env, &element)?;
        env.delete_local_ref(element)?;
        out.push(value);
    }
    Ok(out)
}

fn read_string(env: &mut JNIEnv<'_>, value: &JString<'_>) -> Result<String, BridgeError> {
    Ok(env.get_string(value)?.into())
}

/// The string's modified UTF-8 bytes as the VM hands them out. U+0000 stays
/// the two-byte `C0 80` form instead of decoding to a NUL.
fn read_modified_utf8(env: &mut JNIEnv<'_>, value: &JString<'_>) -> Result<Vec<u8>, BridgeError> {
    Ok(env.get_string(value)?.to_bytes().to_vec())
}

/// `int VMLauncher.launchJVM(String[] args)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_oracle_dalvik_VMLauncher_launchJVM<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    args: JObjectArray<'local>,
) -> jint {
    logging::init();
    if args.is_null() {
        error!(target: LOG_TARGET, "Args array null, returning");
        return LaunchError::EmptyArguments.status();
    }
    let args = match read_array(&mut env, &args, read_modified_utf8) {
        Ok(args) => args,
        Err(err) => {
            error!(target: LOG_TARGET, "reading args failed: {err}");
            return err.status();
        }
    };
    launch::launch(&args).unwrap_or_else(|err| err.status())
}

/// `void JREUtils.setupBridgeSurfaceAWT(long surface)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_net_kdt_pojavlaunch_utils_JREUtils_setupBridgeSurfaceAWT<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
    surface: jlong,
) {
    bridge::set_bridge_surface(surface);
}

/// `long Surface.nativeGetBridgeSurfaceAWT()`
#[unsafe(no_mangle)]
pub extern "system" fn Java_android_view_Surface_nativeGetBridgeSurfaceAWT<'local>(
    _env: JNIEnv<'local>,
    _class: JClass<'local>,
) -> jlong {
    bridge::bridge_surface()
}

/// `int OpenJDKNativeRegister.nativeRegisterNatives(String symbol)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_android_os_OpenJDKNativeRegister_nativeRegisterNatives<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    register_symbol: JString<'local>,
) -> jint {
    logging::init();
    let symbol = match read_string(&mut env, &register_symbol) {
        Ok(symbol) => symbol,
        Err(err) => return err.status(),
    };
    // SAFETY: `env` is this thread's live JNIEnv; registration entry points
    // take exactly a JNIEnv pointer.
    unsafe { bridge::register_natives(&symbol, env.get_raw()) }.unwrap_or(-1)
}

/// `void JREUtils.setLdLibraryPath(String path)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_net_kdt_pojavlaunch_utils_JREUtils_setLdLibraryPath<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    library_path: JString<'local>,
) {
    logging::init();
    if let Ok(path) = read_string(&mut env, &library_path) {
        // Failures are logged by the bridge; Java sees no exception.
        let _ = bridge::update_library_path(&path);
    }
}

/// `boolean JREUtils.dlopen(String name)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_net_kdt_pojavlaunch_utils_JREUtils_dlopen<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    name: JString<'local>,
) -> jboolean {
    logging::init();
    match read_string(&mut env, &name) {
        Ok(name) if bridge::probe_library(&name) => JNI_TRUE,
        _ => JNI_FALSE,
    }
}

/// `int JREUtils.chdir(String path)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_net_kdt_pojavlaunch_utils_JREUtils_chdir<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    path: JString<'local>,
) -> jint {
    match read_string(&mut env, &path) {
        Ok(path) => bridge::change_directory(&path),
        Err(err) => err.status(),
    }
}

/// `int JREUtils.executeBinary(String[] args)`
#[unsafe(no_mangle)]
pub extern "system" fn Java_net_kdt_pojavlaunch_utils_JREUtils_executeBinary<'local>(
    mut env: JNIEnv<'local>,
    _class: JClass<'local>,
    args: JObjectArray<'local>,
) -> jint {
    logging::init();
    let result = read_array(&mut env, &args, read_string).and_then(|args| bridge::execute_binary(&args));
    match result {
        Ok(status) => status,
        Err(BridgeError::Resolution(err)) => {
            error!(target: "jrebridge", "Error: {err}");
            // A failed throw leaves a pending exception of its own.
            let _ = env.throw_new(UNSATISFIED_LINK_ERROR, err.diagnostic());
            -1
        }
        Err(err) => {
            error!(target: "jrebridge", "Error: {err}");
            err.status()
        }
    }
}
