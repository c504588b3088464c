//! Auxiliary native bridges used by the launcher UI around a launch.
//!
//! Each function here is the plain-Rust half of a JNI export in
//! [`crate::jni_abi`], so it can be exercised without a VM.

use std::ffi::{CString, c_char, c_int};
use std::sync::atomic::{AtomicI64, Ordering};

use jrebridge_core::argv::ArgumentVector;
use jrebridge_core::config::{DYNAMIC_LINKER_LIBRARY, LIBRARY_PATH_SYMBOLS, MAIN_SYMBOL};
use jrebridge_core::{LaunchError, ResolutionError};
use log::{debug, error};

use crate::error::BridgeError;
use crate::loader::{Library, resolve};
use crate::{errno_abi, trap};

/// `int (*)(JNIEnv *)` exported by libraries that register natives for one class.
pub type RegisterNativesFn = unsafe extern "C" fn(*mut jni::sys::JNIEnv) -> c_int;
/// `void (*)(const char *)` linker namespace path updater.
pub type LibraryPathUpdateFn = unsafe extern "C" fn(*const c_char);
/// `int main(int, char **)`.
pub type MainFn = unsafe extern "C" fn(c_int, *mut *mut c_char) -> c_int;

// ---------------------------------------------------------------------------
// Rendering surface exchange
// ---------------------------------------------------------------------------

static BRIDGE_SURFACE: AtomicI64 = AtomicI64::new(0);

/// Publish the rendering surface handle. Last writer wins.
pub fn set_bridge_surface(handle: i64) {
    BRIDGE_SURFACE.store(handle, Ordering::Relaxed);
}

#[must_use]
pub fn bridge_surface() -> i64 {
    BRIDGE_SURFACE.load(Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Native registration relay
// ---------------------------------------------------------------------------

/// Find `symbol` among loaded global symbols and let it register its natives.
///
/// # Safety
///
/// `env` must be the calling thread's valid `JNIEnv`, and `symbol` must have
/// the [`RegisterNativesFn`] signature.
pub unsafe fn register_natives(
    symbol: &str,
    env: *mut jni::sys::JNIEnv,
) -> Result<i32, ResolutionError> {
    // SAFETY: forwarded caller contract on the signature.
    let entry = unsafe { resolve::<RegisterNativesFn>(Library::process(), symbol) }
        .inspect_err(|err| {
            error!(target: "jrebridge", symbol = symbol, details = err.diagnostic(); "dlsym failed");
        })?;
    // SAFETY: forwarded caller contract on `env`.
    let status = unsafe { (entry.function())(env) };
    debug!(target: "jrebridge", symbol = symbol, exit_code = status; "natives registered");
    Ok(status)
}

// ---------------------------------------------------------------------------
// Library search path
// ---------------------------------------------------------------------------

/// Push `path` into the dynamic linker's search path.
pub fn update_library_path(path: &str) -> Result<(), ResolutionError> {
    let c_path = CString::new(path).map_err(|_| ResolutionError::InvalidName {
        name: path.to_string(),
    })?;
    let libdl = Library::open(DYNAMIC_LINKER_LIBRARY, libc::RTLD_LAZY)
        .inspect_err(|err| error!(target: "jrebridge", "dlopen libdl.so failed: {err}"))?;

    let updater = find_path_updater(&libdl);
    if let Ok(update) = updater {
        // SAFETY: the updater copies the NUL-terminated path before returning.
        unsafe { update(c_path.as_ptr()) };
        debug!(target: "jrebridge", "linker search path set to {path}");
    }
    libdl.close();
    updater.map(|_| ())
}

fn find_path_updater(libdl: &Library) -> Result<LibraryPathUpdateFn, ResolutionError> {
    let [primary, fallback] = LIBRARY_PATH_SYMBOLS;
    // SAFETY: both exports share the LibraryPathUpdateFn signature.
    unsafe { libdl.function::<LibraryPathUpdateFn>(primary) }
        .or_else(|_| unsafe { libdl.function::<LibraryPathUpdateFn>(fallback) })
        .inspect_err(|err| {
            error!(
                target: "jrebridge",
                symbol = primary, details = err.diagnostic();
                "Error getting linker path updater"
            );
        })
}

// ---------------------------------------------------------------------------
// Library probe / working directory
// ---------------------------------------------------------------------------

/// Load `name` with global visibility. A library that exports the runtime's
/// fault handler also arms the trap relay's delegation.
pub fn probe_library(name: &str) -> bool {
    match Library::open_launcher(name) {
        Ok(library) => {
            trap::attach_from(&library);
            true
        }
        Err(err) => {
            error!(target: "jrebridge", "dlopen {name} failed: {err}");
            false
        }
    }
}

/// `chdir(2)`; returns the OS status code.
#[must_use]
pub fn change_directory(path: &str) -> i32 {
    let Ok(c_path) = CString::new(path) else {
        return -1;
    };
    // SAFETY: NUL-terminated path valid for the call.
    let rc = unsafe { libc::chdir(c_path.as_ptr()) };
    if rc != 0 {
        debug!(target: "jrebridge", errno = errno_abi::errno(), details = path; "chdir failed");
    }
    rc
}

// ---------------------------------------------------------------------------
// In-process executable
// ---------------------------------------------------------------------------

/// Load the executable at `args[0]` as a library and run its `main` with `args`.
///
/// The executable stays loaded afterwards.
pub fn execute_binary(args: &[String]) -> Result<i32, BridgeError> {
    let path = args.first().ok_or(LaunchError::EmptyArguments)?;
    let binary = Library::open(path, libc::RTLD_LAZY)?;
    // SAFETY: `main` of a C executable has the MainFn signature.
    let main = unsafe { binary.function::<MainFn>(MAIN_SYMBOL) }?;
    let mut argv = ArgumentVector::build(args)?;
    // SAFETY: argv is a valid, null-terminated vector for the call.
    let status = unsafe { main(argv.argc(), argv.as_mut_ptr()) };
    debug!(target: "jrebridge", symbol = MAIN_SYMBOL, exit_code = status; "{path} returned");
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_is_last_writer_wins() {
        set_bridge_surface(0x7f00_1000);
        set_bridge_surface(0x7f00_2000);
        assert_eq!(bridge_surface(), 0x7f00_2000);
        set_bridge_surface(0);
        assert_eq!(bridge_surface(), 0);
    }

    #[test]
    fn execute_binary_requires_a_program() {
        let err = execute_binary(&[]).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Launch(LaunchError::EmptyArguments)
        ));
    }

    #[test]
    fn interior_nul_path_fails_cleanly() {
        assert_eq!(change_directory("/tmp\0/x"), -1);
        assert!(matches!(
            update_library_path("/data\0/lib"),
            Err(ResolutionError::InvalidName { .. })
        ));
    }
}
