#![cfg(all(target_os = "linux", target_env = "gnu"))]

use std::sync::atomic::{AtomicBool, Ordering};

use jrebridge::bridge::{
    change_directory, execute_binary, probe_library, register_natives, update_library_path,
};
use jrebridge::{BridgeError, trap};
use jrebridge_core::ResolutionError;

static TEST_GUARD_HELD: AtomicBool = AtomicBool::new(false);

struct TestGuard;

impl Drop for TestGuard {
    fn drop(&mut self) {
        TEST_GUARD_HELD.store(false, Ordering::Release);
    }
}

fn acquire_test_guard() -> TestGuard {
    loop {
        if TEST_GUARD_HELD
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            return TestGuard;
        }
        std::thread::yield_now();
    }
}

#[test]
fn probe_reports_loadable_and_missing_libraries() {
    assert!(probe_library("libc.so.6"));
    assert!(!probe_library("libjrebridge-missing-runtime.so"));
}

#[test]
fn probe_without_fault_handler_leaves_relay_unarmed() {
    assert!(probe_library("libm.so.6"));
    assert!(trap::target_handler().is_none());
}

#[test]
fn change_directory_returns_os_status() {
    let _guard = acquire_test_guard();
    let original = std::env::current_dir().unwrap();
    let target = std::env::temp_dir().canonicalize().unwrap();

    assert_eq!(change_directory(target.to_str().unwrap()), 0);
    assert_eq!(std::env::current_dir().unwrap(), target);
    assert_eq!(change_directory("/nonexistent/jrebridge/dir"), -1);
    assert_eq!(std::env::current_dir().unwrap(), target);

    assert_eq!(change_directory(original.to_str().unwrap()), 0);
}

#[test]
fn register_natives_with_unknown_symbol_is_an_error() {
    // SAFETY: the symbol does not exist, so the env pointer is never used.
    let result =
        unsafe { register_natives("JNI_OnLoad_jrebridge_missing", std::ptr::null_mut()) };
    assert!(matches!(
        result,
        Err(ResolutionError::SymbolNotFound { ref symbol, .. }) if symbol == "JNI_OnLoad_jrebridge_missing"
    ));
}

#[test]
fn library_path_update_needs_the_android_linker() {
    // glibc's libdl has neither updater export.
    match update_library_path("/data/app/lib") {
        Err(ResolutionError::LibraryNotFound { .. } | ResolutionError::SymbolNotFound { .. }) => {}
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn execute_binary_reports_unloadable_program() {
    let args = vec!["/nonexistent/bin/tool".to_string(), "--help".to_string()];
    let err = execute_binary(&args).unwrap_err();
    match &err {
        BridgeError::Resolution(ResolutionError::LibraryNotFound { library, .. }) => {
            assert_eq!(library, "/nonexistent/bin/tool");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.status(), -1);
}
