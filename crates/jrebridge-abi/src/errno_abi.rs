//! Access to the host C library's thread-local errno.
//!
//! Only async-signal-safe operations here: the trap relay uses [`ErrnoGuard`]
//! from inside a signal handler.

use std::ffi::c_int;

#[inline]
fn errno_location() -> *mut c_int {
    #[cfg(target_os = "android")]
    // SAFETY: bionic returns the calling thread's errno slot.
    let p = unsafe { libc::__errno() };
    #[cfg(any(target_os = "macos", target_os = "ios"))]
    // SAFETY: libSystem returns the calling thread's errno slot.
    let p = unsafe { libc::__error() };
    #[cfg(not(any(target_os = "android", target_os = "macos", target_os = "ios")))]
    // SAFETY: glibc/musl return the calling thread's errno slot.
    let p = unsafe { libc::__errno_location() };
    p
}

/// Current thread's errno.
#[inline]
#[must_use]
pub fn errno() -> c_int {
    // SAFETY: errno pointer is valid for reads on this thread.
    unsafe { *errno_location() }
}

#[inline]
pub fn set_errno(val: c_int) {
    // SAFETY: errno pointer is valid for writes on this thread.
    unsafe { *errno_location() = val };
}

/// Restores the errno observed at construction when dropped.
pub struct ErrnoGuard {
    saved: c_int,
}

impl ErrnoGuard {
    #[inline]
    #[must_use]
    pub fn save() -> Self {
        Self { saved: errno() }
    }

    #[inline]
    #[must_use]
    pub fn saved(&self) -> c_int {
        self.saved
    }
}

impl Drop for ErrnoGuard {
    #[inline]
    fn drop(&mut self) {
        set_errno(self.saved);
    }
}
