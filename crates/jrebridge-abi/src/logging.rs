//! Logger installation for the shared library.
//!
//! Records go to `JREBRIDGE_LOG_PATH` when set, otherwise to the platform
//! sink: logcat on Android, stderr elsewhere.

use std::sync::Once;

use jrebridge_core::config::config;
use jrebridge_core::structured_log::{self, LogEmitter};

static INIT: Once = Once::new();

/// Install the bridge logger once per process. Never fails the caller: if a
/// host already registered a `log` implementation, that one stays.
pub fn init() {
    INIT.call_once(|| {
        let config = config();
        let emitter = match &config.log_path {
            Some(path) => LogEmitter::to_file(path).unwrap_or_else(|_| platform_emitter()),
            None => platform_emitter(),
        };
        structured_log::install(config.log_level, emitter);
    });
}

#[cfg(target_os = "android")]
fn platform_emitter() -> LogEmitter {
    LogEmitter::to_writer(logcat::LogcatWriter::default())
}

#[cfg(not(target_os = "android"))]
fn platform_emitter() -> LogEmitter {
    LogEmitter::to_stderr()
}

#[cfg(target_os = "android")]
mod logcat {
    use std::ffi::{CString, c_char, c_int};
    use std::io::Write;

    const ANDROID_LOG_INFO: c_int = 4;
    const TAG: &std::ffi::CStr = c"jrebridge";

    #[link(name = "log")]
    unsafe extern "C" {
        fn __android_log_write(prio: c_int, tag: *const c_char, text: *const c_char) -> c_int;
    }

    /// Forwards each complete line to `__android_log_write`.
    #[derive(Default)]
    pub(super) struct LogcatWriter {
        line: Vec<u8>,
    }

    impl LogcatWriter {
        fn emit_line(&mut self) {
            let mut line = std::mem::take(&mut self.line);
            line.retain(|&b| b != 0);
            if let Ok(text) = CString::new(line) {
                // SAFETY: both strings are NUL-terminated and outlive the call.
                unsafe { __android_log_write(ANDROID_LOG_INFO, TAG.as_ptr(), text.as_ptr()) };
            }
        }
    }

    impl Write for LogcatWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            for &byte in buf {
                if byte == b'\n' {
                    self.emit_line();
                } else {
                    self.line.push(byte);
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.line.is_empty() {
                self.emit_line();
            }
            Ok(())
        }
    }
}
