//! Bridge configuration.
//!
//! Two kinds of settings live here:
//! - compile-time names of the libraries and symbols the bridge reaches for,
//! - deployment overrides read once from the environment:
//!   - `JREBRIDGE_JLI_LIBRARY`: launcher library (default `libjli.so`).
//!   - `JREBRIDGE_JVM_LIBRARY`: library exporting the fault handler
//!     (default `libjvm.so`; `none`, `off` or empty disables the lookup).
//!   - `JREBRIDGE_LOG`: `trace|debug|info|warn|error|off` (default `info`).
//!   - `JREBRIDGE_LOG_PATH`: write log records to this file.
//!
//! Launch flags and version strings are not configurable; see [`crate::launch`].

use std::path::PathBuf;
use std::sync::OnceLock;

use crate::structured_log::LogLevel;

/// Launcher library exporting [`LAUNCH_SYMBOL`].
pub const DEFAULT_LAUNCHER_LIBRARY: &str = "libjli.so";
/// Runtime library exporting [`FAULT_SYMBOL`].
pub const DEFAULT_FAULT_LIBRARY: &str = "libjvm.so";
/// Launch entry point.
pub const LAUNCH_SYMBOL: &str = "JLI_Launch";
/// Optional fault-interpretation entry point.
pub const FAULT_SYMBOL: &str = "JVM_handle_linux_signal";
/// Library that hosts the linker namespace path updater.
pub const DYNAMIC_LINKER_LIBRARY: &str = "libdl.so";
/// Library-path updater symbols, in lookup order.
pub const LIBRARY_PATH_SYMBOLS: [&str; 2] = [
    "android_update_LD_LIBRARY_PATH",
    "__loader_android_update_LD_LIBRARY_PATH",
];
/// Entry point looked up by `execute_binary`.
pub const MAIN_SYMBOL: &str = "main";

pub const ENV_LAUNCHER_LIBRARY: &str = "JREBRIDGE_JLI_LIBRARY";
pub const ENV_FAULT_LIBRARY: &str = "JREBRIDGE_JVM_LIBRARY";
pub const ENV_LOG_LEVEL: &str = "JREBRIDGE_LOG";
pub const ENV_LOG_PATH: &str = "JREBRIDGE_LOG_PATH";

/// Deployment configuration for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub launcher_library: String,
    pub fault_library: Option<String>,
    pub log_level: LogLevel,
    pub log_path: Option<PathBuf>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            launcher_library: DEFAULT_LAUNCHER_LIBRARY.to_string(),
            fault_library: Some(DEFAULT_FAULT_LIBRARY.to_string()),
            log_level: LogLevel::Info,
            log_path: None,
        }
    }
}

impl BridgeConfig {
    /// Read the configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(lib) = lookup(ENV_LAUNCHER_LIBRARY).filter(|v| !v.trim().is_empty()) {
            config.launcher_library = lib.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_FAULT_LIBRARY) {
            config.fault_library = parse_optional_library(&raw);
        }
        if let Some(raw) = lookup(ENV_LOG_LEVEL) {
            config.log_level = LogLevel::from_str_loose(&raw);
        }
        config.log_path = lookup(ENV_LOG_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        config
    }
}

fn parse_optional_library(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "" | "none" | "off" | "disabled" => None,
        _ => Some(trimmed.to_string()),
    }
}

static CONFIG: OnceLock<BridgeConfig> = OnceLock::new();

/// Process-wide configuration, read from the environment on first use.
#[must_use]
pub fn config() -> &'static BridgeConfig {
    CONFIG.get_or_init(BridgeConfig::from_env)
}
