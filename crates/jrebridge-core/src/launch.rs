//! Static launch profile passed to every `JLI_Launch` call.

use std::ffi::CStr;

/// Full version string reported to the launcher.
pub const FULL_VERSION: &CStr = c"1.8.0-internal";
/// Dot version string reported to the launcher.
pub const DOT_VERSION: &CStr = c"1.8";

/// Ergonomics class policy understood by the launcher.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErgoPolicy {
    #[default]
    Default = 0,
    NeverServerClass = 1,
    AlwaysServerClass = 2,
}

impl ErgoPolicy {
    #[must_use]
    pub const fn as_raw(self) -> i32 {
        self as i32
    }
}

/// Fixed arguments surrounding the caller's argv in a launch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchProfile {
    pub full_version: &'static CStr,
    pub dot_version: &'static CStr,
    /// Whether auxiliary `JAVA_ARGS` are supplied. They never are.
    pub java_args: bool,
    pub classpath_wildcard: bool,
    /// Windows-only `javaw` mode.
    pub javaw: bool,
    pub ergonomics: ErgoPolicy,
}

/// The only profile the bridge launches with.
pub const DEFAULT_PROFILE: LaunchProfile = LaunchProfile {
    full_version: FULL_VERSION,
    dot_version: DOT_VERSION,
    java_args: false,
    classpath_wildcard: true,
    javaw: false,
    ergonomics: ErgoPolicy::Default,
};

impl Default for LaunchProfile {
    fn default() -> Self {
        DEFAULT_PROFILE
    }
}
