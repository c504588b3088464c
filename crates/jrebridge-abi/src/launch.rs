//! Launch coordinator: relay, resolve, marshal, invoke, release.

use std::ffi::{c_char, c_int};
use std::ptr;

use jni::sys::{JNI_FALSE, JNI_TRUE, jboolean, jint};
use jrebridge_core::argv::{ArgAllocator, ArgumentVector, HeapAllocator};
use jrebridge_core::config::{self, BridgeConfig, LAUNCH_SYMBOL};
use jrebridge_core::launch::DEFAULT_PROFILE;
use jrebridge_core::{LaunchError, ResolutionError};
use log::{debug, error};

use crate::loader::{Library, resolve};
use crate::trap::{self, TargetFaultHandler};

/// Log target shared with the Java side's tag.
pub const LOG_TARGET: &str = "VMLauncher";

/// `JLI_Launch` from the JDK launcher library.
pub type JliLaunchFn = unsafe extern "C" fn(
    argc: c_int,
    argv: *mut *mut c_char,
    jargc: c_int,
    jargv: *const *const c_char,
    appclassc: c_int,
    appclassv: *const *const c_char,
    fullversion: *const c_char,
    dotversion: *const c_char,
    pname: *const c_char,
    lname: *const c_char,
    javaargs: jboolean,
    cpwildcard: jboolean,
    javaw: jboolean,
    ergo: jint,
) -> jint;

/// Where the coordinator gets its entry points from.
pub trait EntryResolver {
    /// The runtime's launch entry point.
    fn launch_entry(&self) -> Result<JliLaunchFn, ResolutionError>;

    /// The runtime's fault handler, if it exports one.
    fn fault_handler(&self) -> Option<TargetFaultHandler> {
        None
    }
}

/// Resolves entry points from shared libraries at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicResolver {
    launcher_library: String,
    fault_library: Option<String>,
}

impl DynamicResolver {
    #[must_use]
    pub fn new(launcher_library: impl Into<String>, fault_library: Option<String>) -> Self {
        Self {
            launcher_library: launcher_library.into(),
            fault_library,
        }
    }

    #[must_use]
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self::new(
            config.launcher_library.clone(),
            config.fault_library.clone(),
        )
    }
}

impl Default for DynamicResolver {
    fn default() -> Self {
        Self::from_config(config::config())
    }
}

impl EntryResolver for DynamicResolver {
    fn launch_entry(&self) -> Result<JliLaunchFn, ResolutionError> {
        let library = Library::open_launcher(&self.launcher_library).inspect_err(|err| {
            error!(target: LOG_TARGET, details = err.diagnostic(); "JLI lib = NULL");
        })?;
        // SAFETY: JLI_Launch has had this signature since JDK 7.
        let entry = unsafe { resolve::<JliLaunchFn>(library, LAUNCH_SYMBOL) }.inspect_err(|err| {
            error!(
                target: LOG_TARGET,
                symbol = LAUNCH_SYMBOL, details = err.diagnostic();
                "JLI_Launch = NULL"
            );
        })?;
        Ok(entry.function())
    }

    fn fault_handler(&self) -> Option<TargetFaultHandler> {
        let name = self.fault_library.as_deref()?;
        let library = Library::open_launcher(name)
            .inspect_err(|err| debug!(target: LOG_TARGET, "JVM lib = NULL: {err}"))
            .ok()?;
        trap::resolve_target(&library)
            .inspect_err(|err| debug!(target: LOG_TARGET, "{err}"))
            .ok()
    }
}

/// Per-launcher switches. Versions and launch flags are not among them: every
/// launch uses [`DEFAULT_PROFILE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Install the trap relay (and attach the fault handler) before launching.
    pub install_trap_relay: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            install_trap_relay: true,
        }
    }
}

/// Drives one launch of the embedded runtime at a time on the calling thread.
#[derive(Debug)]
pub struct Launcher<R> {
    resolver: R,
    options: LaunchOptions,
}

impl<R: EntryResolver> Launcher<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            options: LaunchOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: LaunchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Run the runtime with `args` (`args[0]` is the program name) and return
    /// its exit status. Blocks until the runtime shuts down.
    pub fn launch<S: AsRef<[u8]>>(&self, args: &[S]) -> Result<i32, LaunchError> {
        self.launch_with(args, &mut HeapAllocator)
    }

    /// As [`Launcher::launch`], taking argument buffers from `allocator`.
    pub fn launch_with<S, A>(&self, args: &[S], allocator: &mut A) -> Result<i32, LaunchError>
    where
        S: AsRef<[u8]>,
        A: ArgAllocator + ?Sized,
    {
        if args.is_empty() {
            error!(target: LOG_TARGET, "Args array empty, returning");
            return Err(LaunchError::EmptyArguments);
        }

        if self.options.install_trap_relay {
            self.prepare_trap_relay();
        }

        let entry = self.resolver.launch_entry()?;

        let mut argv = ArgumentVector::build_with(args, allocator)
            .inspect_err(|err| error!(target: LOG_TARGET, "{err}"))?;
        debug!(target: LOG_TARGET, "Done processing args");

        // SAFETY: `entry` was resolved as JLI_Launch; argv outlives the call.
        let status = unsafe { invoke(entry, &mut argv) };
        debug!(target: LOG_TARGET, symbol = LAUNCH_SYMBOL, exit_code = status; "JLI_Launch returned");

        debug!(target: LOG_TARGET, "Going to free args");
        drop(argv);
        debug!(target: LOG_TARGET, "Free done");

        Ok(status)
    }

    fn prepare_trap_relay(&self) {
        trap::install();
        if trap::target_handler().is_none() {
            if let Some(handler) = self.resolver.fault_handler() {
                trap::attach_target(handler);
            }
        }
    }
}

/// Launch with the process-wide configuration.
pub fn launch<S: AsRef<[u8]>>(args: &[S]) -> Result<i32, LaunchError> {
    Launcher::new(DynamicResolver::default()).launch(args)
}

#[inline]
fn jbool(value: bool) -> jboolean {
    if value { JNI_TRUE } else { JNI_FALSE }
}

/// # Safety
///
/// `entry` must be a `JLI_Launch`-compatible function.
unsafe fn invoke(entry: JliLaunchFn, argv: &mut ArgumentVector) -> i32 {
    let profile = &DEFAULT_PROFILE;
    let argc = argv.argc();
    let program = argv.program_name().as_ptr();
    let argv_ptr = argv.as_mut_ptr();
    // SAFETY: every pointer stays valid for the duration of the call; the
    // auxiliary lists are empty so their null bases are never read.
    unsafe {
        entry(
            argc,
            argv_ptr,
            0,
            ptr::null(),
            0,
            ptr::null(),
            profile.full_version.as_ptr(),
            profile.dot_version.as_ptr(),
            program,
            program,
            jbool(profile.java_args),
            jbool(profile.classpath_wildcard),
            jbool(profile.javaw),
            profile.ergonomics.as_raw(),
        )
    }
}
