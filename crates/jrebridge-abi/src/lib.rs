// JNI exports receive raw JNIEnv/object handles from the VM; the `jni` crate
// wrappers carry the invariants, so per-function safety docs would be noise.
#![allow(clippy::missing_safety_doc)]
//! # jrebridge
//!
//! Native boundary between a managed Android process and an embedded JRE that
//! is loaded at run time.
//!
//! # Architecture
//!
//! ```text
//! Java caller -> jni_abi export -> launch::Launcher
//!                                   |-> trap::install (relay every catchable signal)
//!                                   |-> loader::resolve (libjli.so / JLI_Launch)
//!                                   |-> argv::ArgumentVector (core)
//!                                   `-> JLI_Launch(...) blocks until the JRE exits
//! ```
//!
//! A trap raised while the JRE runs is offered to the JRE's own
//! `JVM_handle_linux_signal` when one has been attached, otherwise it is
//! chained to the handler that was registered before the relay, and the
//! process exits.

pub mod bridge;
pub mod errno_abi;
pub mod error;
pub mod jni_abi;
pub mod launch;
pub mod loader;
pub mod logging;
pub mod trap;

pub use error::BridgeError;
pub use launch::{DynamicResolver, EntryResolver, LaunchOptions, Launcher, launch};
pub use loader::{Library, ResolvedEntry, resolve};
