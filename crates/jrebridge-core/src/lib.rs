//! # jrebridge-core
//!
//! Safe, host-independent logic behind the JRE bridge.
//!
//! Nothing in this crate touches the dynamic loader or installs signal
//! handlers; those live in `jrebridge-abi`. What lives here is everything the
//! ABI layer needs to decide *what* to do:
//!
//! - [`config`]: fixed launch constants and environment-driven deployment config.
//! - [`error`]: resolution/launch error taxonomy and its integer statuses.
//! - [`argv`]: the owned, null-terminated argument vector handed to the runtime.
//! - [`signal`]: catchable-signal classification and the relay planner.
//! - [`launch`]: the static launch profile (versions, flags, ergonomics).
//! - [`structured_log`]: JSONL records behind the `log` facade.

#![deny(unsafe_code)]

pub mod argv;
pub mod config;
pub mod error;
pub mod launch;
pub mod signal;
pub mod structured_log;

pub use error::{LaunchError, ResolutionError};
