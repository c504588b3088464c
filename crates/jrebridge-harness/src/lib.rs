//! Host-side tooling for jrebridge: entry point probes and launch driving
//! without a managed caller.

#![forbid(unsafe_code)]

pub mod probe;

pub use probe::{ProbeReport, SignalRow, probe, signal_table};
