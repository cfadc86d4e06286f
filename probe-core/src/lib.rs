#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Shared logic for the fault-injection probe controller.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library and exposing abstractions the other crates can adopt.

pub mod bench;
pub mod capability;
pub mod config;
pub mod console;
pub mod engine;
pub mod fault;
pub mod monitor;
pub mod pulse;
pub mod telemetry;
pub mod units;

pub use bench::ProbeBench;
pub use config::{ConfigError, ConfigField, ConfigSnapshot, ProbeConfig};
pub use engine::{ProbeEngine, ProbeInputs, ProbeOutputs, ProbeState};
pub use fault::{FaultLatch, FaultReason};
pub use units::{TickRate, TimeUnit, mv_to_code, to_cycles};
