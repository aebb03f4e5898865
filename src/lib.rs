// =============================================================================
// Lint Configuration
// =============================================================================

// Safety: deny unsafe by default, allow only where documented
// (Unix setsid in boot/monitor.rs)
#![deny(unsafe_code)]
// Correctness: Must handle all fallible operations
#![deny(unused_must_use)]
// Quality: Pedantic but pragmatic
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(rust_2018_idioms)]

// Allowed with documented reasons
#![allow(clippy::missing_errors_doc)] // Error returns self-documenting via type
#![allow(clippy::module_name_repetitions)] // e.g., netmode::NetworkMode is clearer
#![allow(clippy::must_use_candidate)] // Not all returned values need annotation

//! stackpilot - boot and cluster control plane for a single-node appliance.
//!
//! Exposes the full module tree so integration tests can drive the boot
//! orchestrator, network engine and watchdog against a scripted host.

pub mod boot;
pub mod cluster;
pub mod commands;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod exec;
pub mod health;
pub mod logging;
pub mod netmode;
pub mod retry;
pub mod store;
pub mod watchdog;
