//! CLI command handlers.
//!
//! Thin wiring between the parsed command line and the library modules;
//! anything worth testing lives below this layer.

pub mod boot;
pub mod diagnose;
pub mod mode;
pub mod recover;
pub mod watchdog;
