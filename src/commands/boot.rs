//! Boot command handlers: the supervised entry point, the hidden worker and
//! the stuck-boot supervisor pass.

use anyhow::Result;

use crate::boot::{self, BootMode};
use crate::config::AppContext;
use crate::exec::Runner;

/// `boot`: spawn the worker and supervise it. Returns the process exit code
/// for the service unit.
pub fn supervised(ctx: &AppContext, runner: &dyn Runner, mode: Option<BootMode>) -> Result<i32> {
    let mode = mode.unwrap_or_else(|| boot::detect_boot_mode(ctx));
    tracing::info!(mode = %mode, "Starting supervised boot");
    boot::supervise_boot(ctx, runner, mode)
}

/// `boot-worker` (hidden): run the stage sequence in this process.
pub fn worker(ctx: &AppContext, runner: &dyn Runner, mode: BootMode) -> Result<i32> {
    let summary = boot::run_boot(ctx, runner, mode)?;
    tracing::info!(
        soft_failures = summary.soft_failures,
        hard_failures = summary.hard_failures,
        unhealthy_services = summary.unhealthy_services,
        "Boot sequence finished"
    );
    Ok(0)
}

/// `boot-timeout`: one pass of the stuck-boot supervisor, driven by an
/// external timer unit.
pub fn timeout_pass(ctx: &AppContext, runner: &dyn Runner) -> Result<()> {
    boot::boot_timeout_pass(ctx, runner)
}
