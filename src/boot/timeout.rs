//! One-shot boot-timeout supervisor.
//!
//! Fired once by an external timer a fixed delay after power-on,
//! independent of the monitor. If the boot state still says "starting"
//! after 20 minutes, the orchestrator (and its monitor) are assumed wedged:
//! the recorded worker is killed and a single normal-boot recovery pass
//! runs in its place.

use anyhow::Result;

use crate::boot::heartbeat::{self, BootState};
use crate::boot::orchestrator::{self, BootMode};
use crate::config::AppContext;
use crate::constants;
use crate::exec::Runner;

/// Run the supervisor pass with the shipped threshold.
pub fn boot_timeout_pass(ctx: &AppContext, runner: &dyn Runner) -> Result<()> {
    pass_with_threshold(ctx, runner, constants::BOOT_TIMEOUT_SUPERVISOR_SECS)
}

pub(crate) fn pass_with_threshold(
    ctx: &AppContext,
    runner: &dyn Runner,
    threshold_secs: i64,
) -> Result<()> {
    match heartbeat::read_boot_state(ctx) {
        None => {
            tracing::debug!("No boot recorded this power-on; nothing to supervise");
            return Ok(());
        },
        Some(BootState::Complete) => {
            tracing::debug!("Boot completed; supervisor standing down");
            return Ok(());
        },
        Some(BootState::Starting) => {},
    }

    let age = heartbeat::boot_state_age_secs(ctx).unwrap_or(0);
    if age < threshold_secs {
        tracing::info!(age_secs = age, "Boot still starting but within budget");
        return Ok(());
    }

    tracing::error!(
        age_secs = age,
        "Boot stuck in starting state; killing worker and running recovery"
    );
    if let Some(pid) = heartbeat::read_worker_pid(ctx) {
        kill_worker(pid);
    }

    let summary = orchestrator::run_boot(ctx, runner, BootMode::Normal)?;
    tracing::info!(
        hard_failures = summary.hard_failures,
        unhealthy_services = summary.unhealthy_services,
        "Recovery pass finished"
    );
    Ok(())
}

/// Kill the recorded worker, verifying the PID still belongs to this binary
/// first - the worker may have died long ago and the PID been reused.
fn kill_worker(pid: u32) {
    let mut sys = sysinfo::System::new();
    sys.refresh_processes(sysinfo::ProcessesToUpdate::All, true);

    let Some(process) = sys.process(sysinfo::Pid::from_u32(pid)) else {
        tracing::debug!(pid = pid, "Recorded worker already gone");
        return;
    };
    if !process.name().to_string_lossy().contains("stackpilot") {
        tracing::warn!(pid = pid, "Recorded PID reused by another process; not killing");
        return;
    }

    if process.kill() {
        tracing::info!(pid = pid, "Stuck worker killed");
    } else {
        tracing::warn!(pid = pid, "Failed to kill stuck worker");
    }
}
