//! The dead-man's switch supervising a boot in progress.
//!
//! The public `boot` command does not run the stages itself: it re-spawns
//! this binary as a detached `boot-worker` child and supervises the child
//! handle from the parent. Owning the handle avoids kill-by-PID races; the
//! monitor is not cancellable except by its own exit or the worker
//! disappearing.
//!
//! Two triggers:
//! - total elapsed time exceeds the hard ceiling: kill the worker's process
//!   group and force a reboot;
//! - heartbeat older than the staleness threshold while the worker is still
//!   alive: the worker is stuck, not busy - terminate it (SIGTERM, then
//!   SIGKILL after a grace period) so the next boot or the boot-timeout
//!   supervisor can retry.

use anyhow::{Context as AnyhowContext, Result};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use crate::boot::heartbeat;
use crate::boot::orchestrator::BootMode;
use crate::config::AppContext;
use crate::constants;
use crate::exec::Runner;

/// Monitor thresholds, parameterized so tests run in milliseconds.
#[derive(Debug, Clone, Copy)]
pub struct MonitorConfig {
    pub poll: Duration,
    pub stale_secs: i64,
    pub ceiling: Duration,
    pub grace: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll: Duration::from_secs(constants::MONITOR_POLL_SECS),
            stale_secs: constants::HEARTBEAT_STALE_SECS,
            ceiling: Duration::from_secs(constants::BOOT_HARD_CEILING_SECS),
            grace: Duration::from_secs(constants::TERMINATE_GRACE_SECS),
        }
    }
}

/// One poll's decision about a still-running worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    HeartbeatStale,
    CeilingExceeded,
}

/// Judge a live worker. The ceiling wins over staleness: a reboot resets
/// more state than a worker kill and is the right answer for a boot that
/// has dragged on regardless of heartbeat activity.
pub fn assess(elapsed: Duration, heartbeat_age: Option<i64>, cfg: &MonitorConfig) -> Verdict {
    if elapsed > cfg.ceiling {
        return Verdict::CeilingExceeded;
    }
    // A worker that never wrote a heartbeat is judged by its own age.
    let age = heartbeat_age.unwrap_or_else(|| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX));
    if age > cfg.stale_secs {
        Verdict::HeartbeatStale
    } else {
        Verdict::Continue
    }
}

/// Spawn the boot worker and supervise it to completion or termination.
///
/// Returns the exit code the `boot` command should report.
#[allow(unsafe_code)] // SAFETY: Unix pre_exec/setsid for process group detachment
pub fn supervise_boot(ctx: &AppContext, runner: &dyn Runner, mode: BootMode) -> Result<i32> {
    let current_exe =
        std::env::current_exe().context("Failed to get current executable path")?;

    let mut cmd = Command::new(current_exe);
    cmd.arg("boot-worker").arg("--mode").arg(mode.as_str());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // New process group so group signals never reach the monitor.
        unsafe {
            cmd.pre_exec(|| {
                if nix::libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    let child = cmd.spawn().context("Failed to spawn boot worker")?;
    heartbeat::write_worker_pid(ctx, child.id())?;
    tracing::info!(pid = child.id(), mode = %mode, "Boot worker spawned; monitor engaged");

    monitor_child(ctx, runner, child, &MonitorConfig::default())
}

/// The monitor loop proper.
pub fn monitor_child(
    ctx: &AppContext,
    runner: &dyn Runner,
    mut child: Child,
    cfg: &MonitorConfig,
) -> Result<i32> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().context("Failed to poll boot worker")? {
            let code = status.code().unwrap_or(1);
            tracing::info!(code = code, "Boot worker exited");
            return Ok(code);
        }

        match assess(start.elapsed(), heartbeat::age_secs(ctx), cfg) {
            Verdict::Continue => std::thread::sleep(cfg.poll),
            Verdict::HeartbeatStale => {
                tracing::error!(
                    stale_secs = cfg.stale_secs,
                    "Heartbeat stale while worker alive; terminating worker"
                );
                terminate_group(&mut child, cfg.grace);
                return Ok(1);
            },
            Verdict::CeilingExceeded => {
                tracing::error!(
                    ceiling_secs = cfg.ceiling.as_secs(),
                    "Boot exceeded hard ceiling; killing worker and rebooting"
                );
                kill_group(&mut child);
                force_reboot(ctx, runner);
                return Ok(1);
            },
        }
    }
}

/// SIGTERM the worker's process group, escalating to SIGKILL after `grace`.
fn terminate_group(child: &mut Child, grace: Duration) {
    signal_group(child, nix::sys::signal::Signal::SIGTERM);

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    tracing::warn!("Worker ignored SIGTERM, sending SIGKILL");
    kill_group(child);
}

fn kill_group(child: &mut Child) {
    signal_group(child, nix::sys::signal::Signal::SIGKILL);
    let _ = child.wait();
}

/// Signal the whole process group (the worker runs setsid'd, so its group
/// id equals its pid and the signal reaches everything it spawned).
fn signal_group(child: &Child, signal: nix::sys::signal::Signal) {
    let group = nix::unistd::Pid::from_raw(-(i32::try_from(child.id()).unwrap_or(i32::MAX)));
    if let Err(e) = nix::sys::signal::kill(group, signal) {
        // The group may be gone already; fall back to the process itself.
        tracing::debug!(error = %e, "Group signal failed, signalling process directly");
        let pid = nix::unistd::Pid::from_raw(i32::try_from(child.id()).unwrap_or(i32::MAX));
        if let Err(e) = nix::sys::signal::kill(pid, signal) {
            tracing::warn!(error = %e, signal = %signal, "Failed to signal boot worker");
        }
    }
}

fn force_reboot(ctx: &AppContext, runner: &dyn Runner) {
    let cmd = &ctx.boot.reboot_command;
    let Some((program, args)) = cmd.split_first() else {
        tracing::error!("No reboot command configured");
        return;
    };
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    match runner.run(program, &args) {
        Ok(out) if out.success => {},
        Ok(out) => tracing::error!(stderr = %out.stderr.trim(), "Reboot command failed"),
        Err(e) => tracing::error!(error = %e, "Reboot command could not run"),
    }
}
