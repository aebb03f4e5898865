//! The boot orchestrator: nine ordered stages from power-on to verified.
//!
//! Stages never abort the sequence. A stage failure is counted (soft or
//! hard) and boot continues to verification anyway - a half-healthy
//! appliance still needs to expose its recovery path, and the watchdog
//! heals the rest after boot. The heartbeat is refreshed before anything
//! expected to block, so the dead-man's switch can tell waiting from hung.

use anyhow::Result;
use std::time::Duration;

use crate::boot::heartbeat::{self, BootState};
use crate::cluster::{self, StackOutcome, stacks};
use crate::config::{AppContext, StackPhase};
use crate::constants;
use crate::exec::Runner;
use crate::health;
use crate::netmode;
use crate::retry::poll_until;

/// Which stage sequence to run, decided by the provisioning marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    First,
    Normal,
}

impl BootMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Normal => "normal",
        }
    }
}

impl std::fmt::Display for BootMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First boot until the provisioning marker exists, normal after.
pub fn detect_boot_mode(ctx: &AppContext) -> BootMode {
    if heartbeat::is_provisioned(ctx) {
        BootMode::Normal
    } else {
        BootMode::First
    }
}

/// Failure accounting across the whole sequence. Reported at the end; never
/// changes the exit status once stage 9 is reached.
#[derive(Debug, Default, Clone, Copy, serde::Serialize)]
pub struct BootSummary {
    pub soft_failures: u32,
    pub hard_failures: u32,
    pub unhealthy_services: u32,
}

/// Run the boot sequence.
///
/// Returns `Ok` whenever stage 9 is reached, regardless of the failure
/// counts - success here means "the node is as booted as it can get", and
/// the provisioning marker is written so the next power-on takes the
/// normal-boot path instead of repeating first-boot forever.
pub fn run_boot(ctx: &AppContext, runner: &dyn Runner, mode: BootMode) -> Result<BootSummary> {
    let mut summary = BootSummary::default();
    tracing::info!(mode = %mode, "Boot sequence starting");
    heartbeat::write_boot_state(ctx, BootState::Starting)?;

    enter_stage(ctx, 1, "memory and swap");
    stage_swap(ctx, runner, &mut summary);

    enter_stage(ctx, 2, "interface bring-up");
    stage_interfaces(ctx, runner, &mut summary);

    enter_stage(ctx, 3, "credential generation");
    stage_credentials(ctx, &mut summary);

    enter_stage(ctx, 4, "cluster bootstrap");
    stage_cluster(ctx, runner, &mut summary);

    enter_stage(ctx, 5, "core services");
    stage_stacks(ctx, runner, StackPhase::Core, &mut summary);

    enter_stage(ctx, 6, "access point");
    stage_network_mode(ctx, runner, &mut summary);

    enter_stage(ctx, 7, "proxy and hardware services");
    stage_stacks(ctx, runner, StackPhase::Hardware, &mut summary);

    enter_stage(ctx, 8, "application stacks");
    stage_stacks(ctx, runner, StackPhase::App, &mut summary);

    enter_stage(ctx, 9, "verification");
    stage_verify(ctx, runner, &mut summary);

    heartbeat::mark_provisioned(ctx)?;
    heartbeat::write_boot_state(ctx, BootState::Complete)?;

    tracing::info!(
        soft_failures = summary.soft_failures,
        hard_failures = summary.hard_failures,
        unhealthy_services = summary.unhealthy_services,
        "Boot sequence finished"
    );
    Ok(summary)
}

fn enter_stage(ctx: &AppContext, stage: u32, name: &str) {
    tracing::info!(stage = format!("{stage}/{}", constants::BOOT_STAGE_COUNT), name = name, "Entering boot stage");
    if let Err(e) = heartbeat::write_progress(ctx, stage) {
        tracing::warn!(error = %e, "Failed to write progress marker");
    }
    if let Err(e) = heartbeat::beat(ctx) {
        tracing::warn!(error = %e, "Failed to write heartbeat");
    }
}

/// Stage 1: compressed-memory swap. Soft - the node runs without it, just
/// worse.
fn stage_swap(ctx: &AppContext, runner: &dyn Runner, summary: &mut BootSummary) {
    let unit = &ctx.boot.swap_unit;
    let active = runner
        .run("systemctl", &["is-active", "--quiet", unit])
        .map(|o| o.success)
        .unwrap_or(false);
    if active {
        return;
    }
    match runner.run("systemctl", &["start", unit]) {
        Ok(out) if out.success => {},
        Ok(out) => {
            tracing::warn!(unit = %unit, stderr = %out.stderr.trim(), "Swap unit failed to start");
            summary.soft_failures += 1;
        },
        Err(e) => {
            tracing::warn!(unit = %unit, error = %e, "Swap unit could not be started");
            summary.soft_failures += 1;
        },
    }
}

/// Stage 2: bring up the AP interface and the mode's upstream, waiting for
/// the devices to appear - flaky USB radios enumerate late.
fn stage_interfaces(ctx: &AppContext, runner: &dyn Runner, summary: &mut BootSummary) {
    let cfg = crate::store::read_network_config(&ctx.store_path());
    let mut ifaces = vec![ctx.network.ap_iface.as_str()];
    if let Some(upstream) = cfg.mode.upstream_iface(&ctx.network) {
        if upstream != ctx.network.ap_iface {
            ifaces.push(upstream);
        }
    }

    for iface in ifaces {
        let present = poll_until(
            iface,
            Duration::from_secs(30),
            Duration::from_secs(2),
            || {
                let _ = heartbeat::beat(ctx);
            },
            || {
                runner
                    .run("ip", &["-o", "link", "show", iface])
                    .map(|o| o.success)
                    .unwrap_or(false)
            },
        );
        if !present {
            tracing::warn!(iface = iface, "Interface never appeared");
            summary.soft_failures += 1;
            continue;
        }
        match runner.run("ip", &["link", "set", "dev", iface, "up"]) {
            Ok(out) if out.success => {},
            Ok(out) => {
                tracing::warn!(iface = iface, stderr = %out.stderr.trim(), "Failed to bring interface up");
                summary.soft_failures += 1;
            },
            Err(e) => {
                tracing::warn!(iface = iface, error = %e, "Failed to bring interface up");
                summary.soft_failures += 1;
            },
        }
    }
}

/// Stage 3: one-time credential generation. Hard - services depend on it.
fn stage_credentials(ctx: &AppContext, summary: &mut BootSummary) {
    if let Err(e) = cluster::secrets::ensure_secrets_file(ctx) {
        tracing::error!(error = %e, "Credential generation failed");
        summary.hard_failures += 1;
    }
}

/// Stage 4: engine readiness, swarm activation, overlay network.
fn stage_cluster(ctx: &AppContext, runner: &dyn Runner, summary: &mut BootSummary) {
    if !wait_for_engine(ctx, runner) {
        // Fatal severity: one restart attempt, then proceed regardless to
        // maximize partial availability.
        tracing::error!("Container engine not ready; restarting it once");
        match runner.run("systemctl", &["restart", "docker"]) {
            Ok(out) if !out.success => {
                tracing::error!(stderr = %out.stderr.trim(), "Engine restart failed");
            },
            Err(e) => tracing::error!(error = %e, "Engine restart failed"),
            Ok(_) => {},
        }
        if !wait_for_engine(ctx, runner) {
            tracing::error!("Container engine unavailable; continuing degraded");
            summary.hard_failures += 1;
            return;
        }
    }

    if !cluster::bootstrap(ctx, runner).is_ready() {
        summary.hard_failures += 1;
    }
}

fn wait_for_engine(ctx: &AppContext, runner: &dyn Runner) -> bool {
    poll_until(
        "container engine",
        Duration::from_secs(constants::ENGINE_WAIT_TIMEOUT_SECS),
        Duration::from_secs(constants::ENGINE_WAIT_INTERVAL_SECS),
        || {
            let _ = heartbeat::beat(ctx);
        },
        || {
            runner
                .run("docker", &["info", "--format", "{{.ServerVersion}}"])
                .map(|o| o.success)
                .unwrap_or(false)
        },
    )
}

/// Stages 5, 7, 8: deploy the stacks of one phase in order. A skipped stack
/// is soft, a failed one hard; neither blocks the stacks after it.
fn stage_stacks(
    ctx: &AppContext,
    runner: &dyn Runner,
    phase: StackPhase,
    summary: &mut BootSummary,
) {
    for stack in ctx.stacks_in_phase(phase) {
        let _ = heartbeat::beat(ctx);
        match stacks::deploy_stack(ctx, runner, stack) {
            StackOutcome::Ready => {},
            StackOutcome::Skipped => summary.soft_failures += 1,
            StackOutcome::Failed => summary.hard_failures += 1,
        }
    }
}

/// Stage 6: converge onto the stored network mode (starts the AP in the
/// modes that have one).
fn stage_network_mode(ctx: &AppContext, runner: &dyn Runner, summary: &mut BootSummary) {
    if let Err(e) = netmode::apply_network_mode(ctx, runner) {
        tracing::error!(error = %e, "Network mode apply failed");
        summary.hard_failures += 1;
    }
}

/// Stage 9: probe every managed service and arm the recurring watchdog.
/// The unhealthy count is logged, never turned into a failing exit.
fn stage_verify(ctx: &AppContext, runner: &dyn Runner, summary: &mut BootSummary) {
    let results = health::probe_all(&ctx.probes);
    summary.unhealthy_services =
        u32::try_from(results.iter().filter(|r| !r.healthy).count()).unwrap_or(u32::MAX);

    let timer = &ctx.boot.watchdog_timer_unit;
    match runner.run("systemctl", &["enable", "--now", timer]) {
        Ok(out) if out.success => {
            tracing::info!(unit = %timer, "Watchdog timer armed");
        },
        Ok(out) => {
            tracing::warn!(unit = %timer, stderr = %out.stderr.trim(), "Failed to arm watchdog timer");
            summary.soft_failures += 1;
        },
        Err(e) => {
            tracing::warn!(unit = %timer, error = %e, "Failed to arm watchdog timer");
            summary.soft_failures += 1;
        },
    }
}
