//! One reconciliation cycle over every managed subsystem.
//!
//! Stateless: each invocation re-derives the same desired state the boot
//! orchestrator converges on and applies at most one corrective action per
//! broken check. A check's failure never blocks the checks after it, and a
//! cycle on an already-healthy system performs zero mutations - the
//! reconciler is safe to run concurrently with a boot in progress.

use crate::cluster::{overlay, secrets, stacks, state::ClusterState, swarm, StackOutcome};
use crate::config::{AppContext, StackSpec};
use crate::exec::Runner;
use crate::health;
use crate::netmode::NetworkMode;
use crate::store;

/// What one check observed and did. Accumulated for the cycle log only,
/// never persisted.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckRecord {
    pub check: String,
    pub healthy: bool,
    /// Corrective action taken, when the check was broken.
    pub action: Option<String>,
    /// Whether the corrective action succeeded.
    pub fixed: bool,
}

/// Issue/fix counters for one cycle.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct CycleReport {
    pub issues: u32,
    pub fixes: u32,
    pub records: Vec<CheckRecord>,
}

impl CycleReport {
    fn healthy(&mut self, check: &str) {
        self.records.push(CheckRecord {
            check: check.to_string(),
            healthy: true,
            action: None,
            fixed: false,
        });
    }

    fn broken(&mut self, check: &str, action: &str, fixed: bool) {
        self.issues += 1;
        if fixed {
            self.fixes += 1;
            tracing::info!(check = check, action = action, "Issue repaired");
        } else {
            tracing::warn!(check = check, action = action, "Issue could not be repaired");
        }
        self.records.push(CheckRecord {
            check: check.to_string(),
            healthy: false,
            action: Some(action.to_string()),
            fixed,
        });
    }
}

/// Run one reconciliation pass over every managed check.
pub fn reconcile_once(ctx: &AppContext, runner: &dyn Runner) -> CycleReport {
    let mut report = CycleReport::default();
    let net_cfg = store::read_network_config(&ctx.store_path());
    let mode = net_cfg.mode;

    check_swap(ctx, runner, &mut report);
    check_ap_address(ctx, runner, mode, &mut report);
    check_access_point(runner, mode, &mut report);
    check_resolver(ctx, runner, &mut report);
    check_obsolete_artifacts(ctx, &mut report);
    check_disk_space(ctx, runner, &mut report);

    // Cluster checks need a live engine; when it stays down after its one
    // restart attempt there is nothing useful the rest can do this cycle.
    if check_engine(ctx, runner, &mut report) {
        check_swarm(ctx, runner, &mut report);
        check_overlay(ctx, runner, &mut report);
        check_secrets(ctx, runner, &mut report);
        for stack in &ctx.stacks {
            check_stack(ctx, runner, stack, &mut report);
        }
        check_services(ctx, runner, &mut report);
    }

    tracing::info!(
        issues = report.issues,
        fixes = report.fixes,
        "Reconciliation cycle finished"
    );
    report
}

/// Container engine reachable. Fix: one engine restart. Returns whether the
/// engine is usable afterwards.
fn check_engine(ctx: &AppContext, runner: &dyn Runner, report: &mut CycleReport) -> bool {
    let reachable = ClusterState::probe(runner, &ctx.cluster.overlay_network).engine_reachable;
    if reachable {
        report.healthy("engine");
        return true;
    }

    let restarted = runner
        .run("systemctl", &["restart", "docker"])
        .map(|o| o.success)
        .unwrap_or(false);
    let reachable_now = restarted
        && ClusterState::probe(runner, &ctx.cluster.overlay_network).engine_reachable;
    report.broken("engine", "restart docker", reachable_now);
    reachable_now
}

/// AP interface carries the expected hotspot address (AP modes only).
/// Fix: `ip addr replace`, which is idempotent by definition.
fn check_ap_address(
    ctx: &AppContext,
    runner: &dyn Runner,
    mode: NetworkMode,
    report: &mut CycleReport,
) {
    if !mode.has_access_point() {
        return;
    }
    let iface = &ctx.network.ap_iface;
    let expected = ctx
        .network
        .ap_address
        .split('/')
        .next()
        .unwrap_or(&ctx.network.ap_address);

    let present = runner
        .run("ip", &["-o", "-4", "addr", "show", "dev", iface])
        .map(|o| o.success && o.stdout.contains(expected))
        .unwrap_or(false);
    if present {
        report.healthy("ap-address");
        return;
    }

    let fixed = runner
        .run("ip", &["addr", "replace", &ctx.network.ap_address, "dev", iface])
        .map(|o| o.success)
        .unwrap_or(false);
    report.broken("ap-address", "ip addr replace", fixed);
}

/// Access-point daemon active (AP modes only). Fix: restart it.
fn check_access_point(runner: &dyn Runner, mode: NetworkMode, report: &mut CycleReport) {
    if !mode.has_access_point() {
        return;
    }
    let active = runner
        .run("systemctl", &["is-active", "--quiet", "hostapd"])
        .map(|o| o.success)
        .unwrap_or(false);
    if active {
        report.healthy("access-point");
        return;
    }
    let fixed = runner
        .run("systemctl", &["restart", "hostapd"])
        .map(|o| o.success)
        .unwrap_or(false);
    report.broken("access-point", "restart hostapd", fixed);
}

/// System resolver has at least one nameserver entry. Fix: restart the
/// resolver so it regenerates the file.
fn check_resolver(ctx: &AppContext, runner: &dyn Runner, report: &mut CycleReport) {
    let has_nameserver = std::fs::read_to_string(&ctx.watchdog.resolv_conf)
        .map(|c| c.lines().any(|l| l.trim_start().starts_with("nameserver")))
        .unwrap_or(false);
    if has_nameserver {
        report.healthy("resolver");
        return;
    }
    let fixed = runner
        .run("systemctl", &["restart", "systemd-resolved"])
        .map(|o| o.success)
        .unwrap_or(false);
    report.broken("resolver", "restart systemd-resolved", fixed);
}

/// Swap/compressed-memory unit active. Fix: start it.
fn check_swap(ctx: &AppContext, runner: &dyn Runner, report: &mut CycleReport) {
    let unit = &ctx.boot.swap_unit;
    let active = runner
        .run("systemctl", &["is-active", "--quiet", unit])
        .map(|o| o.success)
        .unwrap_or(false);
    if active {
        report.healthy("swap");
        return;
    }
    let fixed = runner
        .run("systemctl", &["start", unit])
        .map(|o| o.success)
        .unwrap_or(false);
    report.broken("swap", "start swap unit", fixed);
}

/// Swarm active. Fix: the full init fallback chain.
fn check_swarm(ctx: &AppContext, runner: &dyn Runner, report: &mut CycleReport) {
    if ClusterState::probe(runner, &ctx.cluster.overlay_network).swarm_active {
        report.healthy("swarm");
        return;
    }
    let fixed = swarm::ensure_swarm(ctx, runner).is_ready();
    report.broken("swarm", "swarm init chain", fixed);
}

/// Overlay network present with cluster scope. Fix: recreate it.
fn check_overlay(ctx: &AppContext, runner: &dyn Runner, report: &mut CycleReport) {
    let state = ClusterState::probe(runner, &ctx.cluster.overlay_network);
    if state.overlay_scope.as_deref() == Some("swarm") {
        report.healthy("overlay");
        return;
    }
    let fixed = overlay::ensure_overlay_network(ctx, runner).is_ready();
    report.broken("overlay", "recreate overlay network", fixed);
}

/// Cluster secret objects exist for every on-disk secret. Fix: re-mirror
/// from disk - they do not survive a forced swarm re-init.
fn check_secrets(ctx: &AppContext, runner: &dyn Runner, report: &mut CycleReport) {
    let path = ctx.secrets_path();
    if !path.exists() {
        return;
    }
    let Ok(content) = std::fs::read_to_string(&path) else {
        report.broken("secrets", "none (file unreadable)", false);
        return;
    };

    let missing = content.lines().filter_map(|l| l.split_once('=')).any(|(key, _)| {
        if key.starts_with('#') || key.trim().is_empty() {
            return false;
        }
        let name = key.trim().to_ascii_lowercase().replace('_', "-");
        !runner
            .run("docker", &["secret", "inspect", &name])
            .map(|o| o.success)
            .unwrap_or(false)
    });
    if !missing {
        report.healthy("secrets");
        return;
    }
    let fixed = secrets::mirror_to_cluster(ctx, runner).is_ok();
    report.broken("secrets", "re-mirror from disk", fixed);
}

/// Stack present with its replica count satisfied. Fix: redeploy.
fn check_stack(
    ctx: &AppContext,
    runner: &dyn Runner,
    stack: &StackSpec,
    report: &mut CycleReport,
) {
    let check = format!("stack:{}", stack.name);
    let out = runner.run(
        "docker",
        &[
            "stack",
            "services",
            &stack.name,
            "--format",
            "{{.Replicas}}",
        ],
    );
    let satisfied = out
        .map(|o| {
            o.success
                && !o.stdout_trimmed().is_empty()
                && o.stdout.lines().all(|l| {
                    let l = l.trim();
                    l.split_once('/')
                        .is_some_and(|(run, want)| !want.is_empty() && run == want)
                })
        })
        .unwrap_or(false);
    if satisfied {
        report.healthy(&check);
        return;
    }
    let fixed = stacks::deploy_stack(ctx, runner, stack) == StackOutcome::Ready;
    report.broken(&check, "redeploy stack", fixed);
}

/// Every always-on service answers its liveness endpoint. Fix: container
/// restart, one attempt.
fn check_services(ctx: &AppContext, runner: &dyn Runner, report: &mut CycleReport) {
    for result in health::probe_all(&ctx.probes) {
        let check = format!("service:{}", result.name);
        if result.healthy {
            report.healthy(&check);
            continue;
        }
        let fixed = runner
            .run("docker", &["restart", &result.name])
            .map(|o| o.success)
            .unwrap_or(false);
        report.broken(&check, "container restart", fixed);
    }
}

/// Obsolete artifacts from previous releases removed.
fn check_obsolete_artifacts(ctx: &AppContext, report: &mut CycleReport) {
    for path in &ctx.watchdog.obsolete_paths {
        if !path.exists() {
            continue;
        }
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        let check = format!("obsolete:{}", path.display());
        match result {
            Ok(()) => report.broken(&check, "removed", true),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove artifact");
                report.broken(&check, "remove", false);
            },
        }
    }
}

/// Root filesystem free space above the threshold. Fix: prune dangling
/// images, the biggest reclaimable consumer on an appliance.
fn check_disk_space(ctx: &AppContext, runner: &dyn Runner, report: &mut CycleReport) {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    let root_free = disks
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"))
        .map(sysinfo::Disk::available_space);

    let Some(free) = root_free else {
        // No root mount visible (containerized test run); nothing to judge.
        return;
    };
    if free >= ctx.watchdog.min_free_disk_bytes {
        report.healthy("disk-space");
        return;
    }

    tracing::warn!(free_bytes = free, "Disk space low; pruning images");
    let fixed = runner
        .run("docker", &["image", "prune", "-f"])
        .map(|o| o.success)
        .unwrap_or(false);
    report.broken("disk-space", "docker image prune", fixed);
}
