//! Read-only system report for operators and support tooling.
//!
//! Diagnosis never mutates anything. Every probe here is an observation;
//! repairs belong to the watchdog and the recovery command.

use serde::Serialize;

use crate::boot::heartbeat;
use crate::cluster::ClusterState;
use crate::config::AppContext;
use crate::exec::Runner;
use crate::health;
use crate::store;

#[derive(Debug, Serialize)]
pub struct StackStatus {
    pub name: String,
    pub services: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub name: String,
    pub healthy: bool,
    pub detail: String,
}

/// Snapshot of everything the appliance's health depends on.
#[derive(Debug, Serialize)]
pub struct Report {
    pub version: String,
    pub engine_version: Option<String>,
    pub mode: String,
    pub provisioned: bool,
    pub boot_state: Option<String>,
    pub boot_progress: Option<String>,
    pub heartbeat_age_secs: Option<i64>,
    pub engine_reachable: bool,
    pub swarm_active: bool,
    pub overlay_present: bool,
    pub stacks: Vec<StackStatus>,
    pub services: Vec<ServiceStatus>,
    pub secrets_file_present: bool,
    pub free_disk_bytes: Option<u64>,
}

/// Collect the full snapshot. Expensive parts (service probes, stack
/// listings) run regardless; this is an on-demand command, not a loop.
pub fn collect(ctx: &AppContext, runner: &dyn Runner) -> Report {
    let net_cfg = store::read_network_config(&ctx.store_path());
    let cluster = ClusterState::probe(runner, &ctx.cluster.overlay_network);

    let stacks = if cluster.swarm_active {
        ctx.stacks
            .iter()
            .map(|s| StackStatus {
                name: s.name.clone(),
                services: stack_services(runner, &s.name),
            })
            .collect()
    } else {
        Vec::new()
    };

    let services = health::probe_all(&ctx.probes)
        .into_iter()
        .map(|p| ServiceStatus {
            name: p.name,
            healthy: p.healthy,
            detail: p.detail,
        })
        .collect();

    let engine_version = runner
        .run("docker", &["info", "--format", "{{.ServerVersion}}"])
        .ok()
        .filter(|o| o.success)
        .map(|o| o.stdout_trimmed().to_string())
        .filter(|v| !v.is_empty());

    Report {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine_version,
        mode: net_cfg.mode.as_str().to_string(),
        provisioned: heartbeat::is_provisioned(ctx),
        boot_state: heartbeat::read_boot_state(ctx).map(|s| format!("{s:?}")),
        boot_progress: read_progress(ctx),
        heartbeat_age_secs: heartbeat::age_secs(ctx),
        engine_reachable: cluster.engine_reachable,
        swarm_active: cluster.swarm_active,
        overlay_present: cluster.overlay_present,
        stacks,
        services,
        secrets_file_present: ctx.secrets_path().exists(),
        free_disk_bytes: root_free_bytes(),
    }
}

fn read_progress(ctx: &AppContext) -> Option<String> {
    std::fs::read_to_string(ctx.progress_path())
        .ok()
        .map(|s| s.trim().to_string())
}

fn stack_services(runner: &dyn Runner, name: &str) -> Vec<String> {
    runner
        .run(
            "docker",
            &[
                "stack",
                "services",
                name,
                "--format",
                "{{.Name}} {{.Replicas}}",
            ],
        )
        .ok()
        .filter(|o| o.success)
        .map(|o| o.stdout.lines().map(|l| l.trim().to_string()).collect())
        .unwrap_or_default()
}

fn root_free_bytes() -> Option<u64> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .iter()
        .find(|d| d.mount_point() == std::path::Path::new("/"))
        .map(sysinfo::Disk::available_space)
}

/// Render the snapshot for a terminal. JSON callers serialize [`Report`]
/// directly.
pub fn render_text(report: &Report) -> String {
    use std::fmt::Write;

    let mut out = String::new();
    let _ = writeln!(out, "stackpilot:       {}", report.version);
    let _ = writeln!(
        out,
        "engine version:   {}",
        report.engine_version.as_deref().unwrap_or("-")
    );
    let _ = writeln!(out, "network mode:     {}", report.mode);
    let _ = writeln!(out, "provisioned:      {}", yes_no(report.provisioned));
    let _ = writeln!(
        out,
        "boot state:       {}",
        report.boot_state.as_deref().unwrap_or("unknown")
    );
    let _ = writeln!(
        out,
        "boot progress:    {}",
        report.boot_progress.as_deref().unwrap_or("-")
    );
    match report.heartbeat_age_secs {
        Some(age) => {
            let _ = writeln!(out, "heartbeat age:    {age}s");
        },
        None => {
            let _ = writeln!(out, "heartbeat age:    no heartbeat");
        },
    }
    let _ = writeln!(out, "engine:           {}", up_down(report.engine_reachable));
    let _ = writeln!(out, "swarm:            {}", up_down(report.swarm_active));
    let _ = writeln!(out, "overlay network:  {}", up_down(report.overlay_present));
    let _ = writeln!(
        out,
        "secrets file:     {}",
        if report.secrets_file_present { "present" } else { "missing" }
    );
    if let Some(free) = report.free_disk_bytes {
        let _ = writeln!(out, "free disk:        {} MiB", free / (1024 * 1024));
    }

    if !report.stacks.is_empty() {
        let _ = writeln!(out, "\nstacks:");
        for stack in &report.stacks {
            if stack.services.is_empty() {
                let _ = writeln!(out, "  {:<20} (no services)", stack.name);
            }
            for svc in &stack.services {
                let _ = writeln!(out, "  {svc}");
            }
        }
    }

    if !report.services.is_empty() {
        let _ = writeln!(out, "\nservice probes:");
        for svc in &report.services {
            let _ = writeln!(
                out,
                "  {:<20} {:<10} {}",
                svc.name,
                if svc.healthy { "healthy" } else { "UNHEALTHY" },
                svc.detail
            );
        }
    }

    out
}

fn yes_no(v: bool) -> &'static str {
    if v { "yes" } else { "no" }
}

fn up_down(v: bool) -> &'static str {
    if v { "up" } else { "down" }
}
