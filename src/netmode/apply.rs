//! Applying a connectivity mode to the running system.
//!
//! `apply_network_mode` is the only entry point that touches live
//! interfaces; the console and the boot orchestrator both call it rather
//! than duplicating any of its logic. `write_early_network_config` is its
//! read-only-safe subset run before the network renderer starts.

use anyhow::Result;

use crate::config::AppContext;
use crate::exec::Runner;
use crate::netmode::{dnsmasq, nat, netplan};
use crate::store;

/// Read the stored configuration and converge the system onto its mode.
///
/// Generates the netplan document and DHCP scope, reloads the renderer,
/// starts or stops the access-point daemon and sets the NAT policy. A
/// missing or broken config store means the default mode (`OFFLINE`).
/// Runtime actions are degraded severity: each failure is logged with its
/// stderr and the remaining actions still run.
pub fn apply_network_mode(ctx: &AppContext, runner: &dyn Runner) -> Result<()> {
    let cfg = store::read_network_config(&ctx.store_path());
    let mode = cfg.mode;
    let upstream = mode.upstream_iface(&ctx.network);
    tracing::info!(mode = %mode, upstream = ?upstream, "Applying network mode");

    // The generated documents are the one part that must succeed; a mode
    // whose document never lands would survive a reboot in the wrong state.
    let doc = netplan::build_document(&cfg, &ctx.network);
    netplan::write_atomic(&ctx.netplan_file, &netplan::render(&doc, mode)?)?;
    netplan::write_atomic(
        &ctx.dnsmasq_file,
        &dnsmasq::render(mode, &ctx.network, upstream),
    )?;

    let out = runner.run("netplan", &["apply"])?;
    if !out.success {
        tracing::warn!(stderr = %out.stderr.trim(), "netplan apply failed");
    }

    if mode.has_access_point() {
        let out = runner.run("systemctl", &["restart", "hostapd"])?;
        if !out.success {
            tracing::warn!(stderr = %out.stderr.trim(), "Failed to start access point");
        }
    } else {
        let out = runner.run("systemctl", &["stop", "hostapd"])?;
        if !out.success {
            tracing::warn!(stderr = %out.stderr.trim(), "Failed to stop access point");
        }
        if let Err(e) = nat::flush_ap_address(runner, &ctx.network.ap_iface) {
            tracing::warn!(error = %e, "Failed to flush access-point address");
        }
    }

    let nat_result = match upstream {
        Some(upstream) if mode.has_nat() => {
            nat::enable_masquerade(runner, &ctx.network.ap_subnet, upstream)
        },
        _ => nat::disable(runner),
    };
    if let Err(e) = nat_result {
        tracing::warn!(error = %e, "Failed to apply NAT policy");
    }

    let out = runner.run("systemctl", &["restart", "dnsmasq"])?;
    if !out.success {
        tracing::warn!(stderr = %out.stderr.trim(), "Failed to restart resolver");
    }

    Ok(())
}

/// Rewrite the generated netplan document before the renderer first runs.
///
/// Runs in early boot so a stale document from a previous mode is never
/// consumed before the orchestrator gets a chance to correct it. Only the
/// document is written; live interfaces, daemons and NAT are untouched.
/// Safely a no-op on a fresh install where the config store does not exist
/// yet - the shipped default document is already correct there.
pub fn write_early_network_config(ctx: &AppContext) -> Result<()> {
    if !ctx.store_path().exists() {
        tracing::debug!("No config store yet; keeping the shipped document");
        return Ok(());
    }
    let cfg = store::read_network_config(&ctx.store_path());
    let doc = netplan::build_document(&cfg, &ctx.network);
    netplan::write_atomic(&ctx.netplan_file, &netplan::render(&doc, cfg.mode)?)?;
    tracing::info!(mode = %cfg.mode, "Early network config written");
    Ok(())
}
