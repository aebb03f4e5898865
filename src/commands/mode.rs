//! Network mode console commands: read or rewrite the stored configuration
//! and re-apply it through the network engine. No engine logic lives here.

use anyhow::{Context, Result};

use crate::config::AppContext;
use crate::exec::Runner;
use crate::netmode::{self, NetworkMode};
use crate::store::{self, ConfigStore};

/// Flags accepted by `mode set`. Unset flags leave the stored value alone.
#[derive(Debug, Default, Clone)]
pub struct SetOptions {
    pub wifi_ssid: Option<String>,
    pub wifi_password: Option<String>,
    pub static_ip: Option<String>,
    pub netmask: Option<String>,
    pub gateway: Option<String>,
    pub dns: Option<String>,
    pub dns_secondary: Option<String>,
    /// `Some(true)` enables static addressing, `Some(false)` reverts to DHCP.
    pub use_static_ip: Option<bool>,
}

pub fn show(ctx: &AppContext) -> Result<()> {
    let cfg = store::read_network_config(&ctx.store_path());
    println!("mode:       {}", cfg.mode.as_str());
    if !cfg.wifi_ssid.is_empty() {
        println!("wifi ssid:  {}", cfg.wifi_ssid);
    }
    if cfg.use_static_ip {
        println!("static ip:  {} / {}", cfg.static_ip, cfg.static_netmask);
        println!("gateway:    {}", cfg.static_gateway);
        println!("dns:        {} {}", cfg.static_dns_primary, cfg.static_dns_secondary);
    } else {
        println!("addressing: dhcp");
    }
    Ok(())
}

/// Persist the new mode, then apply it. Apply failures leave the stored
/// config in place; the next boot or watchdog apply retries it.
pub fn set(
    ctx: &AppContext,
    runner: &dyn Runner,
    mode: NetworkMode,
    opts: &SetOptions,
) -> Result<()> {
    let store_path = ctx.store_path();
    if let Some(parent) = store_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let store = ConfigStore::open(&store_path).context("Failed to open network config store")?;
    let mut cfg = store.load()?.unwrap_or_default();
    cfg.mode = mode;

    if let Some(v) = &opts.wifi_ssid {
        cfg.wifi_ssid.clone_from(v);
    }
    if let Some(v) = &opts.wifi_password {
        cfg.wifi_password.clone_from(v);
    }
    if let Some(v) = &opts.static_ip {
        cfg.static_ip.clone_from(v);
    }
    if let Some(v) = &opts.netmask {
        cfg.static_netmask.clone_from(v);
    }
    if let Some(v) = &opts.gateway {
        cfg.static_gateway.clone_from(v);
    }
    if let Some(v) = &opts.dns {
        cfg.static_dns_primary.clone_from(v);
    }
    if let Some(v) = &opts.dns_secondary {
        cfg.static_dns_secondary.clone_from(v);
    }
    if let Some(v) = opts.use_static_ip {
        cfg.use_static_ip = v;
    }

    store.save(&cfg)?;
    tracing::info!(mode = cfg.mode.as_str(), "Network config stored; applying");
    netmode::apply_network_mode(ctx, runner)
}

/// `early-net`: render the boot-time network document only, for the unit
/// that runs before the full engine is available.
pub fn early_net(ctx: &AppContext) -> Result<()> {
    netmode::write_early_network_config(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{CmdOutput, FakeRunner};

    fn test_ctx(dir: &std::path::Path) -> AppContext {
        AppContext {
            runtime_dir: dir.join("run"),
            state_dir: dir.join("state"),
            netplan_file: dir.join("netplan.yaml"),
            dnsmasq_file: dir.join("dnsmasq.conf"),
            ..AppContext::default()
        }
    }

    #[test]
    fn set_persists_mode_and_applies_it() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        let runner = FakeRunner::new();
        runner.always("netplan apply", CmdOutput::ok(""));
        runner.always("systemctl", CmdOutput::ok(""));
        runner.always("iptables", CmdOutput::ok(""));
        runner.always("sysctl", CmdOutput::ok(""));

        set(&ctx, &runner, NetworkMode::ServerEth, &SetOptions::default()).unwrap();

        let stored = store::read_network_config(&ctx.store_path());
        assert_eq!(stored.mode, NetworkMode::ServerEth);
        assert!(ctx.netplan_file.exists());
        assert_eq!(runner.calls_matching("netplan apply").len(), 1);
    }

    #[test]
    fn set_merges_flags_over_stored_values() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        let runner = FakeRunner::new();

        let opts = SetOptions {
            wifi_ssid: Some("upstream".into()),
            wifi_password: Some("secret".into()),
            ..SetOptions::default()
        };
        set(&ctx, &runner, NetworkMode::OnlineWifi, &opts).unwrap();

        // Second set changes only the mode; credentials survive.
        set(&ctx, &runner, NetworkMode::Offline, &SetOptions::default()).unwrap();
        let stored = store::read_network_config(&ctx.store_path());
        assert_eq!(stored.mode, NetworkMode::Offline);
        assert_eq!(stored.wifi_ssid, "upstream");
    }
}
