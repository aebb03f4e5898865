//! Common test utilities for integration tests.
//!
//! Builds an application context rooted in a temp directory and scripts a
//! healthy host on a [`FakeRunner`], so the full boot, network and watchdog
//! flows run without touching the machine.

use std::path::Path;

use stackpilot::config::AppContext;
use stackpilot::exec::{CmdOutput, FakeRunner};

/// Context with every managed path under `dir`. Host-level defaults
/// (interface names, subnets) stay as shipped.
pub fn test_ctx(dir: &Path) -> AppContext {
    let resolv = dir.join("resolv.conf");
    std::fs::write(&resolv, "nameserver 127.0.0.53\n").expect("write resolv.conf");

    let mut ctx = AppContext {
        runtime_dir: dir.join("run"),
        state_dir: dir.join("state"),
        netplan_file: dir.join("netplan/60-stackpilot.yaml"),
        dnsmasq_file: dir.join("dnsmasq.d/stackpilot.conf"),
        ..AppContext::default()
    };
    ctx.watchdog.resolv_conf = resolv;
    ctx.watchdog.min_free_disk_bytes = 0;
    ctx
}

/// Script a fully healthy host: engine up, swarm active, overlay present.
/// Unmatched commands succeed anyway; these pin the probe outputs the
/// cluster checks parse.
pub fn healthy_host(runner: &FakeRunner) {
    runner.always(
        "docker info --format {{.ServerVersion}}",
        CmdOutput::ok("27.1.1\n"),
    );
    runner.always(
        "docker info --format {{.Swarm.LocalNodeState}}",
        CmdOutput::ok("active\n"),
    );
    runner.always("docker network inspect", CmdOutput::ok("swarm\n"));
    runner.always("systemctl is-active", CmdOutput::ok(""));
    runner.always(
        "ip -o -4 addr show dev wlan0",
        CmdOutput::ok("3: wlan0    inet 10.1.1.1/24 brd 10.1.1.255 scope global wlan0\n"),
    );
}
