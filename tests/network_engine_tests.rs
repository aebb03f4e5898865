//! Network engine flows driven through the console command layer: stored
//! config, generated documents and host actions per mode transition.

mod common;

use common::test_ctx;
use stackpilot::commands::mode::{self, SetOptions};
use stackpilot::exec::FakeRunner;
use stackpilot::netmode::NetworkMode;
use stackpilot::store;

#[test]
fn mode_transition_rewrites_both_documents() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let runner = FakeRunner::new();

    mode::set(&ctx, &runner, NetworkMode::Offline, &SetOptions::default()).unwrap();
    let offline = std::fs::read_to_string(&ctx.netplan_file).unwrap();
    assert!(offline.contains("OFFLINE"));
    assert!(offline.contains("wlan0"));
    assert!(!offline.contains("eth0"));

    mode::set(&ctx, &runner, NetworkMode::OnlineEth, &SetOptions::default()).unwrap();
    let online = std::fs::read_to_string(&ctx.netplan_file).unwrap();
    assert!(online.contains("eth0"));

    let dnsmasq = std::fs::read_to_string(&ctx.dnsmasq_file).unwrap();
    assert!(dnsmasq.contains("dhcp-range"));
    assert!(dnsmasq.contains("except-interface=eth0"));

    // NAT is set up for the wired upstream.
    assert!(!runner.calls_matching("iptables").is_empty());
    assert!(
        runner
            .calls()
            .iter()
            .any(|c| c.contains("MASQUERADE") && c.contains("-o eth0"))
    );
}

#[test]
fn server_mode_emits_no_hotspot_config() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let runner = FakeRunner::new();

    mode::set(&ctx, &runner, NetworkMode::ServerEth, &SetOptions::default()).unwrap();

    let netplan = std::fs::read_to_string(&ctx.netplan_file).unwrap();
    assert!(!netplan.contains("wlan0"));
    let dnsmasq = std::fs::read_to_string(&ctx.dnsmasq_file).unwrap();
    assert!(!dnsmasq.contains("dhcp-range"));

    // The hotspot daemon is stopped, not restarted.
    assert_eq!(runner.calls_matching("systemctl stop hostapd").len(), 1);
    assert!(runner.calls_matching("systemctl restart hostapd").is_empty());
}

#[test]
fn static_addressing_round_trips_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let runner = FakeRunner::new();

    let opts = SetOptions {
        static_ip: Some("192.168.1.50".into()),
        netmask: Some("255.255.255.0".into()),
        gateway: Some("192.168.1.1".into()),
        dns: Some("1.1.1.1".into()),
        use_static_ip: Some(true),
        ..SetOptions::default()
    };
    mode::set(&ctx, &runner, NetworkMode::ServerEth, &opts).unwrap();

    let stored = store::read_network_config(&ctx.store_path());
    assert!(stored.use_static_ip);
    assert_eq!(stored.static_ip, "192.168.1.50");

    let netplan = std::fs::read_to_string(&ctx.netplan_file).unwrap();
    assert!(netplan.contains("192.168.1.50/24"));
    assert!(netplan.contains("192.168.1.1"));
    assert!(!netplan.contains("dhcp4: true"));

    // Reverting to DHCP drops the static stanza but keeps the values stored.
    let revert = SetOptions {
        use_static_ip: Some(false),
        ..SetOptions::default()
    };
    mode::set(&ctx, &runner, NetworkMode::ServerEth, &revert).unwrap();
    let netplan = std::fs::read_to_string(&ctx.netplan_file).unwrap();
    assert!(!netplan.contains("192.168.1.50/24"));
    let stored = store::read_network_config(&ctx.store_path());
    assert_eq!(stored.static_ip, "192.168.1.50");
}

#[test]
fn early_net_without_stored_config_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());

    mode::early_net(&ctx).unwrap();
    assert!(!ctx.netplan_file.exists());
}

#[test]
fn early_net_renders_the_stored_mode() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_ctx(dir.path());
    let runner = FakeRunner::new();

    mode::set(&ctx, &runner, NetworkMode::OnlineEth, &SetOptions::default()).unwrap();
    std::fs::remove_file(&ctx.netplan_file).unwrap();

    mode::early_net(&ctx).unwrap();
    let netplan = std::fs::read_to_string(&ctx.netplan_file).unwrap();
    assert!(netplan.contains("ONLINE_ETH"));
}
