//! DHCP scope snippet for the built-in resolver.
//!
//! One generated dnsmasq fragment per mode: DHCP on every interface
//! (`OFFLINE`), DHCP on the access-point interface only with the upstream
//! excluded (`ONLINE_*`), or DHCP disabled entirely (`SERVER_*`).

use crate::config::NetworkSettings;
use crate::netmode::NetworkMode;

/// Render the dnsmasq fragment for `mode`.
pub fn render(mode: NetworkMode, net: &NetworkSettings, upstream: Option<&str>) -> String {
    let gateway = net
        .ap_address
        .split('/')
        .next()
        .unwrap_or(&net.ap_address);

    let mut out = format!("# Generated by stackpilot for mode {mode} - do not edit.\n");

    if mode.has_access_point() {
        out.push_str(&format!("dhcp-range={}\n", net.dhcp_range));
        out.push_str(&format!("dhcp-option=option:router,{gateway}\n"));
        out.push_str(&format!("dhcp-option=option:dns-server,{gateway}\n"));
        if mode.has_nat() {
            // Serve only the hotspot; never answer DHCP toward the upstream.
            out.push_str(&format!("interface={}\n", net.ap_iface));
            if let Some(upstream) = upstream {
                out.push_str(&format!("except-interface={upstream}\n"));
            }
            out.push_str("bind-interfaces\n");
        }
    } else {
        out.push_str("# DHCP disabled: appliance is a network client in this mode.\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net() -> NetworkSettings {
        NetworkSettings::default()
    }

    #[test]
    fn offline_serves_every_interface() {
        let conf = render(NetworkMode::Offline, &net(), None);
        assert!(conf.contains("dhcp-range=10.1.1.10,10.1.1.250,12h"));
        assert!(conf.contains("option:router,10.1.1.1"));
        // No interface restriction in OFFLINE.
        assert!(!conf.contains("interface="));
    }

    #[test]
    fn online_serves_ap_only_and_excludes_upstream() {
        let conf = render(NetworkMode::OnlineEth, &net(), Some("eth0"));
        assert!(conf.contains("interface=wlan0"));
        assert!(conf.contains("except-interface=eth0"));
        assert!(conf.contains("dhcp-range="));
    }

    #[test]
    fn server_modes_disable_dhcp() {
        for mode in [NetworkMode::ServerEth, NetworkMode::ServerWifi] {
            let conf = render(mode, &net(), Some("eth0"));
            assert!(!conf.contains("dhcp-range="), "{mode}");
        }
    }
}
