//! Typed netplan document generation.
//!
//! One document per mode, produced by a single serializer over a typed
//! value - the five modes never share a fallback branch, and the
//! access-point interface only ever appears under the AP-owned `ethernets`
//! stanza (hostapd keeps exclusive control of radio association; handing
//! the interface to the `wifis` client stanza would fight it for the radio).
//!
//! The rendered file is machine-generated, fully overwritten on every
//! apply, and never hand-edited.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::config::NetworkSettings;
use crate::netmode::{NetworkConfig, NetworkMode, StaticIp};

/// Complete generated document.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct NetplanDocument {
    pub network: NetworkSection,
}

/// Top-level `network:` section.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct NetworkSection {
    pub version: u8,
    pub renderer: &'static str,
    #[serde(skip_serializing_if = "Option::is_none", rename = "regulatory-domain")]
    pub regulatory_domain: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub ethernets: BTreeMap<String, Iface>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub wifis: BTreeMap<String, Iface>,
}

/// One interface stanza.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct Iface {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp4: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nameservers: Option<Nameservers>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "access-points")]
    pub access_points: Option<BTreeMap<String, AccessPoint>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Route {
    pub to: String,
    pub via: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct Nameservers {
    pub addresses: Vec<String>,
}

/// Credentials for joining an upstream network as a client.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct AccessPoint {
    pub password: String,
}

impl Iface {
    /// The AP-owned stanza entry: static hotspot address, no DHCP client.
    fn access_point(net: &NetworkSettings) -> Self {
        Self {
            dhcp4: Some(false),
            addresses: vec![net.ap_address.clone()],
            ..Self::default()
        }
    }

    /// An upstream interface: DHCP unless a valid static override exists.
    fn upstream(static_ip: Option<&StaticIp>) -> Self {
        match static_ip {
            Some(st) => Self {
                dhcp4: Some(false),
                addresses: vec![st.address_cidr.clone()],
                routes: vec![Route {
                    to: "default".into(),
                    via: st.gateway.clone(),
                }],
                nameservers: (!st.nameservers.is_empty()).then(|| Nameservers {
                    addresses: st.nameservers.clone(),
                }),
                optional: Some(true),
                ..Self::default()
            },
            None => Self {
                dhcp4: Some(true),
                optional: Some(true),
                ..Self::default()
            },
        }
    }

    /// A wireless upstream: client stanza with the stored credentials.
    fn wifi_upstream(cfg: &NetworkConfig, static_ip: Option<&StaticIp>) -> Self {
        let mut iface = Self::upstream(static_ip);
        let mut points = BTreeMap::new();
        points.insert(
            cfg.wifi_ssid.clone(),
            AccessPoint {
                password: cfg.wifi_password.clone(),
            },
        );
        iface.access_points = Some(points);
        iface
    }
}

/// Build the document for the configured mode.
///
/// Each arm constructs its stanza set explicitly; there is no shared
/// template an unknown mode could fall into.
pub fn build_document(cfg: &NetworkConfig, net: &NetworkSettings) -> NetplanDocument {
    let static_ip = cfg.static_override();
    let mut ethernets = BTreeMap::new();
    let mut wifis = BTreeMap::new();

    match cfg.mode {
        NetworkMode::Offline => {
            ethernets.insert(net.ap_iface.clone(), Iface::access_point(net));
        },
        NetworkMode::OnlineEth => {
            ethernets.insert(net.ap_iface.clone(), Iface::access_point(net));
            ethernets.insert(net.eth_iface.clone(), Iface::upstream(static_ip.as_ref()));
        },
        NetworkMode::OnlineWifi => {
            ethernets.insert(net.ap_iface.clone(), Iface::access_point(net));
            wifis.insert(
                net.wifi_client_iface.clone(),
                Iface::wifi_upstream(cfg, static_ip.as_ref()),
            );
        },
        NetworkMode::ServerEth => {
            ethernets.insert(net.eth_iface.clone(), Iface::upstream(static_ip.as_ref()));
        },
        NetworkMode::ServerWifi => {
            wifis.insert(
                net.ap_iface.clone(),
                Iface::wifi_upstream(cfg, static_ip.as_ref()),
            );
        },
    }

    NetplanDocument {
        network: NetworkSection {
            version: 2,
            renderer: "networkd",
            regulatory_domain: (!wifis.is_empty()).then(|| net.wifi_country.clone()),
            ethernets,
            wifis,
        },
    }
}

/// Render the document to YAML with the generated-file header.
pub fn render(doc: &NetplanDocument, mode: NetworkMode) -> Result<String> {
    let yaml = serde_yaml::to_string(doc).context("Failed to serialize netplan document")?;
    Ok(format!(
        "# Generated by stackpilot for mode {mode} - do not edit.\n{yaml}"
    ))
}

/// Atomically overwrite `path` with `content`, mode 0600.
///
/// Written to a temp file in the target directory and renamed over the
/// destination so the network renderer never observes a partial document.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("No parent directory for {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create {}", parent.display()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(content.as_bytes())
        .context("Failed to write generated document")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        // netplan refuses world-readable config since 0.106.
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))
            .context("Failed to set document permissions")?;
    }

    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net() -> NetworkSettings {
        NetworkSettings::default()
    }

    fn cfg(mode: NetworkMode) -> NetworkConfig {
        NetworkConfig {
            mode,
            wifi_ssid: "upstream-net".into(),
            wifi_password: "swordfish99".into(),
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn ap_modes_put_ap_iface_in_ethernets_never_wifis() {
        for mode in [
            NetworkMode::Offline,
            NetworkMode::OnlineEth,
            NetworkMode::OnlineWifi,
        ] {
            let doc = build_document(&cfg(mode), &net());
            let ap = doc
                .network
                .ethernets
                .get("wlan0")
                .unwrap_or_else(|| panic!("{mode}: AP stanza missing"));
            assert_eq!(ap.addresses, vec!["10.1.1.1/24".to_string()], "{mode}");
            assert_eq!(ap.dhcp4, Some(false), "{mode}");
            assert!(!doc.network.wifis.contains_key("wlan0"), "{mode}");
        }
    }

    #[test]
    fn server_modes_never_render_an_ap_stanza() {
        let doc = build_document(&cfg(NetworkMode::ServerEth), &net());
        assert!(!doc.network.ethernets.contains_key("wlan0"));
        assert!(doc.network.wifis.is_empty());

        let doc = build_document(&cfg(NetworkMode::ServerWifi), &net());
        // wlan0 is a plain client here: wifis stanza, no hotspot address.
        let client = doc.network.wifis.get("wlan0").unwrap();
        assert_eq!(client.dhcp4, Some(true));
        assert!(client.addresses.is_empty());
        assert!(client.access_points.as_ref().unwrap().contains_key("upstream-net"));
        assert!(!doc.network.ethernets.contains_key("wlan0"));
    }

    #[test]
    fn online_wifi_uses_secondary_interface_for_upstream() {
        let doc = build_document(&cfg(NetworkMode::OnlineWifi), &net());
        assert!(doc.network.wifis.contains_key("wlan1"));
        assert!(!doc.network.wifis.contains_key("wlan0"));
        assert_eq!(doc.network.regulatory_domain.as_deref(), Some("DE"));
    }

    #[test]
    fn static_override_applies_to_the_upstream_interface() {
        let mut c = cfg(NetworkMode::OnlineEth);
        c.use_static_ip = true;
        c.static_ip = "192.168.0.40".into();
        c.static_netmask = "255.255.255.0".into();
        c.static_gateway = "192.168.0.1".into();
        c.static_dns_primary = "1.1.1.1".into();

        let doc = build_document(&c, &net());
        let eth = doc.network.ethernets.get("eth0").unwrap();
        assert_eq!(eth.dhcp4, Some(false));
        assert_eq!(eth.addresses, vec!["192.168.0.40/24".to_string()]);
        assert_eq!(eth.routes[0].via, "192.168.0.1");
        // The AP stanza is untouched by the override.
        let ap = doc.network.ethernets.get("wlan0").unwrap();
        assert_eq!(ap.addresses, vec!["10.1.1.1/24".to_string()]);
    }

    #[test]
    fn invalid_static_falls_back_to_dhcp() {
        let mut c = cfg(NetworkMode::ServerEth);
        c.use_static_ip = true;
        c.static_ip = "192.168.0.40".into();
        // No gateway: must fall back to DHCP.
        let doc = build_document(&c, &net());
        let eth = doc.network.ethernets.get("eth0").unwrap();
        assert_eq!(eth.dhcp4, Some(true));
        assert!(eth.addresses.is_empty());
    }

    #[test]
    fn rendering_is_deterministic() {
        let c = cfg(NetworkMode::OnlineWifi);
        let a = render(&build_document(&c, &net()), c.mode).unwrap();
        let b = render(&build_document(&c, &net()), c.mode).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with("# Generated by stackpilot"));
    }

    #[test]
    fn write_atomic_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("60-stackpilot.yaml");
        write_atomic(&path, "first\n").unwrap();
        write_atomic(&path, "second\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "second\n");
    }
}
