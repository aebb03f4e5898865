//! Connectivity modes and the persisted network configuration.
//!
//! The five modes are mutually exclusive; everything else in the engine is
//! derived from the mode plus the stored credentials and static-IP settings.

use serde::{Deserialize, Serialize};

/// Connectivity mode of the appliance.
///
/// An unknown stored value maps explicitly to `Offline` - the only mode with
/// no upstream dependency - never to an implicit default branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NetworkMode {
    /// Access point only, no upstream.
    #[default]
    Offline,
    /// Access point, NAT via the wired upstream.
    OnlineEth,
    /// Access point, NAT via the secondary wireless upstream.
    OnlineWifi,
    /// No access point; wired client only.
    ServerEth,
    /// No access point; wireless client only.
    ServerWifi,
}

impl NetworkMode {
    /// Canonical on-disk / console spelling.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "OFFLINE",
            Self::OnlineEth => "ONLINE_ETH",
            Self::OnlineWifi => "ONLINE_WIFI",
            Self::ServerEth => "SERVER_ETH",
            Self::ServerWifi => "SERVER_WIFI",
        }
    }

    /// Parse a stored or console-entered mode string.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "ONLINE_ETH" => Self::OnlineEth,
            "ONLINE_WIFI" => Self::OnlineWifi,
            "SERVER_ETH" => Self::ServerEth,
            "SERVER_WIFI" => Self::ServerWifi,
            "OFFLINE" => Self::Offline,
            other => {
                if !other.is_empty() {
                    tracing::warn!(mode = other, "Unknown network mode, falling back to OFFLINE");
                }
                Self::Offline
            },
        }
    }

    /// Whether this mode runs the local hotspot.
    pub const fn has_access_point(self) -> bool {
        matches!(self, Self::Offline | Self::OnlineEth | Self::OnlineWifi)
    }

    /// Whether this mode NATs the access-point subnet upstream.
    pub const fn has_nat(self) -> bool {
        matches!(self, Self::OnlineEth | Self::OnlineWifi)
    }

    /// The single upstream interface of this mode, if one exists.
    ///
    /// In `SERVER_WIFI` the primary radio itself is the client; `OFFLINE`
    /// has no upstream at all.
    pub fn upstream_iface<'a>(self, net: &'a crate::config::NetworkSettings) -> Option<&'a str> {
        match self {
            Self::Offline => None,
            Self::OnlineEth | Self::ServerEth => Some(&net.eth_iface),
            Self::OnlineWifi => Some(&net.wifi_client_iface),
            Self::ServerWifi => Some(&net.ap_iface),
        }
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted network configuration (single row in the config store).
///
/// `wifi_ssid`/`wifi_password` are the credentials for joining an upstream
/// network in the `*_WIFI` modes; the access point's own credentials live in
/// the generated secrets file.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub mode: NetworkMode,
    pub wifi_ssid: String,
    pub wifi_password: String,
    pub use_static_ip: bool,
    pub static_ip: String,
    pub static_netmask: String,
    pub static_gateway: String,
    pub static_dns_primary: String,
    pub static_dns_secondary: String,
}

/// Validated static addressing for the mode's single upstream interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIp {
    /// Address in CIDR notation, prefix derived from the stored netmask.
    pub address_cidr: String,
    pub gateway: String,
    pub nameservers: Vec<String>,
}

impl NetworkConfig {
    /// Static override for the upstream interface, if enabled and valid.
    ///
    /// `use_static_ip` with an empty address or gateway is rejected and the
    /// interface falls back to DHCP. `Offline` has no upstream, so static
    /// addressing never applies there.
    pub fn static_override(&self) -> Option<StaticIp> {
        if !self.use_static_ip || self.mode == NetworkMode::Offline {
            return None;
        }
        if self.static_ip.is_empty() || self.static_gateway.is_empty() {
            tracing::warn!(
                "Static IP enabled but address or gateway is empty; using DHCP instead"
            );
            return None;
        }

        let prefix = netmask_to_prefix(&self.static_netmask);
        let mut nameservers = Vec::new();
        if !self.static_dns_primary.is_empty() {
            nameservers.push(self.static_dns_primary.clone());
        }
        if !self.static_dns_secondary.is_empty() {
            nameservers.push(self.static_dns_secondary.clone());
        }

        Some(StaticIp {
            address_cidr: format!("{}/{prefix}", self.static_ip),
            gateway: self.static_gateway.clone(),
            nameservers,
        })
    }
}

/// Convert a dotted netmask to a prefix length.
///
/// The console stores dotted netmasks; netplan wants CIDR. An unparseable
/// mask falls back to /24 with a warning rather than failing the apply.
fn netmask_to_prefix(netmask: &str) -> u32 {
    let octets: Vec<Option<u8>> = netmask.split('.').map(|o| o.parse().ok()).collect();
    if octets.len() == 4 && octets.iter().all(Option::is_some) {
        let bits = octets
            .iter()
            .map(|o| u32::from(o.unwrap_or(0).count_ones()))
            .sum();
        // A valid mask is contiguous ones; anything else is garbage.
        let value = octets
            .iter()
            .fold(0u32, |acc, o| (acc << 8) | u32::from(o.unwrap_or(0)));
        if value.leading_ones() == bits {
            return bits;
        }
    }
    tracing::warn!(netmask = netmask, "Unparseable netmask, assuming /24");
    24
}
