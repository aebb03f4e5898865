//! Appliance configuration.
//!
//! Loads control-plane settings from `/etc/stackpilot/stackpilot.toml`.
//! A missing file is valid and yields the shipped defaults; an invalid file
//! is an error. The loaded [`AppContext`] is passed explicitly into every
//! component - there is no mutable global configuration state.
//!
//! # Example Configuration
//!
//! ```toml
//! [network]
//! ap_iface = "wlan0"
//! eth_iface = "eth0"
//! wifi_client_iface = "wlan1"
//! wifi_country = "DE"
//!
//! [cluster]
//! gateway_addr = "10.1.1.1"
//!
//! [[stacks]]
//! name = "core"
//! compose_file = "/opt/appliance/stacks/core.yml"
//! phase = "core"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::constants;

/// Deployment phase a stack belongs to. Phases map onto boot stages:
/// `core` deploys in stage 5, `hardware` in stage 7, `app` in stage 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackPhase {
    Core,
    Hardware,
    App,
}

/// One stack managed by the cluster bootstrap and the watchdog.
#[derive(Debug, Clone, Deserialize)]
pub struct StackSpec {
    /// Stack name as passed to the cluster scheduler.
    pub name: String,
    /// Compose definition. Absence at deploy time is a warning, not an error.
    pub compose_file: PathBuf,
    /// Which boot stage deploys this stack.
    pub phase: StackPhase,
    /// Expected replica count across the stack's services.
    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

/// One HTTP liveness endpoint probed in stage 9 and by the watchdog.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceProbe {
    /// Service name, for logging only.
    pub name: String,
    /// Liveness URL. HTTP success status is the sole healthy signal.
    pub url: String,
}

/// Network interface layout and radio settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    /// Interface operated as the local hotspot, owned by hostapd.
    pub ap_iface: String,
    /// Wired upstream interface.
    pub eth_iface: String,
    /// Secondary wireless interface used as upstream in ONLINE_WIFI mode.
    pub wifi_client_iface: String,
    /// Regulatory domain emitted into generated wifi stanzas.
    pub wifi_country: String,
    /// Address the access-point interface carries in AP modes (CIDR).
    pub ap_address: String,
    /// Subnet NATed upstream in the ONLINE modes.
    pub ap_subnet: String,
    /// DHCP pool served on the access-point network.
    pub dhcp_range: String,
}

/// Cluster bootstrap settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterSettings {
    /// Address advertised on swarm init. Matches the AP gateway address.
    pub gateway_addr: String,
    /// Shared overlay network name.
    pub overlay_network: String,
    /// Shared overlay subnet.
    pub overlay_subnet: String,
}

/// Boot orchestration settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BootSettings {
    /// Command the monitor invokes when the hard boot ceiling is exceeded.
    pub reboot_command: Vec<String>,
    /// Swap/compressed-memory unit ensured in stage 1.
    pub swap_unit: String,
    /// Recurring watchdog timer armed after a successful boot.
    pub watchdog_timer_unit: String,
}

/// Watchdog thresholds and cleanup targets.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchdogSettings {
    /// Minimum free disk space before reclaiming starts (bytes).
    pub min_free_disk_bytes: u64,
    /// Leftover artifacts from previous releases, removed when present.
    pub obsolete_paths: Vec<PathBuf>,
    /// System resolver file checked for a nameserver entry.
    pub resolv_conf: PathBuf,
}

/// Control-plane context: every path, interface and threshold the
/// orchestrator, engine and watchdog need. Loaded once, passed by reference.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppContext {
    pub network: NetworkSettings,
    pub cluster: ClusterSettings,
    pub boot: BootSettings,
    pub watchdog: WatchdogSettings,
    /// Stacks in deployment order within each phase.
    pub stacks: Vec<StackSpec>,
    /// Liveness endpoints for stage-9 verification and the watchdog.
    pub probes: Vec<ServiceProbe>,
    /// Ephemeral marker directory (heartbeat, progress, boot state).
    pub runtime_dir: PathBuf,
    /// Persistent state directory (provisioning marker, secrets, store).
    pub state_dir: PathBuf,
    /// Generated netplan document path.
    pub netplan_file: PathBuf,
    /// Generated dnsmasq snippet path.
    pub dnsmasq_file: PathBuf,
}

const fn default_replicas() -> u32 {
    1
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            ap_iface: "wlan0".into(),
            eth_iface: "eth0".into(),
            wifi_client_iface: "wlan1".into(),
            wifi_country: "DE".into(),
            ap_address: constants::AP_ADDRESS_CIDR.into(),
            ap_subnet: constants::AP_SUBNET.into(),
            dhcp_range: constants::DHCP_RANGE.into(),
        }
    }
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            gateway_addr: "10.1.1.1".into(),
            overlay_network: constants::OVERLAY_NETWORK.into(),
            overlay_subnet: constants::OVERLAY_SUBNET.into(),
        }
    }
}

impl Default for BootSettings {
    fn default() -> Self {
        Self {
            reboot_command: vec!["systemctl".into(), "reboot".into()],
            swap_unit: "zramswap.service".into(),
            watchdog_timer_unit: "stackpilot-watchdog.timer".into(),
        }
    }
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            min_free_disk_bytes: constants::MIN_FREE_DISK_BYTES,
            obsolete_paths: Vec::new(),
            resolv_conf: PathBuf::from("/etc/resolv.conf"),
        }
    }
}

impl AppContext {
    /// Load the context from the default configuration path.
    ///
    /// A missing file yields defaults; a malformed file is an error.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(constants::CONFIG_FILE))
    }

    /// Load the context from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Config not found, using defaults");
            return Ok(Self::default_paths(Self::default()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let ctx: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))?;

        let ctx = Self::default_paths(ctx);
        tracing::info!(
            path = %path.display(),
            stacks = ctx.stacks.len(),
            probes = ctx.probes.len(),
            "Loaded appliance configuration"
        );
        Ok(ctx)
    }

    /// Fill empty path fields with the shipped locations. Paths deserialize
    /// to empty when absent, so defaults are applied after parsing.
    fn default_paths(mut ctx: Self) -> Self {
        if ctx.runtime_dir.as_os_str().is_empty() {
            ctx.runtime_dir = PathBuf::from(constants::RUNTIME_DIR);
        }
        if ctx.state_dir.as_os_str().is_empty() {
            ctx.state_dir = PathBuf::from(constants::STATE_DIR);
        }
        if ctx.netplan_file.as_os_str().is_empty() {
            ctx.netplan_file = PathBuf::from(constants::NETPLAN_FILE);
        }
        if ctx.dnsmasq_file.as_os_str().is_empty() {
            ctx.dnsmasq_file = PathBuf::from(constants::DNSMASQ_FILE);
        }
        ctx
    }

    /// Stacks belonging to one deployment phase, in configuration order.
    pub fn stacks_in_phase(&self, phase: StackPhase) -> impl Iterator<Item = &StackSpec> {
        self.stacks.iter().filter(move |s| s.phase == phase)
    }

    // Marker and state file locations. Components never assemble these
    // themselves, so relocating state is a config-only change.

    pub fn heartbeat_path(&self) -> PathBuf {
        self.runtime_dir.join("heartbeat")
    }

    pub fn progress_path(&self) -> PathBuf {
        self.runtime_dir.join("progress")
    }

    pub fn boot_state_path(&self) -> PathBuf {
        self.runtime_dir.join("boot-state")
    }

    pub fn worker_pid_path(&self) -> PathBuf {
        self.runtime_dir.join("worker.pid")
    }

    pub fn provisioned_marker_path(&self) -> PathBuf {
        self.state_dir.join("provisioned")
    }

    pub fn secrets_path(&self) -> PathBuf {
        self.state_dir.join("secrets.env")
    }

    pub fn store_path(&self) -> PathBuf {
        self.state_dir.join("netconfig.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_context_has_shipped_paths() {
        let ctx = AppContext::default_paths(AppContext::default());
        assert_eq!(ctx.netplan_file, PathBuf::from(constants::NETPLAN_FILE));
        assert_eq!(ctx.network.ap_iface, "wlan0");
        assert!(ctx.stacks.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
runtime_dir = "/tmp/sp-run"

[network]
ap_iface = "wlan0"
eth_iface = "enp1s0"
wifi_country = "GB"

[cluster]
gateway_addr = "10.41.0.1"

[[stacks]]
name = "core"
compose_file = "/opt/stacks/core.yml"
phase = "core"

[[stacks]]
name = "sensors"
compose_file = "/opt/stacks/sensors.yml"
phase = "hardware"
replicas = 2

[[probes]]
name = "proxy"
url = "http://127.0.0.1:80/health"
"#;
        let ctx: AppContext = toml::from_str(toml).unwrap();
        let ctx = AppContext::default_paths(ctx);
        assert_eq!(ctx.network.eth_iface, "enp1s0");
        assert_eq!(ctx.cluster.gateway_addr, "10.41.0.1");
        assert_eq!(ctx.runtime_dir, PathBuf::from("/tmp/sp-run"));
        // Unset paths fall back to shipped defaults.
        assert_eq!(ctx.state_dir, PathBuf::from(constants::STATE_DIR));
        assert_eq!(ctx.stacks_in_phase(StackPhase::Core).count(), 1);
        assert_eq!(
            ctx.stacks_in_phase(StackPhase::Hardware).next().unwrap().replicas,
            2
        );
        assert_eq!(ctx.probes[0].name, "proxy");
    }

    #[test]
    fn parse_empty_config_is_all_defaults() {
        let ctx: AppContext = toml::from_str("").unwrap();
        assert_eq!(ctx.boot.swap_unit, "zramswap.service");
        assert_eq!(ctx.watchdog.min_free_disk_bytes, constants::MIN_FREE_DISK_BYTES);
    }
}
