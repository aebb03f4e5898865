//! Centralized constants for timeouts, thresholds and defaults.
//!
//! All magic numbers in the control plane are defined here with documented
//! rationale, so tuning for slower hardware is a one-file change.

// Allow unused constants - a few are defined for operators reading the code
// and for the diagnostics output rather than for direct use.
#![allow(dead_code)]

// =============================================================================
// Boot Orchestration
// =============================================================================

/// Number of ordered boot stages. The progress marker is written as `k/9`.
pub const BOOT_STAGE_COUNT: u32 = 9;

/// Dead-man's-switch poll interval.
/// Rationale: coarse enough to be free, fine enough that a stale heartbeat
/// is acted on within one interval of crossing the threshold.
pub const MONITOR_POLL_SECS: u64 = 15;

/// Heartbeat age beyond which a still-running boot worker is considered
/// hung rather than busy. Every bounded wait refreshes the heartbeat, so a
/// legitimate wait never approaches this.
pub const HEARTBEAT_STALE_SECS: i64 = 180;

/// Hard ceiling on total boot time before the monitor forces a reboot.
pub const BOOT_HARD_CEILING_SECS: u64 = 900;

/// Grace period between SIGTERM and SIGKILL when terminating the worker.
pub const TERMINATE_GRACE_SECS: u64 = 10;

/// Age of a still-"starting" boot state at which the one-shot boot-timeout
/// supervisor intervenes (20 minutes).
pub const BOOT_TIMEOUT_SUPERVISOR_SECS: i64 = 1200;

// =============================================================================
// Cluster Bootstrap
// =============================================================================

/// Swarm control-plane port used when advertising an explicit address.
pub const SWARM_PORT: u16 = 2377;

/// Name of the shared overlay network every stack attaches to.
pub const OVERLAY_NETWORK: &str = "appliance-net";

/// Overlay subnet. Chosen outside the default bridge pool (172.17.0.0/16)
/// and outside the per-stack bridge ranges so a recreate never collides.
pub const OVERLAY_SUBNET: &str = "10.200.0.0/24";

/// Overlay create retry ladder: linear 2,4,6,8,10 seconds, 5 attempts.
pub const OVERLAY_CREATE_ATTEMPTS: usize = 5;
pub const OVERLAY_BACKOFF_STEP_SECS: u64 = 2;

/// Stack deploy retries: 3 attempts with a fixed 3s delay.
pub const STACK_DEPLOY_ATTEMPTS: usize = 3;
pub const STACK_DEPLOY_DELAY_SECS: u64 = 3;

// =============================================================================
// Network Mode Engine
// =============================================================================

/// Address the access-point interface carries in AP modes (CIDR).
pub const AP_ADDRESS_CIDR: &str = "10.1.1.1/24";

/// Subnet NATed out of the appliance in the ONLINE modes.
pub const AP_SUBNET: &str = "10.1.1.0/24";

/// DHCP pool handed out on the access-point network.
pub const DHCP_RANGE: &str = "10.1.1.10,10.1.1.250,12h";

// =============================================================================
// Health & Watchdog
// =============================================================================

/// Per-probe HTTP timeout. Probes hit loopback; anything slower is down.
pub const HEALTH_PROBE_TIMEOUT_SECS: u64 = 5;

/// Minimum free disk space before the watchdog starts reclaiming (bytes).
pub const MIN_FREE_DISK_BYTES: u64 = 512 * 1024 * 1024;

/// Bounded-wait defaults for engine readiness after a restart.
pub const ENGINE_WAIT_TIMEOUT_SECS: u64 = 60;
pub const ENGINE_WAIT_INTERVAL_SECS: u64 = 3;

// =============================================================================
// Paths
// =============================================================================

/// Appliance configuration file.
pub const CONFIG_FILE: &str = "/etc/stackpilot/stackpilot.toml";

/// Ephemeral runtime markers (heartbeat, progress, boot state).
pub const RUNTIME_DIR: &str = "/run/stackpilot";

/// Persistent state (provisioning marker, secrets, network config store).
pub const STATE_DIR: &str = "/var/lib/stackpilot";

/// Generated netplan document. Fully owned by the network mode engine.
pub const NETPLAN_FILE: &str = "/etc/netplan/60-stackpilot.yaml";

/// Generated dnsmasq scope snippet.
pub const DNSMASQ_FILE: &str = "/etc/dnsmasq.d/stackpilot.conf";
