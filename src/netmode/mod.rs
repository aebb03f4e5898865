//! Network mode engine.
//!
//! Pure mapping from (mode, credentials, static-IP settings) to a network
//! configuration document, a DHCP scope and a NAT policy, plus the runtime
//! actions that make the running system match. Mode changes are explicit:
//! a config-store write followed by [`apply_network_mode`], never implicit.

mod apply;
pub mod dnsmasq;
mod mode;
pub mod nat;
pub mod netplan;

pub use apply::{apply_network_mode, write_early_network_config};
pub use mode::{NetworkConfig, NetworkMode, StaticIp};
