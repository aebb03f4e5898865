//! NAT policy: masquerading from the access-point subnet to the upstream.

use anyhow::{bail, Result};

use crate::exec::Runner;

/// Flush the NAT table and masquerade `subnet` out of `upstream`.
pub fn enable_masquerade(runner: &dyn Runner, subnet: &str, upstream: &str) -> Result<()> {
    flush(runner)?;

    let out = runner.run("sysctl", &["-w", "net.ipv4.ip_forward=1"])?;
    if !out.success {
        tracing::warn!(stderr = %out.stderr.trim(), "Failed to enable IP forwarding");
    }

    let out = runner.run(
        "iptables",
        &[
            "-t", "nat", "-A", "POSTROUTING", "-s", subnet, "-o", upstream, "-j", "MASQUERADE",
        ],
    )?;
    if !out.success {
        bail!("iptables masquerade failed: {}", out.stderr.trim());
    }
    tracing::info!(subnet = subnet, upstream = upstream, "Masquerading enabled");
    Ok(())
}

/// Disable NAT entirely (the `SERVER_*` modes).
pub fn disable(runner: &dyn Runner) -> Result<()> {
    flush(runner)?;
    tracing::info!("NAT disabled");
    Ok(())
}

/// Drop any static address left on the access-point interface.
pub fn flush_ap_address(runner: &dyn Runner, iface: &str) -> Result<()> {
    let out = runner.run("ip", &["addr", "flush", "dev", iface])?;
    if !out.success {
        bail!("address flush on {iface} failed: {}", out.stderr.trim());
    }
    Ok(())
}

fn flush(runner: &dyn Runner) -> Result<()> {
    let out = runner.run("iptables", &["-t", "nat", "-F", "POSTROUTING"])?;
    if !out.success {
        bail!("NAT flush failed: {}", out.stderr.trim());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::FakeRunner;

    #[test]
    fn masquerade_flushes_before_adding() {
        let runner = FakeRunner::new();
        enable_masquerade(&runner, "10.1.1.0/24", "eth0").unwrap();
        let calls = runner.calls();
        let flush_idx = calls
            .iter()
            .position(|c| c.starts_with("iptables -t nat -F"))
            .unwrap();
        let add_idx = calls
            .iter()
            .position(|c| c.contains("MASQUERADE"))
            .unwrap();
        assert!(flush_idx < add_idx);
        assert!(calls[add_idx].contains("-o eth0"));
    }

    #[test]
    fn disable_only_flushes() {
        let runner = FakeRunner::new();
        disable(&runner).unwrap();
        assert_eq!(runner.calls_matching("iptables").len(), 1);
    }
}
