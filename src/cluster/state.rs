//! Derived cluster state.

use crate::exec::Runner;

/// Snapshot of the cluster substrate, probed fresh before every operation.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ClusterState {
    pub engine_reachable: bool,
    pub swarm_active: bool,
    pub overlay_present: bool,
    /// `swarm` for a healthy cluster-wide network, `local` for the stale
    /// leftover a force-recovered node can carry.
    pub overlay_scope: Option<String>,
}

impl ClusterState {
    /// Probe the engine, swarm membership and the named overlay network.
    pub fn probe(runner: &dyn Runner, overlay_name: &str) -> Self {
        let engine_reachable = runner
            .run("docker", &["info", "--format", "{{.ServerVersion}}"])
            .map(|o| o.success)
            .unwrap_or(false);

        if !engine_reachable {
            return Self::default();
        }

        let swarm_active = runner
            .run("docker", &["info", "--format", "{{.Swarm.LocalNodeState}}"])
            .map(|o| o.success && o.stdout_trimmed() == "active")
            .unwrap_or(false);

        let overlay_scope = network_scope(runner, overlay_name);

        Self {
            engine_reachable,
            swarm_active,
            overlay_present: overlay_scope.is_some(),
            overlay_scope,
        }
    }
}

/// Scope of a named network, or `None` when it does not exist.
pub fn network_scope(runner: &dyn Runner, name: &str) -> Option<String> {
    let out = runner
        .run("docker", &["network", "inspect", name, "--format", "{{.Scope}}"])
        .ok()?;
    if out.success && !out.stdout_trimmed().is_empty() {
        Some(out.stdout_trimmed().to_string())
    } else {
        None
    }
}
