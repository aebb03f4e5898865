//! Swarm activation with a multi-strategy fallback chain.

use crate::cluster::{Readiness, state::ClusterState};
use crate::config::AppContext;
use crate::constants;
use crate::exec::Runner;

/// Bring the node to "swarm active".
///
/// No-op when the swarm is already active. Otherwise three init strategies
/// are attempted in order, each one's stderr captured and logged before
/// falling through:
///
/// 1. advertise the known gateway address on the control-plane port;
/// 2. `--force-new-cluster` with the same address - recovers a node that
///    was a member but lost quorum;
/// 3. let the engine pick an address - last resort when the expected
///    interface has no IP yet.
pub fn ensure_swarm(ctx: &AppContext, runner: &dyn Runner) -> Readiness {
    let state = ClusterState::probe(runner, &ctx.cluster.overlay_network);
    if state.swarm_active {
        tracing::debug!("Swarm already active");
        return Readiness::Ready;
    }
    if !state.engine_reachable {
        tracing::warn!("Container engine unreachable; cannot initialize swarm");
        return Readiness::Degraded;
    }

    let advertise = format!("{}:{}", ctx.cluster.gateway_addr, constants::SWARM_PORT);
    let strategies: [(&str, Vec<&str>); 3] = [
        (
            "advertise gateway address",
            vec!["swarm", "init", "--advertise-addr", &advertise],
        ),
        (
            "force new cluster",
            vec![
                "swarm",
                "init",
                "--force-new-cluster",
                "--advertise-addr",
                &advertise,
            ],
        ),
        ("auto-select address", vec!["swarm", "init"]),
    ];

    for (attempt, (label, args)) in strategies.iter().enumerate() {
        let out = match runner.run("docker", args) {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!(attempt = attempt + 1, strategy = label, error = %e, "Swarm init could not run");
                continue;
            },
        };
        if out.success {
            tracing::info!(attempt = attempt + 1, strategy = label, "Swarm initialized");
            return Readiness::Ready;
        }
        // Silent fallthrough is a defect class; always log the stderr.
        tracing::warn!(
            attempt = attempt + 1,
            strategy = label,
            stderr = %out.stderr.trim(),
            "Swarm init attempt failed"
        );
    }

    tracing::error!("All swarm init strategies failed");
    Readiness::Degraded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{CmdOutput, FakeRunner};

    fn engine_up(runner: &FakeRunner, swarm_state: &str) {
        runner.always(
            "docker info --format {{.ServerVersion}}",
            CmdOutput::ok("27.1.1\n"),
        );
        runner.always(
            "docker info --format {{.Swarm.LocalNodeState}}",
            CmdOutput::ok(swarm_state),
        );
        runner.always(
            "docker network inspect",
            CmdOutput::err("Error: No such network"),
        );
    }

    #[test]
    fn active_swarm_is_a_noop() {
        let runner = FakeRunner::new();
        engine_up(&runner, "active\n");
        assert_eq!(ensure_swarm(&AppContext::default(), &runner), Readiness::Ready);
        assert!(runner.calls_matching("docker swarm init").is_empty());
    }

    #[test]
    fn fallback_chain_tries_force_new_cluster_then_auto_address() {
        let runner = FakeRunner::new();
        engine_up(&runner, "inactive\n");
        runner.on(
            "docker swarm init --advertise-addr",
            CmdOutput::err("could not find an address"),
        );
        runner.on(
            "docker swarm init --force-new-cluster",
            CmdOutput::err("not part of a swarm"),
        );
        runner.on("docker swarm init", CmdOutput::ok("Swarm initialized"));

        assert_eq!(ensure_swarm(&AppContext::default(), &runner), Readiness::Ready);
        let inits = runner.calls_matching("docker swarm init");
        assert_eq!(inits.len(), 3);
        assert_eq!(inits[0], "docker swarm init --advertise-addr 10.1.1.1:2377");
        assert!(inits[1].contains("--force-new-cluster"));
        assert_eq!(inits[2], "docker swarm init");
    }

    #[test]
    fn first_strategy_success_stops_the_chain() {
        let runner = FakeRunner::new();
        engine_up(&runner, "inactive\n");
        runner.on("docker swarm init", CmdOutput::ok("Swarm initialized"));
        assert_eq!(ensure_swarm(&AppContext::default(), &runner), Readiness::Ready);
        assert_eq!(runner.calls_matching("docker swarm init").len(), 1);
    }

    #[test]
    fn exhausted_chain_degrades() {
        let runner = FakeRunner::new();
        engine_up(&runner, "inactive\n");
        runner.always("docker swarm init", CmdOutput::err("init refused"));
        assert_eq!(
            ensure_swarm(&AppContext::default(), &runner),
            Readiness::Degraded
        );
        assert_eq!(runner.calls_matching("docker swarm init").len(), 3);
    }

    #[test]
    fn dead_engine_degrades_without_init_attempts() {
        let runner = FakeRunner::new();
        runner.always("docker info", CmdOutput::err("daemon down"));
        assert_eq!(
            ensure_swarm(&AppContext::default(), &runner),
            Readiness::Degraded
        );
        assert!(runner.calls_matching("docker swarm init").is_empty());
    }
}
