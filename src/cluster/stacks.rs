//! Stack deployment to the cluster scheduler.

use anyhow::anyhow;
use backon::BlockingRetryable;
use std::time::Duration;

use crate::cluster::{overlay, state};
use crate::config::{AppContext, StackSpec};
use crate::constants;
use crate::exec::Runner;
use crate::retry;

/// Result of deploying one stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOutcome {
    Ready,
    /// No compose definition on disk; warned and skipped.
    Skipped,
    Failed,
}

/// Deploy a stack from its compose definition.
///
/// A missing compose file is a warning, never a crash, and must not block
/// the stacks after it. Before deploying, the overlay network is re-checked:
/// it can be garbage-collected in the window between cluster bootstrap and
/// deploy, in which case it is redeployed first. Images are never resolved
/// or pulled - they are pre-staged, and a pull with no internet mid-boot
/// would hang indefinitely.
pub fn deploy_stack(ctx: &AppContext, runner: &dyn Runner, stack: &StackSpec) -> StackOutcome {
    deploy_with_delay(
        ctx,
        runner,
        stack,
        Duration::from_secs(constants::STACK_DEPLOY_DELAY_SECS),
    )
}

pub(crate) fn deploy_with_delay(
    ctx: &AppContext,
    runner: &dyn Runner,
    stack: &StackSpec,
    delay: Duration,
) -> StackOutcome {
    if !stack.compose_file.exists() {
        tracing::warn!(
            stack = %stack.name,
            compose = %stack.compose_file.display(),
            "No compose definition; skipping stack"
        );
        return StackOutcome::Skipped;
    }

    if state::network_scope(runner, &ctx.cluster.overlay_network).is_none() {
        tracing::warn!(
            network = %ctx.cluster.overlay_network,
            "Overlay network vanished before deploy; redeploying it"
        );
        overlay::ensure_overlay_network(ctx, runner);
    }

    let compose = stack.compose_file.display().to_string();
    let deploy = || {
        let out = runner.run(
            "docker",
            &[
                "stack",
                "deploy",
                "--resolve-image",
                "never",
                "--compose-file",
                &compose,
                &stack.name,
            ],
        )?;
        if out.success {
            Ok(())
        } else {
            Err(anyhow!("stack deploy failed: {}", out.stderr.trim()))
        }
    };

    let result = deploy
        .retry(retry::fixed(constants::STACK_DEPLOY_ATTEMPTS, delay))
        .notify(|err, delay| {
            tracing::warn!(stack = %stack.name, error = %err, retry_in = ?delay, "Retrying stack deploy");
        })
        .call();

    match result {
        Ok(()) => {
            tracing::info!(stack = %stack.name, "Stack deployed");
            StackOutcome::Ready
        },
        Err(e) => {
            tracing::error!(stack = %stack.name, error = %e, "Stack deploy gave up");
            StackOutcome::Failed
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StackPhase;
    use crate::exec::{CmdOutput, FakeRunner};

    const DELAY: Duration = Duration::from_millis(1);

    fn stack_with_compose(dir: &std::path::Path) -> StackSpec {
        let compose = dir.join("core.yml");
        std::fs::write(&compose, "version: '3.8'\nservices: {}\n").unwrap();
        StackSpec {
            name: "core".into(),
            compose_file: compose,
            phase: StackPhase::Core,
            replicas: 1,
        }
    }

    #[test]
    fn absent_compose_file_warns_and_skips() {
        let ctx = AppContext::default();
        let runner = FakeRunner::new();
        let stack = StackSpec {
            name: "ghost".into(),
            compose_file: "/nonexistent/ghost.yml".into(),
            phase: StackPhase::App,
            replicas: 1,
        };
        assert_eq!(deploy_with_delay(&ctx, &runner, &stack, DELAY), StackOutcome::Skipped);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn vanished_overlay_is_redeployed_before_the_stack() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::default();
        let runner = FakeRunner::new();
        // First inspect: gone. The redeploy creates it; later inspects see it.
        runner.on("docker network inspect", CmdOutput::err("no such network"));
        runner.on("docker network inspect", CmdOutput::err("no such network"));
        runner.always("docker network inspect", CmdOutput::ok("swarm\n"));

        let stack = stack_with_compose(dir.path());
        assert_eq!(deploy_with_delay(&ctx, &runner, &stack, DELAY), StackOutcome::Ready);

        let calls = runner.calls();
        let create_idx = calls
            .iter()
            .position(|c| c.starts_with("docker network create"))
            .unwrap();
        let deploy_idx = calls
            .iter()
            .position(|c| c.starts_with("docker stack deploy"))
            .unwrap();
        assert!(create_idx < deploy_idx);
    }

    #[test]
    fn deploy_never_resolves_images_and_is_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::default();
        let runner = FakeRunner::new();
        runner.always("docker network inspect", CmdOutput::ok("swarm\n"));
        runner.always("docker stack deploy", CmdOutput::err("rpc deadline"));

        let stack = stack_with_compose(dir.path());
        assert_eq!(deploy_with_delay(&ctx, &runner, &stack, DELAY), StackOutcome::Failed);

        let deploys = runner.calls_matching("docker stack deploy");
        assert_eq!(deploys.len(), 3);
        assert!(deploys[0].contains("--resolve-image never"));
    }

    #[test]
    fn transient_failure_recovers_within_budget() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::default();
        let runner = FakeRunner::new();
        runner.always("docker network inspect", CmdOutput::ok("swarm\n"));
        runner.on("docker stack deploy", CmdOutput::err("engine busy"));

        let stack = stack_with_compose(dir.path());
        assert_eq!(deploy_with_delay(&ctx, &runner, &stack, DELAY), StackOutcome::Ready);
        assert_eq!(runner.calls_matching("docker stack deploy").len(), 2);
    }
}
