//! Idempotent overlay-network creation.

use anyhow::anyhow;
use backon::BlockingRetryable;
use std::time::Duration;

use crate::cluster::{Readiness, state};
use crate::config::AppContext;
use crate::constants;
use crate::exec::Runner;
use crate::retry;

/// Ensure the shared overlay network exists with cluster-wide scope.
///
/// A node that left and rejoined a cluster can be left with a stale
/// local-scope network of the same name; that one is deleted and recreated.
/// Creation is retried on a linear backoff ladder, verifying existence (not
/// convergence) after each attempt - waiting out eventual consistency costs
/// far more time than simply retrying the create call.
pub fn ensure_overlay_network(ctx: &AppContext, runner: &dyn Runner) -> Readiness {
    ensure_with_backoff(
        runner,
        &ctx.cluster.overlay_network,
        &ctx.cluster.overlay_subnet,
        Duration::from_secs(constants::OVERLAY_BACKOFF_STEP_SECS),
        constants::OVERLAY_CREATE_ATTEMPTS,
    )
}

/// Backoff-parameterized body, separated so tests run on millisecond steps.
pub(crate) fn ensure_with_backoff(
    runner: &dyn Runner,
    name: &str,
    subnet: &str,
    step: Duration,
    attempts: usize,
) -> Readiness {
    match state::network_scope(runner, name) {
        Some(scope) if scope == "swarm" => {
            tracing::debug!(network = name, "Overlay network present");
            return Readiness::Ready;
        },
        Some(scope) => {
            tracing::warn!(
                network = name,
                scope = %scope,
                "Overlay network has stale scope; recreating"
            );
            match runner.run("docker", &["network", "rm", name]) {
                Ok(out) if !out.success => {
                    tracing::warn!(stderr = %out.stderr.trim(), "Failed to remove stale network");
                },
                Err(e) => tracing::warn!(error = %e, "Failed to remove stale network"),
                Ok(_) => {},
            }
        },
        None => {},
    }

    let create = || {
        let out = runner.run(
            "docker",
            &[
                "network", "create", "--driver", "overlay", "--attachable", "--subnet", subnet,
                name,
            ],
        )?;
        if !out.success {
            tracing::warn!(stderr = %out.stderr.trim(), "Overlay create returned an error");
        }
        // Existence is the retry condition; "already exists" counts as done.
        if state::network_scope(runner, name).is_some() {
            Ok(())
        } else {
            Err(anyhow!("network {name} not present after create"))
        }
    };

    let result = create
        .retry(retry::linear(step, attempts))
        .notify(|err, delay| {
            tracing::warn!(error = %err, retry_in = ?delay, "Retrying overlay network create");
        })
        .call();

    match result {
        Ok(()) => {
            tracing::info!(network = name, subnet = subnet, "Overlay network ready");
            Readiness::Ready
        },
        Err(e) => {
            tracing::error!(network = name, error = %e, "Overlay network could not be created");
            Readiness::Degraded
        },
    }
}
