//! Cluster bootstrap: bring the container engine to "cluster active" and
//! keep the shared overlay network and stack deployments converged.
//!
//! Nothing here caches cluster state across calls - it can change behind
//! the orchestrator's back (manual intervention, crash), so every operation
//! re-derives what it needs before acting.

pub mod overlay;
pub mod secrets;
pub mod stacks;
pub mod state;
pub mod swarm;

pub use stacks::StackOutcome;
pub use state::ClusterState;

use crate::config::AppContext;
use crate::exec::Runner;

/// Outcome of an idempotent bootstrap operation. `Degraded` means the
/// operation did not converge but boot continues; the watchdog retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    Degraded,
}

impl Readiness {
    pub const fn is_ready(self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Full cluster bootstrap: swarm active, overlay present, secrets mirrored.
///
/// Degrades instead of failing; partial cluster availability still lets the
/// appliance expose its recovery path.
pub fn bootstrap(ctx: &AppContext, runner: &dyn Runner) -> Readiness {
    let swarm = swarm::ensure_swarm(ctx, runner);
    let network = overlay::ensure_overlay_network(ctx, runner);

    if swarm.is_ready() {
        if let Err(e) = secrets::mirror_to_cluster(ctx, runner) {
            tracing::warn!(error = %e, "Failed to mirror secrets into the cluster");
        }
    }

    if swarm.is_ready() && network.is_ready() {
        Readiness::Ready
    } else {
        Readiness::Degraded
    }
}
