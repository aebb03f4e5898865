//! Manual recovery: re-run cluster bootstrap and stack deployment outside
//! the timed boot path. For operators on the console after the appliance
//! came up degraded.

use anyhow::Result;

use crate::cluster::{self, StackOutcome};
use crate::config::{AppContext, StackPhase};
use crate::exec::Runner;

pub fn execute(ctx: &AppContext, runner: &dyn Runner) -> Result<()> {
    let readiness = cluster::bootstrap(ctx, runner);
    println!(
        "cluster bootstrap: {}",
        if readiness.is_ready() { "ready" } else { "degraded" }
    );

    let mut failed = 0u32;
    for phase in [StackPhase::Core, StackPhase::Hardware, StackPhase::App] {
        for stack in ctx.stacks_in_phase(phase) {
            let outcome = cluster::stacks::deploy_stack(ctx, runner, stack);
            println!("stack {:<20} {:?}", stack.name, outcome);
            if outcome == StackOutcome::Failed {
                failed += 1;
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} stack deployment(s) failed");
    }
    Ok(())
}
