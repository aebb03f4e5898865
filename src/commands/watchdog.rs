//! Watchdog command: one reconcile pass, or a sleep loop for hosts without
//! a timer unit.

use std::time::Duration;

use anyhow::Result;

use crate::config::AppContext;
use crate::exec::Runner;
use crate::watchdog::reconcile_once;

pub fn execute(ctx: &AppContext, runner: &dyn Runner, interval: Option<u64>) -> Result<()> {
    match interval {
        None => {
            reconcile_once(ctx, runner);
            Ok(())
        },
        Some(secs) => loop {
            reconcile_once(ctx, runner);
            std::thread::sleep(Duration::from_secs(secs));
        },
    }
}
