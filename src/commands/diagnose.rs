//! Read-only diagnosis command.

use anyhow::{Context, Result};

use crate::config::AppContext;
use crate::diagnostics;
use crate::exec::Runner;

pub fn execute(ctx: &AppContext, runner: &dyn Runner, json: bool) -> Result<()> {
    let report = diagnostics::collect(ctx, runner);
    if json {
        let out = serde_json::to_string_pretty(&report)
            .context("Failed to serialize diagnosis report")?;
        println!("{out}");
    } else {
        print!("{}", diagnostics::render_text(&report));
    }
    Ok(())
}
