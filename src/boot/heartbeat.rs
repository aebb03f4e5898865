//! Boot markers: heartbeat, progress, boot state and the provisioning flag.
//!
//! The heartbeat is a single unix timestamp rewritten after every stage and
//! inside every bounded wait. Staleness while the worker still runs means
//! the worker is stuck, not finished - that distinction belongs to the
//! monitor, which also knows whether the process is alive.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::AppContext;
use crate::constants;

/// Lifecycle state the boot-timeout supervisor keys off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootState {
    Starting,
    Complete,
}

impl BootState {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Complete => "complete",
        }
    }
}

fn write_marker(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

/// Refresh the heartbeat timestamp.
pub fn beat(ctx: &AppContext) -> Result<()> {
    write_marker(
        &ctx.heartbeat_path(),
        &chrono::Utc::now().timestamp().to_string(),
    )
}

/// Age of the last heartbeat in seconds, or `None` if never written.
pub fn age_secs(ctx: &AppContext) -> Option<i64> {
    let content = std::fs::read_to_string(ctx.heartbeat_path()).ok()?;
    let ts: i64 = content.trim().parse().ok()?;
    Some(chrono::Utc::now().timestamp().saturating_sub(ts))
}

/// Publish the numeric progress marker (`k/9`) for the boot UI.
pub fn write_progress(ctx: &AppContext, stage: u32) -> Result<()> {
    write_marker(
        &ctx.progress_path(),
        &format!("{stage}/{}", constants::BOOT_STAGE_COUNT),
    )
}

/// Record the boot lifecycle state.
pub fn write_boot_state(ctx: &AppContext, state: BootState) -> Result<()> {
    write_marker(&ctx.boot_state_path(), state.as_str())
}

/// Read the boot lifecycle state, if any boot has run since power-on.
pub fn read_boot_state(ctx: &AppContext) -> Option<BootState> {
    match std::fs::read_to_string(ctx.boot_state_path()).ok()?.trim() {
        "starting" => Some(BootState::Starting),
        "complete" => Some(BootState::Complete),
        _ => None,
    }
}

/// Age of the boot state marker in seconds.
pub fn boot_state_age_secs(ctx: &AppContext) -> Option<i64> {
    let meta = std::fs::metadata(ctx.boot_state_path()).ok()?;
    let modified = meta.modified().ok()?;
    let age = std::time::SystemTime::now()
        .duration_since(modified)
        .unwrap_or_default();
    Some(i64::try_from(age.as_secs()).unwrap_or(i64::MAX))
}

/// Record the supervised worker's PID for the boot-timeout supervisor.
pub fn write_worker_pid(ctx: &AppContext, pid: u32) -> Result<()> {
    write_marker(&ctx.worker_pid_path(), &pid.to_string())
}

pub fn read_worker_pid(ctx: &AppContext) -> Option<u32> {
    std::fs::read_to_string(ctx.worker_pid_path())
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Whether first boot has ever completed (presence of the marker means
/// "skip first-boot" on the next power-on).
pub fn is_provisioned(ctx: &AppContext) -> bool {
    ctx.provisioned_marker_path().exists()
}

/// Mark provisioning complete. Written once stage 9 is reached so the node
/// never repeats first-boot forever.
pub fn mark_provisioned(ctx: &AppContext) -> Result<()> {
    write_marker(
        &ctx.provisioned_marker_path(),
        &chrono::Utc::now().to_rfc3339(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx(dir: &Path) -> AppContext {
        AppContext {
            runtime_dir: dir.join("run"),
            state_dir: dir.join("state"),
            ..AppContext::default()
        }
    }

    #[test]
    fn heartbeat_round_trips_with_small_age() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        assert_eq!(age_secs(&ctx), None);
        beat(&ctx).unwrap();
        assert!(age_secs(&ctx).unwrap() <= 1);
    }

    #[test]
    fn progress_marker_is_k_of_9() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        write_progress(&ctx, 4).unwrap();
        assert_eq!(
            std::fs::read_to_string(ctx.progress_path()).unwrap(),
            "4/9"
        );
    }

    #[test]
    fn boot_state_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        assert_eq!(read_boot_state(&ctx), None);
        write_boot_state(&ctx, BootState::Starting).unwrap();
        assert_eq!(read_boot_state(&ctx), Some(BootState::Starting));
        write_boot_state(&ctx, BootState::Complete).unwrap();
        assert_eq!(read_boot_state(&ctx), Some(BootState::Complete));
        assert!(boot_state_age_secs(&ctx).unwrap() <= 1);
    }

    #[test]
    fn provisioning_marker_flips_once() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        assert!(!is_provisioned(&ctx));
        mark_provisioned(&ctx).unwrap();
        assert!(is_provisioned(&ctx));
    }
}
