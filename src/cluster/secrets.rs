//! Credential generation and cluster secret mirroring.
//!
//! Credentials are generated exactly once: if the secrets file already
//! exists the whole operation is skipped, so re-running boot never rotates
//! credentials behind running services. The on-disk copy is authoritative -
//! cluster secret objects do not survive a forced swarm re-init, so the
//! watchdog re-mirrors them from disk after a recovery.

use anyhow::{Context, Result};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

use crate::config::AppContext;
use crate::exec::Runner;

/// Keys written into the generated secrets file.
const SECRET_KEYS: [&str; 3] = ["AP_PASSWORD", "ADMIN_TOKEN", "DB_PASSWORD"];

/// Generate the secrets file if it does not exist yet.
///
/// Returns whether a new file was written. Material comes from UUIDv4
/// (CSPRNG-backed). The file is written 0640 root:docker; the ownership
/// change is best-effort so unprivileged test runs still work.
pub fn ensure_secrets_file(ctx: &AppContext) -> Result<bool> {
    let path = ctx.secrets_path();
    if path.exists() {
        tracing::debug!(path = %path.display(), "Secrets already generated");
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut content = String::from("# Generated by stackpilot. One-time credentials.\n");
    for key in SECRET_KEYS {
        content.push_str(&format!("{key}={}\n", Uuid::new_v4().simple()));
    }

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(content.as_bytes())
        .context("Failed to write secrets file")?;

    #[cfg(unix)]
    set_owner_and_mode(&path);

    tracing::info!(path = %path.display(), "Generated appliance credentials");
    Ok(true)
}

#[cfg(unix)]
fn set_owner_and_mode(path: &Path) {
    use std::os::unix::fs::PermissionsExt;

    if let Err(e) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o640)) {
        tracing::warn!(error = %e, "Failed to set secrets file mode");
    }

    let docker_gid = nix::unistd::Group::from_name("docker")
        .ok()
        .flatten()
        .map(|g| g.gid);
    match nix::unistd::chown(path, Some(nix::unistd::Uid::from_raw(0)), docker_gid) {
        Ok(()) => {},
        Err(e) => tracing::warn!(error = %e, "Failed to chown secrets file (not running as root?)"),
    }
}

/// Mirror the on-disk secrets into cluster-native secret objects.
///
/// Creates only the secrets that are missing; existing objects are left
/// untouched. Requires an active swarm; callers check that first.
pub fn mirror_to_cluster(ctx: &AppContext, runner: &dyn Runner) -> Result<()> {
    let path = ctx.secrets_path();
    if !path.exists() {
        tracing::debug!("No secrets file to mirror");
        return Ok(());
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        if key.trim().is_empty() || key.starts_with('#') {
            continue;
        }
        let name = key.trim().to_ascii_lowercase().replace('_', "-");

        let exists = runner
            .run("docker", &["secret", "inspect", &name])?
            .success;
        if exists {
            continue;
        }

        let out = runner.run_with_stdin(
            "docker",
            &["secret", "create", &name, "-"],
            value.trim().as_bytes(),
        )?;
        if out.success {
            tracing::info!(secret = %name, "Cluster secret created");
        } else {
            tracing::warn!(secret = %name, stderr = %out.stderr.trim(), "Failed to create cluster secret");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_ctx(dir: &Path) -> AppContext {
        AppContext {
            state_dir: dir.to_path_buf(),
            ..AppContext::default()
        }
    }

    #[test]
    fn generation_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());

        assert!(ensure_secrets_file(&ctx).unwrap());
        let first = std::fs::read_to_string(ctx.secrets_path()).unwrap();

        // Second run must not rotate anything.
        assert!(!ensure_secrets_file(&ctx).unwrap());
        let second = std::fs::read_to_string(ctx.secrets_path()).unwrap();
        assert_eq!(first, second);
        for key in SECRET_KEYS {
            assert!(first.contains(&format!("{key}=")));
        }
    }

    #[test]
    fn mirror_creates_only_missing_secrets() {
        use crate::exec::{CmdOutput, FakeRunner};

        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        ensure_secrets_file(&ctx).unwrap();

        let runner = FakeRunner::new();
        // ap-password exists already; the other two do not.
        runner.on("docker secret inspect ap-password", CmdOutput::ok("[]"));
        runner.always("docker secret inspect", CmdOutput::err("not found"));

        mirror_to_cluster(&ctx, &runner).unwrap();
        let creates = runner.calls_matching("docker secret create");
        assert_eq!(creates.len(), 2);
        assert!(creates.iter().all(|c| !c.contains("ap-password")));
    }

    #[test]
    fn mirror_without_file_is_a_noop() {
        use crate::exec::FakeRunner;
        let dir = tempfile::tempdir().unwrap();
        let ctx = test_ctx(dir.path());
        let runner = FakeRunner::new();
        mirror_to_cluster(&ctx, &runner).unwrap();
        assert!(runner.calls().is_empty());
    }
}
