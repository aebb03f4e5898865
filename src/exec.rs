//! External command execution.
//!
//! Everything the control plane does to the host (docker, ip, iptables,
//! systemctl, netplan) goes through the [`Runner`] trait so that components
//! can be exercised against a scripted [`FakeRunner`] in tests, and so that
//! no invocation can fail silently: output is always captured and failures
//! are always logged by the call site with the captured stderr.

use anyhow::{Context, Result};
use std::process::{Command, Stdio};
use std::sync::Mutex;

/// Captured result of one external command.
#[derive(Debug, Clone)]
pub struct CmdOutput {
    /// Whether the command exited zero.
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CmdOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: &str) -> Self {
        Self {
            success: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Failed output with the given stderr.
    pub fn err(stderr: &str) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    /// Stdout with surrounding whitespace removed.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// Executes external commands. One implementation talks to the host; the
/// scripted fake stands in for it under test.
pub trait Runner: Send + Sync {
    /// Run a command, capturing stdout and stderr.
    ///
    /// A non-zero exit is NOT an `Err`: callers inspect [`CmdOutput::success`]
    /// and decide severity. `Err` means the process could not be spawned.
    fn run(&self, program: &str, args: &[&str]) -> Result<CmdOutput>;

    /// Run a command feeding `stdin` to it (used for `docker secret create`).
    fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &[u8]) -> Result<CmdOutput>;
}

/// Runner backed by real host processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn capture(program: &str, args: &[&str], stdin: Option<&[u8]>) -> Result<CmdOutput> {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to spawn {program}"))?;

        if let Some(data) = stdin {
            use std::io::Write;
            // Take the handle so the pipe closes before we wait.
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(data)
                    .with_context(|| format!("Failed to write stdin to {program}"))?;
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("Failed to wait for {program}"))?;

        let result = CmdOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        tracing::debug!(
            program = program,
            args = ?args,
            success = result.success,
            "Ran external command"
        );
        Ok(result)
    }
}

impl Runner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CmdOutput> {
        Self::capture(program, args, None)
    }

    fn run_with_stdin(&self, program: &str, args: &[&str], stdin: &[u8]) -> Result<CmdOutput> {
        Self::capture(program, args, Some(stdin))
    }
}

/// Render a command line for rule matching and call recording.
fn command_line(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Scripted runner for tests.
///
/// Rules are prefix-matched against the full command line. One-shot rules
/// (`on`) are consumed in order and take precedence over persistent rules
/// (`always`); unmatched commands succeed with empty output. Every call is
/// recorded for assertions.
#[derive(Debug, Default)]
pub struct FakeRunner {
    one_shot: Mutex<Vec<(String, CmdOutput)>>,
    persistent: Mutex<Vec<(String, CmdOutput)>>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a one-shot response for the first command line starting with
    /// `prefix`.
    pub fn on(&self, prefix: &str, output: CmdOutput) {
        self.one_shot
            .lock()
            .expect("fake runner lock")
            .push((prefix.to_string(), output));
    }

    /// Register a persistent response for every command line starting with
    /// `prefix`.
    pub fn always(&self, prefix: &str, output: CmdOutput) {
        self.persistent
            .lock()
            .expect("fake runner lock")
            .push((prefix.to_string(), output));
    }

    /// All command lines run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("fake runner lock").clone()
    }

    /// Command lines starting with `prefix`.
    pub fn calls_matching(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    fn respond(&self, line: &str) -> CmdOutput {
        {
            let mut one_shot = self.one_shot.lock().expect("fake runner lock");
            if let Some(pos) = one_shot.iter().position(|(p, _)| line.starts_with(p.as_str())) {
                return one_shot.remove(pos).1;
            }
        }
        let persistent = self.persistent.lock().expect("fake runner lock");
        if let Some((_, out)) = persistent.iter().find(|(p, _)| line.starts_with(p.as_str())) {
            return out.clone();
        }
        CmdOutput::ok("")
    }
}

impl Runner for FakeRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CmdOutput> {
        let line = command_line(program, args);
        self.calls.lock().expect("fake runner lock").push(line.clone());
        Ok(self.respond(&line))
    }

    fn run_with_stdin(&self, program: &str, args: &[&str], _stdin: &[u8]) -> Result<CmdOutput> {
        self.run(program, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_runner_prefers_one_shot_rules_in_order() {
        let runner = FakeRunner::new();
        runner.on("docker network create", CmdOutput::err("boom"));
        runner.on("docker network create", CmdOutput::ok(""));
        runner.always("docker info", CmdOutput::ok("active"));

        let first = runner.run("docker", &["network", "create", "x"]).unwrap();
        let second = runner.run("docker", &["network", "create", "x"]).unwrap();
        assert!(!first.success);
        assert!(second.success);

        let info = runner.run("docker", &["info"]).unwrap();
        assert_eq!(info.stdout_trimmed(), "active");
        // Repeated persistent matches keep answering.
        assert!(runner.run("docker", &["info"]).unwrap().success);
        assert_eq!(runner.calls_matching("docker network create").len(), 2);
    }

    #[test]
    fn unmatched_commands_succeed_empty() {
        let runner = FakeRunner::new();
        let out = runner.run("systemctl", &["is-active", "hostapd"]).unwrap();
        assert!(out.success);
        assert!(out.stdout.is_empty());
    }

    #[test]
    fn system_runner_captures_stderr_on_failure() {
        let runner = SystemRunner;
        let out = runner.run("ls", &["/definitely/not/here"]).unwrap();
        assert!(!out.success);
        assert!(!out.stderr.is_empty());
    }
}
