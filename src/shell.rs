//! Shell executor collaborator.
//!
//! `sync_sh`, `sync_spawn` and `@(...)@` expansion block the dispatch thread
//! until the child exits. `sh` and `spawn` start the child and return
//! immediately; a detached thread reaps it.

use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

/// Captured result of a finished subprocess.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellOutput {
    /// Everything the child wrote to stdout (lossy UTF-8).
    pub stdout: String,
    /// Exit code, `None` if killed by a signal.
    pub status: Option<i32>,
}

impl ShellOutput {
    /// `true` when the child exited with status 0.
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }
}

/// Runs argument vectors as child processes.
pub trait ShellExecutor: std::fmt::Debug {
    /// Run `argv` to completion and capture stdout.
    fn run(&self, argv: &[String]) -> Result<ShellOutput>;

    /// Start `argv` without waiting for it.
    fn spawn(&self, argv: &[String]) -> Result<()>;
}

/// Executor backed by `std::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemShell;

impl ShellExecutor for SystemShell {
    fn run(&self, argv: &[String]) -> Result<ShellOutput> {
        let (program, args) = split_program(argv)?;
        log::debug!("[Shell] Running {:?}", argv);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Failed to run {program}"))?;

        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            status: output.status.code(),
        })
    }

    fn spawn(&self, argv: &[String]) -> Result<()> {
        let (program, args) = split_program(argv)?;
        log::debug!("[Shell] Spawning {:?}", argv);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn {program}"))?;

        let label = program.to_string();
        std::thread::spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                log::warn!("[Shell] {} exited with {}", label, status);
            }
            Ok(_) => {}
            Err(e) => log::warn!("[Shell] Failed to wait for {}: {e}", label),
        });
        Ok(())
    }
}

fn split_program(argv: &[String]) -> Result<(&str, &[String])> {
    match argv.split_first() {
        Some((program, args)) if !program.is_empty() => Ok((program.as_str(), args)),
        _ => bail!("Empty command"),
    }
}

/// Build the argument vector for running `command` through `shell_cmd`.
///
/// `shell_cmd` is split with shell quoting rules (`"sh -c"` becomes
/// `["sh", "-c"]`); `command` and `extra` are appended as single arguments.
pub fn shell_argv(shell_cmd: &str, command: &str, extra: &[String]) -> Result<Vec<String>> {
    let mut argv = shell_words::split(shell_cmd)
        .with_context(|| format!("Invalid shell_cmd: {shell_cmd}"))?;
    if argv.is_empty() {
        bail!("shell_cmd is empty");
    }
    argv.push(command.to_string());
    argv.extend_from_slice(extra);
    Ok(argv)
}
