//! External command execution
//!
//! All git invocations go through [`CommandRunner`] so the orchestration logic
//! can be exercised against a fake in tests. [`ProcessRunner`] is the real
//! implementation backed by `tokio::process`.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command as AsyncCommand;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Runs one external command inside a working directory.
///
/// Implementations must not interpret exit codes or output beyond success and
/// failure; callers treat every failure as "this attempt did not succeed".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` with `args` in `dir`, discarding stdout.
    async fn run(&self, command: &str, args: &[String], dir: &Path) -> Result<()>;

    /// Run `command` with `args` in `dir` and return its trimmed stdout.
    async fn run_capture(&self, command: &str, args: &[String], dir: &Path) -> Result<String>;
}

/// [`CommandRunner`] that spawns real processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &str, args: &[String], dir: &Path) -> Result<()> {
        let label = command_label(command, args);
        debug!("Running `{}` in {}", label, dir.display());

        let status = AsyncCommand::new(command)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| SyncError::execution(&label, format!("cannot start: {}", e)))?;

        if !status.success() {
            return Err(SyncError::execution(label, status.to_string()));
        }

        Ok(())
    }

    async fn run_capture(&self, command: &str, args: &[String], dir: &Path) -> Result<String> {
        let label = command_label(command, args);
        debug!("Running `{}` in {}", label, dir.display());

        let output = AsyncCommand::new(command)
            .args(args)
            .current_dir(dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SyncError::execution(&label, format!("cannot start: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            let detail = if stderr.is_empty() {
                output.status.to_string()
            } else {
                format!("{}: {}", output.status, stderr)
            };
            return Err(SyncError::execution(label, detail));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Program plus the first non-flag argument, e.g. `git clone`.
///
/// Remote locations may embed credentials, so the full argument list never
/// ends up in an error message.
pub(crate) fn command_label(command: &str, args: &[String]) -> String {
    match args.iter().find(|a| !a.starts_with('-')) {
        Some(sub) => format!("{} {}", command, sub),
        None => command.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_command_label_skips_flags() {
        assert_eq!(
            command_label("git", &args(&["--no-pager", "log", "-n", "1"])),
            "git log"
        );
        assert_eq!(
            command_label("git", &args(&["clone", "-b", "main", "https://u:p@host/r"])),
            "git clone"
        );
        assert_eq!(command_label("git", &[]), "git");
    }

    #[tokio::test]
    async fn test_run_capture_trims_output() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new();
        let out = runner
            .run_capture("git", &args(&["--version"]), dir.path())
            .await
            .expect("git should be installed");
        assert!(out.starts_with("git version"));
        assert!(!out.ends_with('\n'));
    }

    #[test]
    fn test_run_discards_stdout() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new();
        tokio_test::assert_ok!(tokio_test::block_on(runner.run(
            "git",
            &args(&["--version"]),
            dir.path()
        )));
    }

    #[tokio::test]
    async fn test_missing_binary_is_execution_error() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new();
        let err = runner
            .run("syncwarden-no-such-binary", &args(&["pull"]), dir.path())
            .await
            .unwrap_err();
        assert_matches!(err, SyncError::Execution { ref command, .. } if command == "syncwarden-no-such-binary pull");
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_execution_error() {
        let dir = TempDir::new().unwrap();
        let runner = ProcessRunner::new();
        // Not a working copy, so this exits non-zero
        let err = runner
            .run_capture("git", &args(&["config", "--get", "remote.origin.url"]), dir.path())
            .await
            .unwrap_err();
        assert_matches!(err, SyncError::Execution { .. });
    }
}
