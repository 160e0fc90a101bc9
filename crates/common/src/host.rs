// Hosting-platform CLI wrapper.
//
// The fork host exposes exactly one operation the workflow needs: the
// server-side "repository sync" that fast-forwards the fork's branch from
// its upstream. `gh` is the concrete tool; tests inject a scripted executor.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::exec::{is_missing_binary, render_command, CommandExecutor};

pub const HOST_CLI: &str = "gh";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("`{HOST_CLI}` was not found in PATH")]
    BinaryMissing,
    #[error("failed to run `{command}`: {message}")]
    SpawnFailed { command: String, message: String },
    #[error("`{command}` failed with code {code:?}: {stderr}")]
    CommandFailed { command: String, code: Option<i32>, stderr: String },
}

#[derive(Debug, Clone)]
pub struct ForkHost<E> {
    work_dir: PathBuf,
    executor: E,
}

impl<E: CommandExecutor> ForkHost<E> {
    pub fn new(work_dir: impl Into<PathBuf>, executor: E) -> Self {
        Self { work_dir: work_dir.into(), executor }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Probe that the host CLI exists and runs at all.
    pub fn check_available(&self) -> Result<(), HostError> {
        self.run(&["--version"]).map(drop)
    }

    /// Server-side sync of the fork's branch from its upstream
    /// (`gh repo sync <owner/name> --branch <branch>`).
    pub fn sync_fork(&self, fork: &str, branch: &str) -> Result<(), HostError> {
        self.run(&["repo", "sync", fork, "--branch", branch]).map(drop)
    }

    fn run(&self, args: &[&str]) -> Result<String, HostError> {
        let owned: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        let command = render_command(HOST_CLI, &owned);
        let result = self.executor.execute(HOST_CLI, &owned, &self.work_dir).map_err(|error| {
            if is_missing_binary(&error) {
                HostError::BinaryMissing
            } else {
                HostError::SpawnFailed { command: command.clone(), message: error.to_string() }
            }
        })?;

        if result.success {
            return Ok(result.stdout);
        }

        let stderr = if result.stderr.trim().is_empty() {
            result.stdout.trim().to_string()
        } else {
            result.stderr.trim().to_string()
        };
        Err(HostError::CommandFailed { command, code: result.code, stderr })
    }
}
