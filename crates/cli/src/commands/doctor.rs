// `forksync doctor` — environment diagnostics for the sync workflow.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::Args;
use serde::Serialize;

use forksync_common::config::{SyncConfig, REPO_CONFIG_FILE};
use forksync_common::exec::ProcessCommandExecutor;
use forksync_common::git::Git;
use forksync_common::host::HOST_CLI;

use crate::output::{self, OutputFormat};

const ANSI_GREEN: &str = "\x1b[32m";
const ANSI_YELLOW: &str = "\x1b[33m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

#[derive(Debug, Args)]
pub struct DoctorArgs {
    /// Fork clone path (defaults to current directory).
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
enum DoctorStatus {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorCheck {
    name: String,
    status: DoctorStatus,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl DoctorCheck {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: DoctorStatus::Pass,
            detail: detail.into(),
            hint: None,
        }
    }

    fn warning(name: &str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: DoctorStatus::Warning,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn fail(name: &str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: DoctorStatus::Fail,
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }
}

pub fn run(args: DoctorArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let repo_root = args
        .path
        .map(Ok)
        .unwrap_or_else(std::env::current_dir)
        .map_err(anyhow::Error::from)?;

    let checks = collect_checks(&repo_root);
    output::print_output(format, &checks, |items| format_human(items))?;
    if checks.iter().any(|check| check.status == DoctorStatus::Fail) {
        anyhow::bail!("doctor checks failed");
    }
    Ok(())
}

fn collect_checks(repo_root: &Path) -> Vec<DoctorCheck> {
    let mut checks = Vec::new();
    checks.push(check_binary("git", "git", "Install Git and ensure it is in PATH"));
    checks.push(check_binary(
        HOST_CLI,
        "host_cli",
        "Install the GitHub CLI (https://cli.github.com) and run `gh auth login`",
    ));
    checks.push(check_repository(repo_root));
    checks.push(check_config(repo_root));
    checks
}

fn check_binary(binary: &str, name: &str, hint: &str) -> DoctorCheck {
    match Command::new(binary).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout);
            let first = version.lines().next().unwrap_or(binary).trim().to_string();
            DoctorCheck::pass(name, first)
        }
        Ok(output) => {
            DoctorCheck::fail(name, format!("`{binary} --version` exited with {}", output.status), hint)
        }
        Err(error) => DoctorCheck::fail(name, format!("failed to execute `{binary}`: {error}"), hint),
    }
}

fn check_repository(repo_root: &Path) -> DoctorCheck {
    let git = Git::new(repo_root, ProcessCommandExecutor);
    match git.is_work_tree() {
        Ok(true) => {}
        Ok(false) => {
            return DoctorCheck::fail(
                "repository",
                format!("`{}` is not a git repository", repo_root.display()),
                "Clone the fork there first",
            )
        }
        Err(error) => {
            return DoctorCheck::fail(
                "repository",
                format!("failed to probe `{}`: {error}", repo_root.display()),
                "Verify git installation and repository permissions",
            )
        }
    }

    match git.remotes() {
        Ok(remotes) if remotes.is_empty() => DoctorCheck::warning(
            "repository",
            "repository has no remotes configured",
            "Add the fork remote: git remote add origin <url>",
        ),
        Ok(remotes) => {
            let mut detail = format!("git repository; remotes: {}", remotes.join(", "));
            if !remotes.iter().any(|remote| remote == "upstream") {
                detail.push_str(" (upstream will be registered on first sync)");
            }
            DoctorCheck::pass("repository", detail)
        }
        Err(error) => DoctorCheck::fail(
            "repository",
            format!("failed to list remotes: {error}"),
            "Verify repository integrity and permissions",
        ),
    }
}

fn check_config(repo_root: &Path) -> DoctorCheck {
    match SyncConfig::load(repo_root) {
        Ok(config) => DoctorCheck::pass(
            "config",
            format!(
                "fork `{}`, upstream `{}`, branch `{}`",
                config.fork, config.upstream_url, config.default_branch
            ),
        ),
        Err(error) => DoctorCheck::fail(
            "config",
            error.to_string(),
            format!("Add `fork = \"owner/name\"` to {REPO_CONFIG_FILE} in the clone root"),
        ),
    }
}

fn format_human(checks: &[DoctorCheck]) -> String {
    let use_color = std::io::stdout().is_terminal();
    let mut lines = Vec::new();

    for check in checks {
        let (symbol, color) = match check.status {
            DoctorStatus::Pass => ("✓", ANSI_GREEN),
            DoctorStatus::Warning => ("⚠", ANSI_YELLOW),
            DoctorStatus::Fail => ("✗", ANSI_RED),
        };
        let rendered_symbol =
            if use_color { format!("{color}{symbol}{ANSI_RESET}") } else { symbol.to_string() };
        lines.push(format!("{rendered_symbol} {}: {}", check.name, check.detail));
        if let Some(hint) = &check.hint {
            lines.push(format!("  hint: {hint}"));
        }
    }

    let passed = checks.iter().filter(|check| check.status == DoctorStatus::Pass).count();
    let warnings = checks.iter().filter(|check| check.status == DoctorStatus::Warning).count();
    let failed = checks.iter().filter(|check| check.status == DoctorStatus::Fail).count();
    lines.push(String::new());
    lines.push(format!("Summary: {passed} passed, {warnings} warning(s), {failed} failed"));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_human_includes_summary_and_hints() {
        let checks = vec![
            DoctorCheck::pass("git", "git version 2.43.0"),
            DoctorCheck::warning("repository", "no remotes", "add origin"),
            DoctorCheck::fail("config", "fork not set", "add fork to .forksync.toml"),
        ];
        let rendered = format_human(&checks);
        assert!(rendered.contains("Summary: 1 passed, 1 warning(s), 1 failed"));
        assert!(rendered.contains("hint: add fork to .forksync.toml"));
    }

    #[test]
    fn repository_check_fails_outside_a_repo() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let check = check_repository(temp.path());
        assert_eq!(check.status, DoctorStatus::Fail, "got {check:?}");
    }

    #[test]
    fn config_check_fails_without_fork() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        let check = check_config(temp.path());
        assert_eq!(check.status, DoctorStatus::Fail);
        assert!(check.detail.contains("`fork` is not set"));
    }

    #[test]
    fn config_check_passes_with_repo_local_file() {
        let temp = tempfile::tempdir().expect("tempdir should be created");
        std::fs::write(temp.path().join(REPO_CONFIG_FILE), "fork = \"example/vllm\"\n")
            .expect("config file should be written");

        let check = check_config(temp.path());
        assert_eq!(check.status, DoctorStatus::Pass);
        assert!(check.detail.contains("example/vllm"));
    }
}
