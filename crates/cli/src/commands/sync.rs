// `forksync sync` — run the upstream sync workflow (also the bare-invocation
// default).

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::{debug, info};

use forksync_common::config::SyncConfig;
use forksync_common::exec::ProcessCommandExecutor;
use forksync_common::git::Git;
use forksync_common::host::ForkHost;
use forksync_common::sync::{self, SyncReport};

use crate::output::{self, OutputFormat};

#[derive(Debug, Args, Default)]
pub struct SyncArgs {
    /// Fork clone path (defaults to current directory).
    #[arg(value_name = "PATH")]
    path: Option<PathBuf>,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

pub fn run(args: SyncArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);

    match run_sync(args.path) {
        Ok(report) => {
            output::print_output(format, &report, format_human)?;
            if !report.stash_fully_restored() {
                // The merge is pushed and stays; the user has to recover the
                // stash by hand, and scripts must see a non-zero exit.
                output::print_warning(
                    format,
                    "STASH_RESTORE_FAILED",
                    "stashed changes could not be restored; recover them with `git stash pop`",
                );
                anyhow::bail!("stash restore failed after the merge was pushed");
            }
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn run_sync(path: Option<PathBuf>) -> anyhow::Result<SyncReport> {
    let repo_root = resolve_repo_root(path)?;
    let config = SyncConfig::load(&repo_root)
        .with_context(|| format!("failed to load sync configuration for `{}`", repo_root.display()))?;

    info!(repo = %repo_root.display(), fork = %config.fork, "running upstream sync");
    debug!(
        upstream = %config.upstream_url,
        branch = %config.default_branch,
        "configuration loaded"
    );

    let git = Git::new(&repo_root, ProcessCommandExecutor);
    let host = ForkHost::new(&repo_root, ProcessCommandExecutor);
    sync::run(&git, &host, &config).map_err(anyhow::Error::from)
}

fn resolve_repo_root(path: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    let provided = path.unwrap_or_else(|| PathBuf::from("."));
    if provided.is_absolute() {
        return Ok(provided);
    }

    std::env::current_dir()
        .map(|cwd| cwd.join(provided))
        .context("failed to resolve current working directory")
}

fn format_human(report: &SyncReport) -> String {
    let mut lines = vec![format!("Synced branch `{}` with upstream.", report.branch)];
    if report.branch_created {
        lines.push(format!("Created branch `{}` from a detached HEAD.", report.branch));
    }
    if report.upstream_remote_added {
        lines.push("Registered the upstream remote.".to_string());
    }

    if let Some(first) = report.merge_detail.lines().next() {
        lines.push(format!("Merge: {first}"));
    }

    match &report.changed_files_error {
        Some(error) => lines.push(format!("Could not enumerate files differing from upstream: {error}")),
        None if report.changed_files.is_empty() => {}
        None => lines.push(format!(
            "Files that differed from upstream before the merge: {}",
            report.changed_files.join(", ")
        )),
    }

    if let Some(stash) = &report.stash {
        if stash.restored {
            lines.push(format!("Restored stashed changes ({}).", stash.message));
        } else {
            lines.push(format!("Stash `{}` was NOT restored; run `git stash pop`.", stash.message));
        }
    }

    match &report.local_commits_error {
        Some(error) => lines.push(format!("Could not list local-only commits: {error}")),
        None if report.local_commits.is_empty() => {
            lines.push("No local commits ahead of upstream.".to_string());
        }
        None => {
            lines.push(format!("{} local commit(s) ahead of upstream:", report.local_commits.len()));
            for commit in &report.local_commits {
                lines.push(format!("  {commit}"));
            }
        }
    }

    lines.join("\n")
}
