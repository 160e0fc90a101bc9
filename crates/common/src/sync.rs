// The upstream sync workflow.
//
// Brings a local fork clone up to date with its upstream: resolve the
// branch, register the upstream remote, fetch, stash uncommitted work,
// sync the fork server-side, merge the fork branch, push, restore the
// stash. Every failure after the stash is taken restores it before the
// error propagates; a failed stash restore is the one thing never rolled
// back, because the merge has already been pushed by then.

use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::exec::CommandExecutor;
use crate::git::{Git, GitError, MergeOutcome};
use crate::host::{ForkHost, HostError, HOST_CLI};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("`{}` is not a git repository; clone the fork there first", .path.display())]
    SetupMissing { path: PathBuf },
    #[error("required tool `{tool}` was not found in PATH; install it and re-run")]
    ToolMissing { tool: &'static str },
    #[error(transparent)]
    Git(#[from] GitError),
    #[error("remote fork sync failed; the local repository was left unmerged")]
    RemoteSync(#[source] HostError),
    #[error(
        "merge stopped on conflicts in {} file(s): {}; resolve them manually",
        .files.len(),
        .files.join(", ")
    )]
    MergeConflict { files: Vec<String> },
    #[error("push to `{remote}` failed")]
    Push {
        remote: String,
        #[source]
        source: GitError,
    },
}

/// Pre-state captured before the destructive steps, threaded through the
/// workflow as values instead of ambient repository state.
#[derive(Debug, Clone)]
struct SyncSession {
    branch: String,
    branch_created: bool,
    upstream_remote_added: bool,
    changed_files: Vec<String>,
    changed_files_error: Option<String>,
    stash_message: Option<String>,
}

/// Outcome of the stash taken in the dirty-state preservation step.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StashState {
    pub message: String,
    pub restored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_error: Option<String>,
}

/// What a completed (pushed) sync did, including the non-fatal diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub branch: String,
    /// True when a detached HEAD was remedied by creating the branch.
    pub branch_created: bool,
    /// True when the upstream remote was created rather than normalized.
    pub upstream_remote_added: bool,
    /// Files differing from the upstream branch before the merge.
    pub changed_files: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_files_error: Option<String>,
    /// git's own description of the merge (fast-forward, already up to
    /// date, or a merge commit summary).
    pub merge_detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stash: Option<StashState>,
    /// Local commits ahead of the upstream branch after the merge.
    pub local_commits: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub local_commits_error: Option<String>,
}

impl SyncReport {
    /// False only when the stash pop failed after the pushed merge.
    pub fn stash_fully_restored(&self) -> bool {
        self.stash.as_ref().map(|stash| stash.restored).unwrap_or(true)
    }
}

/// Run the full workflow. The merged result has been pushed when this
/// returns `Ok`; on `Err`, any stash taken has been restored (its failure
/// to restore is logged, never silently dropped).
pub fn run<EG, EH>(
    git: &Git<EG>,
    host: &ForkHost<EH>,
    config: &SyncConfig,
) -> Result<SyncReport, SyncError>
where
    EG: CommandExecutor,
    EH: CommandExecutor,
{
    preflight(git, host)?;

    let (branch, branch_created) = resolve_branch(git, config)?;
    info!(branch, branch_created, "resolved working branch");

    let upstream_remote_added = register_upstream(git, config)?;
    git.fetch(&config.upstream_remote)?;
    info!(remote = %config.upstream_remote, "fetched upstream history");

    let (changed_files, changed_files_error) = enumerate_changes(git, &config.upstream_ref());
    let stash_message = preserve_dirty_state(git)?;

    let session = SyncSession {
        branch,
        branch_created,
        upstream_remote_added,
        changed_files,
        changed_files_error,
        stash_message,
    };

    match sync_merge_push(git, host, config, &session) {
        Ok(merge_detail) => finish(git, config, session, merge_detail),
        Err(error) => {
            restore_stash_after_failure(git, &session);
            Err(error)
        }
    }
}

/// Preconditions: git present, working directory is a repository, host CLI
/// present. Nothing is mutated and no network operation is attempted.
fn preflight<EG, EH>(git: &Git<EG>, host: &ForkHost<EH>) -> Result<(), SyncError>
where
    EG: CommandExecutor,
    EH: CommandExecutor,
{
    match git.is_work_tree() {
        Ok(true) => {}
        Ok(false) => {
            return Err(SyncError::SetupMissing { path: git.repo_path().to_path_buf() });
        }
        Err(GitError::BinaryMissing) => return Err(SyncError::ToolMissing { tool: "git" }),
        Err(error) => return Err(error.into()),
    }

    match host.check_available() {
        Ok(()) => Ok(()),
        // A host CLI that is present but cannot even report its version is
        // treated the same as an absent one: install/repair and re-run.
        Err(_) => Err(SyncError::ToolMissing { tool: HOST_CLI }),
    }
}

/// Detached HEAD is remedied by creating the configured default branch at
/// the current commit so later steps have a named target.
fn resolve_branch<E: CommandExecutor>(
    git: &Git<E>,
    config: &SyncConfig,
) -> Result<(String, bool), SyncError> {
    if let Some(branch) = git.current_branch()? {
        return Ok((branch, false));
    }
    warn!(branch = %config.default_branch, "detached HEAD; creating default branch");
    git.create_branch(&config.default_branch)?;
    Ok((config.default_branch.clone(), true))
}

/// Idempotent: creates the upstream remote or normalizes its URL.
fn register_upstream<E: CommandExecutor>(
    git: &Git<E>,
    config: &SyncConfig,
) -> Result<bool, SyncError> {
    let exists = git.remotes()?.iter().any(|remote| remote == &config.upstream_remote);
    if exists {
        git.set_remote_url(&config.upstream_remote, &config.upstream_url)?;
        Ok(false)
    } else {
        git.add_remote(&config.upstream_remote, &config.upstream_url)?;
        Ok(true)
    }
}

/// Non-fatal diagnostic: which files the user should expect the merge to
/// touch. A failure here is surfaced in the report, never masked.
fn enumerate_changes<E: CommandExecutor>(
    git: &Git<E>,
    upstream_ref: &str,
) -> (Vec<String>, Option<String>) {
    match git.changed_files_against(upstream_ref) {
        Ok(files) => {
            debug!(count = files.len(), "enumerated files differing from upstream");
            (files, None)
        }
        Err(error) => {
            warn!(%error, "change enumeration failed (non-fatal)");
            (Vec::new(), Some(error.to_string()))
        }
    }
}

/// Stash tracked/staged changes under a timestamped message so they can be
/// restored whatever happens next.
fn preserve_dirty_state<E: CommandExecutor>(git: &Git<E>) -> Result<Option<String>, SyncError> {
    if !git.has_uncommitted_changes()? {
        return Ok(None);
    }
    let message = format!("forksync auto-stash {}", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"));
    git.stash_push(&message)?;
    info!(%message, "stashed uncommitted changes");
    Ok(Some(message))
}

/// Steps 6–8: server-side fork sync, local merge, push. Any `Err` from
/// here obligates the caller to restore the stash.
fn sync_merge_push<EG, EH>(
    git: &Git<EG>,
    host: &ForkHost<EH>,
    config: &SyncConfig,
    session: &SyncSession,
) -> Result<String, SyncError>
where
    EG: CommandExecutor,
    EH: CommandExecutor,
{
    host.sync_fork(&config.fork, &config.default_branch).map_err(SyncError::RemoteSync)?;
    info!(fork = %config.fork, branch = %config.default_branch, "fork synced server-side");

    git.fetch(&config.origin_remote)?;
    let merge_detail = match git.merge(&config.origin_ref())? {
        MergeOutcome::Merged { detail } => detail,
        MergeOutcome::Conflicts { files } => {
            // Leave no merge in progress: the working tree must return to
            // its pre-merge state before the stash can be restored.
            git.abort_merge()?;
            return Err(SyncError::MergeConflict { files });
        }
    };
    info!(detail = %merge_detail, "merged fork branch");

    git.push(&config.origin_remote, &session.branch).map_err(|source| SyncError::Push {
        remote: config.origin_remote.clone(),
        source,
    })?;
    info!(remote = %config.origin_remote, branch = %session.branch, "pushed merged branch");

    Ok(merge_detail)
}

/// Steps 9–10 after a successful push: pop the stash and list local-only
/// commits. Both stay non-fatal; their failures are carried in the report.
fn finish<E: CommandExecutor>(
    git: &Git<E>,
    config: &SyncConfig,
    session: SyncSession,
    merge_detail: String,
) -> Result<SyncReport, SyncError> {
    let stash = session.stash_message.as_ref().map(|message| match git.stash_pop() {
        Ok(()) => StashState { message: message.clone(), restored: true, restore_error: None },
        Err(error) => {
            warn!(%error, "stash pop failed; the pushed merge is kept, resolve the stash manually");
            StashState {
                message: message.clone(),
                restored: false,
                restore_error: Some(error.to_string()),
            }
        }
    });

    let (local_commits, local_commits_error) = match git.commits_ahead_of(&config.upstream_ref()) {
        Ok(commits) => (commits, None),
        Err(error) => {
            warn!(%error, "local commit summary failed (non-fatal)");
            (Vec::new(), Some(error.to_string()))
        }
    };

    Ok(SyncReport {
        branch: session.branch,
        branch_created: session.branch_created,
        upstream_remote_added: session.upstream_remote_added,
        changed_files: session.changed_files,
        changed_files_error: session.changed_files_error,
        merge_detail,
        stash,
        local_commits,
        local_commits_error,
    })
}

fn restore_stash_after_failure<E: CommandExecutor>(git: &Git<E>, session: &SyncSession) {
    let Some(message) = &session.stash_message else {
        return;
    };
    match git.stash_pop() {
        Ok(()) => info!(%message, "restored stashed changes after failure"),
        Err(error) => {
            warn!(%message, %error, "failed to restore stash; recover it with `git stash pop`");
        }
    }
}
