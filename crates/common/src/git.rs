// Typed wrapper over the `git` binary.
//
// Only the operations the sync workflow needs are exposed. All of them run
// through the injected `CommandExecutor`.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::exec::{is_missing_binary, render_command, CommandExecutor, CommandResult};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitError {
    #[error("`git` was not found in PATH")]
    BinaryMissing,
    #[error("failed to run `{command}`: {message}")]
    SpawnFailed { command: String, message: String },
    #[error("`{command}` failed with code {code:?}: {stderr}")]
    CommandFailed { command: String, code: Option<i32>, stderr: String },
}

/// Outcome of `git merge`: either completed (including fast-forward and
/// already-up-to-date no-ops) or stopped on conflicts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    Merged { detail: String },
    Conflicts { files: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct Git<E> {
    repo_path: PathBuf,
    executor: E,
}

impl<E: CommandExecutor> Git<E> {
    pub fn new(repo_path: impl Into<PathBuf>, executor: E) -> Self {
        Self { repo_path: repo_path.into(), executor }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Whether `repo_path` is inside a git work tree. A failing probe means
    /// "not a repository", not an error.
    pub fn is_work_tree(&self) -> Result<bool, GitError> {
        let result = self.run_unchecked(&["rev-parse", "--is-inside-work-tree"])?;
        Ok(result.success)
    }

    /// The checked-out branch name, or `None` for a detached HEAD.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        let result = self.run_unchecked(&["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        if result.success {
            Ok(Some(result.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    /// Create and check out `name` at the current commit.
    pub fn create_branch(&self, name: &str) -> Result<(), GitError> {
        self.run(&["checkout", "-b", name]).map(drop)
    }

    pub fn remotes(&self) -> Result<Vec<String>, GitError> {
        let output = self.run(&["remote"])?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn add_remote(&self, name: &str, remote_url: &str) -> Result<(), GitError> {
        self.run(&["remote", "add", name, remote_url]).map(drop)
    }

    pub fn set_remote_url(&self, name: &str, remote_url: &str) -> Result<(), GitError> {
        self.run(&["remote", "set-url", name, remote_url]).map(drop)
    }

    pub fn fetch(&self, remote: &str) -> Result<(), GitError> {
        self.run(&["fetch", remote]).map(drop)
    }

    /// Files differing between HEAD and `reference` (`diff --name-only`).
    pub fn changed_files_against(&self, reference: &str) -> Result<Vec<String>, GitError> {
        let output = self.run(&["diff", "--name-only", "HEAD", reference])?;
        Ok(name_lines(&output.stdout))
    }

    /// Whether tracked or staged changes exist. Untracked files do not count
    /// and are not stashed.
    pub fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        let output = self.run(&["status", "--porcelain", "--untracked-files=no"])?;
        Ok(!output.stdout.trim().is_empty())
    }

    pub fn stash_push(&self, message: &str) -> Result<(), GitError> {
        self.run(&["stash", "push", "-m", message]).map(drop)
    }

    pub fn stash_pop(&self) -> Result<(), GitError> {
        self.run(&["stash", "pop"]).map(drop)
    }

    /// Merge `reference` into the current branch. A merge stopped by
    /// conflicts is an outcome, not an error; any other failure propagates.
    pub fn merge(&self, reference: &str) -> Result<MergeOutcome, GitError> {
        let args = ["merge", "--no-edit", reference];
        let result = self.run_unchecked(&args)?;
        if result.success {
            return Ok(MergeOutcome::Merged { detail: result.stdout.trim().to_string() });
        }

        let conflicts = self.conflict_files()?;
        if conflicts.is_empty() {
            return Err(command_failed(&args, &result));
        }
        Ok(MergeOutcome::Conflicts { files: conflicts })
    }

    /// Unmerged paths, exactly as git reports them.
    pub fn conflict_files(&self) -> Result<Vec<String>, GitError> {
        let output = self.run(&["diff", "--name-only", "--diff-filter=U"])?;
        Ok(name_lines(&output.stdout))
    }

    pub fn abort_merge(&self) -> Result<(), GitError> {
        self.run(&["merge", "--abort"]).map(drop)
    }

    pub fn push(&self, remote: &str, branch: &str) -> Result<(), GitError> {
        self.run(&["push", remote, branch]).map(drop)
    }

    /// One-line subjects of commits in `reference..HEAD`.
    pub fn commits_ahead_of(&self, reference: &str) -> Result<Vec<String>, GitError> {
        let range = format!("{reference}..HEAD");
        let output = self.run(&["log", "--oneline", &range])?;
        Ok(name_lines(&output.stdout))
    }

    fn run(&self, args: &[&str]) -> Result<CommandResult, GitError> {
        let result = self.run_unchecked(args)?;
        if result.success {
            Ok(result)
        } else {
            Err(command_failed(args, &result))
        }
    }

    /// Run git, mapping only spawn failures to errors; the caller inspects
    /// the exit status itself.
    fn run_unchecked(&self, args: &[&str]) -> Result<CommandResult, GitError> {
        let owned: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        self.executor.execute("git", &owned, &self.repo_path).map_err(|error| {
            if is_missing_binary(&error) {
                GitError::BinaryMissing
            } else {
                GitError::SpawnFailed {
                    command: render_command("git", &owned),
                    message: error.to_string(),
                }
            }
        })
    }
}

fn command_failed(args: &[&str], result: &CommandResult) -> GitError {
    let owned: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
    let stderr = if result.stderr.trim().is_empty() {
        result.stdout.trim().to_string()
    } else {
        result.stderr.trim().to_string()
    };
    GitError::CommandFailed { command: render_command("git", &owned), code: result.code, stderr }
}

fn name_lines(stdout: &str) -> Vec<String> {
    stdout.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::testing::{failed, ok, spawn_missing, MockExecutor};

    fn git_with(responses: Vec<Result<CommandResult, std::io::Error>>) -> (Git<MockExecutor>, MockExecutor) {
        let mock = MockExecutor::new(responses);
        (Git::new("/tmp/repo", mock.clone()), mock)
    }

    #[test]
    fn work_tree_probe_maps_failure_to_false() {
        let (git, mock) = git_with(vec![failed("fatal: not a git repository\n")]);
        assert!(!git.is_work_tree().expect("probe should not error"));
        assert_eq!(mock.calls()[0].args, vec!["rev-parse", "--is-inside-work-tree"]);
    }

    #[test]
    fn current_branch_detached_head_is_none() {
        let (git, _) = git_with(vec![failed("")]);
        assert_eq!(git.current_branch().expect("detached head is not an error"), None);
    }

    #[test]
    fn current_branch_trims_output() {
        let (git, mock) = git_with(vec![ok("main\n")]);
        assert_eq!(git.current_branch().expect("branch should resolve"), Some("main".to_string()));
        assert_eq!(mock.calls()[0].args, vec!["symbolic-ref", "--quiet", "--short", "HEAD"]);
    }

    #[test]
    fn remotes_splits_and_filters_lines() {
        let (git, _) = git_with(vec![ok("origin\nupstream\n\n")]);
        assert_eq!(git.remotes().expect("remotes should list"), vec!["origin", "upstream"]);
    }

    #[test]
    fn dirty_probe_ignores_untracked_files() {
        let (git, mock) = git_with(vec![ok("")]);
        assert!(!git.has_uncommitted_changes().expect("status should run"));
        assert_eq!(mock.calls()[0].args, vec!["status", "--porcelain", "--untracked-files=no"]);
    }

    #[test]
    fn merge_conflict_reports_gits_own_file_list() {
        let (git, mock) = git_with(vec![
            failed("CONFLICT (content): Merge conflict in src/lib.rs\n"),
            ok("src/lib.rs\ndocs/setup.md\n"),
        ]);

        let outcome = git.merge("origin/main").expect("conflict is an outcome, not an error");
        assert_eq!(
            outcome,
            MergeOutcome::Conflicts {
                files: vec!["src/lib.rs".to_string(), "docs/setup.md".to_string()]
            }
        );
        let calls = mock.calls();
        assert_eq!(calls[0].args, vec!["merge", "--no-edit", "origin/main"]);
        assert_eq!(calls[1].args, vec!["diff", "--name-only", "--diff-filter=U"]);
    }

    #[test]
    fn merge_failure_without_conflicts_is_an_error() {
        let (git, _) = git_with(vec![
            failed("fatal: refusing to merge unrelated histories\n"),
            ok(""),
        ]);

        let error = git.merge("origin/main").expect_err("non-conflict failure should propagate");
        match error {
            GitError::CommandFailed { command, stderr, .. } => {
                assert_eq!(command, "git merge --no-edit origin/main");
                assert!(stderr.contains("unrelated histories"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn merge_fast_forward_detail_is_kept() {
        let (git, _) = git_with(vec![ok("Updating 1a2b3c..4d5e6f\nFast-forward\n")]);
        let outcome = git.merge("origin/main").expect("merge should succeed");
        match outcome {
            MergeOutcome::Merged { detail } => assert!(detail.contains("Fast-forward")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn push_passes_remote_and_branch() {
        let (git, mock) = git_with(vec![ok("")]);
        git.push("origin", "main").expect("push should succeed");
        assert_eq!(mock.calls()[0].args, vec!["push", "origin", "main"]);
    }

    #[test]
    fn commits_ahead_builds_range_against_reference() {
        let (git, mock) = git_with(vec![ok("abc1234 keep local patch\n")]);
        let commits = git.commits_ahead_of("upstream/main").expect("log should run");
        assert_eq!(commits, vec!["abc1234 keep local patch"]);
        assert_eq!(mock.calls()[0].args, vec!["log", "--oneline", "upstream/main..HEAD"]);
    }

    #[test]
    fn missing_git_binary_maps_to_dedicated_variant() {
        let (git, _) = git_with(vec![spawn_missing()]);
        let error = git.is_work_tree().expect_err("spawn failure should surface");
        assert_eq!(error, GitError::BinaryMissing);
    }

    #[test]
    fn command_failure_falls_back_to_stdout_when_stderr_empty() {
        let mock = MockExecutor::new(vec![Ok(CommandResult {
            success: false,
            code: Some(128),
            stdout: "everything went sideways\n".to_string(),
            stderr: String::new(),
        })]);
        let git = Git::new("/tmp/repo", mock);

        let error = git.fetch("upstream").expect_err("fetch should fail");
        match error {
            GitError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, Some(128));
                assert_eq!(stderr, "everything went sideways");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
