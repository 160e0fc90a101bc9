// Sync configuration.
//
// Repo-local file: `<repo>/.forksync.toml`
// Fallback:        `~/.forksync/config.toml`
//
// Everything has a default except the fork identifier, which names the
// repository the hosting platform syncs server-side.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

pub const REPO_CONFIG_FILE: &str = ".forksync.toml";

const DEFAULT_UPSTREAM_URL: &str = "https://github.com/vllm-project/vllm.git";
const DEFAULT_BRANCH: &str = "main";
const DEFAULT_UPSTREAM_REMOTE: &str = "upstream";
const DEFAULT_ORIGIN_REMOTE: &str = "origin";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read `{}`: {source}", .path.display())]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse `{}`: {source}", .path.display())]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("`fork` is not set; add `fork = \"owner/name\"` to {REPO_CONFIG_FILE}")]
    MissingFork,
    #[error("invalid `upstream_url` `{value}`: {message}")]
    InvalidUpstreamUrl { value: String, message: String },
}

/// Configuration for one fork/upstream pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncConfig {
    /// Fork identifier on the hosting platform, `owner/name`.
    pub fork: String,
    /// Clone URL of the upstream repository.
    pub upstream_url: String,
    /// Branch the fork tracks from upstream.
    pub default_branch: String,
    /// Local remote name for the upstream repository.
    pub upstream_remote: String,
    /// Local remote name for the fork.
    pub origin_remote: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            fork: String::new(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            default_branch: DEFAULT_BRANCH.to_string(),
            upstream_remote: DEFAULT_UPSTREAM_REMOTE.to_string(),
            origin_remote: DEFAULT_ORIGIN_REMOTE.to_string(),
        }
    }
}

impl SyncConfig {
    /// Load for a repository: the repo-local file wins, then the
    /// home-directory fallback, then defaults. The result is validated.
    pub fn load(repo_root: &Path) -> Result<Self, ConfigError> {
        let config = match first_existing_config_path(repo_root) {
            Some(path) => Self::load_from(&path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&contents)
            .map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fork.trim().is_empty() {
            return Err(ConfigError::MissingFork);
        }
        Url::parse(&self.upstream_url).map_err(|error| ConfigError::InvalidUpstreamUrl {
            value: self.upstream_url.clone(),
            message: error.to_string(),
        })?;
        Ok(())
    }

    /// The remote-qualified upstream branch, e.g. `upstream/main`.
    pub fn upstream_ref(&self) -> String {
        format!("{}/{}", self.upstream_remote, self.default_branch)
    }

    /// The remote-qualified fork branch, e.g. `origin/main`.
    pub fn origin_ref(&self) -> String {
        format!("{}/{}", self.origin_remote, self.default_branch)
    }
}

fn first_existing_config_path(repo_root: &Path) -> Option<PathBuf> {
    let local = repo_root.join(REPO_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    let fallback = dirs::home_dir()?.join(".forksync").join("config.toml");
    fallback.is_file().then_some(fallback)
}
