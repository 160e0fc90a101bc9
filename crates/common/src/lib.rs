// forksync-common: core of the upstream fork synchronization workflow.

pub mod config;
pub mod exec;
pub mod git;
pub mod host;
pub mod sync;
