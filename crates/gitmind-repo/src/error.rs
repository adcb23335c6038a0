//! Error types for gitmind-repo

use thiserror::Error;

/// Errors raised by a repository backend.
#[derive(Error, Debug)]
pub enum RepoError {
    /// The `git` executable could not be launched.
    #[error("failed to run git {operation}: {source}")]
    Launch {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// `git` ran but exited unsuccessfully.
    #[error("git {operation} failed: {stderr}")]
    Command { operation: String, stderr: String },

    /// No stash matched the requested entry.
    #[error("stash not found: {0}")]
    StashNotFound(String),

    /// A commit referenced by id does not exist.
    #[error("commit not found: {0}")]
    CommitNotFound(String),

    /// A path could not be staged or removed.
    #[error("path not stageable: {0}")]
    PathNotFound(String),

    /// HEAD does not point at a commit yet.
    #[error("repository has no commits")]
    NoHead,

    /// Failure injected by a fake backend.
    #[error("injected failure in {operation}")]
    Injected { operation: String },
}

/// Result type for repository operations
pub type RepoResult<T> = std::result::Result<T, RepoError>;
