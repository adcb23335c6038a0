//! Error taxonomy for gitmind-core.
//!
//! Parse and extraction errors are recoverable and never leave their stage;
//! configuration errors fail before any repository mutation; repository
//! errors abort a split run.

use gitmind_repo::{CommitId, RepoError};

use crate::orchestrator::snapshot::Snapshot;

/// Malformed diff input. Collected as warnings, never propagated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed hunk header at line {line_no}: {line}")]
    MalformedHunkHeader { line_no: usize, line: String },

    #[error("hunk at line {line_no} has no owning file")]
    OrphanHunk { line_no: usize },
}

/// Per-file symbol analysis failure. Downgrades the Change to unanalyzed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("symbol extraction failed for {path} ({language}): {reason}")]
pub struct ExtractionError {
    pub path: String,
    pub language: String,
    pub reason: String,
}

/// Invalid multi-commit settings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("similarity threshold must be within [0.0, 1.0], got {0}")]
    ThresholdOutOfRange(f64),

    #[error("max_clusters must be at least 1")]
    ZeroMaxClusters,

    #[error("config file not found: {0}")]
    NotFound(String),

    #[error("invalid config file {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Outcome of the single recovery attempt made when a run aborts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The live snapshot was restored into the index.
    Restored(Snapshot),
    /// No snapshot was live; the outstanding files were staged again.
    Restaged { files: Vec<String> },
    /// Recovery failed; the snapshot must be restored by hand.
    Failed { snapshot: Snapshot, reason: String },
    /// Re-staging failed for some files.
    PartiallyRestaged { unstaged: Vec<String> },
    /// A temp commit left on the branch was undone, its work is staged.
    Unwound { commit: CommitId },
    /// A temp commit is still on the branch and must be undone by hand.
    Stranded { commit: CommitId, reason: String },
}

impl std::fmt::Display for RecoveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecoveryOutcome::Restored(snapshot) => {
                write!(f, "staged work restored from {}", snapshot.kind())
            }
            RecoveryOutcome::Restaged { files } => {
                write!(f, "{} outstanding file(s) staged again", files.len())
            }
            RecoveryOutcome::Failed { snapshot, reason } => write!(
                f,
                "restore FAILED ({reason}); staged work is held in {} `{}`. Recover manually with:\n{}",
                snapshot.kind(),
                snapshot.token(),
                snapshot.recovery_hint()
            ),
            RecoveryOutcome::PartiallyRestaged { unstaged } => write!(
                f,
                "could not stage again: {}; run `git add` on them manually",
                unstaged.join(", ")
            ),
            RecoveryOutcome::Unwound { commit } => {
                write!(f, "temp commit {commit} undone, staged work is back in the index")
            }
            RecoveryOutcome::Stranded { commit, reason } => write!(
                f,
                "undo FAILED ({reason}); temp commit {commit} is still on the branch. Recover manually with:\n  git reset --soft HEAD~1"
            ),
        }
    }
}

/// gitmind-core errors.
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("repository error: {0}")]
    Repo(#[from] RepoError),

    #[error(
        "failed to restore {} `{}`: {source}. Recover manually with:\n{}",
        .snapshot.kind(),
        .snapshot.token(),
        .snapshot.recovery_hint()
    )]
    Snapshot {
        snapshot: Snapshot,
        #[source]
        source: RepoError,
    },

    #[error(
        "commit proposal {index} failed after {committed} commit(s): {source}; recovery: {recovery}"
    )]
    ProposalFailed {
        /// 1-based index of the failing proposal.
        index: usize,
        committed: usize,
        #[source]
        source: RepoError,
        recovery: RecoveryOutcome,
    },

    #[error("confirmation failed: {0}")]
    Confirm(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for gitmind-core operations.
pub type Result<T> = std::result::Result<T, SplitError>;
