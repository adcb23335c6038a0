//! Snapshots of staged work held outside the index during a split run.
//!
//! The primary mechanism is a named stash. When stashing is unavailable the
//! staged work goes into a temporary commit instead: the branch is moved
//! back one commit, and the temp commit's id is written as a note on HEAD so
//! it can be found again after a crash.

use gitmind_repo::{CommitId, RepoError, RepoPort, RepoResult};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// Prefix of stash messages created by gitmind.
pub const STASH_PREFIX: &str = "gitmind-multi-commit-";
/// Prefix of the HEAD note pointing at a temp commit.
pub const NOTE_PREFIX: &str = "gitmind-temp-commit:";

const TEMP_COMMIT_MESSAGE: &str = "gitmind: temporary snapshot of staged changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotKind {
    Stash,
    TempCommit,
}

impl std::fmt::Display for SnapshotKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotKind::Stash => write!(f, "stash"),
            SnapshotKind::TempCommit => write!(f, "temp-commit"),
        }
    }
}

/// What a failed [`Snapshot::take`] left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leftover {
    /// The temp commit is still on the branch; `git reset --soft HEAD~1`
    /// puts its changes back into the index.
    OnBranch(CommitId),
    /// The staged work is held by this snapshot and must be restored.
    Held(Snapshot),
}

/// Failure of [`Snapshot::take`].
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct TakeError {
    #[source]
    pub source: RepoError,
    /// `None` when nothing was changed before the failure.
    pub leftover: Option<Leftover>,
}

impl From<RepoError> for TakeError {
    fn from(source: RepoError) -> Self {
        Self {
            source,
            leftover: None,
        }
    }
}

/// Staged work temporarily removed from the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Snapshot {
    /// A stash entry identified by its message.
    Stash { message: String },
    /// A commit no longer on the branch, referenced from a HEAD note.
    TempCommit { commit: CommitId },
}

impl Snapshot {
    pub fn kind(&self) -> SnapshotKind {
        match self {
            Snapshot::Stash { .. } => SnapshotKind::Stash,
            Snapshot::TempCommit { .. } => SnapshotKind::TempCommit,
        }
    }

    /// The value needed to find this snapshot again.
    pub fn token(&self) -> &str {
        match self {
            Snapshot::Stash { message } => message,
            Snapshot::TempCommit { commit } => commit.as_str(),
        }
    }

    /// Shell commands that restore this snapshot by hand.
    pub fn recovery_hint(&self) -> String {
        match self {
            Snapshot::Stash { message } => format!(
                "  git stash list | grep '{message}'\n  git stash pop --index stash@{{N}}   # N from the line above"
            ),
            Snapshot::TempCommit { commit } => format!(
                "  git read-tree {commit}\n  git notes remove --ignore-missing HEAD"
            ),
        }
    }

    /// Parse a HEAD note written by [`Snapshot::take`].
    pub fn from_note(note: &str) -> Option<Snapshot> {
        let sha = note.trim().strip_prefix(NOTE_PREFIX)?.trim();
        if sha.is_empty() {
            return None;
        }
        Some(Snapshot::TempCommit {
            commit: CommitId::new(sha),
        })
    }

    /// Stash message for the run `plan_id`.
    pub fn stash_message(plan_id: &str) -> String {
        format!("{STASH_PREFIX}{plan_id}")
    }

    /// Move the staged work out of the index.
    ///
    /// Returns `None` when nothing is staged. Falls back to a temp commit
    /// when stashing fails. A temp commit that was created before a later
    /// step failed is reported in [`TakeError::leftover`].
    pub async fn take(repo: &dyn RepoPort, plan_id: &str) -> Result<Option<Snapshot>, TakeError> {
        if !repo.has_staged_changes().await? {
            return Ok(None);
        }

        let message = Self::stash_message(plan_id);
        match repo.stash_staged(&message).await {
            Ok(()) => Ok(Some(Snapshot::Stash { message })),
            Err(err) => {
                warn!(error = %err, "stash unavailable, falling back to temp commit");
                Self::take_temp_commit(repo).await.map(Some)
            }
        }
    }

    async fn take_temp_commit(repo: &dyn RepoPort) -> Result<Snapshot, TakeError> {
        let commit = repo.commit(TEMP_COMMIT_MESSAGE).await?;

        if let Err(source) = repo.soft_reset_back().await {
            error!(commit = %commit, error = %source, "temp commit left on the branch");
            return Err(TakeError {
                source,
                leftover: Some(Leftover::OnBranch(commit)),
            });
        }

        let note = format!("{NOTE_PREFIX}{commit}");
        let snapshot = Snapshot::TempCommit { commit };
        let detached = async {
            repo.clear_index().await?;
            repo.write_head_note(&note).await
        }
        .await;

        if let Err(source) = detached {
            error!(
                commit = %snapshot.token(),
                error = %source,
                "temp commit off the branch but snapshot incomplete"
            );
            return Err(TakeError {
                source,
                leftover: Some(Leftover::Held(snapshot)),
            });
        }
        Ok(snapshot)
    }

    /// Put the snapshot back into the index (working tree untouched for a
    /// temp commit) and drop its bookkeeping.
    pub async fn restore(&self, repo: &dyn RepoPort) -> RepoResult<()> {
        match self {
            Snapshot::Stash { message } => {
                let stashes = repo.list_stashes().await?;
                let entry = stashes
                    .iter()
                    .find(|s| s.message.contains(message.as_str()))
                    .ok_or_else(|| RepoError::StashNotFound(message.clone()))?;
                repo.pop_stash(entry.index).await
            }
            Snapshot::TempCommit { commit } => {
                repo.reapply_commit_staged(commit).await?;
                repo.remove_head_note().await
            }
        }
    }
}
