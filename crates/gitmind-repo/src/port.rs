//! Repository port definition for gitmind
//!
//! `RepoPort` is the only way gitmind touches a repository. It covers:
//! - reading the staged diff and index state
//! - staging, deleting and unstaging paths
//! - stash-based and commit-based temporary storage of staged work
//! - creating commits and attaching recovery notes to HEAD
//!
//! All methods are async and backend-agnostic. An in-memory implementation
//! lives in the `fakes` module.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RepoResult;

/// Identifier of a commit (a full SHA for the git backend).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl CommitId {
    pub fn new(id: impl Into<String>) -> Self {
        CommitId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 8 chars).
    pub fn short(&self) -> &str {
        &self.0[..8.min(self.0.len())]
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the stash list, newest first (`stash@{index}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StashEntry {
    pub index: usize,
    pub message: String,
}

impl StashEntry {
    /// Git revision naming this entry.
    pub fn reference(&self) -> String {
        format!("stash@{{{}}}", self.index)
    }
}

/// Operations of the port, used for fake failure injection and op logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoOp {
    StagedDiff,
    HasStagedChanges,
    StagePath,
    RemovePath,
    ClearIndex,
    StashStaged,
    ListStashes,
    PopStash,
    Commit,
    ReadHeadNote,
    WriteHeadNote,
    RemoveHeadNote,
    ReapplyCommitStaged,
    SoftResetBack,
}

impl RepoOp {
    pub fn as_str(self) -> &'static str {
        match self {
            RepoOp::StagedDiff => "staged_diff",
            RepoOp::HasStagedChanges => "has_staged_changes",
            RepoOp::StagePath => "stage_path",
            RepoOp::RemovePath => "remove_path",
            RepoOp::ClearIndex => "clear_index",
            RepoOp::StashStaged => "stash_staged",
            RepoOp::ListStashes => "list_stashes",
            RepoOp::PopStash => "pop_stash",
            RepoOp::Commit => "commit",
            RepoOp::ReadHeadNote => "read_head_note",
            RepoOp::WriteHeadNote => "write_head_note",
            RepoOp::RemoveHeadNote => "remove_head_note",
            RepoOp::ReapplyCommitStaged => "reapply_commit_staged",
            RepoOp::SoftResetBack => "soft_reset_back",
        }
    }
}

impl std::fmt::Display for RepoOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability set over a single working tree and index.
///
/// Guarantees expected from every backend:
/// - `clear_index` never touches the working tree.
/// - `stash_staged` removes exactly the staged work from the index.
/// - `pop_stash` restores the stashed work into the index again.
/// - `reapply_commit_staged` stages the commit's tree without committing.
/// - `soft_reset_back` moves the branch pointer only.
#[async_trait]
pub trait RepoPort: Send + Sync {
    /// Unified diff of the index against HEAD.
    async fn staged_diff(&self) -> RepoResult<String>;

    /// Whether the index differs from HEAD.
    async fn has_staged_changes(&self) -> RepoResult<bool>;

    /// Whether `path` exists in the working tree.
    async fn path_exists(&self, path: &str) -> bool;

    /// Stage an addition or modification of `path`.
    async fn stage_path(&self, path: &str) -> RepoResult<()>;

    /// Stage the deletion of `path`.
    async fn remove_path(&self, path: &str) -> RepoResult<()>;

    /// Unstage everything, leaving the working tree as is.
    async fn clear_index(&self) -> RepoResult<()>;

    /// Move the staged work into a stash entry labelled `message`.
    async fn stash_staged(&self, message: &str) -> RepoResult<()>;

    /// List stash entries, newest first.
    async fn list_stashes(&self) -> RepoResult<Vec<StashEntry>>;

    /// Pop the stash entry at `index`, restoring its staged state.
    async fn pop_stash(&self, index: usize) -> RepoResult<()>;

    /// Commit the index with `message`.
    async fn commit(&self, message: &str) -> RepoResult<CommitId>;

    /// Current HEAD commit, if any.
    async fn head(&self) -> RepoResult<Option<CommitId>>;

    /// Note attached to HEAD, if any.
    async fn read_head_note(&self) -> RepoResult<Option<String>>;

    /// Attach `text` as the note of HEAD, replacing an existing note.
    async fn write_head_note(&self, text: &str) -> RepoResult<()>;

    /// Remove the note attached to HEAD.
    async fn remove_head_note(&self) -> RepoResult<()>;

    /// Load the tree of `commit` into the index without committing.
    async fn reapply_commit_staged(&self, commit: &CommitId) -> RepoResult<()>;

    /// Move the branch pointer back one commit, keeping index and tree.
    async fn soft_reset_back(&self) -> RepoResult<()>;
}
