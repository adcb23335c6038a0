//! In-memory fake for `RepoPort` (testing only)
//!
//! `MemoryRepo` models a single branch with HEAD history, an index, a working
//! tree, a stash stack and HEAD notes, all as plain maps of
//! `path -> content`. Every call is logged, and any operation can be told to
//! fail on its N-th invocation so abort paths are testable.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::{RepoError, RepoResult};
use crate::port::{CommitId, RepoOp, RepoPort, StashEntry};

type Tree = BTreeMap<String, String>;

#[derive(Debug, Clone)]
struct FakeCommit {
    parent: Option<CommitId>,
    message: String,
    tree: Tree,
}

#[derive(Debug, Clone)]
struct FakeStash {
    message: String,
    /// Staged delta: `Some(content)` for additions/modifications, `None` for deletions.
    staged: BTreeMap<String, Option<String>>,
}

#[derive(Debug, Default)]
struct RepoState {
    commits: HashMap<CommitId, FakeCommit>,
    head: Option<CommitId>,
    index: Tree,
    worktree: Tree,
    /// Newest first, like `git stash list`.
    stashes: Vec<FakeStash>,
    notes: HashMap<CommitId, String>,
    next_id: u64,
    calls: HashMap<RepoOp, usize>,
    failures: HashMap<RepoOp, BTreeSet<usize>>,
    stash_unavailable: bool,
    log: Vec<RepoOp>,
    /// Most stashes and notes seen alive before any call.
    peak_stashes: usize,
    peak_notes: usize,
}

impl RepoState {
    fn head_tree(&self) -> Tree {
        self.head
            .as_ref()
            .and_then(|id| self.commits.get(id))
            .map(|c| c.tree.clone())
            .unwrap_or_default()
    }

    fn enter(&mut self, op: RepoOp) -> RepoResult<()> {
        self.peak_stashes = self.peak_stashes.max(self.stashes.len());
        self.peak_notes = self.peak_notes.max(self.notes.len());
        self.log.push(op);
        let n = self.calls.entry(op).or_insert(0);
        *n += 1;
        let nth = *n;
        if self.failures.get(&op).is_some_and(|set| set.contains(&nth)) {
            return Err(RepoError::Injected {
                operation: op.as_str().to_string(),
            });
        }
        Ok(())
    }

    fn staged_delta(&self) -> BTreeMap<String, Option<String>> {
        let head = self.head_tree();
        let mut delta = BTreeMap::new();
        for (path, content) in &self.index {
            if head.get(path) != Some(content) {
                delta.insert(path.clone(), Some(content.clone()));
            }
        }
        for path in head.keys() {
            if !self.index.contains_key(path) {
                delta.insert(path.clone(), None);
            }
        }
        delta
    }

    fn allocate_id(&mut self) -> CommitId {
        self.next_id += 1;
        CommitId(format!("{:040x}", 0xc0ffee_u64 * 1000 + self.next_id))
    }
}

/// A commit reachable from HEAD, as seen by tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeCommitInfo {
    pub id: CommitId,
    pub message: String,
    /// Paths whose content differs from the parent commit.
    pub changed_paths: Vec<String>,
}

/// In-memory repository backed by `BTreeMap<path, content>` trees.
#[derive(Debug, Default)]
pub struct MemoryRepo {
    state: Mutex<RepoState>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, RepoState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Commit `files` directly as a baseline, bypassing the op log.
    pub fn seed_commit(&self, message: &str, files: &[(&str, &str)]) -> CommitId {
        let mut st = self.state();
        for (path, content) in files {
            st.worktree.insert(path.to_string(), content.to_string());
            st.index.insert(path.to_string(), content.to_string());
        }
        let id = st.allocate_id();
        let commit = FakeCommit {
            parent: st.head.clone(),
            message: message.to_string(),
            tree: st.index.clone(),
        };
        st.commits.insert(id.clone(), commit);
        st.head = Some(id.clone());
        id
    }

    /// Write a working-tree file.
    pub fn write_file(&self, path: &str, content: &str) {
        self.state()
            .worktree
            .insert(path.to_string(), content.to_string());
    }

    /// Delete a working-tree file.
    pub fn delete_file(&self, path: &str) {
        self.state().worktree.remove(path);
    }

    /// Stage the whole working tree (`git add -A`), bypassing the op log.
    pub fn stage_all(&self) {
        let mut st = self.state();
        st.index = st.worktree.clone();
    }

    /// Make the `nth` (1-based) call of `op` fail.
    pub fn fail_nth(&self, op: RepoOp, nth: usize) {
        self.state().failures.entry(op).or_default().insert(nth);
    }

    /// Make stash creation unavailable, forcing the temp-commit fallback.
    pub fn disable_stash(&self) {
        self.state().stash_unavailable = true;
    }

    /// Commits reachable from HEAD, oldest first.
    pub fn commits(&self) -> Vec<FakeCommitInfo> {
        let st = self.state();
        let mut out = Vec::new();
        let mut cursor = st.head.clone();
        while let Some(id) = cursor {
            let Some(commit) = st.commits.get(&id) else {
                break;
            };
            let parent_tree = commit
                .parent
                .as_ref()
                .and_then(|p| st.commits.get(p))
                .map(|c| c.tree.clone())
                .unwrap_or_default();
            let mut changed: BTreeSet<String> = BTreeSet::new();
            for (path, content) in &commit.tree {
                if parent_tree.get(path) != Some(content) {
                    changed.insert(path.clone());
                }
            }
            for path in parent_tree.keys() {
                if !commit.tree.contains_key(path) {
                    changed.insert(path.clone());
                }
            }
            out.push(FakeCommitInfo {
                id: id.clone(),
                message: commit.message.clone(),
                changed_paths: changed.into_iter().collect(),
            });
            cursor = commit.parent.clone();
        }
        out.reverse();
        out
    }

    /// Paths currently staged relative to HEAD.
    pub fn staged_paths(&self) -> Vec<String> {
        self.state().staged_delta().into_keys().collect()
    }

    /// Content of a working-tree file.
    pub fn worktree_file(&self, path: &str) -> Option<String> {
        self.state().worktree.get(path).cloned()
    }

    pub fn stash_count(&self) -> usize {
        self.state().stashes.len()
    }

    pub fn head_note(&self) -> Option<String> {
        let st = self.state();
        st.head.as_ref().and_then(|h| st.notes.get(h).cloned())
    }

    /// Highest number of stash entries alive at once, including now.
    pub fn max_live_stashes(&self) -> usize {
        let st = self.state();
        st.peak_stashes.max(st.stashes.len())
    }

    /// Highest number of notes alive at once, including now.
    pub fn max_live_notes(&self) -> usize {
        let st = self.state();
        st.peak_notes.max(st.notes.len())
    }

    /// Every port call made so far, in order.
    pub fn ops(&self) -> Vec<RepoOp> {
        self.state().log.clone()
    }

    /// Number of times `op` has been called.
    pub fn call_count(&self, op: RepoOp) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }
}

fn render_diff(path: &str, old: Option<&String>, new: Option<&String>) -> String {
    let mut out = format!("diff --git a/{path} b/{path}\n");
    let old_lines: Vec<&str> = old.map(|s| s.lines().collect()).unwrap_or_default();
    let new_lines: Vec<&str> = new.map(|s| s.lines().collect()).unwrap_or_default();
    match old {
        None => out.push_str("new file mode 100644\n--- /dev/null\n"),
        Some(_) => out.push_str(&format!("--- a/{path}\n")),
    }
    match new {
        None => out.push_str("+++ /dev/null\n"),
        Some(_) => out.push_str(&format!("+++ b/{path}\n")),
    }
    if old_lines.is_empty() && new_lines.is_empty() {
        return out;
    }
    let old_start = usize::from(!old_lines.is_empty());
    let new_start = usize::from(!new_lines.is_empty());
    out.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        old_start,
        old_lines.len(),
        new_start,
        new_lines.len()
    ));
    for line in old_lines {
        out.push('-');
        out.push_str(line);
        out.push('\n');
    }
    for line in new_lines {
        out.push('+');
        out.push_str(line);
        out.push('\n');
    }
    out
}

#[async_trait]
impl RepoPort for MemoryRepo {
    async fn staged_diff(&self) -> RepoResult<String> {
        let mut st = self.state();
        st.enter(RepoOp::StagedDiff)?;
        let head = st.head_tree();
        let mut out = String::new();
        for (path, new) in st.staged_delta() {
            out.push_str(&render_diff(&path, head.get(&path), new.as_ref()));
        }
        Ok(out)
    }

    async fn has_staged_changes(&self) -> RepoResult<bool> {
        let mut st = self.state();
        st.enter(RepoOp::HasStagedChanges)?;
        Ok(!st.staged_delta().is_empty())
    }

    async fn path_exists(&self, path: &str) -> bool {
        self.state().worktree.contains_key(path)
    }

    async fn stage_path(&self, path: &str) -> RepoResult<()> {
        let mut st = self.state();
        st.enter(RepoOp::StagePath)?;
        let content = st
            .worktree
            .get(path)
            .cloned()
            .ok_or_else(|| RepoError::PathNotFound(path.to_string()))?;
        st.index.insert(path.to_string(), content);
        Ok(())
    }

    async fn remove_path(&self, path: &str) -> RepoResult<()> {
        let mut st = self.state();
        st.enter(RepoOp::RemovePath)?;
        st.index
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| RepoError::PathNotFound(path.to_string()))
    }

    async fn clear_index(&self) -> RepoResult<()> {
        let mut st = self.state();
        st.enter(RepoOp::ClearIndex)?;
        st.index = st.head_tree();
        Ok(())
    }

    async fn stash_staged(&self, message: &str) -> RepoResult<()> {
        let mut st = self.state();
        st.enter(RepoOp::StashStaged)?;
        if st.stash_unavailable {
            return Err(RepoError::Command {
                operation: "stash push --staged".to_string(),
                stderr: "error: unknown option `staged'".to_string(),
            });
        }
        let staged = st.staged_delta();
        if staged.is_empty() {
            return Ok(());
        }
        let head = st.head_tree();
        for path in staged.keys() {
            match head.get(path) {
                Some(content) => {
                    st.worktree.insert(path.clone(), content.clone());
                }
                None => {
                    st.worktree.remove(path);
                }
            }
        }
        st.index = head;
        st.stashes.insert(
            0,
            FakeStash {
                message: format!("On main: {message}"),
                staged,
            },
        );
        Ok(())
    }

    async fn list_stashes(&self) -> RepoResult<Vec<StashEntry>> {
        let mut st = self.state();
        st.enter(RepoOp::ListStashes)?;
        Ok(st
            .stashes
            .iter()
            .enumerate()
            .map(|(index, s)| StashEntry {
                index,
                message: s.message.clone(),
            })
            .collect())
    }

    async fn pop_stash(&self, index: usize) -> RepoResult<()> {
        let mut st = self.state();
        st.enter(RepoOp::PopStash)?;
        if index >= st.stashes.len() {
            return Err(RepoError::StashNotFound(format!("stash@{{{index}}}")));
        }
        let stash = st.stashes.remove(index);
        for (path, content) in stash.staged {
            match content {
                Some(content) => {
                    st.worktree.insert(path.clone(), content.clone());
                    st.index.insert(path, content);
                }
                None => {
                    st.worktree.remove(&path);
                    st.index.remove(&path);
                }
            }
        }
        Ok(())
    }

    async fn commit(&self, message: &str) -> RepoResult<CommitId> {
        let mut st = self.state();
        st.enter(RepoOp::Commit)?;
        if st.staged_delta().is_empty() {
            return Err(RepoError::Command {
                operation: "commit".to_string(),
                stderr: "nothing to commit".to_string(),
            });
        }
        let id = st.allocate_id();
        let commit = FakeCommit {
            parent: st.head.clone(),
            message: message.to_string(),
            tree: st.index.clone(),
        };
        st.commits.insert(id.clone(), commit);
        st.head = Some(id.clone());
        Ok(id)
    }

    async fn head(&self) -> RepoResult<Option<CommitId>> {
        Ok(self.state().head.clone())
    }

    async fn read_head_note(&self) -> RepoResult<Option<String>> {
        let mut st = self.state();
        st.enter(RepoOp::ReadHeadNote)?;
        Ok(st.head.as_ref().and_then(|h| st.notes.get(h).cloned()))
    }

    async fn write_head_note(&self, text: &str) -> RepoResult<()> {
        let mut st = self.state();
        st.enter(RepoOp::WriteHeadNote)?;
        let head = st.head.clone().ok_or(RepoError::NoHead)?;
        st.notes.insert(head, text.to_string());
        Ok(())
    }

    async fn remove_head_note(&self) -> RepoResult<()> {
        let mut st = self.state();
        st.enter(RepoOp::RemoveHeadNote)?;
        if let Some(head) = st.head.clone() {
            st.notes.remove(&head);
        }
        Ok(())
    }

    async fn reapply_commit_staged(&self, commit: &CommitId) -> RepoResult<()> {
        let mut st = self.state();
        st.enter(RepoOp::ReapplyCommitStaged)?;
        let tree = st
            .commits
            .get(commit)
            .map(|c| c.tree.clone())
            .ok_or_else(|| RepoError::CommitNotFound(commit.to_string()))?;
        st.index = tree;
        Ok(())
    }

    async fn soft_reset_back(&self) -> RepoResult<()> {
        let mut st = self.state();
        st.enter(RepoOp::SoftResetBack)?;
        let head = st.head.clone().ok_or(RepoError::NoHead)?;
        let parent = st.commits.get(&head).and_then(|c| c.parent.clone());
        st.head = parent;
        Ok(())
    }
}
