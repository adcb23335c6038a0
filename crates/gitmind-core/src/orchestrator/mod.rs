//! Replays commit proposals against a repository as separate commits.
//!
//! State machine:
//!
//! ```text
//! Idle -> [Confirm] -> Snapshot -> (Restore -> Stage -> Commit -> [Re-snapshot])* -> Done
//! ```
//!
//! Any failure in Snapshot, Restore, Stage, Commit or Re-snapshot stops the
//! run. One recovery attempt is then made (restore the live snapshot, undo a
//! temp commit left on the branch, or stage the outstanding files again) and
//! the failing proposal's 1-based index is reported. Commits already created
//! stay in history.

pub mod confirm;
pub mod snapshot;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use gitmind_repo::{CommitId, RepoError, RepoPort, RepoResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn, Instrument};

use crate::error::{RecoveryOutcome, Result, SplitError};
use crate::obs;
use crate::proposal::CommitProposal;

use self::confirm::{AutoConfirm, Confirmer};
use self::snapshot::{Leftover, Snapshot, SnapshotKind, TakeError, STASH_PREFIX};

/// A commit produced by a split run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedCommit {
    /// 1-based proposal index.
    pub index: usize,
    pub commit: CommitId,
    pub files: Vec<String>,
    pub message: String,
}

/// Outcome of [`CommitOrchestrator::execute`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitReport {
    pub plan_id: String,
    pub commits: Vec<CreatedCommit>,
    /// 1-based indices of proposals that staged nothing.
    pub skipped: Vec<usize>,
    /// Mechanism used for the first snapshot, if one was needed.
    pub snapshot_kind: Option<SnapshotKind>,
    /// The confirmer declined; nothing was changed.
    pub cancelled: bool,
}

impl SplitReport {
    fn new(plan_id: &str) -> Self {
        Self {
            plan_id: plan_id.to_string(),
            ..Self::default()
        }
    }
}

/// Sequential multi-commit executor over an injected [`RepoPort`].
///
/// It must be the only writer to the index and working tree while
/// [`execute`](Self::execute) runs.
pub struct CommitOrchestrator {
    repo: Arc<dyn RepoPort>,
    confirmer: Arc<dyn Confirmer>,
    prompt_user: bool,
}

impl CommitOrchestrator {
    /// Orchestrator that never asks for confirmation.
    pub fn new(repo: Arc<dyn RepoPort>) -> Self {
        Self {
            repo,
            confirmer: Arc::new(AutoConfirm),
            prompt_user: false,
        }
    }

    /// Ask `confirmer` before mutating anything when `prompt_user` is set.
    pub fn with_confirmer(mut self, confirmer: Arc<dyn Confirmer>, prompt_user: bool) -> Self {
        self.confirmer = confirmer;
        self.prompt_user = prompt_user;
        self
    }

    /// Commit each proposal in order.
    pub async fn execute(&self, plan_id: &str, proposals: &[CommitProposal]) -> Result<SplitReport> {
        if proposals.is_empty() {
            return Ok(SplitReport::new(plan_id));
        }

        if self.prompt_user && !self.confirmer.confirm(proposals).await? {
            info!(plan_id = %plan_id, "split cancelled by user");
            return Ok(SplitReport {
                cancelled: true,
                ..SplitReport::new(plan_id)
            });
        }

        self.run(plan_id, proposals)
            .instrument(obs::split_span(plan_id))
            .await
    }

    async fn run(&self, plan_id: &str, proposals: &[CommitProposal]) -> Result<SplitReport> {
        let started = Instant::now();
        let repo = self.repo.as_ref();
        obs::emit_split_started(plan_id, proposals.len());

        let mut live = match Snapshot::take(repo, plan_id).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                return Err(self
                    .abort(plan_id, 1, 0, err.source, err.leftover, proposals)
                    .await);
            }
        };
        if let Some(snapshot) = &live {
            obs::emit_snapshot_taken(plan_id, &snapshot.kind().to_string(), snapshot.token());
        }

        let mut report = SplitReport {
            snapshot_kind: live.as_ref().map(Snapshot::kind),
            ..SplitReport::new(plan_id)
        };

        for (i, proposal) in proposals.iter().enumerate() {
            let index = i + 1;

            match self.commit_one(&mut live, proposal).await {
                Ok(Some(commit)) => {
                    obs::emit_commit_created(plan_id, index, commit.as_str(), proposal.files.len());
                    report.commits.push(CreatedCommit {
                        index,
                        commit,
                        files: proposal.files.clone(),
                        message: proposal.message.clone(),
                    });
                }
                Ok(None) => {
                    warn!(index, "nothing staged for proposal, skipping");
                    obs::emit_proposal_skipped(plan_id, index);
                    report.skipped.push(index);
                }
                Err(source) => {
                    let committed = report.commits.len();
                    let outstanding = &proposals[i..];
                    return Err(self
                        .abort(
                            plan_id,
                            index,
                            committed,
                            source,
                            live.take().map(Leftover::Held),
                            outstanding,
                        )
                        .await);
                }
            }

            let remaining = &proposals[index..];
            if remaining.is_empty() {
                break;
            }
            match self.resnapshot(plan_id, remaining).await {
                Ok(snapshot) => live = snapshot,
                Err(err) => {
                    let committed = report.commits.len();
                    return Err(self
                        .abort(plan_id, index + 1, committed, err.source, err.leftover, remaining)
                        .await);
                }
            }
        }

        obs::emit_split_finished(
            plan_id,
            report.commits.len(),
            report.skipped.len(),
            started.elapsed().as_millis() as u64,
        );
        Ok(report)
    }

    /// Restore, stage and commit one proposal. `None` when nothing staged.
    async fn commit_one(
        &self,
        live: &mut Option<Snapshot>,
        proposal: &CommitProposal,
    ) -> RepoResult<Option<CommitId>> {
        let repo = self.repo.as_ref();
        if let Some(snapshot) = live.as_ref() {
            snapshot.restore(repo).await?;
            *live = None;
        }
        repo.clear_index().await?;

        for file in &proposal.files {
            if let Err(err) = self.stage_file(file).await {
                warn!(file = %file, error = %err, "could not stage file, leaving it out");
            }
        }

        if !repo.has_staged_changes().await? {
            return Ok(None);
        }
        repo.commit(&proposal.message).await.map(Some)
    }

    /// Stage the work of the remaining proposals and snapshot it again.
    async fn resnapshot(
        &self,
        plan_id: &str,
        remaining: &[CommitProposal],
    ) -> std::result::Result<Option<Snapshot>, TakeError> {
        for file in outstanding_files(remaining) {
            if let Err(err) = self.stage_file(&file).await {
                warn!(file = %file, error = %err, "could not stage file for snapshot");
            }
        }
        let snapshot = Snapshot::take(self.repo.as_ref(), plan_id).await?;
        if let Some(s) = &snapshot {
            obs::emit_snapshot_taken(plan_id, &s.kind().to_string(), s.token());
        }
        Ok(snapshot)
    }

    /// Stage `path` as an addition/modification, or as a deletion when it
    /// no longer exists in the working tree.
    async fn stage_file(&self, path: &str) -> RepoResult<()> {
        if self.repo.path_exists(path).await {
            self.repo.stage_path(path).await
        } else {
            self.repo.remove_path(path).await
        }
    }

    /// Make the single recovery attempt and build the failure error.
    async fn abort(
        &self,
        plan_id: &str,
        index: usize,
        committed: usize,
        source: RepoError,
        leftover: Option<Leftover>,
        outstanding: &[CommitProposal],
    ) -> SplitError {
        obs::emit_split_aborted(plan_id, index, &source);
        let recovery = self.recover(leftover, outstanding).await;
        match &recovery {
            RecoveryOutcome::Failed { .. }
            | RecoveryOutcome::PartiallyRestaged { .. }
            | RecoveryOutcome::Stranded { .. } => {
                warn!(plan_id = %plan_id, %recovery, "recovery incomplete");
            }
            _ => info!(plan_id = %plan_id, %recovery, "recovered after failure"),
        }
        SplitError::ProposalFailed {
            index,
            committed,
            source,
            recovery,
        }
    }

    async fn recover(
        &self,
        leftover: Option<Leftover>,
        outstanding: &[CommitProposal],
    ) -> RecoveryOutcome {
        match leftover {
            Some(Leftover::Held(snapshot)) => {
                return match snapshot.restore(self.repo.as_ref()).await {
                    Ok(()) => RecoveryOutcome::Restored(snapshot),
                    Err(err) => RecoveryOutcome::Failed {
                        snapshot,
                        reason: err.to_string(),
                    },
                };
            }
            Some(Leftover::OnBranch(commit)) => {
                return match self.repo.soft_reset_back().await {
                    Ok(()) => RecoveryOutcome::Unwound { commit },
                    Err(err) => RecoveryOutcome::Stranded {
                        commit,
                        reason: err.to_string(),
                    },
                };
            }
            None => {}
        }

        let files = outstanding_files(outstanding);
        let mut unstaged = Vec::new();
        for file in &files {
            if self.stage_file(file).await.is_err() {
                unstaged.push(file.clone());
            }
        }
        if unstaged.is_empty() {
            RecoveryOutcome::Restaged { files }
        } else {
            RecoveryOutcome::PartiallyRestaged { unstaged }
        }
    }

    /// Restore staged work left behind by an interrupted run: a temp-commit
    /// note on HEAD first, then the newest gitmind stash.
    pub async fn recover_leftover(&self) -> Result<Option<Snapshot>> {
        let repo = self.repo.as_ref();

        if let Some(snapshot) = repo
            .read_head_note()
            .await?
            .as_deref()
            .and_then(Snapshot::from_note)
        {
            return restore_leftover(repo, snapshot).await.map(Some);
        }

        let stashes = repo.list_stashes().await?;
        let Some((entry, message)) = stashes.iter().find_map(|s| {
            s.message
                .find(STASH_PREFIX)
                .map(|pos| (s, s.message[pos..].to_string()))
        }) else {
            return Ok(None);
        };

        info!(stash = %entry.reference(), "found leftover gitmind stash");
        restore_leftover(repo, Snapshot::Stash { message }).await.map(Some)
    }
}

async fn restore_leftover(repo: &dyn RepoPort, snapshot: Snapshot) -> Result<Snapshot> {
    if let Err(source) = snapshot.restore(repo).await {
        return Err(SplitError::Snapshot { snapshot, source });
    }
    info!(kind = %snapshot.kind(), token = snapshot.token(), "restored leftover snapshot");
    Ok(snapshot)
}

/// Distinct files of `proposals`, in order.
fn outstanding_files(proposals: &[CommitProposal]) -> Vec<String> {
    let mut seen = HashSet::new();
    proposals
        .iter()
        .flat_map(|p| p.files.iter())
        .filter(|f| seen.insert(f.as_str()))
        .cloned()
        .collect()
}
