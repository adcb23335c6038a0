//! Structured lifecycle events for multi-commit runs.
//!
//! - `split_span`, the plan-scoped span a run is instrumented with
//! - `emit_*` functions, one per lifecycle event, at `info!` (or `warn!` for
//!   skips and aborts)

use tracing::{info, warn};

/// The plan-scoped span, for instrumenting futures.
pub fn split_span(plan_id: &str) -> tracing::Span {
    tracing::info_span!("gitmind.split", plan_id = %plan_id)
}

/// Emit event: split run started with its proposal count.
pub fn emit_split_started(plan_id: &str, proposals: usize) {
    info!(event = "split.started", plan_id = %plan_id, proposals = proposals);
}

/// Emit event: staged work moved out of the index.
pub fn emit_snapshot_taken(plan_id: &str, kind: &str, token: &str) {
    info!(event = "split.snapshot_taken", plan_id = %plan_id, kind = %kind, token = %token);
}

pub fn emit_commit_created(plan_id: &str, index: usize, commit: &str, files: usize) {
    info!(
        event = "split.commit_created",
        plan_id = %plan_id,
        index = index,
        commit = %commit,
        files = files,
    );
}

/// Emit event: a proposal staged nothing and was skipped.
pub fn emit_proposal_skipped(plan_id: &str, index: usize) {
    warn!(event = "split.proposal_skipped", plan_id = %plan_id, index = index);
}

pub fn emit_split_aborted(plan_id: &str, index: usize, error: &dyn std::fmt::Display) {
    warn!(event = "split.aborted", plan_id = %plan_id, index = index, error = %error);
}

/// Emit event: run finished with commit and skip counts.
pub fn emit_split_finished(plan_id: &str, commits: usize, skipped: usize, duration_ms: u64) {
    info!(
        event = "split.finished",
        plan_id = %plan_id,
        commits = commits,
        skipped = skipped,
        duration_ms = duration_ms,
    );
}
