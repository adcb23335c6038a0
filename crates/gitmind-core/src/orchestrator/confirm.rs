//! Confirmation before a split run rewrites the index.

use async_trait::async_trait;

use crate::error::Result;
use crate::proposal::CommitProposal;

/// Decides whether a set of proposals should be executed.
///
/// Inject a terminal prompt in the CLI, or [`AutoConfirm`] for tests and
/// non-interactive runs.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn confirm(&self, proposals: &[CommitProposal]) -> Result<bool>;
}

/// Accepts every plan without asking.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoConfirm;

#[async_trait]
impl Confirmer for AutoConfirm {
    async fn confirm(&self, _proposals: &[CommitProposal]) -> Result<bool> {
        Ok(true)
    }
}

/// Interpret a prompt answer. Empty input accepts.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "" | "y" | "yes"
    )
}

/// Render proposals the way the confirmation prompt lists them.
pub fn render_proposals(proposals: &[CommitProposal]) -> String {
    let mut out = String::new();
    for (i, proposal) in proposals.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, proposal.subject()));
        out.push_str(&format!("     Files: {}\n", proposal.files.join(", ")));
    }
    out
}
