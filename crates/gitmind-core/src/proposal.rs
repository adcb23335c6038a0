//! Commit proposals and the end-to-end planning pipeline.
//!
//! [`Splitter::plan`] runs parse, extract, cluster and propose over a staged
//! diff. [`CommitPlanner`] turns clusters into proposals; message text comes
//! from a [`MessageComposer`] so a smarter generator can replace the
//! heuristic one.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cluster::{Cluster, ClusterBuilder};
use crate::config::MultiCommitConfig;
use crate::diff::parse_diff;
use crate::error::{ParseError, Result};
use crate::extract::{Change, ChangeExtractor};

/// The plan for one resulting commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitProposal {
    /// Paths to stage, never empty.
    pub files: Vec<String>,
    pub message: String,
    /// Changes this proposal came from. Empty for the hunkless catch-all.
    pub changes: Vec<Change>,
}

impl CommitProposal {
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Produces commit message text for a cluster.
pub trait MessageComposer: Send + Sync {
    /// Message for `cluster`, the `index`-th (1-based) of `total` proposals.
    fn compose(&self, cluster: &Cluster, index: usize, total: usize) -> String;
}

/// Description-based messages with a series marker and a symbol body.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicComposer;

impl MessageComposer for HeuristicComposer {
    fn compose(&self, cluster: &Cluster, index: usize, total: usize) -> String {
        let mut message = cluster.description.clone();
        message.push_str(&series_suffix(index, total));
        let symbols = cluster.symbols();
        if !symbols.is_empty() {
            message.push_str("\n\nModified functions: ");
            message.push_str(&symbols.join(", "));
        }
        message
    }
}

fn series_suffix(index: usize, total: usize) -> String {
    if total > 1 {
        format!(" ({index}/{total})")
    } else {
        String::new()
    }
}

/// Turns clusters into ordered proposals.
pub struct CommitPlanner {
    composer: Box<dyn MessageComposer>,
}

impl Default for CommitPlanner {
    fn default() -> Self {
        Self::new(Box::new(HeuristicComposer))
    }
}

impl CommitPlanner {
    pub fn new(composer: Box<dyn MessageComposer>) -> Self {
        Self { composer }
    }

    /// One proposal per cluster in order, then one catch-all proposal for
    /// `hunkless` files if there are any.
    pub fn propose(&self, clusters: Vec<Cluster>, hunkless: &[String]) -> Vec<CommitProposal> {
        let clusters: Vec<Cluster> = clusters.into_iter().filter(|c| !c.is_empty()).collect();
        let total = clusters.len() + usize::from(!hunkless.is_empty());
        let mut proposals: Vec<CommitProposal> = clusters
            .into_iter()
            .enumerate()
            .map(|(i, cluster)| CommitProposal {
                files: cluster.files(),
                message: self.composer.compose(&cluster, i + 1, total),
                changes: cluster.changes,
            })
            .collect();

        if !hunkless.is_empty() {
            let mut seen = HashSet::new();
            let files: Vec<String> = hunkless
                .iter()
                .filter(|f| seen.insert(f.as_str()))
                .cloned()
                .collect();
            let message = format!(
                "Update {} binary or metadata-only files{}",
                files.len(),
                series_suffix(proposals.len() + 1, total)
            );
            proposals.push(CommitProposal {
                files,
                message,
                changes: Vec::new(),
            });
        }
        proposals
    }
}

/// Output of [`Splitter::plan`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitPlan {
    /// `split-<8 hex>`, used to tag snapshots and log lines.
    pub plan_id: String,
    pub proposals: Vec<CommitProposal>,
    /// Number of Changes that went into clustering.
    pub change_count: usize,
    #[serde(skip)]
    pub warnings: Vec<ParseError>,
}

impl SplitPlan {
    pub fn is_empty(&self) -> bool {
        self.proposals.is_empty()
    }

    /// True when the staged work splits into at least two commits.
    pub fn is_splittable(&self) -> bool {
        self.proposals.len() > 1
    }
}

pub fn new_plan_id() -> String {
    format!(
        "split-{}",
        uuid::Uuid::new_v4()
            .to_string()
            .split('-')
            .next()
            .unwrap_or("x")
    )
}

/// Parse, extract, cluster and propose.
pub struct Splitter {
    config: MultiCommitConfig,
    extractor: ChangeExtractor,
    planner: CommitPlanner,
}

impl Splitter {
    pub fn new(config: MultiCommitConfig) -> Self {
        Self {
            config,
            extractor: ChangeExtractor::default(),
            planner: CommitPlanner::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: ChangeExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_composer(mut self, composer: Box<dyn MessageComposer>) -> Self {
        self.planner = CommitPlanner::new(composer);
        self
    }

    /// Build the commit plan for a staged diff.
    ///
    /// Fails only on invalid configuration; malformed diff input degrades to
    /// fewer hunks and is reported in [`SplitPlan::warnings`].
    pub fn plan(&self, diff_text: &str) -> Result<SplitPlan> {
        self.config.validate()?;
        let plan_id = new_plan_id();

        if diff_text.trim().is_empty() {
            debug!(plan_id = %plan_id, "empty staged diff");
            return Ok(SplitPlan {
                plan_id,
                proposals: Vec::new(),
                change_count: 0,
                warnings: Vec::new(),
            });
        }

        let parsed = parse_diff(diff_text);
        for warning in &parsed.warnings {
            debug!(plan_id = %plan_id, %warning, "diff parse warning");
        }

        let changes = self.extractor.extract(&parsed.hunks);
        let change_count = changes.len();
        let clusters = ClusterBuilder::from_config(&self.config).build(changes);
        let proposals = self.planner.propose(clusters, &parsed.hunkless_files);

        info!(
            plan_id = %plan_id,
            changes = change_count,
            hunkless = parsed.hunkless_files.len(),
            proposals = proposals.len(),
            "planned split"
        );

        Ok(SplitPlan {
            plan_id,
            proposals,
            change_count,
            warnings: parsed.warnings,
        })
    }
}
