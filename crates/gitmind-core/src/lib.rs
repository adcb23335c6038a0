//! gitmind Core Library
//!
//! Splits staged changes into logically grouped commits: parse the staged
//! diff, extract per-file changes, cluster them by similarity, turn the
//! clusters into commit proposals and replay those against a repository.

pub mod cluster;
pub mod config;
pub mod diff;
pub mod error;
pub mod extract;
pub mod obs;
pub mod orchestrator;
pub mod proposal;
pub mod reporting;
pub mod similarity;
pub mod telemetry;

pub use cluster::{describe, merge_clusters, Cluster, ClusterBuilder};
pub use config::{load_config, parse_config, MultiCommitConfig, CONFIG_FILE_NAME};
pub use diff::{parse_diff, Hunk, HunkKind, ParsedDiff};
pub use error::{
    ConfigError, ExtractionError, ParseError, RecoveryOutcome, Result, SplitError,
};
pub use extract::{default_matchers, Change, ChangeExtractor, RegexMatcher, SymbolMatcher};
pub use orchestrator::confirm::{AutoConfirm, Confirmer};
pub use orchestrator::snapshot::{Leftover, Snapshot, SnapshotKind, TakeError};
pub use orchestrator::{CommitOrchestrator, CreatedCommit, SplitReport};
pub use proposal::{
    CommitPlanner, CommitProposal, HeuristicComposer, MessageComposer, SplitPlan, Splitter,
};
pub use reporting::{
    render_plan_md, write_proposals_json, write_split_report, ProposalRecord,
    SplitReportArtifact,
};
pub use similarity::{similarity, SimilarityMatrix};

pub use gitmind_repo::{CommitId, GitCliRepo, RepoError, RepoPort};

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
