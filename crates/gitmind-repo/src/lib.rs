//! gitmind-repo: Repository Port for gitmind
//!
//! This crate isolates every side effect gitmind performs against a
//! repository behind a single async capability set, so the commit
//! orchestration state machine can run against a live `git` checkout or an
//! in-memory fake.
//!
//! ## Layer 0 - Repository I/O
//!
//! Focus: index/working-tree mutations, stashes, commits and HEAD notes.
//!
//! ## Key Components
//!
//! - `RepoPort`: The capability trait consumed by the orchestrator
//! - `GitCliRepo`: Production backend that shells out to `git`
//! - `fakes::MemoryRepo`: In-memory repository with failure injection

mod error;
pub mod fakes;
mod git_cli;
pub mod port;

pub use error::{RepoError, RepoResult};
pub use git_cli::GitCliRepo;
pub use port::{CommitId, RepoOp, RepoPort, StashEntry};
