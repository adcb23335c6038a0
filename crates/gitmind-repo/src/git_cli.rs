//! `RepoPort` backend that drives the `git` command-line tool.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::error::{RepoError, RepoResult};
use crate::port::{CommitId, RepoPort, StashEntry};

/// Repository backend running `git` inside a fixed working directory.
#[derive(Debug, Clone)]
pub struct GitCliRepo {
    workdir: PathBuf,
}

impl GitCliRepo {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Open the repository containing `dir`, resolving its top-level directory.
    pub async fn discover(dir: &Path) -> RepoResult<Self> {
        let output = Command::new("git")
            .args(["rev-parse", "--show-toplevel"])
            .current_dir(dir)
            .output()
            .await
            .map_err(|source| RepoError::Launch {
                operation: "rev-parse".to_string(),
                source,
            })?;
        if !output.status.success() {
            return Err(RepoError::Command {
                operation: "rev-parse --show-toplevel".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(Self::new(root))
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn output(&self, args: &[&str]) -> RepoResult<Output> {
        debug!(args = ?args, "running git");
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .await
            .map_err(|source| RepoError::Launch {
                operation: args.first().copied().unwrap_or("git").to_string(),
                source,
            })
    }

    /// Run git and return stdout, failing on a non-zero exit.
    async fn run(&self, operation: &str, args: &[&str]) -> RepoResult<String> {
        let output = self.output(args).await?;
        if !output.status.success() {
            return Err(RepoError::Command {
                operation: operation.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

#[async_trait]
impl RepoPort for GitCliRepo {
    async fn staged_diff(&self) -> RepoResult<String> {
        // Paths with `"`, `\` or control characters are still quoted;
        // the diff parser decodes those.
        self.run(
            "diff --cached",
            &[
                "-c",
                "core.quotepath=false",
                "diff",
                "--cached",
                "--no-color",
                "--no-ext-diff",
                "--src-prefix=a/",
                "--dst-prefix=b/",
            ],
        )
        .await
    }

    async fn has_staged_changes(&self) -> RepoResult<bool> {
        let output = self.output(&["diff", "--cached", "--quiet"]).await?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(RepoError::Command {
                operation: "diff --cached --quiet".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
        }
    }

    async fn path_exists(&self, path: &str) -> bool {
        tokio::fs::symlink_metadata(self.workdir.join(path))
            .await
            .is_ok()
    }

    async fn stage_path(&self, path: &str) -> RepoResult<()> {
        self.run("add", &["add", "--", path]).await.map(|_| ())
    }

    async fn remove_path(&self, path: &str) -> RepoResult<()> {
        self.run("rm", &["rm", "--cached", "--quiet", "--", path])
            .await
            .map(|_| ())
    }

    async fn clear_index(&self) -> RepoResult<()> {
        if self.head().await?.is_none() {
            // Unborn branch: there is no HEAD tree to reset to.
            return self
                .run(
                    "rm --cached",
                    &["rm", "-r", "--cached", "--quiet", "--ignore-unmatch", "."],
                )
                .await
                .map(|_| ());
        }
        self.run("reset", &["reset", "--quiet"]).await.map(|_| ())
    }

    async fn stash_staged(&self, message: &str) -> RepoResult<()> {
        self.run(
            "stash push --staged",
            &["stash", "push", "--staged", "--message", message],
        )
        .await
        .map(|_| ())
    }

    async fn list_stashes(&self) -> RepoResult<Vec<StashEntry>> {
        let out = self
            .run("stash list", &["stash", "list", "--format=%gs"])
            .await?;
        Ok(out
            .lines()
            .enumerate()
            .map(|(index, line)| StashEntry {
                index,
                message: line.to_string(),
            })
            .collect())
    }

    async fn pop_stash(&self, index: usize) -> RepoResult<()> {
        let reference = format!("stash@{{{index}}}");
        self.run("stash pop", &["stash", "pop", "--index", "--quiet", &reference])
            .await
            .map(|_| ())
    }

    async fn commit(&self, message: &str) -> RepoResult<CommitId> {
        self.run("commit", &["commit", "--quiet", "-m", message])
            .await?;
        self.head().await?.ok_or(RepoError::NoHead)
    }

    async fn head(&self) -> RepoResult<Option<CommitId>> {
        let output = self
            .output(&["rev-parse", "--verify", "--quiet", "HEAD"])
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!sha.is_empty()).then(|| CommitId(sha)))
    }

    async fn read_head_note(&self) -> RepoResult<Option<String>> {
        let output = self.output(&["notes", "show", "HEAD"]).await?;
        if output.status.success() {
            let note = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(Some(note));
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no note found") || stderr.contains("failed to resolve") {
            return Ok(None);
        }
        Err(RepoError::Command {
            operation: "notes show".to_string(),
            stderr: stderr.trim().to_string(),
        })
    }

    async fn write_head_note(&self, text: &str) -> RepoResult<()> {
        self.run("notes add", &["notes", "add", "--force", "-m", text, "HEAD"])
            .await
            .map(|_| ())
    }

    async fn remove_head_note(&self) -> RepoResult<()> {
        self.run(
            "notes remove",
            &["notes", "remove", "--ignore-missing", "HEAD"],
        )
        .await
        .map(|_| ())
    }

    async fn reapply_commit_staged(&self, commit: &CommitId) -> RepoResult<()> {
        self.run("read-tree", &["read-tree", commit.as_str()])
            .await
            .map(|_| ())
    }

    async fn soft_reset_back(&self) -> RepoResult<()> {
        let parent = self
            .output(&["rev-parse", "--verify", "--quiet", "HEAD~1"])
            .await?;
        if parent.status.success() {
            return self
                .run("reset --soft", &["reset", "--soft", "HEAD~1"])
                .await
                .map(|_| ());
        }
        // Root commit: step back to an unborn branch.
        self.run("update-ref -d", &["update-ref", "-d", "HEAD"])
            .await
            .map(|_| ())
    }
}
