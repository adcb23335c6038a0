//! Contract tests for `RepoPort`.
//!
//! Each contract runs against the in-memory fake and against a real git
//! repository in a temporary directory. Any conforming backend must pass.

use std::path::Path;
use std::process::Command;

use gitmind_repo::fakes::MemoryRepo;
use gitmind_repo::{CommitId, GitCliRepo, RepoPort};

// ===========================================================================
// Fixtures
// ===========================================================================

/// A backend plus a way to mutate its working tree.
trait Fixture {
    fn repo(&self) -> &dyn RepoPort;
    fn write(&self, path: &str, content: &str);
}

struct FakeFixture(MemoryRepo);

impl Fixture for FakeFixture {
    fn repo(&self) -> &dyn RepoPort {
        &self.0
    }

    fn write(&self, path: &str, content: &str) {
        self.0.write_file(path, content);
    }
}

struct GitFixture {
    dir: tempfile::TempDir,
    repo: GitCliRepo,
}

impl Fixture for GitFixture {
    fn repo(&self) -> &dyn RepoPort {
        &self.repo
    }

    fn write(&self, path: &str, content: &str) {
        let full = self.dir.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn fake_fixture() -> FakeFixture {
    let repo = MemoryRepo::new();
    repo.seed_commit("initial", &[("README.md", "readme\n")]);
    FakeFixture(repo)
}

fn git_fixture() -> GitFixture {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init", "-q"]);
    run_git(dir.path(), &["config", "user.name", "test-user"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    run_git(dir.path(), &["config", "commit.gpgsign", "false"]);
    std::fs::write(dir.path().join("README.md"), "readme\n").unwrap();
    run_git(dir.path(), &["add", "README.md"]);
    run_git(dir.path(), &["commit", "-q", "-m", "initial"]);
    let repo = GitCliRepo::new(dir.path());
    GitFixture { dir, repo }
}

// ===========================================================================
// Contracts
// ===========================================================================

async fn contract_stash_pop_restores_staged_work(fx: &dyn Fixture) {
    let repo = fx.repo();
    fx.write("src/lib.rs", "pub fn a() {}\n");
    repo.stage_path("src/lib.rs").await.unwrap();
    assert!(repo.has_staged_changes().await.unwrap());

    repo.stash_staged("gitmind-contract").await.unwrap();
    assert!(!repo.has_staged_changes().await.unwrap());

    let stashes = repo.list_stashes().await.unwrap();
    let entry = stashes
        .iter()
        .find(|s| s.message.contains("gitmind-contract"))
        .expect("stash entry listed");

    repo.pop_stash(entry.index).await.unwrap();
    assert!(repo.has_staged_changes().await.unwrap());
    assert!(repo.staged_diff().await.unwrap().contains("+pub fn a() {}"));
}

async fn contract_temp_commit_is_reversible(fx: &dyn Fixture) {
    let repo = fx.repo();
    let original_head = repo.head().await.unwrap();
    fx.write("notes.txt", "draft\n");
    repo.stage_path("notes.txt").await.unwrap();

    let temp: CommitId = repo.commit("temporary").await.unwrap();
    repo.soft_reset_back().await.unwrap();
    repo.clear_index().await.unwrap();
    assert_eq!(repo.head().await.unwrap(), original_head);
    assert!(!repo.has_staged_changes().await.unwrap());

    repo.reapply_commit_staged(&temp).await.unwrap();
    assert!(repo.has_staged_changes().await.unwrap());
    assert!(repo.staged_diff().await.unwrap().contains("+draft"));
}

async fn contract_commit_moves_head(fx: &dyn Fixture) {
    let repo = fx.repo();
    let before = repo.head().await.unwrap();
    fx.write("a.txt", "a\n");
    repo.stage_path("a.txt").await.unwrap();
    let id = repo.commit("add a").await.unwrap();
    assert_ne!(Some(id.clone()), before);
    assert_eq!(repo.head().await.unwrap(), Some(id));
    assert!(!repo.has_staged_changes().await.unwrap());
}

async fn contract_remove_stages_deletion(fx: &dyn Fixture, delete: impl Fn()) {
    let repo = fx.repo();
    delete();
    assert!(!repo.path_exists("README.md").await);
    repo.remove_path("README.md").await.unwrap();
    let diff = repo.staged_diff().await.unwrap();
    assert!(diff.contains("-readme"));
}

async fn contract_stage_missing_path_fails(fx: &dyn Fixture) {
    assert!(fx.repo().stage_path("does/not/exist.rs").await.is_err());
}

// ===========================================================================
// MemoryRepo
// ===========================================================================

#[tokio::test]
async fn memory_stash_pop_restores_staged_work() {
    contract_stash_pop_restores_staged_work(&fake_fixture()).await;
}

#[tokio::test]
async fn memory_temp_commit_is_reversible() {
    contract_temp_commit_is_reversible(&fake_fixture()).await;
}

#[tokio::test]
async fn memory_commit_moves_head() {
    contract_commit_moves_head(&fake_fixture()).await;
}

#[tokio::test]
async fn memory_remove_stages_deletion() {
    let fx = fake_fixture();
    contract_remove_stages_deletion(&fx, || fx.0.delete_file("README.md")).await;
}

#[tokio::test]
async fn memory_stage_missing_path_fails() {
    contract_stage_missing_path_fails(&fake_fixture()).await;
}

// ===========================================================================
// GitCliRepo
// ===========================================================================

#[tokio::test]
async fn git_stash_pop_restores_staged_work() {
    contract_stash_pop_restores_staged_work(&git_fixture()).await;
}

#[tokio::test]
async fn git_temp_commit_is_reversible() {
    contract_temp_commit_is_reversible(&git_fixture()).await;
}

#[tokio::test]
async fn git_commit_moves_head() {
    contract_commit_moves_head(&git_fixture()).await;
}

#[tokio::test]
async fn git_remove_stages_deletion() {
    let fx = git_fixture();
    let path = fx.dir.path().join("README.md");
    contract_remove_stages_deletion(&fx, || std::fs::remove_file(&path).unwrap()).await;
}

#[tokio::test]
async fn git_stage_missing_path_fails() {
    contract_stage_missing_path_fails(&git_fixture()).await;
}
