//! gitmind - split staged changes into logically grouped commits
//!
//! ## Commands
//!
//! - `plan`: analyze the staged changes and show the proposed commits
//! - `split`: create one commit per proposal
//! - `recover`: restore staged work left behind by an interrupted split

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

use gitmind_core::orchestrator::confirm::{is_affirmative, render_proposals};
use gitmind_core::reporting::proposal_records;
use gitmind_core::{
    load_config, render_plan_md, write_proposals_json, write_split_report, CommitOrchestrator,
    CommitProposal, Confirmer, MultiCommitConfig, SplitError, SplitPlan, SplitReportArtifact,
    Splitter,
};
use gitmind_repo::{GitCliRepo, RepoPort};

#[derive(Parser)]
#[command(name = "gitmind")]
#[command(version = gitmind_core::VERSION)]
#[command(about = "Split staged changes into logically grouped commits", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides applied on top of `.gitmind.toml`.
#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// Config file to use instead of the repository or home config
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Maximum number of commits to split into
    #[arg(long, global = true, env = "GITMIND_MAX_CLUSTERS")]
    max_clusters: Option<usize>,

    /// Minimum similarity (0.0 to 1.0) for two changes to share a commit
    #[arg(long, global = true, env = "GITMIND_SIMILARITY_THRESHOLD")]
    threshold: Option<f64>,

    /// Never ask for confirmation before committing
    #[arg(long, global = true, env = "GITMIND_NO_PROMPT")]
    no_prompt: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how the staged changes would be split
    Plan {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = PlanFormat::Text)]
        format: PlanFormat,

        /// Write the plan to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Split the staged changes into multiple commits
    Split {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Write a JSON report of the created commits
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Restore staged work left behind by an interrupted split
    Recover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PlanFormat {
    Text,
    Json,
    Markdown,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    gitmind_core::telemetry::init_tracing(cli.json, level);

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let repo = GitCliRepo::discover(&cwd)
        .await
        .context("Not inside a git repository")?;

    match cli.command {
        Commands::Plan { format, output } => {
            cmd_plan(&repo, &cli.config, format, output.as_deref()).await
        }
        Commands::Split { yes, report } => {
            cmd_split(Arc::new(repo), &cli.config, yes, report.as_deref()).await
        }
        Commands::Recover => cmd_recover(Arc::new(repo)).await,
    }
}

/// Load the config for `repo_root` and apply command-line overrides.
fn resolve_config(repo_root: &Path, args: &ConfigArgs) -> Result<MultiCommitConfig> {
    let mut config = load_config(repo_root, args.config.as_deref())
        .context("Failed to load gitmind configuration")?;

    if let Some(max_clusters) = args.max_clusters {
        config = config.with_max_clusters(max_clusters);
    }
    if let Some(threshold) = args.threshold {
        config = config.with_threshold(threshold);
    }
    if args.no_prompt {
        config = config.with_prompt(false);
    }

    config.validate().context("Invalid gitmind configuration")?;
    Ok(config)
}

async fn plan_staged(repo: &GitCliRepo, config: MultiCommitConfig) -> Result<SplitPlan> {
    let diff = repo
        .staged_diff()
        .await
        .context("Failed to read staged changes")?;
    let plan = Splitter::new(config)
        .plan(&diff)
        .context("Failed to plan commits")?;

    for warning in &plan.warnings {
        warn!(%warning, "skipped part of the staged diff");
    }
    Ok(plan)
}

fn render_plan_text(plan: &SplitPlan) -> String {
    if plan.is_empty() {
        return "No staged changes\n".to_string();
    }
    format!(
        "Proposed {} commit(s) for {} change(s):\n{}",
        plan.proposals.len(),
        plan.change_count,
        render_proposals(&plan.proposals)
    )
}

/// Show the proposals for the current staged changes
async fn cmd_plan(
    repo: &GitCliRepo,
    args: &ConfigArgs,
    format: PlanFormat,
    output: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(repo.workdir(), args)?;
    let plan = plan_staged(repo, config).await?;

    if let (PlanFormat::Json, Some(path)) = (format, output) {
        write_proposals_json(path, &plan.proposals)?;
        println!("Wrote {} proposal(s) to {:?}", plan.proposals.len(), path);
        return Ok(());
    }

    let rendered = match format {
        PlanFormat::Text => render_plan_text(&plan),
        PlanFormat::Json => serde_json::to_string_pretty(&proposal_records(&plan.proposals))
            .context("Failed to serialize proposals")?,
        PlanFormat::Markdown => render_plan_md(&plan),
    };

    if let Some(path) = output {
        std::fs::write(path, &rendered)
            .with_context(|| format!("Failed to write plan to {:?}", path))?;
        println!("Wrote plan to {:?}", path);
    } else {
        println!("{}", rendered.trim_end());
    }

    Ok(())
}

/// Plan, confirm and commit
async fn cmd_split(
    repo: Arc<GitCliRepo>,
    args: &ConfigArgs,
    yes: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let config = resolve_config(repo.workdir(), args)?;
    if !config.enabled {
        anyhow::bail!(
            "Multi-commit splitting is disabled; set `enabled = true` under [multi_commit]"
        );
    }
    let prompt_user = config.prompt_user && !yes;

    let plan = plan_staged(&repo, config).await?;
    if plan.is_empty() {
        println!("No staged changes to split");
        return Ok(());
    }
    if !plan.is_splittable() {
        println!("No multi-commit opportunities detected");
        return Ok(());
    }

    let orchestrator =
        CommitOrchestrator::new(repo.clone()).with_confirmer(Arc::new(StdinConfirm), prompt_user);
    let report = orchestrator
        .execute(&plan.plan_id, &plan.proposals)
        .await
        .context("Split failed")?;

    if report.cancelled {
        println!("Split cancelled; staged changes left untouched");
        return Ok(());
    }

    println!("Created {} commit(s):", report.commits.len());
    for created in &report.commits {
        let subject = created.message.lines().next().unwrap_or_default();
        println!("  {} {}", created.commit.short(), subject);
    }
    if !report.skipped.is_empty() {
        let skipped: Vec<String> = report.skipped.iter().map(|i| i.to_string()).collect();
        println!("Skipped empty proposal(s): {}", skipped.join(", "));
    }

    if let Some(path) = report_path {
        let artifact = SplitReportArtifact::new(&report, plan.proposals.len());
        write_split_report(path, &artifact)?;
        info!(path = %path.display(), "wrote split report");
    }

    Ok(())
}

/// Restore leftovers of a crashed split
async fn cmd_recover(repo: Arc<GitCliRepo>) -> Result<()> {
    let restored = CommitOrchestrator::new(repo)
        .recover_leftover()
        .await
        .context("Failed to restore leftover staged changes")?;

    match restored {
        Some(snapshot) => println!(
            "Restored staged changes from {} `{}`",
            snapshot.kind(),
            snapshot.token()
        ),
        None => println!("Nothing to recover"),
    }
    Ok(())
}

/// Confirmation prompt on the controlling terminal.
struct StdinConfirm;

#[async_trait]
impl Confirmer for StdinConfirm {
    async fn confirm(&self, proposals: &[CommitProposal]) -> gitmind_core::Result<bool> {
        let listing = render_proposals(proposals);
        let count = proposals.len();
        tokio::task::spawn_blocking(move || prompt(&listing, count))
            .await
            .map_err(|e| SplitError::Confirm(e.to_string()))?
    }
}

fn prompt(listing: &str, count: usize) -> gitmind_core::Result<bool> {
    {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "Proposed {count} commits:")?;
        write!(stdout, "{listing}")?;
        write!(stdout, "Proceed? [Y/n] ")?;
        stdout.flush()?;
    }

    let mut answer = String::new();
    // EOF means nobody is there to answer.
    if std::io::stdin().lock().read_line(&mut answer)? == 0 {
        return Ok(false);
    }
    Ok(is_affirmative(&answer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn split_flags_parse() {
        let cli = Cli::try_parse_from([
            "gitmind",
            "split",
            "--yes",
            "--threshold",
            "0.4",
            "--report",
            "out.json",
        ])
        .unwrap();
        assert_eq!(cli.config.threshold, Some(0.4));
        match cli.command {
            Commands::Split { yes, report } => {
                assert!(yes);
                assert_eq!(report, Some(PathBuf::from("out.json")));
            }
            _ => panic!("expected split"),
        }
    }

    #[test]
    fn plan_format_parses() {
        let cli = Cli::try_parse_from(["gitmind", "plan", "--format", "markdown"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Plan {
                format: PlanFormat::Markdown,
                output: None
            }
        ));
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(gitmind_core::CONFIG_FILE_NAME),
            "[multi_commit]\nmax_clusters = 3\nsimilarity_threshold = 0.25\n",
        )
        .unwrap();

        let args = ConfigArgs {
            threshold: Some(0.8),
            no_prompt: true,
            ..ConfigArgs::default()
        };
        let config = resolve_config(dir.path(), &args).unwrap();
        assert_eq!(config.max_clusters, 3);
        assert_eq!(config.similarity_threshold, 0.8);
        assert!(!config.prompt_user);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let args = ConfigArgs {
            config: Some(dir.path().join("missing.toml")),
            ..ConfigArgs::default()
        };
        assert!(resolve_config(dir.path(), &args).is_err());

        let args = ConfigArgs {
            max_clusters: Some(0),
            ..ConfigArgs::default()
        };
        std::fs::write(dir.path().join(gitmind_core::CONFIG_FILE_NAME), "").unwrap();
        assert!(resolve_config(dir.path(), &args).is_err());
    }

    #[test]
    fn empty_plan_renders_notice() {
        let plan = SplitPlan {
            plan_id: "split-00000000".to_string(),
            proposals: Vec::new(),
            change_count: 0,
            warnings: Vec::new(),
        };
        assert_eq!(render_plan_text(&plan), "No staged changes\n");
    }

    #[test]
    fn text_plan_lists_proposals() {
        let plan = SplitPlan {
            plan_id: "split-00000000".to_string(),
            proposals: vec![CommitProposal {
                files: vec!["a.rs".to_string()],
                message: "Modify a (1/1)".to_string(),
                changes: Vec::new(),
            }],
            change_count: 1,
            warnings: Vec::new(),
        };
        assert_eq!(
            render_plan_text(&plan),
            "Proposed 1 commit(s) for 1 change(s):\n  1. Modify a (1/1)\n     Files: a.rs\n"
        );
    }
}
