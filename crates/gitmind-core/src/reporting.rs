use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::orchestrator::{CreatedCommit, SplitReport};
use crate::proposal::{CommitProposal, SplitPlan};

pub const SCHEMA_VERSION: &str = "1.0";

/// One exported proposal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProposalRecord {
    pub files: Vec<String>,
    pub message: String,
    pub change_count: usize,
}

impl From<&CommitProposal> for ProposalRecord {
    fn from(p: &CommitProposal) -> Self {
        Self {
            files: p.files.clone(),
            message: p.message.clone(),
            change_count: p.change_count(),
        }
    }
}

pub fn proposal_records(proposals: &[CommitProposal]) -> Vec<ProposalRecord> {
    proposals.iter().map(ProposalRecord::from).collect()
}

/// Persisted result of a split run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SplitReportArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub plan_id: String,
    pub proposal_count: usize,
    pub commits: Vec<CreatedCommit>,
    pub skipped: Vec<usize>,
    pub snapshot_kind: Option<String>,
}

impl SplitReportArtifact {
    pub fn new(report: &SplitReport, proposal_count: usize) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            plan_id: report.plan_id.clone(),
            proposal_count,
            commits: report.commits.clone(),
            skipped: report.skipped.clone(),
            snapshot_kind: report.snapshot_kind.map(|k| k.to_string()),
        }
    }
}

/// Write the proposal list as pretty JSON.
pub fn write_proposals_json(path: &Path, proposals: &[CommitProposal]) -> Result<()> {
    let content = serde_json::to_string_pretty(&proposal_records(proposals))
        .context("serialize proposals")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Write the split report artifact as pretty JSON.
pub fn write_split_report(path: &Path, artifact: &SplitReportArtifact) -> Result<()> {
    let content = serde_json::to_string_pretty(artifact).context("serialize split report")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Render the plan as markdown for review or PR descriptions.
pub fn render_plan_md(plan: &SplitPlan) -> String {
    let mut out = String::new();
    out.push_str("# Commit Plan\n\n");
    out.push_str(&format!(
        "- plan: `{}`\n- changes: {}\n- proposed commits: {}\n\n",
        plan.plan_id,
        plan.change_count,
        plan.proposals.len()
    ));

    for (i, proposal) in plan.proposals.iter().enumerate() {
        out.push_str(&format!("## {}. {}\n", i + 1, proposal.subject()));
        for file in &proposal.files {
            out.push_str(&format!("- `{}`\n", file));
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::snapshot::SnapshotKind;
    use gitmind_repo::CommitId;
    use serde_json::json;

    fn proposals() -> Vec<CommitProposal> {
        vec![
            CommitProposal {
                files: vec!["auth.go".to_string(), "login_test.go".to_string()],
                message: "Update Login, TestLogin functions (1/2)\n\nModified functions: Login, TestLogin"
                    .to_string(),
                changes: Vec::new(),
            },
            CommitProposal {
                files: vec!["README.md".to_string()],
                message: "Update README.md (2/2)".to_string(),
                changes: Vec::new(),
            },
        ]
    }

    #[test]
    fn proposals_json_has_expected_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plan.json");
        write_proposals_json(&path, &proposals()).expect("write proposals");

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).expect("read")).expect("parse");
        assert_eq!(raw.as_array().map(Vec::len), Some(2));
        assert_eq!(raw[0]["files"], json!(["auth.go", "login_test.go"]));
        assert_eq!(raw[1]["change_count"], json!(0));
        assert!(raw[1]["message"].as_str().unwrap().starts_with("Update README.md"));
    }

    #[test]
    fn split_report_schema_has_expected_keys() {
        let report = SplitReport {
            plan_id: "split-abcd1234".to_string(),
            commits: vec![CreatedCommit {
                index: 1,
                commit: CommitId::new("0123456789abcdef"),
                files: vec!["a.rs".to_string()],
                message: "Modify a".to_string(),
            }],
            skipped: vec![2],
            snapshot_kind: Some(SnapshotKind::TempCommit),
            cancelled: false,
        };
        let artifact = SplitReportArtifact::new(&report, 2);
        let raw = serde_json::to_value(&artifact).expect("serialize artifact");
        let obj = raw.as_object().expect("artifact object");
        for key in ["schema_version", "generated_at", "plan_id", "commits", "skipped"] {
            assert!(obj.contains_key(key), "missing {key}");
        }
        assert_eq!(raw["snapshot_kind"], json!("temp-commit"));
        assert_eq!(raw["commits"][0]["index"], json!(1));
    }

    #[test]
    fn plan_markdown_render_is_stable() {
        let plan = SplitPlan {
            plan_id: "split-0000aaaa".to_string(),
            proposals: proposals(),
            change_count: 3,
            warnings: Vec::new(),
        };
        let expected = "# Commit Plan\n\n- plan: `split-0000aaaa`\n- changes: 3\n- proposed commits: 2\n\n## 1. Update Login, TestLogin functions (1/2)\n- `auth.go`\n- `login_test.go`\n\n## 2. Update README.md (2/2)\n- `README.md`\n\n";
        assert_eq!(render_plan_md(&plan), expected);
    }
}
