//! Greedy clustering of Changes.
//!
//! Each unassigned Change in input order seeds a cluster and pulls in every
//! later unassigned Change whose similarity *to the seed* reaches the
//! threshold. Members are never compared with each other, so grouping is
//! not transitive. When too many clusters result, the pair with the fewest
//! combined Changes is merged until the count fits.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::MultiCommitConfig;
use crate::extract::Change;
use crate::similarity::SimilarityMatrix;

/// A group of Changes destined for one commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    pub changes: Vec<Change>,
    pub score: f64,
    pub description: String,
}

impl Cluster {
    /// Build a cluster with its description derived from `changes`.
    pub fn new(changes: Vec<Change>, score: f64) -> Self {
        let description = describe(&changes);
        Self {
            changes,
            score,
            description,
        }
    }

    /// Distinct files across all Changes, first-appearance order.
    pub fn files(&self) -> Vec<String> {
        ordered_union(self.changes.iter().flat_map(|c| c.files.iter()))
    }

    /// Distinct symbols across all Changes, first-appearance order.
    pub fn symbols(&self) -> Vec<String> {
        ordered_union(self.changes.iter().flat_map(|c| c.symbols.iter()))
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

fn ordered_union<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .filter(|s| seen.insert(s.as_str()))
        .cloned()
        .collect()
}

/// Human-readable summary of a set of Changes.
///
/// One Change: its symbols, else its files. Several: the union of their
/// symbols, else a count of distinct files.
pub fn describe(changes: &[Change]) -> String {
    if let [change] = changes {
        return if change.symbols.is_empty() {
            format!("Update {}", change.files.join(", "))
        } else {
            format!("Modify {}", change.symbols.join(", "))
        };
    }

    let symbols = ordered_union(changes.iter().flat_map(|c| c.symbols.iter()));
    if !symbols.is_empty() {
        return format!("Update {} functions", symbols.join(", "));
    }
    let files = ordered_union(changes.iter().flat_map(|c| c.files.iter()));
    format!("Update {} files", files.len())
}

/// Merge the two clusters with the smallest combined Change count (earliest
/// pair on ties) until at most `max_clusters` remain. The merged cluster is
/// appended after the untouched ones.
pub fn merge_clusters(mut clusters: Vec<Cluster>, max_clusters: usize) -> Vec<Cluster> {
    let max_clusters = max_clusters.max(1);
    while clusters.len() > max_clusters {
        let (mut first, mut second) = (0, 1);
        let mut smallest = clusters[0].len() + clusters[1].len();
        for i in 0..clusters.len() {
            for j in (i + 1)..clusters.len() {
                let size = clusters[i].len() + clusters[j].len();
                if size < smallest {
                    (first, second) = (i, j);
                    smallest = size;
                }
            }
        }

        // `second > first`, so removing it first keeps `first` valid.
        let b = clusters.remove(second);
        let a = clusters.remove(first);
        let score = (a.score + b.score) / 2.0;
        let mut changes = a.changes;
        changes.extend(b.changes);
        debug!(first, second, size = smallest, "merged clusters");
        clusters.push(Cluster::new(changes, score));
    }
    clusters
}

/// Threshold-driven greedy clusterer.
#[derive(Debug, Clone)]
pub struct ClusterBuilder {
    enabled: bool,
    threshold: f64,
    max_clusters: usize,
}

impl ClusterBuilder {
    pub fn new(threshold: f64, max_clusters: usize) -> Self {
        Self {
            enabled: true,
            threshold,
            max_clusters,
        }
    }

    pub fn from_config(config: &MultiCommitConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold: config.similarity_threshold,
            max_clusters: config.max_clusters,
        }
    }

    /// Partition `changes` into clusters.
    pub fn build(&self, changes: Vec<Change>) -> Vec<Cluster> {
        if changes.is_empty() {
            return Vec::new();
        }
        if !self.enabled || changes.len() == 1 {
            return vec![Cluster::new(changes, 1.0)];
        }

        let matrix = SimilarityMatrix::compute(&changes);
        let mut slots: Vec<Option<Change>> = changes.into_iter().map(Some).collect();
        let mut clusters = Vec::new();

        for seed in 0..slots.len() {
            let Some(seed_change) = slots[seed].take() else {
                continue;
            };
            let mut members = vec![seed_change];
            let mut accepted = Vec::new();
            for j in (seed + 1)..slots.len() {
                if slots[j].is_none() {
                    continue;
                }
                let score = matrix.get(seed, j);
                if score >= self.threshold {
                    if let Some(change) = slots[j].take() {
                        members.push(change);
                        accepted.push(score);
                    }
                }
            }
            let score = if accepted.is_empty() {
                1.0
            } else {
                accepted.iter().sum::<f64>() / accepted.len() as f64
            };
            clusters.push(Cluster::new(members, score));
        }

        debug!(
            clusters = clusters.len(),
            max_clusters = self.max_clusters,
            threshold = self.threshold,
            "greedy clustering done"
        );

        if clusters.len() > self.max_clusters {
            merge_clusters(clusters, self.max_clusters)
        } else {
            clusters
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Hunk, HunkKind};

    fn change(file: &str, symbols: &[&str]) -> Change {
        let hunk = Hunk {
            file: file.to_string(),
            start_line: 1,
            lines: vec!["+x".to_string()],
            kind: HunkKind::Add,
        };
        Change::new(file, vec![hunk]).with_symbols(symbols.iter().copied())
    }

    fn files_of(cluster: &Cluster) -> Vec<&str> {
        cluster
            .changes
            .iter()
            .map(|c| c.files[0].as_str())
            .collect()
    }

    #[test]
    fn membership_is_decided_against_seed_only() {
        // a~b and b~c reach the threshold, a~c does not.
        let changes = vec![
            change("x/a.go", &["Foo"]),
            change("x/b.go", &["Foo", "Bar"]),
            change("x/c.go", &["Bar"]),
        ];
        let clusters = ClusterBuilder::new(0.4, 10).build(changes);
        assert_eq!(clusters.len(), 2);
        assert_eq!(files_of(&clusters[0]), vec!["x/a.go", "x/b.go"]);
        assert_eq!(files_of(&clusters[1]), vec!["x/c.go"]);
        assert!((clusters[0].score - 0.41).abs() < 1e-9);
        assert_eq!(clusters[1].score, 1.0);
    }

    #[test]
    fn disabled_builder_keeps_one_cluster() {
        let cfg = MultiCommitConfig {
            enabled: false,
            ..MultiCommitConfig::default()
        };
        let clusters =
            ClusterBuilder::from_config(&cfg).build(vec![change("a.rs", &[]), change("z/b.md", &[])]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
        assert_eq!(clusters[0].score, 1.0);
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(ClusterBuilder::new(0.5, 5).build(Vec::new()).is_empty());
    }

    #[test]
    fn merge_prefers_smallest_then_earliest_pair() {
        let clusters = vec![
            Cluster::new(vec![change("a/1", &[]), change("a/2", &[])], 0.8),
            Cluster::new(vec![change("b/1", &[])], 1.0),
            Cluster::new(vec![change("c/1", &[])], 0.5),
            Cluster::new(vec![change("d/1", &[])], 1.0),
        ];
        let merged = merge_clusters(clusters, 3);
        assert_eq!(merged.len(), 3);
        assert_eq!(files_of(&merged[0]), vec!["a/1", "a/2"]);
        assert_eq!(files_of(&merged[1]), vec!["d/1"]);
        assert_eq!(files_of(&merged[2]), vec!["b/1", "c/1"]);
        assert_eq!(merged[2].score, 0.75);
        assert_eq!(merged[2].description, "Update 2 files");
    }

    #[test]
    fn merge_is_noop_within_bound() {
        let clusters = vec![Cluster::new(vec![change("a", &[])], 1.0)];
        assert_eq!(merge_clusters(clusters.clone(), 3), clusters);
    }

    #[test]
    fn descriptions() {
        assert_eq!(describe(&[change("auth.go", &["Login", "Logout"])]), "Modify Login, Logout");
        assert_eq!(describe(&[change("README.md", &[])]), "Update README.md");
        assert_eq!(
            describe(&[change("a.go", &["A"]), change("b.go", &["B", "A"])]),
            "Update A, B functions"
        );
        assert_eq!(
            describe(&[change("a.md", &[]), change("b.md", &[])]),
            "Update 2 files"
        );
    }
}
