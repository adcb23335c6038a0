//! Multi-commit settings and their TOML loading.
//!
//! Lookup order: an explicit path, then `<repo>/.gitmind.toml`, then
//! `$HOME/.gitmind.toml`, then built-in defaults. The first file found wins.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const CONFIG_FILE_NAME: &str = ".gitmind.toml";

/// Settings consumed by clustering and orchestration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiCommitConfig {
    /// When false, all changes stay in a single cluster.
    pub enabled: bool,
    /// Upper bound on the number of clusters (and so commits).
    pub max_clusters: usize,
    /// Minimum pairwise similarity to fold a change into a seed's cluster.
    pub similarity_threshold: f64,
    /// Ask before rewriting the index into multiple commits.
    pub prompt_user: bool,
}

impl Default for MultiCommitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_clusters: 5,
            similarity_threshold: 0.6,
            prompt_user: true,
        }
    }
}

impl MultiCommitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(ConfigError::ThresholdOutOfRange(self.similarity_threshold));
        }
        if self.max_clusters == 0 {
            return Err(ConfigError::ZeroMaxClusters);
        }
        Ok(())
    }

    pub fn with_max_clusters(mut self, max_clusters: usize) -> Self {
        self.max_clusters = max_clusters;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_prompt(mut self, prompt_user: bool) -> Self {
        self.prompt_user = prompt_user;
        self
    }
}

/// On-disk layout of `.gitmind.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    multi_commit: MultiCommitConfig,
}

/// Parse a TOML document holding a `[multi_commit]` table.
pub fn parse_config(source: &str, origin: &str) -> Result<MultiCommitConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(source).map_err(|e| ConfigError::Invalid {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;
    Ok(file.multi_commit)
}

fn read_config(path: &Path) -> Result<MultiCommitConfig, ConfigError> {
    let source = std::fs::read_to_string(path).map_err(|e| ConfigError::Invalid {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    parse_config(&source, &path.display().to_string())
}

fn home_config() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE_NAME))
}

/// Load settings for the repository rooted at `repo_root`.
///
/// An explicit path must exist. Otherwise missing files fall through to the
/// next candidate and finally to the defaults.
pub fn load_config(
    repo_root: &Path,
    explicit: Option<&Path>,
) -> Result<MultiCommitConfig, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        return read_config(path);
    }

    let candidates = std::iter::once(repo_root.join(CONFIG_FILE_NAME)).chain(home_config());
    for candidate in candidates {
        if candidate.is_file() {
            debug!(path = %candidate.display(), "loading gitmind config");
            return read_config(&candidate);
        }
    }
    Ok(MultiCommitConfig::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = MultiCommitConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.enabled);
        assert_eq!(cfg.max_clusters, 5);
    }

    #[test]
    fn threshold_out_of_range_rejected() {
        let cfg = MultiCommitConfig::default().with_threshold(1.2);
        assert_eq!(cfg.validate(), Err(ConfigError::ThresholdOutOfRange(1.2)));
        let cfg = MultiCommitConfig::default().with_threshold(f64::NAN);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_max_clusters_rejected() {
        let cfg = MultiCommitConfig::default().with_max_clusters(0);
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroMaxClusters));
    }

    #[test]
    fn partial_table_keeps_defaults() {
        let cfg = parse_config(
            "[multi_commit]\nmax_clusters = 3\nprompt_user = false\n",
            "inline",
        )
        .unwrap();
        assert_eq!(cfg.max_clusters, 3);
        assert!(!cfg.prompt_user);
        assert!(cfg.enabled);
        assert_eq!(cfg.similarity_threshold, 0.6);
    }

    #[test]
    fn malformed_toml_reports_origin() {
        let err = parse_config("[multi_commit\n", "broken.toml").unwrap_err();
        assert!(err.to_string().contains("broken.toml"));
    }

    #[test]
    fn repo_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[multi_commit]\nsimilarity_threshold = 0.25\n",
        )
        .unwrap();
        let cfg = load_config(dir.path(), None).unwrap();
        assert_eq!(cfg.similarity_threshold, 0.25);
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");
        assert!(matches!(
            load_config(dir.path(), Some(&missing)),
            Err(ConfigError::NotFound(_))
        ));
    }
}
