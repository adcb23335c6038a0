//! Per-file change extraction.
//!
//! Hunks are grouped by file into [`Change`]s, and each file's added and
//! removed lines are scanned for declarations by the first
//! [`SymbolMatcher`] that handles its path. A file type without a matcher
//! simply has no symbols.

use std::collections::{BTreeMap, HashMap, HashSet};

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::diff::Hunk;
use crate::error::ExtractionError;

/// Metadata key set to `true` when symbol analysis failed for the change.
pub const ANALYSIS_FAILED: &str = "analysis_failed";
/// Metadata key holding the matcher language that analysed the change.
pub const LANGUAGE: &str = "language";

/// The per-file unit of analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    /// Files covered, normally exactly one.
    pub files: Vec<String>,
    /// Declared names found in changed lines, first-seen order, no repeats.
    pub symbols: Vec<String>,
    pub hunks: Vec<Hunk>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Change {
    pub fn new(file: impl Into<String>, hunks: Vec<Hunk>) -> Self {
        Self {
            files: vec![file.into()],
            symbols: Vec::new(),
            hunks,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = dedup(symbols.into_iter().map(Into::into));
        self
    }

    /// Added and removed lines of every hunk, prefix included.
    pub fn changed_lines(&self) -> impl Iterator<Item = &str> {
        self.hunks.iter().flat_map(|h| h.changed_lines())
    }

    pub fn analysis_failed(&self) -> bool {
        self.metadata
            .get(ANALYSIS_FAILED)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn language(&self) -> Option<&str> {
        self.metadata.get(LANGUAGE).and_then(Value::as_str)
    }
}

/// A language-specific declaration scanner.
pub trait SymbolMatcher: Send + Sync {
    fn language(&self) -> &str;

    fn handles(&self, path: &str) -> bool;

    /// Declared identifiers in the changed lines of `hunks`.
    fn extract(&self, path: &str, hunks: &[Hunk]) -> Result<Vec<String>, ExtractionError>;
}

/// Matcher driven by file extensions and declaration regexes.
///
/// Each pattern is applied to a changed line with its `+`/`-` prefix removed
/// and surrounding whitespace trimmed; capture group 1 is the symbol.
pub struct RegexMatcher {
    language: String,
    extensions: Vec<String>,
    patterns: Vec<Regex>,
}

impl RegexMatcher {
    pub fn new(
        language: impl Into<String>,
        extensions: &[&str],
        patterns: &[&str],
    ) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            language: language.into(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
            patterns,
        })
    }
}

impl SymbolMatcher for RegexMatcher {
    fn language(&self) -> &str {
        &self.language
    }

    fn handles(&self, path: &str) -> bool {
        let name = path.rsplit('/').next().unwrap_or(path);
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => {
                let ext = ext.to_ascii_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            }
            _ => false,
        }
    }

    fn extract(&self, _path: &str, hunks: &[Hunk]) -> Result<Vec<String>, ExtractionError> {
        let mut found = Vec::new();
        for line in hunks.iter().flat_map(|h| h.changed_lines()) {
            let content = line[1..].trim();
            for pattern in &self.patterns {
                if let Some(name) = pattern.captures(content).and_then(|c| c.get(1)) {
                    found.push(name.as_str().to_string());
                    break;
                }
            }
        }
        Ok(dedup(found))
    }
}

const VISIBILITY: &str = r"(?:pub(?:\([^)]*\))?\s+)?";

/// Built-in matchers: Go, Rust, Python, JavaScript/TypeScript and
/// Java-family class declarations.
pub fn default_matchers() -> Vec<Box<dyn SymbolMatcher>> {
    let rust_fn = format!(r"^{VISIBILITY}(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?fn\s+(\w+)");
    let rust_type = format!(r"^{VISIBILITY}(?:struct|enum|trait)\s+(\w+)");
    let table: Vec<(&str, &[&str], Vec<&str>)> = vec![
        ("go", &["go"][..], vec![r"^func\s+(\w+)", r"^type\s+(\w+)"]),
        (
            "rust",
            &["rs"][..],
            vec![
                rust_fn.as_str(),
                rust_type.as_str(),
                r"^impl(?:<[^>]*>)?\s+(?:[\w:]+(?:<[^>]*>)?\s+for\s+)?(\w+)",
            ],
        ),
        (
            "python",
            &["py"][..],
            vec![r"^(?:async\s+)?def\s+(\w+)", r"^class\s+(\w+)"],
        ),
        (
            "javascript",
            &["js", "jsx", "mjs", "cjs", "ts", "tsx"][..],
            vec![
                r"^(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*(\w+)",
                r"^(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+(\w+)",
                r"^(?:export\s+)?(?:const|let|var)\s+(\w+)\s*=\s*(?:async\s+)?\(",
            ],
        ),
        (
            "java",
            &["java", "cs", "kt", "kts"][..],
            vec![
                r"^(?:(?:public|private|protected|internal|static|final|abstract|sealed|open|data|partial)\s+)*(?:class|interface|enum|record|object)\s+(\w+)",
            ],
        ),
    ];

    table
        .into_iter()
        .map(|(language, extensions, patterns)| {
            let matcher = RegexMatcher::new(language, extensions, &patterns)
                .expect("built-in symbol patterns compile");
            Box::new(matcher) as Box<dyn SymbolMatcher>
        })
        .collect()
}

/// Groups hunks into Changes and attaches symbols.
pub struct ChangeExtractor {
    matchers: Vec<Box<dyn SymbolMatcher>>,
}

impl Default for ChangeExtractor {
    fn default() -> Self {
        Self::new(default_matchers())
    }
}

impl ChangeExtractor {
    pub fn new(matchers: Vec<Box<dyn SymbolMatcher>>) -> Self {
        Self { matchers }
    }

    /// Register a matcher that takes precedence over the existing ones.
    pub fn with_matcher(mut self, matcher: Box<dyn SymbolMatcher>) -> Self {
        self.matchers.insert(0, matcher);
        self
    }

    /// One Change per file with at least one hunk, in first-appearance order.
    pub fn extract(&self, hunks: &[Hunk]) -> Vec<Change> {
        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<Hunk>> = HashMap::new();
        for hunk in hunks {
            if !grouped.contains_key(&hunk.file) {
                order.push(hunk.file.clone());
            }
            grouped
                .entry(hunk.file.clone())
                .or_default()
                .push(hunk.clone());
        }

        order
            .into_iter()
            .map(|file| {
                let file_hunks = grouped.remove(&file).unwrap_or_default();
                self.analyze(file, file_hunks)
            })
            .collect()
    }

    fn analyze(&self, file: String, hunks: Vec<Hunk>) -> Change {
        let Some(matcher) = self.matchers.iter().find(|m| m.handles(&file)) else {
            return Change::new(file, hunks);
        };

        match matcher.extract(&file, &hunks) {
            Ok(symbols) => {
                debug!(file = %file, language = matcher.language(), symbols = symbols.len(), "extracted symbols");
                let mut change = Change::new(file, hunks).with_symbols(symbols);
                change
                    .metadata
                    .insert(LANGUAGE.to_string(), Value::from(matcher.language()));
                change
            }
            Err(err) => {
                warn!(file = %file, error = %err, "symbol extraction failed; using hunks only");
                let mut change = Change::new(file, hunks);
                change
                    .metadata
                    .insert(ANALYSIS_FAILED.to_string(), Value::Bool(true));
                change
            }
        }
    }
}

fn dedup(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|s| seen.insert(s.clone()))
        .collect()
}
