//! Pairwise similarity between Changes.
//!
//! `similarity = 0.3 * file + 0.4 * symbol + 0.3 * content`, each sub-score
//! in `[0, 1]`. The function is pure and symmetric, so the full matrix can
//! be computed once up front with [`SimilarityMatrix::compute`].

use std::collections::HashSet;

use crate::extract::Change;

const FILE_WEIGHT: f64 = 0.3;
const SYMBOL_WEIGHT: f64 = 0.4;
const CONTENT_WEIGHT: f64 = 0.3;

const SAME_PATH: f64 = 1.0;
const SAME_DIR: f64 = 0.7;
const RELATED_NAME: f64 = 0.5;

const TRIM_CHARS: &[char] = &['(', ')', '{', '}', '[', ']', '.', ',', ';', ':'];

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "had", "her", "was", "one",
    "our", "out", "day", "get", "has", "him", "his", "how", "its", "new", "now", "old", "see",
    "two", "who", "boy", "did", "may", "put", "say", "she", "too", "use", "var", "nil", "err",
    "int",
];

/// Similarity of two Changes in `[0.0, 1.0]`.
pub fn similarity(a: &Change, b: &Change) -> f64 {
    if a == b {
        return 1.0;
    }
    let score = FILE_WEIGHT * file_score(&a.files, &b.files)
        + SYMBOL_WEIGHT * symbol_score(&a.symbols, &b.symbols)
        + CONTENT_WEIGHT * content_score(a, b);
    score.clamp(0.0, 1.0)
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Base name with its extension stripped.
fn stem(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

fn related_name(a: &str, b: &str) -> bool {
    let (sa, sb) = (stem(a), stem(b));
    (!sb.is_empty() && a.contains(sb)) || (!sa.is_empty() && b.contains(sa))
}

/// Best tier reached by any pair of paths: identical, same parent
/// directory, or one base name contained in the other path.
pub fn file_score(a: &[String], b: &[String]) -> f64 {
    if any_pair(a, b, |x, y| x == y) {
        SAME_PATH
    } else if any_pair(a, b, |x, y| parent(x) == parent(y)) {
        SAME_DIR
    } else if any_pair(a, b, related_name) {
        RELATED_NAME
    } else {
        0.0
    }
}

fn any_pair(a: &[String], b: &[String], pred: impl Fn(&str, &str) -> bool) -> bool {
    a.iter().any(|x| b.iter().any(|y| pred(x.as_str(), y.as_str())))
}

/// Shared symbols over the larger symbol set.
pub fn symbol_score(a: &[String], b: &[String]) -> f64 {
    overlap(&as_set(a), &as_set(b))
}

pub fn content_score(a: &Change, b: &Change) -> f64 {
    overlap(&keywords(a), &keywords(b))
}

fn as_set(items: &[String]) -> HashSet<String> {
    items.iter().cloned().collect()
}

fn overlap(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.intersection(b).count();
    common as f64 / a.len().max(b.len()) as f64
}

/// Lowercased words longer than three characters from added and removed
/// lines, with surrounding punctuation trimmed and stop words dropped.
pub fn keywords(change: &Change) -> HashSet<String> {
    change
        .changed_lines()
        .flat_map(|line| line[1..].split_whitespace())
        .map(|word| word.trim_matches(TRIM_CHARS).to_lowercase())
        .filter(|word| word.chars().count() > 3 && !STOP_WORDS.contains(&word.as_str()))
        .collect()
}

/// Memoized symmetric similarity matrix with a `1.0` diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    n: usize,
    scores: Vec<f64>,
}

impl SimilarityMatrix {
    pub fn compute(changes: &[Change]) -> Self {
        let n = changes.len();
        let mut scores = vec![0.0; n * n];
        for i in 0..n {
            scores[i * n + i] = 1.0;
            for j in (i + 1)..n {
                let s = similarity(&changes[i], &changes[j]);
                scores[i * n + j] = s;
                scores[j * n + i] = s;
            }
        }
        Self { n, scores }
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.scores[i * self.n + j]
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::{Hunk, HunkKind};

    fn change(file: &str, symbols: &[&str], lines: &[&str]) -> Change {
        let hunk = Hunk {
            file: file.to_string(),
            start_line: 1,
            lines: lines.iter().map(|l| l.to_string()).collect(),
            kind: HunkKind::Add,
        };
        Change::new(file, vec![hunk]).with_symbols(symbols.iter().copied())
    }

    fn paths(p: &[&str]) -> Vec<String> {
        p.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn file_score_tiers() {
        assert_eq!(file_score(&paths(&["a/x.rs"]), &paths(&["a/x.rs"])), 1.0);
        assert_eq!(file_score(&paths(&["a/x.rs"]), &paths(&["a/y.rs"])), 0.7);
        assert_eq!(
            file_score(&paths(&["src/auth.go"]), &paths(&["test/auth_test.go"])),
            0.5
        );
        assert_eq!(file_score(&paths(&["src/a.rs"]), &paths(&["docs/b.md"])), 0.0);
        assert_eq!(file_score(&paths(&[]), &paths(&["a.rs"])), 0.0);
    }

    #[test]
    fn file_score_takes_best_pair() {
        let a = paths(&["docs/z.md", "src/x.rs"]);
        let b = paths(&["lib/q.rs", "src/x.rs"]);
        assert_eq!(file_score(&a, &b), 1.0);
    }

    #[test]
    fn symbol_score_uses_larger_set() {
        let a = paths(&["Login", "Logout"]);
        let b = paths(&["Login"]);
        assert_eq!(symbol_score(&a, &b), 0.5);
        assert_eq!(symbol_score(&a, &[]), 0.0);
    }

    #[test]
    fn content_score_divides_by_larger_set() {
        let a = change("a.txt", &[], &["+alpha bravo charlie"]);
        let b = change("b.txt", &[], &["+alpha bravo delta"]);
        // 2 shared of 3 each; a union-based ratio would give 2/4.
        assert!((content_score(&a, &b) - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn keywords_trim_and_filter() {
        let c = change(
            "a.go",
            &[],
            &["+func Validate(token string) {", "-\treturn nil", " context ignored"],
        );
        let kw = keywords(&c);
        assert!(kw.contains("func"));
        assert!(kw.contains("validate(token"));
        assert!(kw.contains("string"));
        assert!(kw.contains("return"));
        assert!(!kw.contains("context"));
        assert!(!kw.contains("nil"));
    }

    #[test]
    fn identity_and_symmetry() {
        let a = change("src/auth.go", &["Login"], &["+func Login() {"]);
        let b = change("docs/readme.md", &[], &["+Some documentation words"]);
        assert_eq!(similarity(&a, &a), 1.0);
        assert_eq!(similarity(&b, &b), 1.0);
        assert_eq!(similarity(&a, &b), similarity(&b, &a));
    }

    #[test]
    fn weighted_sum() {
        let a = change("pkg/a.go", &["Serve"], &["+func Serve() {"]);
        let b = change("pkg/b.go", &["Serve"], &["+func Serve() {", "+extra words here"]);
        // file 0.7, symbol 1.0, content {func, serve} vs {func, serve, extra, words, here} = 2/5
        let expected = 0.3 * 0.7 + 0.4 * 1.0 + 0.3 * 0.4;
        assert!((similarity(&a, &b) - expected).abs() < 1e-9);
    }

    #[test]
    fn matrix_is_symmetric_with_unit_diagonal() {
        let changes = vec![
            change("a.go", &["A"], &["+func A() {"]),
            change("b.go", &["B"], &["+func B() {"]),
            change("x/c.md", &[], &["+notes"]),
        ];
        let m = SimilarityMatrix::compute(&changes);
        assert_eq!(m.len(), 3);
        for i in 0..3 {
            assert_eq!(m.get(i, i), 1.0);
            for j in 0..3 {
                assert_eq!(m.get(i, j), m.get(j, i));
            }
        }
    }
}
