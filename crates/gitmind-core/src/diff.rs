//! Unified diff parsing.
//!
//! Turns `git diff --cached` output (with or without context lines) into
//! per-file [`Hunk`]s. Parsing never fails: malformed hunk headers are
//! recorded as [`ParseError`] warnings and their bodies skipped.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ParseError;

fn hunk_header() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@")
            .expect("hunk header pattern compiles")
    })
}

/// What a hunk does to its file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HunkKind {
    Add,
    Remove,
    Modify,
}

/// A contiguous block of diff lines within one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    pub file: String,
    /// First line of the hunk on the new-file side.
    pub start_line: usize,
    /// Raw lines including their `+`, `-` or ` ` prefix.
    pub lines: Vec<String>,
    pub kind: HunkKind,
}

impl Hunk {
    /// Added and removed lines, prefix included.
    pub fn changed_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(String::as_str)
            .filter(|l| l.starts_with('+') || l.starts_with('-'))
    }

    pub fn additions(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('+')).count()
    }

    pub fn deletions(&self) -> usize {
        self.lines.iter().filter(|l| l.starts_with('-')).count()
    }
}

/// Result of parsing one diff text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedDiff {
    /// Hunks in diff order.
    pub hunks: Vec<Hunk>,
    /// Files present in the diff that produced no hunk (binary files, mode
    /// changes, renames without edits, rename sources), in diff order.
    pub hunkless_files: Vec<String>,
    #[serde(skip)]
    pub warnings: Vec<ParseError>,
}

impl ParsedDiff {
    pub fn is_empty(&self) -> bool {
        self.hunks.is_empty() && self.hunkless_files.is_empty()
    }
}

struct OpenHunk {
    file: String,
    start_line: usize,
    lines: Vec<String>,
    old_left: usize,
    new_left: usize,
    saw_add: bool,
    saw_remove: bool,
}

impl OpenHunk {
    fn exhausted(&self) -> bool {
        self.old_left == 0 && self.new_left == 0
    }

    fn push(&mut self, line: &str) {
        match line.as_bytes().first() {
            Some(b'+') => {
                self.saw_add = true;
                self.new_left = self.new_left.saturating_sub(1);
            }
            Some(b'-') => {
                self.saw_remove = true;
                self.old_left = self.old_left.saturating_sub(1);
            }
            _ => {
                self.old_left = self.old_left.saturating_sub(1);
                self.new_left = self.new_left.saturating_sub(1);
            }
        }
        self.lines.push(line.to_string());
    }

    fn finish(self) -> Hunk {
        let kind = match (self.saw_add, self.saw_remove) {
            (true, false) => HunkKind::Add,
            (false, true) => HunkKind::Remove,
            _ => HunkKind::Modify,
        };
        Hunk {
            file: self.file,
            start_line: self.start_line,
            lines: self.lines,
            kind,
        }
    }
}

#[derive(Default)]
struct Parser {
    hunks: Vec<Hunk>,
    warnings: Vec<ParseError>,
    files: Vec<String>,
    seen: HashSet<String>,
    current_file: Option<String>,
    old_file: Option<String>,
    open: Option<OpenHunk>,
}

impl Parser {
    fn close(&mut self) {
        if let Some(open) = self.open.take() {
            self.hunks.push(open.finish());
        }
    }

    fn register(&mut self, path: &str) {
        if self.seen.insert(path.to_string()) {
            self.files.push(path.to_string());
        }
    }

    fn set_file(&mut self, path: String) {
        self.register(&path);
        self.current_file = Some(path);
    }

    fn open_hunk(&mut self, line_no: usize, line: &str) {
        let Some(caps) = hunk_header().captures(line) else {
            debug!(line_no, line, "skipping malformed hunk header");
            self.warnings.push(ParseError::MalformedHunkHeader {
                line_no,
                line: line.to_string(),
            });
            return;
        };
        let Some(file) = self.current_file.clone() else {
            self.warnings.push(ParseError::OrphanHunk { line_no });
            return;
        };
        let number = |i: usize, default: usize| {
            caps.get(i)
                .and_then(|m| m.as_str().parse::<usize>().ok())
                .unwrap_or(default)
        };
        self.open = Some(OpenHunk {
            file,
            start_line: number(3, 0),
            lines: Vec::new(),
            old_left: number(2, 1),
            new_left: number(4, 1),
            saw_add: false,
            saw_remove: false,
        });
    }

    fn line(&mut self, line_no: usize, line: &str) {
        // While the header's line counts are not used up, every prefixed
        // line belongs to the hunk, even one that looks like `--- a/...`.
        if let Some(open) = self.open.as_mut() {
            let body = line.is_empty() || matches!(line.as_bytes()[0], b'+' | b'-' | b' ');
            if body && !open.exhausted() {
                open.push(line);
                return;
            }
        }

        if line.starts_with('\\') {
            return;
        }
        if let Some(rest) = line.strip_prefix("diff --git ") {
            self.close();
            self.old_file = None;
            self.current_file = None;
            if let Some(path) = git_header_new_path(rest) {
                self.set_file(path);
            }
            return;
        }
        if let Some(rest) = line.strip_prefix("--- ") {
            self.close();
            self.old_file = strip_side(rest, "a/");
            return;
        }
        if let Some(rest) = line.strip_prefix("+++ ") {
            self.close();
            match strip_side(rest, "b/") {
                Some(path) => self.set_file(path),
                None => {
                    if let Some(old) = self.old_file.clone() {
                        self.set_file(old);
                    }
                }
            }
            return;
        }
        if line.starts_with("@@") {
            self.close();
            self.open_hunk(line_no, line);
            return;
        }
        if let Some(from) = line.strip_prefix("rename from ") {
            let from = unquote(from).unwrap_or_else(|| from.to_string());
            self.register(&from);
            return;
        }
        if line.starts_with("Binary files ") || line == "GIT binary patch" {
            self.close();
            return;
        }
        if let Some(open) = self.open.as_mut() {
            if matches!(line.as_bytes().first(), Some(b'+' | b'-' | b' ')) {
                open.push(line);
            }
        }
    }

    fn finish(mut self) -> ParsedDiff {
        self.close();
        let with_hunks: HashSet<&str> = self.hunks.iter().map(|h| h.file.as_str()).collect();
        let hunkless_files = self
            .files
            .iter()
            .filter(|f| !with_hunks.contains(f.as_str()))
            .cloned()
            .collect();
        ParsedDiff {
            hunks: self.hunks,
            hunkless_files,
            warnings: self.warnings,
        }
    }
}

/// Strip the `a/` or `b/` side prefix; `None` for `/dev/null`.
fn strip_side(raw: &str, prefix: &str) -> Option<String> {
    let path = raw.split('\t').next().unwrap_or(raw).trim_end();
    if path == "/dev/null" {
        return None;
    }
    let path = unquote(path).unwrap_or_else(|| path.to_string());
    Some(path.strip_prefix(prefix).unwrap_or(&path).to_string())
}

/// New-side path of a `diff --git <old> <new>` header.
///
/// A quoted new path is always introduced by ` "b/`; inside quotes every
/// `"` is escaped, so that sequence cannot occur within a path.
fn git_header_new_path(rest: &str) -> Option<String> {
    if rest.ends_with('"') {
        let start = rest.rfind(" \"b/")? + 1;
        let path = unquote(&rest[start..])?;
        return path.strip_prefix("b/").map(str::to_string);
    }
    rest.rfind(" b/").map(|idx| rest[idx + 3..].to_string())
}

/// Decode a path git wrote in C-style quotes, e.g. `"caf\303\251.txt"`.
///
/// Returns `None` when `raw` is not a complete quoted string.
fn unquote(raw: &str) -> Option<String> {
    let inner = raw.strip_prefix('"')?.strip_suffix('"')?;
    let src = inner.as_bytes();
    let mut out = Vec::with_capacity(src.len());
    let mut i = 0;
    while i < src.len() {
        let byte = src[i];
        i += 1;
        if byte != b'\\' {
            if byte == b'"' {
                return None;
            }
            out.push(byte);
            continue;
        }
        let escaped = *src.get(i)?;
        i += 1;
        let decoded = match escaped {
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            b'"' => b'"',
            b'\\' => b'\\',
            b'0'..=b'7' => {
                let digits = src.get(i - 1..i + 2)?;
                if !digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                    return None;
                }
                i += 2;
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                u8::try_from(value).ok()?
            }
            _ => return None,
        };
        out.push(decoded);
    }
    String::from_utf8(out).ok()
}

/// Parse unified diff text into hunks.
pub fn parse_diff(text: &str) -> ParsedDiff {
    let mut parser = Parser::default();
    for (i, line) in text.lines().enumerate() {
        parser.line(i + 1, line);
    }
    parser.finish()
}
