//! Unified-diff parsing into line and structural change metrics.
//!
//! Only lines inside `@@` hunks are counted. Each hunk consumes exactly the
//! number of old-side and new-side lines its header declares, so an added
//! line whose content starts with `++` is still an added line and not a
//! file header.
//!
//! Structural signals (functions, imports, comments, type annotations,
//! error handling) are pattern heuristics evaluated on added lines only.
//! Complexity is the control-flow keyword count on added lines minus the
//! same count on removed lines.

use crate::error::{PulseError, Result};
use crate::types::ChangeMetrics;
use regex::Regex;
use std::sync::LazyLock;

static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("valid hunk regex")
});

static CONTROL_FLOW: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:if|else|for|while|switch|case|try|catch)\b").expect("valid control-flow regex")
});

static FUNCTION_DECL: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bfunction\b\s*\*?\s*\w*\s*\(",
        r"(?:\([^()]*\)|\b\w+)\s*=>",
        r"\bfn\s+\w+",
        r"\bdef\s+\w+\s*\(",
    ])
});

// `name(args) {` style method heads; the name is checked against CONTROL_KEYWORDS.
static METHOD_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\w+)\s*\([^()]*\)\s*(?::\s*[\w<>\[\], |]+\s*)?\{").expect("valid method regex")
});

static IMPORT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^\s*import\s",
        r"^\s*from\s+\S+\s+import\s",
        r"\brequire\s*\(",
        r"^\s*(?:pub\s+)?use\s+[\w:{]",
        r"^\s*#include\b",
    ])
});

static COMMENT: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[r"//", r"/\*", r"^\s*\*", r"^\s*#(?:\s|$)"])
});

static TYPE_ANNOTATION: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\binterface\s+\w+",
        r"\btype\s+\w+(?:<[^>]*>)?\s*=",
        r"\b(?:let|const|var)\s+(?:mut\s+)?\w+\s*:\s*[A-Za-z_&\[(]",
        r"[(,]\s*\w+\??\s*:\s*[A-Za-z_&\[]",
        r"\)\s*(?::|->)\s*[A-Za-z_&\[(]",
    ])
});

static ERROR_HANDLING: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\btry\s*[{:]",
        r"\bcatch\s*[({]",
        r"\bthrow\s+",
        r"\bexcept\b[^:]*:",
        r"\braise\s+\w",
    ])
});

const CONTROL_KEYWORDS: [&str; 9] = [
    "if", "else", "for", "while", "switch", "case", "try", "catch", "return",
];

// Header lines allowed between `diff --git` and the first hunk.
const EXTENDED_HEADERS: [&str; 14] = [
    "diff ",
    "index ",
    "--- ",
    "+++ ",
    "new file mode",
    "deleted file mode",
    "old mode",
    "new mode",
    "similarity index",
    "dissimilarity index",
    "rename from",
    "rename to",
    "copy from",
    "copy to",
];

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("valid heuristic regex"))
        .collect()
}

fn any_match(patterns: &[Regex], line: &str) -> bool {
    patterns.iter().any(|re| re.is_match(line))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Header,
    Hunk { old_left: u32, new_left: u32 },
    BinaryPatch,
}

/// Parses unified diffs produced by `git diff`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiffAnalyzer;

impl DiffAnalyzer {
    /// Parses `diff` into metrics.
    ///
    /// Empty input, binary-only diffs and diffs without textual hunks yield
    /// zeroed metrics.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the text is not shaped like a unified diff.
    pub fn parse(diff: &str) -> Result<ChangeMetrics> {
        let mut metrics = ChangeMetrics::default();
        let mut added_control_flow: i64 = 0;
        let mut removed_control_flow: i64 = 0;
        let mut state = ParseState::Header;

        for (idx, line) in diff.lines().enumerate() {
            let line_no = idx + 1;

            if let ParseState::Hunk { old_left: 0, new_left: 0 } = state {
                state = ParseState::Header;
            }

            match state {
                ParseState::Hunk { old_left, new_left } => {
                    let (kind, content) = match line.chars().next() {
                        Some(c) => (c, &line[c.len_utf8()..]),
                        None => (' ', ""),
                    };
                    match kind {
                        '+' => {
                            if new_left == 0 {
                                return Err(hunk_overflow(line_no));
                            }
                            state = ParseState::Hunk { old_left, new_left: new_left - 1 };
                            metrics.lines_added += 1;
                            added_control_flow += CONTROL_FLOW.find_iter(content).count() as i64;
                            Self::scan_added_line(content, &mut metrics);
                        }
                        '-' => {
                            if old_left == 0 {
                                return Err(hunk_overflow(line_no));
                            }
                            state = ParseState::Hunk { old_left: old_left - 1, new_left };
                            metrics.lines_deleted += 1;
                            removed_control_flow += CONTROL_FLOW.find_iter(content).count() as i64;
                        }
                        ' ' => {
                            if old_left == 0 || new_left == 0 {
                                return Err(hunk_overflow(line_no));
                            }
                            state = ParseState::Hunk {
                                old_left: old_left - 1,
                                new_left: new_left - 1,
                            };
                        }
                        '\\' => {}
                        _ => {
                            return Err(PulseError::Parse(format!(
                                "line {}: hunk ended early, found {:?}",
                                line_no,
                                truncate(line)
                            )))
                        }
                    }
                }
                ParseState::BinaryPatch => {
                    if line.starts_with("diff ") {
                        state = ParseState::Header;
                    }
                }
                ParseState::Header => {
                    if let Some(next) = Self::parse_header_line(line, line_no, &mut metrics)? {
                        state = next;
                    }
                }
            }
        }

        if let ParseState::Hunk { old_left, new_left } = state {
            if old_left > 0 || new_left > 0 {
                return Err(PulseError::Parse(format!(
                    "diff truncated: hunk missing {} old and {} new lines",
                    old_left, new_left
                )));
            }
        }

        metrics.complexity_delta = (added_control_flow - removed_control_flow)
            .clamp(i32::MIN as i64, i32::MAX as i64) as i32;
        Ok(metrics)
    }

    /// Handles a line outside any hunk, returning the next state when it changes.
    fn parse_header_line(
        line: &str,
        line_no: usize,
        metrics: &mut ChangeMetrics,
    ) -> Result<Option<ParseState>> {
        if line.trim().is_empty() || line.starts_with('\\') {
            return Ok(None);
        }
        if line.starts_with("@@") {
            let caps = HUNK_HEADER.captures(line).ok_or_else(|| {
                PulseError::Parse(format!("line {}: malformed hunk header {:?}", line_no, truncate(line)))
            })?;
            let count = |i: usize| -> Result<u32> {
                match caps.get(i) {
                    Some(m) => m.as_str().parse::<u32>().map_err(|e| {
                        PulseError::Parse(format!("line {}: bad hunk count: {}", line_no, e))
                    }),
                    None => Ok(1),
                }
            };
            metrics.hunks += 1;
            return Ok(Some(ParseState::Hunk {
                old_left: count(2)?,
                new_left: count(4)?,
            }));
        }
        if line.starts_with("Binary files ") {
            metrics.binary_files += 1;
            return Ok(None);
        }
        if line.starts_with("GIT binary patch") {
            metrics.binary_files += 1;
            return Ok(Some(ParseState::BinaryPatch));
        }
        if EXTENDED_HEADERS.iter().any(|h| line.starts_with(h)) {
            return Ok(None);
        }
        Err(PulseError::Parse(format!(
            "line {}: not part of a unified diff: {:?}",
            line_no,
            truncate(line)
        )))
    }

    fn scan_added_line(content: &str, metrics: &mut ChangeMetrics) {
        if Self::declares_function(content) {
            metrics.functions_added += 1;
        }
        if any_match(&IMPORT, content) {
            metrics.imports_changed += 1;
        }
        if any_match(&COMMENT, content) {
            metrics.comments_added += 1;
        }
        if !metrics.has_type_annotations && any_match(&TYPE_ANNOTATION, content) {
            metrics.has_type_annotations = true;
        }
        if !metrics.has_error_handling && any_match(&ERROR_HANDLING, content) {
            metrics.has_error_handling = true;
        }
    }

    fn declares_function(content: &str) -> bool {
        if any_match(&FUNCTION_DECL, content) {
            return true;
        }
        METHOD_HEAD
            .captures_iter(content)
            .any(|caps| !CONTROL_KEYWORDS.contains(&&caps[1]))
    }
}

fn hunk_overflow(line_no: usize) -> PulseError {
    PulseError::Parse(format!("line {}: more lines than the hunk header declares", line_no))
}

fn truncate(line: &str) -> String {
    line.chars().take(60).collect()
}
