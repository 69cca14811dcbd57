//! Physical-line primitives shared by analysis, execution and validation.
//!
//! Every line range in this crate is 1-based and inclusive. Lines follow
//! `str::lines` semantics: `\n` and `\r\n` both terminate a line and a
//! trailing terminator does not open an extra empty line.
//!
//! Extracts are therefore `\n`-joined whatever the source used. Comparisons
//! are byte-exact over that normalized form: a CRLF source and its LF
//! extract compare equal, and a change of line endings alone is not
//! detected.

use serde::{Deserialize, Serialize};

/// Number of physical lines in `text`.
pub fn line_count(text: &str) -> usize {
    text.lines().count()
}

/// Return lines `[start, end]` joined with `\n`, or `None` when the range is
/// empty, zero-based, or runs past the end of the text. Line terminators are
/// normalized, `\r\n` included.
pub fn slice_lines(text: &str, start: usize, end: usize) -> Option<String> {
    if start == 0 || end < start {
        return None;
    }
    let selected: Vec<&str> = text.lines().skip(start - 1).take(end - start + 1).collect();
    if selected.len() != end - start + 1 {
        return None;
    }
    Some(selected.join("\n"))
}

/// Same as [`slice_lines`] but over an already split line vector.
pub fn join_range(lines: &[&str], start: usize, end: usize) -> String {
    lines[start - 1..end].join("\n")
}

/// `content[span]`, or `""` when the span does not fit `content`.
pub fn span_text(content: &str, span: (usize, usize)) -> &str {
    content.get(span.0..span.1).unwrap_or("")
}

/// Byte column of `offset` within its line of `content`.
pub fn column_of(content: &str, offset: usize) -> usize {
    content
        .get(..offset)
        .map_or(0, |head| offset - head.rfind('\n').map_or(0, |i| i + 1))
}

/// Byte offset → line number lookup for whole-document scanners.
pub struct LineIndex {
    starts: Vec<usize>,
    total: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            starts,
            total: line_count(text),
        }
    }

    /// 1-based line containing the byte at `offset`.
    pub fn line_of(&self, offset: usize) -> usize {
        let line = self.starts.partition_point(|&s| s <= offset);
        line.clamp(1, self.total.max(1))
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

/// First point where two texts diverge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMismatch {
    /// 1-based line of the first difference, relative to the compared text
    pub line: usize,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Byte-for-byte comparison; `None` means identical. Inputs are expected in
/// the `\n`-joined form produced by [`slice_lines`].
pub fn compare_content(expected: &str, actual: &str) -> Option<ContentMismatch> {
    if expected.as_bytes() == actual.as_bytes() {
        return None;
    }
    let mut exp = expected.split('\n');
    let mut act = actual.split('\n');
    let mut line = 1;
    loop {
        match (exp.next(), act.next()) {
            (Some(e), Some(a)) if e == a => line += 1,
            (e, a) => {
                return Some(ContentMismatch {
                    line,
                    expected: e.map(str::to_string),
                    actual: a.map(str::to_string),
                })
            }
        }
    }
}
