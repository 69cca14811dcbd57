//! Inline `<style>` / `<script>` region scanner: line-by-line state machine.
//!
//! Both region kinds are found in one pass so that markers inside a foreign
//! region (a `<style>` string inside a script, a commented-out script) are
//! not mistaken for real blocks. Ranges always include the marker lines;
//! byte spans locate the tags and body inside them, since a region may share
//! its first or last line with other markup.

use crate::lines::{join_range, span_text};
use crate::model::{CssBlock, CssBlockType, JsBlock, JsBlockType};
use regex::Regex;
use std::sync::LazyLock;

static RE_STYLE_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<style(?:[\s>/]|$)").unwrap());

static RE_STYLE_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</style\s*>").unwrap());

static RE_SCRIPT_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<script(?:[\s>/]|$)").unwrap());

static RE_SCRIPT_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</script\s*>").unwrap());

static RE_SRC_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\ssrc\s*=").unwrap());

static RE_FRAMER_CSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.framer-|--framer-|\[data-framer-|--token-").unwrap());

static RE_ANIMATION_JS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)framer|\bmotion\b|motion\.|animate\(|useAnimation|__framer|data-framer-appear")
        .unwrap()
});

const COMMENT_OPEN: &str = "<!--";
const COMMENT_CLOSE: &str = "-->";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionKind {
    Style,
    Script,
}

/// `(line, byte column)`
type Pos = (usize, usize);

/// A delimited region before classification.
#[derive(Debug, Clone)]
struct Region {
    kind: RegionKind,
    start: usize,
    end: usize,
    open_tag: String,
    /// Opening `<`
    open: Pos,
    /// First byte after the opening tag's `>`
    body_from: Pos,
    /// Closing marker's `<`
    body_to: Pos,
    /// First byte after the closing marker
    close_end: Pos,
}

enum Mode {
    Markup,
    Comment { start: usize },
    Region {
        kind: RegionKind,
        start: usize,
        open_col: usize,
        open_tag: String,
        /// Unset while still inside the opening tag (its `>` not yet seen)
        body_from: Option<Pos>,
    },
}

/// Result of one scan: classified blocks plus recoverable problems.
#[derive(Debug, Default)]
pub struct BlockScan {
    pub css: Vec<CssBlock>,
    pub js: Vec<JsBlock>,
    /// `(line, message)`
    pub warnings: Vec<(usize, String)>,
}

/// Inline stylesheet regions in source order.
pub fn extract_css_blocks(text: &str) -> Vec<CssBlock> {
    scan_blocks(text).css
}

/// Inline and external script regions, animation code flagged by type.
pub fn find_framer_motion_code(text: &str) -> Vec<JsBlock> {
    scan_blocks(text).js
}

/// Scan `text` once for style and script regions.
pub fn scan_blocks(text: &str) -> BlockScan {
    let lines: Vec<&str> = text.lines().collect();
    let mut regions = Vec::new();
    let mut warnings = Vec::new();
    let mut mode = Mode::Markup;

    for (idx, line) in lines.iter().enumerate() {
        let lineno = idx + 1;
        let mut pos = 0;
        loop {
            match &mut mode {
                Mode::Markup => {
                    let rest = &line[pos..];
                    let comment = rest.find(COMMENT_OPEN).map(|i| (i, COMMENT_OPEN.len(), None));
                    let style = RE_STYLE_OPEN
                        .find(rest)
                        .map(|m| (m.start(), "<style".len(), Some(RegionKind::Style)));
                    let script = RE_SCRIPT_OPEN
                        .find(rest)
                        .map(|m| (m.start(), "<script".len(), Some(RegionKind::Script)));
                    let Some((at, len, kind)) = [comment, style, script]
                        .into_iter()
                        .flatten()
                        .min_by_key(|(at, _, _)| *at)
                    else {
                        break;
                    };
                    let begin = pos + at;
                    pos = begin + len;
                    mode = match kind {
                        None => Mode::Comment { start: lineno },
                        Some(kind) => Mode::Region {
                            kind,
                            start: lineno,
                            open_col: begin,
                            open_tag: line[begin..pos].to_string(),
                            body_from: None,
                        },
                    };
                }
                Mode::Comment { .. } => match line[pos..].find(COMMENT_CLOSE) {
                    Some(i) => {
                        pos += i + COMMENT_CLOSE.len();
                        mode = Mode::Markup;
                    }
                    None => break,
                },
                Mode::Region {
                    kind,
                    start,
                    open_col,
                    open_tag,
                    body_from,
                } => {
                    if body_from.is_none() {
                        match line[pos..].find('>') {
                            Some(i) => {
                                open_tag.push_str(&line[pos..=pos + i]);
                                pos += i + 1;
                                *body_from = Some((lineno, pos));
                            }
                            None => {
                                open_tag.push(' ');
                                open_tag.push_str(line[pos..].trim());
                                break;
                            }
                        }
                    }
                    let close = match kind {
                        RegionKind::Style => &RE_STYLE_CLOSE,
                        RegionKind::Script => &RE_SCRIPT_CLOSE,
                    };
                    match close.find(&line[pos..]) {
                        Some(m) => {
                            let close_at = pos + m.start();
                            pos += m.end();
                            regions.push(Region {
                                kind: *kind,
                                start: *start,
                                end: lineno,
                                open_tag: std::mem::take(open_tag),
                                open: (*start, *open_col),
                                body_from: body_from.unwrap_or((lineno, close_at)),
                                body_to: (lineno, close_at),
                                close_end: (lineno, pos),
                            });
                            mode = Mode::Markup;
                        }
                        None => break,
                    }
                }
            }
        }
    }

    // Unterminated regions close at end of file
    let last = lines.len();
    match mode {
        Mode::Markup => {}
        Mode::Comment { start } => {
            warnings.push((start, format!("unterminated comment opened at line {start}")));
        }
        Mode::Region {
            kind,
            start,
            open_col,
            open_tag,
            body_from,
        } => {
            let tag = match kind {
                RegionKind::Style => "style",
                RegionKind::Script => "script",
            };
            warnings.push((
                start,
                format!("unterminated <{tag}> opened at line {start}, closed at end of file (line {last})"),
            ));
            let eof = (last, lines[last - 1].len());
            regions.push(Region {
                kind,
                start,
                end: last,
                open_tag,
                open: (start, open_col),
                body_from: body_from.unwrap_or(eof),
                body_to: eof,
                close_end: eof,
            });
        }
    }

    let mut scan = BlockScan {
        warnings,
        ..Default::default()
    };
    // Offset of each line in the `\n`-joined text
    let mut line_starts = Vec::with_capacity(lines.len());
    let mut at = 0;
    for line in &lines {
        line_starts.push(at);
        at += line.len() + 1;
    }

    for region in regions {
        let content = join_range(&lines, region.start, region.end);
        let base = line_starts[region.start - 1];
        let rel = |(line, col): Pos| line_starts[line - 1] + col - base;
        let span = (rel(region.open), rel(region.close_end));
        let body = (rel(region.body_from), rel(region.body_to).max(rel(region.body_from)));
        let inner = span_text(&content, body);
        match region.kind {
            RegionKind::Style => scan.css.push(CssBlock {
                start_line: region.start,
                end_line: region.end,
                block_type: classify_css(&region.open_tag, inner),
                content,
                span,
                body,
            }),
            RegionKind::Script => scan.js.push(JsBlock {
                start_line: region.start,
                end_line: region.end,
                block_type: classify_js(&region.open_tag, inner),
                content,
                span,
                body,
            }),
        }
    }
    scan
}

fn classify_css(open_tag: &str, content: &str) -> CssBlockType {
    if RE_FRAMER_CSS.is_match(content) || open_tag.contains("data-framer") {
        CssBlockType::Framer
    } else if open_tag.trim_end_matches('>').trim() != "<style" {
        CssBlockType::Custom
    } else {
        CssBlockType::Inline
    }
}

fn classify_js(open_tag: &str, content: &str) -> JsBlockType {
    if RE_SRC_ATTR.is_match(open_tag) {
        JsBlockType::External
    } else if RE_ANIMATION_JS.is_match(content) {
        JsBlockType::FramerMotion
    } else {
        JsBlockType::Inline
    }
}
