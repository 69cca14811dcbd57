//! Tag tokenizer and element tree over whole-document text.
//!
//! Tags may span several physical lines (exported markup routinely wraps long
//! attribute lists), so scanning happens over the full text and byte offsets
//! are mapped back to lines through [`LineIndex`]. Comment, `<script>` and
//! `<style>` bodies are skipped. Malformed nesting is recovered, never fatal.

use crate::lines::LineIndex;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::LazyLock;

static RE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<!--.*?-->|<(/?)([a-zA-Z][a-zA-Z0-9:-]*)((?:[^>"']|"[^"]*"|'[^']*')*?)(/?)>"#)
        .unwrap()
});

static RE_ATTR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([a-zA-Z_:@][-a-zA-Z0-9_:.@]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .unwrap()
});

static RE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements a same-named sibling implicitly closes.
const AUTO_CLOSING: &[&str] = &["li", "p", "option", "dt", "dd", "tr", "td", "th"];

const RAW_TEXT: &[&str] = &["script", "style"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    Open,
    Close,
    SelfClosing,
}

#[derive(Debug, Clone)]
pub struct Attr {
    pub name: String,
    pub value: Option<String>,
    /// Byte offset of the value (or the name when valueless) in the document
    pub offset: usize,
}

#[derive(Debug, Clone)]
pub struct Tag {
    /// Lowercased element name
    pub name: String,
    pub kind: TagKind,
    pub attrs: Vec<Attr>,
    pub start: usize,
    pub end: usize,
    /// Raw tag text, whitespace collapsed
    pub text: String,
}

impl Tag {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name == name)
            .and_then(|a| a.value.as_deref())
    }

    fn is_void(&self) -> bool {
        self.kind == TagKind::SelfClosing || VOID_ELEMENTS.contains(&self.name.as_str())
    }
}

/// Tokenize every tag in `text`, skipping comments and raw-text bodies.
pub fn tokenize(text: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    let mut pos = 0;
    while let Some(caps) = RE_TAG.captures_at(text, pos) {
        let whole = caps.get(0).unwrap();
        pos = whole.end();
        let Some(name) = caps.get(2) else {
            // comment
            continue;
        };
        let attrs_match = caps.get(3).unwrap();
        let kind = if !caps[1].is_empty() {
            TagKind::Close
        } else if !caps[4].is_empty() {
            TagKind::SelfClosing
        } else {
            TagKind::Open
        };
        let tag = Tag {
            name: name.as_str().to_ascii_lowercase(),
            kind,
            attrs: parse_attrs(attrs_match.as_str(), attrs_match.start()),
            start: whole.start(),
            end: whole.end(),
            text: RE_WS.replace_all(whole.as_str(), " ").into_owned(),
        };
        if tag.kind == TagKind::Open && RAW_TEXT.contains(&tag.name.as_str()) {
            // Jump to the matching close tag; an unterminated body runs to EOF
            let close = format!("</{}", tag.name);
            let rest = &text[pos..];
            let lower = rest.to_ascii_lowercase();
            pos = match lower.find(&close) {
                Some(i) => pos + i,
                None => text.len(),
            };
        }
        tags.push(tag);
    }
    tags
}

fn parse_attrs(raw: &str, base: usize) -> Vec<Attr> {
    RE_ATTR
        .captures_iter(raw)
        .map(|c| {
            let value = c.get(2).or_else(|| c.get(3)).or_else(|| c.get(4));
            Attr {
                name: c[1].to_ascii_lowercase(),
                value: value.map(|m| m.as_str().to_string()),
                offset: base + value.map_or(c.get(1).unwrap().start(), |m| m.start()),
            }
        })
        .collect()
}

// -- Element tree -------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub open_tag: String,
    pub start_line: usize,
    pub end_line: usize,
    /// False when the element never saw its close tag and ran to EOF
    pub closed: bool,
    pub is_void: bool,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Hex digest of tag + classes + role + children digests
    pub signature: String,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self
            .attr("class")
            .map(|c| c.split_whitespace().collect())
            .unwrap_or_default();
        classes.sort_unstable();
        classes.dedup();
        classes
    }

    pub fn end_tag(&self) -> String {
        if self.is_void {
            String::new()
        } else {
            format!("</{}>", self.name)
        }
    }
}

#[derive(Debug, Default)]
pub struct ElementTree {
    /// Arena in document order; a parent always precedes its children
    pub elements: Vec<Element>,
    pub roots: Vec<usize>,
    /// `(line, message)` for elements left open at EOF
    pub unclosed: Vec<(usize, String)>,
    /// Close tags that matched nothing on the stack
    pub stray_closes: Vec<(usize, String)>,
}

impl ElementTree {
    pub fn children_of(&self, parent: Option<usize>) -> &[usize] {
        match parent {
            Some(idx) => &self.elements[idx].children,
            None => &self.roots,
        }
    }
}

/// Build the element tree for `text`.
pub fn build_tree(text: &str) -> ElementTree {
    let index = LineIndex::new(text);
    let mut tree = ElementTree::default();
    let mut stack: Vec<usize> = Vec::new();

    for tag in tokenize(text) {
        match tag.kind {
            TagKind::Open | TagKind::SelfClosing => {
                if AUTO_CLOSING.contains(&tag.name.as_str()) {
                    if let Some(&top) = stack.last() {
                        if tree.elements[top].name == tag.name {
                            stack.pop();
                            let el = &mut tree.elements[top];
                            el.end_line = index.line_of(tag.start).max(el.start_line);
                            el.closed = true;
                        }
                    }
                }
                let parent = stack.last().copied();
                let void = tag.is_void();
                let idx = tree.elements.len();
                tree.elements.push(Element {
                    attrs: tag
                        .attrs
                        .iter()
                        .map(|a| (a.name.clone(), a.value.clone().unwrap_or_default()))
                        .collect(),
                    open_tag: tag.text.clone(),
                    start_line: index.line_of(tag.start),
                    end_line: index.line_of(tag.end - 1),
                    closed: void,
                    is_void: void,
                    parent,
                    children: Vec::new(),
                    signature: String::new(),
                    name: tag.name,
                });
                match parent {
                    Some(p) => tree.elements[p].children.push(idx),
                    None => tree.roots.push(idx),
                }
                if !void {
                    stack.push(idx);
                }
            }
            TagKind::Close => {
                let Some(pos) = stack.iter().rposition(|&i| tree.elements[i].name == tag.name)
                else {
                    tree.stray_closes
                        .push((index.line_of(tag.start), format!("</{}>", tag.name)));
                    continue;
                };
                let close_line = index.line_of(tag.end - 1);
                for &implicit in &stack[pos + 1..] {
                    let el = &mut tree.elements[implicit];
                    el.end_line = index.line_of(tag.start).max(el.start_line);
                    el.closed = true;
                }
                let matched = stack[pos];
                tree.elements[matched].end_line = close_line;
                tree.elements[matched].closed = true;
                stack.truncate(pos);
            }
        }
    }

    let last = index.total().max(1);
    for idx in stack {
        let el = &mut tree.elements[idx];
        el.end_line = last;
        tree.unclosed.push((
            el.start_line,
            format!("unclosed <{}> opened at line {}, closed at end of file", el.name, el.start_line),
        ));
    }

    compute_signatures(&mut tree);
    tree
}

/// Bottom-up digests; reverse arena order visits children before parents.
fn compute_signatures(tree: &mut ElementTree) {
    for idx in (0..tree.elements.len()).rev() {
        let el = &tree.elements[idx];
        let mut hasher = Sha256::new();
        hasher.update(el.name.as_bytes());
        for class in el.classes() {
            hasher.update(b".");
            hasher.update(class.as_bytes());
        }
        if let Some(role) = el.attr("role") {
            hasher.update(b"[role=");
            hasher.update(role.as_bytes());
            hasher.update(b"]");
        }
        hasher.update(b"(");
        for &child in &el.children {
            hasher.update(tree.elements[child].signature.as_bytes());
            hasher.update(b",");
        }
        hasher.update(b")");
        let digest = hasher.finalize();
        let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
        tree.elements[idx].signature = hex;
    }
}
