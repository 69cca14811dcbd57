//! CSS consolidation in cascade order.
//!
//! The global stylesheet is the concatenation of every inline `<style>` body
//! in route order, then block order within a document. Rules are never
//! reordered, merged or rewritten: later rules must keep overriding earlier
//! ones exactly as they did in the source pages.

use crate::lines::LineIndex;
use crate::model::{AnalyzedDocument, CssBlock, CssBlockType, CssConsolidationPlan, CssSourceBlock};
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Destination of the consolidated stylesheet, relative to the project root.
pub const GLOBALS_CSS: &str = "app/globals.css";

static RE_CSS_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());

static RE_CUSTOM_PROPERTY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(--[A-Za-z0-9_-]+)\s*:\s*([^;{}]+)").unwrap());

static RE_RULE_SELECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^{}]+)\{").unwrap());

static RE_FRAMER_SELECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.framer-|\[data-framer-").unwrap());

/// A rule whose selector targets framer-generated markup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FramerRule {
    pub source_file: String,
    pub line: usize,
    pub selector: String,
}

/// Build the consolidation plan for `docs`, which must already be in route
/// order.
pub fn consolidate_css(docs: &[AnalyzedDocument]) -> CssConsolidationPlan {
    let entries: Vec<CssSourceBlock> = docs
        .iter()
        .flat_map(|doc| {
            doc.analysis.css_blocks.iter().map(|block| CssSourceBlock {
                source_file: doc.analysis.file_name.clone(),
                block: block.clone(),
            })
        })
        .collect();

    let mut plan = CssConsolidationPlan {
        target_file: GLOBALS_CSS.to_string(),
        entries,
        custom_properties: BTreeMap::new(),
        preserve_order: true,
        warnings: Vec::new(),
    };
    let (props, warnings) = preserve_custom_properties(&plan);
    for w in &warnings {
        warn!("{w}");
    }
    plan.custom_properties = props;
    plan.warnings = warnings;
    debug!(
        blocks = plan.entries.len(),
        custom_properties = plan.custom_properties.len(),
        "css consolidation planned"
    );
    plan
}

/// The global stylesheet text for `plan`.
///
/// Each block body is preceded by a comment naming its source range.
/// Identical plans always render identical bytes.
pub fn render_stylesheet(plan: &CssConsolidationPlan) -> String {
    let mut out = String::new();
    for (i, entry) in plan.entries.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&provenance_comment(entry));
        out.push('\n');
        let body = css_body(&entry.block);
        if !body.is_empty() {
            out.push_str(body);
            out.push('\n');
        }
    }
    out
}

pub fn provenance_comment(entry: &CssSourceBlock) -> String {
    format!(
        "/* {}:{}-{} ({}) */",
        entry.source_file,
        entry.block.start_line,
        entry.block.end_line,
        block_type_name(entry.block.block_type)
    )
}

fn block_type_name(t: CssBlockType) -> &'static str {
    match t {
        CssBlockType::Inline => "inline",
        CssBlockType::Framer => "framer",
        CssBlockType::Custom => "custom",
    }
}

/// Stylesheet body of a block: the text between its `<style>` tags with
/// the newlines that directly border them removed, everything else verbatim.
/// Markup sharing the tag lines is never part of the body.
pub fn css_body(block: &CssBlock) -> &str {
    let body = block.body_text();
    let body = body.strip_prefix('\n').unwrap_or(body);
    body.trim_end()
}

/// Custom property name → last definition in cascade order.
///
/// A property defined again with a different value produces a warning; the
/// definitions themselves stay untouched in the stylesheet.
pub fn preserve_custom_properties(
    plan: &CssConsolidationPlan,
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut props: BTreeMap<String, String> = BTreeMap::new();
    let mut origin: BTreeMap<String, String> = BTreeMap::new();
    let mut warnings = Vec::new();

    for entry in &plan.entries {
        let index = LineIndex::new(&entry.block.content);
        let offset = entry.block.body.0;
        let body = blank_comments(entry.block.body_text());
        for caps in RE_CUSTOM_PROPERTY.captures_iter(&body) {
            let name = caps[1].to_string();
            let value = caps[2].trim().to_string();
            let line = entry.block.start_line + index.line_of(offset + caps.get(1).map_or(0, |m| m.start())) - 1;
            let here = format!("{}:{}", entry.source_file, line);
            if let Some(previous) = props.get(&name) {
                if *previous != value {
                    warnings.push(format!(
                        "custom property {name} redefined at {here} ({previous} → {value}); first defined at {}, last definition wins",
                        origin.get(&name).map(String::as_str).unwrap_or("?")
                    ));
                }
            } else {
                origin.insert(name.clone(), here);
            }
            props.insert(name, value);
        }
    }
    (props, warnings)
}

/// Replace comment bodies with spaces so offsets stay valid.
fn blank_comments(css: &str) -> String {
    RE_CSS_COMMENT
        .replace_all(css, |caps: &regex::Captures| {
            caps[0]
                .chars()
                .map(|c| if c == '\n' { '\n' } else { ' ' })
                .collect::<String>()
        })
        .into_owned()
}

/// Rules in the plan whose selectors come from framer-generated markup.
pub fn identify_framer_styles(plan: &CssConsolidationPlan) -> Vec<FramerRule> {
    let mut rules = Vec::new();
    for entry in &plan.entries {
        rules.extend(framer_rules_in(&entry.source_file, &entry.block));
    }
    rules
}

fn framer_rules_in(source_file: &str, block: &CssBlock) -> Vec<FramerRule> {
    let index = LineIndex::new(&block.content);
    let offset = block.body.0;
    let body = blank_comments(block.body_text());
    let mut rules = Vec::new();
    for caps in RE_RULE_SELECTOR.captures_iter(&body) {
        let Some(m) = caps.get(1) else {
            continue;
        };
        // Text after the last statement terminator is the selector
        let raw = m.as_str();
        let cut = raw.rfind(';').map_or(0, |i| i + 1);
        let selector = raw[cut..].trim();
        if selector.is_empty() || !RE_FRAMER_SELECTOR.is_match(selector) {
            continue;
        }
        let lead = raw[cut..].len() - raw[cut..].trim_start().len();
        let at = offset + m.start() + cut + lead;
        rules.push(FramerRule {
            source_file: source_file.to_string(),
            line: block.start_line + index.line_of(at) - 1,
            selector: selector.split_whitespace().collect::<Vec<_>>().join(" "),
        });
    }
    rules
}

/// Lint a stylesheet: unbalanced braces, unterminated comments and strings,
/// and a trailing selector with no declaration block. Never fails; an empty
/// list means no problems were found.
pub fn validate_css_syntax(css: &str) -> Vec<String> {
    let mut problems = Vec::new();
    let mut open_braces: Vec<usize> = Vec::new();
    let mut line = 1;
    let mut comment_start: Option<usize> = None;
    let mut quote: Option<(char, usize)> = None;
    let mut pending = String::new();
    let mut chars = css.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
        }
        if comment_start.is_some() {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                comment_start = None;
            }
            continue;
        }
        if let Some((q, opened)) = quote {
            if c == '\\' {
                chars.next();
            } else if c == q {
                quote = None;
            } else if c == '\n' {
                problems.push(format!("unterminated string opened at line {opened}"));
                quote = None;
            }
            continue;
        }
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                comment_start = Some(line);
            }
            '"' | '\'' => quote = Some((c, line)),
            '{' => {
                open_braces.push(line);
                pending.clear();
            }
            '}' => {
                if open_braces.pop().is_none() {
                    problems.push(format!("unbalanced '}}' at line {line}"));
                }
                pending.clear();
            }
            ';' => pending.clear(),
            _ => pending.push(c),
        }
    }

    if let Some(opened) = comment_start {
        problems.push(format!("unterminated comment opened at line {opened}"));
    }
    if let Some((_, opened)) = quote {
        problems.push(format!("unterminated string opened at line {opened}"));
    }
    for opened in open_braces {
        problems.push(format!("unclosed '{{' opened at line {opened}"));
    }
    let dangling = pending.trim();
    if !dangling.is_empty() {
        problems.push(format!("dangling selector without a declaration block: `{dangling}`"));
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisEngine;
    use crate::model::SourceDocument;

    fn docs(pages: &[(&str, &str)]) -> Vec<AnalyzedDocument> {
        let sources = pages
            .iter()
            .map(|(name, text)| SourceDocument::new(*name, *text))
            .collect();
        AnalysisEngine::new().analyze_all(sources)
    }

    #[test]
    fn entries_follow_route_then_block_order() {
        let corpus = docs(&[
            ("index.html", "<style>\n.z { color: red; }\n</style>\n<p>x</p>\n<style>\n.a { color: blue; }\n</style>"),
            ("about.html", "<style>\n.m { color: green; }\n</style>"),
        ]);
        let plan = consolidate_css(&corpus);
        assert!(plan.preserve_order);
        assert_eq!(plan.target_file, "app/globals.css");
        let order: Vec<(&str, usize)> = plan
            .entries
            .iter()
            .map(|e| (e.source_file.as_str(), e.block.start_line))
            .collect();
        assert_eq!(order, vec![("index.html", 1), ("index.html", 5), ("about.html", 1)]);
    }

    #[test]
    fn rendering_is_deterministic_and_order_sensitive() {
        let a = ("a.html", "<style>\np { color: red; }\n</style>");
        let b = ("b.html", "<style>\np { color: blue; }\n</style>");
        let forward = render_stylesheet(&consolidate_css(&docs(&[a, b])));
        let again = render_stylesheet(&consolidate_css(&docs(&[a, b])));
        let reversed = render_stylesheet(&consolidate_css(&docs(&[b, a])));
        assert_eq!(forward, again);
        assert_ne!(forward, reversed);
        assert!(forward.find("red").unwrap() < forward.find("blue").unwrap());
    }

    #[test]
    fn stylesheet_has_provenance_and_no_style_tags() {
        let plan = consolidate_css(&docs(&[("index.html", "<p>x</p>\n<style media=\"all\">\nbody { margin: 0; }\n</style>")]));
        let css = render_stylesheet(&plan);
        assert_eq!(css, "/* index.html:2-4 (custom) */\nbody { margin: 0; }\n");
    }

    fn body_of(text: &str) -> String {
        let blocks = crate::analysis::extract_css_blocks(text);
        css_body(&blocks[0]).to_string()
    }

    #[test]
    fn one_line_block_body() {
        assert_eq!(body_of("<style>a{b:c}</style>"), "a{b:c}");
        assert_eq!(body_of("<style>\n\n</style>"), "");
        assert_eq!(body_of("<style>\nx{}\n"), "x{}");
    }

    #[test]
    fn style_sharing_a_line_keeps_markup_out() {
        let plan = consolidate_css(&docs(&[(
            "index.html",
            "<html>\n<head><meta charset=\"utf-8\"><style>body{margin:0}</style><link rel=\"icon\" href=\"/f.ico\"></head>",
        )]));
        assert_eq!(render_stylesheet(&plan), "/* index.html:2-2 (inline) */\nbody{margin:0}\n");
    }

    #[test]
    fn two_styles_on_one_line_emit_each_body_once() {
        let plan = consolidate_css(&docs(&[(
            "a.html",
            "<style>a{color:red}</style><style>b{color:blue}</style>",
        )]));
        let css = render_stylesheet(&plan);
        assert_eq!(
            css,
            "/* a.html:1-1 (inline) */\na{color:red}\n\n/* a.html:1-1 (inline) */\nb{color:blue}\n"
        );
        assert!(!css.contains("<style"));
    }

    #[test]
    fn duplicate_tokens_warn_and_last_wins() {
        let plan = consolidate_css(&docs(&[
            ("index.html", "<style>\n:root { --accent: #f00; --gap: 8px; }\n</style>"),
            ("about.html", "<style>\n:root {\n  --accent: #00f;\n}\n</style>"),
        ]));
        assert_eq!(plan.custom_properties.get("--accent").map(String::as_str), Some("#00f"));
        assert_eq!(plan.custom_properties.get("--gap").map(String::as_str), Some("8px"));
        assert_eq!(plan.warnings.len(), 1);
        assert!(plan.warnings[0].contains("--accent"));
        assert!(plan.warnings[0].contains("about.html:3"));
        assert!(plan.warnings[0].contains("index.html:2"));
    }

    #[test]
    fn var_usage_is_not_a_definition() {
        let plan = consolidate_css(&docs(&[("a.html", "<style>\na { color: var(--accent); }\n</style>")]));
        assert!(plan.custom_properties.is_empty());
    }

    #[test]
    fn framer_rules_located() {
        let plan = consolidate_css(&docs(&[(
            "index.html",
            "<style data-framer-css-ssr>\nbody { margin: 0; }\n.framer-abc .framer-x {\n  opacity: 1;\n}\n</style>",
        )]));
        let rules = identify_framer_styles(&plan);
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].selector, ".framer-abc .framer-x");
        assert_eq!(rules[0].line, 3);
    }

    #[test]
    fn syntax_lint() {
        assert!(validate_css_syntax("a { color: red; }\n@import url(x.css);").is_empty());
        assert!(validate_css_syntax("a { content: \"}\"; }").is_empty());
        let problems = validate_css_syntax("a { color: red;\nb }\n}\n/* open");
        assert!(problems.iter().any(|p| p.contains("unbalanced")));
        assert!(problems.iter().any(|p| p.contains("unterminated comment")));
        let problems = validate_css_syntax("a { x: 1 }\n.orphan");
        assert_eq!(problems, vec!["dangling selector without a declaration block: `.orphan`".to_string()]);
        assert!(validate_css_syntax("a {\n").iter().any(|p| p.contains("line 1")));
    }
}
