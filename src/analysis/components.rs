//! Component boundary detection over the element tree.
//!
//! Candidates are semantic landmarks, labeled containers and repeated
//! sibling subtrees. Overlaps resolve outer-boundary-wins: a contained
//! candidate is recorded as a child of the enclosing one, never as an
//! independent top-level entry.

use super::markup::{build_tree, Element, ElementTree};
use crate::model::ComponentBoundary;
use crate::naming::{pascal_case, unique_name};
use std::collections::{HashMap, HashSet};
use tracing::debug;

const LANDMARK_TAGS: &[&str] = &[
    "nav", "header", "footer", "main", "aside", "section", "article", "form",
];

const LANDMARK_ROLES: &[&str] = &[
    "navigation", "banner", "contentinfo", "main", "complementary", "region", "search", "form",
];

/// Tags allowed to become labeled or repeated components.
const CONTAINER_TAGS: &[&str] = &[
    "div", "section", "article", "aside", "header", "footer", "nav", "main", "form", "ul", "ol",
    "li", "a", "figure", "dialog", "details", "button", "table",
];

const LABEL_ATTRS: &[&str] = &["data-framer-name", "aria-label", "id"];

/// A labeled or repeated container covering at least this share of the
/// document, with candidates below it, is a page wrapper and not a component.
const PAGE_WRAPPER_RATIO: f64 = 0.9;

/// Boundaries plus `(line, message)` warnings for unclosed candidates.
#[derive(Debug, Default)]
pub struct ComponentScan {
    pub components: Vec<ComponentBoundary>,
    pub warnings: Vec<(usize, String)>,
}

/// Top-level component boundaries of `text`; nested ones are children.
pub fn identify_components(text: &str) -> Vec<ComponentBoundary> {
    scan_components(text).components
}

pub fn scan_components(text: &str) -> ComponentScan {
    let tree = build_tree(text);
    let total = tree
        .elements
        .iter()
        .map(|e| e.end_line)
        .max()
        .unwrap_or(0);
    let repeats = sibling_repeats(&tree);

    let mut ctx = Context {
        tree: &tree,
        repeats: &repeats,
        total_lines: total,
        taken: HashSet::new(),
        warnings: Vec::new(),
    };
    let mut components = Vec::new();
    for &root in &tree.roots {
        ctx.collect(root, &mut components);
    }
    let components = resolve_overlaps(components);
    ComponentScan {
        components,
        warnings: ctx.warnings,
    }
}

struct Context<'a> {
    tree: &'a ElementTree,
    repeats: &'a HashMap<usize, usize>,
    total_lines: usize,
    taken: HashSet<String>,
    warnings: Vec<(usize, String)>,
}

impl Context<'_> {
    /// Push the boundaries found at or below `idx` into `out`.
    fn collect(&mut self, idx: usize, out: &mut Vec<ComponentBoundary>) {
        let tree = self.tree;
        let el = &tree.elements[idx];
        let mut below = Vec::new();
        for &child in &el.children {
            self.collect(child, &mut below);
        }

        let repeat_count = self.repeats.get(&idx).copied().unwrap_or(1);
        if !self.is_candidate(el, repeat_count, !below.is_empty()) {
            out.extend(below);
            return;
        }

        if !el.closed {
            self.warnings.push((
                el.start_line,
                format!(
                    "component <{}> opened at line {} is never closed; boundary runs to end of file",
                    el.name, el.start_line
                ),
            ));
        }

        let name = unique_name(&component_label(el), &mut self.taken);
        out.push(ComponentBoundary {
            name,
            start_line: el.start_line,
            end_line: el.end_line,
            start_tag: el.open_tag.clone(),
            end_tag: el.end_tag(),
            signature: el.signature.clone(),
            is_reusable: false,
            category: None,
            repeat_count,
            children: resolve_overlaps(below),
        });
    }

    fn is_candidate(&self, el: &Element, repeat_count: usize, has_nested: bool) -> bool {
        if matches!(el.name.as_str(), "html" | "head" | "body") {
            return false;
        }
        if is_landmark(el) {
            return true;
        }
        if !CONTAINER_TAGS.contains(&el.name.as_str()) || el.children.is_empty() {
            return false;
        }
        let labeled = LABEL_ATTRS.iter().any(|a| el.attr(a).is_some_and(|v| !v.is_empty()));
        if !labeled && repeat_count < 2 {
            return false;
        }
        let span = (el.end_line - el.start_line + 1) as f64;
        let wrapper = has_nested && span >= PAGE_WRAPPER_RATIO * self.total_lines as f64;
        !wrapper
    }
}

pub(crate) fn is_landmark(el: &Element) -> bool {
    LANDMARK_TAGS.contains(&el.name.as_str())
        || el.attr("role").is_some_and(|r| LANDMARK_ROLES.contains(&r))
}

/// Human-ish label: explicit label attribute, then role, class, tag.
fn component_label(el: &Element) -> String {
    let label = LABEL_ATTRS
        .iter()
        .filter_map(|a| el.attr(a))
        .find(|v| !v.trim().is_empty())
        .or_else(|| el.attr("role"))
        .or_else(|| el.classes().into_iter().find(|c| !c.starts_with("framer-v-")))
        .unwrap_or(el.name.as_str());
    pascal_case(label)
}

/// Number of same-signature siblings for every element with a non-leaf subtree.
fn sibling_repeats(tree: &ElementTree) -> HashMap<usize, usize> {
    let mut repeats = HashMap::new();
    let parents = std::iter::once(None).chain((0..tree.elements.len()).map(Some));
    for parent in parents {
        let siblings = tree.children_of(parent);
        let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
        for &s in siblings {
            if !tree.elements[s].children.is_empty() {
                groups
                    .entry(tree.elements[s].signature.as_str())
                    .or_default()
                    .push(s);
            }
        }
        for members in groups.values().filter(|m| m.len() >= 2) {
            for &m in members {
                repeats.insert(m, members.len());
            }
        }
    }
    repeats
}

/// Make sibling boundaries line-disjoint.
///
/// Sorted by start (outer first on ties). A boundary whose lines fall inside
/// an accepted one becomes its child; a partial line overlap is dropped.
fn resolve_overlaps(mut items: Vec<ComponentBoundary>) -> Vec<ComponentBoundary> {
    items.sort_by(|a, b| {
        a.start_line
            .cmp(&b.start_line)
            .then_with(|| b.end_line.cmp(&a.end_line))
    });
    let mut accepted: Vec<ComponentBoundary> = Vec::with_capacity(items.len());
    for item in items {
        let Some(last) = accepted.last_mut() else {
            accepted.push(item);
            continue;
        };
        if last.contains(&item) {
            let mut children = std::mem::take(&mut last.children);
            children.push(item);
            last.children = resolve_overlaps(children);
        } else if last.overlaps(item.start_line, item.end_line) {
            debug!(
                dropped = %item.name,
                kept = %last.name,
                "boundary shares lines with a sibling"
            );
        } else {
            accepted.push(item);
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flatten(items: &[ComponentBoundary]) -> Vec<&ComponentBoundary> {
        let mut out = Vec::new();
        for item in items {
            item.walk(&mut out);
        }
        out
    }

    #[test]
    fn finds_landmarks() {
        let text = "<body>\n<nav>\n<a href=\"/\">Home</a>\n</nav>\n<main>\n<p>x</p>\n</main>\n</body>";
        let comps = identify_components(text);
        let names: Vec<&str> = comps.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Nav", "Main"]);
        assert_eq!((comps[0].start_line, comps[0].end_line), (2, 4));
        assert_eq!((comps[1].start_line, comps[1].end_line), (5, 7));
    }

    #[test]
    fn nested_candidates_become_children() {
        let text = "<section id=\"hero\">\n<nav aria-label=\"Primary\">\n<a>x</a>\n</nav>\n</section>\n<footer>\n<p>f</p>\n</footer>";
        let comps = identify_components(text);
        assert_eq!(comps.len(), 2);
        assert_eq!(comps[0].name, "Hero");
        assert_eq!(comps[0].children.len(), 1);
        assert_eq!(comps[0].children[0].name, "Primary");
    }

    #[test]
    fn repeated_cards_detected() {
        let card = |t: &str| format!("<div class=\"card\">\n<h3>{t}</h3>\n</div>");
        let text = format!("<div>\n{}\n{}\n{}\n</div>\n<p>tail</p>\n<p>tail</p>\n<p>tail</p>", card("a"), card("b"), card("c"));
        let comps = identify_components(&text);
        assert_eq!(comps.len(), 3);
        assert!(comps.iter().all(|c| c.repeat_count == 3));
        assert_eq!(comps[0].name, "Card");
        assert_eq!(comps[1].name, "Card2");
        assert_eq!(comps[0].signature, comps[1].signature);
    }

    #[test]
    fn unlabeled_unique_divs_are_ignored() {
        assert!(identify_components("<div>\n<div><p>x</p></div>\n</div>").is_empty());
    }

    #[test]
    fn page_wrapper_is_skipped() {
        let text = "<div id=\"root\">\n<header>\n<p>h</p>\n</header>\n<footer>\n<p>f</p>\n</footer>\n</div>";
        let comps = identify_components(text);
        let names: Vec<&str> = comps.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Header", "Footer"]);
    }

    #[test]
    fn siblings_sharing_a_line_stay_disjoint() {
        let text = "<nav>\n<a>x</a>\n</nav><footer>\n<p>f</p>\n</footer>";
        let comps = identify_components(text);
        for pair in comps.windows(2) {
            assert!(pair[0].end_line < pair[1].start_line);
        }
    }

    #[test]
    fn boundaries_valid_and_disjoint() {
        let text = std::fs::read_to_string(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/tests/fixtures/site/index.html"
        ))
        .unwrap();
        let comps = identify_components(&text);
        assert!(!comps.is_empty());
        for c in flatten(&comps) {
            assert!(c.start_line > 0 && c.end_line >= c.start_line);
        }
        for pair in comps.windows(2) {
            assert!(pair[0].end_line < pair[1].start_line);
        }
    }

    #[test]
    fn unclosed_component_warns() {
        let scan = scan_components("<p>a</p>\n<nav>\n<a>x</a>\n");
        assert_eq!(scan.components.len(), 1);
        assert_eq!(scan.components[0].end_line, 3);
        assert_eq!(scan.warnings.len(), 1);
    }
}
