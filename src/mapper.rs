//! Cross-document component mapping: reuse detection, categorization,
//! extraction plans and scaffold generation.
//!
//! Reuse is decided by structural signature alone, so the same card or nav
//! authored in several documents maps to one shared component file.

use crate::lines::slice_lines;
use crate::model::*;
use crate::naming::{document_stem, pascal_case, unique_name};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Root of generated component files, relative to the project root.
pub const COMPONENTS_DIR: &str = "components";

static RE_NAVIGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^<nav\b|\brole\s*=\s*["']?navigation\b|\b(?:class|id|aria-label|data-framer-name)\s*=\s*["'][^"']*\b(?:nav|navbar|navigation|menu|menubar)\b"#)
        .unwrap()
});

static RE_INTERACTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)data-framer-appear-id|data-motion|framer-motion|<motion\.|will-change|data-highlight\s*=\s*["']?true|<(?:button|form|input|select|textarea|dialog)\b|\bon(?:click|submit|change)\s*="#)
        .unwrap()
});

static RE_LAYOUT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^<(?:header|footer|main|aside|ul|ol)\b|\brole\s*=\s*["']?(?:banner|contentinfo|main|complementary)\b|\bclass\s*=\s*["'][^"']*\b(?:grid|list|row|columns|stack|container|layout)\b"#)
        .unwrap()
});

static DEPENDENCY_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"<motion\.|data-framer-appear-id|\bframer-motion\b").unwrap(),
            r#"import { motion } from "framer-motion""#,
        ),
        (Regex::new(r"<Image\b").unwrap(), r#"import Image from "next/image""#),
        (Regex::new(r"<Link\b").unwrap(), r#"import Link from "next/link""#),
        (
            Regex::new(r"\{\{[^}]*\}\}|=\{[^}]*\}").unwrap(),
            r#"import React from "react""#,
        ),
    ]
});

/// Boundaries sharing one structural signature across documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReuseGroup {
    pub signature: String,
    /// `(source file, boundary name)` in corpus order
    pub members: Vec<(String, String)>,
}

impl ReuseGroup {
    pub fn document_count(&self) -> usize {
        self.members
            .iter()
            .map(|(file, _)| file.as_str())
            .collect::<HashSet<_>>()
            .len()
    }
}

// -- Reuse --------------------------------------------------------------------

/// Group every boundary (nested ones included) by signature and mark the
/// members of groups spanning two or more documents as reusable.
///
/// Returns the reusable groups in order of first appearance.
pub fn identify_reusable_components(docs: &mut [AnalyzedDocument]) -> Vec<ReuseGroup> {
    let mut groups: HashMap<String, ReuseGroup> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for doc in docs.iter() {
        let mut all = Vec::new();
        for b in &doc.analysis.components {
            b.walk(&mut all);
        }
        for b in all {
            let group = groups.entry(b.signature.clone()).or_insert_with(|| {
                order.push(b.signature.clone());
                ReuseGroup {
                    signature: b.signature.clone(),
                    members: Vec::new(),
                }
            });
            group
                .members
                .push((doc.analysis.file_name.clone(), b.name.clone()));
        }
    }

    let reusable: HashSet<String> = groups
        .values()
        .filter(|g| g.document_count() >= 2)
        .map(|g| g.signature.clone())
        .collect();

    for doc in docs.iter_mut() {
        for_each_boundary_mut(&mut doc.analysis.components, &mut |b| {
            b.is_reusable = reusable.contains(&b.signature);
        });
    }

    let result: Vec<ReuseGroup> = order
        .into_iter()
        .filter(|sig| reusable.contains(sig))
        .filter_map(|sig| groups.remove(&sig))
        .collect();
    debug!(groups = result.len(), "reusable component groups");
    result
}

fn for_each_boundary_mut(items: &mut [ComponentBoundary], f: &mut impl FnMut(&mut ComponentBoundary)) {
    for item in items {
        f(item);
        for_each_boundary_mut(&mut item.children, f);
    }
}

// -- Categorization -----------------------------------------------------------

/// Rule-based category from the opening tag and the boundary's markup.
///
/// Precedence: navigation, interactive, layout, content. Pure, so repeated
/// calls always agree.
pub fn categorize(boundary: &ComponentBoundary, markup: &str) -> ComponentCategory {
    if RE_NAVIGATION.is_match(&boundary.start_tag) {
        ComponentCategory::Navigation
    } else if RE_INTERACTIVE.is_match(markup) {
        ComponentCategory::Interactive
    } else if RE_LAYOUT_TAG.is_match(&boundary.start_tag)
        || boundary.children.iter().any(|c| c.repeat_count >= 2)
    {
        ComponentCategory::Layout
    } else {
        ComponentCategory::Content
    }
}

/// Assign a category to every boundary in every document.
pub fn classify_components(docs: &mut [AnalyzedDocument]) {
    for doc in docs.iter_mut() {
        let text = doc.source.content.as_str();
        for_each_boundary_mut(&mut doc.analysis.components, &mut |b| {
            let markup = slice_lines(text, b.start_line, b.end_line).unwrap_or_default();
            b.category = Some(categorize(b, &markup));
        });
    }
}

fn components_in<'a>(
    docs: &'a [AnalyzedDocument],
    category: ComponentCategory,
) -> Vec<(&'a str, &'a ComponentBoundary)> {
    let mut out = Vec::new();
    for doc in docs {
        let mut all = Vec::new();
        for b in &doc.analysis.components {
            b.walk(&mut all);
        }
        for b in all {
            let markup = slice_lines(&doc.source.content, b.start_line, b.end_line).unwrap_or_default();
            if categorize(b, &markup) == category {
                out.push((doc.analysis.file_name.as_str(), b));
            }
        }
    }
    out
}

pub fn identify_navigation_components(docs: &[AnalyzedDocument]) -> Vec<(&str, &ComponentBoundary)> {
    components_in(docs, ComponentCategory::Navigation)
}

pub fn identify_layout_components(docs: &[AnalyzedDocument]) -> Vec<(&str, &ComponentBoundary)> {
    components_in(docs, ComponentCategory::Layout)
}

pub fn identify_content_components(docs: &[AnalyzedDocument]) -> Vec<(&str, &ComponentBoundary)> {
    components_in(docs, ComponentCategory::Content)
}

pub fn identify_interactive_components(docs: &[AnalyzedDocument]) -> Vec<(&str, &ComponentBoundary)> {
    components_in(docs, ComponentCategory::Interactive)
}

// -- Extraction plans ---------------------------------------------------------

/// One plan per top-level boundary, in corpus order, plus a warning for
/// every boundary that could not be sliced from its document.
///
/// Later occurrences of a reusable component point at the first one's file
/// and are marked non-canonical.
pub fn create_extraction_plans(
    docs: &[AnalyzedDocument],
) -> (Vec<ComponentExtractionPlan>, Vec<MigrationWarning>) {
    let mut plans = Vec::new();
    let mut warnings = Vec::new();
    let mut canonical: HashMap<&str, (String, String)> = HashMap::new();
    let mut taken: HashSet<String> = HashSet::new();

    for doc in docs {
        let file = doc.analysis.file_name.as_str();
        for b in &doc.analysis.components {
            let Some(markup) = slice_lines(&doc.source.content, b.start_line, b.end_line) else {
                warn!(file, component = %b.name, "boundary outside document, skipped");
                warnings.push(MigrationWarning {
                    kind: WarningKind::ManualFixRequired,
                    file: file.to_string(),
                    line: Some(b.start_line),
                    message: format!(
                        "component {} (lines {}-{}) lies outside the document and was not extracted",
                        b.name, b.start_line, b.end_line
                    ),
                    suggestion: None,
                });
                continue;
            };
            let dependencies = detect_dependencies(&markup);

            if b.is_reusable {
                if let Some((name, destination)) = canonical.get(b.signature.as_str()) {
                    plans.push(ComponentExtractionPlan {
                        name: name.clone(),
                        source_file: file.to_string(),
                        boundary: b.clone(),
                        destination: destination.clone(),
                        wrapper_template: generate_component_template(name, &markup, &dependencies),
                        dependencies,
                        canonical: false,
                    });
                    continue;
                }
            }

            let category = b.category.unwrap_or_else(|| categorize(b, &markup));
            let name = if taken.contains(&b.name) {
                let prefixed = format!("{}{}", pascal_case(document_stem(file)), b.name);
                unique_name(&prefixed, &mut taken)
            } else {
                unique_name(&b.name, &mut taken)
            };
            let destination = format!("{COMPONENTS_DIR}/{category}/{name}.tsx");
            if b.is_reusable {
                canonical.insert(b.signature.as_str(), (name.clone(), destination.clone()));
            }
            plans.push(ComponentExtractionPlan {
                wrapper_template: generate_component_template(&name, &markup, &dependencies),
                name,
                source_file: file.to_string(),
                boundary: b.clone(),
                destination,
                dependencies,
                canonical: true,
            });
        }
    }
    (plans, warnings)
}

/// Imports required by foreign syntax embedded in `markup`, in rule order.
pub fn detect_dependencies(markup: &str) -> Vec<String> {
    DEPENDENCY_RULES
        .iter()
        .filter(|(re, _)| re.is_match(markup))
        .map(|(_, import)| import.to_string())
        .collect()
}

/// Component scaffold: one `;`-terminated import per dependency, a blank
/// line, then a parameterless default export returning `html` verbatim.
pub fn generate_component_template(name: &str, html: &str, deps: &[String]) -> String {
    let mut out = String::new();
    for dep in deps {
        out.push_str(dep.trim_end().trim_end_matches(';'));
        out.push_str(";\n");
    }
    if !deps.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!("export default function {name}() {{\n  return (\n"));
    out.push_str(html);
    out.push_str("\n  );\n}\n");
    out
}
