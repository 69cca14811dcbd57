//! Migration planning: routes, extraction commands and the aggregate plan.
//!
//! A plan is only built from analyses whose declared line counts agree with
//! every range they reference. Commands are emitted per document in route
//! order: CSS blocks, script blocks, canonical component extractions, then
//! the page body.

use crate::analysis::markup::build_tree;
use crate::catalog::{self, ASSET_MANIFEST};
use crate::css::{self, GLOBALS_CSS};
use crate::error::{Inconsistency, MigrationError, Result};
use crate::mapper::{self, COMPONENTS_DIR};
use crate::model::*;
use crate::naming::{slug, unique_name};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Staging area for raw extracts, relative to the project root.
pub const STAGING_DIR: &str = ".migration/extracts";

/// Root layout file, relative to the project root.
pub const LAYOUT: &str = "app/layout.tsx";

const APP_DIR: &str = "app";

/// Literal extraction command for lines `[start, end]` of `source`.
///
/// A pure function of its arguments: skips `start - 1` lines and takes
/// `end - start + 1`.
pub fn generate_extract_command(source: &str, start: usize, end: usize) -> String {
    format!(
        "Get-Content \"{}\" | Select-Object -Skip {} -First {} | Set-Content \"temp_extract.txt\"",
        source,
        start.saturating_sub(1),
        (end + 1).saturating_sub(start)
    )
}

/// Every analysis whose `total_lines` is below a line it references.
pub fn check_consistency(docs: &[AnalyzedDocument]) -> Result<()> {
    let bad: Vec<Inconsistency> = docs
        .iter()
        .filter_map(|d| {
            let max = d.analysis.max_referenced_line();
            (max > d.analysis.total_lines).then(|| Inconsistency {
                file: d.analysis.file_name.clone(),
                total_lines: d.analysis.total_lines,
                max_end_line: max,
            })
        })
        .collect();
    if bad.is_empty() {
        Ok(())
    } else {
        Err(MigrationError::PlanInconsistency(bad))
    }
}

/// Route and page file for each document, in input order.
///
/// `index.html` → `/`, `about.html` → `/about`, `blog/post.html` →
/// `/blog/post`, `docs/index.html` → `/docs`. Two documents mapping to the
/// same route get a numeric suffix on the second, reported as a warning.
pub fn plan_route_structure(files: &[String]) -> (Vec<RouteMapping>, Vec<MigrationWarning>) {
    let mut taken: HashSet<String> = HashSet::new();
    let mut warnings = Vec::new();
    let routes = files
        .iter()
        .map(|file| {
            let without_ext = file
                .strip_suffix(".html")
                .or_else(|| file.strip_suffix(".htm"))
                .unwrap_or(file);
            let mut segments: Vec<String> = without_ext
                .split('/')
                .map(slug)
                .filter(|s| !s.is_empty())
                .collect();
            if segments.last().is_some_and(|s| s == "index") {
                segments.pop();
            }
            let base = segments.join("/");
            let joined = unique_name(&base, &mut taken);
            if joined != base {
                warn!(file = %file, route = %format!("/{base}"), "route already taken, using /{joined}");
                warnings.push(MigrationWarning {
                    kind: WarningKind::ManualFixRequired,
                    file: file.clone(),
                    line: None,
                    message: format!("route /{base} is already taken; page moved to /{joined}"),
                    suggestion: Some("rename the document or fix links to the new route".to_string()),
                });
            }
            let (route_path, page_path) = if joined.is_empty() {
                ("/".to_string(), format!("{APP_DIR}/page.tsx"))
            } else {
                (format!("/{joined}"), format!("{APP_DIR}/{joined}/page.tsx"))
            };
            RouteMapping {
                source_file: file.clone(),
                route_path,
                page_path,
            }
        })
        .collect();
    (routes, warnings)
}

pub fn plan_component_extractions(
    docs: &[AnalyzedDocument],
) -> (Vec<ComponentExtractionPlan>, Vec<MigrationWarning>) {
    mapper::create_extraction_plans(docs)
}

pub fn plan_css_consolidation(docs: &[AnalyzedDocument]) -> CssConsolidationPlan {
    css::consolidate_css(docs)
}

/// Lines of the page body: inside `<body>` when present, else the whole
/// document. `None` for an empty document.
pub fn page_body_range(text: &str, total_lines: usize) -> Option<(usize, usize)> {
    if total_lines == 0 {
        return None;
    }
    let tree = build_tree(text);
    let Some(body) = tree.elements.iter().find(|e| e.name == "body") else {
        return Some((1, total_lines));
    };
    if body.closed && body.end_line >= body.start_line + 2 {
        Some((body.start_line + 1, body.end_line - 1))
    } else {
        Some((body.start_line, body.end_line))
    }
}

/// Build the complete plan for `docs`, given in route order.
///
/// Runs reuse detection and categorization on the documents first.
pub fn create_migration_plan(docs: &mut [AnalyzedDocument]) -> Result<MigrationPlan> {
    check_consistency(docs)?;

    mapper::identify_reusable_components(docs);
    mapper::classify_components(docs);

    let source_files: Vec<String> = docs.iter().map(|d| d.analysis.file_name.clone()).collect();
    let (route_mapping, mut warnings) = plan_route_structure(&source_files);
    let (component_extractions, skipped) = plan_component_extractions(docs);
    warnings.extend(skipped);
    let css_consolidation = plan_css_consolidation(docs);
    let asset_manifest =
        catalog::prepare_for_next_js_optimization(catalog::catalog_all_assets(docs));

    let commands = plan_commands(docs, &component_extractions);

    let mut component_files: Vec<String> = Vec::new();
    for plan in component_extractions.iter().filter(|p| p.canonical) {
        if !component_files.contains(&plan.destination) {
            component_files.push(plan.destination.clone());
        }
    }
    let target_structure = TargetStructure {
        globals_css: GLOBALS_CSS.to_string(),
        layout: LAYOUT.to_string(),
        components_dir: COMPONENTS_DIR.to_string(),
        pages: route_mapping.iter().map(|r| r.page_path.clone()).collect(),
        component_files,
        asset_manifest: ASSET_MANIFEST.to_string(),
    };

    info!(
        documents = source_files.len(),
        commands = commands.len(),
        components = target_structure.component_files.len(),
        assets = asset_manifest.len(),
        "migration plan ready"
    );
    Ok(MigrationPlan {
        source_files,
        target_structure,
        commands,
        component_extractions,
        css_consolidation,
        route_mapping,
        asset_manifest,
        warnings,
    })
}

fn plan_commands(
    docs: &[AnalyzedDocument],
    extractions: &[ComponentExtractionPlan],
) -> Vec<PowerShellCommand> {
    let mut commands = Vec::new();
    let mut stems: HashSet<String> = HashSet::new();

    for doc in docs {
        let file = doc.analysis.file_name.as_str();
        let base = file
            .strip_suffix(".html")
            .or_else(|| file.strip_suffix(".htm"))
            .unwrap_or(file);
        let dir = unique_name(&slug(base), &mut stems);
        let mut names: HashSet<String> = HashSet::new();
        let mut push = |purpose: CommandPurpose,
                        start: usize,
                        end: usize,
                        name: String,
                        ext: &str,
                        columns: Option<(usize, usize)>| {
            // Regions sharing a line share a range; their files must not
            let mut unique = name.clone();
            let mut n = 2;
            while !names.insert(unique.clone()) {
                unique = format!("{name}-{n}");
                n += 1;
            }
            let name = unique;
            commands.push(PowerShellCommand {
                purpose,
                source: file.to_string(),
                target: format!("{STAGING_DIR}/{dir}/{name}.{ext}"),
                start_line: start,
                end_line: end,
                text: generate_extract_command(file, start, end),
                columns,
            });
        };

        for block in &doc.analysis.css_blocks {
            push(
                CommandPurpose::Css,
                block.start_line,
                block.end_line,
                format!("css-{}-{}", block.start_line, block.end_line),
                "css",
                Some(block.columns()),
            );
        }
        for block in &doc.analysis.js_blocks {
            push(
                CommandPurpose::Script,
                block.start_line,
                block.end_line,
                format!("script-{}-{}", block.start_line, block.end_line),
                "js",
                Some(block.columns()),
            );
        }
        for plan in extractions.iter().filter(|p| p.canonical && p.source_file == file) {
            push(
                CommandPurpose::Component,
                plan.boundary.start_line,
                plan.boundary.end_line,
                format!("component-{}", plan.name),
                "html",
                None,
            );
        }
        if let Some((start, end)) = page_body_range(&doc.source.content, doc.analysis.total_lines) {
            push(CommandPurpose::Page, start, end, format!("page-{start}-{end}"), "html", None);
        }
    }
    debug!(commands = commands.len(), "extraction commands generated");
    commands
}
