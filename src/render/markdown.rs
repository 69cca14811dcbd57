//! GitHub-flavored markdown renderer for terminal reading and PR comments.

use crate::model::*;
use crate::pipeline::MigrationOutcome;
use crate::render::Renderer;

pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render_analysis(&self, analyses: &[HtmlAnalysis]) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push("# Analysis\n".to_string());

        if analyses.len() > 1 {
            lines.push("## Index\n".to_string());
            for a in analyses {
                lines.push(format!("* [{}](#{})", a.file_name, anchor(&a.file_name)));
            }
            lines.push(String::new());
        }

        for a in analyses {
            lines.push(render_document(a));
        }
        lines.join("\n")
    }

    fn render_plan(&self, plan: &MigrationPlan) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push("# Migration plan\n".to_string());
        lines.push(format!(
            "{} source file(s), {} command(s), {} component file(s), {} asset(s).\n",
            plan.source_files.len(),
            plan.commands.len(),
            plan.target_structure.component_files.len(),
            plan.asset_manifest.len()
        ));

        lines.push("## Routes\n".to_string());
        lines.push("| Source | Route | Page |".to_string());
        lines.push("|---|---|---|".to_string());
        for r in &plan.route_mapping {
            lines.push(format!("| {} | `{}` | {} |", cell(&r.source_file), r.route_path, r.page_path));
        }
        lines.push(String::new());

        if !plan.component_extractions.is_empty() {
            lines.push("## Components\n".to_string());
            lines.push("| Component | Source | Lines | Destination | Shared |".to_string());
            lines.push("|---|---|---|---|---|".to_string());
            for p in &plan.component_extractions {
                lines.push(format!(
                    "| {} | {} | {}-{} | {} | {} |",
                    p.name,
                    cell(&p.source_file),
                    p.boundary.start_line,
                    p.boundary.end_line,
                    p.destination,
                    if p.boundary.is_reusable { "yes" } else { "" }
                ));
            }
            lines.push(String::new());
        }

        let css = &plan.css_consolidation;
        lines.push(format!("## Stylesheet ({})\n", css.target_file));
        if css.entries.is_empty() {
            lines.push("_No inline styles._\n".to_string());
        } else {
            for (i, e) in css.entries.iter().enumerate() {
                lines.push(format!(
                    "{}. {}:{}-{}",
                    i + 1,
                    e.source_file,
                    e.block.start_line,
                    e.block.end_line
                ));
            }
            lines.push(String::new());
        }
        for w in &css.warnings {
            lines.push(format!("> {w}"));
        }
        if !css.warnings.is_empty() {
            lines.push(String::new());
        }

        if !plan.warnings.is_empty() {
            lines.push("## Warnings\n".to_string());
            for w in &plan.warnings {
                lines.push(format!("* {}: {}", cell(&w.file), w.message));
            }
            lines.push(String::new());
        }

        lines.push("## Commands\n".to_string());
        lines.push("```powershell".to_string());
        for cmd in &plan.commands {
            lines.push(cmd.text.clone());
        }
        lines.push("```\n".to_string());

        if !plan.asset_manifest.is_empty() {
            lines.push("## Assets\n".to_string());
            for (kind, assets) in &plan.asset_manifest.groups {
                lines.push(format!("* {}: {}", kind.as_str(), assets.len()));
            }
            lines.push(String::new());
        }
        lines.join("\n")
    }

    fn render_outcome(&self, outcome: &MigrationOutcome) -> String {
        let mut lines: Vec<String> = Vec::new();
        let v = &outcome.validation;
        lines.push("# Migration report\n".to_string());
        lines.push(format!(
            "**Status:** {} (phase: {})\n",
            if v.passed { "passed" } else { "blocked" },
            outcome.state.phase
        ));

        if let Some(exec) = &outcome.execution {
            lines.push(format!(
                "Commands: {} completed, {} failed. Files written: {}.\n",
                exec.completed_commands.len(),
                exec.failed_commands.len(),
                exec.written_files.len()
            ));
        }

        for severity in [Severity::Blocking, Severity::Cosmetic, Severity::Informational] {
            let entries = v.report.by_severity(severity);
            if entries.is_empty() {
                continue;
            }
            lines.push(format!("## {} ({})\n", title(severity), entries.len()));
            for e in entries {
                let at = match e.line_range {
                    Some((s, end)) if s == end => format!("{}:{}", e.file, s),
                    Some((s, end)) => format!("{}:{}-{}", e.file, s, end),
                    None => e.file.clone(),
                };
                lines.push(format!("* `{}` {}", at, e.description));
            }
            lines.push(String::new());
        }
        if v.report.entries.is_empty() {
            lines.push("_Nothing left to clean up._\n".to_string());
        }
        lines.join("\n")
    }

    fn file_extension(&self) -> &str {
        "md"
    }
}

fn render_document(a: &HtmlAnalysis) -> String {
    let mut lines: Vec<String> = Vec::new();
    lines.push(format!("## {}\n", a.file_name));
    lines.push(format!(
        "{} lines, {} style block(s), {} script block(s), {} component(s), {} asset reference(s).\n",
        a.total_lines,
        a.css_blocks.len(),
        a.js_blocks.len(),
        a.components.len(),
        a.assets.len()
    ));

    if !a.css_blocks.is_empty() || !a.js_blocks.is_empty() {
        lines.push("#### Blocks\n".to_string());
        lines.push("| Kind | Lines | Type |".to_string());
        lines.push("|---|---|---|".to_string());
        for b in &a.css_blocks {
            lines.push(format!("| style | {}-{} | {:?} |", b.start_line, b.end_line, b.block_type));
        }
        for b in &a.js_blocks {
            lines.push(format!("| script | {}-{} | {:?} |", b.start_line, b.end_line, b.block_type));
        }
        lines.push(String::new());
    }

    if !a.components.is_empty() {
        lines.push("#### Components\n".to_string());
        for c in &a.components {
            push_component(&mut lines, c, 0);
        }
        lines.push(String::new());
    }

    if !a.warnings.is_empty() {
        lines.push("#### Warnings\n".to_string());
        for w in &a.warnings {
            lines.push(format!("* line {}: {}", w.line, w.message));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

fn push_component(lines: &mut Vec<String>, c: &ComponentBoundary, depth: usize) {
    let mut notes = Vec::new();
    if c.repeat_count > 1 {
        notes.push(format!("×{}", c.repeat_count));
    }
    if c.is_reusable {
        notes.push("shared".to_string());
    }
    if let Some(cat) = c.category {
        notes.push(cat.to_string());
    }
    let suffix = if notes.is_empty() {
        String::new()
    } else {
        format!(" ({})", notes.join(", "))
    };
    lines.push(format!(
        "{}* **{}** lines {}-{} `{}`{}",
        "  ".repeat(depth),
        c.name,
        c.start_line,
        c.end_line,
        c.start_tag.replace('`', "'"),
        suffix
    ));
    for child in &c.children {
        push_component(lines, child, depth + 1);
    }
}

fn title(severity: Severity) -> &'static str {
    match severity {
        Severity::Blocking => "Blocking",
        Severity::Cosmetic => "Cosmetic",
        Severity::Informational => "Informational",
    }
}

fn cell(text: &str) -> String {
    text.replace('|', "\\|")
}

/// GitHub heading anchor: lowercase, punctuation dropped, spaces to hyphens.
fn anchor(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == ' ' || *c == '-' || *c == '_')
        .map(|c| if c == ' ' { '-' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_follow_github_rules() {
        assert_eq!(anchor("blog/post.html"), "blogposthtml");
        assert_eq!(anchor("My Page.html"), "my-pagehtml");
    }

    #[test]
    fn plan_lists_warnings() {
        let plan = MigrationPlan {
            warnings: vec![MigrationWarning {
                kind: WarningKind::ManualFixRequired,
                file: "about/index.html".into(),
                line: None,
                message: "route /about is already taken; page moved to /about2".into(),
                suggestion: None,
            }],
            ..MigrationPlan::default()
        };
        let out = MarkdownRenderer.render_plan(&plan);
        assert!(out.contains("## Warnings"));
        assert!(out.contains("* about/index.html: route /about is already taken"));
    }

    #[test]
    fn outcome_groups_by_severity() {
        let mut report = CleanupReport::default();
        report.push(CleanupEntry {
            severity: Severity::Cosmetic,
            file: "components/layout/Nav.tsx".into(),
            line_range: Some((4, 4)),
            description: "`class` attribute must become `className`".into(),
        });
        let outcome = MigrationOutcome {
            plan: MigrationPlan::default(),
            execution: None,
            validation: ValidationResult {
                passed: true,
                report,
                ..ValidationResult::default()
            },
            state: crate::state::MigrationState::new(),
        };
        let out = MarkdownRenderer.render_outcome(&outcome);
        assert!(out.contains("**Status:** passed"));
        assert!(out.contains("## Cosmetic (1)"));
        assert!(out.contains("* `components/layout/Nav.tsx:4`"));
        assert!(!out.contains("## Blocking"));
    }
}
