//! Post-execution validation.
//!
//! Three suites (structural, content, functional) each produce cleanup
//! entries; `run_all` merges them with the execution findings into one
//! severity-bucketed report.

use crate::analysis::markup::build_tree;
use crate::catalog::validate_asset_existence;
use crate::config::MigrationConfig;
use crate::css::validate_css_syntax;
use crate::error::MigrationError;
use crate::executor::{kept_page_text, page_parts, verify_extract};
use crate::lines::slice_lines;
use crate::model::*;
use regex::Regex;
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{LazyLock, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// One build at a time per process.
static BUILD_LOCK: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

const BUILD_POLL: Duration = Duration::from_millis(50);

/// Bytes of build output kept in a failure description.
const BUILD_OUTPUT_TAIL: usize = 2000;

static JSX_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"<[a-zA-Z][^>]*\sclass\s*=").unwrap(),
            "`class` attribute must become `className`",
        ),
        (
            Regex::new(r"<[a-zA-Z][^>]*\sfor\s*=").unwrap(),
            "`for` attribute must become `htmlFor`",
        ),
        (
            Regex::new(r#"<[a-zA-Z][^>]*\sstyle\s*=\s*["']"#).unwrap(),
            "string `style` attribute must become an object",
        ),
        (
            Regex::new(r#"<[a-zA-Z][^>]*\son[a-z]+\s*=\s*["']"#).unwrap(),
            "inline event handler must become a function prop",
        ),
        (Regex::new(r"<!--").unwrap(), "HTML comment must become a JSX comment"),
    ]
});

static RE_VOID_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(area|br|col|embed|hr|img|input|link|meta|source|track|wbr)\b([^>]*)>").unwrap()
});

pub struct ValidationSystem {
    source_root: PathBuf,
    project_root: PathBuf,
    asset_root: Option<PathBuf>,
    build_command: Option<String>,
    build_timeout: Duration,
}

impl ValidationSystem {
    pub fn new(config: &MigrationConfig) -> Self {
        Self {
            source_root: config.source_root.clone(),
            project_root: config.project_root.clone(),
            asset_root: config.asset_root.clone(),
            build_command: config.build_command.clone(),
            build_timeout: config.build_timeout(),
        }
    }

    /// Every expected output path and staging extract exists.
    pub fn validate_structure(&self, plan: &MigrationPlan) -> Vec<CleanupEntry> {
        let expected = plan
            .target_structure
            .expected_files()
            .into_iter()
            .chain(plan.commands.iter().map(|c| c.target.as_str()));
        expected
            .filter(|rel| !self.project_root.join(rel).is_file())
            .map(|rel| CleanupEntry {
                severity: Severity::Blocking,
                file: rel.to_string(),
                line_range: None,
                description: MigrationError::StructuralValidation {
                    path: rel.to_string(),
                }
                .to_string(),
            })
            .collect()
    }

    /// Extract integrity, component markup, JSX and CSS lint, missing assets.
    pub fn validate_content(&self, plan: &MigrationPlan) -> Vec<CleanupEntry> {
        let mut entries = Vec::new();

        for cmd in &plan.commands {
            let Ok(actual) = fs::read_to_string(self.project_root.join(&cmd.target)) else {
                continue;
            };
            let Some(source) = self.read_source(&cmd.source, &mut entries) else {
                continue;
            };
            if let Some(mismatch) = verify_extract(&source, cmd, &actual) {
                entries.push(CleanupEntry {
                    severity: Severity::Blocking,
                    file: cmd.source.clone(),
                    line_range: Some((cmd.start_line, cmd.end_line)),
                    description: MigrationError::ContentIntegrity {
                        source_file: cmd.source.clone(),
                        target: cmd.target.clone(),
                        start_line: cmd.start_line,
                        end_line: cmd.end_line,
                        mismatch,
                    }
                    .to_string(),
                });
            }
        }

        for extraction in plan.component_extractions.iter().filter(|p| p.canonical) {
            let Ok(module) = fs::read_to_string(self.project_root.join(&extraction.destination)) else {
                continue;
            };
            let Some(source) = self.read_source(&extraction.source_file, &mut entries) else {
                continue;
            };
            let b = &extraction.boundary;
            let markup = slice_lines(&source, b.start_line, b.end_line).unwrap_or_default();
            if markup.is_empty() || !module.contains(&markup) {
                entries.push(CleanupEntry {
                    severity: Severity::Blocking,
                    file: extraction.destination.clone(),
                    line_range: None,
                    description: format!(
                        "component {} does not contain its source markup {}:{}-{}",
                        extraction.name, extraction.source_file, b.start_line, b.end_line
                    ),
                });
            }
            entries.extend(lint_jsx_compatibility(&extraction.destination, &module));
        }

        for route in &plan.route_mapping {
            let Some(page_cmd) = plan
                .commands
                .iter()
                .find(|c| c.purpose == CommandPurpose::Page && c.source == route.source_file)
            else {
                continue;
            };
            let Ok(page) = fs::read_to_string(self.project_root.join(&route.page_path)) else {
                continue;
            };
            let Some(source) = self.read_source(&route.source_file, &mut entries) else {
                continue;
            };
            // A range past the end is already reported by the extract check
            let Some(body) = slice_lines(&source, page_cmd.start_line, page_cmd.end_line) else {
                continue;
            };
            let (uses, moved) = page_parts(plan, &route.source_file);
            let kept = kept_page_text(&body, page_cmd.start_line, &uses, &moved);
            if let Some((line, piece)) = missing_in_order(&page, &kept).cloned() {
                entries.push(CleanupEntry {
                    severity: Severity::Blocking,
                    file: route.source_file.clone(),
                    line_range: Some((line, line)),
                    description: format!("{} is missing source text `{piece}`", route.page_path),
                });
            }
        }

        for page in &plan.target_structure.pages {
            if let Ok(text) = fs::read_to_string(self.project_root.join(page)) {
                entries.extend(lint_jsx_compatibility(page, &text));
            }
        }

        let globals = &plan.target_structure.globals_css;
        if let Ok(css) = fs::read_to_string(self.project_root.join(globals)) {
            for problem in validate_css_syntax(&css) {
                entries.push(CleanupEntry {
                    severity: Severity::Cosmetic,
                    file: globals.clone(),
                    line_range: None,
                    description: format!("CSS: {problem}"),
                });
            }
        }
        for warning in &plan.css_consolidation.warnings {
            entries.push(CleanupEntry {
                severity: Severity::Informational,
                file: globals.clone(),
                line_range: None,
                description: warning.clone(),
            });
        }

        if let Some(root) = &self.asset_root {
            let assets: Vec<CatalogedAsset> = plan.asset_manifest.iter().cloned().collect();
            for missing in validate_asset_existence(&assets, root) {
                let Some(asset) = assets.iter().find(|a| a.normalized_path == missing) else {
                    continue;
                };
                entries.push(CleanupEntry {
                    severity: Severity::Cosmetic,
                    file: asset.source_file.clone(),
                    line_range: Some((asset.reference.line, asset.reference.line)),
                    description: format!(
                        "{} asset {} not found under {}",
                        asset.reference.asset_type.as_str(),
                        missing,
                        root.display()
                    ),
                });
            }
        }
        entries
    }

    /// Optional project build plus a render check of every route page.
    pub fn validate_functionality(&self, plan: &MigrationPlan) -> Vec<CleanupEntry> {
        let mut entries = Vec::new();

        match &self.build_command {
            Some(command) => {
                if let Err(reason) = run_build(command, &self.project_root, self.build_timeout) {
                    entries.push(CleanupEntry {
                        severity: Severity::Blocking,
                        file: self.project_root.display().to_string(),
                        line_range: None,
                        description: MigrationError::FunctionalValidation {
                            target: "build".to_string(),
                            reason,
                        }
                        .to_string(),
                    });
                }
            }
            None => entries.push(CleanupEntry {
                severity: Severity::Informational,
                file: self.project_root.display().to_string(),
                line_range: None,
                description: "no build command configured; build check skipped".to_string(),
            }),
        }

        for route in &plan.route_mapping {
            if let Err(reason) = check_route_page(&self.project_root.join(&route.page_path)) {
                entries.push(CleanupEntry {
                    severity: Severity::Blocking,
                    file: route.page_path.clone(),
                    line_range: None,
                    description: MigrationError::FunctionalValidation {
                        target: route.route_path.clone(),
                        reason,
                    }
                    .to_string(),
                });
            }
        }
        entries
    }

    /// All three suites plus the execution findings, merged and sorted.
    pub fn run_all(&self, plan: &MigrationPlan, execution: Option<&ExecutionResult>) -> ValidationResult {
        let structural = self.validate_structure(plan);
        let content = self.validate_content(plan);
        let functional = self.validate_functionality(plan);

        let mut report = CleanupReport::default();
        if let Some(exec) = execution {
            for issue in &exec.errors {
                report.push(CleanupEntry {
                    severity: Severity::Blocking,
                    file: issue.file.clone(),
                    line_range: issue.line.map(|l| (l, l)),
                    description: issue.message.clone(),
                });
            }
            for w in &exec.warnings {
                report.push(cleanup_from_warning(w));
            }
        }
        for w in &plan.warnings {
            report.push(cleanup_from_warning(w));
        }
        for entry in structural.iter().chain(&content).chain(&functional) {
            report.push(entry.clone());
        }
        report.sort();
        report.entries.dedup();

        let passed = !report.has_blocking();
        info!(
            passed,
            structural = structural.len(),
            content = content.len(),
            functional = functional.len(),
            "validation finished"
        );
        ValidationResult {
            passed,
            structural,
            content,
            functional,
            report,
        }
    }

    fn read_source(&self, file: &str, entries: &mut Vec<CleanupEntry>) -> Option<String> {
        match fs::read_to_string(self.source_root.join(file)) {
            Ok(text) => Some(text),
            Err(e) => {
                entries.push(CleanupEntry {
                    severity: Severity::Blocking,
                    file: file.to_string(),
                    line_range: None,
                    description: format!("source unreadable: {e}"),
                });
                None
            }
        }
    }
}

/// First of `pieces` not found in `text` after the previous one.
fn missing_in_order<'a>(text: &str, pieces: &'a [(usize, String)]) -> Option<&'a (usize, String)> {
    let mut cursor = 0;
    pieces.iter().find(|(_, piece)| match text[cursor..].find(piece.as_str()) {
        Some(at) => {
            cursor += at + piece.len();
            false
        }
        None => true,
    })
}

pub fn cleanup_from_warning(w: &MigrationWarning) -> CleanupEntry {
    let severity = match w.kind {
        WarningKind::SyntaxCompatibility | WarningKind::ManualFixRequired => Severity::Cosmetic,
        WarningKind::OptimizationOpportunity => Severity::Informational,
    };
    let description = match &w.suggestion {
        Some(s) => format!("{} ({s})", w.message),
        None => w.message.clone(),
    };
    CleanupEntry {
        severity,
        file: w.file.clone(),
        line_range: w.line.map(|l| (l, l)),
        description,
    }
}

/// HTML constructs that are not valid JSX, one cosmetic entry per rule per
/// line.
pub fn lint_jsx_compatibility(file: &str, text: &str) -> Vec<CleanupEntry> {
    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let lineno = idx + 1;
        if line.trim_start().starts_with("//") {
            continue;
        }
        let mut push = |description: String| {
            entries.push(CleanupEntry {
                severity: Severity::Cosmetic,
                file: file.to_string(),
                line_range: Some((lineno, lineno)),
                description,
            });
        };
        for (re, message) in JSX_RULES.iter() {
            if re.is_match(line) {
                push(message.to_string());
            }
        }
        for caps in RE_VOID_TAG.captures_iter(line) {
            if !caps[2].trim_end().ends_with('/') {
                push(format!("void element <{}> must be self-closed", caps[1].to_ascii_lowercase()));
            }
        }
    }
    entries
}

/// A route renders when its page exists, exports a default component and its
/// markup is balanced.
fn check_route_page(path: &Path) -> std::result::Result<(), String> {
    let text = fs::read_to_string(path).map_err(|e| format!("page unreadable: {e}"))?;
    if !text.contains("export default function") {
        return Err("page has no default export".to_string());
    }
    let tree = build_tree(&text);
    if let Some((_, message)) = tree.unclosed.first() {
        return Err(format!("unbalanced markup: {message}"));
    }
    if let Some((line, tag)) = tree.stray_closes.first() {
        return Err(format!("unbalanced markup: stray {tag} at line {line}"));
    }
    Ok(())
}

/// Run `command` through the shell in `dir`, failing on a non-zero exit or
/// after `timeout`. Builds are serialized process-wide.
pub fn run_build(command: &str, dir: &Path, timeout: Duration) -> std::result::Result<(), String> {
    let _guard = BUILD_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let mut output = tempfile::tempfile().map_err(|e| format!("cannot capture build output: {e}"))?;
    let stderr = output
        .try_clone()
        .map_err(|e| format!("cannot capture build output: {e}"))?;

    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    info!(command, dir = %dir.display(), "running build");
    let mut child = Command::new(shell)
        .arg(flag)
        .arg(command)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::from(output.try_clone().map_err(|e| e.to_string())?))
        .stderr(Stdio::from(stderr))
        .spawn()
        .map_err(|e| format!("failed to start `{command}`: {e}"))?;

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(command, secs = timeout.as_secs(), "build timed out");
                return Err(format!("`{command}` timed out after {}s", timeout.as_secs()));
            }
            Ok(None) => std::thread::sleep(BUILD_POLL),
            Err(e) => return Err(format!("failed waiting for `{command}`: {e}")),
        }
    };
    debug!(%status, elapsed_ms = started.elapsed().as_millis() as u64, "build exited");
    if status.success() {
        return Ok(());
    }

    let mut captured = String::new();
    if output.seek(SeekFrom::Start(0)).is_ok() {
        let _ = output.read_to_string(&mut captured);
    }
    let tail_start = captured
        .char_indices()
        .rev()
        .nth(BUILD_OUTPUT_TAIL)
        .map_or(0, |(i, _)| i);
    let tail = captured[tail_start..].trim();
    if tail.is_empty() {
        Err(format!("`{command}` exited with {status}"))
    } else {
        Err(format!("`{command}` exited with {status}: {tail}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisEngine;
    use crate::executor::CopyPasteExecutor;
    use crate::planner::create_migration_plan;

    fn site_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/site")
    }

    fn fixture_plan() -> MigrationPlan {
        let docs = ["index.html", "about.html", "blog/post.html"]
            .iter()
            .map(|n| SourceDocument::new(*n, fs::read_to_string(site_root().join(n)).unwrap()))
            .collect();
        let mut docs = AnalysisEngine::new().analyze_all(docs);
        create_migration_plan(&mut docs).unwrap()
    }

    fn config(project: &Path) -> MigrationConfig {
        MigrationConfig {
            source_root: site_root(),
            project_root: project.to_path_buf(),
            asset_root: Some(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/public")),
            ..MigrationConfig::default()
        }
    }

    #[test]
    fn empty_project_fails_structurally() {
        let out = tempfile::tempdir().unwrap();
        let plan = fixture_plan();
        let validator = ValidationSystem::new(&config(out.path()));
        let structural = validator.validate_structure(&plan);
        assert!(structural.iter().any(|e| e.file == "app/globals.css"));
        assert!(structural.iter().all(|e| e.severity == Severity::Blocking));
        let result = validator.run_all(&plan, None);
        assert!(!result.passed);
    }

    #[test]
    fn executed_project_passes_with_cleanup_notes() {
        let out = tempfile::tempdir().unwrap();
        let plan = fixture_plan();
        let exec = CopyPasteExecutor::new(site_root(), out.path())
            .execute_migration_plan(&plan)
            .unwrap();
        let result = ValidationSystem::new(&config(out.path())).run_all(&plan, Some(&exec));
        assert!(result.structural.is_empty());
        assert!(result.passed, "{:#?}", result.report.by_severity(Severity::Blocking));
        // class= attributes survive verbatim and are flagged for manual fixes
        assert!(result
            .report
            .entries
            .iter()
            .any(|e| e.severity == Severity::Cosmetic && e.description.contains("className")));
        // Missing fixtures assets
        assert!(result.report.entries.iter().any(|e| e.description.contains("/img/two.png")));
        // Duplicate custom property surfaced
        assert!(result.report.entries.iter().any(|e| e.description.contains("--color-accent")));
        assert!(result
            .report
            .entries
            .iter()
            .any(|e| e.description.contains("build check skipped")));
    }

    #[test]
    fn tampered_component_is_blocking() {
        let out = tempfile::tempdir().unwrap();
        let plan = fixture_plan();
        CopyPasteExecutor::new(site_root(), out.path())
            .execute_migration_plan(&plan)
            .unwrap();
        fs::write(
            out.path().join("components/layout/SiteFooter.tsx"),
            "export default function SiteFooter() { return null; }\n",
        )
        .unwrap();
        let content = ValidationSystem::new(&config(out.path())).validate_content(&plan);
        assert!(content
            .iter()
            .any(|e| e.severity == Severity::Blocking && e.file == "components/layout/SiteFooter.tsx"));
    }

    #[test]
    fn page_losing_source_text_is_blocking() {
        let src = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(
            src.path().join("index.html"),
            "<body>\n<p>keep</p><script>go()</script>\n<p>tail</p>\n</body>",
        )
        .unwrap();
        let docs = vec![SourceDocument::new("index.html", fs::read_to_string(src.path().join("index.html")).unwrap())];
        let mut docs = AnalysisEngine::new().analyze_all(docs);
        let plan = create_migration_plan(&mut docs).unwrap();
        CopyPasteExecutor::new(src.path(), out.path())
            .execute_migration_plan(&plan)
            .unwrap();
        let validator = ValidationSystem::new(&MigrationConfig {
            source_root: src.path().to_path_buf(),
            project_root: out.path().to_path_buf(),
            ..MigrationConfig::default()
        });

        let page = out.path().join("app/page.tsx");
        let generated = fs::read_to_string(&page).unwrap();
        assert!(generated.contains("<p>keep</p>{/* moved to"));
        let blocking = |entries: Vec<CleanupEntry>| {
            entries
                .into_iter()
                .filter(|e| e.severity == Severity::Blocking)
                .collect::<Vec<_>>()
        };
        assert!(blocking(validator.validate_content(&plan)).is_empty());

        fs::write(&page, generated.replace("<p>keep</p>", "")).unwrap();
        let found = blocking(validator.validate_content(&plan));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file, "index.html");
        assert_eq!(found[0].line_range, Some((2, 2)));
        assert!(found[0].description.contains("<p>keep</p>"));
    }

    #[test]
    fn plan_warnings_reach_the_report() {
        let out = tempfile::tempdir().unwrap();
        let mut plan = fixture_plan();
        plan.warnings.push(MigrationWarning {
            kind: WarningKind::ManualFixRequired,
            file: "about/index.html".into(),
            line: None,
            message: "route /about is already taken; page moved to /about2".into(),
            suggestion: None,
        });
        let result = ValidationSystem::new(&config(out.path())).run_all(&plan, None);
        assert!(result
            .report
            .entries
            .iter()
            .any(|e| e.severity == Severity::Cosmetic && e.description.contains("/about2")));
    }

    #[test]
    fn jsx_lint_rules() {
        let text = "// <img src=x>\n<div class=\"a\" onclick=\"go()\">\n<label for=\"e\">E</label>\n<img src=\"a.png\">\n<br />\n<!-- note -->";
        let entries = lint_jsx_compatibility("c.tsx", text);
        let lines: Vec<usize> = entries.iter().filter_map(|e| e.line_range.map(|r| r.0)).collect();
        assert_eq!(lines, vec![2, 2, 3, 4, 6]);
        assert!(entries.iter().all(|e| e.severity == Severity::Cosmetic));
    }

    #[test]
    fn route_page_balance() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.tsx");
        fs::write(&good, "export default function P() {\n  return (\n    <>\n<div><p>x</p></div>\n    </>\n  );\n}\n").unwrap();
        assert!(check_route_page(&good).is_ok());
        let bad = dir.path().join("bad.tsx");
        fs::write(&bad, "export default function P() {\n  return (\n<div>\n  );\n}\n").unwrap();
        assert!(check_route_page(&bad).unwrap_err().contains("unclosed <div>"));
        assert!(check_route_page(&dir.path().join("missing.tsx")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn build_command_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        assert!(run_build("true", dir.path(), Duration::from_secs(10)).is_ok());
        let err = run_build("echo boom >&2; exit 3", dir.path(), Duration::from_secs(10)).unwrap_err();
        assert!(err.contains("boom"));
        let err = run_build("sleep 5", dir.path(), Duration::from_millis(200)).unwrap_err();
        assert!(err.contains("timed out"));
    }

    #[test]
    fn warnings_map_to_severities() {
        let w = MigrationWarning {
            kind: WarningKind::OptimizationOpportunity,
            file: "f".into(),
            line: Some(3),
            message: "m".into(),
            suggestion: Some("s".into()),
        };
        let entry = cleanup_from_warning(&w);
        assert_eq!(entry.severity, Severity::Informational);
        assert_eq!(entry.description, "m (s)");
        assert_eq!(entry.line_range, Some((3, 3)));
    }
}
