//! Plan execution against the filesystem.
//!
//! Every command copies a verbatim line range into a staging file and is
//! verified byte-for-byte before anything is generated from it. The project
//! tree is snapshotted first; an I/O failure or cancellation puts the
//! snapshot back before the error is returned.

use crate::css::render_stylesheet;
use crate::error::{MigrationError, Result};
use crate::lines::{compare_content, line_count, slice_lines, ContentMismatch};
use crate::mapper::generate_component_template;
use crate::model::*;
use crate::naming::pascal_case;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, error, info, warn};
use walkdir::{DirEntry, WalkDir};

/// Directories never snapshotted or touched by a restore.
const SKIPPED_DIRS: &[&str] = &[".git", "node_modules", ".next"];

/// Snapshot of the project tree taken before execution.
pub struct Backup {
    dir: TempDir,
    existed: bool,
    files: usize,
}

impl Backup {
    fn snapshot(&self) -> PathBuf {
        self.dir.path().join("snapshot")
    }

    pub fn file_count(&self) -> usize {
        self.files
    }
}

type Outcome = (usize, Option<MigrationError>);

pub struct CopyPasteExecutor {
    source_root: PathBuf,
    project_root: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl CopyPasteExecutor {
    pub fn new(source_root: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            project_root: project_root.into(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag with the caller. Setting it stops execution
    /// before the next command.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    // -- Backup -----------------------------------------------------------------

    pub fn create_backup(&self) -> Result<Backup> {
        let dir = TempDir::new().map_err(|e| MigrationError::io(std::env::temp_dir(), e))?;
        let existed = self.project_root.is_dir();
        let files = if existed {
            copy_tree(&self.project_root, &dir.path().join("snapshot"))?
        } else {
            0
        };
        debug!(files, root = %self.project_root.display(), "backup created");
        Ok(Backup { dir, existed, files })
    }

    /// Put the project tree back to the snapshot: entries created since are
    /// removed, snapshotted files are rewritten.
    pub fn restore_from_backup(&self, backup: &Backup) -> Result<()> {
        let root = &self.project_root;
        if !backup.existed {
            if root.exists() {
                fs::remove_dir_all(root).map_err(|e| MigrationError::io(root, e))?;
            }
            return Ok(());
        }
        let snapshot = backup.snapshot();
        let walker = WalkDir::new(root)
            .min_depth(1)
            .contents_first(true)
            .into_iter()
            .filter_entry(|e| !is_skipped(e));
        for entry in walker {
            let entry = entry.map_err(|e| walk_error(root, e))?;
            let rel = entry.path().strip_prefix(root).unwrap_or(entry.path());
            if snapshot.join(rel).exists() {
                continue;
            }
            let path = entry.path();
            let removed = if entry.file_type().is_dir() {
                fs::remove_dir_all(path)
            } else {
                fs::remove_file(path)
            };
            removed.map_err(|e| MigrationError::io(path, e))?;
        }
        copy_tree(&snapshot, root)?;
        info!(files = backup.files, "backup restored");
        Ok(())
    }

    // -- Commands ---------------------------------------------------------------

    /// Copy the command's line range into its staging file.
    pub fn copy_content_block(&self, cmd: &PowerShellCommand) -> Result<()> {
        let text = self.read_source(&cmd.source)?;
        let extract = select_lines(&text, cmd.start_line, cmd.end_line);
        write_file(&self.project_root.join(&cmd.target), &extract)
    }

    /// Compare a staging file with its source range byte for byte.
    pub fn validate_copy_operation(&self, cmd: &PowerShellCommand) -> Result<()> {
        let text = self.read_source(&cmd.source)?;
        let target = self.project_root.join(&cmd.target);
        let actual = fs::read_to_string(&target).map_err(|e| MigrationError::io(&target, e))?;
        match verify_extract(&text, cmd, &actual) {
            None => Ok(()),
            Some(mismatch) => Err(MigrationError::ContentIntegrity {
                source_file: cmd.source.clone(),
                target: cmd.target.clone(),
                start_line: cmd.start_line,
                end_line: cmd.end_line,
                mismatch,
            }),
        }
    }

    fn read_source(&self, file: &str) -> Result<String> {
        let path = self.source_root.join(file);
        fs::read_to_string(&path).map_err(|e| MigrationError::io(&path, e))
    }

    /// Run every command. Commands sharing a target run in plan order; distinct
    /// targets run in parallel. Outcomes come back in plan order.
    fn run_commands(&self, commands: &[PowerShellCommand]) -> Result<Vec<Outcome>> {
        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut by_target: HashMap<&str, usize> = HashMap::new();
        for (i, cmd) in commands.iter().enumerate() {
            let g = *by_target.entry(cmd.target.as_str()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[g].push(i);
        }

        let per_group: Vec<Vec<Outcome>> = groups
            .par_iter()
            .map(|group| self.run_group(commands, group))
            .collect::<Result<_>>()?;
        let mut outcomes: Vec<Outcome> = per_group.into_iter().flatten().collect();
        outcomes.sort_by_key(|(i, _)| *i);
        Ok(outcomes)
    }

    fn run_group(&self, commands: &[PowerShellCommand], group: &[usize]) -> Result<Vec<Outcome>> {
        let mut out = Vec::with_capacity(group.len());
        for &i in group {
            if self.cancel.load(Ordering::SeqCst) {
                break;
            }
            let cmd = &commands[i];
            self.copy_content_block(cmd)?;
            match self.validate_copy_operation(cmd) {
                Ok(()) => out.push((i, None)),
                Err(e @ MigrationError::ContentIntegrity { .. }) => out.push((i, Some(e))),
                Err(e) => return Err(e),
            }
        }
        Ok(out)
    }

    // -- Plan -------------------------------------------------------------------

    /// Back up, copy and verify every command, then generate the project.
    pub fn execute_migration_plan(&self, plan: &MigrationPlan) -> Result<ExecutionResult> {
        let backup = self.create_backup()?;
        match self.execute_inner(plan) {
            Ok(result) => Ok(result),
            Err(err) => {
                warn!(error = %err, "execution failed, restoring backup");
                if let Err(restore_err) = self.restore_from_backup(&backup) {
                    error!(error = %restore_err, "backup restore failed");
                }
                Err(err)
            }
        }
    }

    fn execute_inner(&self, plan: &MigrationPlan) -> Result<ExecutionResult> {
        let outcomes = self.run_commands(&plan.commands)?;
        if self.cancel.load(Ordering::SeqCst) {
            let completed = outcomes.iter().filter(|(_, e)| e.is_none()).count();
            return Err(MigrationError::Cancelled { completed });
        }

        let mut result = ExecutionResult::default();
        for (i, failure) in outcomes {
            let cmd = &plan.commands[i];
            let Some(err) = failure else {
                result.completed_commands.push(cmd.clone());
                continue;
            };
            let line = match &err {
                MigrationError::ContentIntegrity { mismatch, .. } => {
                    Some(cmd.start_line + mismatch.line - 1)
                }
                _ => None,
            };
            warn!(command = %cmd.text, "{err}");
            result.errors.push(MigrationIssue {
                kind: ErrorKind::CopyFailed,
                file: cmd.source.clone(),
                line,
                message: err.to_string(),
                command: Some(cmd.text.clone()),
            });
            result.failed_commands.push(cmd.clone());
        }

        for cmd in plan.commands.iter().filter(|c| c.purpose == CommandPurpose::Script) {
            result.warnings.push(MigrationWarning {
                kind: WarningKind::ManualFixRequired,
                file: cmd.source.clone(),
                line: Some(cmd.start_line),
                message: format!("script block staged at {} is not wired into any page", cmd.target),
                suggestion: Some("port the behavior into a \"use client\" component".to_string()),
            });
        }
        for w in &plan.css_consolidation.warnings {
            result.warnings.push(MigrationWarning {
                kind: WarningKind::OptimizationOpportunity,
                file: plan.css_consolidation.target_file.clone(),
                line: None,
                message: w.clone(),
                suggestion: None,
            });
        }

        self.materialize(plan, &mut result)?;
        result.success = result.failed_commands.is_empty() && result.errors.is_empty();
        info!(
            completed = result.completed_commands.len(),
            failed = result.failed_commands.len(),
            written = result.written_files.len(),
            "execution finished"
        );
        Ok(result)
    }

    /// Generate the project files from the verified staging extracts.
    fn materialize(&self, plan: &MigrationPlan, result: &mut ExecutionResult) -> Result<()> {
        let staged = StagedExtracts::load(&self.project_root, &plan.commands)?;
        let target = &plan.target_structure;

        let mut css_plan = plan.css_consolidation.clone();
        for entry in &mut css_plan.entries {
            let b = &entry.block;
            if let Some(text) = staged.get(CommandPurpose::Css, &entry.source_file, b.start_line, b.end_line) {
                entry.block.content = text.to_string();
            }
        }
        self.emit(&target.globals_css, &render_stylesheet(&css_plan), result)?;
        self.emit(&target.layout, &root_layout(), result)?;

        let mut canonical_markup: HashMap<&str, &str> = HashMap::new();
        for extraction in plan.component_extractions.iter().filter(|p| p.canonical) {
            let b = &extraction.boundary;
            let Some(html) = staged.get(CommandPurpose::Component, &extraction.source_file, b.start_line, b.end_line) else {
                continue;
            };
            canonical_markup.insert(extraction.destination.as_str(), html);
            self.emit(&extraction.destination, &create_component_wrapper(html, extraction), result)?;
        }

        for route in &plan.route_mapping {
            let Some(page_cmd) = plan
                .commands
                .iter()
                .find(|c| c.purpose == CommandPurpose::Page && c.source == route.source_file)
            else {
                self.emit(&route.page_path, &page_module(route, &[], ""), result)?;
                continue;
            };
            let body = staged.text(&page_cmd.target).unwrap_or_default();
            let (uses, moved) = page_parts(plan, &route.source_file);
            for p in uses
                .iter()
                .filter(|p| !p.canonical && p.boundary.start_line >= page_cmd.start_line)
            {
                let own = slice_lines(body, p.boundary.start_line + 1 - page_cmd.start_line, p.boundary.end_line + 1 - page_cmd.start_line);
                let shared = canonical_markup.get(p.destination.as_str()).copied();
                if let (Some(own), Some(shared)) = (own.as_deref(), shared) {
                    if own != shared {
                        result.warnings.push(MigrationWarning {
                            kind: WarningKind::ManualFixRequired,
                            file: route.source_file.clone(),
                            line: Some(p.boundary.start_line),
                            message: format!(
                                "markup differs from shared component {} ({})",
                                p.name, p.destination
                            ),
                            suggestion: Some("turn the differing text into props".to_string()),
                        });
                    }
                }
            }
            let markup = compose_page_body(body, page_cmd.start_line, &uses, &moved);
            self.emit(&route.page_path, &page_module(route, &uses, &markup), result)?;
        }

        let manifest = serde_json::to_string_pretty(&plan.asset_manifest)
            .map_err(|e| MigrationError::io(&target.asset_manifest, std::io::Error::other(e)))?;
        self.emit(&target.asset_manifest, &manifest, result)?;
        Ok(())
    }

    fn emit(&self, rel: &str, content: &str, result: &mut ExecutionResult) -> Result<()> {
        write_file(&self.project_root.join(rel), content)?;
        debug!(file = rel, bytes = content.len(), "wrote");
        result.written_files.push(rel.to_string());
        Ok(())
    }
}

/// Staging file contents keyed by the range they were copied from.
struct StagedExtracts {
    by_range: HashMap<(CommandPurpose, String, usize, usize), String>,
    by_target: HashMap<String, String>,
}

impl StagedExtracts {
    fn load(root: &Path, commands: &[PowerShellCommand]) -> Result<Self> {
        let mut by_range = HashMap::new();
        let mut by_target = HashMap::new();
        for cmd in commands {
            let path = root.join(&cmd.target);
            let text = fs::read_to_string(&path).map_err(|e| MigrationError::io(&path, e))?;
            by_range.insert(
                (cmd.purpose, cmd.source.clone(), cmd.start_line, cmd.end_line),
                text.clone(),
            );
            by_target.insert(cmd.target.clone(), text);
        }
        Ok(Self { by_range, by_target })
    }

    fn get(&self, purpose: CommandPurpose, source: &str, start: usize, end: usize) -> Option<&str> {
        self.by_range
            .get(&(purpose, source.to_string(), start, end))
            .map(String::as_str)
    }

    fn text(&self, target: &str) -> Option<&str> {
        self.by_target.get(target).map(String::as_str)
    }
}

/// Mismatch between a staged extract and lines `[start, end]` of `source`.
///
/// A range running past the end of the source is a mismatch at the first
/// missing line.
pub fn verify_extract(source: &str, cmd: &PowerShellCommand, actual: &str) -> Option<ContentMismatch> {
    match slice_lines(source, cmd.start_line, cmd.end_line) {
        Some(expected) => compare_content(&expected, actual),
        None => {
            let available = line_count(source).saturating_sub(cmd.start_line.saturating_sub(1));
            Some(ContentMismatch {
                line: available.min(cmd.line_count()) + 1,
                expected: None,
                actual: actual.split('\n').nth(available).map(str::to_string),
            })
        }
    }
}

/// `Select-Object -Skip (start-1) -First n` over physical lines.
///
/// Lines are rejoined with `\n`, so a CRLF source stages as LF; extracts
/// are verified with the same normalization.
fn select_lines(text: &str, start: usize, end: usize) -> String {
    text.lines()
        .skip(start.saturating_sub(1))
        .take((end + 1).saturating_sub(start))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Component module for an extraction: scaffold plus provenance comment,
/// marked as a client component when the markup is interactive.
pub fn create_component_wrapper(html: &str, plan: &ComponentExtractionPlan) -> String {
    let mut out = String::new();
    let client = plan.boundary.category == Some(ComponentCategory::Interactive)
        || plan.dependencies.iter().any(|d| d.contains("framer-motion"));
    if client {
        out.push_str("\"use client\";\n\n");
    }
    out.push_str(&format!(
        "// Extracted from {}:{}-{}\n",
        plan.source_file, plan.boundary.start_line, plan.boundary.end_line
    ));
    out.push_str(&generate_component_template(&plan.name, html, &plan.dependencies));
    out
}

/// Byte range of a page body replaced by generated text.
struct Edit {
    start: usize,
    end: usize,
    text: String,
}

/// Components and moved style or script regions belonging to one document.
pub fn page_parts<'a>(
    plan: &'a MigrationPlan,
    source_file: &str,
) -> (Vec<&'a ComponentExtractionPlan>, Vec<&'a PowerShellCommand>) {
    let uses = plan
        .component_extractions
        .iter()
        .filter(|p| p.source_file == source_file)
        .collect();
    let moved = plan
        .commands
        .iter()
        .filter(|c| c.source == source_file && matches!(c.purpose, CommandPurpose::Css | CommandPurpose::Script))
        .collect();
    (uses, moved)
}

/// Replacements for a page body starting at `first_line`, sorted and
/// disjoint. Component ranges cover whole lines from their indent; moved
/// regions cover their recorded columns, so markup sharing their lines is
/// kept. An edit overlapping an earlier one is dropped, components first.
fn page_edits(
    body: &str,
    first_line: usize,
    components: &[&ComponentExtractionPlan],
    moved: &[&PowerShellCommand],
) -> Vec<Edit> {
    let lines: Vec<&str> = body.split('\n').collect();
    let mut starts = Vec::with_capacity(lines.len());
    let mut offset = 0;
    for line in &lines {
        starts.push(offset);
        offset += line.len() + 1;
    }
    let last_line = first_line + lines.len() - 1;
    let inside = |start: usize, end: usize| start >= first_line && start <= end && end <= last_line;
    let indent = |idx: usize| lines[idx].len() - lines[idx].trim_start().len();
    let line_end = |idx: usize| starts[idx] + lines[idx].len();

    let mut candidates = Vec::new();
    for p in components {
        let (start, end) = (p.boundary.start_line, p.boundary.end_line);
        if !inside(start, end) {
            continue;
        }
        let (first, last) = (start - first_line, end - first_line);
        candidates.push(Edit {
            start: starts[first] + indent(first),
            end: line_end(last),
            text: format!("<{} />", p.name),
        });
    }
    for cmd in moved {
        if !inside(cmd.start_line, cmd.end_line) {
            continue;
        }
        let (first, last) = (cmd.start_line - first_line, cmd.end_line - first_line);
        let (start, end) = match cmd.columns {
            Some((from, to)) => (starts[first] + from, starts[last] + to),
            None => (starts[first] + indent(first), line_end(last)),
        };
        if start > end || end > line_end(last) || !body.is_char_boundary(start) || !body.is_char_boundary(end) {
            warn!(target = %cmd.target, "region columns do not fit the page body, left in place");
            continue;
        }
        candidates.push(Edit {
            start,
            end,
            text: format!("{{/* moved to {} */}}", cmd.target),
        });
    }

    let mut edits: Vec<Edit> = Vec::new();
    for edit in candidates {
        if edits.iter().all(|e| edit.end <= e.start || edit.start >= e.end) {
            edits.push(edit);
        }
    }
    edits.sort_by_key(|e| e.start);
    edits
}

/// Page body with component ranges replaced by their elements and style or
/// script regions replaced by a pointer to their staging file.
fn compose_page_body(
    body: &str,
    first_line: usize,
    components: &[&ComponentExtractionPlan],
    moved: &[&PowerShellCommand],
) -> String {
    let mut out = String::with_capacity(body.len());
    let mut at = 0;
    for edit in page_edits(body, first_line, components, moved) {
        out.push_str(&body[at..edit.start]);
        out.push_str(&edit.text);
        at = edit.end;
    }
    out.push_str(&body[at..]);
    out
}

/// Source text a generated page must carry over: each non-blank, trimmed
/// piece of the body left outside the replaced ranges, with its line number.
pub fn kept_page_text(
    body: &str,
    first_line: usize,
    components: &[&ComponentExtractionPlan],
    moved: &[&PowerShellCommand],
) -> Vec<(usize, String)> {
    let mut gaps = Vec::new();
    let mut at = 0;
    for edit in page_edits(body, first_line, components, moved) {
        gaps.push((at, edit.start));
        at = edit.end;
    }
    gaps.push((at, body.len()));

    let mut pieces = Vec::new();
    for (from, to) in gaps {
        let mut line = first_line + body[..from].matches('\n').count();
        for piece in body[from..to].split('\n') {
            let piece = piece.trim();
            if !piece.is_empty() {
                pieces.push((line, piece.to_string()));
            }
            line += 1;
        }
    }
    pieces
}

fn page_module(route: &RouteMapping, uses: &[&ComponentExtractionPlan], markup: &str) -> String {
    let mut out = format!("// Generated from {} (route {})\n", route.source_file, route.route_path);
    let mut imported: Vec<&str> = Vec::new();
    for p in uses {
        if imported.contains(&p.name.as_str()) {
            continue;
        }
        imported.push(&p.name);
        let module = p.destination.strip_suffix(".tsx").unwrap_or(&p.destination);
        out.push_str(&format!("import {} from \"@/{}\";\n", p.name, module));
    }
    out.push('\n');
    out.push_str(&format!(
        "export default function {}() {{\n  return (\n    <>\n",
        page_component_name(&route.route_path)
    ));
    if !markup.is_empty() {
        out.push_str(markup);
        out.push('\n');
    }
    out.push_str("    </>\n  );\n}\n");
    out
}

/// "/" → "HomePage", "/blog/post" → "BlogPostPage"
pub fn page_component_name(route_path: &str) -> String {
    let trimmed = route_path.trim_matches('/');
    if trimmed.is_empty() {
        "HomePage".to_string()
    } else {
        format!("{}Page", pascal_case(trimmed))
    }
}

fn root_layout() -> String {
    "import type { ReactNode } from \"react\";\nimport \"./globals.css\";\n\n\
export default function RootLayout({ children }: { children: ReactNode }) {\n  return (\n    <html lang=\"en\">\n      <body>{children}</body>\n    </html>\n  );\n}\n"
        .to_string()
}

// -- Filesystem helpers ---------------------------------------------------------

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| MigrationError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| MigrationError::io(path, e))
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

fn walk_error(root: &Path, err: walkdir::Error) -> MigrationError {
    let path = err.path().unwrap_or(root).to_path_buf();
    MigrationError::io(path, std::io::Error::from(err))
}

/// Recursively copy `from` into `to`; returns the number of files copied.
fn copy_tree(from: &Path, to: &Path) -> Result<usize> {
    let mut files = 0;
    for entry in WalkDir::new(from).into_iter().filter_entry(|e| !is_skipped(e)) {
        let entry = entry.map_err(|e| walk_error(from, e))?;
        let rel = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let dest = to.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| MigrationError::io(&dest, e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &dest).map_err(|e| MigrationError::io(&dest, e))?;
            files += 1;
        }
    }
    Ok(files)
}
