//! Data model shared by every pipeline stage: serializable, format-agnostic.

use crate::lines::{column_of, span_text};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// One input document as read from disk.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Path relative to the source root, always `/`-separated
    pub file_name: String,
    pub content: String,
}

impl SourceDocument {
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into().replace('\\', "/"),
            content: content.into(),
        }
    }
}

/// Complete structural analysis of a single document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HtmlAnalysis {
    pub file_name: String,
    pub total_lines: usize,
    pub css_blocks: Vec<CssBlock>,
    pub js_blocks: Vec<JsBlock>,
    /// Top-level boundaries only; nested ones live in `children`
    pub components: Vec<ComponentBoundary>,
    pub assets: Vec<AssetReference>,
    pub warnings: Vec<ParseWarning>,
}

impl HtmlAnalysis {
    /// Largest end line referenced by any block, boundary or asset.
    pub fn max_referenced_line(&self) -> usize {
        let css = self.css_blocks.iter().map(|b| b.end_line);
        let js = self.js_blocks.iter().map(|b| b.end_line);
        let comps = self.components.iter().map(|c| c.end_line);
        let assets = self.assets.iter().map(|a| a.line);
        css.chain(js).chain(comps).chain(assets).max().unwrap_or(0)
    }
}

/// An analysis paired with the text it was produced from.
#[derive(Debug, Clone)]
pub struct AnalyzedDocument {
    pub source: SourceDocument,
    pub analysis: HtmlAnalysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CssBlockType {
    Inline,
    Framer,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssBlock {
    pub start_line: usize,
    pub end_line: usize,
    #[serde(rename = "type")]
    pub block_type: CssBlockType,
    /// Physical lines `[start_line, end_line]`, delimiter lines included
    pub content: String,
    /// Byte span in `content` from the opening `<` to past the closing `>`
    pub span: (usize, usize),
    /// Byte span in `content` of the text between the tags
    pub body: (usize, usize),
}

impl CssBlock {
    /// Stylesheet text between the `<style>` tags.
    pub fn body_text(&self) -> &str {
        span_text(&self.content, self.body)
    }

    /// Columns where the region starts on its first line and ends on its last.
    pub fn columns(&self) -> (usize, usize) {
        (column_of(&self.content, self.span.0), column_of(&self.content, self.span.1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JsBlockType {
    FramerMotion,
    Inline,
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsBlock {
    pub start_line: usize,
    pub end_line: usize,
    #[serde(rename = "type")]
    pub block_type: JsBlockType,
    pub content: String,
    pub span: (usize, usize),
    pub body: (usize, usize),
}

impl JsBlock {
    pub fn body_text(&self) -> &str {
        span_text(&self.content, self.body)
    }

    pub fn columns(&self) -> (usize, usize) {
        (column_of(&self.content, self.span.0), column_of(&self.content, self.span.1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentCategory {
    Navigation,
    Layout,
    Content,
    Interactive,
}

impl ComponentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Navigation => "navigation",
            Self::Layout => "layout",
            Self::Content => "content",
            Self::Interactive => "interactive",
        }
    }
}

impl fmt::Display for ComponentCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Line range and metadata of one candidate extractable component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBoundary {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
    /// Opening tag, whitespace collapsed
    pub start_tag: String,
    pub end_tag: String,
    /// Digest of tag sequence + class/role attributes, text ignored
    pub signature: String,
    pub is_reusable: bool,
    /// Unset until the mapper classifies the boundary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ComponentCategory>,
    /// Identical siblings sharing this boundary's signature (1 = unique)
    pub repeat_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<ComponentBoundary>,
}

impl ComponentBoundary {
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    pub fn contains(&self, other: &ComponentBoundary) -> bool {
        self.start_line <= other.start_line && other.end_line <= self.end_line
    }

    pub fn overlaps(&self, start: usize, end: usize) -> bool {
        self.start_line <= end && start <= self.end_line
    }

    /// Depth-first walk over this boundary and all descendants.
    pub fn walk<'a>(&'a self, out: &mut Vec<&'a ComponentBoundary>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssetType {
    Image,
    Font,
    Script,
    Svg,
    Css,
    Meta,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Font => "font",
            Self::Script => "script",
            Self::Svg => "svg",
            Self::Css => "css",
            Self::Meta => "meta",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReference {
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    /// Literal reference string; data URIs reduced to their flag
    pub path: String,
    pub line: usize,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub attributes: BTreeMap<String, String>,
}

/// Recoverable analysis problem (unterminated block, unclosed element).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseWarning {
    pub file: String,
    pub line: usize,
    pub message: String,
}

// -- Planning -----------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentExtractionPlan {
    pub name: String,
    pub source_file: String,
    pub boundary: ComponentBoundary,
    /// Path relative to the project root
    pub destination: String,
    /// Import statements without the trailing semicolon
    pub dependencies: Vec<String>,
    pub wrapper_template: String,
    /// False for later occurrences of a reusable component that share the
    /// destination of the first one
    pub canonical: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssSourceBlock {
    pub source_file: String,
    pub block: CssBlock,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CssConsolidationPlan {
    pub target_file: String,
    /// Exact concatenation order of the final stylesheet
    pub entries: Vec<CssSourceBlock>,
    /// `--token` name → winning (last) definition
    pub custom_properties: BTreeMap<String, String>,
    pub preserve_order: bool,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMapping {
    pub source_file: String,
    pub route_path: String,
    pub page_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CommandPurpose {
    Css,
    Script,
    Component,
    Page,
}

/// A generated line-range extraction command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerShellCommand {
    pub purpose: CommandPurpose,
    pub source: String,
    /// Staging file the executor writes, relative to the project root
    pub target: String,
    pub start_line: usize,
    pub end_line: usize,
    pub text: String,
    /// Byte columns where a style or script region starts on `start_line`
    /// and ends on `end_line`; whole lines when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<(usize, usize)>,
}

impl PowerShellCommand {
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }
}

/// Expected files of the generated project, relative to its root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetStructure {
    pub globals_css: String,
    pub layout: String,
    pub components_dir: String,
    pub pages: Vec<String>,
    pub component_files: Vec<String>,
    pub asset_manifest: String,
}

impl TargetStructure {
    pub fn expected_files(&self) -> Vec<&str> {
        let mut files = vec![
            self.globals_css.as_str(),
            self.layout.as_str(),
            self.asset_manifest.as_str(),
        ];
        files.extend(self.pages.iter().map(String::as_str));
        files.extend(self.component_files.iter().map(String::as_str));
        files
    }
}

/// One deduplicated asset with provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogedAsset {
    pub normalized_path: String,
    /// Earliest occurrence across the corpus
    pub reference: AssetReference,
    pub source_file: String,
    pub occurrences: usize,
}

/// Deduplicated assets grouped by type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub groups: BTreeMap<AssetType, Vec<CatalogedAsset>>,
}

impl AssetManifest {
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &CatalogedAsset> {
        self.groups.values().flatten()
    }
}

/// Immutable execution contract produced by the planner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationPlan {
    pub source_files: Vec<String>,
    pub target_structure: TargetStructure,
    pub commands: Vec<PowerShellCommand>,
    pub component_extractions: Vec<ComponentExtractionPlan>,
    pub css_consolidation: CssConsolidationPlan,
    pub route_mapping: Vec<RouteMapping>,
    pub asset_manifest: AssetManifest,
    /// Planning problems that did not stop the plan
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<MigrationWarning>,
}

// -- Execution / validation ---------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CopyFailed,
    SyntaxError,
    MissingDependency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationIssue {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    SyntaxCompatibility,
    ManualFixRequired,
    OptimizationOpportunity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationWarning {
    #[serde(rename = "type")]
    pub kind: WarningKind,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl From<&ParseWarning> for MigrationWarning {
    fn from(w: &ParseWarning) -> Self {
        Self {
            kind: WarningKind::ManualFixRequired,
            file: w.file.clone(),
            line: Some(w.line),
            message: w.message.clone(),
            suggestion: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub completed_commands: Vec<PowerShellCommand>,
    pub failed_commands: Vec<PowerShellCommand>,
    pub errors: Vec<MigrationIssue>,
    pub warnings: Vec<MigrationWarning>,
    /// Generated project files, relative to the project root
    pub written_files: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Blocking,
    Cosmetic,
    Informational,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocking => "blocking",
            Self::Cosmetic => "cosmetic",
            Self::Informational => "informational",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupEntry {
    pub severity: Severity,
    pub file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_range: Option<(usize, usize)>,
    pub description: String,
}

/// Remaining manual work after execution and validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub entries: Vec<CleanupEntry>,
}

impl CleanupReport {
    pub fn push(&mut self, entry: CleanupEntry) {
        self.entries.push(entry);
    }

    pub fn by_severity(&self, severity: Severity) -> Vec<&CleanupEntry> {
        self.entries.iter().filter(|e| e.severity == severity).collect()
    }

    pub fn counts(&self) -> HashMap<Severity, usize> {
        let mut counts = HashMap::new();
        for entry in &self.entries {
            *counts.entry(entry.severity).or_insert(0) += 1;
        }
        counts
    }

    pub fn has_blocking(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Blocking)
    }

    /// Stable ordering: severity, then file, then line.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            a.severity
                .cmp(&b.severity)
                .then_with(|| a.file.cmp(&b.file))
                .then_with(|| a.line_range.cmp(&b.line_range))
        });
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub passed: bool,
    pub structural: Vec<CleanupEntry>,
    pub content: Vec<CleanupEntry>,
    pub functional: Vec<CleanupEntry>,
    pub report: CleanupReport,
}
