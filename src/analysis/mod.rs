//! Analysis engine: one `HtmlAnalysis` per source document.
//!
//! Every function here is a pure function of the document text, so distinct
//! documents are analyzed in parallel. Problems are recorded as
//! `ParseWarning`s; analysis itself never fails.

pub mod assets;
pub mod blocks;
pub mod components;
pub mod markup;

pub use assets::catalog_assets;
pub use blocks::{extract_css_blocks, find_framer_motion_code};
pub use components::identify_components;

use crate::lines::line_count;
use crate::model::{AnalyzedDocument, HtmlAnalysis, ParseWarning, SourceDocument};
use rayon::prelude::*;
use tracing::{debug, warn};

#[derive(Debug, Default, Clone, Copy)]
pub struct AnalysisEngine;

impl AnalysisEngine {
    pub fn new() -> Self {
        Self
    }

    /// Full structural analysis of one document.
    pub fn analyze(&self, doc: &SourceDocument) -> HtmlAnalysis {
        let text = doc.content.as_str();
        let blocks = blocks::scan_blocks(text);
        let comps = components::scan_components(text);

        let warnings: Vec<ParseWarning> = blocks
            .warnings
            .into_iter()
            .chain(comps.warnings)
            .map(|(line, message)| ParseWarning {
                file: doc.file_name.clone(),
                line,
                message,
            })
            .collect();
        for w in &warnings {
            warn!(file = %w.file, line = w.line, "{}", w.message);
        }

        let analysis = HtmlAnalysis {
            file_name: doc.file_name.clone(),
            total_lines: line_count(text),
            css_blocks: blocks.css,
            js_blocks: blocks.js,
            components: comps.components,
            assets: catalog_assets(text),
            warnings,
        };
        debug!(
            file = %analysis.file_name,
            lines = analysis.total_lines,
            css = analysis.css_blocks.len(),
            js = analysis.js_blocks.len(),
            components = analysis.components.len(),
            assets = analysis.assets.len(),
            "analyzed document"
        );
        analysis
    }

    /// Analyze documents concurrently; output keeps input order.
    ///
    /// Returns only once every document is done, which is the barrier the
    /// planning stages rely on.
    pub fn analyze_all(&self, docs: Vec<SourceDocument>) -> Vec<AnalyzedDocument> {
        docs.into_par_iter()
            .map(|source| {
                let analysis = self.analyze(&source);
                AnalyzedDocument { source, analysis }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lines::slice_lines;

    fn fixture(name: &str) -> SourceDocument {
        let path = format!("{}/tests/fixtures/site/{}", env!("CARGO_MANIFEST_DIR"), name);
        SourceDocument::new(name, std::fs::read_to_string(path).unwrap())
    }

    #[test]
    fn total_lines_matches_physical_lines() {
        let doc = SourceDocument::new("a.html", "<p>1</p>\n<p>2</p>\n<p>3</p>\n");
        assert_eq!(AnalysisEngine::new().analyze(&doc).total_lines, 3);
    }

    #[test]
    fn block_content_reslices_from_source() {
        let doc = fixture("index.html");
        let analysis = AnalysisEngine::new().analyze(&doc);
        assert!(!analysis.css_blocks.is_empty());
        assert!(!analysis.js_blocks.is_empty());
        for b in &analysis.css_blocks {
            assert_eq!(
                slice_lines(&doc.content, b.start_line, b.end_line).as_deref(),
                Some(b.content.as_str())
            );
        }
        for b in &analysis.js_blocks {
            assert_eq!(
                slice_lines(&doc.content, b.start_line, b.end_line).as_deref(),
                Some(b.content.as_str())
            );
        }
    }

    #[test]
    fn malformed_document_yields_warning_not_failure() {
        let doc = SourceDocument::new("broken.html", "<p>ok</p>\n<script>\nlet x = 1;\n");
        let analysis = AnalysisEngine::new().analyze(&doc);
        assert_eq!(analysis.js_blocks.len(), 1);
        assert_eq!(analysis.js_blocks[0].end_line, 3);
        assert_eq!(analysis.warnings.len(), 1);
        assert_eq!(analysis.warnings[0].file, "broken.html");
    }

    #[test]
    fn analyze_all_preserves_order() {
        let docs = vec![fixture("index.html"), fixture("about.html"), fixture("blog/post.html")];
        let analyzed = AnalysisEngine::new().analyze_all(docs);
        let names: Vec<&str> = analyzed.iter().map(|d| d.analysis.file_name.as_str()).collect();
        assert_eq!(names, vec!["index.html", "about.html", "blog/post.html"]);
    }
}
