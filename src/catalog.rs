//! Corpus-wide asset catalog: deduplication, existence checks and the
//! grouped manifest written to `public/asset-manifest.json`.

use crate::model::{AnalyzedDocument, AssetManifest, AssetType, CatalogedAsset};
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Manifest destination, relative to the project root.
pub const ASSET_MANIFEST: &str = "public/asset-manifest.json";

const REMOTE_PREFIXES: &[&str] = &["http://", "https://", "//", "data:", "mailto:", "tel:", "blob:"];

/// Dedup key for a reference made by `document`: whitespace trimmed, query
/// and fragment dropped. Local references become root-absolute, relative
/// ones joined with the document's directory and `.`/`..` collapsed, so
/// `img/a.png` in `blog/post.html` is `/blog/img/a.png`. Remote URLs and
/// data URIs are kept as written.
pub fn normalize_path(document: &str, path: &str) -> String {
    let p = path.trim();
    if p.starts_with("data:") {
        return p.to_string();
    }
    let p = &p[..p.find(['?', '#']).unwrap_or(p.len())];
    if p.is_empty() || is_remote(p) {
        return p.to_string();
    }
    let mut segments: Vec<&str> = Vec::new();
    if !p.starts_with('/') {
        if let Some((dir, _)) = document.rsplit_once('/') {
            segments.extend(dir.split('/').filter(|s| !s.is_empty()));
        }
    }
    for segment in p.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    format!("/{}", segments.join("/"))
}

pub fn is_remote(path: &str) -> bool {
    let lower = path.trim().to_ascii_lowercase();
    REMOTE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Every asset of every document, deduplicated by normalized path.
///
/// The earliest occurrence (document order, then line) is kept as provenance.
pub fn catalog_all_assets(docs: &[AnalyzedDocument]) -> Vec<CatalogedAsset> {
    let mut out: Vec<CatalogedAsset> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for doc in docs {
        for asset in &doc.analysis.assets {
            let key = normalize_path(&doc.analysis.file_name, &asset.path);
            if key.is_empty() {
                continue;
            }
            if let Some(&idx) = seen.get(&key) {
                out[idx].occurrences += 1;
                continue;
            }
            seen.insert(key.clone(), out.len());
            out.push(CatalogedAsset {
                normalized_path: key,
                reference: asset.clone(),
                source_file: doc.analysis.file_name.clone(),
                occurrences: 1,
            });
        }
    }
    debug!(unique = out.len(), "assets cataloged");
    out
}

/// Local assets that do not resolve to a file under `asset_root`.
///
/// Remote URLs, data URIs and meta values that are not file paths are
/// skipped. Returns normalized paths in catalog order.
pub fn validate_asset_existence(assets: &[CatalogedAsset], asset_root: &Path) -> Vec<String> {
    assets
        .iter()
        .filter(|a| is_local_file(a))
        .filter(|a| !resolve(asset_root, &a.normalized_path).is_file())
        .map(|a| a.normalized_path.clone())
        .collect()
}

fn is_local_file(asset: &CatalogedAsset) -> bool {
    let path = asset.normalized_path.as_str();
    if is_remote(path) || path.is_empty() {
        return false;
    }
    if asset.reference.asset_type == AssetType::Meta {
        let raw = asset.reference.path.trim();
        return (raw.starts_with('/') || raw.contains('/'))
            && crate::analysis::assets::extension(raw).is_some()
            && !raw.contains(char::is_whitespace);
    }
    true
}

/// Path of a root-absolute `reference` under `root`.
pub fn resolve(root: &Path, reference: &str) -> std::path::PathBuf {
    root.join(reference.trim_start_matches('/'))
}

/// Group cataloged assets by type for the optimization manifest.
pub fn prepare_for_next_js_optimization(assets: Vec<CatalogedAsset>) -> AssetManifest {
    let mut manifest = AssetManifest::default();
    for asset in assets {
        manifest
            .groups
            .entry(asset.reference.asset_type)
            .or_default()
            .push(asset);
    }
    manifest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::AnalysisEngine;
    use crate::model::SourceDocument;
    use std::path::PathBuf;

    fn fixtures() -> (Vec<AnalyzedDocument>, PathBuf) {
        let base = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
        let docs = ["index.html", "about.html", "blog/post.html"]
            .iter()
            .map(|n| SourceDocument::new(*n, std::fs::read_to_string(base.join("site").join(n)).unwrap()))
            .collect();
        (AnalysisEngine::new().analyze_all(docs), base.join("public"))
    }

    #[test]
    fn normalization() {
        assert_eq!(normalize_path("index.html", "  ./img/a.png?v=2 "), "/img/a.png");
        assert_eq!(normalize_path("index.html", "/icons.svg#arrow"), "/icons.svg");
        assert_eq!(normalize_path("index.html", "data:image/png"), "data:image/png");
        assert_eq!(normalize_path("a.html", "https://cdn.test/a.png?v=1"), "https://cdn.test/a.png");
    }

    #[test]
    fn relative_references_resolve_against_their_document() {
        assert_eq!(normalize_path("blog/post.html", "img/a.png"), "/blog/img/a.png");
        assert_eq!(normalize_path("blog/post.html", "./img/a.png"), "/blog/img/a.png");
        assert_eq!(normalize_path("blog/post.html", "../img/a.png"), "/img/a.png");
        assert_eq!(normalize_path("blog/post.html", "../../img/a.png"), "/img/a.png");
        assert_eq!(normalize_path("blog/post.html", "/img/a.png"), "/img/a.png");
    }

    #[test]
    fn same_relative_path_in_different_directories() {
        let public = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(public.path().join("blog/img")).unwrap();
        std::fs::write(public.path().join("blog/img/a.png"), "png").unwrap();
        let docs = AnalysisEngine::new().analyze_all(vec![
            SourceDocument::new("index.html", "<img src=\"img/a.png\">"),
            SourceDocument::new("blog/post.html", "<img src=\"img/a.png\">"),
        ]);
        let assets = catalog_all_assets(&docs);
        let keys: Vec<&str> = assets.iter().map(|a| a.normalized_path.as_str()).collect();
        assert_eq!(keys, vec!["/img/a.png", "/blog/img/a.png"]);
        assert_eq!(validate_asset_existence(&assets, public.path()), vec!["/img/a.png".to_string()]);
    }

    #[test]
    fn dedup_keeps_earliest_occurrence() {
        let docs = AnalysisEngine::new().analyze_all(vec![
            SourceDocument::new("a.html", "<p>x</p>\n<img src=\"./logo.png?v=1\">"),
            SourceDocument::new("b.html", "<img src=\"logo.png\">\n<img src=\"logo.png#x\">"),
        ]);
        let assets = catalog_all_assets(&docs);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].source_file, "a.html");
        assert_eq!(assets[0].reference.line, 2);
        assert_eq!(assets[0].occurrences, 3);
    }

    #[test]
    fn missing_local_assets_reported() {
        let (docs, public) = fixtures();
        let assets = catalog_all_assets(&docs);
        let missing = validate_asset_existence(&assets, &public);
        assert_eq!(missing, vec!["/img/two.png".to_string(), "/js/main.js".to_string()]);
    }

    #[test]
    fn manifest_groups_by_type() {
        let (docs, _) = fixtures();
        let manifest = prepare_for_next_js_optimization(catalog_all_assets(&docs));
        let images: Vec<&str> = manifest.groups[&AssetType::Image]
            .iter()
            .map(|a| a.normalized_path.as_str())
            .collect();
        assert!(images.contains(&"/img/hero.png"));
        assert!(!images.contains(&"img/hero.png"));
        let hero = manifest.iter().find(|a| a.normalized_path == "/img/hero.png").unwrap();
        assert_eq!(hero.source_file, "index.html");
        assert_eq!(hero.occurrences, 2);
        assert_eq!(manifest.groups[&AssetType::Font].len(), 1);
        assert_eq!(manifest.groups[&AssetType::Script].len(), 1);
        assert!(manifest.iter().all(|a| a.occurrences >= 1));
    }
}
