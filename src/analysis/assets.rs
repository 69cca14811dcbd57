//! Per-document asset references.
//!
//! Collects every image, font, script, svg, stylesheet and meta reference
//! with the line of its value. No deduplication happens here.

use super::markup::{tokenize, Tag, TagKind};
use crate::lines::LineIndex;
use crate::model::{AssetReference, AssetType};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static RE_CSS_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"url\(\s*(?:"([^"]*)"|'([^']*)'|([^)'"\s]+))\s*\)"#).unwrap()
});

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "gif", "webp", "avif", "bmp", "ico", "tif", "tiff",
];

const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];

const FONT_HOSTS: &[&str] = &["fonts.googleapis.com", "fonts.gstatic.com", "use.typekit.net"];

/// Attributes kept on the reference for downstream consumers.
const KEPT_ATTRS: &[&str] = &[
    "alt", "width", "height", "rel", "as", "type", "name", "property", "media", "loading", "sizes",
    "crossorigin",
];

/// All asset references in source order.
pub fn catalog_assets(text: &str) -> Vec<AssetReference> {
    let index = LineIndex::new(text);
    let mut found: Vec<(usize, AssetReference)> = Vec::new();

    for tag in tokenize(text) {
        if tag.kind == TagKind::Close {
            continue;
        }
        collect_from_tag(&tag, &index, &mut found);
    }

    for caps in RE_CSS_URL.captures_iter(text) {
        let Some(value) = caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)) else {
            continue;
        };
        let Some(asset_type) = classify_url(value.as_str()) else {
            continue;
        };
        found.push((
            value.start(),
            AssetReference {
                asset_type,
                path: reference_path(value.as_str()),
                line: index.line_of(value.start()),
                attributes: BTreeMap::new(),
            },
        ));
    }

    found.sort_by_key(|(offset, _)| *offset);
    found.into_iter().map(|(_, asset)| asset).collect()
}

fn collect_from_tag(tag: &Tag, index: &LineIndex, found: &mut Vec<(usize, AssetReference)>) {
    let mut push = |asset_type: AssetType, attr: &str| {
        let Some(a) = tag.attrs.iter().find(|a| a.name == attr) else {
            return;
        };
        let Some(value) = a.value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
            return;
        };
        found.push((
            a.offset,
            AssetReference {
                asset_type,
                path: reference_path(value),
                line: index.line_of(a.offset),
                attributes: kept_attributes(tag),
            },
        ));
    };

    match tag.name.as_str() {
        "img" | "source" => {
            if let Some(src) = tag.attr("src") {
                push(classify_url(src).unwrap_or(AssetType::Image), "src");
            }
            if let Some(srcset) = tag.attr("srcset") {
                let a = tag.attrs.iter().find(|a| a.name == "srcset");
                for candidate in srcset.split(',') {
                    let Some(url) = candidate.split_whitespace().next() else {
                        continue;
                    };
                    let offset = a.map_or(tag.start, |a| a.offset);
                    found.push((
                        offset,
                        AssetReference {
                            asset_type: classify_url(url).unwrap_or(AssetType::Image),
                            path: reference_path(url),
                            line: index.line_of(offset),
                            attributes: kept_attributes(tag),
                        },
                    ));
                }
            }
        }
        "script" => {
            if tag.attr("src").is_some() {
                push(AssetType::Script, "src");
            }
        }
        "link" => {
            if let Some(href) = tag.attr("href") {
                push(classify_link(tag, href), "href");
            }
        }
        "meta" => {
            if tag.attr("content").is_some() {
                push(AssetType::Meta, "content");
            }
        }
        "use" | "image" => {
            let attr = if tag.attr("href").is_some() { "href" } else { "xlink:href" };
            if let Some(href) = tag.attr(attr) {
                if !href.starts_with('#') {
                    push(classify_url(href).unwrap_or(AssetType::Svg), attr);
                }
            }
        }
        "video" | "audio" => {
            if tag.attr("poster").is_some() {
                push(AssetType::Image, "poster");
            }
        }
        _ => {}
    }
}

fn classify_link(tag: &Tag, href: &str) -> AssetType {
    let rel = tag.attr("rel").unwrap_or_default().to_ascii_lowercase();
    let as_attr = tag.attr("as").unwrap_or_default().to_ascii_lowercase();
    if FONT_HOSTS.iter().any(|h| href.contains(h)) || as_attr == "font" {
        return AssetType::Font;
    }
    if let Some(kind) = classify_url(href) {
        return kind;
    }
    match as_attr.as_str() {
        "image" => return AssetType::Image,
        "script" => return AssetType::Script,
        _ => {}
    }
    if rel.contains("icon") {
        AssetType::Image
    } else if rel.contains("modulepreload") {
        AssetType::Script
    } else {
        AssetType::Css
    }
}

/// Type implied by a URL's extension or data-URI media type.
fn classify_url(url: &str) -> Option<AssetType> {
    let url = url.trim();
    if let Some(rest) = url.strip_prefix("data:") {
        return if rest.starts_with("image/svg") {
            Some(AssetType::Svg)
        } else if rest.starts_with("image/") {
            Some(AssetType::Image)
        } else if rest.starts_with("font/") || rest.starts_with("application/font") {
            Some(AssetType::Font)
        } else {
            None
        };
    }
    let ext = extension(url)?;
    if ext == "svg" {
        Some(AssetType::Svg)
    } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetType::Image)
    } else if FONT_EXTENSIONS.contains(&ext.as_str()) {
        Some(AssetType::Font)
    } else if ext == "js" || ext == "mjs" {
        Some(AssetType::Script)
    } else if ext == "css" {
        Some(AssetType::Css)
    } else {
        None
    }
}

/// Lowercased extension of the last path segment, query and fragment ignored.
pub(crate) fn extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = segment.rsplit_once('.')?;
    Some(ext.to_ascii_lowercase())
}

/// Literal reference, with data URIs reduced to their media-type flag.
fn reference_path(value: &str) -> String {
    let value = value.trim();
    if value.starts_with("data:") {
        let end = value.find([';', ',']).unwrap_or(value.len());
        return value[..end].to_string();
    }
    value.to_string()
}

fn kept_attributes(tag: &Tag) -> BTreeMap<String, String> {
    tag.attrs
        .iter()
        .filter(|a| KEPT_ATTRS.contains(&a.name.as_str()))
        .filter_map(|a| a.value.clone().map(|v| (a.name.clone(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn images_with_lines() {
        let text = "<p>x</p>\n<img\n  alt=\"Hero\"\n  src=\"./img/hero.png\">";
        let assets = catalog_assets(text);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].asset_type, AssetType::Image);
        assert_eq!(assets[0].path, "./img/hero.png");
        assert_eq!(assets[0].line, 4);
        assert_eq!(assets[0].attributes.get("alt").map(String::as_str), Some("Hero"));
    }

    #[test]
    fn srcset_entries_each_recorded() {
        let assets = catalog_assets(r#"<img srcset="a.webp 1x, b.webp 2x" src="a.webp">"#);
        let paths: Vec<&str> = assets.iter().map(|a| a.path.as_str()).collect();
        assert_eq!(paths, vec!["a.webp", "b.webp", "a.webp"]);
    }

    #[test]
    fn fonts_scripts_css_meta() {
        let text = r#"<link rel="stylesheet" href="https://fonts.googleapis.com/css2?family=Inter">
<link rel="stylesheet" href="/styles/site.css">
<link rel="icon" href="/favicon.ico">
<script src="/js/main.js"></script>
<meta property="og:image" content="https://example.com/og.png">"#;
        let kinds: Vec<AssetType> = catalog_assets(text).iter().map(|a| a.asset_type).collect();
        assert_eq!(
            kinds,
            vec![
                AssetType::Font,
                AssetType::Css,
                AssetType::Image,
                AssetType::Script,
                AssetType::Meta
            ]
        );
    }

    #[test]
    fn css_urls_classified_by_extension() {
        let text = "<style>\n@font-face { src: url('/f/inter.woff2'); }\n.a { background: url(/img/bg.jpg); }\n.b { clip-path: url(#mask); }\n</style>";
        let assets = catalog_assets(text);
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[0].asset_type, AssetType::Font);
        assert_eq!(assets[0].line, 2);
        assert_eq!(assets[1].asset_type, AssetType::Image);
        assert_eq!(assets[1].line, 3);
    }

    #[test]
    fn data_uris_reduced_to_flag() {
        let assets = catalog_assets(r#"<img src="data:image/svg+xml;base64,PHN2Zz4=">"#);
        assert_eq!(assets[0].asset_type, AssetType::Svg);
        assert_eq!(assets[0].path, "data:image/svg+xml");
    }

    #[test]
    fn duplicates_are_kept() {
        let assets = catalog_assets("<img src=\"a.png\">\n<img src=\"a.png\">");
        assert_eq!(assets.len(), 2);
        assert_eq!(assets[1].line, 2);
    }

    #[test]
    fn svg_sprite_use() {
        let assets = catalog_assets(r##"<svg><use href="/icons.svg#arrow"></use><use href="#local"></use></svg>"##);
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].asset_type, AssetType::Svg);
    }
}
