//! Property-based tests for line ranges, command text, scaffolds, cascade
//! order and component boundaries.

use html_migrate::analysis::{extract_css_blocks, find_framer_motion_code, identify_components};
use html_migrate::analysis::AnalysisEngine;
use html_migrate::css::{consolidate_css, render_stylesheet};
use html_migrate::lines::slice_lines;
use html_migrate::mapper::generate_component_template;
use html_migrate::model::{AnalyzedDocument, SourceDocument};
use html_migrate::planner::generate_extract_command;
use proptest::prelude::*;

/// A document section: plain text lines, or a style/script region with body lines.
#[derive(Debug, Clone)]
enum Chunk {
    Text(Vec<String>),
    Style(Vec<String>),
    Script(Vec<String>),
}

fn chunk() -> impl Strategy<Value = Chunk> {
    let text = prop::collection::vec("[a-z ]{0,24}", 1..4);
    let body = prop::collection::vec("[a-z{};:. -]{0,20}", 0..4);
    prop_oneof![
        text.prop_map(Chunk::Text),
        body.clone().prop_map(Chunk::Style),
        body.prop_map(Chunk::Script),
    ]
}

/// Render chunks; returns the text plus expected `(start, end)` for style and script regions.
fn render(chunks: &[Chunk]) -> (String, Vec<(usize, usize)>, Vec<(usize, usize)>) {
    let mut lines: Vec<String> = Vec::new();
    let mut styles = Vec::new();
    let mut scripts = Vec::new();
    for c in chunks {
        match c {
            Chunk::Text(t) => lines.extend(t.iter().map(|l| format!("<p>{l}</p>"))),
            Chunk::Style(body) | Chunk::Script(body) => {
                let tag = if matches!(c, Chunk::Style(_)) { "style" } else { "script" };
                let start = lines.len() + 1;
                lines.push(format!("<{tag}>"));
                lines.extend(body.iter().cloned());
                lines.push(format!("</{tag}>"));
                let range = (start, lines.len());
                if tag == "style" {
                    styles.push(range);
                } else {
                    scripts.push(range);
                }
            }
        }
    }
    (lines.join("\n"), styles, scripts)
}

fn analyzed(name: &str, text: &str) -> AnalyzedDocument {
    let source = SourceDocument::new(name, text);
    let analysis = AnalysisEngine::new().analyze(&source);
    AnalyzedDocument { source, analysis }
}

/// Nested landmark markup: each entry is the number of articles inside a section.
fn sections(shape: &[usize]) -> String {
    let mut lines = vec!["<body>".to_string(), "<p>intro</p>".to_string()];
    for (i, articles) in shape.iter().enumerate() {
        lines.push(format!("<section class=\"s{i}\">"));
        lines.push(format!("<h2>Section {i}</h2>"));
        for j in 0..*articles {
            lines.push(format!("<article class=\"a{j}\">"));
            lines.push("<p>text</p>".to_string());
            lines.push("</article>".to_string());
        }
        lines.push("</section>".to_string());
        lines.push("<p>between</p>".to_string());
    }
    lines.push("</body>".to_string());
    lines.join("\n")
}

proptest! {
    #[test]
    fn block_ranges_reslice_to_content(chunks in prop::collection::vec(chunk(), 1..8)) {
        let (text, styles, scripts) = render(&chunks);

        let css = extract_css_blocks(&text);
        let found: Vec<(usize, usize)> = css.iter().map(|b| (b.start_line, b.end_line)).collect();
        prop_assert_eq!(found, styles);
        for b in &css {
            prop_assert_eq!(b.content.lines().count(), b.end_line - b.start_line + 1);
            prop_assert_eq!(slice_lines(&text, b.start_line, b.end_line), Some(b.content.clone()));
        }

        let js = find_framer_motion_code(&text);
        let found: Vec<(usize, usize)> = js.iter().map(|b| (b.start_line, b.end_line)).collect();
        prop_assert_eq!(found, scripts);
        for b in &js {
            prop_assert_eq!(slice_lines(&text, b.start_line, b.end_line), Some(b.content.clone()));
        }
    }

    #[test]
    fn extract_command_skip_and_first(start in 1usize..100_000, additional in 0usize..100_000) {
        let cmd = generate_extract_command("test.html", start, start + additional);
        let skip = format!("-Skip {} ", start - 1);
        let first = format!("-First {} ", additional + 1);
        prop_assert!(cmd.contains(&skip));
        prop_assert!(cmd.contains(&first));
        prop_assert!(cmd.starts_with("Get-Content \"test.html\""));
        prop_assert!(cmd.ends_with("| Set-Content \"temp_extract.txt\""));
    }

    #[test]
    fn scaffold_contains_name_and_markup(name in "[A-Z][A-Za-z0-9]{0,15}", markup in any::<String>()) {
        let scaffold = generate_component_template(&name, &markup, &[]);
        prop_assert!(scaffold.contains(&name));
        prop_assert!(scaffold.contains(&markup));
    }

    #[test]
    fn stylesheet_is_deterministic_and_order_sensitive(
        a in prop::collection::vec("[a-z]{1,8}", 1..4),
        b in prop::collection::vec("[a-z]{1,8}", 1..4),
    ) {
        let doc = |name: &str, rules: &[String]| {
            let body: Vec<String> = rules.iter().map(|r| format!(".{r} {{ color: red; }}")).collect();
            analyzed(name, &format!("<style>\n{}\n</style>", body.join("\n")))
        };
        let forward = vec![doc("a.html", &a[..]), doc("b.html", &b[..])];
        let reversed = vec![doc("b.html", &b[..]), doc("a.html", &a[..])];

        let first = render_stylesheet(&consolidate_css(&forward));
        let again = render_stylesheet(&consolidate_css(&forward));
        prop_assert_eq!(&first, &again);

        let swapped = render_stylesheet(&consolidate_css(&reversed));
        prop_assert_ne!(&first, &swapped);
        prop_assert!(first.find("a.html").unwrap() < first.find("b.html").unwrap());
        prop_assert!(swapped.find("b.html").unwrap() < swapped.find("a.html").unwrap());
    }

    #[test]
    fn boundaries_are_valid_and_disjoint(shape in prop::collection::vec(0usize..4, 1..6)) {
        let text = sections(&shape);
        let total = text.lines().count();
        let top = identify_components(&text);
        prop_assert_eq!(top.len(), shape.len());

        for c in &top {
            let mut all = Vec::new();
            c.walk(&mut all);
            for b in all {
                prop_assert!(b.start_line > 0);
                prop_assert!(b.end_line >= b.start_line);
                prop_assert!(b.end_line <= total);
            }
            for child in &c.children {
                prop_assert!(child.start_line > c.start_line && child.end_line < c.end_line);
            }
        }
        for pair in top.windows(2) {
            prop_assert!(pair[0].end_line < pair[1].start_line);
        }
    }
}

#[test]
fn style_region_after_ten_lines() {
    let mut lines: Vec<String> = (1..=10).map(|i| format!("<p>line {i}</p>")).collect();
    lines.push("<style>".to_string());
    lines.push("body { margin: 0; }".to_string());
    lines.push("</style>".to_string());
    lines.extend((1..=20).map(|i| format!("<p>after {i}</p>")));
    let text = lines.join("\n");

    let blocks = extract_css_blocks(&text);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].start_line, 11);
    assert_eq!(blocks[0].end_line, 13);
}

#[test]
fn concrete_extract_command() {
    assert_eq!(
        generate_extract_command("test.html", 5, 10),
        "Get-Content \"test.html\" | Select-Object -Skip 4 -First 6 | Set-Content \"temp_extract.txt\""
    );
}
