//! Identifier and path-segment generation.
//!
//! Component names must be valid JSX component identifiers; route segments
//! must be URL-safe. Both follow the same filter-then-join approach as a
//! GitHub heading slug.

/// PascalCase identifier from an arbitrary label.
///
/// "Works Mobile" → "WorksMobile", "card/project" → "CardProject",
/// "framer-9gn1mz" → "Framer9gn1mz". Never empty; a leading digit gets a
/// `Component` prefix.
pub fn pascal_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for word in label.split(|c: char| !c.is_ascii_alphanumeric()) {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars);
        }
    }
    if out.is_empty() {
        return "Component".to_string();
    }
    if out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert_str(0, "Component");
    }
    out
}

/// Lowercase, hyphenated path segment.
///
/// "About Me" → "about-me", "my_page" → "my-page".
pub fn slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;
    for c in text.to_lowercase().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Make `base` unique against `taken` by appending 2, 3, …
pub fn unique_name(base: &str, taken: &mut std::collections::HashSet<String>) -> String {
    if taken.insert(base.to_string()) {
        return base.to_string();
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}{n}");
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// File stem of a `/`-separated path without its HTML extension.
/// "blog/post.html" → "post", "index.htm" → "index"
pub fn document_stem(path: &str) -> &str {
    let filename = path.rsplit('/').next().unwrap_or(path);
    filename
        .strip_suffix(".html")
        .or_else(|| filename.strip_suffix(".htm"))
        .unwrap_or(filename)
}
