//! HTML normalization for analysis: simplification, smart truncation, and
//! preprocessing node removal.

use scraper::{ElementRef, Html, Selector};
use tracing::debug;

/// Tags whose subtrees carry no structural signal for analysis.
const STRIP_TAGS: &[&str] = &["script", "style", "noscript", "svg", "iframe", "meta"];

/// Elements with no closing tag.
const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "source", "track", "wbr",
];

/// Main-content selectors tried before hard truncation, most specific first.
const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "main",
    "article",
    "[role=\"main\"]",
    "#content",
    "#main",
    ".content",
    ".main-content",
];

/// Strip volatile content from a document, retaining tag/class/id structure
/// and text: script/style/noscript/svg/iframe subtrees, stylesheet links,
/// meta tags, comments, and all `data-*`, `style`, and `on*` attributes.
pub fn simplify(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::with_capacity(html.len() / 2);
    write_simplified(document.root_element(), &mut out);
    out
}

fn write_simplified(element: ElementRef<'_>, out: &mut String) {
    let el = element.value();
    let name = el.name();

    if STRIP_TAGS.contains(&name) {
        return;
    }
    if name == "link"
        && el
            .attr("rel")
            .is_some_and(|rel| rel.eq_ignore_ascii_case("stylesheet"))
    {
        return;
    }

    out.push('<');
    out.push_str(name);
    for (attr, value) in el.attrs() {
        if attr == "style" || attr.starts_with("on") || attr.starts_with("data-") {
            continue;
        }
        out.push(' ');
        out.push_str(attr);
        out.push_str("=\"");
        out.push_str(&value.replace('"', "&quot;"));
        out.push('"');
    }

    if VOID_TAGS.contains(&name) {
        out.push_str("/>");
        return;
    }
    out.push('>');

    for child in element.children() {
        if let Some(child_el) = ElementRef::wrap(child) {
            write_simplified(child_el, out);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                out.push_str(trimmed);
                out.push(' ');
            }
        }
        // comments and doctypes are dropped
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

/// Bound simplified HTML for the analysis prompt.
///
/// When the document exceeds the limit, prefer extracting a recognized
/// main-content region over truncating the raw document, so the record list
/// is not cut off in favor of header/nav boilerplate.
pub fn truncate_for_analysis(simplified: &str, limit: usize) -> String {
    if simplified.len() <= limit {
        return simplified.to_string();
    }

    let document = Html::parse_document(simplified);
    for selector_str in MAIN_CONTENT_SELECTORS {
        let Ok(selector) = Selector::parse(selector_str) else {
            continue;
        };
        if let Some(main) = document.select(&selector).next() {
            let region = main.html();
            debug!(
                selector = selector_str,
                region_len = region.len(),
                "truncating to main-content region"
            );
            return truncate_at_boundary(&region, limit).to_string();
        }
    }

    truncate_at_boundary(simplified, limit).to_string()
}

/// Remove all nodes matching a selector, returning the remaining document.
/// An unparseable selector leaves the document untouched.
pub fn remove_nodes(html: &str, selector_str: &str) -> String {
    let mut document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(selector_str) else {
        return html.to_string();
    };

    let ids: Vec<_> = document.select(&selector).map(|el| el.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
    document.root_element().html()
}

fn truncate_at_boundary(s: &str, limit: usize) -> &str {
    if s.len() <= limit {
        return s;
    }
    let mut end = limit;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
