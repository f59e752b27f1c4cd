//! Structure hashing for cache invalidation.
//!
//! The hash fingerprints a document's DOM skeleton (tags, classes, nesting)
//! while ignoring text content, so cosmetic content changes do not force
//! re-analysis but layout changes do.

use scraper::{ElementRef, Html};
use sha2::{Digest, Sha256};

/// Subtrees excluded from the skeleton; their contents churn without the
/// page layout changing.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "svg", "iframe"];

/// Compute the structure hash of a document.
///
/// Deterministic for a fixed document and stable under text-only edits that
/// do not change tag/class/nesting shape.
pub fn structure_hash(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut skeleton = String::new();
    write_skeleton(document.root_element(), &mut skeleton);

    let mut hasher = Sha256::new();
    hasher.update(skeleton.as_bytes());
    hex::encode(hasher.finalize())
}

fn write_skeleton(element: ElementRef<'_>, out: &mut String) {
    let el = element.value();
    let name = el.name();
    if SKIP_TAGS.contains(&name) {
        return;
    }

    out.push_str(name);
    // Sorted so attribute ordering in the source does not change the hash
    let mut classes: Vec<&str> = el.classes().collect();
    classes.sort_unstable();
    for class in classes {
        out.push('.');
        out.push_str(class);
    }

    out.push('(');
    for child in element.children().filter_map(ElementRef::wrap) {
        write_skeleton(child, out);
        out.push(' ');
    }
    out.push(')');
}
