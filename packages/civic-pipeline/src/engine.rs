//! Rule-driven extraction: apply an active manifest's rules to fresh HTML.
//!
//! Per-item tolerance is the policy: a record missing a required field is
//! dropped with a warning and extraction continues. Only container-level
//! problems (selector invalid, container absent) are run-level errors.

use scraper::{ElementRef, Html, Selector};
use std::borrow::Cow;
use tracing::{debug, warn};
use url::Url;

use crate::error::EngineError;
use crate::html;
use crate::transforms::Transform;
use crate::types::{
    ExtractionMethod, ExtractionRuleSet, FieldMapping, Pagination, PaginationKind,
    PreprocessStep, RawExtractionResult, RawItem,
};

/// Apply a rule set to a document.
///
/// `base_url` is the page's own URL, used by the `url_resolve` transform.
pub fn extract(
    page_html: &str,
    rules: &ExtractionRuleSet,
    base_url: Option<&Url>,
) -> RawExtractionResult {
    let mut result = RawExtractionResult::default();

    let working: Cow<'_, str> = if rules.preprocessing.is_empty() {
        Cow::Borrowed(page_html)
    } else {
        let mut cleaned = page_html.to_string();
        for step in &rules.preprocessing {
            match step {
                PreprocessStep::Remove { selector } => {
                    cleaned = html::remove_nodes(&cleaned, selector);
                }
            }
        }
        Cow::Owned(cleaned)
    };

    let document = Html::parse_document(&working);

    let Ok(container_selector) = Selector::parse(&rules.container_selector) else {
        result.errors.push(
            EngineError::InvalidSelector {
                selector: rules.container_selector.clone(),
            }
            .to_string(),
        );
        return result;
    };
    let Some(container) = document.select(&container_selector).next() else {
        result.errors.push(
            EngineError::ContainerNotFound {
                selector: rules.container_selector.clone(),
            }
            .to_string(),
        );
        return result;
    };

    let Ok(item_selector) = Selector::parse(&rules.item_selector) else {
        result.errors.push(
            EngineError::InvalidSelector {
                selector: rules.item_selector.clone(),
            }
            .to_string(),
        );
        return result;
    };

    let items: Vec<ElementRef<'_>> = container.select(&item_selector).collect();
    result.items_matched = items.len();
    if items.is_empty() {
        result
            .warnings
            .push(format!("no items matched '{}'", rules.item_selector));
    }

    for (index, item) in items.iter().enumerate() {
        match extract_item(*item, &rules.field_mappings, base_url, &mut result.warnings) {
            Ok(fields) => result.items.push(fields),
            Err(reason) => {
                result.warnings.push(format!("item {index} dropped: {reason}"));
            }
        }
    }

    result.success = !result.items.is_empty();
    debug!(
        container = %rules.container_selector,
        matched = items.len(),
        extracted = result.items.len(),
        warnings = result.warnings.len(),
        "extraction pass complete"
    );
    result
}

/// Next-page URL for NextLink pagination, resolved against the base URL.
pub fn next_page_url(
    page_html: &str,
    pagination: &Pagination,
    base_url: Option<&Url>,
) -> Option<String> {
    if pagination.kind != PaginationKind::NextLink {
        return None;
    }
    let selector_str = pagination.selector.as_deref()?;
    let document = Html::parse_document(page_html);
    let selector = Selector::parse(selector_str).ok()?;
    let href = document.select(&selector).next()?.value().attr("href")?;

    match base_url {
        Some(base) => base.join(href).ok().map(|url| url.to_string()),
        None => Some(href.to_string()),
    }
}

fn extract_item(
    item: ElementRef<'_>,
    mappings: &[FieldMapping],
    base_url: Option<&Url>,
    warnings: &mut Vec<String>,
) -> Result<RawItem, String> {
    let mut fields = RawItem::new();

    for mapping in mappings {
        let extracted = extract_field(item, mapping)
            .map(|value| apply_transforms(value, mapping, base_url, warnings))
            .filter(|value| !value.is_empty());

        match extracted {
            Some(value) => {
                fields.insert(mapping.field_name.clone(), value);
            }
            None => match &mapping.default_value {
                Some(default) => {
                    fields.insert(mapping.field_name.clone(), default.clone());
                }
                None if mapping.required => {
                    return Err(format!(
                        "required field '{}' yielded no value",
                        mapping.field_name
                    ));
                }
                None => {}
            },
        }
    }

    Ok(fields)
}

fn extract_field(item: ElementRef<'_>, mapping: &FieldMapping) -> Option<String> {
    let selector_str = mapping.selector.trim();
    let target = if selector_str.is_empty() || selector_str == "." {
        item
    } else {
        let selector = Selector::parse(selector_str).ok()?;
        item.select(&selector).next()?
    };

    let value = match mapping.extraction_method {
        ExtractionMethod::Text => Some(collapse_whitespace(&target.text().collect::<String>())),
        ExtractionMethod::Attribute => mapping
            .attribute
            .as_deref()
            .and_then(|name| target.value().attr(name))
            .map(str::to_string),
        ExtractionMethod::Html => Some(target.inner_html()),
        ExtractionMethod::Regex => {
            let pattern = mapping.regex_pattern.as_deref()?;
            let Ok(re) = regex::Regex::new(pattern) else {
                warn!(field = %mapping.field_name, pattern, "invalid regex pattern in rule set");
                return None;
            };
            let text = target.text().collect::<String>();
            let captures = re.captures(&text)?;
            let group = mapping.regex_group.unwrap_or(1);
            captures
                .get(group)
                .or_else(|| captures.get(0))
                .map(|m| m.as_str().to_string())
        }
    };

    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn apply_transforms(
    value: String,
    mapping: &FieldMapping,
    base_url: Option<&Url>,
    warnings: &mut Vec<String>,
) -> String {
    let mut current = value;
    for spec in &mapping.transform {
        match Transform::parse(spec) {
            Some(transform) => current = transform.apply(&current, base_url),
            None => {
                let note = format!(
                    "unknown transform '{spec}' on field '{}' skipped",
                    mapping.field_name
                );
                if !warnings.contains(&note) {
                    warnings.push(note);
                }
            }
        }
    }
    current
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(json: &str) -> ExtractionRuleSet {
        serde_json::from_str(json).unwrap()
    }

    const MEMBER_PAGE: &str = r#"<html><body>
        <div class="members-list">
            <div class="member-card">
                <span class="name">Jane Doe</span>
                <span class="district">District 4</span>
                <span class="party">Independent</span>
            </div>
            <div class="member-card">
                <span class="name">John Roe</span>
                <span class="district">District 7</span>
            </div>
        </div>
    </body></html>"#;

    const MEMBER_RULES: &str = r#"{
        "containerSelector": ".members-list",
        "itemSelector": ".member-card",
        "fieldMappings": [
            {"fieldName": "name", "selector": ".name", "extractionMethod": "text", "required": true},
            {"fieldName": "district", "selector": ".district", "extractionMethod": "text", "required": true},
            {"fieldName": "party", "selector": ".party", "extractionMethod": "text"}
        ]
    }"#;

    #[test]
    fn extracts_all_items_with_optional_fields() {
        let result = extract(MEMBER_PAGE, &rules(MEMBER_RULES), None);
        assert!(result.success);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0]["name"], "Jane Doe");
        assert_eq!(result.items[0]["party"], "Independent");
        assert!(!result.items[1].contains_key("party"));
    }

    #[test]
    fn container_not_found_is_fatal() {
        let result = extract("<html><body><p>nothing</p></body></html>", &rules(MEMBER_RULES), None);
        assert!(!result.success);
        assert!(result.items.is_empty());
        assert!(result.errors[0].contains("container not found"));
    }

    #[test]
    fn invalid_container_selector_is_an_error_not_a_panic() {
        let bad = r#"{
            "containerSelector": ":::nope",
            "itemSelector": ".x",
            "fieldMappings": [{"fieldName": "a", "extractionMethod": "text"}]
        }"#;
        let result = extract(MEMBER_PAGE, &rules(bad), None);
        assert!(!result.success);
        assert!(result.errors[0].contains("invalid selector"));
    }

    #[test]
    fn missing_required_field_drops_item_with_warning() {
        let strict = r#"{
            "containerSelector": ".members-list",
            "itemSelector": ".member-card",
            "fieldMappings": [
                {"fieldName": "name", "selector": ".name", "extractionMethod": "text", "required": true},
                {"fieldName": "party", "selector": ".party", "extractionMethod": "text", "required": true}
            ]
        }"#;
        let result = extract(MEMBER_PAGE, &rules(strict), None);
        assert!(result.success);
        assert_eq!(result.items.len(), 1);
        // both cards matched; one was dropped
        assert_eq!(result.items_matched, 2);
        assert!(result.warnings.iter().any(|w| w.contains("party")));
    }

    #[test]
    fn all_items_failing_required_checks_is_not_success() {
        let impossible = r#"{
            "containerSelector": ".members-list",
            "itemSelector": ".member-card",
            "fieldMappings": [
                {"fieldName": "fax", "selector": ".fax", "extractionMethod": "text", "required": true}
            ]
        }"#;
        let result = extract(MEMBER_PAGE, &rules(impossible), None);
        assert!(!result.success);
        assert!(result.items.is_empty());
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn default_value_fills_missing_required_field() {
        let defaulted = r#"{
            "containerSelector": ".members-list",
            "itemSelector": ".member-card",
            "fieldMappings": [
                {"fieldName": "name", "selector": ".name", "extractionMethod": "text", "required": true},
                {"fieldName": "party", "selector": ".party", "extractionMethod": "text", "required": true, "defaultValue": "Unknown"}
            ]
        }"#;
        let result = extract(MEMBER_PAGE, &rules(defaulted), None);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[1]["party"], "Unknown");
    }

    #[test]
    fn attribute_and_regex_methods_extract() {
        let page = r#"<html><body><ul class="filings">
            <li class="filing"><a href="/f/123.pdf">Filing #123 ($5,000.00)</a></li>
        </ul></body></html>"#;
        let mixed = r#"{
            "containerSelector": ".filings",
            "itemSelector": ".filing",
            "fieldMappings": [
                {"fieldName": "url", "selector": "a", "extractionMethod": "attribute", "attribute": "href",
                 "transform": "url_resolve"},
                {"fieldName": "amount", "selector": "a", "extractionMethod": "regex",
                 "regexPattern": "\\(\\$([0-9,.]+)\\)", "regexGroup": 1}
            ]
        }"#;
        let base = Url::parse("https://example.gov/finance/").unwrap();
        let result = extract(page, &rules(mixed), Some(&base));
        assert_eq!(result.items[0]["url"], "https://example.gov/f/123.pdf");
        assert_eq!(result.items[0]["amount"], "5,000.00");
    }

    #[test]
    fn transforms_apply_in_declared_order() {
        let page = r#"<html><body><div class="c"><p class="i"><b>  PROP 12  </b></p></div></body></html>"#;
        let piped = r#"{
            "containerSelector": ".c",
            "itemSelector": ".i",
            "fieldMappings": [
                {"fieldName": "title", "extractionMethod": "html",
                 "transform": ["strip_html", "lowercase"]}
            ]
        }"#;
        let result = extract(page, &rules(piped), None);
        assert_eq!(result.items[0]["title"], "prop 12");
    }

    #[test]
    fn unknown_transform_warns_and_continues() {
        let page = r#"<html><body><div class="c"><p class="i">x</p></div></body></html>"#;
        let odd = r#"{
            "containerSelector": ".c",
            "itemSelector": ".i",
            "fieldMappings": [
                {"fieldName": "v", "extractionMethod": "text", "transform": "sparkle"}
            ]
        }"#;
        let result = extract(page, &rules(odd), None);
        assert!(result.success);
        assert_eq!(result.items[0]["v"], "x");
        assert!(result.warnings.iter().any(|w| w.contains("sparkle")));
    }

    #[test]
    fn preprocessing_removes_nodes_before_extraction() {
        let page = r#"<html><body><div class="c">
            <p class="i">real</p>
            <div class="promo"><p class="i">sponsored</p></div>
        </div></body></html>"#;
        let cleaned = r#"{
            "containerSelector": ".c",
            "itemSelector": ".i",
            "fieldMappings": [{"fieldName": "v", "extractionMethod": "text", "required": true}],
            "preprocessing": [{"action": "remove", "selector": ".promo"}]
        }"#;
        let result = extract(page, &rules(cleaned), None);
        assert_eq!(result.items.len(), 1);
        assert_eq!(result.items[0]["v"], "real");
    }

    #[test]
    fn next_page_url_resolves_relative_links() {
        let page = r#"<html><body><a class="next" href="?page=2">Next</a></body></html>"#;
        let pagination: Pagination =
            serde_json::from_str(r#"{"type": "next_link", "selector": "a.next"}"#).unwrap();
        let base = Url::parse("https://example.gov/meetings").unwrap();
        assert_eq!(
            next_page_url(page, &pagination, Some(&base)).unwrap(),
            "https://example.gov/meetings?page=2"
        );
        assert_eq!(
            next_page_url(page, &pagination, None).unwrap(),
            "?page=2"
        );
    }
}
