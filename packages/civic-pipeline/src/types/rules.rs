//! The AI-derived extraction recipe.
//!
//! These shapes mirror the JSON the model is asked to emit. They deserialize
//! tolerantly (`#[serde(default)]` on everything optional) because model
//! output is untrusted; structural validation happens separately in the
//! analyzer before a rule set is accepted.

use serde::{Deserialize, Deserializer, Serialize};

/// How a field's value is pulled out of an item node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    Text,
    Attribute,
    Html,
    Regex,
}

/// One field's extraction recipe.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub field_name: String,

    /// CSS selector relative to the item node. Empty or "." means the item
    /// node itself.
    #[serde(default)]
    pub selector: String,

    pub extraction_method: ExtractionMethod,

    /// Attribute name, set iff method is `attribute`
    #[serde(default)]
    pub attribute: Option<String>,

    /// Regex pattern, set iff method is `regex`
    #[serde(default)]
    pub regex_pattern: Option<String>,

    /// Capture group index for regex extraction (defaults to 1)
    #[serde(default)]
    pub regex_group: Option<usize>,

    /// Transform pipeline, applied in declared order. Accepts a single
    /// string or a list in the model JSON.
    #[serde(default, deserialize_with = "string_or_list")]
    pub transform: Vec<String>,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub default_value: Option<String>,
}

/// Pagination behavior for multi-page sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(rename = "type")]
    pub kind: PaginationKind,

    /// Selector for the next-page link (NextLink only)
    #[serde(default)]
    pub selector: Option<String>,

    /// Bound on follow-link traversal
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
}

fn default_max_pages() -> u32 {
    5
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationKind {
    None,
    NextLink,
}

/// Preprocessing applied to the document before the extraction pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PreprocessStep {
    /// Remove all nodes matching a selector
    Remove { selector: String },
}

/// The complete recipe derived from one structural analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRuleSet {
    /// Must resolve to one container node wrapping the record list
    pub container_selector: String,

    /// Matches each record within the container (zero or more nodes)
    pub item_selector: String,

    /// Non-empty; validated by the analyzer
    pub field_mappings: Vec<FieldMapping>,

    #[serde(default)]
    pub pagination: Option<Pagination>,

    #[serde(default)]
    pub preprocessing: Vec<PreprocessStep>,

    /// Model's notes about the page structure it observed
    #[serde(default)]
    pub notes: Option<String>,
}

/// Accept `"trim"` or `["trim", "lowercase"]` for transform pipelines.
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(Raw::One(s)) => vec![s],
        Some(Raw::Many(v)) => v,
    })
}
