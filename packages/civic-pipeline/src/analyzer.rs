//! Structural analysis: derive an extraction rule set from a page.
//!
//! The model's output is an external, adversarial input. Parsing is
//! validate-then-convert: isolate a JSON object (fence-tolerant, balanced
//! brace scan), check the required shape on the raw value, and only then
//! deserialize into `ExtractionRuleSet`.

use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{AnalysisError, AnalysisResult};
use crate::html;
use crate::traits::{GenerateOptions, LanguageModel, PromptTemplates};
use crate::types::{DataSourceConfig, DataType, ExtractionMethod, ExtractionRuleSet};

/// How much of the raw model output to carry in a `Parse` error.
const ERROR_EXCERPT_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Size ceiling for simplified HTML in the prompt
    pub max_html_chars: usize,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            max_html_chars: 12_000,
            max_tokens: 2048,
            temperature: 0.1,
        }
    }
}

/// Result of one structural analysis, with model telemetry for metrics.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub rules: ExtractionRuleSet,

    /// Advisory heuristic score in [0, 1]
    pub confidence: f32,

    /// Hash of the prompt template used
    pub prompt_hash: String,

    pub model_name: String,
    pub tokens_used: u32,
    pub elapsed_ms: u64,
}

/// Derives extraction rule sets by showing the model a page's simplified
/// skeleton. Holds references to the two external capabilities it needs;
/// never touches the manifest store.
pub struct StructuralAnalyzer<'a> {
    model: &'a dyn LanguageModel,
    prompts: &'a dyn PromptTemplates,
    config: AnalyzerConfig,
}

impl<'a> StructuralAnalyzer<'a> {
    pub fn new(
        model: &'a dyn LanguageModel,
        prompts: &'a dyn PromptTemplates,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            model,
            prompts,
            config,
        }
    }

    /// Analyze a page and derive a rule set. The caller assigns the
    /// manifest key and version.
    pub async fn analyze(
        &self,
        page_html: &str,
        source: &DataSourceConfig,
    ) -> AnalysisResult<AnalysisOutcome> {
        let simplified = html::simplify(page_html);
        let truncated = html::truncate_for_analysis(&simplified, self.config.max_html_chars);
        debug!(
            url = %source.url,
            original_len = page_html.len(),
            simplified_len = simplified.len(),
            prompt_html_len = truncated.len(),
            "simplified page for analysis"
        );

        let prompt = self
            .prompts
            .structural_analysis_prompt(source, &truncated)
            .await?;

        let options = GenerateOptions {
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            top_p: 1.0,
        };
        let started = Instant::now();
        let generation = self.model.generate(&prompt.text, &options).await?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let rules = parse_rule_set(&generation.text)?;
        let confidence = estimate_confidence(&rules);

        info!(
            url = %source.url,
            data_type = %source.data_type,
            field_count = rules.field_mappings.len(),
            confidence,
            tokens = generation.tokens_used,
            elapsed_ms,
            "structural analysis complete"
        );

        Ok(AnalysisOutcome {
            rules,
            confidence,
            prompt_hash: prompt.hash,
            model_name: self.model.model_name().to_string(),
            tokens_used: generation.tokens_used,
            elapsed_ms,
        })
    }

    /// Hash of the live prompt template for cache-invalidation checks.
    pub async fn current_prompt_hash(&self, data_type: DataType) -> AnalysisResult<String> {
        self.prompts.prompt_hash(data_type).await
    }
}

/// Parse and validate raw model output into a rule set.
pub fn parse_rule_set(raw: &str) -> AnalysisResult<ExtractionRuleSet> {
    let body = strip_code_fence(raw);
    let json = isolate_json_object(body).ok_or_else(|| parse_error(raw))?;
    let value: Value = serde_json::from_str(json).map_err(|_| parse_error(raw))?;

    validate_shape(&value)?;

    // serde does not tell us which field failed, so use a neutral label
    // rather than blaming fieldMappings for e.g. a bad pagination kind
    let rules: ExtractionRuleSet = serde_json::from_value(value)
        .map_err(|err| AnalysisError::validation("ruleSet", err.to_string()))?;
    validate_field_mappings(&rules)?;
    Ok(rules)
}

/// Strip a surrounding ``` fence (with or without a language tag).
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the fence line ("```json" or bare "```")
    let rest = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

/// Isolate the first balanced JSON object, tracking strings and escapes so
/// braces inside string values (or prose after the object) don't break the
/// scan.
fn isolate_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, byte) in text.as_bytes().iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if *byte == b'\\' {
                escaped = true;
            } else if *byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_error(raw: &str) -> AnalysisError {
    let excerpt: String = raw.chars().take(ERROR_EXCERPT_CHARS).collect();
    AnalysisError::Parse { excerpt }
}

/// Check the required top-level shape before converting, so a missing field
/// surfaces as a `Validation` error naming it rather than a serde failure.
fn validate_shape(value: &Value) -> AnalysisResult<()> {
    let Some(object) = value.as_object() else {
        return Err(AnalysisError::validation(
            "ruleSet",
            "is not a JSON object",
        ));
    };

    for field in ["containerSelector", "itemSelector"] {
        match object.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => {}
            Some(Value::String(_)) => {
                return Err(AnalysisError::validation(field, "is empty"));
            }
            Some(_) => return Err(AnalysisError::validation(field, "must be a string")),
            None => return Err(AnalysisError::validation(field, "is missing")),
        }
    }

    match object.get("fieldMappings") {
        Some(Value::Array(mappings)) if !mappings.is_empty() => Ok(()),
        Some(Value::Array(_)) => Err(AnalysisError::validation("fieldMappings", "is empty")),
        Some(_) => Err(AnalysisError::validation(
            "fieldMappings",
            "must be an array",
        )),
        None => Err(AnalysisError::validation("fieldMappings", "is missing")),
    }
}

/// Per-field invariants: `attribute` iff method=attribute, `regexPattern`
/// iff method=regex.
fn validate_field_mappings(rules: &ExtractionRuleSet) -> AnalysisResult<()> {
    for mapping in &rules.field_mappings {
        if mapping.field_name.trim().is_empty() {
            return Err(AnalysisError::validation("fieldName", "is empty"));
        }
        match mapping.extraction_method {
            ExtractionMethod::Attribute if mapping.attribute.is_none() => {
                return Err(AnalysisError::validation(
                    mapping.field_name.as_str(),
                    "uses the attribute method without an attribute name",
                ));
            }
            ExtractionMethod::Regex if mapping.regex_pattern.is_none() => {
                return Err(AnalysisError::validation(
                    mapping.field_name.as_str(),
                    "uses the regex method without a pattern",
                ));
            }
            _ => {}
        }
        if mapping.attribute.is_some()
            && mapping.extraction_method != ExtractionMethod::Attribute
        {
            return Err(AnalysisError::validation(
                mapping.field_name.as_str(),
                "sets an attribute but does not use the attribute method",
            ));
        }
        if mapping.regex_pattern.is_some()
            && mapping.extraction_method != ExtractionMethod::Regex
        {
            return Err(AnalysisError::validation(
                mapping.field_name.as_str(),
                "sets a regex pattern but does not use the regex method",
            ));
        }
    }
    Ok(())
}

/// Advisory confidence heuristic: starts at 0.5, rewarded for richer rule
/// sets, capped at 1.0. Used for monitoring, never as a correctness gate.
pub fn estimate_confidence(rules: &ExtractionRuleSet) -> f32 {
    let mut score: f32 = 0.5;
    if rules.field_mappings.len() >= 3 {
        score += 0.1;
    }
    if rules.field_mappings.len() >= 5 {
        score += 0.1;
    }
    if rules.field_mappings.iter().any(|m| m.required) {
        score += 0.1;
    }
    if rules.container_selector.contains('.') || rules.item_selector.contains('.') {
        score += 0.1;
    }
    if rules.notes.as_deref().is_some_and(|n| n.len() > 20) {
        score += 0.1;
    }
    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_RULES: &str = r#"{
        "containerSelector": ".list",
        "itemSelector": ".item",
        "fieldMappings": [
            {"fieldName": "title", "selector": "h2", "extractionMethod": "text", "required": true}
        ]
    }"#;

    #[test]
    fn parses_bare_json() {
        let rules = parse_rule_set(MINIMAL_RULES).unwrap();
        assert_eq!(rules.container_selector, ".list");
    }

    #[test]
    fn parses_fenced_json_identically() {
        let fenced = format!("```json\n{MINIMAL_RULES}\n```");
        let bare = parse_rule_set(MINIMAL_RULES).unwrap();
        let from_fence = parse_rule_set(&fenced).unwrap();
        assert_eq!(from_fence.container_selector, bare.container_selector);
        assert_eq!(
            from_fence.field_mappings.len(),
            bare.field_mappings.len()
        );
    }

    #[test]
    fn parses_json_surrounded_by_prose() {
        let chatty = format!("Here are the rules you asked for:\n{MINIMAL_RULES}\nLet me know if you need anything else {{with braces}}.");
        let rules = parse_rule_set(&chatty).unwrap();
        assert_eq!(rules.item_selector, ".item");
    }

    #[test]
    fn survives_braces_inside_string_values() {
        let tricky = r#"{
            "containerSelector": ".list",
            "itemSelector": ".item",
            "fieldMappings": [
                {"fieldName": "raw", "selector": "code", "extractionMethod": "regex",
                 "regexPattern": "\\{id: (\\d+)\\}", "regexGroup": 1}
            ],
            "notes": "items look like {id: 7} blobs"
        }"#;
        let rules = parse_rule_set(tricky).unwrap();
        assert_eq!(rules.field_mappings[0].regex_group, Some(1));
        assert_eq!(rules.notes.as_deref(), Some("items look like {id: 7} blobs"));
    }

    #[test]
    fn non_json_raises_parse_error() {
        let err = parse_rule_set("This is not JSON at all").unwrap_err();
        assert!(matches!(err, AnalysisError::Parse { .. }));
    }

    #[test]
    fn parse_error_carries_truncated_excerpt() {
        let long = "x".repeat(1000);
        let AnalysisError::Parse { excerpt } = parse_rule_set(&long).unwrap_err() else {
            panic!("expected parse error");
        };
        assert_eq!(excerpt.len(), ERROR_EXCERPT_CHARS);
    }

    #[test]
    fn missing_item_selector_raises_validation_naming_it() {
        let json = r#"{"containerSelector": ".list", "fieldMappings": [
            {"fieldName": "a", "extractionMethod": "text"}]}"#;
        let err = parse_rule_set(json).unwrap_err();
        let AnalysisError::Validation { field, .. } = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(field, "itemSelector");
    }

    #[test]
    fn empty_field_mappings_raise_validation() {
        let json =
            r#"{"containerSelector": ".list", "itemSelector": ".item", "fieldMappings": []}"#;
        let err = parse_rule_set(json).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation { ref field, .. } if field == "fieldMappings"
        ));
    }

    #[test]
    fn attribute_method_without_attribute_is_invalid() {
        let json = r#"{"containerSelector": ".list", "itemSelector": ".item", "fieldMappings": [
            {"fieldName": "link", "selector": "a", "extractionMethod": "attribute"}]}"#;
        let err = parse_rule_set(json).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation { ref field, .. } if field == "link"
        ));
    }

    #[test]
    fn stray_attribute_on_text_method_is_invalid() {
        let json = r#"{"containerSelector": ".list", "itemSelector": ".item", "fieldMappings": [
            {"fieldName": "name", "selector": ".n", "extractionMethod": "text", "attribute": "href"}]}"#;
        let err = parse_rule_set(json).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation { ref field, .. } if field == "name"
        ));
    }

    #[test]
    fn stray_regex_pattern_on_text_method_is_invalid() {
        let json = r#"{"containerSelector": ".list", "itemSelector": ".item", "fieldMappings": [
            {"fieldName": "id", "extractionMethod": "text", "regexPattern": "\\d+"}]}"#;
        let err = parse_rule_set(json).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::Validation { ref field, .. } if field == "id"
        ));
    }

    #[test]
    fn bad_pagination_kind_does_not_blame_field_mappings() {
        let json = r#"{"containerSelector": ".list", "itemSelector": ".item",
            "fieldMappings": [{"fieldName": "a", "extractionMethod": "text"}],
            "pagination": {"type": "infinite_scroll"}}"#;
        let err = parse_rule_set(json).unwrap_err();
        let AnalysisError::Validation { field, reason } = err else {
            panic!("expected validation error");
        };
        assert_eq!(field, "ruleSet");
        assert!(reason.contains("infinite_scroll"));
    }

    #[test]
    fn confidence_heuristic_follows_documented_steps() {
        let mut rules = parse_rule_set(MINIMAL_RULES).unwrap();
        // 0.5 base + required + class selector
        assert!((estimate_confidence(&rules) - 0.7).abs() < 1e-6);

        for i in 0..4 {
            rules.field_mappings.push(crate::types::FieldMapping {
                field_name: format!("extra{i}"),
                selector: "span".to_string(),
                extraction_method: ExtractionMethod::Text,
                attribute: None,
                regex_pattern: None,
                regex_group: None,
                transform: Vec::new(),
                required: false,
                default_value: None,
            });
        }
        rules.notes = Some("a nice long structural observation".to_string());
        // all five bonuses: 0.5 + 0.5, capped
        assert!((estimate_confidence(&rules) - 1.0).abs() < 1e-6);
    }
}
