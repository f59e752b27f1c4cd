//! Prompt templates for structural analysis.
//!
//! `LocalPrompts` composes prompts from const templates; `RemotePrompts`
//! delegates to a versioned template service. Both implement the
//! `PromptTemplates` capability so the analyzer is agnostic to which.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{AnalysisError, AnalysisResult};
use crate::traits::{AnalysisPrompt, PromptTemplates};
use crate::types::{DataSourceConfig, DataType};

/// Bump when the template semantics change.
pub const PROMPT_VERSION: u32 = 1;

/// Prompt for deriving a reusable extraction rule set from a page skeleton.
pub const STRUCTURAL_ANALYSIS_PROMPT: &str = r#"Analyze the structure of this HTML page and derive reusable extraction rules.

Data type: {data_type}
Goal: {content_goal}
{hints_section}
Expected record fields:
{schema}

Rules:
1. "containerSelector" must match exactly one element wrapping the full record list.
2. "itemSelector" matches each record within the container.
3. Each field mapping declares how one field is pulled from an item node:
   - "extractionMethod" is one of "text", "attribute", "html", "regex"
   - set "attribute" only for the attribute method
   - set "regexPattern" (and optional "regexGroup") only for the regex method
   - optional "transform" is a pipeline drawn from: date_parse, trim, lowercase,
     uppercase, strip_html, url_resolve, regex_replace:<pattern>:<replacement>, name_format
4. Mark a field "required": true when a record is useless without it; give a
   "defaultValue" where a sensible fallback exists.
5. If records continue on further pages, describe "pagination" with a next-link selector.
6. Include brief "notes" describing the page structure you observed.

Respond with a single JSON object and nothing else:
{
    "containerSelector": "...",
    "itemSelector": "...",
    "fieldMappings": [
        {"fieldName": "...", "selector": "...", "extractionMethod": "text", "required": true}
    ],
    "pagination": {"type": "next_link", "selector": "a.next", "maxPages": 5},
    "notes": "..."
}

HTML:
{html}"#;

/// Expected field names per data type, fed into the prompt so the rule set
/// lines up with what the domain mapper requires.
pub fn schema_description(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Propositions => {
            "- externalId (required): proposition number or measure id\n\
             - title (required)\n\
             - summary\n\
             - electionDate\n\
             - status\n\
             - fullTextUrl"
        }
        DataType::Meetings => {
            "- externalId (required): meeting or event id\n\
             - title (required)\n\
             - scheduledAt (required): meeting date/time\n\
             - body: committee or legislative body\n\
             - location\n\
             - agendaUrl"
        }
        DataType::Representatives => {
            "- externalId (required)\n\
             - name (required)\n\
             - district (required)\n\
             - party (required)\n\
             - chamber\n\
             - email\n\
             - phone\n\
             - website"
        }
        DataType::CampaignFinance => {
            "- externalId / committeeId (required): filer or committee id\n\
             - name / committeeName / donorName / payeeName as present\n\
             - donorFirstName and donorLastName when names are split\n\
             - amount: monetary amount\n\
             - date: filing or transaction date\n\
             - donorType, supportOrOppose, candidateName, propositionTitle,\n\
               employer, occupation, city, state as present"
        }
    }
}

/// Hash of the live local template for a data type.
///
/// Covers the template and the per-type schema block, so either changing
/// invalidates cached manifests.
pub fn local_prompt_hash(data_type: DataType) -> String {
    let mut hasher = Sha256::new();
    hasher.update(STRUCTURAL_ANALYSIS_PROMPT.as_bytes());
    hasher.update(schema_description(data_type).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compose the structural-analysis prompt from the local template.
pub fn format_structural_analysis_prompt(source: &DataSourceConfig, simplified_html: &str) -> String {
    let hints_section = if source.hints.is_empty() {
        String::new()
    } else {
        let bullets = source
            .hints
            .iter()
            .map(|hint| format!("- {hint}"))
            .collect::<Vec<_>>()
            .join("\n");
        format!("Hints:\n{bullets}\n")
    };

    STRUCTURAL_ANALYSIS_PROMPT
        .replace("{data_type}", source.data_type.as_str())
        .replace("{content_goal}", &source.content_goal)
        .replace("{hints_section}", &hints_section)
        .replace("{schema}", schema_description(source.data_type))
        .replace("{html}", simplified_html)
}

/// Prompt-template capability backed by the local const templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalPrompts;

impl LocalPrompts {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PromptTemplates for LocalPrompts {
    async fn structural_analysis_prompt(
        &self,
        source: &DataSourceConfig,
        simplified_html: &str,
    ) -> AnalysisResult<AnalysisPrompt> {
        Ok(AnalysisPrompt {
            text: format_structural_analysis_prompt(source, simplified_html),
            hash: local_prompt_hash(source.data_type),
            version: PROMPT_VERSION,
        })
    }

    async fn prompt_hash(&self, data_type: DataType) -> AnalysisResult<String> {
        Ok(local_prompt_hash(data_type))
    }
}

/// Prompt-template capability backed by a remote versioned template service.
pub struct RemotePrompts {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemotePromptResponse {
    prompt_text: String,
    prompt_hash: String,
    prompt_version: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteHashResponse {
    prompt_hash: String,
}

impl RemotePrompts {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn service_error(message: impl std::fmt::Display) -> AnalysisError {
        AnalysisError::PromptService {
            status: 0,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl PromptTemplates for RemotePrompts {
    async fn structural_analysis_prompt(
        &self,
        source: &DataSourceConfig,
        simplified_html: &str,
    ) -> AnalysisResult<AnalysisPrompt> {
        let response = self
            .client
            .post(format!("{}/prompts/structural-analysis", self.base_url))
            .json(&serde_json::json!({
                "dataType": source.data_type,
                "contentGoal": source.content_goal,
                "hints": source.hints,
                "category": source.category,
                "html": simplified_html,
            }))
            .send()
            .await
            .map_err(Self::service_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalysisError::PromptService {
                status: status.as_u16(),
                message,
            });
        }

        let body: RemotePromptResponse = response.json().await.map_err(Self::service_error)?;
        Ok(AnalysisPrompt {
            text: body.prompt_text,
            hash: body.prompt_hash,
            version: body.prompt_version,
        })
    }

    async fn prompt_hash(&self, data_type: DataType) -> AnalysisResult<String> {
        let response = self
            .client
            .get(format!(
                "{}/prompts/structural-analysis/hash",
                self.base_url
            ))
            .query(&[("dataType", data_type.as_str())])
            .send()
            .await
            .map_err(Self::service_error)?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AnalysisError::PromptService {
                status: status.as_u16(),
                message,
            });
        }

        let body: RemoteHashResponse = response.json().await.map_err(Self::service_error)?;
        Ok(body.prompt_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_hash_is_consistent_and_type_specific() {
        assert_eq!(
            local_prompt_hash(DataType::Meetings),
            local_prompt_hash(DataType::Meetings)
        );
        assert_eq!(local_prompt_hash(DataType::Meetings).len(), 64); // SHA-256 hex
        assert_ne!(
            local_prompt_hash(DataType::Meetings),
            local_prompt_hash(DataType::Propositions)
        );
    }

    #[test]
    fn formatted_prompt_substitutes_all_placeholders() {
        let source = DataSourceConfig::new(
            "https://example.gov/reps",
            DataType::Representatives,
            "current state representatives",
        )
        .with_hint("rows in a table");

        let prompt = format_structural_analysis_prompt(&source, "<html></html>");
        assert!(prompt.contains("representatives"));
        assert!(prompt.contains("current state representatives"));
        assert!(prompt.contains("- rows in a table"));
        assert!(prompt.contains("<html></html>"));
        assert!(!prompt.contains("{data_type}"));
        assert!(!prompt.contains("{hints_section}"));
        assert!(!prompt.contains("{schema}"));
        assert!(!prompt.contains("{html}"));
    }
}
