//! Prompt-template capability.
//!
//! May be backed by local const templates or a remote versioned template
//! service; the structural analyzer is agnostic to which, so the trait is
//! async throughout.

use async_trait::async_trait;

use crate::error::AnalysisResult;
use crate::types::{DataSourceConfig, DataType};

/// A composed analysis prompt plus its template provenance.
#[derive(Debug, Clone)]
pub struct AnalysisPrompt {
    pub text: String,

    /// Hash of the template (not the composed prompt); a change here
    /// invalidates cached manifests
    pub hash: String,

    pub version: u32,
}

/// Prompt-template capability.
#[async_trait]
pub trait PromptTemplates: Send + Sync {
    /// Compose the structural-analysis prompt for a source and its
    /// simplified HTML.
    async fn structural_analysis_prompt(
        &self,
        source: &DataSourceConfig,
        simplified_html: &str,
    ) -> AnalysisResult<AnalysisPrompt>;

    /// Hash of the live template for a data type, used for cache
    /// invalidation without composing a full prompt.
    async fn prompt_hash(&self, data_type: DataType) -> AnalysisResult<String>;
}
