//! Language-model capability.

use async_trait::async_trait;

use crate::error::AnalysisResult;

/// Generation parameters. Structural analysis uses a low temperature to
/// bias the model toward deterministic JSON.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.1,
            top_p: 1.0,
        }
    }
}

/// One model completion with usage accounting for telemetry.
#[derive(Debug, Clone)]
pub struct Generation {
    pub text: String,
    pub tokens_used: u32,
    pub finish_reason: Option<String>,
}

/// Language-model capability.
///
/// Implementations wrap specific providers and must carry their own request
/// timeout; a hung call would otherwise stall the whole pipeline run.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> AnalysisResult<Generation>;

    /// Provider name (e.g. "openai")
    fn name(&self) -> &str;

    /// Concrete model identifier for provenance
    fn model_name(&self) -> &str;
}
