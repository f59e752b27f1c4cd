//! Test doubles for the model, prompt, and fetch capabilities.
//!
//! Available outside `#[cfg(test)]` so integration tests and downstream
//! consumers can script pipeline runs without network or model access.

use std::collections::{HashMap, VecDeque};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{AnalysisError, AnalysisResult, PipelineError, Result};
use crate::traits::{FetchedPage, GenerateOptions, Generation, LanguageModel, PageFetcher};

/// Scripted language model. Responses queue up in order; an optional default
/// response answers once the queue is drained.
#[derive(Default)]
pub struct MockModel {
    responses: RwLock<VecDeque<String>>,
    default_response: RwLock<Option<String>>,
    calls: RwLock<Vec<String>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one response.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.responses.write().unwrap().push_back(text.into());
        self
    }

    /// Response returned whenever the queue is empty.
    pub fn with_default_response(self, text: impl Into<String>) -> Self {
        *self.default_response.write().unwrap() = Some(text.into());
        self
    }

    /// Number of generate calls observed.
    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }

    /// The prompts passed to each generate call, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    async fn generate(
        &self,
        prompt: &str,
        _options: &GenerateOptions,
    ) -> AnalysisResult<Generation> {
        self.calls.write().unwrap().push(prompt.to_string());

        let text = self
            .responses
            .write()
            .unwrap()
            .pop_front()
            .or_else(|| self.default_response.read().unwrap().clone())
            .ok_or_else(|| AnalysisError::Model("mock model has no response queued".into()))?;

        Ok(Generation {
            text,
            tokens_used: 128,
            finish_reason: Some("stop".to_string()),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model-1"
    }
}

/// Canned page fetcher keyed by URL.
#[derive(Default)]
pub struct MockFetcher {
    pages: RwLock<HashMap<String, String>>,
    fetches: RwLock<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, content: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), content.into());
        self
    }

    /// Replace a page after construction, to simulate a site redesign
    /// between runs.
    pub fn set_page(&self, url: impl Into<String>, content: impl Into<String>) {
        self.pages.write().unwrap().insert(url.into(), content.into());
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.read().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for MockFetcher {
    async fn fetch_url(&self, url: &str) -> Result<FetchedPage> {
        self.fetches.write().unwrap().push(url.to_string());

        let content = self
            .pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| PipelineError::Fetch {
                url: url.to_string(),
                message: "no page registered for url".to_string(),
            })?;

        Ok(FetchedPage {
            content,
            status_code: 200,
            content_type: Some("text/html".to_string()),
            from_cache: false,
        })
    }
}
