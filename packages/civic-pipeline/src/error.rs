//! Typed errors for the extraction pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can branch
//! on variants instead of matching message substrings.

use thiserror::Error;

/// Errors raised while deriving an extraction rule set from a page.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Model output could not be parsed as JSON
    #[error("model output is not parseable JSON: {excerpt}")]
    Parse { excerpt: String },

    /// Model returned JSON but the rule set is missing required shape
    #[error("rule set validation failed: {field} {reason}")]
    Validation { field: String, reason: String },

    /// Language model call failed
    #[error("language model error: {0}")]
    Model(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Remote prompt/template service returned a non-2xx response
    #[error("prompt service error (status {status}): {message}")]
    PromptService { status: u16, message: String },

    /// Model call exceeded its deadline
    #[error("structural analysis timed out")]
    Timeout,
}

impl AnalysisError {
    pub(crate) fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Errors recorded while applying a rule set to a document.
///
/// These are run-level failures for a single extraction attempt; they are
/// recorded on the `RawExtractionResult` rather than thrown, so the
/// orchestrator can decide whether to re-analyze.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Container selector matched zero nodes
    #[error("container not found: {selector}")]
    ContainerNotFound { selector: String },

    /// Selector string failed to parse
    #[error("invalid selector: {selector}")]
    InvalidSelector { selector: String },
}

/// Errors from the manifest store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend failure (connection, serialization, constraint)
    #[error("manifest store error: {0}")]
    Backend(String),

    /// Requested manifest version does not exist
    #[error("manifest version {version} not found")]
    NotFound { version: u32 },
}

/// Fatal errors for a whole pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Structural analysis failed
    #[error("analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    /// Page fetch failed
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    /// Extraction produced nothing, even after the single forced re-analysis
    #[error("extraction failed: {message}")]
    Extraction { message: String },

    /// Manifest store failure
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Run exceeded its overall timeout
    #[error("pipeline run timed out")]
    Timeout,
}

/// Result type alias for analysis operations.
pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;
