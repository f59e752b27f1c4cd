//! Per-run result and telemetry shapes.
//!
//! These are transient values with no persisted identity.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One extracted record before domain mapping: field name to string value,
/// in the order the rule set declared the fields.
pub type RawItem = IndexMap<String, String>;

/// Untyped output of applying a manifest's rules to a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExtractionResult {
    pub items: Vec<RawItem>,

    /// Item nodes the item selector matched, before required-field drops;
    /// `items_matched - items.len()` is the engine's drop count
    pub items_matched: usize,

    /// True iff at least one item was fully extracted
    pub success: bool,

    /// Per-item, non-fatal problems (dropped items, skipped transforms)
    pub warnings: Vec<String>,

    /// Run-level failures (container not found, bad selector)
    pub errors: Vec<String>,
}

/// Typed, mapped output for one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult<T> {
    pub items: Vec<T>,

    /// Version of the manifest the raw extraction used
    pub manifest_version: u32,

    /// Reflects the domain-mapper outcome, independent of raw success
    pub success: bool,

    /// Carried over from the raw result and appended to, never overwritten
    pub warnings: Vec<String>,
    pub errors: Vec<String>,

    pub extraction_time_ms: u64,
}

/// Telemetry for one orchestrator run; emitted exactly once per run,
/// including failed runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineMetrics {
    /// Active manifest was reused without a model call
    pub manifest_cache_hit: bool,

    /// Structure hash differed from the active manifest's
    pub structure_changed: bool,

    pub manifest_version: u32,

    pub items_extracted: usize,

    /// Raw items that did not survive extraction or mapping
    pub items_failed: usize,

    /// A forced re-analysis ran despite matching hashes
    pub self_heal_triggered: bool,

    pub llm_calls: u32,
    pub llm_tokens_used: u32,
    pub llm_time_ms: u64,
    pub llm_model: Option<String>,

    pub extraction_time_ms: u64,
    pub total_time_ms: u64,
}
