//! Versioned, reusable extraction recipes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::rules::ExtractionRuleSet;
use super::source::DataType;

/// Unique identifier for a structural manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestId(pub Uuid);

impl ManifestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ManifestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity of one source/data-type pair within a region.
///
/// Exactly one manifest is active per key at any time; version numbers are
/// strictly increasing per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestKey {
    pub region_id: String,
    pub source_url: String,
    pub data_type: DataType,
}

impl ManifestKey {
    pub fn new(
        region_id: impl Into<String>,
        source_url: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        Self {
            region_id: region_id.into(),
            source_url: source_url.into(),
            data_type,
        }
    }
}

/// A versioned extraction recipe plus provenance and usage counters.
///
/// Created by the structural analyzer, activated/deactivated only by the
/// manifest version manager, counters updated from extraction outcomes.
/// The domain mapper never mutates a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuralManifest {
    pub id: ManifestId,
    pub key: ManifestKey,

    /// Monotonic per key, assigned by the version manager
    pub version: u32,

    /// Fingerprint of the page's DOM skeleton at analysis time
    pub structure_hash: String,

    /// Hash of the prompt template used for analysis
    pub prompt_hash: String,

    pub rules: ExtractionRuleSet,

    /// Advisory heuristic score in [0, 1]; not a correctness gate
    pub confidence: f32,

    /// Lifetime counters (monotone)
    pub success_count: u64,
    pub failure_count: u64,

    /// Consecutive-failure streak driving self-heal; resets on success
    pub consecutive_failures: u32,

    pub is_active: bool,

    pub analysis_notes: Option<String>,

    /// Model that produced the rules
    pub model_name: String,

    pub created_at: DateTime<Utc>,
}

impl StructuralManifest {
    pub fn new(
        key: ManifestKey,
        version: u32,
        structure_hash: impl Into<String>,
        prompt_hash: impl Into<String>,
        rules: ExtractionRuleSet,
        confidence: f32,
        model_name: impl Into<String>,
    ) -> Self {
        let analysis_notes = rules.notes.clone();
        Self {
            id: ManifestId::new(),
            key,
            version,
            structure_hash: structure_hash.into(),
            prompt_hash: prompt_hash.into(),
            rules,
            confidence,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            is_active: false,
            analysis_notes,
            model_name: model_name.into(),
            created_at: Utc::now(),
        }
    }
}
