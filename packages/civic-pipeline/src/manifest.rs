//! Manifest versioning and cache policy.
//!
//! The version manager decides reuse vs. re-analysis per `(region_id,
//! source_url, data_type)` key, activates new versions, and forces
//! re-analysis after repeated extraction failures ("self-heal"). Activation
//! is serialized per key by an in-flight guard so concurrent runs never both
//! re-analyze; cross-instance races are absorbed by the store's
//! compare-and-swap `activate`.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::analyzer::StructuralAnalyzer;
use crate::error::Result;
use crate::hashing;
use crate::traits::ManifestStore;
use crate::types::{DataSourceConfig, ManifestKey, StructuralManifest};

#[derive(Debug, Clone)]
pub struct ManifestConfig {
    /// Consecutive extraction failures that force re-analysis even when the
    /// structure hash is unchanged
    pub failure_threshold: u32,
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
        }
    }
}

/// Why a re-analysis ran (None when the cached manifest was reused).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReanalysisReason {
    /// No manifest existed for the key
    Initial,
    /// Page skeleton changed since the active manifest was derived
    StructureChanged,
    /// Prompt template changed since the active manifest was derived
    PromptChanged,
    /// Consecutive-failure threshold reached despite matching hashes
    SelfHeal,
    /// Orchestrator forced re-analysis after a totally failed extraction
    Forced,
}

/// Model telemetry from a re-analysis, for pipeline metrics.
#[derive(Debug, Clone)]
pub struct AnalysisTelemetry {
    pub tokens_used: u32,
    pub elapsed_ms: u64,
    pub model: String,
}

/// Outcome of a manifest lookup.
#[derive(Debug, Clone)]
pub struct ManifestDecision {
    pub manifest: StructuralManifest,
    /// Active manifest reused without a model call
    pub cache_hit: bool,
    pub reason: Option<ReanalysisReason>,
    pub telemetry: Option<AnalysisTelemetry>,
}

impl ManifestDecision {
    pub fn structure_changed(&self) -> bool {
        matches!(self.reason, Some(ReanalysisReason::StructureChanged))
    }
}

/// Owns the cache/versioning policy for structural manifests.
pub struct ManifestManager<S: ManifestStore> {
    store: Arc<S>,
    config: ManifestConfig,
    in_flight: Mutex<HashMap<ManifestKey, Arc<Mutex<()>>>>,
}

impl<S: ManifestStore> ManifestManager<S> {
    pub fn new(store: Arc<S>, config: ManifestConfig) -> Self {
        Self {
            store,
            config,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resolve the manifest to use for this run, re-analyzing when needed.
    ///
    /// `force` requests re-analysis regardless of hash state (the
    /// orchestrator's single retry after a total extraction failure).
    pub async fn ensure_manifest(
        &self,
        key: &ManifestKey,
        page_html: &str,
        source: &DataSourceConfig,
        analyzer: &StructuralAnalyzer<'_>,
        force: bool,
    ) -> Result<ManifestDecision> {
        let guard = self.key_guard(key).await;
        let _held = guard.lock().await;

        let structure_hash = hashing::structure_hash(page_html);
        let prompt_hash = analyzer.current_prompt_hash(key.data_type).await?;
        let active = self.store.get_active(key).await?;

        let reason = match &active {
            None => ReanalysisReason::Initial,
            Some(manifest) if force => {
                debug!(version = manifest.version, "forced re-analysis requested");
                ReanalysisReason::Forced
            }
            Some(manifest) if manifest.structure_hash != structure_hash => {
                ReanalysisReason::StructureChanged
            }
            Some(manifest) if manifest.prompt_hash != prompt_hash => {
                ReanalysisReason::PromptChanged
            }
            Some(manifest) if manifest.consecutive_failures >= self.config.failure_threshold => {
                warn!(
                    version = manifest.version,
                    failures = manifest.consecutive_failures,
                    "self-heal: rules keep failing despite unchanged structure"
                );
                ReanalysisReason::SelfHeal
            }
            Some(manifest) => {
                debug!(version = manifest.version, "manifest cache hit");
                return Ok(ManifestDecision {
                    manifest: manifest.clone(),
                    cache_hit: true,
                    reason: None,
                    telemetry: None,
                });
            }
        };

        let outcome = analyzer.analyze(page_html, source).await?;
        let next_version = self.store.latest_version(key).await? + 1;
        let manifest = StructuralManifest::new(
            key.clone(),
            next_version,
            structure_hash,
            outcome.prompt_hash,
            outcome.rules,
            outcome.confidence,
            &outcome.model_name,
        );
        self.store.insert(manifest).await?;
        // CAS: a concurrent winner may already hold a newer active version,
        // in which case we adopt it.
        let active = self.store.activate(key, next_version).await?;

        info!(
            region = %key.region_id,
            url = %key.source_url,
            version = active.version,
            reason = ?reason,
            confidence = active.confidence,
            "activated manifest"
        );

        Ok(ManifestDecision {
            manifest: active,
            cache_hit: false,
            reason: Some(reason),
            telemetry: Some(AnalysisTelemetry {
                tokens_used: outcome.tokens_used,
                elapsed_ms: outcome.elapsed_ms,
                model: outcome.model_name,
            }),
        })
    }

    /// Record an extraction outcome against a manifest version.
    pub async fn record_outcome(
        &self,
        key: &ManifestKey,
        version: u32,
        success: bool,
    ) -> Result<StructuralManifest> {
        let updated = self.store.record_outcome(key, version, success).await?;
        debug!(
            version,
            success,
            consecutive_failures = updated.consecutive_failures,
            "recorded extraction outcome"
        );
        Ok(updated)
    }

    async fn key_guard(&self, key: &ManifestKey) -> Arc<Mutex<()>> {
        let mut map = self.in_flight.lock().await;
        map.entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}
