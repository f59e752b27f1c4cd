//! Pipeline orchestration: fetch, resolve a manifest, extract, map.
//!
//! The orchestrator composes the other modules and owns exactly one retry
//! policy: if extraction yields nothing from a cached manifest, it forces a
//! single re-analysis and tries again. Every run emits `PipelineMetrics`,
//! including failed runs.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;
use tracing::{info, warn};
use url::Url;

use crate::analyzer::{AnalyzerConfig, StructuralAnalyzer};
use crate::engine;
use crate::error::{PipelineError, Result};
use crate::manifest::{ManifestConfig, ManifestDecision, ManifestManager, ReanalysisReason};
use crate::mapper;
use crate::traits::{LanguageModel, ManifestStore, PageFetcher, PromptTemplates};
use crate::types::{
    CivicRecord, DataSourceConfig, ExtractionResult, ExtractionRuleSet, ManifestKey,
    PaginationKind, PipelineMetrics, RawExtractionResult,
};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub analyzer: AnalyzerConfig,
    pub manifest: ManifestConfig,

    /// Wall-clock ceiling for one run, fetches and model calls included
    pub run_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analyzer: AnalyzerConfig::default(),
            manifest: ManifestConfig::default(),
            run_timeout: Duration::from_secs(120),
        }
    }
}

/// A completed run: typed records plus telemetry.
#[derive(Debug)]
pub struct PipelineRun {
    pub result: ExtractionResult<CivicRecord>,
    pub metrics: PipelineMetrics,
}

/// A failed run. Metrics are still populated up to the point of failure.
#[derive(Debug)]
pub struct PipelineFailure {
    pub error: PipelineError,
    pub metrics: PipelineMetrics,
}

/// One extraction pipeline instance, reusable across runs and sources.
pub struct Pipeline<S: ManifestStore> {
    fetcher: Arc<dyn PageFetcher>,
    model: Arc<dyn LanguageModel>,
    prompts: Arc<dyn PromptTemplates>,
    manager: ManifestManager<S>,
    config: PipelineConfig,
}

impl<S: ManifestStore> Pipeline<S> {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        model: Arc<dyn LanguageModel>,
        prompts: Arc<dyn PromptTemplates>,
        store: Arc<S>,
        config: PipelineConfig,
    ) -> Self {
        let manager = ManifestManager::new(store, config.manifest.clone());
        Self {
            fetcher,
            model,
            prompts,
            manager,
            config,
        }
    }

    pub fn manager(&self) -> &ManifestManager<S> {
        &self.manager
    }

    /// Execute one run for a source within a region.
    pub async fn run(
        &self,
        region_id: &str,
        source: &DataSourceConfig,
    ) -> std::result::Result<PipelineRun, PipelineFailure> {
        let started = Instant::now();
        let mut metrics = PipelineMetrics::default();

        let outcome = match timeout(
            self.config.run_timeout,
            self.run_inner(region_id, source, &mut metrics),
        )
        .await
        {
            Ok(inner) => inner,
            Err(_) => Err(PipelineError::Timeout),
        };
        metrics.total_time_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                info!(
                    region = region_id,
                    url = %source.url,
                    items = metrics.items_extracted,
                    cache_hit = metrics.manifest_cache_hit,
                    version = metrics.manifest_version,
                    total_ms = metrics.total_time_ms,
                    "pipeline run complete"
                );
                Ok(PipelineRun { result, metrics })
            }
            Err(error) => {
                warn!(
                    region = region_id,
                    url = %source.url,
                    error = %error,
                    total_ms = metrics.total_time_ms,
                    "pipeline run failed"
                );
                Err(PipelineFailure { error, metrics })
            }
        }
    }

    async fn run_inner(
        &self,
        region_id: &str,
        source: &DataSourceConfig,
        metrics: &mut PipelineMetrics,
    ) -> Result<ExtractionResult<CivicRecord>> {
        let page = self.fetcher.fetch_url(&source.url).await?;
        let key = ManifestKey::new(region_id, &source.url, source.data_type);
        let analyzer = StructuralAnalyzer::new(
            self.model.as_ref(),
            self.prompts.as_ref(),
            self.config.analyzer.clone(),
        );
        let base_url = Url::parse(&source.url).ok();

        let decision = self
            .manager
            .ensure_manifest(&key, &page.content, source, &analyzer, false)
            .await?;
        absorb_decision(metrics, &decision);

        let extract_started = Instant::now();
        let mut raw = self
            .extract_all_pages(&page.content, &decision.manifest.rules, base_url.as_ref())
            .await;
        let mut manifest = decision.manifest;

        if !raw.success {
            self.manager
                .record_outcome(&key, manifest.version, false)
                .await?;

            if !decision.cache_hit {
                // fresh rules already failed once; re-deriving from the same
                // page would loop
                metrics.extraction_time_ms = extract_started.elapsed().as_millis() as u64;
                return Err(extraction_error(&raw));
            }

            // cached rules produced nothing: one forced re-analysis, then
            // give up
            warn!(
                version = manifest.version,
                "cached manifest extracted nothing; forcing re-analysis"
            );
            metrics.self_heal_triggered = true;
            let retry = self
                .manager
                .ensure_manifest(&key, &page.content, source, &analyzer, true)
                .await?;
            absorb_decision(metrics, &retry);
            manifest = retry.manifest;

            raw = self
                .extract_all_pages(&page.content, &manifest.rules, base_url.as_ref())
                .await;
            if !raw.success {
                self.manager
                    .record_outcome(&key, manifest.version, false)
                    .await?;
                metrics.extraction_time_ms = extract_started.elapsed().as_millis() as u64;
                return Err(extraction_error(&raw));
            }
        }

        self.manager
            .record_outcome(&key, manifest.version, true)
            .await?;

        let mut result = mapper::map_records(&raw, source, manifest.version);
        result.extraction_time_ms = extract_started.elapsed().as_millis() as u64;

        metrics.extraction_time_ms = result.extraction_time_ms;
        metrics.items_extracted = result.items.len();
        // engine drops (required-field misses) and mapper skips both count
        metrics.items_failed = raw.items_matched.saturating_sub(result.items.len());
        Ok(result)
    }

    /// Extract the first page, then follow next-page links up to the rule
    /// set's bound. Failures on later pages degrade to warnings; the first
    /// page decides run success.
    async fn extract_all_pages(
        &self,
        first_page: &str,
        rules: &ExtractionRuleSet,
        base_url: Option<&Url>,
    ) -> RawExtractionResult {
        let mut result = engine::extract(first_page, rules, base_url);

        let Some(pagination) = rules
            .pagination
            .as_ref()
            .filter(|p| p.kind == PaginationKind::NextLink)
        else {
            return result;
        };

        let mut visited: HashSet<String> = HashSet::new();
        if let Some(base) = base_url {
            visited.insert(base.to_string());
        }
        let mut current = first_page.to_string();

        for _ in 1..pagination.max_pages {
            let Some(next_url) = engine::next_page_url(&current, pagination, base_url) else {
                break;
            };
            if !visited.insert(next_url.clone()) {
                result
                    .warnings
                    .push(format!("pagination loop detected at {next_url}"));
                break;
            }

            let page = match self.fetcher.fetch_url(&next_url).await {
                Ok(page) => page,
                Err(err) => {
                    result
                        .warnings
                        .push(format!("pagination stopped: {err}"));
                    break;
                }
            };

            let mut page_result = engine::extract(&page.content, rules, base_url);
            result.items.append(&mut page_result.items);
            result.items_matched += page_result.items_matched;
            result.warnings.append(&mut page_result.warnings);
            // container problems on a later page are not fatal to the run
            result
                .warnings
                .extend(page_result.errors.into_iter().map(|e| format!("page {next_url}: {e}")));
            current = page.content;
        }

        result.success = !result.items.is_empty();
        result
    }
}

fn absorb_decision(metrics: &mut PipelineMetrics, decision: &ManifestDecision) {
    if decision.cache_hit {
        metrics.manifest_cache_hit = true;
    }
    if decision.structure_changed() {
        metrics.structure_changed = true;
    }
    if decision.reason == Some(ReanalysisReason::SelfHeal) {
        metrics.self_heal_triggered = true;
    }
    metrics.manifest_version = decision.manifest.version;
    if let Some(telemetry) = &decision.telemetry {
        metrics.llm_calls += 1;
        metrics.llm_tokens_used += telemetry.tokens_used;
        metrics.llm_time_ms += telemetry.elapsed_ms;
        metrics.llm_model = Some(telemetry.model.clone());
    }
}

fn extraction_error(raw: &RawExtractionResult) -> PipelineError {
    let message = raw
        .errors
        .first()
        .or_else(|| raw.warnings.first())
        .cloned()
        .unwrap_or_else(|| "no items extracted".to_string());
    PipelineError::Extraction { message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::LocalPrompts;
    use crate::stores::MemoryManifestStore;
    use crate::testing::{MockFetcher, MockModel};
    use crate::types::DataType;

    const PAGE: &str = r#"<html><body><div class="props">
        <div class="prop"><h2>Prop 1</h2></div>
    </div></body></html>"#;

    const RULES_JSON: &str = r#"{
        "containerSelector": ".props",
        "itemSelector": ".prop",
        "fieldMappings": [
            {"fieldName": "externalId", "selector": "h2", "extractionMethod": "text", "required": true},
            {"fieldName": "title", "selector": "h2", "extractionMethod": "text", "required": true}
        ]
    }"#;

    fn source() -> DataSourceConfig {
        DataSourceConfig::new(
            "https://example.gov/props",
            DataType::Propositions,
            "ballot propositions",
        )
    }

    fn pipeline(
        fetcher: MockFetcher,
        model: MockModel,
    ) -> Pipeline<MemoryManifestStore> {
        Pipeline::new(
            Arc::new(fetcher),
            Arc::new(model),
            Arc::new(LocalPrompts::new()),
            Arc::new(MemoryManifestStore::new()),
            PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn fetch_failure_still_emits_metrics() {
        let pipeline = pipeline(MockFetcher::new(), MockModel::new());
        let failure = pipeline.run("ca", &source()).await.unwrap_err();

        assert!(matches!(failure.error, PipelineError::Fetch { .. }));
        assert_eq!(failure.metrics.llm_calls, 0);
        assert_eq!(failure.metrics.items_extracted, 0);
    }

    #[tokio::test]
    async fn timeout_maps_to_pipeline_timeout() {
        struct HangingFetcher;

        #[async_trait::async_trait]
        impl crate::traits::PageFetcher for HangingFetcher {
            async fn fetch_url(&self, _url: &str) -> Result<crate::traits::FetchedPage> {
                std::future::pending().await
            }
        }

        let mut config = PipelineConfig::default();
        config.run_timeout = Duration::from_millis(10);
        let pipeline = Pipeline::new(
            Arc::new(HangingFetcher),
            Arc::new(MockModel::new().with_response(RULES_JSON)),
            Arc::new(LocalPrompts::new()),
            Arc::new(MemoryManifestStore::new()),
            config,
        );

        let failure = pipeline.run("ca", &source()).await.unwrap_err();
        assert!(matches!(failure.error, PipelineError::Timeout));
    }

    #[tokio::test]
    async fn successful_run_populates_metrics() {
        let fetcher = MockFetcher::new().with_page("https://example.gov/props", PAGE);
        let model = MockModel::new().with_response(RULES_JSON);
        let pipeline = pipeline(fetcher, model);

        let run = pipeline.run("ca", &source()).await.unwrap();
        assert_eq!(run.result.items.len(), 1);
        assert_eq!(run.metrics.items_extracted, 1);
        assert_eq!(run.metrics.manifest_version, 1);
        assert_eq!(run.metrics.llm_calls, 1);
        assert!(!run.metrics.manifest_cache_hit);
        assert_eq!(run.metrics.llm_model.as_deref(), Some("mock-model-1"));
    }
}
