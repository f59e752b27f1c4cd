//! Schema-on-Read Civic Records Extraction
//!
//! A rule-driven extraction pipeline for civic data sources (ballot
//! propositions, public meetings, representatives, campaign finance) that
//! derives its extraction rules from page structure instead of hand-written
//! per-site scrapers.
//!
//! # Design Philosophy
//!
//! **"Analyze once, extract many"**
//!
//! - A language model studies a page's simplified skeleton and emits a
//!   reusable extraction rule set
//! - Rule sets are versioned as structural manifests and cached per
//!   `(region, source URL, data type)` key
//! - Extraction runs are cheap CSS-selector passes; the model is only
//!   consulted when the structure hash changes or rules keep failing
//! - Per-item tolerance everywhere: one malformed record never fails a run
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use civic_pipeline::{
//!     DataSourceConfig, DataType, MemoryManifestStore, Pipeline, PipelineConfig,
//! };
//! use civic_pipeline::prompts::LocalPrompts;
//!
//! let pipeline = Pipeline::new(
//!     fetcher,
//!     model,
//!     Arc::new(LocalPrompts::new()),
//!     Arc::new(MemoryManifestStore::new()),
//!     PipelineConfig::default(),
//! );
//!
//! let source = DataSourceConfig::new(
//!     "https://example.gov/propositions",
//!     DataType::Propositions,
//!     "ballot propositions with titles and election dates",
//! );
//! let run = pipeline.run("ca", &source).await?;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Capability traits (LanguageModel, PageFetcher, ManifestStore, PromptTemplates)
//! - [`types`] - Sources, rule sets, manifests, results, domain records
//! - [`analyzer`] - AI-assisted structural analysis
//! - [`manifest`] - Manifest versioning, caching, and self-heal policy
//! - [`engine`] - Rule-driven extraction over parsed HTML
//! - [`mapper`] - Raw-to-typed domain mapping
//! - [`pipeline`] - Run orchestration and metrics
//! - [`stores`] - Manifest store implementations (MemoryManifestStore)
//! - [`testing`] - Mock implementations for testing

pub mod analyzer;
pub mod engine;
pub mod error;
pub mod hashing;
pub mod html;
pub mod manifest;
pub mod mapper;
pub mod pipeline;
pub mod prompts;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod transforms;

pub mod types;

// Re-export core types at crate root
pub use error::{AnalysisError, EngineError, PipelineError, StoreError};
pub use traits::{
    fetcher::{FetchedPage, PageFetcher},
    model::{GenerateOptions, Generation, LanguageModel},
    prompts::{AnalysisPrompt, PromptTemplates},
    store::ManifestStore,
};
pub use types::{
    manifest::{ManifestId, ManifestKey, StructuralManifest},
    records::{
        CivicRecord, Committee, Contribution, Expenditure, IndependentExpenditure, Meeting,
        Proposition, Representative,
    },
    result::{ExtractionResult, PipelineMetrics, RawExtractionResult, RawItem},
    rules::{ExtractionMethod, ExtractionRuleSet, FieldMapping, Pagination, PaginationKind},
    source::{DataSourceConfig, DataType},
};

pub use analyzer::{AnalysisOutcome, AnalyzerConfig, StructuralAnalyzer};
pub use manifest::{ManifestConfig, ManifestDecision, ManifestManager, ReanalysisReason};
pub use mapper::{map_records, FinanceCategory};
pub use pipeline::{Pipeline, PipelineConfig, PipelineFailure, PipelineRun};
pub use stores::MemoryManifestStore;
