//! Core data model: sources, rules, manifests, results, domain records.

pub mod manifest;
pub mod records;
pub mod result;
pub mod rules;
pub mod source;

pub use manifest::{ManifestId, ManifestKey, StructuralManifest};
pub use records::{
    CivicRecord, Committee, Contribution, Expenditure, IndependentExpenditure, Meeting,
    Proposition, Representative,
};
pub use result::{ExtractionResult, PipelineMetrics, RawExtractionResult, RawItem};
pub use rules::{
    ExtractionMethod, ExtractionRuleSet, FieldMapping, Pagination, PaginationKind, PreprocessStep,
};
pub use source::{DataSourceConfig, DataType};
