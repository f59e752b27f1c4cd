//! Capability traits at the crate's seams.
//!
//! The pipeline holds plain constructor-injected references to these; there
//! is no ambient container.

pub mod fetcher;
pub mod model;
pub mod prompts;
pub mod store;

pub use fetcher::{FetchedPage, PageFetcher};
pub use model::{GenerateOptions, Generation, LanguageModel};
pub use prompts::{AnalysisPrompt, PromptTemplates};
pub use store::ManifestStore;
