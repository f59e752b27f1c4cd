//! Fetch capability, provided by an external fetch/cache/rate-limit layer.

use async_trait::async_trait;

use crate::error::Result;

/// A fetched page, possibly served from the external layer's cache.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub content: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub from_cache: bool,
}

/// Fetch capability. The external layer enforces per-source rate limits,
/// caches responses, and deduplicates concurrent identical fetches.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_url(&self, url: &str) -> Result<FetchedPage>;
}
