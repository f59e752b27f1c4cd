//! Manifest store capability.
//!
//! CRUD over `StructuralManifest` keyed by `(region_id, source_url,
//! data_type, version)`, with an index supporting "the currently active
//! manifest for this key". The crate ships an in-memory implementation;
//! persistent backends live with the external storage layer.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::types::{ManifestKey, StructuralManifest};

#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// The currently active manifest for a key, if any.
    async fn get_active(&self, key: &ManifestKey) -> StoreResult<Option<StructuralManifest>>;

    /// A specific version for a key.
    async fn get(&self, key: &ManifestKey, version: u32)
        -> StoreResult<Option<StructuralManifest>>;

    /// Highest stored version for a key, 0 if none.
    async fn latest_version(&self, key: &ManifestKey) -> StoreResult<u32>;

    /// Insert a new (inactive) manifest version.
    async fn insert(&self, manifest: StructuralManifest) -> StoreResult<()>;

    /// Atomically activate a version, deactivating any sibling.
    ///
    /// Compare-and-swap semantics: if a newer version is already active the
    /// call is a no-op and the current winner is returned, so a loser of a
    /// concurrent re-analysis race adopts the winner's manifest instead of
    /// raising an error.
    async fn activate(&self, key: &ManifestKey, version: u32) -> StoreResult<StructuralManifest>;

    /// Record an extraction outcome against a version.
    ///
    /// Success increments `success_count` and resets the consecutive-failure
    /// streak; failure increments `failure_count` and the streak. Returns
    /// the updated manifest.
    async fn record_outcome(
        &self,
        key: &ManifestKey,
        version: u32,
        success: bool,
    ) -> StoreResult<StructuralManifest>;
}
