//! In-memory manifest store for tests and single-process runs.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::traits::ManifestStore;
use crate::types::{ManifestKey, StructuralManifest};

/// `HashMap`-backed store; every mutation happens under one write lock, which
/// is what makes `activate` and `record_outcome` atomic here.
#[derive(Default)]
pub struct MemoryManifestStore {
    manifests: RwLock<HashMap<ManifestKey, Vec<StructuralManifest>>>,
}

impl MemoryManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored versions for a key, for test assertions.
    pub fn version_count(&self, key: &ManifestKey) -> usize {
        self.manifests
            .read()
            .unwrap()
            .get(key)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ManifestStore for MemoryManifestStore {
    async fn get_active(&self, key: &ManifestKey) -> StoreResult<Option<StructuralManifest>> {
        let manifests = self.manifests.read().unwrap();
        Ok(manifests
            .get(key)
            .and_then(|versions| versions.iter().find(|m| m.is_active).cloned()))
    }

    async fn get(
        &self,
        key: &ManifestKey,
        version: u32,
    ) -> StoreResult<Option<StructuralManifest>> {
        let manifests = self.manifests.read().unwrap();
        Ok(manifests
            .get(key)
            .and_then(|versions| versions.iter().find(|m| m.version == version).cloned()))
    }

    async fn latest_version(&self, key: &ManifestKey) -> StoreResult<u32> {
        let manifests = self.manifests.read().unwrap();
        Ok(manifests
            .get(key)
            .and_then(|versions| versions.iter().map(|m| m.version).max())
            .unwrap_or(0))
    }

    async fn insert(&self, mut manifest: StructuralManifest) -> StoreResult<()> {
        manifest.is_active = false;
        let mut manifests = self.manifests.write().unwrap();
        let versions = manifests.entry(manifest.key.clone()).or_default();
        if versions.iter().any(|m| m.version == manifest.version) {
            return Err(StoreError::Backend(format!(
                "version {} already exists for key",
                manifest.version
            )));
        }
        versions.push(manifest);
        Ok(())
    }

    async fn activate(&self, key: &ManifestKey, version: u32) -> StoreResult<StructuralManifest> {
        let mut manifests = self.manifests.write().unwrap();
        let versions = manifests
            .get_mut(key)
            .ok_or(StoreError::NotFound { version })?;

        // CAS: if a newer version is already active, the caller lost a race
        // and adopts the winner.
        if let Some(active) = versions.iter().find(|m| m.is_active) {
            if active.version >= version {
                return Ok(active.clone());
            }
        }

        if !versions.iter().any(|m| m.version == version) {
            return Err(StoreError::NotFound { version });
        }
        for manifest in versions.iter_mut() {
            manifest.is_active = manifest.version == version;
        }
        versions
            .iter()
            .find(|m| m.version == version)
            .cloned()
            .ok_or(StoreError::NotFound { version })
    }

    async fn record_outcome(
        &self,
        key: &ManifestKey,
        version: u32,
        success: bool,
    ) -> StoreResult<StructuralManifest> {
        let mut manifests = self.manifests.write().unwrap();
        let manifest = manifests
            .get_mut(key)
            .and_then(|versions| versions.iter_mut().find(|m| m.version == version))
            .ok_or(StoreError::NotFound { version })?;

        if success {
            manifest.success_count += 1;
            manifest.consecutive_failures = 0;
        } else {
            manifest.failure_count += 1;
            manifest.consecutive_failures += 1;
        }
        Ok(manifest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, ExtractionMethod, ExtractionRuleSet, FieldMapping};

    fn key() -> ManifestKey {
        ManifestKey::new("mn", "https://example.gov/reps", DataType::Representatives)
    }

    fn rules() -> ExtractionRuleSet {
        ExtractionRuleSet {
            container_selector: ".members-list".to_string(),
            item_selector: ".member-card".to_string(),
            field_mappings: vec![FieldMapping {
                field_name: "name".to_string(),
                selector: ".name".to_string(),
                extraction_method: ExtractionMethod::Text,
                attribute: None,
                regex_pattern: None,
                regex_group: None,
                transform: Vec::new(),
                required: true,
                default_value: None,
            }],
            pagination: None,
            preprocessing: Vec::new(),
            notes: None,
        }
    }

    fn manifest(version: u32) -> StructuralManifest {
        StructuralManifest::new(key(), version, "hash-a", "prompt-a", rules(), 0.7, "test-model")
    }

    #[tokio::test]
    async fn insert_leaves_manifest_inactive() {
        let store = MemoryManifestStore::new();
        store.insert(manifest(1)).await.unwrap();
        assert!(store.get_active(&key()).await.unwrap().is_none());
        assert_eq!(store.latest_version(&key()).await.unwrap(), 1);
        assert_eq!(store.version_count(&key()), 1);
    }

    #[tokio::test]
    async fn activate_swaps_single_active_version() {
        let store = MemoryManifestStore::new();
        store.insert(manifest(1)).await.unwrap();
        store.insert(manifest(2)).await.unwrap();

        let active = store.activate(&key(), 1).await.unwrap();
        assert_eq!(active.version, 1);
        let active = store.activate(&key(), 2).await.unwrap();
        assert_eq!(active.version, 2);

        let v1 = store.get(&key(), 1).await.unwrap().unwrap();
        assert!(!v1.is_active);
    }

    #[tokio::test]
    async fn activate_older_version_returns_current_winner() {
        let store = MemoryManifestStore::new();
        store.insert(manifest(1)).await.unwrap();
        store.insert(manifest(2)).await.unwrap();
        store.activate(&key(), 2).await.unwrap();

        let winner = store.activate(&key(), 1).await.unwrap();
        assert_eq!(winner.version, 2);
        assert!(winner.is_active);
    }

    #[tokio::test]
    async fn activate_missing_version_is_not_found() {
        let store = MemoryManifestStore::new();
        store.insert(manifest(1)).await.unwrap();
        let err = store.activate(&key(), 9).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { version: 9 }));
    }

    #[tokio::test]
    async fn duplicate_version_insert_is_rejected() {
        let store = MemoryManifestStore::new();
        store.insert(manifest(1)).await.unwrap();
        let err = store.insert(manifest(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::Backend(_)));
    }

    #[tokio::test]
    async fn outcome_counters_follow_streak_rules() {
        let store = MemoryManifestStore::new();
        store.insert(manifest(1)).await.unwrap();
        store.activate(&key(), 1).await.unwrap();

        store.record_outcome(&key(), 1, false).await.unwrap();
        let after_two = store.record_outcome(&key(), 1, false).await.unwrap();
        assert_eq!(after_two.consecutive_failures, 2);

        let after_success = store.record_outcome(&key(), 1, true).await.unwrap();
        assert_eq!(after_success.consecutive_failures, 0);
        assert_eq!(after_success.failure_count, 2);
        assert_eq!(after_success.success_count, 1);
    }
}
