// borevault-core/src/ports/object_store.rs

use async_trait::async_trait;
use bytes::Bytes;

use crate::infrastructure::error::ObjectStoreError;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_PARQUET: &str = "application/octet-stream";

/// Port over opaque byte blobs addressed by hierarchical keys.
///
/// The engine owns the key layout; backends only move bytes. `put` with
/// `allow_overwrite = false` performs a head-check first and fails with
/// `OverwriteForbidden` when the key exists — this is the single
/// concurrency-correctness primitive of the whole engine, so backends must
/// never silently replace an existing object under that flag.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Write a blob. `allow_overwrite` is only ever true for metadata keys.
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        allow_overwrite: bool,
    ) -> Result<(), ObjectStoreError>;

    /// Read a blob; absent keys are a clean `NotFound`.
    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError>;

    /// Existence check without fetching the body.
    async fn head(&self, key: &str) -> Result<bool, ObjectStoreError>;

    /// All keys under a prefix, in unspecified order. No snapshot isolation:
    /// keys created mid-enumeration may or may not be observed.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError>;
}

/// Shared overwrite guard used by every backend before a guarded `put`.
pub(crate) async fn guard_against_overwrite(
    store: &dyn ObjectStore,
    key: &str,
) -> Result<(), ObjectStoreError> {
    if store.head(key).await? {
        return Err(ObjectStoreError::OverwriteForbidden(key.to_string()));
    }
    Ok(())
}
