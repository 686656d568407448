// borevault-core/src/infrastructure/object_store/memory.rs
//
// In-memory backend. Serves the `mock` storage mode and the test suites;
// the write counter lets tests assert that an operation performed no writes
// (the parse-worker idempotence law).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::infrastructure::error::ObjectStoreError;
use crate::ports::object_store::{guard_against_overwrite, ObjectStore};

#[derive(Default, Debug)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Bytes>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `put` calls since construction.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        _content_type: &str,
        allow_overwrite: bool,
    ) -> Result<(), ObjectStoreError> {
        if !allow_overwrite {
            guard_against_overwrite(self, key).await?;
        }
        let mut objects = self
            .objects
            .lock()
            .map_err(|e| ObjectStoreError::Transport(e.to_string()))?;
        objects.insert(key.to_string(), data);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let objects = self
            .objects
            .lock()
            .map_err(|e| ObjectStoreError::Transport(e.to_string()))?;
        objects
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn head(&self, key: &str) -> Result<bool, ObjectStoreError> {
        let objects = self
            .objects
            .lock()
            .map_err(|e| ObjectStoreError::Transport(e.to_string()))?;
        Ok(objects.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        let objects = self
            .objects
            .lock()
            .map_err(|e| ObjectStoreError::Transport(e.to_string()))?;
        Ok(objects
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
