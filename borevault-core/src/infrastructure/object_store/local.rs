// borevault-core/src/infrastructure/object_store/local.rs
//
// Local-filesystem backend. Keys translate to paths under a configured
// root; parent directories are created lazily on write. Writes go through
// a temp file + rename so a crashed write never leaves a partial object.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;
use walkdir::WalkDir;

use crate::infrastructure::error::ObjectStoreError;
use crate::ports::object_store::{guard_against_overwrite, ObjectStore};

#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, ObjectStoreError> {
        // Keys are engine-owned, but refuse traversal anyway.
        if key.split('/').any(|part| part == "..") {
            return Err(ObjectStoreError::Transport(format!(
                "unsafe key rejected: {key}"
            )));
        }
        Ok(self.root.join(key))
    }

    fn io_transport(err: std::io::Error, key: &str) -> ObjectStoreError {
        ObjectStoreError::Transport(format!("{key}: {err}"))
    }

    /// Temp file in the target directory, then an atomic rename.
    fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(data)?;
        temp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
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
        let path = self.path_for(key)?;
        Self::atomic_write(&path, &data).map_err(|e| Self::io_transport(e, key))?;
        debug!(key, bytes = data.len(), "wrote local object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(Self::io_transport(e, key)),
        }
    }

    async fn head(&self, key: &str) -> Result<bool, ObjectStoreError> {
        Ok(self.path_for(key)?.is_file())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in WalkDir::new(&self.root).into_iter() {
            let entry = entry.map_err(|e| ObjectStoreError::Transport(e.to_string()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| ObjectStoreError::Transport(e.to_string()))?;
            let key = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if key.starts_with(prefix) {
                keys.push(key);
            }
        }
        keys.sort_unstable();
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_put_creates_directories_lazily() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .put(
                "records/p1/borelog/e1/metadata.json",
                Bytes::from_static(b"{}"),
                "application/json",
                false,
            )
            .await
            .unwrap();

        assert!(dir
            .path()
            .join("records/p1/borelog/e1/metadata.json")
            .is_file());
    }

    #[tokio::test]
    async fn test_overwrite_guard() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        store
            .put("v1.parquet", Bytes::from_static(b"a"), "application/octet-stream", false)
            .await
            .unwrap();
        let err = store
            .put("v1.parquet", Bytes::from_static(b"b"), "application/octet-stream", false)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::OverwriteForbidden(_)));
        assert_eq!(store.get("v1.parquet").await.unwrap(), Bytes::from_static(b"a"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        assert!(matches!(
            store.get("missing").await.unwrap_err(),
            ObjectStoreError::NotFound(_)
        ));
        assert!(!store.head("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_prefix_and_empty_root() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("not-created-yet"));
        assert!(store.list("records/").await.unwrap().is_empty());

        let store = LocalStore::new(dir.path());
        for key in ["records/a/metadata.json", "records/b/metadata.json", "other/x"] {
            store
                .put(key, Bytes::new(), "application/json", false)
                .await
                .unwrap();
        }
        let keys = store.list("records/").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "records/a/metadata.json".to_string(),
                "records/b/metadata.json".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let dir = tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let err = store
            .put("../escape", Bytes::new(), "text/plain", true)
            .await
            .unwrap_err();
        assert!(matches!(err, ObjectStoreError::Transport(_)));
    }
}
