// borevault-core/src/infrastructure/config.rs
//
// Storage configuration resolved from the environment. AWS credentials are
// never read here; they resolve through the standard provider chain inside
// the S3 client.

use std::sync::Arc;

use tracing::info;

use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::object_store::{LocalStore, MemoryStore, S3Store};
use crate::ports::ObjectStore;

pub const DEFAULT_BASE_PATH: &str = "parquet-data";
pub const DEFAULT_AWS_REGION: &str = "us-east-1";
pub const DEFAULT_LOCAL_ROOT: &str = "./mock_s3";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    S3,
    Local,
    Mock,
}

impl StorageMode {
    pub fn parse(value: &str) -> StorageMode {
        match value.trim().to_lowercase().as_str() {
            "s3" => StorageMode::S3,
            "mock" => StorageMode::Mock,
            // Anything unrecognized falls back to local, the safe default.
            _ => StorageMode::Local,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageMode::S3 => "s3",
            StorageMode::Local => "local",
            StorageMode::Mock => "mock",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub bucket_name: Option<String>,
    /// Key prefix under the bucket / local root for engine-managed files.
    pub base_path: String,
    pub aws_region: String,
    pub local_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            mode: StorageMode::Local,
            bucket_name: None,
            base_path: DEFAULT_BASE_PATH.to_string(),
            aws_region: DEFAULT_AWS_REGION.to_string(),
            local_root: DEFAULT_LOCAL_ROOT.to_string(),
        }
    }
}

impl StorageConfig {
    /// Environment variables: STORAGE_MODE, S3_BUCKET_NAME, BASE_PATH,
    /// AWS_REGION, LOCAL_STORAGE_ROOT.
    pub fn from_env() -> Self {
        let get = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Self {
            mode: get("STORAGE_MODE")
                .map(|v| StorageMode::parse(&v))
                .unwrap_or(StorageMode::Local),
            bucket_name: get("S3_BUCKET_NAME"),
            base_path: get("BASE_PATH").unwrap_or_else(|| DEFAULT_BASE_PATH.to_string()),
            aws_region: get("AWS_REGION").unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
            local_root: get("LOCAL_STORAGE_ROOT").unwrap_or_else(|| DEFAULT_LOCAL_ROOT.to_string()),
        }
    }

    /// Instantiate the configured backend.
    pub async fn build_store(&self) -> Result<Arc<dyn ObjectStore>, InfrastructureError> {
        match self.mode {
            StorageMode::S3 => {
                let bucket = self.bucket_name.as_deref().ok_or_else(|| {
                    InfrastructureError::Config(
                        "S3_BUCKET_NAME is required when STORAGE_MODE=s3".to_string(),
                    )
                })?;
                info!(bucket, region = %self.aws_region, "initializing s3 storage");
                Ok(Arc::new(S3Store::from_env(bucket, &self.aws_region).await))
            }
            StorageMode::Local => {
                info!(root = %self.local_root, "initializing local storage");
                Ok(Arc::new(LocalStore::new(&self.local_root)))
            }
            StorageMode::Mock => {
                info!("initializing in-memory mock storage");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parsing_falls_back_to_local() {
        assert_eq!(StorageMode::parse("s3"), StorageMode::S3);
        assert_eq!(StorageMode::parse("S3"), StorageMode::S3);
        assert_eq!(StorageMode::parse("mock"), StorageMode::Mock);
        assert_eq!(StorageMode::parse("local"), StorageMode::Local);
        assert_eq!(StorageMode::parse("banana"), StorageMode::Local);
    }

    #[test]
    fn test_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.base_path, "parquet-data");
        assert_eq!(config.aws_region, "us-east-1");
        assert_eq!(config.mode, StorageMode::Local);
    }

    #[tokio::test]
    async fn test_s3_mode_requires_bucket() {
        let config = StorageConfig {
            mode: StorageMode::S3,
            bucket_name: None,
            ..Default::default()
        };
        let err = config.build_store().await.unwrap_err();
        assert!(matches!(err, InfrastructureError::Config(_)));
    }

    #[tokio::test]
    async fn test_mock_mode_builds_memory_store() {
        let config = StorageConfig {
            mode: StorageMode::Mock,
            ..Default::default()
        };
        let store = config.build_store().await.unwrap();
        assert!(!store.head("anything").await.unwrap());
    }
}
