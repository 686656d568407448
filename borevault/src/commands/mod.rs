// borevault/src/commands/mod.rs

pub mod dispatch;
pub mod ingest;
pub mod parse;
pub mod records;
pub mod worker;

use std::sync::Arc;

use borevault_core::application::{EntityRepository, VersionedStore};
use borevault_core::infrastructure::columnar::ColumnarEngine;
use borevault_core::infrastructure::config::StorageConfig;
use borevault_core::ports::ObjectStore;

/// Repository wired from the environment (STORAGE_MODE and friends).
pub async fn open_repository() -> anyhow::Result<EntityRepository> {
    let config = StorageConfig::from_env();
    let store = config.build_store().await?;
    let engine = ColumnarEngine::new(store, &config.base_path);
    Ok(EntityRepository::new(VersionedStore::new(engine)))
}

/// Raw store handle for the worker path.
pub async fn open_store() -> anyhow::Result<Arc<dyn ObjectStore>> {
    let config = StorageConfig::from_env();
    Ok(config.build_store().await?)
}
