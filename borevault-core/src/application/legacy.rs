// borevault-core/src/application/legacy.rs
//
// Legacy borelog approval layout. Predates the records/ tree and is still
// read and written by older consumers:
//
//   projects/{project}/borelogs/{borelog}/metadata.json   (versions[] array)
//   projects/{project}/borelogs/{borelog}/v{N}/data.parquet
//
// Approval here stamps the per-version entry AND the document root, and
// tracks `latest_approved` at the root. Data files stay immutable under the
// same overwrite guard as the modern layout.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as Json};
use tracing::{info, instrument};

use crate::domain::value::{now_iso, row_to_json, Row};
use crate::domain::DomainError;
use crate::error::VaultError;
use crate::infrastructure::columnar::ColumnarEngine;
use crate::infrastructure::error::{InfrastructureError, ObjectStoreError};
use crate::ports::object_store::CONTENT_TYPE_JSON;
use crate::ports::ObjectStore;

pub const STATUS_DRAFT: &str = "DRAFT";
pub const STATUS_APPROVED: &str = "APPROVED";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyVersionEntry {
    pub version: u32,
    pub status: String,
    pub created_by: String,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMetadata {
    pub project_id: String,
    pub borelog_id: String,
    pub latest_version: u32,
    #[serde(default)]
    pub versions: Vec<LegacyVersionEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_approved: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<String>,
}

impl LegacyMetadata {
    fn new(project_id: &str, borelog_id: &str) -> Self {
        Self {
            project_id: project_id.to_string(),
            borelog_id: borelog_id.to_string(),
            latest_version: 0,
            versions: Vec::new(),
            latest_approved: None,
            approved_by: None,
            approved_at: None,
        }
    }

    pub fn version_entry(&self, version: u32) -> Option<&LegacyVersionEntry> {
        self.versions.iter().find(|v| v.version == version)
    }
}

pub struct LegacyBorelogStore {
    store: Arc<dyn ObjectStore>,
    engine: ColumnarEngine,
}

impl LegacyBorelogStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        // Legacy keys address the bucket directly, without the engine prefix.
        let engine = ColumnarEngine::new(Arc::clone(&store), "");
        Self { store, engine }
    }

    fn metadata_key(project_id: &str, borelog_id: &str) -> String {
        format!("projects/{project_id}/borelogs/{borelog_id}/metadata.json")
    }

    fn parquet_key(project_id: &str, borelog_id: &str, version: u32) -> String {
        format!("projects/{project_id}/borelogs/{borelog_id}/v{version}/data.parquet")
    }

    async fn read_metadata(
        &self,
        project_id: &str,
        borelog_id: &str,
    ) -> Result<Option<LegacyMetadata>, VaultError> {
        let key = Self::metadata_key(project_id, borelog_id);
        match self.store.get(&key).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(ObjectStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(InfrastructureError::from(e).into()),
        }
    }

    async fn write_metadata(&self, metadata: &LegacyMetadata) -> Result<(), VaultError> {
        let key = Self::metadata_key(&metadata.project_id, &metadata.borelog_id);
        let body = serde_json::to_vec_pretty(metadata)?;
        self.store
            .put(&key, Bytes::from(body), CONTENT_TYPE_JSON, true)
            .await
            .map_err(InfrastructureError::from)?;
        Ok(())
    }

    /// Save rows as the next immutable draft version.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn save_draft(
        &self,
        project_id: &str,
        borelog_id: &str,
        rows: &[Row],
        created_by: &str,
    ) -> Result<LegacyMetadata, VaultError> {
        let mut metadata = self
            .read_metadata(project_id, borelog_id)
            .await?
            .unwrap_or_else(|| LegacyMetadata::new(project_id, borelog_id));

        let next_version = metadata.latest_version + 1;
        let parquet_key = Self::parquet_key(project_id, borelog_id, next_version);

        // Guarded data write first; metadata only advances afterwards.
        self.engine
            .write_exact(&parquet_key, rows, None, false)
            .await?;

        metadata.latest_version = next_version;
        metadata.versions.push(LegacyVersionEntry {
            version: next_version,
            status: STATUS_DRAFT.to_string(),
            created_by: created_by.to_string(),
            created_at: now_iso(),
            approved_by: None,
            approved_at: None,
        });
        self.write_metadata(&metadata).await?;

        info!(borelog_id, version = next_version, "saved legacy draft");
        Ok(metadata)
    }

    /// Approve one version: metadata-only, stamps the version entry and the
    /// document root, and moves `latest_approved`.
    #[instrument(skip(self))]
    pub async fn approve_version(
        &self,
        project_id: &str,
        borelog_id: &str,
        version: u32,
        approved_by: &str,
    ) -> Result<LegacyMetadata, VaultError> {
        let mut metadata = self
            .read_metadata(project_id, borelog_id)
            .await?
            .ok_or_else(|| {
                DomainError::RecordNotFound(format!(
                    "legacy metadata for borelog {borelog_id} in project {project_id}"
                ))
            })?;

        // The parquet object must exist before a version can be approved.
        let parquet_key = Self::parquet_key(project_id, borelog_id, version);
        let exists = self
            .store
            .head(&parquet_key)
            .await
            .map_err(InfrastructureError::from)?;
        if !exists {
            return Err(DomainError::VersionNotFound {
                record_id: format!("{project_id}/{borelog_id}"),
                version,
            }
            .into());
        }

        let now = now_iso();
        let entry = metadata
            .versions
            .iter_mut()
            .find(|v| v.version == version)
            .ok_or_else(|| DomainError::VersionNotFound {
                record_id: format!("{project_id}/{borelog_id}"),
                version,
            })?;
        entry.status = STATUS_APPROVED.to_string();
        entry.approved_by = Some(approved_by.to_string());
        entry.approved_at = Some(now.clone());

        metadata.latest_approved = Some(version);
        metadata.approved_by = Some(approved_by.to_string());
        metadata.approved_at = Some(now);
        self.write_metadata(&metadata).await?;

        info!(borelog_id, version, "approved legacy version");
        Ok(metadata)
    }

    /// Fetch the latest approved data: one metadata read, one parquet read,
    /// no listing.
    #[instrument(skip(self))]
    pub async fn get_latest_approved(
        &self,
        project_id: &str,
        borelog_id: &str,
    ) -> Result<Json, VaultError> {
        let metadata = self
            .read_metadata(project_id, borelog_id)
            .await?
            .ok_or_else(|| {
                DomainError::RecordNotFound(format!(
                    "legacy metadata for borelog {borelog_id} in project {project_id}"
                ))
            })?;

        let latest_approved = metadata.latest_approved.ok_or_else(|| {
            DomainError::RecordNotFound(format!(
                "no approved version for borelog {borelog_id} in project {project_id}"
            ))
        })?;

        let parquet_key = Self::parquet_key(project_id, borelog_id, latest_approved);
        let rows = self.engine.read_key(&parquet_key, None).await?;
        let data: Vec<Json> = rows.iter().map(row_to_json).collect();

        let version_metadata = metadata.version_entry(latest_approved).cloned();
        Ok(json!({
            "data": data,
            "version": latest_approved,
            "metadata": {
                "project_id": project_id,
                "borelog_id": borelog_id,
                "latest_approved": latest_approved,
                "approved_by": metadata.approved_by.clone(),
                "approved_at": metadata.approved_at.clone(),
                "version_metadata": version_metadata,
            },
        }))
    }
}

// =============================================================================
//  TESTS
// =============================================================================
