// borevault-core/src/application/versioned.rs
//
// Versioned repository over the columnar engine: per-record version
// directory plus a metadata document, with the draft/approved/rejected
// state machine and append-only history.
//
// Write ordering is fixed: data file first (overwrite-guarded), metadata
// second (overwrite allowed). A crash between the two leaves an orphan
// version file; the next update selects the same version number and the
// guard fails it. That fail-closed behavior is the engine's concurrency
// primitive — there is no retry loop here, callers re-read and retry.

use bytes::Bytes;
use tracing::{info, instrument};

use crate::domain::record::{RecordMetadata, RecordStatus};
use crate::domain::registry;
use crate::domain::value::{now_iso, Row};
use crate::domain::DomainError;
use crate::error::VaultError;
use crate::infrastructure::columnar::ColumnarEngine;
use crate::infrastructure::error::{InfrastructureError, ObjectStoreError};
use crate::ports::object_store::CONTENT_TYPE_JSON;

pub struct VersionedStore {
    engine: ColumnarEngine,
}

impl VersionedStore {
    pub fn new(engine: ColumnarEngine) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &ColumnarEngine {
        &self.engine
    }

    // --- Key layout (stable; consumers depend on it) ---

    fn metadata_path(record_id: &str) -> String {
        format!("records/{record_id}/metadata.json")
    }

    fn version_path(record_id: &str, version: u32) -> String {
        format!("records/{record_id}/versions/v{version}.parquet")
    }

    /// Full object-store key of a version file.
    pub fn version_key(&self, record_id: &str, version: u32) -> String {
        self.engine.full_key(&Self::version_path(record_id, version))
    }

    // --- Metadata I/O ---

    pub async fn get_metadata(
        &self,
        record_id: &str,
    ) -> Result<Option<RecordMetadata>, VaultError> {
        let key = self.engine.full_key(&Self::metadata_path(record_id));
        match self.engine.store().get(&key).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(ObjectStoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(InfrastructureError::from(e).into()),
        }
    }

    async fn write_metadata(&self, metadata: &RecordMetadata) -> Result<(), VaultError> {
        let key = self
            .engine
            .full_key(&Self::metadata_path(&metadata.record_id));
        let body = serde_json::to_vec_pretty(metadata)?;
        self.engine
            .store()
            .put(&key, Bytes::from(body), CONTENT_TYPE_JSON, true)
            .await
            .map_err(InfrastructureError::from)?;
        Ok(())
    }

    async fn require_metadata(&self, record_id: &str) -> Result<RecordMetadata, VaultError> {
        self.get_metadata(record_id)
            .await?
            .ok_or_else(|| DomainError::RecordNotFound(record_id.to_string()).into())
    }

    // =========================================================================
    //  WRITES
    // =========================================================================

    /// Create a record with version 1 in draft.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn create_record(
        &self,
        record_id: &str,
        rows: &[Row],
        table_name: &str,
        user: &str,
        comment: Option<&str>,
    ) -> Result<RecordMetadata, VaultError> {
        if self.get_metadata(record_id).await?.is_some() {
            return Err(DomainError::AlreadyExists(record_id.to_string()).into());
        }

        let schema = registry::lookup(table_name)
            .ok_or_else(|| DomainError::UnknownTable(table_name.to_string()))?;

        // Data file first; v1 is immutable from the moment it lands.
        self.engine
            .write_exact(&Self::version_path(record_id, 1), rows, Some(schema), false)
            .await?;

        let now = now_iso();
        let mut metadata = RecordMetadata::new_draft(record_id, table_name, user, &now);
        metadata.push_history(
            1,
            RecordStatus::Draft,
            user,
            &now,
            comment.unwrap_or("Initial creation"),
        );
        self.write_metadata(&metadata).await?;

        info!(record_id, "created record at version 1");
        Ok(metadata)
    }

    /// Append a new version; the record returns to draft.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn update_record(
        &self,
        record_id: &str,
        rows: &[Row],
        user: &str,
        comment: Option<&str>,
    ) -> Result<RecordMetadata, VaultError> {
        let mut metadata = self.require_metadata(record_id).await?;
        let schema = registry::lookup(&metadata.table_name)
            .ok_or_else(|| DomainError::UnknownTable(metadata.table_name.clone()))?;

        let new_version = metadata.current_version + 1;

        // Two racing updates both target v{N+1}; exactly one wins this put.
        self.engine
            .write_exact(
                &Self::version_path(record_id, new_version),
                rows,
                Some(schema),
                false,
            )
            .await?;

        let now = now_iso();
        metadata.current_version = new_version;
        metadata.status = RecordStatus::Draft;
        // The newest transition is a draft update, so no approval or
        // rejection provenance may remain attached.
        metadata.approved_by = None;
        metadata.approved_at = None;
        metadata.rejected_by = None;
        metadata.rejected_at = None;
        let default_comment = format!("Updated to version {new_version}");
        metadata.push_history(
            new_version,
            RecordStatus::Draft,
            user,
            &now,
            comment.unwrap_or(&default_comment),
        );
        self.write_metadata(&metadata).await?;

        info!(record_id, version = new_version, "updated record");
        Ok(metadata)
    }

    /// Approve the current version. Metadata-only; no data-file I/O.
    #[instrument(skip(self))]
    pub async fn approve_record(
        &self,
        record_id: &str,
        user: &str,
        comment: Option<&str>,
    ) -> Result<RecordMetadata, VaultError> {
        let mut metadata = self.require_metadata(record_id).await?;
        metadata.check_approvable()?;

        let now = now_iso();
        metadata.status = RecordStatus::Approved;
        metadata.approved_by = Some(user.to_string());
        metadata.approved_at = Some(now.clone());
        metadata.push_history(
            metadata.current_version,
            RecordStatus::Approved,
            user,
            &now,
            comment.unwrap_or("Record approved"),
        );
        self.write_metadata(&metadata).await?;

        info!(record_id, version = metadata.current_version, "approved record");
        Ok(metadata)
    }

    /// Reject the current version. Metadata-only; no data-file I/O.
    #[instrument(skip(self))]
    pub async fn reject_record(
        &self,
        record_id: &str,
        user: &str,
        comment: Option<&str>,
    ) -> Result<RecordMetadata, VaultError> {
        let mut metadata = self.require_metadata(record_id).await?;
        metadata.check_rejectable()?;

        let now = now_iso();
        metadata.status = RecordStatus::Rejected;
        metadata.rejected_by = Some(user.to_string());
        metadata.rejected_at = Some(now.clone());
        metadata.push_history(
            metadata.current_version,
            RecordStatus::Rejected,
            user,
            &now,
            comment.unwrap_or("Record rejected"),
        );
        self.write_metadata(&metadata).await?;

        info!(record_id, version = metadata.current_version, "rejected record");
        Ok(metadata)
    }

    // =========================================================================
    //  READS
    // =========================================================================

    /// Rows of the current version, or None when the record doesn't exist.
    pub async fn get_latest_version(
        &self,
        record_id: &str,
    ) -> Result<Option<Vec<Row>>, VaultError> {
        let Some(metadata) = self.get_metadata(record_id).await? else {
            return Ok(None);
        };
        self.get_specific_version(record_id, metadata.current_version)
            .await
    }

    /// Rows of one version; None when that version doesn't exist. Versions
    /// outside [1, current_version] are never read — an orphan file from a
    /// crashed write is not reachable through this path.
    pub async fn get_specific_version(
        &self,
        record_id: &str,
        version: u32,
    ) -> Result<Option<Vec<Row>>, VaultError> {
        let metadata = self.require_metadata(record_id).await?;
        if version == 0 || version > metadata.current_version {
            return Ok(None);
        }
        match self
            .engine
            .read(&Self::version_path(record_id, version), None)
            .await
        {
            Ok(rows) => Ok(Some(rows)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Version numbers 1..=current whose data file is verified to exist.
    pub async fn get_all_versions(&self, record_id: &str) -> Result<Vec<u32>, VaultError> {
        let Some(metadata) = self.get_metadata(record_id).await? else {
            return Ok(Vec::new());
        };

        let mut versions = Vec::new();
        for version in 1..=metadata.current_version {
            let key = self.version_key(record_id, version);
            if self
                .engine
                .store()
                .head(&key)
                .await
                .map_err(InfrastructureError::from)?
            {
                versions.push(version);
            }
        }
        Ok(versions)
    }

    /// All record ids, optionally filtered by table and/or status. Sorted.
    pub async fn list_records(
        &self,
        table_name: Option<&str>,
        status: Option<RecordStatus>,
    ) -> Result<Vec<String>, VaultError> {
        let prefix = self.engine.full_key("records/");
        let keys = self
            .engine
            .store()
            .list(&prefix)
            .await
            .map_err(InfrastructureError::from)?;

        let mut record_ids = Vec::new();
        for key in keys {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            let Some(record_id) = rest.strip_suffix("/metadata.json") else {
                continue;
            };

            if table_name.is_some() || status.is_some() {
                let Some(metadata) = self.get_metadata(record_id).await? else {
                    continue;
                };
                if let Some(table) = table_name {
                    if metadata.table_name != table {
                        continue;
                    }
                }
                if let Some(wanted) = status {
                    if metadata.status != wanted {
                        continue;
                    }
                }
            }
            record_ids.push(record_id.to_string());
        }

        record_ids.sort_unstable();
        Ok(record_ids)
    }
}

// =============================================================================
//  TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::value::{row_get, Value};
    use crate::infrastructure::object_store::MemoryStore;
    use crate::ports::ObjectStore;
    use std::sync::Arc;

    fn store_and_repo() -> (Arc<MemoryStore>, VersionedStore) {
        let store = Arc::new(MemoryStore::new());
        let engine = ColumnarEngine::new(store.clone(), "parquet-data");
        (store, VersionedStore::new(engine))
    }

    /// One borelog_versions row in schema order, null-filled except the
    /// provided cells.
    fn borelog_row(cells: &[(&str, Value)]) -> Row {
        let schema = registry::lookup("borelog_versions").unwrap();
        schema
            .fields
            .iter()
            .map(|field| {
                let value = cells
                    .iter()
                    .find(|(name, _)| *name == field.name)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Null);
                (field.name.clone(), value)
            })
            .collect()
    }

    fn draft_rows(borehole: &str) -> Vec<Row> {
        vec![borelog_row(&[
            ("borelog_id", Value::Str("bh-1".into())),
            ("project_id", Value::Str("p1".into())),
            ("borehole_no", Value::Str(borehole.into())),
            ("termination_depth", Value::Float(30.0)),
        ])]
    }

    const RECORD: &str = "p1/borelog/bh-1";

    #[tokio::test]
    async fn test_create_then_approve_scenario() {
        let (_store, repo) = store_and_repo();

        repo.create_record(RECORD, &draft_rows("BH-01"), "borelog_versions", "u1", None)
            .await
            .unwrap();

        let rows = repo.get_latest_version(RECORD).await.unwrap().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            row_get(&rows[0], "borehole_no"),
            Some(&Value::Str("BH-01".into()))
        );

        let metadata = repo.approve_record(RECORD, "u2", None).await.unwrap();
        assert_eq!(metadata.current_version, 1);
        assert_eq!(metadata.status, RecordStatus::Approved);
        assert_eq!(metadata.approved_by.as_deref(), Some("u2"));
        assert!(metadata.approved_at.is_some());
        assert_eq!(metadata.history.len(), 2);
        assert_eq!(metadata.history[0].status, RecordStatus::Draft);
        assert_eq!(metadata.history[1].status, RecordStatus::Approved);
        assert_eq!(metadata.history[1].version, 1);
    }

    #[tokio::test]
    async fn test_create_twice_is_already_exists() {
        let (_store, repo) = store_and_repo();
        repo.create_record(RECORD, &draft_rows("BH-01"), "borelog_versions", "u1", None)
            .await
            .unwrap();
        let err = repo
            .create_record(RECORD, &draft_rows("BH-01"), "borelog_versions", "u1", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Domain(DomainError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_table_rejected() {
        let (_store, repo) = store_and_repo();
        let err = repo
            .create_record(RECORD, &draft_rows("BH-01"), "no_such_table", "u1", None)
            .await
            .unwrap_err();
        assert!(matches!(err, VaultError::Domain(DomainError::UnknownTable(_))));
    }

    #[tokio::test]
    async fn test_update_retains_prior_version_bytes() {
        let (store, repo) = store_and_repo();
        repo.create_record(RECORD, &draft_rows("BH-01"), "borelog_versions", "u1", None)
            .await
            .unwrap();
        repo.approve_record(RECORD, "u2", None).await.unwrap();

        let v1_key = repo.version_key(RECORD, 1);
        let v1_before = store.get(&v1_key).await.unwrap();

        let metadata = repo
            .update_record(RECORD, &draft_rows("BH-01-rev"), "u3", None)
            .await
            .unwrap();
        assert_eq!(metadata.current_version, 2);
        assert_eq!(metadata.status, RecordStatus::Draft);
        // Draft is the newest transition; approval provenance is gone.
        assert_eq!(metadata.approved_by, None);
        assert_eq!(metadata.approved_at, None);

        // v1 is bit-identical to before the update.
        let v1_after = store.get(&v1_key).await.unwrap();
        assert_eq!(v1_before, v1_after);

        let v1_rows = repo.get_specific_version(RECORD, 1).await.unwrap().unwrap();
        assert_eq!(
            row_get(&v1_rows[0], "borehole_no"),
            Some(&Value::Str("BH-01".into()))
        );
        let v2_rows = repo.get_specific_version(RECORD, 2).await.unwrap().unwrap();
        assert_eq!(
            row_get(&v2_rows[0], "borehole_no"),
            Some(&Value::Str("BH-01-rev".into()))
        );
    }

    #[tokio::test]
    async fn test_concurrent_update_collision() {
        let (store, repo) = store_and_repo();
        repo.create_record(RECORD, &draft_rows("BH-01"), "borelog_versions", "u1", None)
            .await
            .unwrap();

        // A racing writer already landed v2.
        let racing_key = repo.version_key(RECORD, 2);
        store
            .put(&racing_key, bytes::Bytes::from_static(b"winner"), "application/octet-stream", false)
            .await
            .unwrap();

        let err = repo
            .update_record(RECORD, &draft_rows("BH-loser"), "u2", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Infrastructure(InfrastructureError::ObjectStore(
                ObjectStoreError::OverwriteForbidden(_)
            ))
        ));

        // The loser's metadata was never advanced.
        let metadata = repo.get_metadata(RECORD).await.unwrap().unwrap();
        assert_eq!(metadata.current_version, 1);
    }

    #[tokio::test]
    async fn test_illegal_transitions() {
        let (_store, repo) = store_and_repo();
        repo.create_record(RECORD, &draft_rows("BH-01"), "borelog_versions", "u1", None)
            .await
            .unwrap();
        repo.approve_record(RECORD, "u2", None).await.unwrap();

        // Approve-when-approved: fails and does NOT double-append history.
        let before = repo.get_metadata(RECORD).await.unwrap().unwrap();
        let err = repo.approve_record(RECORD, "u2", None).await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::Domain(DomainError::IllegalTransition { .. })
        ));
        let after = repo.get_metadata(RECORD).await.unwrap().unwrap();
        assert_eq!(before.history.len(), after.history.len());

        // Reject-when-approved is forbidden.
        let err = repo.reject_record(RECORD, "u2", None).await.unwrap_err();
        assert!(matches!(
            err,
            VaultError::Domain(DomainError::IllegalTransition { .. })
        ));

        // A fresh draft can be rejected, then neither approved nor re-rejected.
        repo.update_record(RECORD, &draft_rows("BH-02"), "u1", None)
            .await
            .unwrap();
        repo.reject_record(RECORD, "u3", Some("bad data")).await.unwrap();
        assert!(repo.approve_record(RECORD, "u2", None).await.is_err());
        assert!(repo.reject_record(RECORD, "u3", None).await.is_err());
    }

    #[tokio::test]
    async fn test_every_mutation_grows_history_by_one() {
        let (_store, repo) = store_and_repo();
        let history_len = |m: &RecordMetadata| m.history.len();

        let m = repo
            .create_record(RECORD, &draft_rows("BH-01"), "borelog_versions", "u1", None)
            .await
            .unwrap();
        assert_eq!(history_len(&m), 1);

        let m = repo
            .update_record(RECORD, &draft_rows("BH-02"), "u1", None)
            .await
            .unwrap();
        assert_eq!(history_len(&m), 2);

        let m = repo.approve_record(RECORD, "u2", None).await.unwrap();
        assert_eq!(history_len(&m), 3);

        let m = repo
            .update_record(RECORD, &draft_rows("BH-03"), "u1", None)
            .await
            .unwrap();
        assert_eq!(history_len(&m), 4);
        // Entries stay in order; nothing was reordered or dropped.
        let versions: Vec<u32> = m.history.iter().map(|h| h.version).collect();
        assert_eq!(versions, vec![1, 2, 2, 3]);
    }

    #[tokio::test]
    async fn test_orphan_version_is_unreachable() {
        let (store, repo) = store_and_repo();
        repo.create_record(RECORD, &draft_rows("BH-01"), "borelog_versions", "u1", None)
            .await
            .unwrap();

        // Simulate a crash after the v2 data write, before metadata: the
        // orphan file exists but current_version is still 1.
        let orphan_key = repo.version_key(RECORD, 2);
        store
            .put(&orphan_key, bytes::Bytes::from_static(b"orphan"), "application/octet-stream", false)
            .await
            .unwrap();

        assert!(repo
            .get_specific_version(RECORD, 2)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_reads_on_missing_record() {
        let (_store, repo) = store_and_repo();
        assert!(repo.get_metadata("nope/borelog/x").await.unwrap().is_none());
        assert!(repo
            .get_latest_version("nope/borelog/x")
            .await
            .unwrap()
            .is_none());
        assert!(repo.get_all_versions("nope/borelog/x").await.unwrap().is_empty());
        let err = repo
            .get_specific_version("nope/borelog/x", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VaultError::Domain(DomainError::RecordNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_get_all_versions() {
        let (_store, repo) = store_and_repo();
        repo.create_record(RECORD, &draft_rows("BH-01"), "borelog_versions", "u1", None)
            .await
            .unwrap();
        repo.update_record(RECORD, &draft_rows("BH-02"), "u1", None)
            .await
            .unwrap();
        repo.update_record(RECORD, &draft_rows("BH-03"), "u1", None)
            .await
            .unwrap();
        assert_eq!(repo.get_all_versions(RECORD).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_records_with_filters() {
        let (_store, repo) = store_and_repo();
        repo.create_record(
            "p1/borelog/a",
            &draft_rows("A"),
            "borelog_versions",
            "u1",
            None,
        )
        .await
        .unwrap();
        repo.create_record(
            "p1/borelog/b",
            &draft_rows("B"),
            "borelog_versions",
            "u1",
            None,
        )
        .await
        .unwrap();
        repo.approve_record("p1/borelog/b", "u2", None).await.unwrap();

        let all = repo.list_records(None, None).await.unwrap();
        assert_eq!(all, vec!["p1/borelog/a".to_string(), "p1/borelog/b".to_string()]);

        let approved = repo
            .list_records(Some("borelog_versions"), Some(RecordStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved, vec!["p1/borelog/b".to_string()]);

        let other_table = repo.list_records(Some("projects"), None).await.unwrap();
        assert!(other_table.is_empty());
    }
}
