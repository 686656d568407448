// borevault-core/src/application/repository.rs
//
// Project-scoped, entity-typed facade over the versioned store. Payloads
// arrive as arbitrary keyed JSON and are projected onto the entity's locked
// table schema at this boundary; reads convert rows back to JSON with
// ISO-8601 timestamps.

use serde::Serialize;
use serde_json::{Map, Value as Json};
use tracing::instrument;

use crate::domain::record::{EntityType, HistoryEntry, RecordAddress, RecordMetadata, RecordStatus};
use crate::domain::registry;
use crate::domain::schema::TableSchema;
use crate::domain::value::{row_to_json, Row, Value};
use crate::domain::DomainError;
use crate::error::VaultError;

use super::versioned::VersionedStore;

/// Composite result returned by every facade operation.
#[derive(Debug, Clone, Serialize)]
pub struct EntityRecord {
    pub entity_type: String,
    pub project_id: String,
    pub entity_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    pub data: Json,
    pub metadata: Json,
}

pub struct EntityRepository {
    store: VersionedStore,
}

impl EntityRepository {
    pub fn new(store: VersionedStore) -> Self {
        Self { store }
    }

    pub fn versioned(&self) -> &VersionedStore {
        &self.store
    }

    // =========================================================================
    //  PAYLOAD <-> ROW
    // =========================================================================

    /// Project a keyed payload onto the table schema: inject project_id,
    /// fill absent columns with nulls, return one row in schema order.
    pub fn payload_to_row(schema: &TableSchema, payload: &Json, project_id: &str) -> Row {
        let empty = Map::new();
        let fields = payload.as_object().unwrap_or(&empty);

        schema
            .fields
            .iter()
            .map(|field| {
                let value = if field.name == "project_id" && !fields.contains_key("project_id") {
                    Value::Str(project_id.to_string())
                } else {
                    fields
                        .get(&field.name)
                        .map(Value::from_json)
                        .unwrap_or(Value::Null)
                };
                (field.name.clone(), value)
            })
            .collect()
    }

    fn first_row_json(rows: Option<&Vec<Row>>) -> Json {
        rows.and_then(|rows| rows.first())
            .map(row_to_json)
            .unwrap_or_else(|| Json::Object(Map::new()))
    }

    fn metadata_json(metadata: &RecordMetadata) -> Json {
        serde_json::json!({
            "current_version": metadata.current_version,
            "status": metadata.status,
            "created_by": metadata.created_by,
            "created_at": metadata.created_at,
            "approved_by": metadata.approved_by,
            "approved_at": metadata.approved_at,
            "rejected_by": metadata.rejected_by,
            "rejected_at": metadata.rejected_at,
        })
    }

    fn table_schema(entity_type: EntityType) -> Result<&'static TableSchema, VaultError> {
        registry::lookup(entity_type.table_name())
            .ok_or_else(|| DomainError::UnknownTable(entity_type.table_name().to_string()).into())
    }

    async fn assemble(
        &self,
        address: &RecordAddress,
        metadata: &RecordMetadata,
        version: Option<u32>,
    ) -> Result<EntityRecord, VaultError> {
        let record_id = address.record_id();
        let rows = match version {
            Some(v) => self.store.get_specific_version(&record_id, v).await?,
            None => self.store.get_latest_version(&record_id).await?,
        };
        Ok(EntityRecord {
            entity_type: address.entity_type.as_str().to_string(),
            project_id: address.project_id.clone(),
            entity_id: address.entity_id.clone(),
            version,
            data: Self::first_row_json(rows.as_ref()),
            metadata: Self::metadata_json(metadata),
        })
    }

    // =========================================================================
    //  OPERATIONS
    // =========================================================================

    #[instrument(skip(self, payload))]
    pub async fn create(
        &self,
        address: &RecordAddress,
        payload: &Json,
        user: &str,
        comment: Option<&str>,
    ) -> Result<EntityRecord, VaultError> {
        let schema = Self::table_schema(address.entity_type)?;
        let row = Self::payload_to_row(schema, payload, &address.project_id);
        let default_comment = format!(
            "Created {} {} in project {}",
            address.entity_type, address.entity_id, address.project_id
        );

        let metadata = self
            .store
            .create_record(
                &address.record_id(),
                &[row],
                address.entity_type.table_name(),
                user,
                Some(comment.unwrap_or(&default_comment)),
            )
            .await?;

        self.assemble(address, &metadata, None).await
    }

    #[instrument(skip(self, payload))]
    pub async fn update(
        &self,
        address: &RecordAddress,
        payload: &Json,
        user: &str,
        comment: Option<&str>,
    ) -> Result<EntityRecord, VaultError> {
        let schema = Self::table_schema(address.entity_type)?;
        let row = Self::payload_to_row(schema, payload, &address.project_id);

        let metadata = self
            .store
            .update_record(&address.record_id(), &[row], user, comment)
            .await?;

        self.assemble(address, &metadata, None).await
    }

    pub async fn get_latest(
        &self,
        address: &RecordAddress,
    ) -> Result<Option<EntityRecord>, VaultError> {
        let Some(metadata) = self.store.get_metadata(&address.record_id()).await? else {
            return Ok(None);
        };
        Ok(Some(self.assemble(address, &metadata, None).await?))
    }

    pub async fn get_version(
        &self,
        address: &RecordAddress,
        version: u32,
    ) -> Result<Option<EntityRecord>, VaultError> {
        let record_id = address.record_id();
        let Some(metadata) = self.store.get_metadata(&record_id).await? else {
            return Ok(None);
        };
        if self
            .store
            .get_specific_version(&record_id, version)
            .await?
            .is_none()
        {
            return Ok(None);
        }
        Ok(Some(self.assemble(address, &metadata, Some(version)).await?))
    }

    pub async fn get_history(
        &self,
        address: &RecordAddress,
    ) -> Result<Option<Vec<HistoryEntry>>, VaultError> {
        Ok(self
            .store
            .get_metadata(&address.record_id())
            .await?
            .map(|metadata| metadata.history))
    }

    #[instrument(skip(self))]
    pub async fn approve(
        &self,
        address: &RecordAddress,
        approver: &str,
        comment: Option<&str>,
    ) -> Result<EntityRecord, VaultError> {
        let default_comment = format!("Approved {} {}", address.entity_type, address.entity_id);
        let metadata = self
            .store
            .approve_record(
                &address.record_id(),
                approver,
                Some(comment.unwrap_or(&default_comment)),
            )
            .await?;
        self.assemble(address, &metadata, None).await
    }

    #[instrument(skip(self))]
    pub async fn reject(
        &self,
        address: &RecordAddress,
        rejector: &str,
        comment: Option<&str>,
    ) -> Result<EntityRecord, VaultError> {
        let default_comment = format!("Rejected {} {}", address.entity_type, address.entity_id);
        let metadata = self
            .store
            .reject_record(
                &address.record_id(),
                rejector,
                Some(comment.unwrap_or(&default_comment)),
            )
            .await?;
        self.assemble(address, &metadata, None).await
    }

    /// All entities of a type in a project, optionally filtered by status.
    pub async fn list_by_project(
        &self,
        entity_type: EntityType,
        project_id: &str,
        status: Option<RecordStatus>,
    ) -> Result<Vec<EntityRecord>, VaultError> {
        let prefix = format!("{project_id}/{}/", entity_type.as_str());
        let record_ids = self.store.list_records(None, None).await?;

        let mut records = Vec::new();
        for record_id in record_ids {
            let Some(entity_id) = record_id.strip_prefix(&prefix) else {
                continue;
            };
            let address = RecordAddress::new(project_id, entity_type, entity_id);
            let Some(metadata) = self.store.get_metadata(&record_id).await? else {
                continue;
            };
            if let Some(wanted) = status {
                if metadata.status != wanted {
                    continue;
                }
            }
            records.push(self.assemble(&address, &metadata, None).await?);
        }
        Ok(records)
    }
}

// =============================================================================
//  TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::columnar::ColumnarEngine;
    use crate::infrastructure::object_store::MemoryStore;
    use std::sync::Arc;

    fn repo() -> EntityRepository {
        let store = Arc::new(MemoryStore::new());
        let engine = ColumnarEngine::new(store, "parquet-data");
        EntityRepository::new(VersionedStore::new(engine))
    }

    fn address(entity_id: &str) -> RecordAddress {
        RecordAddress::new("p1", EntityType::Borelog, entity_id)
    }

    fn payload(borehole: &str) -> Json {
        serde_json::json!({
            "borelog_id": "bh-1",
            "borehole_no": borehole,
            "chainage_km": 12.5,
            "spt_tests_count": 4,
        })
    }

    #[test]
    fn test_payload_projection_fills_nulls_in_schema_order() {
        let schema = registry::lookup("borelog_versions").unwrap();
        let row = EntityRepository::payload_to_row(schema, &payload("BH-01"), "p1");

        assert_eq!(row.len(), schema.fields.len());
        // Schema order is preserved exactly.
        for (cell, field) in row.iter().zip(schema.fields.iter()) {
            assert_eq!(cell.0, field.name);
        }
        // project_id injected, absent columns null.
        let get = |name: &str| {
            row.iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
                .unwrap()
        };
        assert_eq!(get("project_id"), Value::Str("p1".into()));
        assert_eq!(get("borehole_no"), Value::Str("BH-01".into()));
        assert_eq!(get("chainage_km"), Value::Float(12.5));
        assert_eq!(get("spt_tests_count"), Value::Int(4));
        assert_eq!(get("remarks"), Value::Null);
    }

    #[tokio::test]
    async fn test_create_returns_composite_result() {
        let repo = repo();
        let record = repo
            .create(&address("bh-1"), &payload("BH-01"), "u1", None)
            .await
            .unwrap();

        assert_eq!(record.entity_type, "borelog");
        assert_eq!(record.project_id, "p1");
        assert_eq!(record.entity_id, "bh-1");
        assert_eq!(record.data["borehole_no"], "BH-01");
        assert_eq!(record.data["project_id"], "p1");
        assert!(record.data["remarks"].is_null());
        assert_eq!(record.metadata["current_version"], 1);
        assert_eq!(record.metadata["status"], "draft");
        assert_eq!(record.metadata["created_by"], "u1");
    }

    #[tokio::test]
    async fn test_update_and_get_version() {
        let repo = repo();
        let addr = address("bh-1");
        repo.create(&addr, &payload("BH-01"), "u1", None).await.unwrap();
        let updated = repo
            .update(&addr, &payload("BH-02"), "u1", None)
            .await
            .unwrap();
        assert_eq!(updated.metadata["current_version"], 2);

        let v1 = repo.get_version(&addr, 1).await.unwrap().unwrap();
        assert_eq!(v1.version, Some(1));
        assert_eq!(v1.data["borehole_no"], "BH-01");

        assert!(repo.get_version(&addr, 9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_approve_reject_surface_provenance() {
        let repo = repo();
        let addr = address("bh-1");
        repo.create(&addr, &payload("BH-01"), "u1", None).await.unwrap();

        let approved = repo.approve(&addr, "approver", None).await.unwrap();
        assert_eq!(approved.metadata["status"], "approved");
        assert_eq!(approved.metadata["approved_by"], "approver");

        repo.update(&addr, &payload("BH-02"), "u1", None).await.unwrap();
        let rejected = repo.reject(&addr, "rejector", Some("bad depths")).await.unwrap();
        assert_eq!(rejected.metadata["status"], "rejected");
        assert_eq!(rejected.metadata["rejected_by"], "rejector");
    }

    #[tokio::test]
    async fn test_get_history() {
        let repo = repo();
        let addr = address("bh-1");
        repo.create(&addr, &payload("BH-01"), "u1", None).await.unwrap();
        repo.approve(&addr, "u2", None).await.unwrap();

        let history = repo.get_history(&addr).await.unwrap().unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].comment, "Approved borelog bh-1");

        assert!(repo.get_history(&address("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_project_filters_prefix_and_status() {
        let repo = repo();
        repo.create(&address("a"), &payload("A"), "u1", None).await.unwrap();
        repo.create(&address("b"), &payload("B"), "u1", None).await.unwrap();
        repo.create(
            &RecordAddress::new("p2", EntityType::Borelog, "c"),
            &payload("C"),
            "u1",
            None,
        )
        .await
        .unwrap();
        repo.approve(&address("b"), "u2", None).await.unwrap();

        let all = repo
            .list_by_project(EntityType::Borelog, "p1", None)
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let approved = repo
            .list_by_project(EntityType::Borelog, "p1", Some(RecordStatus::Approved))
            .await
            .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].entity_id, "b");

        let other_type = repo
            .list_by_project(EntityType::LabTest, "p1", None)
            .await
            .unwrap();
        assert!(other_type.is_empty());
    }

    #[tokio::test]
    async fn test_get_latest_missing_is_none() {
        let repo = repo();
        assert!(repo.get_latest(&address("ghost")).await.unwrap().is_none());
    }
}
