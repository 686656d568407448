// borevault-core/src/application/worker.rs
//
// Asynchronous parse worker. Consumes upload events (batched queue records
// or a direct payload), downloads the raw CSV/XLSX, runs the borelog parser
// and persists the structured output plus a depth index. Idempotent per
// (project, borelog, version): existing parsed output short-circuits to
// SKIPPED without re-parsing or writing.
//
// Errors are logged and re-raised; the upstream queue harness owns retry.

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{json, Map, Value as Json};
use tracing::{error, info, instrument, warn};

use crate::domain::borelog::build_depth_index;
use crate::domain::parser::parse_borelog_document;
use crate::domain::value::now_iso;
use crate::domain::DomainError;
use crate::error::VaultError;
use crate::infrastructure::csv_rows::csv_rows;
use crate::infrastructure::error::InfrastructureError;
use crate::infrastructure::xlsx::xlsx_rows;
use crate::ports::object_store::CONTENT_TYPE_JSON;
use crate::ports::ObjectStore;

pub struct ParseWorker {
    store: Arc<dyn ObjectStore>,
}

/// Normalized upload-event payload.
#[derive(Debug, Clone)]
pub struct ParsePayload {
    pub bucket: Option<String>,
    pub key: String,
    pub project_id: String,
    pub borelog_id: String,
    pub upload_id: String,
    pub version_no: u32,
    pub file_type: String,
    pub structure_id: Option<String>,
    pub substructure_id: Option<String>,
    pub requested_by: Option<String>,
}

impl ParsePayload {
    pub fn from_json(payload: &Json) -> Result<Self, VaultError> {
        let text = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|k| payload.get(*k))
                .and_then(Json::as_str)
                .map(str::to_string)
                .filter(|s| !s.is_empty())
        };
        let required = |keys: &[&str]| -> Result<String, VaultError> {
            text(keys).ok_or_else(|| DomainError::MissingField(keys.join("/")).into())
        };

        // version_no arrives as a number or a numeric string; default 1.
        let version_no = match payload.get("version_no") {
            Some(Json::Number(n)) => n.as_u64().unwrap_or(1) as u32,
            Some(Json::String(s)) => s.trim().parse().unwrap_or(1),
            _ => 1,
        };

        Ok(Self {
            bucket: text(&["bucket"]),
            key: required(&["csvKey", "key"])?,
            project_id: required(&["project_id"])?,
            borelog_id: required(&["borelog_id"])?,
            upload_id: required(&["upload_id"])?,
            version_no: version_no.max(1),
            file_type: text(&["fileType", "file_type"])
                .unwrap_or_else(|| "csv".to_string())
                .to_lowercase(),
            structure_id: text(&["structure_id"]),
            substructure_id: text(&["substructure_id"]),
            requested_by: text(&["requestedBy", "requested_by"]),
        })
    }

    fn base_prefix(&self) -> String {
        format!(
            "projects/{}/borelogs/{}/parsed/v{}",
            self.project_id, self.borelog_id, self.version_no
        )
    }

    pub fn strata_key(&self) -> String {
        format!("{}/strata.json", self.base_prefix())
    }

    pub fn index_key(&self) -> String {
        format!("{}/index.json", self.base_prefix())
    }
}

impl ParseWorker {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Entry point: a batched event (`{"Records": [{"body": "..."}]}`) or a
    /// direct payload.
    pub async fn handle_event(&self, event: &Json) -> Result<Json, VaultError> {
        info!(event = %redact_event(event), "borelog parse worker invoked");

        if let Some(records) = event.get("Records").and_then(Json::as_array) {
            let mut processed = 0;
            for record in records {
                let body = record.get("body").and_then(Json::as_str).ok_or_else(|| {
                    VaultError::from(DomainError::MalformedDocument(
                        "queue record missing body".to_string(),
                    ))
                })?;
                let payload: Json = serde_json::from_str(body).map_err(|e| {
                    error!(error = %e, "failed to decode queue record body");
                    VaultError::from(e)
                })?;
                self.process_payload(&payload).await?;
                processed += 1;
            }
            return Ok(json!({ "status": "OK", "processed": processed }));
        }

        let result = self.process_payload(event).await?;
        let mut merged = Map::new();
        merged.insert("status".to_string(), json!("OK"));
        merged.insert("processed".to_string(), json!(1));
        if let Json::Object(fields) = result {
            merged.extend(fields);
        }
        Ok(Json::Object(merged))
    }

    #[instrument(skip(self, payload))]
    async fn process_payload(&self, payload: &Json) -> Result<Json, VaultError> {
        let payload = ParsePayload::from_json(payload)?;
        if let Some(bucket) = &payload.bucket {
            // The worker's store is already bound to one bucket.
            warn!(bucket, "payload bucket field is informational only");
        }

        let strata_key = payload.strata_key();
        let index_key = payload.index_key();

        // Idempotence gate: parsed output already present means no work.
        if self
            .store
            .head(&strata_key)
            .await
            .map_err(InfrastructureError::from)?
        {
            info!(
                borelog_id = %payload.borelog_id,
                version = payload.version_no,
                "parsed output already exists, skipping"
            );
            return Ok(json!({
                "status": "SKIPPED",
                "strata_key": strata_key,
                "index_key": index_key,
            }));
        }

        let raw = self
            .store
            .get(&payload.key)
            .await
            .map_err(|e| {
                error!(key = %payload.key, error = %e, "failed to download raw upload");
                InfrastructureError::from(e)
            })?;

        let rows = self.rows_for(&payload.file_type, &raw)?;
        let (metadata, strata) = parse_borelog_document(rows)?;
        let strata_count = strata.len();
        let depth_index = build_depth_index(&strata);
        info!(strata = strata_count, key = %payload.key, "parsed borelog document");

        let borehole = json!({
            "project_id": payload.project_id,
            "structure_id": payload.structure_id,
            "substructure_id": payload.substructure_id,
            "borelog_id": payload.borelog_id,
            "version_no": payload.version_no,
            "upload_id": payload.upload_id,
            "file_type": payload.file_type,
            "requested_by": payload.requested_by,
            "job_code": metadata.job_code.clone(),
            "metadata": metadata,
            "parsed_at": now_iso(),
        });

        self.put_json(&strata_key, &json!({ "borehole": borehole, "strata": strata }))
            .await?;
        self.put_json(&index_key, &serde_json::to_value(&depth_index)?)
            .await?;

        info!(%strata_key, %index_key, "stored parsed output and depth index");
        Ok(json!({
            "status": "PARSED",
            "strata_count": strata_count,
            "strata_key": strata_key,
            "index_key": index_key,
        }))
    }

    fn rows_for(&self, file_type: &str, raw: &[u8]) -> Result<Vec<Vec<String>>, VaultError> {
        match file_type {
            "xlsx" | "xls" => xlsx_rows(raw),
            _ => csv_rows(raw).collect(),
        }
    }

    async fn put_json(&self, key: &str, value: &Json) -> Result<(), VaultError> {
        let body = serde_json::to_vec(value)?;
        self.store
            .put(key, Bytes::from(body), CONTENT_TYPE_JSON, true)
            .await
            .map_err(InfrastructureError::from)?;
        Ok(())
    }
}

/// Event rendition safe for logs: batched events reduce to a record count,
/// bulky inline payload fields are masked.
fn redact_event(event: &Json) -> Json {
    if let Some(records) = event.get("Records").and_then(Json::as_array) {
        return json!({ "recordCount": records.len() });
    }
    let mut redacted = event.clone();
    if let Some(fields) = redacted.as_object_mut() {
        if fields.contains_key("csv_data") {
            fields.insert("csv_data".to_string(), json!("***"));
        }
    }
    redacted
}

// =============================================================================
//  TESTS
// =============================================================================
