// borevault-core/src/application/dispatcher.rs
//
// Transport-facing request dispatcher. Normalizes a gateway-style event or
// a direct invocation into one request envelope, routes on `action`, and
// renders the response envelope (JSON body + CORS headers). The transport
// itself (HTTP server, queue, test harness) lives outside the core.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use serde_json::{json, Map, Value as Json};
use tokio::sync::OnceCell;
use tracing::{error, info};

use crate::application::repository::EntityRepository;
use crate::application::versioned::VersionedStore;
use crate::domain::record::{EntityType, RecordAddress, RecordStatus};
use crate::domain::value::now_iso;
use crate::error::VaultError;
use crate::infrastructure::columnar::ColumnarEngine;
use crate::infrastructure::config::StorageConfig;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::object_store::CONTENT_TYPE_JSON;
use crate::ports::ObjectStore;

pub const SUPPORTED_ACTIONS: [&str; 9] = [
    "create",
    "update",
    "get",
    "approve",
    "reject",
    "list",
    "get_version",
    "get_history",
    "save_stratum",
];

// =============================================================================
//  1. ENVELOPES
// =============================================================================

#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl Response {
    fn new(status_code: u16, body: &Json) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        headers.insert("Access-Control-Allow-Origin".to_string(), "*".to_string());
        headers.insert(
            "Access-Control-Allow-Headers".to_string(),
            "Content-Type".to_string(),
        );
        headers.insert(
            "Access-Control-Allow-Methods".to_string(),
            "GET,POST,PUT,DELETE,OPTIONS".to_string(),
        );
        Self {
            status_code,
            headers,
            body: body.to_string(),
        }
    }

    /// Parsed body, for callers that want structure back.
    pub fn body_json(&self) -> Json {
        serde_json::from_str(&self.body).unwrap_or(Json::Null)
    }
}

/// Normalized request fields, whichever shape the event arrived in.
#[derive(Debug, Clone, Default)]
pub struct RequestEnvelope {
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub project_id: Option<String>,
    pub entity_id: Option<String>,
    pub payload: Json,
    pub user: Option<String>,
    pub approver: Option<String>,
    pub rejector: Option<String>,
    pub comment: Option<String>,
    pub version: Option<String>,
    pub status: Option<String>,
    // Direct-invocation passthrough for save_stratum.
    pub borelog_id: Option<String>,
    pub version_no: Option<Json>,
    pub stratum_metadata_key: Option<String>,
    pub stratum_data_key: Option<String>,
    pub layers: Vec<Json>,
    pub user_id: Option<String>,
}

fn as_text(value: &Json) -> Option<String> {
    match value {
        Json::String(s) if !s.is_empty() => Some(s.clone()),
        Json::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_text(sources: &[&Map<String, Json>], keys: &[&str]) -> Option<String> {
    for key in keys {
        for source in sources {
            if let Some(found) = source.get(*key).and_then(as_text) {
                return Some(found);
            }
        }
    }
    None
}

impl RequestEnvelope {
    /// Gateway events carry `httpMethod`/`requestContext` with a JSON-string
    /// body plus path and query-string parameters; anything else is treated
    /// as a direct invocation.
    pub fn from_event(event: &Json) -> Self {
        let empty = Map::new();
        let top = event.as_object().unwrap_or(&empty);

        let is_gateway = top.contains_key("httpMethod") || top.contains_key("requestContext");
        if !is_gateway {
            return Self::from_fields(&[top]);
        }

        let body_owned: Map<String, Json> = match top.get("body") {
            Some(Json::String(raw)) => serde_json::from_str::<Json>(raw)
                .ok()
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default(),
            Some(Json::Object(fields)) => fields.clone(),
            _ => Map::new(),
        };
        let path_params = top
            .get("pathParameters")
            .and_then(Json::as_object)
            .cloned()
            .unwrap_or_default();
        let query_params = top
            .get("queryStringParameters")
            .and_then(Json::as_object)
            .cloned()
            .unwrap_or_default();

        Self::from_fields(&[&body_owned, &path_params, &query_params])
    }

    fn from_fields(sources: &[&Map<String, Json>]) -> Self {
        let payload = sources
            .iter()
            .find_map(|source| {
                source
                    .get("payload")
                    .or_else(|| source.get("data"))
                    .filter(|v| v.is_object())
            })
            .cloned()
            .unwrap_or_else(|| Json::Object(Map::new()));

        let layers = sources
            .iter()
            .find_map(|source| source.get("layers").and_then(Json::as_array).cloned())
            .unwrap_or_default();

        Self {
            action: first_text(sources, &["action"]),
            entity_type: first_text(sources, &["entity_type"]),
            project_id: first_text(sources, &["project_id"]),
            entity_id: first_text(sources, &["entity_id"]),
            payload,
            user: first_text(sources, &["user", "created_by", "updated_by"]),
            approver: first_text(sources, &["approver", "approved_by"]),
            rejector: first_text(sources, &["rejector", "rejected_by"]),
            comment: first_text(sources, &["comment"]),
            version: first_text(sources, &["version"]),
            status: first_text(sources, &["status"]),
            borelog_id: first_text(sources, &["borelog_id"]),
            version_no: sources
                .iter()
                .find_map(|source| source.get("version_no"))
                .cloned(),
            stratum_metadata_key: first_text(sources, &["stratum_metadata_key"]),
            stratum_data_key: first_text(sources, &["stratum_data_key"]),
            layers,
            user_id: first_text(sources, &["user_id"]),
        }
    }
}

// =============================================================================
//  2. DISPATCHER
// =============================================================================

pub struct Dispatcher {
    repository: EntityRepository,
    store: Arc<dyn ObjectStore>,
}

/// Process-wide handler, built once from the environment and reused across
/// invocations (warm-start cache of backend clients).
static SHARED: OnceCell<Dispatcher> = OnceCell::const_new();

pub async fn shared_dispatcher() -> Result<&'static Dispatcher, VaultError> {
    SHARED
        .get_or_try_init(|| async {
            let config = StorageConfig::from_env();
            let store = config.build_store().await?;
            Ok(Dispatcher::new(store, &config.base_path))
        })
        .await
}

impl Dispatcher {
    pub fn new(store: Arc<dyn ObjectStore>, base_path: &str) -> Self {
        let engine = ColumnarEngine::new(Arc::clone(&store), base_path);
        let repository = EntityRepository::new(VersionedStore::new(engine));
        Self { repository, store }
    }

    pub fn repository(&self) -> &EntityRepository {
        &self.repository
    }

    pub async fn handle(&self, event: &Json) -> Response {
        let request = RequestEnvelope::from_event(event);

        let Some(action) = request.action.clone() else {
            return Response::new(
                400,
                &json!({
                    "error": "Missing action field",
                    "supported_actions": SUPPORTED_ACTIONS,
                }),
            );
        };
        info!(action, "dispatching request");

        match action.as_str() {
            "create" => self.handle_create(&request).await,
            "update" => self.handle_update(&request).await,
            "get" => self.handle_get(&request).await,
            "approve" => self.handle_approve(&request).await,
            "reject" => self.handle_reject(&request).await,
            "list" => self.handle_list(&request).await,
            "get_version" => self.handle_get_version(&request).await,
            "get_history" => self.handle_get_history(&request).await,
            "save_stratum" => self.handle_save_stratum(&request).await,
            unknown => Response::new(
                400,
                &json!({
                    "error": format!("Unknown action: {unknown}"),
                    "supported_actions": SUPPORTED_ACTIONS,
                }),
            ),
        }
    }

    // --- Helpers ---

    fn missing(required: &[&str]) -> Response {
        Response::new(
            400,
            &json!({ "error": "Missing required fields", "required": required }),
        )
    }

    fn failure(err: &VaultError) -> Response {
        let status = err.status_code();
        if status >= 500 {
            error!(error = %err, "request failed");
            Response::new(status, &json!({ "error": "Internal server error" }))
        } else {
            Response::new(status, &json!({ "error": err.to_string() }))
        }
    }

    fn success<T: serde::Serialize>(status: u16, data: &T) -> Response {
        Response::new(status, &json!({ "success": true, "data": data }))
    }

    fn address(request: &RequestEnvelope) -> Result<RecordAddress, VaultError> {
        let entity_type = EntityType::parse(request.entity_type.as_deref().unwrap_or(""))?;
        Ok(RecordAddress::new(
            request.project_id.as_deref().unwrap_or(""),
            entity_type,
            request.entity_id.as_deref().unwrap_or(""),
        ))
    }

    // --- Actions ---

    async fn handle_create(&self, request: &RequestEnvelope) -> Response {
        if request.entity_type.is_none()
            || request.project_id.is_none()
            || request.entity_id.is_none()
            || request.user.is_none()
        {
            return Self::missing(&["entity_type", "project_id", "entity_id", "user"]);
        }
        let address = match Self::address(request) {
            Ok(address) => address,
            Err(e) => return Self::failure(&e),
        };
        match self
            .repository
            .create(
                &address,
                &request.payload,
                request.user.as_deref().unwrap_or(""),
                request.comment.as_deref(),
            )
            .await
        {
            Ok(record) => Self::success(201, &record),
            Err(e) => Self::failure(&e),
        }
    }

    async fn handle_update(&self, request: &RequestEnvelope) -> Response {
        if request.entity_type.is_none()
            || request.project_id.is_none()
            || request.entity_id.is_none()
            || request.user.is_none()
        {
            return Self::missing(&["entity_type", "project_id", "entity_id", "user"]);
        }
        let address = match Self::address(request) {
            Ok(address) => address,
            Err(e) => return Self::failure(&e),
        };
        match self
            .repository
            .update(
                &address,
                &request.payload,
                request.user.as_deref().unwrap_or(""),
                request.comment.as_deref(),
            )
            .await
        {
            Ok(record) => Self::success(200, &record),
            Err(e) => Self::failure(&e),
        }
    }

    async fn handle_get(&self, request: &RequestEnvelope) -> Response {
        if request.entity_type.is_none()
            || request.project_id.is_none()
            || request.entity_id.is_none()
        {
            return Self::missing(&["entity_type", "project_id", "entity_id"]);
        }
        let address = match Self::address(request) {
            Ok(address) => address,
            Err(e) => return Self::failure(&e),
        };
        match self.repository.get_latest(&address).await {
            Ok(Some(record)) => Self::success(200, &record),
            Ok(None) => Response::new(404, &json!({ "error": "Entity not found" })),
            Err(e) => Self::failure(&e),
        }
    }

    async fn handle_approve(&self, request: &RequestEnvelope) -> Response {
        if request.entity_type.is_none()
            || request.project_id.is_none()
            || request.entity_id.is_none()
            || request.approver.is_none()
        {
            return Self::missing(&["entity_type", "project_id", "entity_id", "approver"]);
        }
        let address = match Self::address(request) {
            Ok(address) => address,
            Err(e) => return Self::failure(&e),
        };
        match self
            .repository
            .approve(
                &address,
                request.approver.as_deref().unwrap_or(""),
                request.comment.as_deref(),
            )
            .await
        {
            Ok(record) => Self::success(200, &record),
            Err(e) => Self::failure(&e),
        }
    }

    async fn handle_reject(&self, request: &RequestEnvelope) -> Response {
        if request.entity_type.is_none()
            || request.project_id.is_none()
            || request.entity_id.is_none()
            || request.rejector.is_none()
        {
            return Self::missing(&["entity_type", "project_id", "entity_id", "rejector"]);
        }
        let address = match Self::address(request) {
            Ok(address) => address,
            Err(e) => return Self::failure(&e),
        };
        match self
            .repository
            .reject(
                &address,
                request.rejector.as_deref().unwrap_or(""),
                request.comment.as_deref(),
            )
            .await
        {
            Ok(record) => Self::success(200, &record),
            Err(e) => Self::failure(&e),
        }
    }

    async fn handle_list(&self, request: &RequestEnvelope) -> Response {
        if request.entity_type.is_none() || request.project_id.is_none() {
            return Self::missing(&["entity_type", "project_id"]);
        }
        let entity_type = match EntityType::parse(request.entity_type.as_deref().unwrap_or("")) {
            Ok(entity_type) => entity_type,
            Err(e) => return Self::failure(&e.into()),
        };
        let status = match request.status.as_deref() {
            None => None,
            Some(raw) => match RecordStatus::parse(raw) {
                Some(status) => Some(status),
                None => {
                    return Response::new(
                        400,
                        &json!({ "error": format!("Unknown status filter: {raw}") }),
                    )
                }
            },
        };

        match self
            .repository
            .list_by_project(
                entity_type,
                request.project_id.as_deref().unwrap_or(""),
                status,
            )
            .await
        {
            Ok(records) => {
                let count = records.len();
                Response::new(
                    200,
                    &json!({ "success": true, "data": records, "count": count }),
                )
            }
            Err(e) => Self::failure(&e),
        }
    }

    async fn handle_get_version(&self, request: &RequestEnvelope) -> Response {
        if request.entity_type.is_none()
            || request.project_id.is_none()
            || request.entity_id.is_none()
            || request.version.is_none()
        {
            return Self::missing(&["entity_type", "project_id", "entity_id", "version"]);
        }
        let Some(version) = request
            .version
            .as_deref()
            .and_then(|v| v.trim().parse::<u32>().ok())
        else {
            return Response::new(400, &json!({ "error": "version must be a positive integer" }));
        };
        let address = match Self::address(request) {
            Ok(address) => address,
            Err(e) => return Self::failure(&e),
        };
        match self.repository.get_version(&address, version).await {
            Ok(Some(record)) => Self::success(200, &record),
            Ok(None) => Response::new(404, &json!({ "error": "Version not found" })),
            Err(e) => Self::failure(&e),
        }
    }

    async fn handle_get_history(&self, request: &RequestEnvelope) -> Response {
        if request.entity_type.is_none()
            || request.project_id.is_none()
            || request.entity_id.is_none()
        {
            return Self::missing(&["entity_type", "project_id", "entity_id"]);
        }
        let address = match Self::address(request) {
            Ok(address) => address,
            Err(e) => return Self::failure(&e),
        };
        match self.repository.get_history(&address).await {
            Ok(Some(history)) => {
                let count = history.len();
                Response::new(
                    200,
                    &json!({ "success": true, "data": history, "count": count }),
                )
            }
            Ok(None) => Response::new(404, &json!({ "error": "Entity not found" })),
            Err(e) => Self::failure(&e),
        }
    }

    /// Writes a small stratum-save marker document (and optionally the raw
    /// layers) at caller-supplied keys. Comes in as a direct invocation from
    /// the upload workflow.
    async fn handle_save_stratum(&self, request: &RequestEnvelope) -> Response {
        let (Some(borelog_id), Some(version_no), Some(metadata_key)) = (
            request.borelog_id.as_deref(),
            request.version_no.as_ref(),
            request.stratum_metadata_key.as_deref(),
        ) else {
            return Response::new(
                400,
                &json!({
                    "error": "Missing required fields for save_stratum",
                    "required": ["borelog_id", "version_no", "stratum_metadata_key"],
                }),
            );
        };

        let marker = json!({
            "borelog_id": borelog_id,
            "version_no": version_no,
            "layers_count": request.layers.len(),
            "saved_by": request.user_id,
            "saved_at": now_iso(),
        });

        let result: Result<(), VaultError> = async {
            self.store
                .put(
                    metadata_key,
                    Bytes::from(serde_json::to_vec(&marker)?),
                    CONTENT_TYPE_JSON,
                    true,
                )
                .await
                .map_err(InfrastructureError::from)?;

            if let Some(data_key) = request.stratum_data_key.as_deref() {
                if !request.layers.is_empty() {
                    let layers_key = data_key.replace(".parquet", ".json");
                    let body = serde_json::to_vec(&json!({ "layers": request.layers }))?;
                    self.store
                        .put(&layers_key, Bytes::from(body), CONTENT_TYPE_JSON, true)
                        .await
                        .map_err(InfrastructureError::from)?;
                }
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => Response::new(200, &json!({ "success": true, "message": "Stratum saved" })),
            Err(e) => Self::failure(&e),
        }
    }
}

// =============================================================================
//  3. TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::infrastructure::object_store::MemoryStore;

    fn dispatcher() -> (Arc<MemoryStore>, Dispatcher) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), Dispatcher::new(store, "parquet-data"))
    }

    fn create_event(entity_id: &str) -> Json {
        json!({
            "action": "create",
            "entity_type": "borelog",
            "project_id": "p1",
            "entity_id": entity_id,
            "payload": { "borelog_id": entity_id, "borehole_no": "BH-01" },
            "user": "u1",
        })
    }

    #[tokio::test]
    async fn test_missing_action_is_400() {
        let (_store, dispatcher) = dispatcher();
        let response = dispatcher.handle(&json!({})).await;
        assert_eq!(response.status_code, 400);
        let body = response.body_json();
        assert_eq!(body["error"], "Missing action field");
        assert!(body["supported_actions"].as_array().unwrap().len() >= 9);
    }

    #[tokio::test]
    async fn test_unknown_action_is_400() {
        let (_store, dispatcher) = dispatcher();
        let response = dispatcher.handle(&json!({ "action": "destroy" })).await;
        assert_eq!(response.status_code, 400);
        assert!(response.body.contains("Unknown action: destroy"));
    }

    #[tokio::test]
    async fn test_create_get_flow() {
        let (_store, dispatcher) = dispatcher();

        let created = dispatcher.handle(&create_event("bh-1")).await;
        assert_eq!(created.status_code, 201);
        let body = created.body_json();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["data"]["borehole_no"], "BH-01");
        assert_eq!(created.headers["Content-Type"], "application/json");
        assert_eq!(created.headers["Access-Control-Allow-Origin"], "*");

        let fetched = dispatcher
            .handle(&json!({
                "action": "get",
                "entity_type": "borelog",
                "project_id": "p1",
                "entity_id": "bh-1",
            }))
            .await;
        assert_eq!(fetched.status_code, 200);

        let missing = dispatcher
            .handle(&json!({
                "action": "get",
                "entity_type": "borelog",
                "project_id": "p1",
                "entity_id": "ghost",
            }))
            .await;
        assert_eq!(missing.status_code, 404);
    }

    #[tokio::test]
    async fn test_create_conflict_maps_to_409() {
        let (_store, dispatcher) = dispatcher();
        dispatcher.handle(&create_event("bh-1")).await;
        let duplicate = dispatcher.handle(&create_event("bh-1")).await;
        assert_eq!(duplicate.status_code, 409);
    }

    #[tokio::test]
    async fn test_missing_required_fields_listed() {
        let (_store, dispatcher) = dispatcher();
        let response = dispatcher
            .handle(&json!({ "action": "create", "entity_type": "borelog" }))
            .await;
        assert_eq!(response.status_code, 400);
        let body = response.body_json();
        assert_eq!(body["error"], "Missing required fields");
        assert_eq!(body["required"][3], "user");
    }

    #[tokio::test]
    async fn test_approve_illegal_transition_is_400() {
        let (_store, dispatcher) = dispatcher();
        dispatcher.handle(&create_event("bh-1")).await;

        let approve = json!({
            "action": "approve",
            "entity_type": "borelog",
            "project_id": "p1",
            "entity_id": "bh-1",
            "approver": "boss",
        });
        assert_eq!(dispatcher.handle(&approve).await.status_code, 200);
        assert_eq!(dispatcher.handle(&approve).await.status_code, 400);
    }

    #[tokio::test]
    async fn test_list_with_count() {
        let (_store, dispatcher) = dispatcher();
        dispatcher.handle(&create_event("a")).await;
        dispatcher.handle(&create_event("b")).await;

        let listed = dispatcher
            .handle(&json!({
                "action": "list",
                "entity_type": "borelog",
                "project_id": "p1",
            }))
            .await;
        assert_eq!(listed.status_code, 200);
        let body = listed.body_json();
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"].as_array().unwrap().len(), 2);

        let filtered = dispatcher
            .handle(&json!({
                "action": "list",
                "entity_type": "borelog",
                "project_id": "p1",
                "status": "bogus",
            }))
            .await;
        assert_eq!(filtered.status_code, 400);
    }

    #[tokio::test]
    async fn test_get_version_and_history() {
        let (_store, dispatcher) = dispatcher();
        dispatcher.handle(&create_event("bh-1")).await;

        let version = dispatcher
            .handle(&json!({
                "action": "get_version",
                "entity_type": "borelog",
                "project_id": "p1",
                "entity_id": "bh-1",
                "version": 1,
            }))
            .await;
        assert_eq!(version.status_code, 200);
        assert_eq!(version.body_json()["data"]["version"], 1);

        let absent = dispatcher
            .handle(&json!({
                "action": "get_version",
                "entity_type": "borelog",
                "project_id": "p1",
                "entity_id": "bh-1",
                "version": "7",
            }))
            .await;
        assert_eq!(absent.status_code, 404);

        let history = dispatcher
            .handle(&json!({
                "action": "get_history",
                "entity_type": "borelog",
                "project_id": "p1",
                "entity_id": "bh-1",
            }))
            .await;
        assert_eq!(history.status_code, 200);
        assert_eq!(history.body_json()["count"], 1);
    }

    #[tokio::test]
    async fn test_gateway_event_shape() {
        let (_store, dispatcher) = dispatcher();
        let event = json!({
            "httpMethod": "POST",
            "body": serde_json::to_string(&create_event("bh-9")).unwrap(),
            "queryStringParameters": { "status": "draft" },
        });
        let response = dispatcher.handle(&event).await;
        assert_eq!(response.status_code, 201);
    }

    #[tokio::test]
    async fn test_save_stratum_writes_marker_and_layers() {
        let (store, dispatcher) = dispatcher();
        let event = json!({
            "action": "save_stratum",
            "borelog_id": "b1",
            "version_no": 2,
            "user_id": "u1",
            "layers": [ { "description": "sand" } ],
            "stratum_metadata_key": "projects/p1/borelogs/b1/stratum/metadata.json",
            "stratum_data_key": "projects/p1/borelogs/b1/stratum/data.parquet",
        });
        let response = dispatcher.handle(&event).await;
        assert_eq!(response.status_code, 200);

        let marker: Json = serde_json::from_slice(
            &store
                .get("projects/p1/borelogs/b1/stratum/metadata.json")
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(marker["layers_count"], 1);
        assert_eq!(marker["saved_by"], "u1");

        let layers: Json = serde_json::from_slice(
            &store
                .get("projects/p1/borelogs/b1/stratum/data.json")
                .await
                .unwrap(),
        )
        .unwrap();
        assert_eq!(layers["layers"][0]["description"], "sand");
    }

    #[tokio::test]
    async fn test_save_stratum_requires_keys() {
        let (_store, dispatcher) = dispatcher();
        let response = dispatcher
            .handle(&json!({ "action": "save_stratum", "borelog_id": "b1" }))
            .await;
        assert_eq!(response.status_code, 400);
    }

    #[test]
    fn test_envelope_field_aliases() {
        let envelope = RequestEnvelope::from_event(&json!({
            "action": "approve",
            "approved_by": "boss",
            "updated_by": "editor",
        }));
        assert_eq!(envelope.approver.as_deref(), Some("boss"));
        assert_eq!(envelope.user.as_deref(), Some("editor"));
    }
}
