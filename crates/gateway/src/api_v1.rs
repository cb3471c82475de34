//! HTTP API v1 — JSON surface over the schema, ingestion and context contracts.
//!
//! Endpoints:
//!
//! - `GET  /v1/fields`                  — List fields (`?include_inactive=true`)
//! - `POST /v1/fields`                  — Define a field
//! - `PATCH /v1/fields/{name}`          — Update a field
//! - `DELETE /v1/fields/{name}`         — Deactivate a field
//! - `POST /v1/fields/reorder`          — Set display orders
//! - `POST /v1/fields/{name}/aliases`   — Add a header alias
//! - `POST /v1/fields/{name}/validate`  — Validate one value
//! - `GET  /v1/fields/types`            — Supported types and their rules
//! - `GET  /v1/schema/form`             — Form rendering schema
//! - `POST /v1/ingest/propose`          — Propose header mappings for CSV text
//! - `POST /v1/ingest/commit`           — Commit CSV text under a confirmed mapping
//! - `GET  /v1/records`                 — List records
//! - `GET/PUT/DELETE /v1/records/{key}` — Read, merge-write, delete
//! - `POST /v1/records/{key}/status`    — Set outreach status
//! - `POST /v1/records/{key}/revalidate`— Re-check against the current schema
//! - `GET/POST /v1/notes`               — List or search notes; create
//! - `GET/PATCH/DELETE /v1/notes/{id}`  — Read, update, delete
//! - `GET  /v1/notes/categories`        — Tag usage
//! - `GET  /v1/notes/export`            — Every note
//! - `POST /v1/context`                 — Construct and hand off
//! - `POST /v1/context/preview`         — Construct without hand-off
//! - `GET  /v1/handoff/{key}`           — Latest hand-off for a record
//! - `GET  /v1/status`                  — Counts, schema version, cache stats

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use outreach_context::CacheStats;
use outreach_core::context::ConstructedContext;
use outreach_core::field::{FieldDefinition, FieldPatch, FieldSpec};
use outreach_core::note::{ContextNote, NoteClass, NoteFilter, NotePatch, NoteSpec};
use outreach_core::record::{Record, RecordFilter, RecordStatus};
use outreach_core::value::TypedValue;
use outreach_ingest::{CommitReport, ConfirmedMapping, MappingReport};
use outreach_schema::{FieldTypeInfo, FormSchema};
use outreach_service::{ContextRequest, FieldUpdate, OutreachService, RecordWrite, Revalidation};

use crate::error::ApiError;

// ── State ─────────────────────────────────────────────────────────────────

/// Shared state for the v1 API.
pub struct ApiV1State {
    pub service: Arc<OutreachService>,
    pub start_time: chrono::DateTime<chrono::Utc>,
}

impl ApiV1State {
    pub fn new(service: Arc<OutreachService>) -> Self {
        Self {
            service,
            start_time: chrono::Utc::now(),
        }
    }
}

pub type SharedApiState = Arc<ApiV1State>;

type ApiResult<T> = Result<T, ApiError>;

// ── Router ────────────────────────────────────────────────────────────────

/// Build the v1 API router. Nest this under "/v1" in the main router.
pub fn v1_router(state: SharedApiState) -> Router {
    Router::new()
        .route("/fields", get(list_fields_handler).post(define_field_handler))
        .route("/fields/types", get(field_types_handler))
        .route("/fields/reorder", post(reorder_fields_handler))
        .route(
            "/fields/{name}",
            axum::routing::patch(update_field_handler).delete(deactivate_field_handler),
        )
        .route("/fields/{name}/aliases", post(add_alias_handler))
        .route("/fields/{name}/validate", post(validate_value_handler))
        .route("/schema/form", get(form_schema_handler))
        .route("/ingest/propose", post(propose_handler))
        .route("/ingest/commit", post(commit_handler))
        .route("/records", get(list_records_handler))
        .route(
            "/records/{key}",
            get(get_record_handler)
                .put(put_record_handler)
                .delete(delete_record_handler),
        )
        .route("/records/{key}/status", post(set_status_handler))
        .route("/records/{key}/revalidate", post(revalidate_handler))
        .route("/notes", get(list_notes_handler).post(create_note_handler))
        .route("/notes/categories", get(note_categories_handler))
        .route("/notes/export", get(export_notes_handler))
        .route(
            "/notes/{id}",
            get(get_note_handler)
                .patch(update_note_handler)
                .delete(delete_note_handler),
        )
        .route("/context", post(construct_handler))
        .route("/context/preview", post(preview_handler))
        .route("/handoff/{key}", get(handoff_handler))
        .route("/status", get(status_handler))
        .with_state(state)
}

// ── Request / Response types ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ListFieldsQuery {
    #[serde(default)]
    include_inactive: bool,
}

#[derive(Serialize, Deserialize)]
pub struct FieldListResponse {
    pub fields: Vec<FieldDefinition>,
    pub count: usize,
    pub schema_version: u64,
}

#[derive(Deserialize)]
struct ReorderEntry {
    name: String,
    display_order: i32,
}

#[derive(Deserialize)]
struct ReorderRequest {
    orders: Vec<ReorderEntry>,
}

#[derive(Deserialize)]
struct AliasRequest {
    alias: String,
}

#[derive(Deserialize)]
struct ValidateRequest {
    value: Value,
}

#[derive(Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
    /// Typed form of the value; absent for empty input.
    pub value: Option<TypedValue>,
}

#[derive(Deserialize)]
struct ProposeRequest {
    csv: String,
    #[serde(default)]
    key_header: Option<String>,
}

#[derive(Deserialize)]
struct CommitRequest {
    csv: String,
    mapping: ConfirmedMapping,
}

#[derive(Serialize, Deserialize)]
pub struct RecordListResponse {
    pub records: Vec<Record>,
    pub count: usize,
}

#[derive(Deserialize)]
struct PutRecordRequest {
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    priority: Option<i32>,
}

#[derive(Deserialize)]
struct StatusRequest {
    status: RecordStatus,
}

#[derive(Deserialize)]
struct NoteQuery {
    #[serde(default)]
    active_only: bool,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    class: Option<NoteClass>,
    /// Free-text search over active notes, most important first.
    #[serde(default)]
    q: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

#[derive(Serialize, Deserialize)]
pub struct NoteListResponse {
    pub notes: Vec<ContextNote>,
    pub count: usize,
}

#[derive(Serialize, Deserialize)]
pub struct ConstructionResponse {
    /// Served from cache (or from a concurrent identical construction).
    pub cached: bool,
    pub context: ConstructedContext,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub version: String,
    pub uptime_secs: i64,
    pub schema_version: u64,
    pub active_fields: usize,
    pub records: usize,
    pub notes: usize,
    pub cache: CacheStats,
}

// ── Schema ────────────────────────────────────────────────────────────────

async fn list_fields_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<ListFieldsQuery>,
) -> Json<FieldListResponse> {
    let fields = state.service.list_fields(query.include_inactive).await;
    let schema_version = state.service.schema_snapshot().await.version;
    Json(FieldListResponse {
        count: fields.len(),
        fields,
        schema_version,
    })
}

async fn define_field_handler(
    State(state): State<SharedApiState>,
    Json(spec): Json<FieldSpec>,
) -> ApiResult<(StatusCode, Json<FieldDefinition>)> {
    let def = state.service.define_field(spec).await?;
    Ok((StatusCode::CREATED, Json(def)))
}

async fn update_field_handler(
    State(state): State<SharedApiState>,
    Path(name): Path<String>,
    Json(patch): Json<FieldPatch>,
) -> ApiResult<Json<FieldUpdate>> {
    Ok(Json(state.service.update_field(&name, patch).await?))
}

async fn deactivate_field_handler(
    State(state): State<SharedApiState>,
    Path(name): Path<String>,
) -> ApiResult<Json<FieldDefinition>> {
    Ok(Json(state.service.deactivate_field(&name).await?))
}

async fn reorder_fields_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<ReorderRequest>,
) -> ApiResult<Json<Vec<FieldDefinition>>> {
    let orders: Vec<(String, i32)> = req
        .orders
        .into_iter()
        .map(|e| (e.name, e.display_order))
        .collect();
    Ok(Json(state.service.reorder_fields(&orders).await?))
}

async fn add_alias_handler(
    State(state): State<SharedApiState>,
    Path(name): Path<String>,
    Json(req): Json<AliasRequest>,
) -> ApiResult<Json<FieldDefinition>> {
    Ok(Json(state.service.add_field_alias(&name, &req.alias).await?))
}

async fn validate_value_handler(
    State(state): State<SharedApiState>,
    Path(name): Path<String>,
    Json(req): Json<ValidateRequest>,
) -> ApiResult<Json<ValidateResponse>> {
    let value = state.service.validate_field_value(&name, &req.value).await?;
    Ok(Json(ValidateResponse { valid: true, value }))
}

async fn field_types_handler(State(state): State<SharedApiState>) -> Json<Vec<FieldTypeInfo>> {
    Json(state.service.field_types())
}

async fn form_schema_handler(State(state): State<SharedApiState>) -> Json<FormSchema> {
    Json(state.service.form_schema().await)
}

// ── Ingestion ─────────────────────────────────────────────────────────────

async fn propose_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<ProposeRequest>,
) -> ApiResult<Json<MappingReport>> {
    let table = state.service.parse_csv(&req.csv)?;
    let report = state
        .service
        .propose_mapping(&table, req.key_header.as_deref())
        .await?;
    Ok(Json(report))
}

async fn commit_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<CommitRequest>,
) -> ApiResult<Json<CommitReport>> {
    let table = state.service.parse_csv(&req.csv)?;
    Ok(Json(state.service.commit_mapping(&table, &req.mapping).await?))
}

// ── Records ───────────────────────────────────────────────────────────────

async fn list_records_handler(
    State(state): State<SharedApiState>,
    Query(filter): Query<RecordFilter>,
) -> ApiResult<Json<RecordListResponse>> {
    let records = state.service.list_records(&filter).await?;
    Ok(Json(RecordListResponse {
        count: records.len(),
        records,
    }))
}

async fn get_record_handler(
    State(state): State<SharedApiState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Record>> {
    Ok(Json(state.service.get_record(&key).await?))
}

async fn put_record_handler(
    State(state): State<SharedApiState>,
    Path(key): Path<String>,
    Json(req): Json<PutRecordRequest>,
) -> ApiResult<(StatusCode, Json<RecordWrite>)> {
    let outcome = state
        .service
        .put_record(&key, req.attributes, req.priority)
        .await?;
    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(outcome)))
}

async fn delete_record_handler(
    State(state): State<SharedApiState>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_record(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_status_handler(
    State(state): State<SharedApiState>,
    Path(key): Path<String>,
    Json(req): Json<StatusRequest>,
) -> ApiResult<Json<Record>> {
    Ok(Json(state.service.set_record_status(&key, req.status).await?))
}

async fn revalidate_handler(
    State(state): State<SharedApiState>,
    Path(key): Path<String>,
) -> ApiResult<Json<Revalidation>> {
    Ok(Json(state.service.revalidate_record(&key).await?))
}

// ── Notes ─────────────────────────────────────────────────────────────────

async fn list_notes_handler(
    State(state): State<SharedApiState>,
    Query(query): Query<NoteQuery>,
) -> ApiResult<Json<NoteListResponse>> {
    let notes = match query.q.as_deref() {
        Some(q) => state.service.search_notes(q, query.limit).await?,
        None => {
            let filter = NoteFilter {
                active_only: query.active_only,
                tag: query.tag,
                class: query.class,
            };
            let mut notes = state.service.list_notes(&filter).await?;
            if let Some(limit) = query.limit {
                notes.truncate(limit);
            }
            notes
        }
    };
    Ok(Json(NoteListResponse {
        count: notes.len(),
        notes,
    }))
}

async fn create_note_handler(
    State(state): State<SharedApiState>,
    Json(spec): Json<NoteSpec>,
) -> ApiResult<(StatusCode, Json<ContextNote>)> {
    let note = state.service.create_note(spec).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

async fn get_note_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ContextNote>> {
    Ok(Json(state.service.get_note(&id).await?))
}

async fn update_note_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
    Json(patch): Json<NotePatch>,
) -> ApiResult<Json<ContextNote>> {
    Ok(Json(state.service.update_note(&id, patch).await?))
}

async fn delete_note_handler(
    State(state): State<SharedApiState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.service.delete_note(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn note_categories_handler(
    State(state): State<SharedApiState>,
) -> ApiResult<Json<BTreeMap<String, usize>>> {
    Ok(Json(state.service.note_categories().await?))
}

async fn export_notes_handler(State(state): State<SharedApiState>) -> ApiResult<Json<Vec<ContextNote>>> {
    Ok(Json(state.service.export_notes().await?))
}

// ── Context ───────────────────────────────────────────────────────────────

async fn construct_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<ContextRequest>,
) -> ApiResult<Json<ConstructionResponse>> {
    let built = state.service.construct_context(&req).await?;
    Ok(Json(ConstructionResponse {
        cached: built.cached,
        context: (*built.context).clone(),
    }))
}

async fn preview_handler(
    State(state): State<SharedApiState>,
    Json(req): Json<ContextRequest>,
) -> ApiResult<Json<ConstructionResponse>> {
    let built = state.service.preview_context(&req).await?;
    Ok(Json(ConstructionResponse {
        cached: built.cached,
        context: (*built.context).clone(),
    }))
}

async fn handoff_handler(
    State(state): State<SharedApiState>,
    Path(key): Path<String>,
) -> ApiResult<Json<ConstructedContext>> {
    let context = state.service.handoff(&key).await?;
    Ok(Json((*context).clone()))
}

async fn status_handler(State(state): State<SharedApiState>) -> ApiResult<Json<StatusResponse>> {
    let snapshot = state.service.schema_snapshot().await;
    Ok(Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: (chrono::Utc::now() - state.start_time).num_seconds(),
        schema_version: snapshot.version,
        active_fields: snapshot.fields.len(),
        records: state.service.count_records().await?,
        notes: state.service.export_notes().await?.len(),
        cache: state.service.context_cache_stats().await,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorBody;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use outreach_config::AppConfig;
    use serde_json::json;
    use tower::ServiceExt;

    fn test_api_state() -> SharedApiState {
        Arc::new(ApiV1State::new(Arc::new(OutreachService::new(AppConfig::default()))))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        request("POST", uri, body)
    }

    fn request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    async fn seeded() -> SharedApiState {
        let state = test_api_state();
        let app = v1_router(state.clone());
        for spec in [
            json!({"name": "student_name", "type": "text", "required": true}),
            json!({"name": "scholarship_amount", "type": "currency"}),
        ] {
            let response = app.clone().oneshot(post_json("/fields", spec)).await.unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        state
    }

    #[tokio::test]
    async fn define_and_list_fields() {
        let state = seeded().await;
        let app = v1_router(state);

        let response = app.oneshot(get("/fields")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let list: FieldListResponse = json_body(response).await;
        assert_eq!(list.count, 2);
        assert_eq!(list.schema_version, 2);
        assert_eq!(list.fields[0].name, "student_name");
    }

    #[tokio::test]
    async fn duplicate_field_is_conflict() {
        let state = seeded().await;
        let app = v1_router(state);
        let response = app
            .oneshot(post_json("/fields", json!({"name": "Student Name", "type": "text"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "conflict_error");
    }

    #[tokio::test]
    async fn validate_reports_rule() {
        let state = seeded().await;
        let app = v1_router(state);

        let ok = app
            .clone()
            .oneshot(post_json("/fields/scholarship_amount/validate", json!({"value": "50,000"})))
            .await
            .unwrap();
        assert_eq!(ok.status(), StatusCode::OK);
        let body: ValidateResponse = json_body(ok).await;
        assert!(body.valid);

        let bad = app
            .oneshot(post_json("/fields/scholarship_amount/validate", json!({"value": "lots"})))
            .await
            .unwrap();
        assert_eq!(bad.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: ErrorBody = json_body(bad).await;
        assert_eq!(body.error, "validation_error");
        assert_eq!(body.report.unwrap().issues.len(), 1);
    }

    #[tokio::test]
    async fn propose_then_commit() {
        let state = seeded().await;
        let app = v1_router(state.clone());
        let csv = "Name,Phone,Award\nRahul Sharma,9876543210,50000\n";

        let response = app
            .clone()
            .oneshot(post_json("/ingest/propose", json!({"csv": csv})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let proposal: MappingReport = json_body(response).await;
        assert_eq!(proposal.key_header.as_deref(), Some("Phone"));
        assert_eq!(state.service.count_records().await.unwrap(), 0);

        let mapping = ConfirmedMapping::from_proposals(&proposal).unwrap();
        let response = app
            .clone()
            .oneshot(post_json("/ingest/commit", json!({"csv": csv, "mapping": mapping})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report: CommitReport = json_body(response).await;
        assert_eq!(report.totals.accepted, 1);

        let response = app.oneshot(get("/records/9876543210")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn put_record_rejects_invalid_value() {
        let state = seeded().await;
        let app = v1_router(state);
        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                "/records/1",
                json!({"attributes": {"student_name": "Priya", "scholarship_amount": "lots"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let response = app.oneshot(get("/records/1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: ErrorBody = json_body(response).await;
        assert_eq!(body.error, "not_found");
    }

    #[tokio::test]
    async fn put_record_lists_unschematized_names() {
        let state = seeded().await;
        let app = v1_router(state);
        let response = app
            .oneshot(request(
                "PUT",
                "/records/1",
                json!({"attributes": {"student_name": "Priya", "city": "Pune"}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = json_body(response).await;
        assert_eq!(body["created"], json!(true));
        assert_eq!(body["unschematized"], json!(["city"]));
    }

    #[tokio::test]
    async fn construct_and_fetch_handoff() {
        let state = seeded().await;
        let app = v1_router(state);

        let response = app
            .clone()
            .oneshot(request(
                "PUT",
                "/records/9876543210",
                json!({"attributes": {"student_name": "Priya", "scholarship_amount": 50000}}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .clone()
            .oneshot(post_json(
                "/notes",
                json!({
                    "id": "greet",
                    "title": "Greeting",
                    "body": "Congratulations {{student_name}}! Your award is {{scholarship_amount}}.",
                    "tags": ["welcome"],
                    "class": "primary"
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let req = json!({
            "record_key": "9876543210",
            "selection": {"entries": [{"note_id": "greet"}]}
        });
        let response = app.clone().oneshot(post_json("/context", req)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let built: ConstructionResponse = json_body(response).await;
        assert_eq!(built.context.text, "Congratulations Priya! Your award is ₹50,000.");

        let response = app.clone().oneshot(get("/handoff/9876543210")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let handed: ConstructedContext = json_body(response).await;
        assert_eq!(handed.context_hash, built.context.context_hash);

        let response = app.oneshot(get("/handoff/0000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn note_search_via_query() {
        let state = test_api_state();
        let app = v1_router(state);
        for (id, priority) in [("a", 1), ("b", 9)] {
            let response = app
                .clone()
                .oneshot(post_json(
                    "/notes",
                    json!({"id": id, "title": "Hostel", "body": "Hostel rooms.", "tags": ["hostel"], "priority": priority}),
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app.oneshot(get("/notes?q=hostel&limit=1")).await.unwrap();
        let list: NoteListResponse = json_body(response).await;
        assert_eq!(list.count, 1);
        assert_eq!(list.notes[0].id, "b");
    }

    #[tokio::test]
    async fn status_reports_counts() {
        let state = seeded().await;
        let app = v1_router(state);
        let response = app.oneshot(get("/status")).await.unwrap();
        let status: Value = json_body(response).await;
        assert_eq!(status["schema_version"], 2);
        assert_eq!(status["active_fields"], 2);
        assert_eq!(status["records"], 0);
        assert_eq!(status["cache"]["entries"], 0);
    }
}
