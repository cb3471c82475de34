//! End-to-end tests for the Outreach pipeline.
//!
//! These exercise the path an operator takes: define fields, propose and
//! commit a CSV mapping, write notes, construct a context and pick it up
//! from the hand-off. The last section drives the same flow over HTTP.

use std::collections::BTreeMap;
use std::sync::Arc;

use outreach_config::AppConfig;
use outreach_core::context::{LengthBudget, NoteFate};
use outreach_core::error::Error;
use outreach_core::field::{FieldPatch, FieldSpec, FieldType, ValidationRules};
use outreach_core::note::{ContextSelection, NoteClass, NoteSpec};
use outreach_core::record::RecordFilter;
use outreach_ingest::{ConfirmedMapping, HeaderStatus};
use outreach_service::{ContextRequest, OutreachService, WorkspaceSeed};

// ── Fixtures ────────────────────────────────────────────────────────────

const SEED: &str = r#"
[[fields]]
name = "student_name"
type = "text"
required = true

[[fields]]
name = "scholarship_amount"
type = "currency"

[[fields]]
name = "hostel_fee"
type = "currency"

[[notes]]
id = "greet"
title = "Greeting"
body = "Congratulations {{student_name}}! Your award is {{scholarship_amount}}."
tags = ["welcome"]
class = "primary"
priority = 5

[[notes]]
id = "hostel"
title = "Hostel"
body = "Hostel fees are {{hostel_fee}} per year."
tags = ["hostel"]
class = "secondary"
priority = 1

[[notes]]
id = "docs"
title = "Documents"
body = "Please keep your admission letter and identity proof ready for verification."
tags = ["documents"]
class = "secondary"
priority = 2
"#;

const CSV: &str = "\
Name,Phone,Award
Priya,9876543210,50000
Rahul Sharma,9123456780,75000
Anita,9000000001,lots
Vikram,9000000002,20000
";

async fn workspace() -> OutreachService {
    let service = OutreachService::new(AppConfig::default());
    service
        .apply_seed(WorkspaceSeed::from_toml_str(SEED).unwrap())
        .await
        .unwrap();
    service
}

async fn imported() -> OutreachService {
    let service = workspace().await;
    let table = service.parse_csv(CSV).unwrap();
    let proposal = service.propose_mapping(&table, None).await.unwrap();
    let mapping = ConfirmedMapping::from_proposals(&proposal).unwrap();
    service.commit_mapping(&table, &mapping).await.unwrap();
    service
}

fn priya(notes: &[&str]) -> ContextRequest {
    ContextRequest::new("9876543210", ContextSelection::from_ids(notes.iter().copied()))
}

// ── Ingestion ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_proposal_maps_headers_and_writes_nothing() {
    let service = workspace().await;
    let version = service.schema_snapshot().await.version;
    let table = service.parse_csv(CSV).unwrap();

    let report = service.propose_mapping(&table, None).await.unwrap();

    assert_eq!(report.key_header.as_deref(), Some("Phone"));
    assert_eq!(report.row_count, 4);
    assert_eq!(report.header("Name").unwrap().proposed_field(), Some("student_name"));
    assert_eq!(
        report.header("Award").unwrap().proposed_field(),
        Some("scholarship_amount")
    );
    assert!(matches!(
        report.header("Phone").unwrap().status,
        HeaderStatus::Unmapped { .. }
    ));

    assert_eq!(service.count_records().await.unwrap(), 0);
    assert_eq!(service.schema_snapshot().await.version, version);
}

#[tokio::test]
async fn e2e_partial_commit_quarantines_bad_rows_only() {
    let service = workspace().await;
    let table = service.parse_csv(CSV).unwrap();
    let proposal = service.propose_mapping(&table, None).await.unwrap();
    let mapping = ConfirmedMapping::from_proposals(&proposal).unwrap();

    let report = service.commit_mapping(&table, &mapping).await.unwrap();

    assert_eq!(report.totals.rows, 4);
    assert_eq!(report.totals.accepted, 3);
    assert_eq!(report.totals.quarantined, 1);
    assert_eq!(report.quarantined[0].row, 3);
    assert_eq!(report.quarantined[0].key.as_deref(), Some("9000000001"));
    assert!(!report.quarantined[0].issues.is_empty());

    let keys: Vec<String> = service
        .list_records(&RecordFilter::default())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(keys.len(), 3);
    assert!(!keys.contains(&"9000000001".to_string()));
}

#[tokio::test]
async fn e2e_recommit_updates_existing_records() {
    let service = imported().await;
    let table = service.parse_csv("Phone,Award\n9876543210,60000\n").unwrap();
    let mapping = ConfirmedMapping::new("Phone").map_field("Award", "scholarship_amount");

    let report = service.commit_mapping(&table, &mapping).await.unwrap();
    assert_eq!(report.totals.updated, 1);
    assert_eq!(report.totals.created, 0);

    let built = service.preview_context(&priya(&["greet"])).await.unwrap();
    assert_eq!(
        built.context.text,
        "Congratulations Priya! Your award is ₹60,000."
    );
}

// ── Context construction ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_missing_value_omits_note() {
    let service = imported().await;

    let built = service
        .construct_context(&priya(&["greet", "hostel"]))
        .await
        .unwrap();

    assert_eq!(
        built.context.text,
        "Congratulations Priya! Your award is ₹50,000."
    );
    assert!(!built.context.text.contains("{{"));
    let hostel = built
        .context
        .provenance
        .notes
        .iter()
        .find(|n| n.note_id == "hostel")
        .unwrap();
    assert_eq!(
        hostel.fate,
        NoteFate::OmittedMissingFields {
            fields: vec!["hostel_fee".into()]
        }
    );

    let handed = service.handoff("9876543210").await.unwrap();
    assert_eq!(handed.text, built.context.text);
}

#[tokio::test]
async fn e2e_construction_is_deterministic() {
    let service = imported().await;
    let request = priya(&["docs", "greet", "hostel"]);

    let first = service.preview_context(&request).await.unwrap();
    let second = service.preview_context(&request).await.unwrap();
    assert!(second.cached);
    assert_eq!(first.context.context_hash, second.context.context_hash);

    // A second workspace with the same inputs renders the same script.
    let other = imported().await;
    let third = other.preview_context(&request).await.unwrap();
    assert!(!third.cached);
    assert_eq!(third.context.text, first.context.text);
    assert_eq!(third.context.provenance.fields, first.context.provenance.fields);
    assert!(first.context.text.starts_with("Congratulations Priya!"));
}

#[tokio::test]
async fn e2e_budget_limits_output() {
    let service = imported().await;
    let request = priya(&["greet", "docs"]).with_budget(LengthBudget::Words(8));

    let built = service.preview_context(&request).await.unwrap();

    assert!(LengthBudget::Words(8).fits(&built.context.text));
    assert!(built.context.text.starts_with("Congratulations Priya!"));
    let docs = built
        .context
        .provenance
        .notes
        .iter()
        .find(|n| n.note_id == "docs")
        .unwrap();
    assert_ne!(docs.fate, NoteFate::Included);
}

#[tokio::test]
async fn e2e_concurrent_requests_compute_once() {
    let service = Arc::new(imported().await);
    let before = service.engine().computations();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            service
                .preview_context(&priya(&["greet", "docs"]))
                .await
                .unwrap()
        }));
    }
    let results = futures::future::join_all(handles).await;

    let hashes: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().context.context_hash.clone())
        .collect();
    assert!(hashes.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(service.engine().computations() - before, 1);
}

#[tokio::test]
async fn e2e_unknown_record_is_not_found() {
    let service = imported().await;
    let request = ContextRequest::new("0000000000", ContextSelection::from_ids(["greet"]));
    assert!(matches!(
        service.construct_context(&request).await,
        Err(Error::NotFound { .. })
    ));
}

// ── Schema evolution ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_schema_change_flags_and_revalidates_records() {
    let service = imported().await;

    let update = service
        .update_field(
            "scholarship_amount",
            FieldPatch {
                validation_rules: Some(ValidationRules {
                    max: Some(60000.0),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(update.flagged_records, 1);

    let flagged = service
        .list_records(&RecordFilter {
            needs_revalidation: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].key, "9123456780");

    // Fixing the value clears the flag on revalidation.
    let attrs: BTreeMap<String, serde_json::Value> =
        [("scholarship_amount".to_string(), serde_json::json!(55000))]
            .into_iter()
            .collect();
    service.put_record("9123456780", attrs, None).await.unwrap();
    let revalidated = service.revalidate_record("9123456780").await.unwrap();
    assert!(!revalidated.report.has_errors());
    assert!(!revalidated.record.needs_revalidation);
}

#[tokio::test]
async fn e2e_new_field_appears_in_form_and_context() {
    let service = imported().await;
    service
        .define_field(FieldSpec::new("city", FieldType::SingleSelect).options(["Delhi", "Pune"]))
        .await
        .unwrap();
    service
        .create_note(NoteSpec {
            id: Some("city".into()),
            title: "City".into(),
            body: "The orientation is in {{city}}.".into(),
            tags: vec!["logistics".into()],
            class: NoteClass::Secondary,
            priority: 0,
        })
        .await
        .unwrap();

    let form = service.form_schema().await;
    assert!(form.fields.iter().any(|f| f.name == "city"));

    let attrs: BTreeMap<String, serde_json::Value> = [("city".to_string(), serde_json::json!("Pune"))]
        .into_iter()
        .collect();
    service.put_record("9876543210", attrs, None).await.unwrap();

    let built = service
        .preview_context(&priya(&["greet", "city"]))
        .await
        .unwrap();
    assert!(built.context.text.ends_with("The orientation is in Pune."));
}

// ── HTTP ────────────────────────────────────────────────────────────────

mod http {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use outreach_gateway::api_v1::ApiV1State;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn e2e_http_import_then_handoff() {
        let config = AppConfig::default();
        let service = Arc::new(workspace().await);
        let app = outreach_gateway::build_router(&config, Arc::new(ApiV1State::new(service)));

        let (status, proposal) = send(&app, "POST", "/v1/ingest/propose", Some(json!({ "csv": CSV }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(proposal["key_header"], "Phone");

        let mapping = json!({
            "key_header": "Phone",
            "columns": {
                "Name": { "action": "field", "name": "student_name" },
                "Award": { "action": "field", "name": "scholarship_amount" }
            }
        });
        let (status, report) = send(
            &app,
            "POST",
            "/v1/ingest/commit",
            Some(json!({ "csv": CSV, "mapping": mapping })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["totals"]["accepted"], 3);
        assert_eq!(report["totals"]["quarantined"], 1);

        let (status, built) = send(
            &app,
            "POST",
            "/v1/context",
            Some(json!({ "record_key": "9876543210", "selection": { "entries": [
                { "note_id": "greet" }, { "note_id": "hostel" }
            ] } })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(built["cached"], false);

        let (status, handed) = send(&app, "GET", "/v1/handoff/9876543210", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(handed["text"], "Congratulations Priya! Your award is ₹50,000.");
        assert_eq!(handed["context_hash"], built["context"]["context_hash"]);

        let (status, _) = send(&app, "GET", "/v1/handoff/9000000001", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
