// HTTP tests driving the router against the in-memory store
// Run with: cargo test -p crmflow-api --test api_test

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use crmflow_api::{auth::USER_ID_HEADER, router, AppState};
use crmflow_core::{Channels, EngineConfig, InMemoryStore, LoggingChannel};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn app() -> Router {
    let channel = Arc::new(LoggingChannel);
    let state = AppState::new(
        Arc::new(InMemoryStore::new()),
        Channels::new(channel.clone(), channel),
        EngineConfig::default().without_pacing(),
        "memory",
    );
    router(state, "")
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    user: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_ID_HEADER, user.to_string());
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn create_lead(app: &Router, user: Uuid, body: Value) -> String {
    let (status, lead) = call(app, "POST", "/v1/leads", Some(user), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    lead["id"].as_str().unwrap().to_string()
}

async fn create_template(app: &Router, user: Uuid, tasks: Value) -> String {
    let (status, template) = call(
        app,
        "POST",
        "/v1/templates",
        Some(user),
        Some(json!({ "name": "Lead follow-up", "tasks": tasks })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", template);
    template["id"].as_str().unwrap().to_string()
}

/// Poll until `check` accepts the response or give up after ~2s
async fn eventually<F>(app: &Router, uri: &str, user: Uuid, check: F) -> Value
where
    F: Fn(&Value) -> bool,
{
    let mut last = Value::Null;
    for _ in 0..200 {
        let (status, body) = call(app, "GET", uri, Some(user), None).await;
        assert_eq!(status, StatusCode::OK);
        if check(&body) {
            return body;
        }
        last = body;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached for {}: {}", uri, last);
}

#[tokio::test]
async fn test_missing_identity_is_unauthorized() {
    let app = app();
    let (status, body) = call(&app, "GET", "/v1/templates", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
}

#[tokio::test]
async fn test_hitl_gate_waits_for_approval() {
    let app = app();
    let user = Uuid::now_v7();
    let lead = create_lead(
        &app,
        user,
        json!({ "business_name": "Acme", "contact_person": "Ann Lee", "email": "ann@example.com" }),
    )
    .await;
    let template = create_template(
        &app,
        user,
        json!([{ "name": "Intro email", "task_type": "SEND_EMAIL", "is_hitl": true }]),
    )
    .await;

    let (status, instance) = call(
        &app,
        "POST",
        "/v1/instances",
        Some(user),
        Some(json!({ "template_id": template, "lead_id": lead })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(instance["status"], "ACTIVE");
    assert_eq!(instance["metadata"]["trigger_type"], "manual");
    let instance_id = instance["id"].as_str().unwrap().to_string();

    let (_, approvals) = call(&app, "GET", "/v1/approvals", Some(user), None).await;
    let approvals = approvals["data"].as_array().unwrap();
    assert_eq!(approvals.len(), 1);
    assert_eq!(approvals[0]["task_name"], "Intro email");
    let execution_id = approvals[0]["execution_id"].as_str().unwrap().to_string();

    let (_, executions) = call(
        &app,
        "GET",
        &format!("/v1/instances/{}/executions", instance_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(executions["data"][0]["status"], "AWAITING_HITL");

    // Another user cannot approve
    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/executions/{}/approve", execution_id),
        Some(Uuid::now_v7()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, report) = call(
        &app,
        "POST",
        &format!("/v1/executions/{}/approve", execution_id),
        Some(user),
        Some(json!({ "note": "Looks good" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["instance_status"], "COMPLETED");

    let (_, detail) = call(
        &app,
        "GET",
        &format!("/v1/instances/{}", instance_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(detail["status"], "COMPLETED");
    assert_eq!(detail["executions"][0]["status"], "COMPLETED");
    assert_eq!(detail["executions"][0]["hitl_note"], "Looks good");

    let (_, approvals) = call(&app, "GET", "/v1/approvals", Some(user), None).await;
    assert!(approvals["data"].as_array().unwrap().is_empty());

    // A second approval is a business-rule error
    let (status, body) = call(
        &app,
        "POST",
        &format!("/v1/executions/{}/approve", execution_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("not awaiting approval"));
}

#[tokio::test]
async fn test_rejection_cancels_instance() {
    let app = app();
    let user = Uuid::now_v7();
    let template = create_template(
        &app,
        user,
        json!([
            { "name": "Review", "task_type": "WAIT", "is_hitl": true },
            { "name": "Follow up", "task_type": "WAIT" }
        ]),
    )
    .await;
    let (_, instance) = call(
        &app,
        "POST",
        "/v1/instances",
        Some(user),
        Some(json!({ "template_id": template })),
    )
    .await;
    let instance_id = instance["id"].as_str().unwrap().to_string();

    let (_, approvals) = call(&app, "GET", "/v1/approvals", Some(user), None).await;
    let execution_id = approvals["data"][0]["execution_id"].as_str().unwrap().to_string();

    let (status, instance) = call(
        &app,
        "POST",
        &format!("/v1/executions/{}/reject", execution_id),
        Some(user),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(instance["status"], "CANCELLED");

    let (_, executions) = call(
        &app,
        "GET",
        &format!("/v1/instances/{}/executions", instance_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(executions["data"][0]["status"], "REJECTED");
    assert_eq!(executions["data"][1]["status"], "CANCELLED");
}

#[tokio::test]
async fn test_instance_ownership_and_cancel() {
    let app = app();
    let user = Uuid::now_v7();
    let template = create_template(
        &app,
        user,
        json!([{ "name": "Later", "task_type": "WAIT", "delay_value": 2, "delay_unit": "DAYS" }]),
    )
    .await;
    let (_, instance) = call(
        &app,
        "POST",
        "/v1/instances",
        Some(user),
        Some(json!({ "template_id": template })),
    )
    .await;
    let uri = format!("/v1/instances/{}", instance["id"].as_str().unwrap());

    let (status, _) = call(&app, "GET", &uri, Some(Uuid::now_v7()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &app,
        "GET",
        &format!("/v1/instances/{}", Uuid::now_v7()),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("not found"));

    let (status, cancelled) = call(&app, "POST", &format!("{}/cancel", uri), Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    let (status, _) = call(&app, "POST", &format!("{}/cancel", uri), Some(user), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inactive_template_cannot_start() {
    let app = app();
    let user = Uuid::now_v7();
    let template = create_template(&app, user, json!([{ "name": "Step", "task_type": "WAIT" }])).await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/v1/templates/{}/deactivate", template),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], false);

    let (status, _) = call(
        &app,
        "POST",
        "/v1/instances",
        Some(user),
        Some(json!({ "template_id": template })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/v1/templates/{}/activate", template),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn test_new_lead_fires_auto_run() {
    let app = app();
    let user = Uuid::now_v7();
    let template = create_template(&app, user, json!([{ "name": "Log it", "task_type": "WAIT" }])).await;

    let (status, binding) = call(
        &app,
        "PUT",
        "/v1/auto-runs",
        Some(user),
        Some(json!({
            "employee_type": "LEAD_QUALIFIER",
            "industry": "GENERAL",
            "event": "NEW_LEAD",
            "workflow_id": template,
            "enabled": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(binding["enabled"], true);

    let lead = create_lead(&app, user, json!({ "business_name": "Bistro" })).await;
    let (status, body) = call(
        &app,
        "POST",
        &format!("/v1/leads/{}/created", lead),
        Some(user),
        Some(json!({ "industry": "GENERAL" })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["accepted"], true);

    let stats = eventually(&app, "/v1/stats", user, |s| s["completed_instances"] == 1).await;
    assert_eq!(stats["total_templates"], 1);
    assert_eq!(stats["pending_approvals"], 0);
}

#[tokio::test]
async fn test_auto_run_rejects_foreign_workflow() {
    let app = app();
    let owner = Uuid::now_v7();
    let template = create_template(&app, owner, json!([{ "name": "Step", "task_type": "WAIT" }])).await;

    let (status, _) = call(
        &app,
        "PUT",
        "/v1/auto-runs",
        Some(Uuid::now_v7()),
        Some(json!({
            "employee_type": "LEAD_QUALIFIER",
            "event": "NEW_LEAD",
            "workflow_id": template,
            "enabled": true
        })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_campaign_enroll_skips_missing_email() {
    let app = app();
    let user = Uuid::now_v7();
    let (status, campaign) = call(
        &app,
        "POST",
        "/v1/campaigns",
        Some(user),
        Some(json!({
            "name": "Spring promo",
            "channel": "EMAIL",
            "email_subject": "Hello {{firstName}}",
            "email_body": "Spring deals inside",
            "drip_steps": [{ "body": "Welcome!" }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(campaign["status"], "DRAFT");
    let campaign_id = campaign["id"].as_str().unwrap().to_string();

    let a = create_lead(&app, user, json!({ "business_name": "A", "email": "a@example.com" })).await;
    let b = create_lead(&app, user, json!({ "business_name": "B", "email": "b@example.com" })).await;
    let c = create_lead(&app, user, json!({ "business_name": "C", "phone": "+15550001" })).await;

    let enroll_uri = format!("/v1/campaigns/{}/enroll", campaign_id);
    let (status, report) = call(
        &app,
        "POST",
        &enroll_uri,
        Some(user),
        Some(json!({ "lead_ids": [a, b, c] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report, json!({ "enrolled": 2, "skipped": 1, "already_enrolled": 0 }));

    let (_, report) = call(
        &app,
        "POST",
        &enroll_uri,
        Some(user),
        Some(json!({ "lead_ids": [a] })),
    )
    .await;
    assert_eq!(report["enrolled"], 0);
    assert_eq!(report["already_enrolled"], 1);

    // Running campaigns are locked for edits
    let (status, _) = call(
        &app,
        "POST",
        &format!("/v1/campaigns/{}/activate", campaign_id),
        Some(user),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let campaign_uri = format!("/v1/campaigns/{}", campaign_id);
    let (status, body) = call(
        &app,
        "PATCH",
        &campaign_uri,
        Some(user),
        Some(json!({ "name": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Cannot edit a running campaign. Pause it first.");

    let (status, _) = call(&app, "POST", &format!("{}/pause", campaign_uri), Some(user), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, updated) = call(
        &app,
        "PATCH",
        &campaign_uri,
        Some(user),
        Some(json!({ "name": "Renamed" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Renamed");
}

#[tokio::test]
async fn test_sms_campaign_send_counts() {
    let app = app();
    let user = Uuid::now_v7();
    let (_, campaign) = call(
        &app,
        "POST",
        "/v1/campaigns",
        Some(user),
        Some(json!({
            "name": "Reminder blast",
            "channel": "SMS",
            "sms_template": "Hi {firstName}, see you Friday!"
        })),
    )
    .await;
    let campaign_uri = format!("/v1/campaigns/{}", campaign["id"].as_str().unwrap());

    let mut leads = vec![];
    for i in 0..3 {
        leads.push(
            create_lead(
                &app,
                user,
                json!({ "business_name": format!("With phone {}", i), "phone": format!("+1555000{}", i) }),
            )
            .await,
        );
    }
    for i in 0..2 {
        leads.push(
            create_lead(
                &app,
                user,
                json!({ "business_name": format!("No phone {}", i), "email": format!("n{}@example.com", i) }),
            )
            .await,
        );
    }

    let (status, running) = call(
        &app,
        "POST",
        &format!("{}/send", campaign_uri),
        Some(user),
        Some(json!({ "lead_ids": leads })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(running["total_recipients"], 5);

    let done = eventually(&app, &campaign_uri, user, |c| c["status"] == "COMPLETED").await;
    assert_eq!(done["sent_count"], 3);
    assert_eq!(done["failed_count"], 2);

    let (status, body) = call(
        &app,
        "POST",
        &format!("{}/send", campaign_uri),
        Some(user),
        Some(json!({ "lead_ids": leads })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_campaign_of_another_user_is_forbidden() {
    let app = app();
    let owner = Uuid::now_v7();
    let (_, campaign) = call(
        &app,
        "POST",
        "/v1/campaigns",
        Some(owner),
        Some(json!({ "name": "Private", "channel": "EMAIL", "email_body": "Hi" })),
    )
    .await;

    let (status, _) = call(
        &app,
        "GET",
        &format!("/v1/campaigns/{}", campaign["id"].as_str().unwrap()),
        Some(Uuid::now_v7()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
