// Workflow instance, HITL approval and stats HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use crmflow_core::{
    HitlNotification, InstanceDetail, StartInstance, StepReport, TaskExecution, WorkflowInstance,
    WorkflowStats,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::UserId;
use crate::common::ListResponse;
use crate::error::ApiResult;
use crate::state::AppState;

/// Optional note attached to an approval or rejection
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct HitlDecisionRequest {
    #[serde(default)]
    pub note: Option<String>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/instances", post(start_instance))
        .route("/v1/instances/:instance_id", get(get_instance))
        .route("/v1/instances/:instance_id/cancel", post(cancel_instance))
        .route("/v1/instances/:instance_id/executions", get(list_executions))
        .route("/v1/approvals", get(list_approvals))
        .route("/v1/executions/:execution_id/approve", post(approve_execution))
        .route("/v1/executions/:execution_id/reject", post(reject_execution))
        .route("/v1/stats", get(workflow_stats))
        .with_state(state)
}

/// POST /v1/instances - Start a template manually
#[utoipa::path(
    post,
    path = "/v1/instances",
    params(("x-user-id" = Uuid, Header, description = "Caller identity")),
    request_body = StartInstance,
    responses(
        (status = 201, description = "Instance started", body = WorkflowInstance),
        (status = 400, description = "Template inactive or empty"),
        (status = 403, description = "Template or lead belongs to another user"),
        (status = 404, description = "Template or lead not found")
    ),
    tag = "instances"
)]
pub async fn start_instance(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<StartInstance>,
) -> ApiResult<(StatusCode, Json<WorkflowInstance>)> {
    let instance = state.engine.start_instance(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(instance)))
}

/// GET /v1/instances/{instance_id} - Instance with its executions
#[utoipa::path(
    get,
    path = "/v1/instances/{instance_id}",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("instance_id" = Uuid, Path, description = "Instance ID")
    ),
    responses(
        (status = 200, description = "Instance found", body = InstanceDetail),
        (status = 403, description = "Instance belongs to another user"),
        (status = 404, description = "Instance not found")
    ),
    tag = "instances"
)]
pub async fn get_instance(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(instance_id): Path<Uuid>,
) -> ApiResult<Json<InstanceDetail>> {
    let detail = state.engine.get_instance(instance_id, user_id).await?;
    Ok(Json(detail))
}

/// POST /v1/instances/{instance_id}/cancel
#[utoipa::path(
    post,
    path = "/v1/instances/{instance_id}/cancel",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("instance_id" = Uuid, Path, description = "Instance ID")
    ),
    responses(
        (status = 200, description = "Instance cancelled", body = WorkflowInstance),
        (status = 400, description = "Instance is not active"),
        (status = 404, description = "Instance not found")
    ),
    tag = "instances"
)]
pub async fn cancel_instance(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(instance_id): Path<Uuid>,
) -> ApiResult<Json<WorkflowInstance>> {
    let instance = state.engine.cancel_instance(instance_id, user_id).await?;
    Ok(Json(instance))
}

/// GET /v1/instances/{instance_id}/executions
#[utoipa::path(
    get,
    path = "/v1/instances/{instance_id}/executions",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("instance_id" = Uuid, Path, description = "Instance ID")
    ),
    responses(
        (status = 200, description = "Executions in display order", body = ListResponse<TaskExecution>),
        (status = 404, description = "Instance not found")
    ),
    tag = "instances"
)]
pub async fn list_executions(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(instance_id): Path<Uuid>,
) -> ApiResult<Json<ListResponse<TaskExecution>>> {
    let executions = state.engine.list_executions(instance_id, user_id).await?;
    Ok(Json(ListResponse::new(executions)))
}

/// GET /v1/approvals - Pending HITL notifications for the caller
#[utoipa::path(
    get,
    path = "/v1/approvals",
    params(("x-user-id" = Uuid, Header, description = "Caller identity")),
    responses(
        (status = 200, description = "Pending approvals", body = ListResponse<HitlNotification>)
    ),
    tag = "approvals"
)]
pub async fn list_approvals(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<ListResponse<HitlNotification>>> {
    let pending = state.engine.pending_approvals(user_id).await?;
    Ok(Json(ListResponse::new(pending)))
}

/// POST /v1/executions/{execution_id}/approve - Approve a HITL gate and resume the workflow
#[utoipa::path(
    post,
    path = "/v1/executions/{execution_id}/approve",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("execution_id" = Uuid, Path, description = "Execution ID")
    ),
    request_body = HitlDecisionRequest,
    responses(
        (status = 200, description = "Approved; the gated task ran", body = StepReport),
        (status = 400, description = "Execution is not awaiting approval"),
        (status = 403, description = "Instance belongs to another user"),
        (status = 404, description = "Execution not found")
    ),
    tag = "approvals"
)]
pub async fn approve_execution(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(execution_id): Path<Uuid>,
    body: Option<Json<HitlDecisionRequest>>,
) -> ApiResult<Json<StepReport>> {
    let note = body.and_then(|Json(b)| b.note);
    let report = state.engine.approve_hitl(execution_id, user_id, note).await?;
    Ok(Json(report))
}

/// POST /v1/executions/{execution_id}/reject - Reject a HITL gate; the instance is cancelled
#[utoipa::path(
    post,
    path = "/v1/executions/{execution_id}/reject",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("execution_id" = Uuid, Path, description = "Execution ID")
    ),
    request_body = HitlDecisionRequest,
    responses(
        (status = 200, description = "Rejected", body = WorkflowInstance),
        (status = 400, description = "Execution is not awaiting approval"),
        (status = 403, description = "Instance belongs to another user"),
        (status = 404, description = "Execution not found")
    ),
    tag = "approvals"
)]
pub async fn reject_execution(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(execution_id): Path<Uuid>,
    body: Option<Json<HitlDecisionRequest>>,
) -> ApiResult<Json<WorkflowInstance>> {
    let note = body.and_then(|Json(b)| b.note);
    let instance = state.engine.reject_hitl(execution_id, user_id, note).await?;
    Ok(Json(instance))
}

/// GET /v1/stats - Dashboard counters
#[utoipa::path(
    get,
    path = "/v1/stats",
    params(("x-user-id" = Uuid, Header, description = "Caller identity")),
    responses(
        (status = 200, description = "Workflow counters", body = WorkflowStats)
    ),
    tag = "instances"
)]
pub async fn workflow_stats(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<WorkflowStats>> {
    let stats = state.engine.workflow_stats(user_id).await?;
    Ok(Json(stats))
}
