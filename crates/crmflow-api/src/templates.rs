// Workflow template HTTP routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use crmflow_core::{CreateTemplate, WorkflowTemplate};
use uuid::Uuid;

use crate::auth::UserId;
use crate::common::ListResponse;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/templates", post(create_template).get(list_templates))
        .route("/v1/templates/:template_id/activate", post(activate_template))
        .route(
            "/v1/templates/:template_id/deactivate",
            post(deactivate_template),
        )
        .with_state(state)
}

/// POST /v1/templates - Author a template with its ordered tasks
#[utoipa::path(
    post,
    path = "/v1/templates",
    params(("x-user-id" = Uuid, Header, description = "Caller identity")),
    request_body = CreateTemplate,
    responses(
        (status = 201, description = "Template created", body = WorkflowTemplate),
        (status = 400, description = "Invalid template"),
        (status = 401, description = "Missing identity")
    ),
    tag = "templates"
)]
pub async fn create_template(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<CreateTemplate>,
) -> ApiResult<(StatusCode, Json<WorkflowTemplate>)> {
    let template = state.engine.create_template(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

/// GET /v1/templates - List the caller's templates
#[utoipa::path(
    get,
    path = "/v1/templates",
    params(("x-user-id" = Uuid, Header, description = "Caller identity")),
    responses(
        (status = 200, description = "List of templates", body = ListResponse<WorkflowTemplate>),
        (status = 401, description = "Missing identity")
    ),
    tag = "templates"
)]
pub async fn list_templates(
    State(state): State<AppState>,
    UserId(user_id): UserId,
) -> ApiResult<Json<ListResponse<WorkflowTemplate>>> {
    let templates = state.engine.list_templates(user_id).await?;
    Ok(Json(ListResponse::new(templates)))
}

/// POST /v1/templates/{template_id}/activate
#[utoipa::path(
    post,
    path = "/v1/templates/{template_id}/activate",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("template_id" = Uuid, Path, description = "Template ID")
    ),
    responses(
        (status = 200, description = "Template activated", body = WorkflowTemplate),
        (status = 403, description = "Template belongs to another user"),
        (status = 404, description = "Template not found")
    ),
    tag = "templates"
)]
pub async fn activate_template(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(template_id): Path<Uuid>,
) -> ApiResult<Json<WorkflowTemplate>> {
    let template = state
        .engine
        .set_template_active(template_id, user_id, true)
        .await?;
    Ok(Json(template))
}

/// POST /v1/templates/{template_id}/deactivate - Also cancels the template's active instances
#[utoipa::path(
    post,
    path = "/v1/templates/{template_id}/deactivate",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("template_id" = Uuid, Path, description = "Template ID")
    ),
    responses(
        (status = 200, description = "Template deactivated", body = WorkflowTemplate),
        (status = 403, description = "Template belongs to another user"),
        (status = 404, description = "Template not found")
    ),
    tag = "templates"
)]
pub async fn deactivate_template(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(template_id): Path<Uuid>,
) -> ApiResult<Json<WorkflowTemplate>> {
    let template = state
        .engine
        .set_template_active(template_id, user_id, false)
        .await?;
    Ok(Json(template))
}
