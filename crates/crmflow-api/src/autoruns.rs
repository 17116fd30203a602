// Auto-run binding HTTP routes

use axum::{extract::State, routing::put, Json, Router};
use crmflow_core::{AutoRunBinding, AutoRunStore, Error, UpsertAutoRun, WorkflowStore};

use crate::auth::UserId;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/auto-runs", put(upsert_auto_run))
        .with_state(state)
}

/// PUT /v1/auto-runs - Enable, disable or retarget an auto-run binding
#[utoipa::path(
    put,
    path = "/v1/auto-runs",
    params(("x-user-id" = uuid::Uuid, Header, description = "Caller identity")),
    request_body = UpsertAutoRun,
    responses(
        (status = 200, description = "Binding saved", body = AutoRunBinding),
        (status = 400, description = "Employee type missing"),
        (status = 403, description = "Workflow belongs to another user"),
        (status = 404, description = "Workflow not found")
    ),
    tag = "auto-runs"
)]
pub async fn upsert_auto_run(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<UpsertAutoRun>,
) -> ApiResult<Json<AutoRunBinding>> {
    if req.employee_type.trim().is_empty() {
        return Err(ApiError::bad_request("Employee type is required"));
    }

    if let Some(workflow_id) = req.workflow_id {
        let template = state
            .store
            .get_template(workflow_id)
            .await?
            .ok_or_else(|| Error::not_found("Workflow template", workflow_id))?;
        if template.user_id != user_id {
            return Err(Error::forbidden("Workflow template belongs to another user").into());
        }
    }

    let binding = state.store.upsert_binding(req.into_binding(user_id)).await?;
    tracing::info!(
        binding_id = %binding.id,
        employee_type = %binding.employee_type,
        event = ?binding.event,
        enabled = binding.enabled,
        "Auto-run binding saved"
    );
    Ok(Json(binding))
}
