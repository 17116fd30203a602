// Lead and domain event HTTP routes
// Decision: Event endpoints answer 202 and dispatch on a detached task

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use crmflow_core::{Error, Industry, Lead, LeadStore, TriggerEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::UserId;
use crate::common::AcceptedResponse;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateLeadRequest {
    pub business_name: String,
    #[serde(default)]
    pub contact_person: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub custom_fields: Option<Value>,
}

/// Industry the new lead is routed under
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LeadCreatedRequest {
    #[serde(default)]
    pub industry: Industry,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DispatchEventRequest {
    pub event: TriggerEvent,
    #[serde(default)]
    pub industry: Industry,
    #[serde(default)]
    pub lead_id: Option<Uuid>,
}

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/leads", post(create_lead))
        .route("/v1/leads/:lead_id/created", post(lead_created))
        .route("/v1/events", post(dispatch_event))
        .with_state(state)
}

async fn owned_lead(state: &AppState, lead_id: Uuid, user_id: Uuid) -> ApiResult<Lead> {
    let lead = state
        .store
        .get_lead(lead_id)
        .await?
        .ok_or_else(|| Error::not_found("Lead", lead_id))?;
    if lead.user_id != user_id {
        return Err(Error::forbidden("Lead belongs to another user").into());
    }
    Ok(lead)
}

/// POST /v1/leads - Create a lead
#[utoipa::path(
    post,
    path = "/v1/leads",
    params(("x-user-id" = Uuid, Header, description = "Caller identity")),
    request_body = CreateLeadRequest,
    responses(
        (status = 201, description = "Lead created", body = Lead),
        (status = 400, description = "Business name missing")
    ),
    tag = "leads"
)]
pub async fn create_lead(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<CreateLeadRequest>,
) -> ApiResult<(StatusCode, Json<Lead>)> {
    if req.business_name.trim().is_empty() {
        return Err(ApiError::bad_request("Business name is required"));
    }

    let mut lead = Lead::new(user_id, req.business_name.trim());
    lead.contact_person = req.contact_person;
    lead.email = req.email.filter(|e| !e.trim().is_empty());
    lead.phone = req.phone.filter(|p| !p.trim().is_empty());
    if let Some(status) = req.status {
        lead.status = status;
    }
    lead.tags = req.tags;
    if let Some(fields) = req.custom_fields {
        lead.custom_fields = fields;
    }

    let lead = state.store.create_lead(lead).await?;
    tracing::info!(lead_id = %lead.id, "Lead created");
    Ok((StatusCode::CREATED, Json(lead)))
}

/// POST /v1/leads/{lead_id}/created - Fire NEW_LEAD auto-runs for a lead
#[utoipa::path(
    post,
    path = "/v1/leads/{lead_id}/created",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("lead_id" = Uuid, Path, description = "Lead ID")
    ),
    request_body = LeadCreatedRequest,
    responses(
        (status = 202, description = "Dispatch accepted", body = AcceptedResponse),
        (status = 403, description = "Lead belongs to another user"),
        (status = 404, description = "Lead not found")
    ),
    tag = "leads"
)]
pub async fn lead_created(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(lead_id): Path<Uuid>,
    body: Option<Json<LeadCreatedRequest>>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    let industry = body.map(|Json(b)| b.industry).unwrap_or_default();
    let lead = owned_lead(&state, lead_id, user_id).await?;

    state
        .dispatcher
        .spawn_dispatch(TriggerEvent::NewLead, user_id, Some(lead.id), industry);

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse::new("Auto-run dispatch started")),
    ))
}

/// POST /v1/events - Dispatch any domain event to the caller's auto-runs
#[utoipa::path(
    post,
    path = "/v1/events",
    params(("x-user-id" = Uuid, Header, description = "Caller identity")),
    request_body = DispatchEventRequest,
    responses(
        (status = 202, description = "Dispatch accepted", body = AcceptedResponse),
        (status = 404, description = "Lead not found")
    ),
    tag = "leads"
)]
pub async fn dispatch_event(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<DispatchEventRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    if let Some(lead_id) = req.lead_id {
        owned_lead(&state, lead_id, user_id).await?;
    }

    state
        .dispatcher
        .spawn_dispatch(req.event, user_id, req.lead_id, req.industry);

    Ok((
        StatusCode::ACCEPTED,
        Json(AcceptedResponse::new("Auto-run dispatch started")),
    ))
}
