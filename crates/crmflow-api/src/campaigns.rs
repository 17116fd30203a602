// Campaign HTTP routes
// Decision: Sends are drained on a detached task; the request returns once recipients exist

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use crmflow_core::{Campaign, CreateCampaign, EnrollmentReport, UpdateCampaign};
use uuid::Uuid;

use crate::auth::UserId;
use crate::common::LeadIdsRequest;
use crate::error::ApiResult;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/v1/campaigns", post(create_campaign))
        .route(
            "/v1/campaigns/:campaign_id",
            get(get_campaign).patch(update_campaign),
        )
        .route("/v1/campaigns/:campaign_id/enroll", post(enroll_leads))
        .route("/v1/campaigns/:campaign_id/send", post(send_campaign))
        .route("/v1/campaigns/:campaign_id/activate", post(activate_campaign))
        .route("/v1/campaigns/:campaign_id/pause", post(pause_campaign))
        .route("/v1/campaigns/:campaign_id/resume", post(resume_campaign))
        .with_state(state)
}

fn spawn_send(state: &AppState, campaign_id: Uuid) {
    let campaigns = state.campaigns.clone();
    tokio::spawn(async move {
        match campaigns.send_pending(campaign_id).await {
            Ok(report) => tracing::info!(
                campaign_id = %campaign_id,
                processed = report.processed,
                sent = report.sent_count,
                failed = report.failed_count,
                "Campaign send finished"
            ),
            Err(e) => tracing::error!(campaign_id = %campaign_id, error = %e, "Campaign send failed"),
        }
    });
}

/// POST /v1/campaigns
#[utoipa::path(
    post,
    path = "/v1/campaigns",
    params(("x-user-id" = Uuid, Header, description = "Caller identity")),
    request_body = CreateCampaign,
    responses(
        (status = 201, description = "Campaign created as DRAFT", body = Campaign),
        (status = 400, description = "Invalid campaign")
    ),
    tag = "campaigns"
)]
pub async fn create_campaign(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Json(req): Json<CreateCampaign>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let campaign = state.campaigns.create_campaign(user_id, req).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// GET /v1/campaigns/{campaign_id}
#[utoipa::path(
    get,
    path = "/v1/campaigns/{campaign_id}",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("campaign_id" = Uuid, Path, description = "Campaign ID")
    ),
    responses(
        (status = 200, description = "Campaign with counters", body = Campaign),
        (status = 403, description = "Campaign belongs to another user"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "campaigns"
)]
pub async fn get_campaign(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    let campaign = state.campaigns.get_campaign(campaign_id, user_id).await?;
    Ok(Json(campaign))
}

/// PATCH /v1/campaigns/{campaign_id} - Running campaigns must be paused first
#[utoipa::path(
    patch,
    path = "/v1/campaigns/{campaign_id}",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("campaign_id" = Uuid, Path, description = "Campaign ID")
    ),
    request_body = UpdateCampaign,
    responses(
        (status = 200, description = "Campaign updated", body = Campaign),
        (status = 400, description = "Campaign is running"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "campaigns"
)]
pub async fn update_campaign(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(campaign_id): Path<Uuid>,
    Json(req): Json<UpdateCampaign>,
) -> ApiResult<Json<Campaign>> {
    let campaign = state
        .campaigns
        .update_campaign(campaign_id, user_id, req)
        .await?;
    Ok(Json(campaign))
}

/// POST /v1/campaigns/{campaign_id}/enroll - Enroll leads into the drip sequence
#[utoipa::path(
    post,
    path = "/v1/campaigns/{campaign_id}/enroll",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("campaign_id" = Uuid, Path, description = "Campaign ID")
    ),
    request_body = LeadIdsRequest,
    responses(
        (status = 200, description = "Enrollment outcome", body = EnrollmentReport),
        (status = 400, description = "Campaign is completed"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "campaigns"
)]
pub async fn enroll_leads(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(campaign_id): Path<Uuid>,
    Json(req): Json<LeadIdsRequest>,
) -> ApiResult<Json<EnrollmentReport>> {
    let report = state
        .campaigns
        .enroll_leads(campaign_id, user_id, &req.lead_ids)
        .await?;
    Ok(Json(report))
}

/// POST /v1/campaigns/{campaign_id}/send - Create recipients and start delivering
#[utoipa::path(
    post,
    path = "/v1/campaigns/{campaign_id}/send",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("campaign_id" = Uuid, Path, description = "Campaign ID")
    ),
    request_body = LeadIdsRequest,
    responses(
        (status = 202, description = "Campaign running; delivery continues in the background", body = Campaign),
        (status = 400, description = "Campaign already running, completed or without recipients"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "campaigns"
)]
pub async fn send_campaign(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(campaign_id): Path<Uuid>,
    Json(req): Json<LeadIdsRequest>,
) -> ApiResult<(StatusCode, Json<Campaign>)> {
    let campaign = state
        .campaigns
        .start_send(campaign_id, user_id, &req.lead_ids)
        .await?;
    spawn_send(&state, campaign.id);
    Ok((StatusCode::ACCEPTED, Json(campaign)))
}

/// POST /v1/campaigns/{campaign_id}/activate - Start a drip campaign
#[utoipa::path(
    post,
    path = "/v1/campaigns/{campaign_id}/activate",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("campaign_id" = Uuid, Path, description = "Campaign ID")
    ),
    responses(
        (status = 200, description = "Campaign running", body = Campaign),
        (status = 400, description = "Campaign is not a draft or has no drip steps"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "campaigns"
)]
pub async fn activate_campaign(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    let campaign = state.campaigns.activate(campaign_id, user_id).await?;
    Ok(Json(campaign))
}

/// POST /v1/campaigns/{campaign_id}/pause
#[utoipa::path(
    post,
    path = "/v1/campaigns/{campaign_id}/pause",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("campaign_id" = Uuid, Path, description = "Campaign ID")
    ),
    responses(
        (status = 200, description = "Campaign paused", body = Campaign),
        (status = 400, description = "Campaign is not running"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "campaigns"
)]
pub async fn pause_campaign(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    let campaign = state.campaigns.pause(campaign_id, user_id).await?;
    Ok(Json(campaign))
}

/// POST /v1/campaigns/{campaign_id}/resume - Resume and keep draining pending recipients
#[utoipa::path(
    post,
    path = "/v1/campaigns/{campaign_id}/resume",
    params(
        ("x-user-id" = Uuid, Header, description = "Caller identity"),
        ("campaign_id" = Uuid, Path, description = "Campaign ID")
    ),
    responses(
        (status = 200, description = "Campaign running", body = Campaign),
        (status = 400, description = "Campaign is not paused"),
        (status = 404, description = "Campaign not found")
    ),
    tag = "campaigns"
)]
pub async fn resume_campaign(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    Path(campaign_id): Path<Uuid>,
) -> ApiResult<Json<Campaign>> {
    let campaign = state.campaigns.resume(campaign_id, user_id).await?;
    spawn_send(&state, campaign.id);
    Ok(Json(campaign))
}
