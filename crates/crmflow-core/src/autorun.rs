// Auto-run bindings
//
// A binding links a domain event to a workflow template for one
// (user, employee type, industry). Enabled bindings with a workflow start an
// instance whenever the event fires.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::industry::Industry;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Domain events that can start workflows
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerEvent {
    NewLead,
    NewReview,
    DealStageChanged,
    AppointmentBooked,
}

impl TriggerEvent {
    /// Value stored as `trigger_type` in instance metadata
    pub fn trigger_type(&self) -> &'static str {
        match self {
            TriggerEvent::NewLead => "new_lead",
            TriggerEvent::NewReview => "new_review",
            TriggerEvent::DealStageChanged => "deal_stage_changed",
            TriggerEvent::AppointmentBooked => "appointment_booked",
        }
    }
}

impl std::fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerEvent::NewLead => write!(f, "NEW_LEAD"),
            TriggerEvent::NewReview => write!(f, "NEW_REVIEW"),
            TriggerEvent::DealStageChanged => write!(f, "DEAL_STAGE_CHANGED"),
            TriggerEvent::AppointmentBooked => write!(f, "APPOINTMENT_BOOKED"),
        }
    }
}

impl From<&str> for TriggerEvent {
    fn from(s: &str) -> Self {
        match s {
            "NEW_REVIEW" => TriggerEvent::NewReview,
            "DEAL_STAGE_CHANGED" => TriggerEvent::DealStageChanged,
            "APPOINTMENT_BOOKED" => TriggerEvent::AppointmentBooked,
            _ => TriggerEvent::NewLead,
        }
    }
}

/// Per-user auto-run toggle
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AutoRunBinding {
    pub id: Uuid,
    pub user_id: Uuid,
    /// AI employee role the binding belongs to (LEAD_QUALIFIER, REVIEW_RESPONDER, ...)
    pub employee_type: String,
    pub industry: Industry,
    pub event: TriggerEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<Uuid>,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl AutoRunBinding {
    pub fn matches(&self, user_id: Uuid, industry: Industry, event: TriggerEvent) -> bool {
        self.enabled
            && self.workflow_id.is_some()
            && self.user_id == user_id
            && self.industry == industry
            && self.event == event
    }

    /// Uniqueness key: one binding per (user, employee type, industry, event)
    pub fn key(&self) -> (Uuid, &str, Industry, TriggerEvent) {
        (self.user_id, &self.employee_type, self.industry, self.event)
    }
}

/// Upsert request for a binding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct UpsertAutoRun {
    pub employee_type: String,
    #[serde(default)]
    pub industry: Industry,
    pub event: TriggerEvent,
    #[serde(default)]
    pub workflow_id: Option<Uuid>,
    pub enabled: bool,
}

impl UpsertAutoRun {
    pub fn into_binding(self, user_id: Uuid) -> AutoRunBinding {
        AutoRunBinding {
            id: Uuid::now_v7(),
            user_id,
            employee_type: self.employee_type,
            industry: self.industry,
            event: self.event,
            workflow_id: self.workflow_id,
            enabled: self.enabled,
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(enabled: bool, workflow_id: Option<Uuid>) -> AutoRunBinding {
        UpsertAutoRun {
            employee_type: "LEAD_QUALIFIER".to_string(),
            industry: Industry::Restaurant,
            event: TriggerEvent::NewLead,
            workflow_id,
            enabled,
        }
        .into_binding(Uuid::nil())
    }

    #[test]
    fn test_matches_requires_enabled_and_workflow() {
        let wf = Some(Uuid::now_v7());
        assert!(binding(true, wf).matches(Uuid::nil(), Industry::Restaurant, TriggerEvent::NewLead));
        assert!(!binding(false, wf).matches(Uuid::nil(), Industry::Restaurant, TriggerEvent::NewLead));
        assert!(!binding(true, None).matches(Uuid::nil(), Industry::Restaurant, TriggerEvent::NewLead));
        assert!(!binding(true, wf).matches(Uuid::nil(), Industry::Dental, TriggerEvent::NewLead));
        assert!(!binding(true, wf).matches(Uuid::nil(), Industry::Restaurant, TriggerEvent::NewReview));
    }

    #[test]
    fn test_trigger_type_is_lowercase_event() {
        assert_eq!(TriggerEvent::DealStageChanged.trigger_type(), "deal_stage_changed");
        assert_eq!(
            TriggerEvent::DealStageChanged.to_string().to_lowercase(),
            TriggerEvent::DealStageChanged.trigger_type()
        );
    }
}
