// CRM activity records written by task executors
//
// Executors never touch the lead's related tables directly; every side effect that
// is not an outbound message or a lead update lands here (follow-up tasks, bookings,
// call logs, documents, estimates, purchase orders, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ActivityRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<Uuid>,
    /// Activity kind (task, booking, call_log, document, estimate, ...)
    pub kind: String,
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(user_id: Uuid, lead_id: Option<Uuid>, kind: impl Into<String>, payload: Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            lead_id,
            kind: kind.into(),
            payload,
            created_at: Utc::now(),
        }
    }
}
