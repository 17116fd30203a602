// Workflow instance domain types
//
// An instance is one run of a template against a lead. It owns one TaskExecution
// per template task; HITL gates surface to the owner as HitlNotifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::industry::Industry;
use crate::template::WorkflowTask;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Instance lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Active,
    Completed,
    Cancelled,
    Failed,
}

impl InstanceStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Active)
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InstanceStatus::Active => write!(f, "ACTIVE"),
            InstanceStatus::Completed => write!(f, "COMPLETED"),
            InstanceStatus::Cancelled => write!(f, "CANCELLED"),
            InstanceStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl From<&str> for InstanceStatus {
    fn from(s: &str) -> Self {
        match s {
            "COMPLETED" => InstanceStatus::Completed,
            "CANCELLED" => InstanceStatus::Cancelled,
            "FAILED" => InstanceStatus::Failed,
            _ => InstanceStatus::Active,
        }
    }
}

/// Task execution status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    InProgress,
    AwaitingHitl,
    Approved,
    Completed,
    Failed,
    Skipped,
    Rejected,
    Cancelled,
}

impl ExecutionStatus {
    /// Statuses the step walker will act on
    pub fn is_runnable(&self) -> bool {
        matches!(self, ExecutionStatus::Pending | ExecutionStatus::Approved)
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed
                | ExecutionStatus::Failed
                | ExecutionStatus::Skipped
                | ExecutionStatus::Rejected
                | ExecutionStatus::Cancelled
        )
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Pending => write!(f, "PENDING"),
            ExecutionStatus::InProgress => write!(f, "IN_PROGRESS"),
            ExecutionStatus::AwaitingHitl => write!(f, "AWAITING_HITL"),
            ExecutionStatus::Approved => write!(f, "APPROVED"),
            ExecutionStatus::Completed => write!(f, "COMPLETED"),
            ExecutionStatus::Failed => write!(f, "FAILED"),
            ExecutionStatus::Skipped => write!(f, "SKIPPED"),
            ExecutionStatus::Rejected => write!(f, "REJECTED"),
            ExecutionStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl From<&str> for ExecutionStatus {
    fn from(s: &str) -> Self {
        match s {
            "IN_PROGRESS" => ExecutionStatus::InProgress,
            "AWAITING_HITL" => ExecutionStatus::AwaitingHitl,
            "APPROVED" => ExecutionStatus::Approved,
            "COMPLETED" => ExecutionStatus::Completed,
            "FAILED" => ExecutionStatus::Failed,
            "SKIPPED" => ExecutionStatus::Skipped,
            "REJECTED" => ExecutionStatus::Rejected,
            "CANCELLED" => ExecutionStatus::Cancelled,
            _ => ExecutionStatus::Pending,
        }
    }
}

/// One running occurrence of a template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkflowInstance {
    pub id: Uuid,
    pub template_id: Uuid,
    pub user_id: Uuid,
    pub industry: Industry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deal_id: Option<Uuid>,
    pub status: InstanceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<Uuid>,
    /// Trigger context (trigger_type, employee_type, client_type, ...)
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: Value,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Run record of one task within an instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TaskExecution {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub task_id: Uuid,
    pub display_order: i32,
    pub status: ExecutionStatus,
    pub scheduled_for: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hitl_approved_by: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hitl_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_used: Option<String>,
}

impl TaskExecution {
    pub fn pending(instance_id: Uuid, task: &WorkflowTask, scheduled_for: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            instance_id,
            task_id: task.id,
            display_order: task.display_order,
            status: ExecutionStatus::Pending,
            scheduled_for,
            started_at: None,
            completed_at: None,
            result: None,
            error_message: None,
            hitl_approved_by: None,
            hitl_note: None,
            agent_used: None,
        }
    }
}

/// Resolution state of a HITL notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl std::fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "PENDING"),
            NotificationStatus::Approved => write!(f, "APPROVED"),
            NotificationStatus::Rejected => write!(f, "REJECTED"),
        }
    }
}

impl From<&str> for NotificationStatus {
    fn from(s: &str) -> Self {
        match s {
            "APPROVED" => NotificationStatus::Approved,
            "REJECTED" => NotificationStatus::Rejected,
            _ => NotificationStatus::Pending,
        }
    }
}

/// Approval request shown to the instance owner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct HitlNotification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub execution_id: Uuid,
    pub task_name: String,
    pub workflow_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    pub urgency: String,
    pub status: NotificationStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

/// Request to start an instance directly
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StartInstance {
    pub template_id: Uuid,
    #[serde(default)]
    pub lead_id: Option<Uuid>,
    #[serde(default)]
    pub deal_id: Option<Uuid>,
    #[serde(default = "empty_object")]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub metadata: Value,
}

fn empty_object() -> Value {
    json!({})
}

impl StartInstance {
    pub fn new(template_id: Uuid) -> Self {
        Self {
            template_id,
            lead_id: None,
            deal_id: None,
            metadata: json!({ "trigger_type": "manual" }),
        }
    }

    pub fn for_lead(mut self, lead_id: Uuid) -> Self {
        self.lead_id = Some(lead_id);
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Instance plus its executions, for display
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct InstanceDetail {
    #[serde(flatten)]
    pub instance: WorkflowInstance,
    pub executions: Vec<TaskExecution>,
}

/// Dashboard counters for one user
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkflowStats {
    pub total_templates: usize,
    pub active_instances: usize,
    pub completed_instances: usize,
    pub pending_approvals: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runnable_statuses() {
        assert!(ExecutionStatus::Pending.is_runnable());
        assert!(ExecutionStatus::Approved.is_runnable());
        assert!(!ExecutionStatus::AwaitingHitl.is_runnable());
        assert!(!ExecutionStatus::Completed.is_runnable());
    }

    #[test]
    fn test_execution_status_text_round_trip() {
        for s in ["PENDING", "IN_PROGRESS", "AWAITING_HITL", "APPROVED", "SKIPPED", "CANCELLED"] {
            assert_eq!(ExecutionStatus::from(s).to_string(), s);
        }
        let json = serde_json::to_string(&ExecutionStatus::AwaitingHitl).unwrap();
        assert_eq!(json, "\"AWAITING_HITL\"");
    }

    #[test]
    fn test_instance_terminal() {
        assert!(!InstanceStatus::Active.is_terminal());
        assert!(InstanceStatus::Failed.is_terminal());
        assert_eq!(InstanceStatus::from("CANCELLED"), InstanceStatus::Cancelled);
    }
}
