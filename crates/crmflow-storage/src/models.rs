// Database models (internal, may differ from public DTOs)
//
// Enum columns are stored as TEXT in their SCREAMING_SNAKE_CASE form and parsed
// back with the core `From<&str>` impls. Structured columns use JSONB.

use chrono::{DateTime, Utc};
use crmflow_core::{
    AbTest, AbVariant, ActionConfig, ActivityRecord, AutoRunBinding, BranchCondition, Campaign,
    CampaignChannel, CampaignEnrollment, CampaignRecipient, CampaignStatus, DelayUnit, DripStep,
    EnrollmentStatus, ExecutionStatus, FailurePolicy, HitlNotification, Industry, InstanceStatus,
    Lead, NotificationStatus, RecipientStatus, TaskExecution, TriggerEvent, WorkflowInstance,
    WorkflowTask, WorkflowTemplate,
};
use sqlx::types::{Json, JsonValue};
use sqlx::FromRow;
use uuid::Uuid;

// ============================================
// Leads and activities
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct LeadRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub business_name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub tags: Vec<String>,
    pub custom_fields: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        Lead {
            id: row.id,
            user_id: row.user_id,
            business_name: row.business_name,
            contact_person: row.contact_person,
            email: row.email,
            phone: row.phone,
            status: row.status,
            tags: row.tags,
            custom_fields: row.custom_fields,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ActivityRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lead_id: Option<Uuid>,
    pub kind: String,
    pub payload: JsonValue,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityRow> for ActivityRecord {
    fn from(row: ActivityRow) -> Self {
        ActivityRecord {
            id: row.id,
            user_id: row.user_id,
            lead_id: row.lead_id,
            kind: row.kind,
            payload: row.payload,
            created_at: row.created_at,
        }
    }
}

// ============================================
// Workflow templates
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct TemplateRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub industry: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateRow {
    /// Attach tasks (already sorted by display_order)
    pub fn into_template(self, tasks: Vec<TaskRow>) -> WorkflowTemplate {
        WorkflowTemplate {
            id: self.id,
            user_id: self.user_id,
            industry: Industry::from(self.industry.as_str()),
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            tasks: tasks.into_iter().map(WorkflowTask::from).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TaskRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    pub task_type: String,
    pub assigned_agent: Option<String>,
    pub is_hitl: bool,
    pub delay_value: i64,
    pub delay_unit: String,
    pub display_order: i32,
    pub branch_condition: Option<Json<BranchCondition>>,
    pub action_config: Json<ActionConfig>,
    pub on_failure: String,
}

impl From<TaskRow> for WorkflowTask {
    fn from(row: TaskRow) -> Self {
        WorkflowTask {
            id: row.id,
            template_id: row.template_id,
            name: row.name,
            task_type: row.task_type,
            assigned_agent: row.assigned_agent,
            is_hitl: row.is_hitl,
            delay_value: row.delay_value,
            delay_unit: DelayUnit::from(row.delay_unit.as_str()),
            display_order: row.display_order,
            branch_condition: row.branch_condition.map(|j| j.0),
            action_config: row.action_config.0,
            on_failure: FailurePolicy::from(row.on_failure.as_str()),
        }
    }
}

// ============================================
// Instances, executions, notifications
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct InstanceRow {
    pub id: Uuid,
    pub template_id: Uuid,
    pub user_id: Uuid,
    pub industry: String,
    pub lead_id: Option<Uuid>,
    pub deal_id: Option<Uuid>,
    pub status: String,
    pub current_task_id: Option<Uuid>,
    pub metadata: JsonValue,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<InstanceRow> for WorkflowInstance {
    fn from(row: InstanceRow) -> Self {
        WorkflowInstance {
            id: row.id,
            template_id: row.template_id,
            user_id: row.user_id,
            industry: Industry::from(row.industry.as_str()),
            lead_id: row.lead_id,
            deal_id: row.deal_id,
            status: InstanceStatus::from(row.status.as_str()),
            current_task_id: row.current_task_id,
            metadata: row.metadata,
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ExecutionRow {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub task_id: Uuid,
    pub display_order: i32,
    pub status: String,
    pub scheduled_for: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<JsonValue>,
    pub error_message: Option<String>,
    pub hitl_approved_by: Option<Uuid>,
    pub hitl_note: Option<String>,
    pub agent_used: Option<String>,
}

impl From<ExecutionRow> for TaskExecution {
    fn from(row: ExecutionRow) -> Self {
        TaskExecution {
            id: row.id,
            instance_id: row.instance_id,
            task_id: row.task_id,
            display_order: row.display_order,
            status: ExecutionStatus::from(row.status.as_str()),
            scheduled_for: row.scheduled_for,
            started_at: row.started_at,
            completed_at: row.completed_at,
            result: row.result,
            error_message: row.error_message,
            hitl_approved_by: row.hitl_approved_by,
            hitl_note: row.hitl_note,
            agent_used: row.agent_used,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub execution_id: Uuid,
    pub task_name: String,
    pub workflow_name: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub urgency: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl From<NotificationRow> for HitlNotification {
    fn from(row: NotificationRow) -> Self {
        HitlNotification {
            id: row.id,
            user_id: row.user_id,
            execution_id: row.execution_id,
            task_name: row.task_name,
            workflow_name: row.workflow_name,
            contact_name: row.contact_name,
            contact_email: row.contact_email,
            contact_phone: row.contact_phone,
            urgency: row.urgency,
            status: NotificationStatus::from(row.status.as_str()),
            created_at: row.created_at,
            resolved_at: row.resolved_at,
        }
    }
}

// ============================================
// Auto-run bindings
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct AutoRunRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub employee_type: String,
    pub industry: String,
    pub event: String,
    pub workflow_id: Option<Uuid>,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<AutoRunRow> for AutoRunBinding {
    fn from(row: AutoRunRow) -> Self {
        AutoRunBinding {
            id: row.id,
            user_id: row.user_id,
            employee_type: row.employee_type,
            industry: Industry::from(row.industry.as_str()),
            event: TriggerEvent::from(row.event.as_str()),
            workflow_id: row.workflow_id,
            enabled: row.enabled,
            updated_at: row.updated_at,
        }
    }
}

// ============================================
// Campaigns
// ============================================

#[derive(Debug, Clone, FromRow)]
pub struct CampaignRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub channel: String,
    pub status: String,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
    pub sms_template: Option<String>,
    pub drip_steps: Json<Vec<DripStep>>,
    pub ab_test: Option<Json<AbTest>>,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Campaign {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            channel: CampaignChannel::from(row.channel.as_str()),
            status: CampaignStatus::from(row.status.as_str()),
            email_subject: row.email_subject,
            email_body: row.email_body,
            sms_template: row.sms_template,
            drip_steps: row.drip_steps.0,
            ab_test: row.ab_test.map(|j| j.0),
            total_recipients: row.total_recipients,
            sent_count: row.sent_count,
            failed_count: row.failed_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct EnrollmentRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub status: String,
    pub ab_variant: String,
    pub current_step: i32,
    pub next_send_at: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
}

impl From<EnrollmentRow> for CampaignEnrollment {
    fn from(row: EnrollmentRow) -> Self {
        CampaignEnrollment {
            id: row.id,
            campaign_id: row.campaign_id,
            lead_id: row.lead_id,
            status: EnrollmentStatus::from(row.status.as_str()),
            ab_variant: AbVariant::from(row.ab_variant.as_str()),
            current_step: row.current_step,
            next_send_at: row.next_send_at,
            enrolled_at: row.enrolled_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RecipientRow {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

impl From<RecipientRow> for CampaignRecipient {
    fn from(row: RecipientRow) -> Self {
        CampaignRecipient {
            id: row.id,
            campaign_id: row.campaign_id,
            lead_id: row.lead_id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            status: RecipientStatus::from(row.status.as_str()),
            error_message: row.error_message,
            sent_at: row.sent_at,
        }
    }
}
