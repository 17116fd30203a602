// Core traits for pluggable backends
//
// The engine, dispatcher and campaign service only talk to these traits:
// - In-memory implementations for development and testing (crate::memory)
// - PostgreSQL implementations for production (crmflow-storage)
// - Logging/recording channel implementations (crate::channels)

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::activity::ActivityRecord;
use crate::autorun::{AutoRunBinding, TriggerEvent};
use crate::campaign::{Campaign, CampaignEnrollment, CampaignRecipient, EnrollmentStatus};
use crate::error::Result;
use crate::industry::Industry;
use crate::instance::{
    HitlNotification, InstanceStatus, NotificationStatus, TaskExecution, WorkflowInstance,
};
use crate::lead::Lead;
use crate::template::WorkflowTemplate;

// ============================================================================
// LeadStore - CRM leads and executor side effects
// ============================================================================

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn create_lead(&self, lead: Lead) -> Result<Lead>;

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>>;

    /// Replace status, tags and custom fields of an existing lead
    async fn update_lead(&self, lead: &Lead) -> Result<()>;

    async fn record_activity(&self, activity: ActivityRecord) -> Result<()>;

    async fn list_activities(&self, lead_id: Uuid) -> Result<Vec<ActivityRecord>>;
}

// ============================================================================
// WorkflowStore - templates, instances, executions, HITL notifications
// ============================================================================

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Store a template together with its tasks
    async fn create_template(&self, template: WorkflowTemplate) -> Result<WorkflowTemplate>;

    /// Load a template with its tasks sorted by display_order
    async fn get_template(&self, id: Uuid) -> Result<Option<WorkflowTemplate>>;

    async fn list_templates(&self, user_id: Uuid) -> Result<Vec<WorkflowTemplate>>;

    async fn set_template_active(&self, id: Uuid, active: bool) -> Result<()>;

    /// Store a new instance and all of its executions
    async fn create_instance(
        &self,
        instance: WorkflowInstance,
        executions: Vec<TaskExecution>,
    ) -> Result<WorkflowInstance>;

    async fn get_instance(&self, id: Uuid) -> Result<Option<WorkflowInstance>>;

    async fn update_instance(&self, instance: &WorkflowInstance) -> Result<()>;

    async fn list_instances(&self, user_id: Uuid) -> Result<Vec<WorkflowInstance>>;

    async fn list_template_instances(
        &self,
        template_id: Uuid,
        status: InstanceStatus,
    ) -> Result<Vec<WorkflowInstance>>;

    async fn get_execution(&self, id: Uuid) -> Result<Option<TaskExecution>>;

    async fn update_execution(&self, execution: &TaskExecution) -> Result<()>;

    /// Executions of an instance sorted by display_order
    async fn list_executions(&self, instance_id: Uuid) -> Result<Vec<TaskExecution>>;

    /// PENDING executions that are the current task of an ACTIVE instance and due at `now`
    async fn due_executions(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<TaskExecution>>;

    async fn create_notification(&self, notification: HitlNotification) -> Result<()>;

    async fn list_pending_notifications(&self, user_id: Uuid) -> Result<Vec<HitlNotification>>;

    /// Resolve every PENDING notification of an execution
    async fn resolve_notifications(
        &self,
        execution_id: Uuid,
        status: NotificationStatus,
        resolved_at: DateTime<Utc>,
    ) -> Result<()>;
}

// ============================================================================
// AutoRunStore - event to workflow bindings
// ============================================================================

#[async_trait]
pub trait AutoRunStore: Send + Sync {
    /// Insert or replace the binding for (user, employee type, industry, event)
    async fn upsert_binding(&self, binding: AutoRunBinding) -> Result<AutoRunBinding>;

    /// Enabled bindings with a workflow for (user, industry, event)
    async fn matching_bindings(
        &self,
        user_id: Uuid,
        industry: Industry,
        event: TriggerEvent,
    ) -> Result<Vec<AutoRunBinding>>;
}

// ============================================================================
// CampaignStore - campaigns, enrollments, recipients
// ============================================================================

#[async_trait]
pub trait CampaignStore: Send + Sync {
    async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign>;

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>>;

    async fn update_campaign(&self, campaign: &Campaign) -> Result<()>;

    /// Add to the delivery counters without overwriting concurrent updates
    async fn increment_counters(&self, id: Uuid, sent: i64, failed: i64) -> Result<()>;

    async fn get_enrollment(
        &self,
        campaign_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<CampaignEnrollment>>;

    /// Insert or replace the enrollment for (campaign, lead)
    async fn save_enrollment(&self, enrollment: &CampaignEnrollment) -> Result<()>;

    /// ACTIVE enrollments of RUNNING campaigns with next_send_at <= now
    async fn due_enrollments(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CampaignEnrollment>>;

    async fn set_enrollments_status(
        &self,
        campaign_id: Uuid,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    ) -> Result<u64>;

    async fn create_recipients(&self, recipients: Vec<CampaignRecipient>) -> Result<()>;

    async fn pending_recipients(&self, campaign_id: Uuid) -> Result<Vec<CampaignRecipient>>;

    async fn update_recipient(&self, recipient: &CampaignRecipient) -> Result<()>;
}

/// Everything the engine needs from persistence
pub trait Store: LeadStore + WorkflowStore + AutoRunStore + CampaignStore {}

impl<T> Store for T where T: LeadStore + WorkflowStore + AutoRunStore + CampaignStore {}

// ============================================================================
// Outbound channels
// ============================================================================

/// SMS delivery; returns a provider message id
#[async_trait]
pub trait SmsSender: Send + Sync {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String>;
}

/// Email delivery; returns a provider message id
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<String>;
}

/// Outbound channels handed to executors and the campaign service
#[derive(Clone)]
pub struct Channels {
    pub sms: Arc<dyn SmsSender>,
    pub email: Arc<dyn EmailSender>,
}

impl Channels {
    pub fn new(sms: Arc<dyn SmsSender>, email: Arc<dyn EmailSender>) -> Self {
        Self { sms, email }
    }
}
