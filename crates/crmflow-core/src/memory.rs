//! In-memory implementation of the store traits for development and testing
//!
//! Provides the same semantics as the PostgreSQL implementation in crmflow-storage.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::activity::ActivityRecord;
use crate::autorun::{AutoRunBinding, TriggerEvent};
use crate::campaign::{
    Campaign, CampaignEnrollment, CampaignRecipient, CampaignStatus, EnrollmentStatus,
    RecipientStatus,
};
use crate::error::{Error, Result};
use crate::industry::Industry;
use crate::instance::{
    ExecutionStatus, HitlNotification, InstanceStatus, NotificationStatus, TaskExecution,
    WorkflowInstance,
};
use crate::lead::Lead;
use crate::template::WorkflowTemplate;
use crate::traits::{AutoRunStore, CampaignStore, LeadStore, WorkflowStore};

/// In-memory store
///
/// # Example
///
/// ```
/// use crmflow_core::InMemoryStore;
///
/// let store = InMemoryStore::new();
/// assert_eq!(store.instance_count(), 0);
/// ```
#[derive(Default)]
pub struct InMemoryStore {
    leads: RwLock<HashMap<Uuid, Lead>>,
    activities: RwLock<Vec<ActivityRecord>>,
    templates: RwLock<HashMap<Uuid, WorkflowTemplate>>,
    instances: RwLock<HashMap<Uuid, WorkflowInstance>>,
    executions: RwLock<HashMap<Uuid, TaskExecution>>,
    notifications: RwLock<Vec<HitlNotification>>,
    bindings: RwLock<Vec<AutoRunBinding>>,
    campaigns: RwLock<HashMap<Uuid, Campaign>>,
    enrollments: RwLock<HashMap<(Uuid, Uuid), CampaignEnrollment>>,
    recipients: RwLock<HashMap<Uuid, CampaignRecipient>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    /// All recipients of a campaign, in creation order
    pub fn recipients(&self, campaign_id: Uuid) -> Vec<CampaignRecipient> {
        let mut all: Vec<_> = self
            .recipients
            .read()
            .values()
            .filter(|r| r.campaign_id == campaign_id)
            .cloned()
            .collect();
        all.sort_by_key(|r| r.id);
        all
    }

    pub fn enrollments(&self, campaign_id: Uuid) -> Vec<CampaignEnrollment> {
        self.enrollments
            .read()
            .values()
            .filter(|e| e.campaign_id == campaign_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LeadStore for InMemoryStore {
    async fn create_lead(&self, lead: Lead) -> Result<Lead> {
        self.leads.write().insert(lead.id, lead.clone());
        Ok(lead)
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>> {
        Ok(self.leads.read().get(&id).cloned())
    }

    async fn update_lead(&self, lead: &Lead) -> Result<()> {
        let mut leads = self.leads.write();
        let existing = leads
            .get_mut(&lead.id)
            .ok_or_else(|| Error::not_found("Lead", lead.id))?;
        existing.status = lead.status.clone();
        existing.tags = lead.tags.clone();
        existing.custom_fields = lead.custom_fields.clone();
        Ok(())
    }

    async fn record_activity(&self, activity: ActivityRecord) -> Result<()> {
        self.activities.write().push(activity);
        Ok(())
    }

    async fn list_activities(&self, lead_id: Uuid) -> Result<Vec<ActivityRecord>> {
        Ok(self
            .activities
            .read()
            .iter()
            .filter(|a| a.lead_id == Some(lead_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn create_template(&self, mut template: WorkflowTemplate) -> Result<WorkflowTemplate> {
        template.tasks.sort_by_key(|t| t.display_order);
        self.templates.write().insert(template.id, template.clone());
        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<WorkflowTemplate>> {
        Ok(self.templates.read().get(&id).cloned())
    }

    async fn list_templates(&self, user_id: Uuid) -> Result<Vec<WorkflowTemplate>> {
        let mut templates: Vec<_> = self
            .templates
            .read()
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        templates.sort_by_key(|t| t.created_at);
        Ok(templates)
    }

    async fn set_template_active(&self, id: Uuid, active: bool) -> Result<()> {
        let mut templates = self.templates.write();
        let template = templates
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("Workflow template", id))?;
        template.is_active = active;
        template.updated_at = Utc::now();
        Ok(())
    }

    async fn create_instance(
        &self,
        instance: WorkflowInstance,
        executions: Vec<TaskExecution>,
    ) -> Result<WorkflowInstance> {
        self.instances.write().insert(instance.id, instance.clone());
        let mut stored = self.executions.write();
        for execution in executions {
            stored.insert(execution.id, execution);
        }
        Ok(instance)
    }

    async fn get_instance(&self, id: Uuid) -> Result<Option<WorkflowInstance>> {
        Ok(self.instances.read().get(&id).cloned())
    }

    async fn update_instance(&self, instance: &WorkflowInstance) -> Result<()> {
        let mut instances = self.instances.write();
        if !instances.contains_key(&instance.id) {
            return Err(Error::not_found("Workflow instance", instance.id));
        }
        instances.insert(instance.id, instance.clone());
        Ok(())
    }

    async fn list_instances(&self, user_id: Uuid) -> Result<Vec<WorkflowInstance>> {
        let mut instances: Vec<_> = self
            .instances
            .read()
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        instances.sort_by_key(|i| i.started_at);
        Ok(instances)
    }

    async fn list_template_instances(
        &self,
        template_id: Uuid,
        status: InstanceStatus,
    ) -> Result<Vec<WorkflowInstance>> {
        Ok(self
            .instances
            .read()
            .values()
            .filter(|i| i.template_id == template_id && i.status == status)
            .cloned()
            .collect())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<TaskExecution>> {
        Ok(self.executions.read().get(&id).cloned())
    }

    async fn update_execution(&self, execution: &TaskExecution) -> Result<()> {
        let mut executions = self.executions.write();
        if !executions.contains_key(&execution.id) {
            return Err(Error::not_found("Task execution", execution.id));
        }
        executions.insert(execution.id, execution.clone());
        Ok(())
    }

    async fn list_executions(&self, instance_id: Uuid) -> Result<Vec<TaskExecution>> {
        let mut executions: Vec<_> = self
            .executions
            .read()
            .values()
            .filter(|e| e.instance_id == instance_id)
            .cloned()
            .collect();
        executions.sort_by_key(|e| e.display_order);
        Ok(executions)
    }

    async fn due_executions(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<TaskExecution>> {
        let instances = self.instances.read();
        let mut due: Vec<_> = self
            .executions
            .read()
            .values()
            .filter(|e| e.status == ExecutionStatus::Pending && e.scheduled_for <= now)
            .filter(|e| {
                instances.get(&e.instance_id).is_some_and(|i| {
                    i.status == InstanceStatus::Active && i.current_task_id == Some(e.task_id)
                })
            })
            .cloned()
            .collect();
        due.sort_by_key(|e| e.scheduled_for);
        due.truncate(limit);
        Ok(due)
    }

    async fn create_notification(&self, notification: HitlNotification) -> Result<()> {
        self.notifications.write().push(notification);
        Ok(())
    }

    async fn list_pending_notifications(&self, user_id: Uuid) -> Result<Vec<HitlNotification>> {
        Ok(self
            .notifications
            .read()
            .iter()
            .filter(|n| n.user_id == user_id && n.status == NotificationStatus::Pending)
            .cloned()
            .collect())
    }

    async fn resolve_notifications(
        &self,
        execution_id: Uuid,
        status: NotificationStatus,
        resolved_at: DateTime<Utc>,
    ) -> Result<()> {
        for n in self.notifications.write().iter_mut() {
            if n.execution_id == execution_id && n.status == NotificationStatus::Pending {
                n.status = status;
                n.resolved_at = Some(resolved_at);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl AutoRunStore for InMemoryStore {
    async fn upsert_binding(&self, binding: AutoRunBinding) -> Result<AutoRunBinding> {
        let mut bindings = self.bindings.write();
        if let Some(existing) = bindings.iter_mut().find(|b| b.key() == binding.key()) {
            existing.workflow_id = binding.workflow_id;
            existing.enabled = binding.enabled;
            existing.updated_at = binding.updated_at;
            return Ok(existing.clone());
        }
        bindings.push(binding.clone());
        Ok(binding)
    }

    async fn matching_bindings(
        &self,
        user_id: Uuid,
        industry: Industry,
        event: TriggerEvent,
    ) -> Result<Vec<AutoRunBinding>> {
        Ok(self
            .bindings
            .read()
            .iter()
            .filter(|b| b.matches(user_id, industry, event))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign> {
        self.campaigns.write().insert(campaign.id, campaign.clone());
        Ok(campaign)
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>> {
        Ok(self.campaigns.read().get(&id).cloned())
    }

    async fn update_campaign(&self, campaign: &Campaign) -> Result<()> {
        let mut campaigns = self.campaigns.write();
        let stored = campaigns
            .get_mut(&campaign.id)
            .ok_or_else(|| Error::not_found("Campaign", campaign.id))?;
        // Counters only move through increment_counters
        stored.name = campaign.name.clone();
        stored.channel = campaign.channel;
        stored.status = campaign.status;
        stored.email_subject = campaign.email_subject.clone();
        stored.email_body = campaign.email_body.clone();
        stored.sms_template = campaign.sms_template.clone();
        stored.drip_steps = campaign.drip_steps.clone();
        stored.ab_test = campaign.ab_test.clone();
        stored.total_recipients = stored.total_recipients.max(campaign.total_recipients);
        stored.updated_at = campaign.updated_at;
        Ok(())
    }

    async fn increment_counters(&self, id: Uuid, sent: i64, failed: i64) -> Result<()> {
        let mut campaigns = self.campaigns.write();
        let campaign = campaigns
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("Campaign", id))?;
        campaign.sent_count += sent;
        campaign.failed_count += failed;
        campaign.updated_at = Utc::now();
        Ok(())
    }

    async fn get_enrollment(
        &self,
        campaign_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<CampaignEnrollment>> {
        Ok(self.enrollments.read().get(&(campaign_id, lead_id)).cloned())
    }

    async fn save_enrollment(&self, enrollment: &CampaignEnrollment) -> Result<()> {
        self.enrollments
            .write()
            .insert((enrollment.campaign_id, enrollment.lead_id), enrollment.clone());
        Ok(())
    }

    async fn due_enrollments(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CampaignEnrollment>> {
        let campaigns = self.campaigns.read();
        let mut due: Vec<_> = self
            .enrollments
            .read()
            .values()
            .filter(|e| e.status == EnrollmentStatus::Active)
            .filter(|e| e.next_send_at.is_some_and(|at| at <= now))
            .filter(|e| {
                campaigns
                    .get(&e.campaign_id)
                    .is_some_and(|c| c.status == CampaignStatus::Running)
            })
            .cloned()
            .collect();
        due.sort_by_key(|e| e.next_send_at);
        due.truncate(limit);
        Ok(due)
    }

    async fn set_enrollments_status(
        &self,
        campaign_id: Uuid,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    ) -> Result<u64> {
        let mut changed = 0;
        for e in self.enrollments.write().values_mut() {
            if e.campaign_id == campaign_id && e.status == from {
                e.status = to;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn create_recipients(&self, recipients: Vec<CampaignRecipient>) -> Result<()> {
        let mut stored = self.recipients.write();
        for r in recipients {
            stored.insert(r.id, r);
        }
        Ok(())
    }

    async fn pending_recipients(&self, campaign_id: Uuid) -> Result<Vec<CampaignRecipient>> {
        Ok(self
            .recipients(campaign_id)
            .into_iter()
            .filter(|r| r.status == RecipientStatus::Pending)
            .collect())
    }

    async fn update_recipient(&self, recipient: &CampaignRecipient) -> Result<()> {
        let mut recipients = self.recipients.write();
        if !recipients.contains_key(&recipient.id) {
            return Err(Error::not_found("Campaign recipient", recipient.id));
        }
        recipients.insert(recipient.id, recipient.clone());
        Ok(())
    }
}
