// Database-backed store implementations
//
// DbStore implements every core store trait over `Database`, converting rows to
// core entities. Repository errors become `Error::Store`; missing rows on update
// become `Error::NotFound`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crmflow_core::{
    traits::{AutoRunStore, CampaignStore, LeadStore, WorkflowStore},
    ActivityRecord, AutoRunBinding, Campaign, CampaignEnrollment, CampaignRecipient,
    EnrollmentStatus, Error, HitlNotification, Industry, InstanceStatus, Lead,
    NotificationStatus, Result, TaskExecution, TriggerEvent, WorkflowInstance, WorkflowTemplate,
};
use uuid::Uuid;

use crate::repositories::Database;

fn store_err(e: anyhow::Error) -> Error {
    Error::store(e.to_string())
}

fn found(updated: bool, entity: &'static str, id: Uuid) -> Result<()> {
    if updated {
        Ok(())
    } else {
        Err(Error::not_found(entity, id))
    }
}

fn limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

// ============================================================================
// DbStore - all store traits over Postgres
// ============================================================================

/// Database-backed store
///
/// Used by the API and the worker as the engine's `Store`.
#[derive(Clone)]
pub struct DbStore {
    db: Database,
}

impl DbStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    async fn load_template(&self, row: crate::models::TemplateRow) -> Result<WorkflowTemplate> {
        let tasks = self.db.list_tasks(row.id).await.map_err(store_err)?;
        Ok(row.into_template(tasks))
    }
}

#[async_trait]
impl LeadStore for DbStore {
    async fn create_lead(&self, lead: Lead) -> Result<Lead> {
        let row = self.db.insert_lead(&lead).await.map_err(store_err)?;
        Ok(row.into())
    }

    async fn get_lead(&self, id: Uuid) -> Result<Option<Lead>> {
        let row = self.db.get_lead(id).await.map_err(store_err)?;
        Ok(row.map(Lead::from))
    }

    async fn update_lead(&self, lead: &Lead) -> Result<()> {
        let updated = self.db.update_lead(lead).await.map_err(store_err)?;
        found(updated, "Lead", lead.id)
    }

    async fn record_activity(&self, activity: ActivityRecord) -> Result<()> {
        self.db.insert_activity(&activity).await.map_err(store_err)
    }

    async fn list_activities(&self, lead_id: Uuid) -> Result<Vec<ActivityRecord>> {
        let rows = self.db.list_activities(lead_id).await.map_err(store_err)?;
        Ok(rows.into_iter().map(ActivityRecord::from).collect())
    }
}

#[async_trait]
impl WorkflowStore for DbStore {
    async fn create_template(&self, template: WorkflowTemplate) -> Result<WorkflowTemplate> {
        self.db.insert_template(&template).await.map_err(store_err)?;
        Ok(template)
    }

    async fn get_template(&self, id: Uuid) -> Result<Option<WorkflowTemplate>> {
        match self.db.get_template(id).await.map_err(store_err)? {
            Some(row) => Ok(Some(self.load_template(row).await?)),
            None => Ok(None),
        }
    }

    async fn list_templates(&self, user_id: Uuid) -> Result<Vec<WorkflowTemplate>> {
        let rows = self.db.list_templates(user_id).await.map_err(store_err)?;
        let mut templates = Vec::with_capacity(rows.len());
        for row in rows {
            templates.push(self.load_template(row).await?);
        }
        Ok(templates)
    }

    async fn set_template_active(&self, id: Uuid, active: bool) -> Result<()> {
        let updated = self
            .db
            .set_template_active(id, active)
            .await
            .map_err(store_err)?;
        found(updated, "Workflow template", id)
    }

    async fn create_instance(
        &self,
        instance: WorkflowInstance,
        executions: Vec<TaskExecution>,
    ) -> Result<WorkflowInstance> {
        let row = self
            .db
            .insert_instance(&instance, &executions)
            .await
            .map_err(store_err)?;
        Ok(row.into())
    }

    async fn get_instance(&self, id: Uuid) -> Result<Option<WorkflowInstance>> {
        let row = self.db.get_instance(id).await.map_err(store_err)?;
        Ok(row.map(WorkflowInstance::from))
    }

    async fn update_instance(&self, instance: &WorkflowInstance) -> Result<()> {
        let updated = self.db.update_instance(instance).await.map_err(store_err)?;
        found(updated, "Workflow instance", instance.id)
    }

    async fn list_instances(&self, user_id: Uuid) -> Result<Vec<WorkflowInstance>> {
        let rows = self.db.list_instances(user_id).await.map_err(store_err)?;
        Ok(rows.into_iter().map(WorkflowInstance::from).collect())
    }

    async fn list_template_instances(
        &self,
        template_id: Uuid,
        status: InstanceStatus,
    ) -> Result<Vec<WorkflowInstance>> {
        let rows = self
            .db
            .list_template_instances(template_id, status)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(WorkflowInstance::from).collect())
    }

    async fn get_execution(&self, id: Uuid) -> Result<Option<TaskExecution>> {
        let row = self.db.get_execution(id).await.map_err(store_err)?;
        Ok(row.map(TaskExecution::from))
    }

    async fn update_execution(&self, execution: &TaskExecution) -> Result<()> {
        let updated = self.db.update_execution(execution).await.map_err(store_err)?;
        found(updated, "Task execution", execution.id)
    }

    async fn list_executions(&self, instance_id: Uuid) -> Result<Vec<TaskExecution>> {
        let rows = self.db.list_executions(instance_id).await.map_err(store_err)?;
        Ok(rows.into_iter().map(TaskExecution::from).collect())
    }

    async fn due_executions(&self, now: DateTime<Utc>, n: usize) -> Result<Vec<TaskExecution>> {
        let rows = self
            .db
            .due_executions(now, limit(n))
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(TaskExecution::from).collect())
    }

    async fn create_notification(&self, notification: HitlNotification) -> Result<()> {
        self.db
            .insert_notification(&notification)
            .await
            .map_err(store_err)
    }

    async fn list_pending_notifications(&self, user_id: Uuid) -> Result<Vec<HitlNotification>> {
        let rows = self
            .db
            .list_pending_notifications(user_id)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(HitlNotification::from).collect())
    }

    async fn resolve_notifications(
        &self,
        execution_id: Uuid,
        status: NotificationStatus,
        resolved_at: DateTime<Utc>,
    ) -> Result<()> {
        self.db
            .resolve_notifications(execution_id, status, resolved_at)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

#[async_trait]
impl AutoRunStore for DbStore {
    async fn upsert_binding(&self, binding: AutoRunBinding) -> Result<AutoRunBinding> {
        let row = self.db.upsert_binding(&binding).await.map_err(store_err)?;
        Ok(row.into())
    }

    async fn matching_bindings(
        &self,
        user_id: Uuid,
        industry: Industry,
        event: TriggerEvent,
    ) -> Result<Vec<AutoRunBinding>> {
        let rows = self
            .db
            .matching_bindings(user_id, industry, event)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(AutoRunBinding::from).collect())
    }
}

#[async_trait]
impl CampaignStore for DbStore {
    async fn create_campaign(&self, campaign: Campaign) -> Result<Campaign> {
        let row = self.db.insert_campaign(&campaign).await.map_err(store_err)?;
        Ok(row.into())
    }

    async fn get_campaign(&self, id: Uuid) -> Result<Option<Campaign>> {
        let row = self.db.get_campaign(id).await.map_err(store_err)?;
        Ok(row.map(Campaign::from))
    }

    async fn update_campaign(&self, campaign: &Campaign) -> Result<()> {
        let updated = self.db.update_campaign(campaign).await.map_err(store_err)?;
        found(updated, "Campaign", campaign.id)
    }

    async fn increment_counters(&self, id: Uuid, sent: i64, failed: i64) -> Result<()> {
        let updated = self
            .db
            .increment_counters(id, sent, failed)
            .await
            .map_err(store_err)?;
        found(updated, "Campaign", id)
    }

    async fn get_enrollment(
        &self,
        campaign_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<CampaignEnrollment>> {
        let row = self
            .db
            .get_enrollment(campaign_id, lead_id)
            .await
            .map_err(store_err)?;
        Ok(row.map(CampaignEnrollment::from))
    }

    async fn save_enrollment(&self, enrollment: &CampaignEnrollment) -> Result<()> {
        self.db
            .upsert_enrollment(enrollment)
            .await
            .map_err(store_err)
    }

    async fn due_enrollments(
        &self,
        now: DateTime<Utc>,
        n: usize,
    ) -> Result<Vec<CampaignEnrollment>> {
        let rows = self
            .db
            .due_enrollments(now, limit(n))
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(CampaignEnrollment::from).collect())
    }

    async fn set_enrollments_status(
        &self,
        campaign_id: Uuid,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    ) -> Result<u64> {
        self.db
            .set_enrollments_status(campaign_id, from, to)
            .await
            .map_err(store_err)
    }

    async fn create_recipients(&self, recipients: Vec<CampaignRecipient>) -> Result<()> {
        self.db
            .insert_recipients(&recipients)
            .await
            .map_err(store_err)
    }

    async fn pending_recipients(&self, campaign_id: Uuid) -> Result<Vec<CampaignRecipient>> {
        let rows = self
            .db
            .pending_recipients(campaign_id)
            .await
            .map_err(store_err)?;
        Ok(rows.into_iter().map(CampaignRecipient::from).collect())
    }

    async fn update_recipient(&self, recipient: &CampaignRecipient) -> Result<()> {
        let updated = self.db.update_recipient(recipient).await.map_err(store_err)?;
        found(updated, "Campaign recipient", recipient.id)
    }
}

// ============================================================================
// Factory functions
// ============================================================================

/// Create a database-backed store
pub fn create_db_store(db: Database) -> DbStore {
    DbStore::new(db)
}
