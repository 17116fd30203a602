// Repository layer for database operations

use anyhow::Result;
use chrono::{DateTime, Utc};
use crmflow_core::{
    ActivityRecord, AutoRunBinding, Campaign, CampaignEnrollment, CampaignRecipient,
    EnrollmentStatus, HitlNotification, Industry, InstanceStatus, Lead, NotificationStatus,
    TaskExecution, TriggerEvent, WorkflowInstance, WorkflowTemplate,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::*;

const LEAD_COLUMNS: &str =
    "id, user_id, business_name, contact_person, email, phone, status, tags, custom_fields, created_at";
const TEMPLATE_COLUMNS: &str =
    "id, user_id, industry, name, description, is_active, created_at, updated_at";
const TASK_COLUMNS: &str = "id, template_id, name, task_type, assigned_agent, is_hitl, delay_value, delay_unit, display_order, branch_condition, action_config, on_failure";
const INSTANCE_COLUMNS: &str = "id, template_id, user_id, industry, lead_id, deal_id, status, current_task_id, metadata, started_at, completed_at";
const EXECUTION_COLUMNS: &str = "id, instance_id, task_id, display_order, status, scheduled_for, started_at, completed_at, result, error_message, hitl_approved_by, hitl_note, agent_used";
const NOTIFICATION_COLUMNS: &str = "id, user_id, execution_id, task_name, workflow_name, contact_name, contact_email, contact_phone, urgency, status, created_at, resolved_at";
const CAMPAIGN_COLUMNS: &str = "id, user_id, name, channel, status, email_subject, email_body, sms_template, drip_steps, ab_test, total_recipients, sent_count, failed_count, created_at, updated_at";
const ENROLLMENT_COLUMNS: &str =
    "id, campaign_id, lead_id, status, ab_variant, current_step, next_send_at, enrolled_at";
const RECIPIENT_COLUMNS: &str =
    "id, campaign_id, lead_id, name, email, phone, status, error_message, sent_at";

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create database connection from URL
    pub async fn from_url(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply embedded migrations
    pub async fn migrate(&self) -> Result<()> {
        crate::MIGRATOR.run(&self.pool).await?;
        Ok(())
    }

    // ============================================
    // Leads and activities
    // ============================================

    pub async fn insert_lead(&self, lead: &Lead) -> Result<LeadRow> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            INSERT INTO leads (id, user_id, business_name, contact_person, email, phone, status, tags, custom_fields, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(lead.id)
        .bind(lead.user_id)
        .bind(&lead.business_name)
        .bind(&lead.contact_person)
        .bind(&lead.email)
        .bind(&lead.phone)
        .bind(&lead.status)
        .bind(&lead.tags)
        .bind(&lead.custom_fields)
        .bind(lead.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_lead(&self, id: Uuid) -> Result<Option<LeadRow>> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Returns false when no lead matched
    pub async fn update_lead(&self, lead: &Lead) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE leads
            SET status = $2, tags = $3, custom_fields = $4
            WHERE id = $1
            "#,
        )
        .bind(lead.id)
        .bind(&lead.status)
        .bind(&lead.tags)
        .bind(&lead.custom_fields)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_activity(&self, activity: &ActivityRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO activities (id, user_id, lead_id, kind, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(activity.id)
        .bind(activity.user_id)
        .bind(activity.lead_id)
        .bind(&activity.kind)
        .bind(&activity.payload)
        .bind(activity.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_activities(&self, lead_id: Uuid) -> Result<Vec<ActivityRow>> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, user_id, lead_id, kind, payload, created_at
            FROM activities
            WHERE lead_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Workflow templates
    // ============================================

    /// Insert the template and its tasks in one transaction
    pub async fn insert_template(&self, template: &WorkflowTemplate) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO workflow_templates (id, user_id, industry, name, description, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(template.id)
        .bind(template.user_id)
        .bind(template.industry.to_string())
        .bind(&template.name)
        .bind(&template.description)
        .bind(template.is_active)
        .bind(template.created_at)
        .bind(template.updated_at)
        .execute(&mut *tx)
        .await?;

        for task in &template.tasks {
            sqlx::query(
                r#"
                INSERT INTO workflow_tasks (id, template_id, name, task_type, assigned_agent, is_hitl, delay_value, delay_unit, display_order, branch_condition, action_config, on_failure)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                "#,
            )
            .bind(task.id)
            .bind(template.id)
            .bind(&task.name)
            .bind(&task.task_type)
            .bind(&task.assigned_agent)
            .bind(task.is_hitl)
            .bind(task.delay_value)
            .bind(task.delay_unit.to_string())
            .bind(task.display_order)
            .bind(task.branch_condition.as_ref().map(Json))
            .bind(Json(&task.action_config))
            .bind(task.on_failure.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn get_template(&self, id: Uuid) -> Result<Option<TemplateRow>> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM workflow_templates WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn list_templates(&self, user_id: Uuid) -> Result<Vec<TemplateRow>> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM workflow_templates WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn list_tasks(&self, template_id: Uuid) -> Result<Vec<TaskRow>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM workflow_tasks WHERE template_id = $1 ORDER BY display_order ASC"
        ))
        .bind(template_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn set_template_active(&self, id: Uuid, active: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE workflow_templates SET is_active = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(active)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // ============================================
    // Instances and executions
    // ============================================

    /// Insert the instance and all of its executions in one transaction
    pub async fn insert_instance(
        &self,
        instance: &WorkflowInstance,
        executions: &[TaskExecution],
    ) -> Result<InstanceRow> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, InstanceRow>(&format!(
            r#"
            INSERT INTO workflow_instances (id, template_id, user_id, industry, lead_id, deal_id, status, current_task_id, metadata, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {INSTANCE_COLUMNS}
            "#
        ))
        .bind(instance.id)
        .bind(instance.template_id)
        .bind(instance.user_id)
        .bind(instance.industry.to_string())
        .bind(instance.lead_id)
        .bind(instance.deal_id)
        .bind(instance.status.to_string())
        .bind(instance.current_task_id)
        .bind(&instance.metadata)
        .bind(instance.started_at)
        .bind(instance.completed_at)
        .fetch_one(&mut *tx)
        .await?;

        for execution in executions {
            sqlx::query(
                r#"
                INSERT INTO task_executions (id, instance_id, task_id, display_order, status, scheduled_for)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(execution.id)
            .bind(instance.id)
            .bind(execution.task_id)
            .bind(execution.display_order)
            .bind(execution.status.to_string())
            .bind(execution.scheduled_for)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(row)
    }

    pub async fn get_instance(&self, id: Uuid) -> Result<Option<InstanceRow>> {
        let row = sqlx::query_as::<_, InstanceRow>(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM workflow_instances WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_instance(&self, instance: &WorkflowInstance) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_instances
            SET status = $2, current_task_id = $3, metadata = $4, completed_at = $5
            WHERE id = $1
            "#,
        )
        .bind(instance.id)
        .bind(instance.status.to_string())
        .bind(instance.current_task_id)
        .bind(&instance.metadata)
        .bind(instance.completed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_instances(&self, user_id: Uuid) -> Result<Vec<InstanceRow>> {
        let rows = sqlx::query_as::<_, InstanceRow>(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM workflow_instances WHERE user_id = $1 ORDER BY started_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn list_template_instances(
        &self,
        template_id: Uuid,
        status: InstanceStatus,
    ) -> Result<Vec<InstanceRow>> {
        let rows = sqlx::query_as::<_, InstanceRow>(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM workflow_instances WHERE template_id = $1 AND status = $2"
        ))
        .bind(template_id)
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn get_execution(&self, id: Uuid) -> Result<Option<ExecutionRow>> {
        let row = sqlx::query_as::<_, ExecutionRow>(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM task_executions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn update_execution(&self, execution: &TaskExecution) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE task_executions
            SET
                status = $2,
                scheduled_for = $3,
                started_at = $4,
                completed_at = $5,
                result = $6,
                error_message = $7,
                hitl_approved_by = $8,
                hitl_note = $9,
                agent_used = $10
            WHERE id = $1
            "#,
        )
        .bind(execution.id)
        .bind(execution.status.to_string())
        .bind(execution.scheduled_for)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(&execution.result)
        .bind(&execution.error_message)
        .bind(execution.hitl_approved_by)
        .bind(&execution.hitl_note)
        .bind(&execution.agent_used)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_executions(&self, instance_id: Uuid) -> Result<Vec<ExecutionRow>> {
        let rows = sqlx::query_as::<_, ExecutionRow>(&format!(
            "SELECT {EXECUTION_COLUMNS} FROM task_executions WHERE instance_id = $1 ORDER BY display_order ASC"
        ))
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// PENDING executions that are the current task of an ACTIVE instance.
    /// HITL-gated executions are AWAITING_HITL and never match.
    pub async fn due_executions(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<ExecutionRow>> {
        let rows = sqlx::query_as::<_, ExecutionRow>(
            r#"
            SELECT e.id, e.instance_id, e.task_id, e.display_order, e.status, e.scheduled_for,
                   e.started_at, e.completed_at, e.result, e.error_message, e.hitl_approved_by,
                   e.hitl_note, e.agent_used
            FROM task_executions e
            JOIN workflow_instances i ON i.id = e.instance_id
            WHERE e.status = 'PENDING'
              AND e.scheduled_for <= $1
              AND i.status = 'ACTIVE'
              AND i.current_task_id = e.task_id
            ORDER BY e.scheduled_for ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn insert_notification(&self, n: &HitlNotification) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO hitl_notifications (id, user_id, execution_id, task_name, workflow_name, contact_name, contact_email, contact_phone, urgency, status, created_at, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(n.id)
        .bind(n.user_id)
        .bind(n.execution_id)
        .bind(&n.task_name)
        .bind(&n.workflow_name)
        .bind(&n.contact_name)
        .bind(&n.contact_email)
        .bind(&n.contact_phone)
        .bind(&n.urgency)
        .bind(n.status.to_string())
        .bind(n.created_at)
        .bind(n.resolved_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn list_pending_notifications(&self, user_id: Uuid) -> Result<Vec<NotificationRow>> {
        let rows = sqlx::query_as::<_, NotificationRow>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM hitl_notifications WHERE user_id = $1 AND status = 'PENDING' ORDER BY created_at ASC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn resolve_notifications(
        &self,
        execution_id: Uuid,
        status: NotificationStatus,
        resolved_at: DateTime<Utc>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE hitl_notifications
            SET status = $2, resolved_at = $3
            WHERE execution_id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(execution_id)
        .bind(status.to_string())
        .bind(resolved_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    // ============================================
    // Auto-run bindings
    // ============================================

    pub async fn upsert_binding(&self, binding: &AutoRunBinding) -> Result<AutoRunRow> {
        let row = sqlx::query_as::<_, AutoRunRow>(
            r#"
            INSERT INTO auto_run_bindings (id, user_id, employee_type, industry, event, workflow_id, enabled, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, employee_type, industry, event) DO UPDATE
            SET workflow_id = EXCLUDED.workflow_id,
                enabled = EXCLUDED.enabled,
                updated_at = EXCLUDED.updated_at
            RETURNING id, user_id, employee_type, industry, event, workflow_id, enabled, updated_at
            "#,
        )
        .bind(binding.id)
        .bind(binding.user_id)
        .bind(&binding.employee_type)
        .bind(binding.industry.to_string())
        .bind(binding.event.to_string())
        .bind(binding.workflow_id)
        .bind(binding.enabled)
        .bind(binding.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn matching_bindings(
        &self,
        user_id: Uuid,
        industry: Industry,
        event: TriggerEvent,
    ) -> Result<Vec<AutoRunRow>> {
        let rows = sqlx::query_as::<_, AutoRunRow>(
            r#"
            SELECT id, user_id, employee_type, industry, event, workflow_id, enabled, updated_at
            FROM auto_run_bindings
            WHERE user_id = $1 AND industry = $2 AND event = $3
              AND enabled = TRUE AND workflow_id IS NOT NULL
            ORDER BY employee_type ASC
            "#,
        )
        .bind(user_id)
        .bind(industry.to_string())
        .bind(event.to_string())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // ============================================
    // Campaigns
    // ============================================

    pub async fn insert_campaign(&self, c: &Campaign) -> Result<CampaignRow> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            r#"
            INSERT INTO campaigns (id, user_id, name, channel, status, email_subject, email_body, sms_template, drip_steps, ab_test, total_recipients, sent_count, failed_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING {CAMPAIGN_COLUMNS}
            "#
        ))
        .bind(c.id)
        .bind(c.user_id)
        .bind(&c.name)
        .bind(c.channel.to_string())
        .bind(c.status.to_string())
        .bind(&c.email_subject)
        .bind(&c.email_body)
        .bind(&c.sms_template)
        .bind(Json(&c.drip_steps))
        .bind(c.ab_test.as_ref().map(Json))
        .bind(c.total_recipients)
        .bind(c.sent_count)
        .bind(c.failed_count)
        .bind(c.created_at)
        .bind(c.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn get_campaign(&self, id: Uuid) -> Result<Option<CampaignRow>> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// Update editable fields and status; counters are left to `increment_counters`
    /// except total_recipients, which only grows when a send starts
    pub async fn update_campaign(&self, c: &Campaign) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET
                name = $2,
                channel = $3,
                status = $4,
                email_subject = $5,
                email_body = $6,
                sms_template = $7,
                drip_steps = $8,
                ab_test = $9,
                total_recipients = GREATEST(total_recipients, $10),
                updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(c.id)
        .bind(&c.name)
        .bind(c.channel.to_string())
        .bind(c.status.to_string())
        .bind(&c.email_subject)
        .bind(&c.email_body)
        .bind(&c.sms_template)
        .bind(Json(&c.drip_steps))
        .bind(c.ab_test.as_ref().map(Json))
        .bind(c.total_recipients)
        .bind(c.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn increment_counters(&self, id: Uuid, sent: i64, failed: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET sent_count = sent_count + $2, failed_count = failed_count + $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sent)
        .bind(failed)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn get_enrollment(
        &self,
        campaign_id: Uuid,
        lead_id: Uuid,
    ) -> Result<Option<EnrollmentRow>> {
        let row = sqlx::query_as::<_, EnrollmentRow>(&format!(
            "SELECT {ENROLLMENT_COLUMNS} FROM campaign_enrollments WHERE campaign_id = $1 AND lead_id = $2"
        ))
        .bind(campaign_id)
        .bind(lead_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    pub async fn upsert_enrollment(&self, e: &CampaignEnrollment) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO campaign_enrollments (id, campaign_id, lead_id, status, ab_variant, current_step, next_send_at, enrolled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (campaign_id, lead_id) DO UPDATE
            SET id = EXCLUDED.id,
                status = EXCLUDED.status,
                ab_variant = EXCLUDED.ab_variant,
                current_step = EXCLUDED.current_step,
                next_send_at = EXCLUDED.next_send_at,
                enrolled_at = EXCLUDED.enrolled_at
            "#,
        )
        .bind(e.id)
        .bind(e.campaign_id)
        .bind(e.lead_id)
        .bind(e.status.to_string())
        .bind(e.ab_variant.to_string())
        .bind(e.current_step)
        .bind(e.next_send_at)
        .bind(e.enrolled_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn due_enrollments(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<EnrollmentRow>> {
        let rows = sqlx::query_as::<_, EnrollmentRow>(
            r#"
            SELECT e.id, e.campaign_id, e.lead_id, e.status, e.ab_variant, e.current_step,
                   e.next_send_at, e.enrolled_at
            FROM campaign_enrollments e
            JOIN campaigns c ON c.id = e.campaign_id
            WHERE e.status = 'ACTIVE'
              AND e.next_send_at IS NOT NULL
              AND e.next_send_at <= $1
              AND c.status = 'RUNNING'
            ORDER BY e.next_send_at ASC
            LIMIT $2
            "#,
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn set_enrollments_status(
        &self,
        campaign_id: Uuid,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE campaign_enrollments SET status = $3 WHERE campaign_id = $1 AND status = $2",
        )
        .bind(campaign_id)
        .bind(from.to_string())
        .bind(to.to_string())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn insert_recipients(&self, recipients: &[CampaignRecipient]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for r in recipients {
            sqlx::query(
                r#"
                INSERT INTO campaign_recipients (id, campaign_id, lead_id, name, email, phone, status, error_message, sent_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(r.id)
            .bind(r.campaign_id)
            .bind(r.lead_id)
            .bind(&r.name)
            .bind(&r.email)
            .bind(&r.phone)
            .bind(r.status.to_string())
            .bind(&r.error_message)
            .bind(r.sent_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn pending_recipients(&self, campaign_id: Uuid) -> Result<Vec<RecipientRow>> {
        let rows = sqlx::query_as::<_, RecipientRow>(&format!(
            "SELECT {RECIPIENT_COLUMNS} FROM campaign_recipients WHERE campaign_id = $1 AND status = 'PENDING' ORDER BY id ASC"
        ))
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn update_recipient(&self, r: &CampaignRecipient) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_recipients
            SET status = $2, error_message = $3, sent_at = $4
            WHERE id = $1
            "#,
        )
        .bind(r.id)
        .bind(r.status.to_string())
        .bind(&r.error_message)
        .bind(r.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
