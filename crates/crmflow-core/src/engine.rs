// Workflow engine: instance starter and step walker
//
// Executions are created up front, one per task, all PENDING. The instance's
// current_task_id points at the single execution that may run next; the walker
// only ever acts on that execution, so later tasks cannot run early and a HITL
// gate cannot be bypassed by the poller.
//
// Walking an execution:
//   branch condition unmet      -> SKIPPED, advance
//   HITL task not yet APPROVED  -> AWAITING_HITL + notification, stop
//   otherwise                   -> IN_PROGRESS -> executor -> COMPLETED | FAILED
//   FAILED with HALT policy     -> instance FAILED, stop
// Advancing schedules the next PENDING execution at now + its delay and runs it
// inline when the delay is zero; the worker picks up the rest.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::executors::{ActionContext, ExecutorRegistry};
use crate::instance::{
    ExecutionStatus, HitlNotification, InstanceDetail, InstanceStatus, NotificationStatus,
    StartInstance, TaskExecution, WorkflowInstance, WorkflowStats,
};
use crate::lead::Lead;
use crate::template::{CreateTemplate, FailurePolicy, WorkflowTask, WorkflowTemplate};
use crate::traits::{Channels, Store};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// One execution touched during a walk
#[derive(Debug, Clone, Serialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StepRecord {
    pub execution_id: Uuid,
    pub task_id: Uuid,
    pub status: ExecutionStatus,
}

/// What a walk did
#[derive(Debug, Clone, Serialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct StepReport {
    pub instance_id: Uuid,
    pub instance_status: InstanceStatus,
    pub steps: Vec<StepRecord>,
    /// Execution left for the worker, with the time it becomes due
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_execution_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
}

impl StepReport {
    fn new(instance: &WorkflowInstance) -> Self {
        Self {
            instance_id: instance.id,
            instance_status: instance.status,
            steps: vec![],
            next_execution_id: None,
            next_run_at: None,
        }
    }

    fn push(&mut self, execution: &TaskExecution) {
        self.steps.push(StepRecord {
            execution_id: execution.id,
            task_id: execution.task_id,
            status: execution.status,
        });
    }

    /// Status of the last execution acted on, if any
    pub fn last_status(&self) -> Option<ExecutionStatus> {
        self.steps.last().map(|s| s.status)
    }
}

/// Workflow engine over a store and outbound channels
pub struct WorkflowEngine {
    store: Arc<dyn Store>,
    channels: Channels,
    executors: ExecutorRegistry,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(store: Arc<dyn Store>, channels: Channels) -> Self {
        Self {
            store,
            channels,
            executors: ExecutorRegistry::default(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_executors(mut self, executors: ExecutorRegistry) -> Self {
        self.executors = executors;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn channels(&self) -> &Channels {
        &self.channels
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // Templates
    // ========================================================================

    pub async fn create_template(
        &self,
        user_id: Uuid,
        req: CreateTemplate,
    ) -> Result<WorkflowTemplate> {
        if req.name.trim().is_empty() {
            return Err(Error::rule("Template name is required"));
        }
        if req.tasks.iter().any(|t| t.name.trim().is_empty()) {
            return Err(Error::rule("Every task needs a name"));
        }
        for task in &req.tasks {
            task.delay_unit.validate(task.delay_value)?;
        }
        let template = self.store.create_template(req.into_template(user_id)).await?;
        info!(template_id = %template.id, tasks = template.tasks.len(), "Workflow template created");
        Ok(template)
    }

    pub async fn list_templates(&self, user_id: Uuid) -> Result<Vec<WorkflowTemplate>> {
        self.store.list_templates(user_id).await
    }

    async fn owned_template(&self, template_id: Uuid, user_id: Uuid) -> Result<WorkflowTemplate> {
        let template = self
            .store
            .get_template(template_id)
            .await?
            .ok_or_else(|| Error::not_found("Workflow template", template_id))?;
        if template.user_id != user_id {
            return Err(Error::forbidden("Workflow template belongs to another user"));
        }
        Ok(template)
    }

    /// Activate or deactivate a template; deactivation cancels its ACTIVE instances
    #[instrument(skip(self))]
    pub async fn set_template_active(
        &self,
        template_id: Uuid,
        user_id: Uuid,
        active: bool,
    ) -> Result<WorkflowTemplate> {
        let mut template = self.owned_template(template_id, user_id).await?;
        self.store.set_template_active(template_id, active).await?;
        template.is_active = active;

        if !active {
            let running = self
                .store
                .list_template_instances(template_id, InstanceStatus::Active)
                .await?;
            for instance in &running {
                self.cancel_all(instance.clone()).await?;
            }
            info!(cancelled = running.len(), "Template deactivated");
        }
        Ok(template)
    }

    // ========================================================================
    // Instances
    // ========================================================================

    /// Create an instance and its executions, running the first task inline if it has no delay
    #[instrument(skip(self, req), fields(template_id = %req.template_id))]
    pub async fn start_instance(&self, user_id: Uuid, req: StartInstance) -> Result<WorkflowInstance> {
        let template = self.owned_template(req.template_id, user_id).await?;
        if !template.is_active {
            return Err(Error::rule("Workflow template is not active"));
        }
        if template.tasks.is_empty() {
            return Err(Error::rule("Workflow template has no tasks"));
        }

        if let Some(lead_id) = req.lead_id {
            let lead = self
                .store
                .get_lead(lead_id)
                .await?
                .ok_or_else(|| Error::not_found("Lead", lead_id))?;
            if lead.user_id != user_id {
                return Err(Error::forbidden("Lead belongs to another user"));
            }
        }

        let mut metadata = match req.metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        metadata
            .entry("trigger_type")
            .or_insert_with(|| json!("manual"));

        let now = Utc::now();
        let first = &template.tasks[0];
        let instance = WorkflowInstance {
            id: Uuid::now_v7(),
            template_id: template.id,
            user_id,
            industry: template.industry,
            lead_id: req.lead_id,
            deal_id: req.deal_id,
            status: InstanceStatus::Active,
            current_task_id: Some(first.id),
            metadata: Value::Object(metadata),
            started_at: now,
            completed_at: None,
        };

        // Provisional schedule; each later step is rescheduled when it becomes current
        let mut at = now;
        let executions: Vec<TaskExecution> = template
            .tasks
            .iter()
            .map(|task| {
                at += task.delay();
                TaskExecution::pending(instance.id, task, at)
            })
            .collect();
        let first_execution = executions[0].id;

        let instance = self.store.create_instance(instance, executions).await?;
        info!(
            instance_id = %instance.id,
            lead_id = ?instance.lead_id,
            tasks = template.tasks.len(),
            "Workflow instance started"
        );

        if first.delay().is_zero() {
            self.process_execution(first_execution).await?;
        }

        self.store
            .get_instance(instance.id)
            .await?
            .ok_or_else(|| Error::not_found("Workflow instance", instance.id))
    }

    /// Walk forward from an execution. Non-runnable executions are left unchanged.
    #[instrument(skip(self))]
    pub async fn process_execution(&self, execution_id: Uuid) -> Result<StepReport> {
        let mut execution = self
            .store
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| Error::not_found("Task execution", execution_id))?;
        let mut instance = self
            .store
            .get_instance(execution.instance_id)
            .await?
            .ok_or_else(|| Error::not_found("Workflow instance", execution.instance_id))?;
        let template = self
            .store
            .get_template(instance.template_id)
            .await?
            .ok_or_else(|| Error::not_found("Workflow template", instance.template_id))?;

        let mut report = StepReport::new(&instance);

        for _ in 0..self.config.max_inline_steps {
            if instance.status != InstanceStatus::Active
                || !execution.status.is_runnable()
                || instance.current_task_id != Some(execution.task_id)
            {
                break;
            }

            let Some(task) = template.task(execution.task_id) else {
                execution.status = ExecutionStatus::Failed;
                execution.error_message = Some("Task definition not found".to_string());
                execution.completed_at = Some(Utc::now());
                self.store.update_execution(&execution).await?;
                report.push(&execution);
                self.finish(&mut instance, InstanceStatus::Failed).await?;
                break;
            };

            let lead = match instance.lead_id {
                Some(id) => self.store.get_lead(id).await?,
                None => None,
            };

            if let Some(condition) = &task.branch_condition {
                let previous = self.branch_source(&execution, condition.parent_task_id).await?;
                let flattened = flatten_actions(&previous);
                let lead_ctx = lead.as_ref().map(Lead::to_context).unwrap_or(Value::Null);
                let holds =
                    condition.evaluate(&[&previous, &flattened, &instance.metadata, &lead_ctx]);
                if !holds {
                    execution.status = ExecutionStatus::Skipped;
                    execution.completed_at = Some(Utc::now());
                    execution.result = Some(json!({
                        "skipped": true,
                        "reason": format!("Branch condition on '{}' not met", condition.field),
                    }));
                    self.store.update_execution(&execution).await?;
                    report.push(&execution);
                    info!(execution_id = %execution.id, task = %task.name, "Branch condition not met, skipping");

                    match self.advance(&mut instance, &execution, &template, &mut report).await? {
                        Some(next) => {
                            execution = next;
                            continue;
                        }
                        None => break,
                    }
                }
            }

            if task.is_hitl && execution.status != ExecutionStatus::Approved {
                self.await_approval(&mut execution, &instance, &template, task, lead.as_ref())
                    .await?;
                report.push(&execution);
                break;
            }

            let succeeded = self.run_task(&mut execution, &instance, task, lead.as_ref()).await?;
            report.push(&execution);

            if !succeeded && task.on_failure == FailurePolicy::Halt {
                warn!(
                    instance_id = %instance.id,
                    task = %task.name,
                    error = ?execution.error_message,
                    "Task failed, halting workflow"
                );
                self.finish(&mut instance, InstanceStatus::Failed).await?;
                break;
            }

            match self.advance(&mut instance, &execution, &template, &mut report).await? {
                Some(next) => execution = next,
                None => break,
            }
        }

        report.instance_status = instance.status;
        Ok(report)
    }

    /// Result consulted by a branch condition: the named parent task's execution,
    /// else the closest earlier COMPLETED execution
    async fn branch_source(
        &self,
        execution: &TaskExecution,
        parent_task_id: Option<Uuid>,
    ) -> Result<Value> {
        let executions = self.store.list_executions(execution.instance_id).await?;
        let source = match parent_task_id {
            Some(parent) => executions.into_iter().find(|e| e.task_id == parent),
            None => executions
                .into_iter()
                .filter(|e| {
                    e.display_order < execution.display_order
                        && e.status == ExecutionStatus::Completed
                })
                .max_by_key(|e| e.display_order),
        };
        Ok(source.and_then(|e| e.result).unwrap_or(Value::Null))
    }

    async fn await_approval(
        &self,
        execution: &mut TaskExecution,
        instance: &WorkflowInstance,
        template: &WorkflowTemplate,
        task: &WorkflowTask,
        lead: Option<&Lead>,
    ) -> Result<()> {
        execution.status = ExecutionStatus::AwaitingHitl;
        self.store.update_execution(execution).await?;

        let notification = HitlNotification {
            id: Uuid::now_v7(),
            user_id: instance.user_id,
            execution_id: execution.id,
            task_name: task.name.clone(),
            workflow_name: template.name.clone(),
            contact_name: lead.map(|l| l.display_name().to_string()),
            contact_email: lead.and_then(|l| l.email().map(str::to_string)),
            contact_phone: lead.and_then(|l| l.phone().map(str::to_string)),
            urgency: self.config.hitl_urgency.clone(),
            status: NotificationStatus::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        };
        self.store.create_notification(notification).await?;
        info!(execution_id = %execution.id, task = %task.name, "Awaiting human approval");
        Ok(())
    }

    /// Run the task's actions and record the outcome; returns whether it succeeded
    async fn run_task(
        &self,
        execution: &mut TaskExecution,
        instance: &WorkflowInstance,
        task: &WorkflowTask,
        lead: Option<&Lead>,
    ) -> Result<bool> {
        execution.status = ExecutionStatus::InProgress;
        execution.started_at = Some(Utc::now());
        execution.agent_used = Some(
            task.assigned_agent
                .clone()
                .unwrap_or_else(|| format!("{}_EXECUTOR", instance.industry)),
        );
        self.store.update_execution(execution).await?;

        let ctx = ActionContext {
            store: self.store.as_ref(),
            channels: &self.channels,
            instance,
            task,
            lead,
        };
        let outcome = self.executors.run_task(&ctx).await;

        execution.completed_at = Some(Utc::now());
        execution.result = Some(outcome.data);
        if outcome.success {
            execution.status = ExecutionStatus::Completed;
            execution.error_message = None;
        } else {
            execution.status = ExecutionStatus::Failed;
            execution.error_message = outcome.error.or_else(|| Some("Task failed".to_string()));
        }
        self.store.update_execution(execution).await?;
        Ok(outcome.success)
    }

    /// Point the instance at the next PENDING execution, or complete it.
    /// Returns the next execution when it should run inline.
    async fn advance(
        &self,
        instance: &mut WorkflowInstance,
        current: &TaskExecution,
        template: &WorkflowTemplate,
        report: &mut StepReport,
    ) -> Result<Option<TaskExecution>> {
        let next = self
            .store
            .list_executions(instance.id)
            .await?
            .into_iter()
            .find(|e| {
                e.display_order > current.display_order && e.status == ExecutionStatus::Pending
            });

        let Some(mut next) = next else {
            self.finish(instance, InstanceStatus::Completed).await?;
            info!(instance_id = %instance.id, "Workflow instance completed");
            return Ok(None);
        };

        let delay = template
            .task(next.task_id)
            .map(WorkflowTask::delay)
            .unwrap_or_else(chrono::Duration::zero);
        next.scheduled_for = Utc::now() + delay;
        self.store.update_execution(&next).await?;

        instance.current_task_id = Some(next.task_id);
        self.store.update_instance(instance).await?;

        if delay.is_zero() {
            Ok(Some(next))
        } else {
            report.next_execution_id = Some(next.id);
            report.next_run_at = Some(next.scheduled_for);
            Ok(None)
        }
    }

    async fn finish(&self, instance: &mut WorkflowInstance, status: InstanceStatus) -> Result<()> {
        instance.status = status;
        instance.completed_at = Some(Utc::now());
        self.store.update_instance(instance).await
    }

    /// Cancel an instance and every execution that has not finished
    async fn cancel_all(&self, mut instance: WorkflowInstance) -> Result<WorkflowInstance> {
        let now = Utc::now();
        for mut execution in self.store.list_executions(instance.id).await? {
            if execution.status.is_finished() {
                continue;
            }
            if execution.status == ExecutionStatus::AwaitingHitl {
                self.store
                    .resolve_notifications(execution.id, NotificationStatus::Rejected, now)
                    .await?;
            }
            execution.status = ExecutionStatus::Cancelled;
            execution.completed_at = Some(now);
            self.store.update_execution(&execution).await?;
        }
        self.finish(&mut instance, InstanceStatus::Cancelled).await?;
        Ok(instance)
    }

    async fn owned_instance(&self, instance_id: Uuid, user_id: Uuid) -> Result<WorkflowInstance> {
        let instance = self
            .store
            .get_instance(instance_id)
            .await?
            .ok_or_else(|| Error::not_found("Workflow instance", instance_id))?;
        if instance.user_id != user_id {
            return Err(Error::forbidden("Workflow instance belongs to another user"));
        }
        Ok(instance)
    }

    #[instrument(skip(self))]
    pub async fn cancel_instance(&self, instance_id: Uuid, user_id: Uuid) -> Result<WorkflowInstance> {
        let instance = self.owned_instance(instance_id, user_id).await?;
        if instance.status != InstanceStatus::Active {
            return Err(Error::rule(format!(
                "Only active workflow instances can be cancelled (status: {})",
                instance.status
            )));
        }
        let instance = self.cancel_all(instance).await?;
        info!("Workflow instance cancelled");
        Ok(instance)
    }

    pub async fn get_instance(&self, instance_id: Uuid, user_id: Uuid) -> Result<InstanceDetail> {
        let instance = self.owned_instance(instance_id, user_id).await?;
        let executions = self.store.list_executions(instance.id).await?;
        Ok(InstanceDetail {
            instance,
            executions,
        })
    }

    pub async fn list_executions(
        &self,
        instance_id: Uuid,
        user_id: Uuid,
    ) -> Result<Vec<TaskExecution>> {
        let instance = self.owned_instance(instance_id, user_id).await?;
        self.store.list_executions(instance.id).await
    }

    // ========================================================================
    // HITL
    // ========================================================================

    async fn awaiting_execution(
        &self,
        execution_id: Uuid,
        user_id: Uuid,
    ) -> Result<(TaskExecution, WorkflowInstance)> {
        let execution = self
            .store
            .get_execution(execution_id)
            .await?
            .ok_or_else(|| Error::not_found("Task execution", execution_id))?;
        let instance = self.owned_instance(execution.instance_id, user_id).await?;
        if execution.status != ExecutionStatus::AwaitingHitl {
            return Err(Error::rule(format!(
                "Execution is not awaiting approval (status: {})",
                execution.status
            )));
        }
        Ok((execution, instance))
    }

    /// Approve a HITL gate and resume the walk, which runs the gated task
    #[instrument(skip(self, note))]
    pub async fn approve_hitl(
        &self,
        execution_id: Uuid,
        approver: Uuid,
        note: Option<String>,
    ) -> Result<StepReport> {
        let (mut execution, _) = self.awaiting_execution(execution_id, approver).await?;

        execution.status = ExecutionStatus::Approved;
        execution.hitl_approved_by = Some(approver);
        execution.hitl_note = note;
        self.store.update_execution(&execution).await?;
        self.store
            .resolve_notifications(execution.id, NotificationStatus::Approved, Utc::now())
            .await?;
        info!("HITL approved");

        self.process_execution(execution.id).await
    }

    /// Reject a HITL gate; the instance is cancelled
    #[instrument(skip(self, note))]
    pub async fn reject_hitl(
        &self,
        execution_id: Uuid,
        approver: Uuid,
        note: Option<String>,
    ) -> Result<WorkflowInstance> {
        let (mut execution, instance) = self.awaiting_execution(execution_id, approver).await?;

        let now = Utc::now();
        execution.status = ExecutionStatus::Rejected;
        execution.hitl_approved_by = Some(approver);
        execution.hitl_note = note;
        execution.completed_at = Some(now);
        self.store.update_execution(&execution).await?;
        self.store
            .resolve_notifications(execution.id, NotificationStatus::Rejected, now)
            .await?;
        info!("HITL rejected, cancelling workflow instance");

        self.cancel_all(instance).await
    }

    pub async fn pending_approvals(&self, user_id: Uuid) -> Result<Vec<HitlNotification>> {
        self.store.list_pending_notifications(user_id).await
    }

    // ========================================================================
    // Polling and stats
    // ========================================================================

    /// Run due executions; one failing execution does not stop the batch
    pub async fn process_due(&self, now: DateTime<Utc>, limit: usize) -> Result<usize> {
        let due = self.store.due_executions(now, limit).await?;
        let mut processed = 0;
        for execution in due {
            match self.process_execution(execution.id).await {
                Ok(_) => processed += 1,
                Err(e) => error!(execution_id = %execution.id, error = %e, "Failed to process execution"),
            }
        }
        Ok(processed)
    }

    pub async fn workflow_stats(&self, user_id: Uuid) -> Result<WorkflowStats> {
        let templates = self.store.list_templates(user_id).await?;
        let instances = self.store.list_instances(user_id).await?;
        let approvals = self.store.list_pending_notifications(user_id).await?;
        Ok(WorkflowStats {
            total_templates: templates.len(),
            active_instances: instances
                .iter()
                .filter(|i| i.status == InstanceStatus::Active)
                .count(),
            completed_instances: instances
                .iter()
                .filter(|i| i.status == InstanceStatus::Completed)
                .count(),
            pending_approvals: approvals.len(),
        })
    }
}

/// Lift the per-action data of a task result to the top level so conditions can
/// name a field without its action prefix
fn flatten_actions(result: &Value) -> Value {
    let mut merged = Map::new();
    if let Value::Object(actions) = result {
        for data in actions.values() {
            if let Value::Object(fields) = data {
                for (k, v) in fields {
                    merged.entry(k.clone()).or_insert_with(|| v.clone());
                }
            }
        }
    }
    Value::Object(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::RecordingChannel;
    use crate::memory::InMemoryStore;
    use crate::template::{DelayUnit, NewWorkflowTask};
    use crate::traits::{LeadStore, WorkflowStore};

    struct Harness {
        store: Arc<InMemoryStore>,
        channel: Arc<RecordingChannel>,
        engine: WorkflowEngine,
        user: Uuid,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let channel = Arc::new(RecordingChannel::new());
            let engine = WorkflowEngine::new(
                store.clone(),
                Channels::new(channel.clone(), channel.clone()),
            );
            Self {
                store,
                channel,
                engine,
                user: Uuid::now_v7(),
            }
        }

        async fn lead(&self) -> Lead {
            self.store
                .create_lead(
                    Lead::new(self.user, "Acme")
                        .with_contact("Jane Doe")
                        .with_email("jane@example.com")
                        .with_phone("+15551234"),
                )
                .await
                .unwrap()
        }

        async fn template(&self, tasks: Vec<NewWorkflowTask>) -> WorkflowTemplate {
            self.engine
                .create_template(
                    self.user,
                    CreateTemplate {
                        name: "Flow".to_string(),
                        description: None,
                        industry: Default::default(),
                        is_active: true,
                        tasks,
                    },
                )
                .await
                .unwrap()
        }
    }

    fn email() -> NewWorkflowTask {
        NewWorkflowTask::new("Email", "SEND_EMAIL")
    }

    #[tokio::test]
    async fn test_zero_delay_tasks_run_inline_to_completion() {
        let h = Harness::new();
        let lead = h.lead().await;
        let template = h.template(vec![email(), NewWorkflowTask::new("Sms", "SEND_SMS")]).await;

        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id).for_lead(lead.id))
            .await
            .unwrap();

        assert_eq!(instance.status, InstanceStatus::Completed);
        assert!(instance.completed_at.is_some());
        assert_eq!(h.channel.emails().len(), 1);
        assert_eq!(h.channel.sms().len(), 1);
        assert_eq!(instance.metadata["trigger_type"], "manual");
    }

    #[tokio::test]
    async fn test_delayed_task_is_left_for_the_worker() {
        let h = Harness::new();
        let lead = h.lead().await;
        let template = h
            .template(vec![email(), email().delayed(2, DelayUnit::Hours)])
            .await;

        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id).for_lead(lead.id))
            .await
            .unwrap();
        assert_eq!(instance.status, InstanceStatus::Active);
        assert_eq!(instance.current_task_id, Some(template.tasks[1].id));

        let executions = h.store.list_executions(instance.id).await.unwrap();
        assert_eq!(executions[0].status, ExecutionStatus::Completed);
        assert_eq!(executions[1].status, ExecutionStatus::Pending);
        let wait = executions[1].scheduled_for - Utc::now();
        assert!(wait > chrono::Duration::minutes(119) && wait <= chrono::Duration::hours(2));

        // Not yet due
        assert_eq!(h.engine.process_due(Utc::now(), 10).await.unwrap(), 0);
        // Due three hours from now
        let later = Utc::now() + chrono::Duration::hours(3);
        assert_eq!(h.engine.process_due(later, 10).await.unwrap(), 1);

        let done = h.store.get_instance(instance.id).await.unwrap().unwrap();
        assert_eq!(done.status, InstanceStatus::Completed);
    }

    #[tokio::test]
    async fn test_first_task_with_delay_does_not_run_inline() {
        let h = Harness::new();
        let template = h.template(vec![email().delayed(1, DelayUnit::Days)]).await;
        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id))
            .await
            .unwrap();
        let executions = h.store.list_executions(instance.id).await.unwrap();
        assert_eq!(executions[0].status, ExecutionStatus::Pending);
        assert!(executions[0].scheduled_for > Utc::now() + chrono::Duration::hours(23));
    }

    #[tokio::test]
    async fn test_create_template_rejects_overlong_delay() {
        let h = Harness::new();
        let err = h
            .engine
            .create_template(
                h.user,
                CreateTemplate {
                    name: "Flow".to_string(),
                    description: None,
                    industry: Default::default(),
                    is_active: true,
                    tasks: vec![email().delayed(i64::MAX / 2, DelayUnit::Days)],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BusinessRule(_)));
        assert!(h.engine.list_templates(h.user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stored_overlong_delay_is_clamped_on_start() {
        let h = Harness::new();
        let template = CreateTemplate {
            name: "Imported".to_string(),
            description: None,
            industry: Default::default(),
            is_active: true,
            tasks: vec![
                email().delayed(i64::MAX / 2, DelayUnit::Days),
                email().delayed(i64::MAX, DelayUnit::Minutes),
            ],
        }
        .into_template(h.user);
        let template = h.store.create_template(template).await.unwrap();

        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id))
            .await
            .unwrap();
        let executions = h.store.list_executions(instance.id).await.unwrap();
        let ceiling = Utc::now() + chrono::Duration::days(2 * crate::template::MAX_DELAY_DAYS + 1);
        assert_eq!(executions[0].status, ExecutionStatus::Pending);
        assert!(executions[1].scheduled_for <= ceiling);
    }

    #[tokio::test]
    async fn test_halt_policy_fails_instance() {
        let h = Harness::new();
        // No lead: SEND_EMAIL fails
        let template = h.template(vec![email(), email()]).await;
        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id))
            .await
            .unwrap();

        assert_eq!(instance.status, InstanceStatus::Failed);
        let executions = h.store.list_executions(instance.id).await.unwrap();
        assert_eq!(executions[0].status, ExecutionStatus::Failed);
        assert_eq!(
            executions[0].error_message.as_deref(),
            Some("No lead associated with this workflow")
        );
        assert_eq!(executions[1].status, ExecutionStatus::Pending);
    }

    #[tokio::test]
    async fn test_skip_policy_continues() {
        let h = Harness::new();
        let lead = h
            .store
            .create_lead(Lead::new(h.user, "No Email").with_phone("+15550000"))
            .await
            .unwrap();
        let template = h
            .template(vec![
                email().on_failure(FailurePolicy::Skip),
                NewWorkflowTask::new("Sms", "SEND_SMS"),
            ])
            .await;
        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id).for_lead(lead.id))
            .await
            .unwrap();
        assert_eq!(instance.status, InstanceStatus::Completed);
        let executions = h.store.list_executions(instance.id).await.unwrap();
        assert_eq!(executions[0].status, ExecutionStatus::Failed);
        assert_eq!(executions[1].status, ExecutionStatus::Completed);
    }

    #[tokio::test]
    async fn test_start_rejects_inactive_and_foreign_templates() {
        let h = Harness::new();
        let template = h.template(vec![email()]).await;

        let other = Uuid::now_v7();
        let err = h
            .engine
            .start_instance(other, StartInstance::new(template.id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));

        h.engine
            .set_template_active(template.id, h.user, false)
            .await
            .unwrap();
        let err = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BusinessRule(_)));

        let err = h
            .engine
            .start_instance(h.user, StartInstance::new(Uuid::now_v7()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_deactivation_cancels_active_instances() {
        let h = Harness::new();
        let lead = h.lead().await;
        let template = h
            .template(vec![email(), email().delayed(1, DelayUnit::Days)])
            .await;
        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id).for_lead(lead.id))
            .await
            .unwrap();
        assert_eq!(instance.status, InstanceStatus::Active);

        h.engine
            .set_template_active(template.id, h.user, false)
            .await
            .unwrap();

        let instance = h.store.get_instance(instance.id).await.unwrap().unwrap();
        assert_eq!(instance.status, InstanceStatus::Cancelled);
        let executions = h.store.list_executions(instance.id).await.unwrap();
        assert_eq!(executions[1].status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_requires_active_instance() {
        let h = Harness::new();
        let lead = h.lead().await;
        let template = h.template(vec![email()]).await;
        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id).for_lead(lead.id))
            .await
            .unwrap();
        assert_eq!(instance.status, InstanceStatus::Completed);

        let err = h.engine.cancel_instance(instance.id, h.user).await.unwrap_err();
        assert!(matches!(err, Error::BusinessRule(_)));
    }

    #[tokio::test]
    async fn test_process_execution_is_idempotent() {
        let h = Harness::new();
        let lead = h.lead().await;
        let template = h.template(vec![email()]).await;
        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id).for_lead(lead.id))
            .await
            .unwrap();
        let executions = h.store.list_executions(instance.id).await.unwrap();

        let report = h.engine.process_execution(executions[0].id).await.unwrap();
        assert!(report.steps.is_empty());
        assert_eq!(report.instance_status, InstanceStatus::Completed);
        assert_eq!(h.channel.emails().len(), 1);
    }

    #[tokio::test]
    async fn test_agent_used_defaults_to_industry_executor() {
        let h = Harness::new();
        let lead = h.lead().await;
        let template = h
            .template(vec![email(), NewWorkflowTask {
                assigned_agent: Some("Sarah".to_string()),
                ..NewWorkflowTask::new("Note", "NOTIFY_USER")
            }])
            .await;
        let instance = h
            .engine
            .start_instance(h.user, StartInstance::new(template.id).for_lead(lead.id))
            .await
            .unwrap();
        let executions = h.store.list_executions(instance.id).await.unwrap();
        assert_eq!(executions[0].agent_used.as_deref(), Some("GENERAL_EXECUTOR"));
        assert_eq!(executions[1].agent_used.as_deref(), Some("Sarah"));
    }

    #[tokio::test]
    async fn test_stats() {
        let h = Harness::new();
        let lead = h.lead().await;
        let done = h.template(vec![email()]).await;
        let gated = h
            .template(vec![NewWorkflowTask::new("Review", "SEND_EMAIL").hitl()])
            .await;
        for template in [&done, &gated] {
            h.engine
                .start_instance(h.user, StartInstance::new(template.id).for_lead(lead.id))
                .await
                .unwrap();
        }

        let stats = h.engine.workflow_stats(h.user).await.unwrap();
        assert_eq!(
            stats,
            WorkflowStats {
                total_templates: 2,
                active_instances: 1,
                completed_instances: 1,
                pending_approvals: 1,
            }
        );
    }

    #[test]
    fn test_flatten_actions() {
        let result = json!({ "send_email": { "status": "sent" }, "wait": { "waited": true } });
        let flat = flatten_actions(&result);
        assert_eq!(flat["status"], "sent");
        assert_eq!(flat["waited"], true);
    }
}
