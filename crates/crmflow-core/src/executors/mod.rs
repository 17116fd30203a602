// Industry task executors
//
// Each executor is a dispatch table from action name to a side effect against the
// store and the outbound channels. The registry picks the instance's industry
// executor first and falls back to the generic one for shared actions
// (send_email, add_tag, ...).
//
// Executors never return Err: every failure, including channel errors, becomes a
// failed TaskOutcome that the engine records on the execution.

mod construction;
mod generic;
mod real_estate;
mod restaurant;

pub use construction::ConstructionExecutor;
pub use generic::GenericExecutor;
pub use real_estate::RealEstateExecutor;
pub use restaurant::RestaurantExecutor;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::activity::ActivityRecord;
use crate::error::Error;
use crate::industry::Industry;
use crate::instance::WorkflowInstance;
use crate::lead::Lead;
use crate::personalize::personalize;
use crate::template::{ActionConfig, WorkflowTask};
use crate::traits::{Channels, Store};

/// Result of running one action (or a whole task)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskOutcome {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskOutcome {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }
}

/// Everything an action can read or touch
pub struct ActionContext<'a> {
    pub store: &'a dyn Store,
    pub channels: &'a Channels,
    pub instance: &'a WorkflowInstance,
    pub task: &'a WorkflowTask,
    pub lead: Option<&'a Lead>,
}

impl<'a> ActionContext<'a> {
    pub fn config(&self) -> &ActionConfig {
        &self.task.action_config
    }

    pub fn user_id(&self) -> Uuid {
        self.instance.user_id
    }

    /// Fill placeholders using the lead and the task parameters
    pub fn render(&self, template: &str) -> String {
        match self.lead {
            Some(lead) => personalize(template, lead, &self.config().params),
            None => template.to_string(),
        }
    }

    /// Reload the lead so successive actions see each other's updates
    pub async fn fresh_lead(&self) -> Result<Lead, String> {
        let id = self
            .instance
            .lead_id
            .ok_or_else(|| "No lead associated with this workflow".to_string())?;
        self.store
            .get_lead(id)
            .await
            .map_err(|e| e.to_string())?
            .ok_or_else(|| "No lead associated with this workflow".to_string())
    }

    pub async fn record(&self, kind: &str, payload: Value) -> Result<Uuid, Error> {
        let activity = ActivityRecord::new(self.user_id(), self.instance.lead_id, kind, payload);
        let id = activity.id;
        self.store.record_activity(activity).await?;
        Ok(id)
    }

    pub async fn sms(&self, to: &str, body: &str) -> Result<String, String> {
        self.channels
            .sms
            .send_sms(to, body)
            .await
            .map_err(|e| format!("SMS failed: {}", e))
    }

    pub async fn email(&self, to: &str, subject: &str, body: &str) -> Result<String, String> {
        self.channels
            .email
            .send_email(to, subject, body)
            .await
            .map_err(|e| format!("Email failed: {}", e))
    }

    /// Send over every channel the lead has; succeeds only if all attempted sends do
    pub async fn notify_all(&self, lead: &Lead, subject: &str, body: &str) -> TaskOutcome {
        let mut channels = Vec::new();
        let mut first_error = None;

        if let Some(phone) = lead.phone() {
            match self.sms(phone, body).await {
                Ok(id) => channels.push(json!({"channel": "SMS", "messageId": id})),
                Err(e) => {
                    channels.push(json!({"channel": "SMS", "error": e}));
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(email) = lead.email() {
            match self.email(email, subject, body).await {
                Ok(id) => channels.push(json!({"channel": "Email", "messageId": id})),
                Err(e) => {
                    channels.push(json!({"channel": "Email", "error": e}));
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => TaskOutcome {
                success: false,
                data: json!({ "channels": channels }),
                error: Some(e),
            },
            None => TaskOutcome::ok(json!({ "channels": channels })),
        }
    }
}

/// Dispatch table for one industry
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    fn industry(&self) -> Industry;

    /// Action names this executor handles
    fn actions(&self) -> &'static [&'static str];

    fn supports(&self, action: &str) -> bool {
        self.actions().contains(&action)
    }

    async fn execute(&self, action: &str, ctx: &ActionContext<'_>) -> TaskOutcome;
}

/// Executors keyed by industry with a generic fallback
pub struct ExecutorRegistry {
    generic: Arc<dyn TaskExecutor>,
    by_industry: HashMap<Industry, Arc<dyn TaskExecutor>>,
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
            .register(Arc::new(RealEstateExecutor))
            .register(Arc::new(RestaurantExecutor))
            .register(Arc::new(ConstructionExecutor))
    }
}

impl ExecutorRegistry {
    /// Registry with only the generic executor
    pub fn new() -> Self {
        Self {
            generic: Arc::new(GenericExecutor),
            by_industry: HashMap::new(),
        }
    }

    pub fn register(mut self, executor: Arc<dyn TaskExecutor>) -> Self {
        self.by_industry.insert(executor.industry(), executor);
        self
    }

    /// Run one action for an industry
    pub async fn execute(
        &self,
        industry: Industry,
        action: &str,
        ctx: &ActionContext<'_>,
    ) -> TaskOutcome {
        let action = action.trim().to_lowercase();
        if let Some(executor) = self.by_industry.get(&industry) {
            if executor.supports(&action) {
                return executor.execute(&action, ctx).await;
            }
        }
        if self.generic.supports(&action) {
            return self.generic.execute(&action, ctx).await;
        }
        TaskOutcome::fail(format!("Unknown {} action: {}", industry.label(), action))
    }

    /// Run every action of a task in order, stopping at the first failure
    pub async fn run_task(&self, ctx: &ActionContext<'_>) -> TaskOutcome {
        let mut results = Map::new();
        for action in ctx.task.actions() {
            let outcome = self.execute(ctx.instance.industry, &action, ctx).await;
            tracing::debug!(
                instance_id = %ctx.instance.id,
                task_id = %ctx.task.id,
                action = %action,
                success = outcome.success,
                "Action executed"
            );
            if !outcome.success {
                results.insert(action, outcome.data);
                return TaskOutcome {
                    success: false,
                    data: Value::Object(results),
                    error: outcome.error,
                };
            }
            results.insert(action, outcome.data);
        }
        TaskOutcome::ok(Value::Object(results))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::channels::RecordingChannel;
    use crate::memory::InMemoryStore;
    use crate::traits::LeadStore;
    use chrono::Utc;

    pub struct Fixture {
        pub store: InMemoryStore,
        pub channel: Arc<RecordingChannel>,
        pub channels: Channels,
        pub instance: WorkflowInstance,
        pub lead: Lead,
    }

    impl Fixture {
        pub async fn new(industry: Industry, lead: Lead) -> Self {
            let store = InMemoryStore::new();
            store.create_lead(lead.clone()).await.unwrap();
            let channel = Arc::new(RecordingChannel::new());
            let channels = Channels::new(channel.clone(), channel.clone());
            let instance = WorkflowInstance {
                id: Uuid::now_v7(),
                template_id: Uuid::now_v7(),
                user_id: lead.user_id,
                industry,
                lead_id: Some(lead.id),
                deal_id: None,
                status: crate::instance::InstanceStatus::Active,
                current_task_id: None,
                metadata: json!({}),
                started_at: Utc::now(),
                completed_at: None,
            };
            Self {
                store,
                channel,
                channels,
                instance,
                lead,
            }
        }

        pub fn task(&self, task_type: &str, config: ActionConfig) -> WorkflowTask {
            WorkflowTask {
                id: Uuid::now_v7(),
                template_id: self.instance.template_id,
                name: task_type.to_string(),
                task_type: task_type.to_string(),
                assigned_agent: None,
                is_hitl: false,
                delay_value: 0,
                delay_unit: Default::default(),
                display_order: 0,
                branch_condition: None,
                action_config: config,
                on_failure: Default::default(),
            }
        }

        pub async fn run(&self, task: &WorkflowTask) -> TaskOutcome {
            let ctx = ActionContext {
                store: &self.store,
                channels: &self.channels,
                instance: &self.instance,
                task,
                lead: Some(&self.lead),
            };
            ExecutorRegistry::default().run_task(&ctx).await
        }
    }
}
