// Workflow template domain types
//
// A template is an ordered list of tasks authored once by a user. Instances copy
// nothing from it: executions reference tasks by id and are ordered by display_order.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::condition::BranchCondition;
use crate::error::{Error, Result};
use crate::industry::Industry;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Unit of a task delay
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DelayUnit {
    #[default]
    Minutes,
    Hours,
    Days,
}

/// Longest delay a task or drip step may carry
pub const MAX_DELAY_DAYS: i64 = 3650;

const MAX_DELAY_MINUTES: i64 = MAX_DELAY_DAYS * 24 * 60;

impl DelayUnit {
    fn minutes_per_unit(&self) -> i64 {
        match self {
            DelayUnit::Minutes => 1,
            DelayUnit::Hours => 60,
            DelayUnit::Days => 24 * 60,
        }
    }

    /// Convert a delay value to a duration. Negative values clamp to zero and
    /// anything past `MAX_DELAY_DAYS` clamps to it.
    pub fn duration(&self, value: i64) -> Duration {
        let minutes = value
            .max(0)
            .saturating_mul(self.minutes_per_unit())
            .min(MAX_DELAY_MINUTES);
        Duration::minutes(minutes)
    }

    /// Reject delays longer than `MAX_DELAY_DAYS`
    pub fn validate(&self, value: i64) -> Result<()> {
        if value > MAX_DELAY_MINUTES / self.minutes_per_unit() {
            return Err(Error::rule(format!(
                "Delay must not exceed {} days",
                MAX_DELAY_DAYS
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for DelayUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DelayUnit::Minutes => write!(f, "MINUTES"),
            DelayUnit::Hours => write!(f, "HOURS"),
            DelayUnit::Days => write!(f, "DAYS"),
        }
    }
}

impl From<&str> for DelayUnit {
    fn from(s: &str) -> Self {
        match s {
            "HOURS" => DelayUnit::Hours,
            "DAYS" => DelayUnit::Days,
            _ => DelayUnit::Minutes,
        }
    }
}

/// What happens to the instance when a task action fails
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailurePolicy {
    /// Instance is marked FAILED and stops
    #[default]
    Halt,
    /// Execution stays FAILED and the walk moves to the next task
    Skip,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Halt => write!(f, "HALT"),
            FailurePolicy::Skip => write!(f, "SKIP"),
        }
    }
}

impl From<&str> for FailurePolicy {
    fn from(s: &str) -> Self {
        match s {
            "SKIP" => FailurePolicy::Skip,
            _ => FailurePolicy::Halt,
        }
    }
}

/// Actions a task runs plus free-form parameters for the executors
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ActionConfig {
    #[serde(default)]
    pub actions: Vec<String>,
    /// Executor parameters (message templates, offer text, points, ...)
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub params: Map<String, Value>,
}

impl ActionConfig {
    pub fn with_actions(actions: &[&str]) -> Self {
        Self {
            actions: actions.iter().map(|a| a.to_string()).collect(),
            params: Map::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: Value) -> Self {
        self.params.insert(key.to_string(), value);
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_i64(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(Value::as_i64)
    }
}

/// One step of a workflow template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkflowTask {
    pub id: Uuid,
    pub template_id: Uuid,
    pub name: String,
    /// Task type (EMAIL, SMS, VOICE_CALL, ...); doubles as the action when none are configured
    pub task_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub is_hitl: bool,
    #[serde(default)]
    pub delay_value: i64,
    #[serde(default)]
    pub delay_unit: DelayUnit,
    pub display_order: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_condition: Option<BranchCondition>,
    #[serde(default)]
    pub action_config: ActionConfig,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl WorkflowTask {
    pub fn delay(&self) -> Duration {
        self.delay_unit.duration(self.delay_value)
    }

    /// Actions to run, falling back to the lowercased task type
    pub fn actions(&self) -> Vec<String> {
        if self.action_config.actions.is_empty() {
            vec![self.task_type.to_lowercase()]
        } else {
            self.action_config.actions.clone()
        }
    }
}

/// A user-owned, industry-scoped workflow definition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct WorkflowTemplate {
    pub id: Uuid,
    pub user_id: Uuid,
    pub industry: Industry,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    /// Tasks sorted by display_order
    pub tasks: Vec<WorkflowTask>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowTemplate {
    pub fn task(&self, task_id: Uuid) -> Option<&WorkflowTask> {
        self.tasks.iter().find(|t| t.id == task_id)
    }
}

/// Task definition as submitted by a client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct NewWorkflowTask {
    pub name: String,
    pub task_type: String,
    #[serde(default)]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub is_hitl: bool,
    #[serde(default)]
    pub delay_value: i64,
    #[serde(default)]
    pub delay_unit: DelayUnit,
    #[serde(default)]
    pub branch_condition: Option<BranchCondition>,
    #[serde(default)]
    pub action_config: ActionConfig,
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl NewWorkflowTask {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            assigned_agent: None,
            is_hitl: false,
            delay_value: 0,
            delay_unit: DelayUnit::Minutes,
            branch_condition: None,
            action_config: ActionConfig::default(),
            on_failure: FailurePolicy::Halt,
        }
    }

    pub fn hitl(mut self) -> Self {
        self.is_hitl = true;
        self
    }

    pub fn delayed(mut self, value: i64, unit: DelayUnit) -> Self {
        self.delay_value = value;
        self.delay_unit = unit;
        self
    }

    pub fn actions(mut self, config: ActionConfig) -> Self {
        self.action_config = config;
        self
    }

    pub fn when(mut self, condition: BranchCondition) -> Self {
        self.branch_condition = Some(condition);
        self
    }

    pub fn on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }
}

/// Request to author a template
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CreateTemplate {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub industry: Industry,
    /// Templates are active on creation unless stated otherwise
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub tasks: Vec<NewWorkflowTask>,
}

fn default_true() -> bool {
    true
}

impl CreateTemplate {
    /// Materialize the template for a user, assigning ids and display order
    pub fn into_template(self, user_id: Uuid) -> WorkflowTemplate {
        let template_id = Uuid::now_v7();
        let now = Utc::now();
        let tasks = self
            .tasks
            .into_iter()
            .enumerate()
            .map(|(i, t)| WorkflowTask {
                id: Uuid::now_v7(),
                template_id,
                name: t.name,
                task_type: t.task_type,
                assigned_agent: t.assigned_agent,
                is_hitl: t.is_hitl,
                delay_value: t.delay_value,
                delay_unit: t.delay_unit,
                display_order: i as i32,
                branch_condition: t.branch_condition,
                action_config: t.action_config,
                on_failure: t.on_failure,
            })
            .collect();

        WorkflowTemplate {
            id: template_id,
            user_id,
            industry: self.industry,
            name: self.name,
            description: self.description,
            is_active: self.is_active,
            tasks,
            created_at: now,
            updated_at: now,
        }
    }
}
