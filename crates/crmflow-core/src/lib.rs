// Workflow Automation Core
//
// This crate provides a DB-agnostic implementation of the CRM automation engine:
// workflow templates are instantiated per lead, walked step by step with delays,
// branch conditions and human-in-the-loop gates, and each step is handed to an
// industry executor.
//
// Key design decisions:
// - Persistence goes through traits (LeadStore, WorkflowStore, AutoRunStore, CampaignStore)
// - Outbound delivery goes through SmsSender / EmailSender; no provider SDKs here
// - The instance's current task pointer is the only thing that lets an execution run,
//   so a HITL gate cannot be bypassed by the poller
// - Executors never return errors: failures are data on TaskOutcome
// - Trigger dispatch is fire-and-forget and never fails the caller

// Domain entity types
pub mod activity;
pub mod autorun;
pub mod campaign;
pub mod condition;
pub mod industry;
pub mod instance;
pub mod lead;
pub mod template;

pub mod config;
pub mod engine;
pub mod error;
pub mod executors;
pub mod personalize;
pub mod traits;
pub mod trigger;

// In-memory implementations for local runs and testing
pub mod channels;
pub mod memory;

// Re-exports for convenience
pub use activity::ActivityRecord;
pub use autorun::{AutoRunBinding, TriggerEvent, UpsertAutoRun};
pub use campaign::{
    AbTest, AbVariant, Campaign, CampaignChannel, CampaignEnrollment, CampaignRecipient,
    CampaignService, CampaignStatus, CreateCampaign, DripStep, EnrollmentReport,
    EnrollmentStatus, RecipientStatus, SendReport, UpdateCampaign,
};
pub use condition::{BranchCondition, ConditionOperator};
pub use config::EngineConfig;
pub use engine::{StepRecord, StepReport, WorkflowEngine};
pub use error::{Error, ErrorKind, Result};
pub use executors::{ActionContext, ExecutorRegistry, TaskExecutor, TaskOutcome};
pub use industry::Industry;
pub use instance::{
    ExecutionStatus, HitlNotification, InstanceDetail, InstanceStatus, NotificationStatus,
    StartInstance, TaskExecution, WorkflowInstance, WorkflowStats,
};
pub use lead::Lead;
pub use personalize::personalize;
pub use template::{
    ActionConfig, CreateTemplate, DelayUnit, FailurePolicy, NewWorkflowTask, WorkflowTask,
    WorkflowTemplate, MAX_DELAY_DAYS,
};
pub use traits::{
    AutoRunStore, CampaignStore, Channels, EmailSender, LeadStore, SmsSender, Store,
    WorkflowStore,
};
pub use trigger::{classify_client, DispatchReport, TriggerDispatcher};

pub use channels::{LoggingChannel, RecordingChannel, SentMessage};
pub use memory::InMemoryStore;
