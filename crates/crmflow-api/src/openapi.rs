// OpenAPI documentation

use crmflow_core::{
    AbTest, AbVariant, ActionConfig, AutoRunBinding, BranchCondition, Campaign, CampaignChannel,
    CampaignStatus, ConditionOperator, CreateCampaign, CreateTemplate, DelayUnit, DripStep,
    EnrollmentReport, ExecutionStatus, FailurePolicy, HitlNotification, Industry, InstanceDetail,
    InstanceStatus, Lead, NewWorkflowTask, NotificationStatus, StartInstance, StepRecord,
    StepReport, TaskExecution, TriggerEvent, UpdateCampaign, UpsertAutoRun, WorkflowInstance,
    WorkflowStats, WorkflowTask, WorkflowTemplate,
};
use utoipa::OpenApi;

use crate::common::{AcceptedResponse, LeadIdsRequest, ListResponse};
use crate::instances::HitlDecisionRequest;
use crate::leads::{CreateLeadRequest, DispatchEventRequest, LeadCreatedRequest};
use crate::{autoruns, campaigns, instances, leads, templates};

#[derive(OpenApi)]
#[openapi(
    paths(
        templates::create_template,
        templates::list_templates,
        templates::activate_template,
        templates::deactivate_template,
        instances::start_instance,
        instances::get_instance,
        instances::cancel_instance,
        instances::list_executions,
        instances::list_approvals,
        instances::approve_execution,
        instances::reject_execution,
        instances::workflow_stats,
        autoruns::upsert_auto_run,
        leads::create_lead,
        leads::lead_created,
        leads::dispatch_event,
        campaigns::create_campaign,
        campaigns::get_campaign,
        campaigns::update_campaign,
        campaigns::enroll_leads,
        campaigns::send_campaign,
        campaigns::activate_campaign,
        campaigns::pause_campaign,
        campaigns::resume_campaign,
    ),
    components(
        schemas(
            Industry, Lead,
            WorkflowTemplate, WorkflowTask, CreateTemplate, NewWorkflowTask,
            ActionConfig, DelayUnit, FailurePolicy, BranchCondition, ConditionOperator,
            WorkflowInstance, InstanceStatus, InstanceDetail, StartInstance,
            TaskExecution, ExecutionStatus, StepReport, StepRecord,
            HitlNotification, NotificationStatus, HitlDecisionRequest, WorkflowStats,
            AutoRunBinding, UpsertAutoRun, TriggerEvent,
            Campaign, CampaignChannel, CampaignStatus, CreateCampaign, UpdateCampaign,
            DripStep, AbTest, AbVariant, EnrollmentReport,
            CreateLeadRequest, LeadCreatedRequest, DispatchEventRequest,
            LeadIdsRequest, AcceptedResponse,
            ListResponse<WorkflowTemplate>,
            ListResponse<TaskExecution>,
            ListResponse<HitlNotification>,
        )
    ),
    tags(
        (name = "templates", description = "Workflow template authoring"),
        (name = "instances", description = "Workflow instances and stats"),
        (name = "approvals", description = "Human-in-the-loop approvals"),
        (name = "auto-runs", description = "Event to workflow bindings"),
        (name = "leads", description = "Leads and domain events"),
        (name = "campaigns", description = "Email and SMS campaigns")
    ),
    info(
        title = "crmflow API",
        version = "0.1.0",
        description = "CRM workflow automation: templates, instances, HITL approvals, auto-runs and campaigns",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/v1/templates"));
        assert!(paths.contains_key("/v1/executions/{execution_id}/approve"));
        assert!(paths.contains_key("/v1/campaigns/{campaign_id}/send"));
    }
}
