// Auto-run trigger dispatcher
//
// Turns a domain event into workflow instances. Dispatch is fire-and-forget: the
// caller (lead creation, review import, ...) must never fail because an automation
// could not start, so per-binding errors are logged and counted, never returned.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::autorun::{AutoRunBinding, TriggerEvent};
use crate::engine::WorkflowEngine;
use crate::error::{Error, Result};
use crate::industry::Industry;
use crate::instance::StartInstance;
use crate::lead::Lead;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// Outcome of one dispatch
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct DispatchReport {
    pub matched: usize,
    pub started: Vec<Uuid>,
    /// Bindings whose template was missing, foreign or inactive
    pub skipped: usize,
    pub failed: usize,
}

/// Buyer/seller classification for real estate leads
pub fn classify_client(lead: Option<&Lead>) -> &'static str {
    match lead {
        Some(lead) if lead.has_tag("seller") || lead.has_tag("listing") => "seller",
        _ => "buyer",
    }
}

/// Dispatches domain events to enabled auto-run bindings
#[derive(Clone)]
pub struct TriggerDispatcher {
    engine: Arc<WorkflowEngine>,
}

impl TriggerDispatcher {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }

    pub async fn on_new_lead(&self, user_id: Uuid, lead_id: Uuid, industry: Industry) -> DispatchReport {
        self.dispatch(TriggerEvent::NewLead, user_id, Some(lead_id), industry)
            .await
    }

    /// Start one instance per matching binding; never returns an error
    #[instrument(skip(self))]
    pub async fn dispatch(
        &self,
        event: TriggerEvent,
        user_id: Uuid,
        lead_id: Option<Uuid>,
        industry: Industry,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        let bindings = match self
            .engine
            .store()
            .matching_bindings(user_id, industry, event)
            .await
        {
            Ok(bindings) => bindings,
            Err(e) => {
                error!(error = %e, "Failed to load auto-run bindings");
                report.failed += 1;
                return report;
            }
        };
        report.matched = bindings.len();
        if bindings.is_empty() {
            debug!("No auto-run bindings matched");
            return report;
        }

        let lead = match lead_id {
            Some(id) => match self.engine.store().get_lead(id).await {
                Ok(lead) => lead,
                Err(e) => {
                    warn!(lead_id = %id, error = %e, "Failed to load lead for dispatch");
                    None
                }
            },
            None => None,
        };

        for binding in &bindings {
            match self.start_for_binding(binding, event, lead_id, lead.as_ref()).await {
                Ok(Some(instance_id)) => report.started.push(instance_id),
                Ok(None) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    error!(
                        binding_id = %binding.id,
                        employee_type = %binding.employee_type,
                        error = %e,
                        "Auto-run failed to start workflow"
                    );
                }
            }
        }

        info!(
            matched = report.matched,
            started = report.started.len(),
            skipped = report.skipped,
            failed = report.failed,
            "Auto-run dispatch finished"
        );
        report
    }

    /// Run `dispatch` on a detached task
    pub fn spawn_dispatch(
        &self,
        event: TriggerEvent,
        user_id: Uuid,
        lead_id: Option<Uuid>,
        industry: Industry,
    ) -> JoinHandle<DispatchReport> {
        let dispatcher = self.clone();
        tokio::spawn(async move { dispatcher.dispatch(event, user_id, lead_id, industry).await })
    }

    async fn start_for_binding(
        &self,
        binding: &AutoRunBinding,
        event: TriggerEvent,
        lead_id: Option<Uuid>,
        lead: Option<&Lead>,
    ) -> Result<Option<Uuid>> {
        let Some(workflow_id) = binding.workflow_id else {
            return Ok(None);
        };

        let template = self.engine.store().get_template(workflow_id).await?;
        let Some(template) = template else {
            warn!(workflow_id = %workflow_id, "Auto-run workflow no longer exists");
            return Ok(None);
        };
        if template.user_id != binding.user_id || !template.is_active {
            debug!(workflow_id = %workflow_id, "Auto-run workflow is inactive or not owned by the user");
            return Ok(None);
        }

        let mut metadata = Map::new();
        metadata.insert("trigger_type".to_string(), json!(event.trigger_type()));
        metadata.insert("employee_type".to_string(), json!(binding.employee_type));
        metadata.insert("auto_run_id".to_string(), json!(binding.id));

        let metadata = match binding.industry {
            Industry::RealEstate => real_estate_metadata(metadata, lead),
            _ => industry_metadata(metadata, binding.industry),
        };

        let mut req = StartInstance::new(template.id).with_metadata(metadata);
        req.lead_id = lead_id;

        match self.engine.start_instance(binding.user_id, req).await {
            Ok(instance) => Ok(Some(instance.id)),
            Err(Error::BusinessRule(msg)) => {
                debug!(reason = %msg, "Auto-run workflow not startable");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn real_estate_metadata(mut metadata: Map<String, Value>, lead: Option<&Lead>) -> Value {
    metadata.insert("client_type".to_string(), json!(classify_client(lead)));
    metadata.insert("engine".to_string(), json!("real_estate"));
    Value::Object(metadata)
}

fn industry_metadata(mut metadata: Map<String, Value>, industry: Industry) -> Value {
    metadata.insert("engine".to_string(), json!("industry"));
    metadata.insert("industry".to_string(), json!(industry));
    Value::Object(metadata)
}
