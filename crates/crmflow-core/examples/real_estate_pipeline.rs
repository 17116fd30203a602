//! Real Estate Pipeline Example - Auto-run dispatch, HITL approval and a delayed step
//!
//! Runs entirely in memory with a recording channel, so nothing leaves the process.
//!
//! Run with: cargo run -p crmflow-core --example real_estate_pipeline

use std::sync::Arc;

use chrono::{Duration, Utc};
use crmflow_core::{
    ActionConfig, AutoRunStore, Channels, CreateTemplate, DelayUnit, InMemoryStore, Industry,
    Lead, LeadStore, NewWorkflowTask, RecordingChannel, TriggerDispatcher, TriggerEvent,
    UpsertAutoRun, WorkflowEngine,
};
use serde_json::json;
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("crmflow_core=info")
        .init();

    println!("=== Real Estate Pipeline (crmflow-core) ===\n");

    // 1. In-memory store and a channel that records instead of sending
    let store = Arc::new(InMemoryStore::new());
    let channel = Arc::new(RecordingChannel::new());
    let engine = Arc::new(WorkflowEngine::new(
        store.clone(),
        Channels::new(channel.clone(), channel.clone()),
    ));
    let user = Uuid::now_v7();

    // 2. Intro SMS, agent-approved listing agreement, follow-up email a day later
    let template = engine
        .create_template(
            user,
            CreateTemplate {
                name: "Seller onboarding".to_string(),
                description: Some("New seller leads".to_string()),
                industry: Industry::RealEstate,
                is_active: true,
                tasks: vec![
                    NewWorkflowTask::new("Intro text", "SMS").actions(
                        ActionConfig::with_actions(&["sms"])
                            .with_param("message", json!("Hi {{firstName}}, thanks for reaching out about selling!")),
                    ),
                    NewWorkflowTask::new("Listing agreement", "DOCUMENT").hitl(),
                    NewWorkflowTask::new("Check in", "EMAIL").delayed(1, DelayUnit::Days),
                ],
            },
        )
        .await?;

    store
        .upsert_binding(
            UpsertAutoRun {
                employee_type: "LEAD_QUALIFIER".to_string(),
                industry: Industry::RealEstate,
                event: TriggerEvent::NewLead,
                workflow_id: Some(template.id),
                enabled: true,
            }
            .into_binding(user),
        )
        .await?;

    // 3. A new seller lead fires the binding
    let lead = store
        .create_lead(
            Lead::new(user, "Maple Ave 12")
                .with_contact("Pat Doe")
                .with_email("pat@example.com")
                .with_phone("+15550100")
                .with_tags(&["Seller"]),
        )
        .await?;

    let dispatcher = TriggerDispatcher::new(engine.clone());
    let report = dispatcher.on_new_lead(user, lead.id, Industry::RealEstate).await;
    let instance_id = report.started[0];
    println!("Started instance {} (client_type from tags)", instance_id);

    // 4. The workflow stops at the HITL gate
    let pending = engine.pending_approvals(user).await?;
    println!("Pending approvals: {}", pending.len());
    let gate = &pending[0];
    println!("  -> '{}' for {:?}", gate.task_name, gate.contact_name);

    let step = engine
        .approve_hitl(gate.execution_id, user, Some("Pricing confirmed".to_string()))
        .await?;
    println!("Approved; next step due at {:?}", step.next_run_at);

    // 5. The worker would pick this up tomorrow
    let processed = engine.process_due(Utc::now() + Duration::days(2), 10).await?;
    println!("Processed {} due step(s)", processed);

    let detail = engine.get_instance(instance_id, user).await?;
    println!("\nInstance status: {}", detail.instance.status);
    for execution in &detail.executions {
        println!("  #{} {}", execution.display_order, execution.status);
    }

    println!("\nSMS sent: {}", channel.sms().len());
    println!("Emails sent: {}", channel.emails().len());
    Ok(())
}
