// Integration tests against a real PostgreSQL database
// Run with: DATABASE_URL=postgres://... cargo test -p crmflow-storage --test db_test -- --ignored

use std::sync::Arc;

use chrono::{Duration, Utc};
use crmflow_core::{
    CampaignChannel, CampaignService, CampaignStatus, Channels, CreateCampaign, CreateTemplate,
    DelayUnit, EngineConfig, ExecutionStatus, Industry, InstanceStatus, Lead, LeadStore,
    NewWorkflowTask, RecordingChannel, StartInstance, WorkflowEngine, WorkflowStore,
};
use crmflow_storage::{create_db_store, Database, DbStore};
use uuid::Uuid;

async fn store() -> Arc<DbStore> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required for db tests");
    let db = Database::from_url(&url, 2).await.expect("connect");
    db.migrate().await.expect("migrate");
    Arc::new(create_db_store(db))
}

#[tokio::test]
#[ignore]
async fn test_hitl_and_delayed_step_persist() {
    let store = store().await;
    let channel = Arc::new(RecordingChannel::new());
    let engine = WorkflowEngine::new(store.clone(), Channels::new(channel.clone(), channel.clone()));
    let user = Uuid::now_v7();

    let lead = store
        .create_lead(
            Lead::new(user, "Db Lead")
                .with_contact("Dana")
                .with_email("dana@example.com"),
        )
        .await
        .unwrap();
    let template = engine
        .create_template(
            user,
            CreateTemplate {
                name: "Persisted".to_string(),
                description: None,
                industry: Industry::General,
                is_active: true,
                tasks: vec![
                    NewWorkflowTask::new("Gate", "SEND_EMAIL").hitl(),
                    NewWorkflowTask::new("Later", "SEND_EMAIL").delayed(3, DelayUnit::Hours),
                ],
            },
        )
        .await
        .unwrap();

    let instance = engine
        .start_instance(user, StartInstance::new(template.id).for_lead(lead.id))
        .await
        .unwrap();
    let executions = store.list_executions(instance.id).await.unwrap();
    assert_eq!(executions[0].status, ExecutionStatus::AwaitingHitl);
    assert_eq!(engine.pending_approvals(user).await.unwrap().len(), 1);

    // Nothing is due while the gate is closed
    let later = Utc::now() + Duration::days(1);
    assert_eq!(engine.process_due(later, 10).await.unwrap(), 0);

    engine.approve_hitl(executions[0].id, user, None).await.unwrap();
    assert_eq!(channel.emails().len(), 1);
    assert!(engine.pending_approvals(user).await.unwrap().is_empty());

    assert_eq!(engine.process_due(later, 10).await.unwrap(), 1);
    let instance = store.get_instance(instance.id).await.unwrap().unwrap();
    assert_eq!(instance.status, InstanceStatus::Completed);
    assert_eq!(channel.emails().len(), 2);
}

#[tokio::test]
#[ignore]
async fn test_campaign_send_counters_persist() {
    let store = store().await;
    let channel = Arc::new(RecordingChannel::new());
    let service = CampaignService::new(store.clone(), Channels::new(channel.clone(), channel))
        .with_config(EngineConfig::default().without_pacing());
    let user = Uuid::now_v7();

    let mut leads = vec![];
    for phone in [Some("+15550001"), Some("+15550002"), None] {
        let mut lead = Lead::new(user, "Recipient");
        lead.phone = phone.map(str::to_string);
        leads.push(store.create_lead(lead).await.unwrap().id);
    }

    let campaign = service
        .create_campaign(
            user,
            CreateCampaign {
                name: "Db blast".to_string(),
                channel: CampaignChannel::Sms,
                email_subject: None,
                email_body: None,
                sms_template: Some("Hello {firstName}".to_string()),
                drip_steps: vec![],
                ab_test: None,
            },
        )
        .await
        .unwrap();
    service.start_send(campaign.id, user, &leads).await.unwrap();

    let report = service.send_pending(campaign.id).await.unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(report.sent_count, 2);
    assert_eq!(report.failed_count, 1);

    let campaign = service.get_campaign(campaign.id, user).await.unwrap();
    assert_eq!(campaign.status, CampaignStatus::Completed);
    assert_eq!(campaign.sent_count, 2);
    assert_eq!(campaign.failed_count, 1);
}
