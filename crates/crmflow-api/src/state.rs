// Shared application state

use std::sync::Arc;

use crmflow_core::{CampaignService, Channels, EngineConfig, Store, TriggerDispatcher, WorkflowEngine};

/// Services shared by every route module
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<WorkflowEngine>,
    pub dispatcher: TriggerDispatcher,
    pub campaigns: Arc<CampaignService>,
    pub store: Arc<dyn Store>,
    /// "postgres" or "memory", reported by /health
    pub storage_mode: &'static str,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        channels: Channels,
        config: EngineConfig,
        storage_mode: &'static str,
    ) -> Self {
        let engine = Arc::new(
            WorkflowEngine::new(store.clone(), channels.clone()).with_config(config.clone()),
        );
        let campaigns = Arc::new(CampaignService::new(store.clone(), channels).with_config(config));
        Self {
            dispatcher: TriggerDispatcher::new(engine.clone()),
            engine,
            campaigns,
            store,
            storage_mode,
        }
    }
}
