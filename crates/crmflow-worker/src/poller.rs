// Due-work poller with adaptive backoff
//
// Each poll runs due task executions through the engine and due drip enrollments
// through the campaign service. The interval grows while idle and resets to the
// minimum as soon as anything was processed.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crmflow_core::{CampaignService, WorkflowEngine};
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, trace};

use crate::config::PollerConfig;

/// What one poll processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollStats {
    pub executions: usize,
    pub enrollments: usize,
}

impl PollStats {
    pub fn is_idle(&self) -> bool {
        self.executions == 0 && self.enrollments == 0
    }
}

pub struct DuePoller {
    engine: Arc<WorkflowEngine>,
    campaigns: Arc<CampaignService>,
    config: PollerConfig,
    current_interval: Duration,
    shutdown_rx: watch::Receiver<bool>,
}

impl DuePoller {
    pub fn new(
        engine: Arc<WorkflowEngine>,
        campaigns: Arc<CampaignService>,
        config: PollerConfig,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            engine,
            campaigns,
            current_interval: config.min_interval,
            config,
            shutdown_rx,
        }
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    /// Process everything due at `now`, up to one batch of each kind
    #[instrument(skip(self))]
    pub async fn poll_once(&self, now: DateTime<Utc>) -> anyhow::Result<PollStats> {
        let executions = self.engine.process_due(now, self.config.batch_size).await?;
        let enrollments = self
            .campaigns
            .process_due_enrollments(now, self.config.batch_size)
            .await?;

        let stats = PollStats {
            executions,
            enrollments,
        };
        if !stats.is_idle() {
            debug!(executions, enrollments, "Processed due work");
        }
        Ok(stats)
    }

    /// Run until the shutdown signal flips to true or its sender is dropped
    pub async fn run(mut self) {
        info!(
            min_interval_ms = self.config.min_interval.as_millis() as u64,
            max_interval_ms = self.config.max_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Starting due-work poller"
        );

        loop {
            if *self.shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping poller");
                break;
            }

            match self.poll_once(Utc::now()).await {
                Ok(stats) if stats.is_idle() => self.increase_backoff(),
                Ok(_) => self.reset_backoff(),
                Err(e) => {
                    error!(error = %e, "Error polling due work");
                    self.increase_backoff();
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.current_interval) => {}
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("Shutdown during poll wait");
                        break;
                    }
                }
            }
        }

        info!("Due-work poller stopped");
    }

    fn increase_backoff(&mut self) {
        let next = self
            .current_interval
            .mul_f64(self.config.backoff_multiplier);
        self.current_interval = next.min(self.config.max_interval);
        trace!(
            interval_ms = self.current_interval.as_millis() as u64,
            "Nothing due, backing off"
        );
    }

    fn reset_backoff(&mut self) {
        self.current_interval = self.config.min_interval;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crmflow_core::{
        Channels, CreateTemplate, DelayUnit, EngineConfig, InMemoryStore, Industry, Lead,
        LeadStore, NewWorkflowTask, RecordingChannel, StartInstance,
    };

    struct Setup {
        engine: Arc<WorkflowEngine>,
        campaigns: Arc<CampaignService>,
        channel: Arc<RecordingChannel>,
        store: Arc<InMemoryStore>,
    }

    fn setup() -> Setup {
        let store = Arc::new(InMemoryStore::new());
        let channel = Arc::new(RecordingChannel::new());
        let channels = Channels::new(channel.clone(), channel.clone());
        let config = EngineConfig::default().without_pacing();
        Setup {
            engine: Arc::new(
                WorkflowEngine::new(store.clone(), channels.clone()).with_config(config.clone()),
            ),
            campaigns: Arc::new(CampaignService::new(store.clone(), channels).with_config(config)),
            channel,
            store,
        }
    }

    fn poller(s: &Setup, config: PollerConfig) -> (DuePoller, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (
            DuePoller::new(s.engine.clone(), s.campaigns.clone(), config, rx),
            tx,
        )
    }

    #[tokio::test]
    async fn test_poll_runs_due_execution() {
        let s = setup();
        let user = uuid::Uuid::now_v7();
        let lead = s
            .store
            .create_lead(Lead::new(user, "Acme").with_email("a@example.com"))
            .await
            .unwrap();
        let template = s
            .engine
            .create_template(
                user,
                CreateTemplate {
                    name: "Later".to_string(),
                    description: None,
                    industry: Industry::General,
                    is_active: true,
                    tasks: vec![NewWorkflowTask::new("Email", "SEND_EMAIL").delayed(1, DelayUnit::Hours)],
                },
            )
            .await
            .unwrap();
        s.engine
            .start_instance(user, StartInstance::new(template.id).for_lead(lead.id))
            .await
            .unwrap();

        let (poller, _tx) = poller(&s, PollerConfig::default());
        assert!(poller.poll_once(Utc::now()).await.unwrap().is_idle());

        let later = Utc::now() + chrono::Duration::hours(2);
        let stats = poller.poll_once(later).await.unwrap();
        assert_eq!(stats.executions, 1);
        assert_eq!(s.channel.emails().len(), 1);
    }

    #[tokio::test]
    async fn test_backoff_grows_and_resets() {
        let s = setup();
        let config = PollerConfig::new()
            .with_min_interval(Duration::from_millis(100))
            .with_max_interval(Duration::from_millis(200))
            .with_backoff_multiplier(2.0);
        let (mut poller, _tx) = poller(&s, config);

        poller.increase_backoff();
        assert_eq!(poller.current_interval(), Duration::from_millis(200));
        poller.increase_backoff();
        assert_eq!(poller.current_interval(), Duration::from_millis(200));
        poller.reset_backoff();
        assert_eq!(poller.current_interval(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let s = setup();
        let config = PollerConfig::new().with_min_interval(Duration::from_millis(10));
        let (poller, tx) = poller(&s, config);

        let handle = tokio::spawn(poller.run());
        tokio::time::sleep(Duration::from_millis(30)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
    }
}
