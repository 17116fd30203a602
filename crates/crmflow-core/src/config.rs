// Engine configuration

use std::time::Duration;

/// Tunables shared by the workflow engine and the campaign service
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Fixed pause between two campaign sends
    pub send_pacing: Duration,
    /// Upper bound on zero-delay steps run inline by one walk
    pub max_inline_steps: usize,
    /// Urgency attached to HITL notifications
    pub hitl_urgency: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            send_pacing: Duration::from_millis(50),
            max_inline_steps: 100,
            hitl_urgency: "MEDIUM".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let send_pacing = std::env::var("CAMPAIGN_SEND_PACING_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.send_pacing);

        let max_inline_steps = std::env::var("WORKFLOW_MAX_INLINE_STEPS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_inline_steps);

        let hitl_urgency =
            std::env::var("HITL_URGENCY").unwrap_or(defaults.hitl_urgency);

        Self {
            send_pacing,
            max_inline_steps,
            hitl_urgency,
        }
    }

    /// No pacing; used by tests
    pub fn without_pacing(mut self) -> Self {
        self.send_pacing = Duration::ZERO;
        self
    }
}
