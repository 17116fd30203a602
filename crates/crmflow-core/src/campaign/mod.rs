// Campaign domain types
//
// Campaigns deliver one message (or a drip sequence) to many leads over email, SMS
// or both. Two delivery paths exist:
// - Blast sends: recipients are materialized as PENDING rows and drained by `send_pending`
// - Drip sequences: enrollments carry a step pointer and a next_send_at timestamp

mod service;

pub use service::{CampaignService, EnrollmentReport, SendReport};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::template::DelayUnit;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignChannel {
    Email,
    Sms,
    MultiChannel,
}

impl CampaignChannel {
    pub fn uses_email(&self) -> bool {
        matches!(self, CampaignChannel::Email | CampaignChannel::MultiChannel)
    }

    pub fn uses_sms(&self) -> bool {
        matches!(self, CampaignChannel::Sms | CampaignChannel::MultiChannel)
    }
}

impl std::fmt::Display for CampaignChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignChannel::Email => write!(f, "EMAIL"),
            CampaignChannel::Sms => write!(f, "SMS"),
            CampaignChannel::MultiChannel => write!(f, "MULTI_CHANNEL"),
        }
    }
}

impl From<&str> for CampaignChannel {
    fn from(s: &str) -> Self {
        match s {
            "SMS" => CampaignChannel::Sms,
            "MULTI_CHANNEL" => CampaignChannel::MultiChannel,
            _ => CampaignChannel::Email,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Running,
    Paused,
    Completed,
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "DRAFT"),
            CampaignStatus::Running => write!(f, "RUNNING"),
            CampaignStatus::Paused => write!(f, "PAUSED"),
            CampaignStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl From<&str> for CampaignStatus {
    fn from(s: &str) -> Self {
        match s {
            "RUNNING" => CampaignStatus::Running,
            "PAUSED" => CampaignStatus::Paused,
            "COMPLETED" => CampaignStatus::Completed,
            _ => CampaignStatus::Draft,
        }
    }
}

/// One step of a drip sequence; the delay is measured from the previous step
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct DripStep {
    #[serde(default)]
    pub delay_value: i64,
    #[serde(default)]
    pub delay_unit: DelayUnit,
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
}

/// A/B split: `split_percent` of enrollments receive variant B
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct AbTest {
    pub split_percent: u8,
    #[serde(default)]
    pub subject_b: Option<String>,
    pub body_b: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct Campaign {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub channel: CampaignChannel,
    pub status: CampaignStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sms_template: Option<String>,
    #[serde(default)]
    pub drip_steps: Vec<DripStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ab_test: Option<AbTest>,
    pub total_recipients: i64,
    pub sent_count: i64,
    pub failed_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Active,
    Paused,
    Completed,
    Unsubscribed,
}

impl EnrollmentStatus {
    /// Enrollments that block re-enrollment of the same lead
    pub fn is_live(&self) -> bool {
        matches!(self, EnrollmentStatus::Active | EnrollmentStatus::Paused)
    }
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnrollmentStatus::Active => write!(f, "ACTIVE"),
            EnrollmentStatus::Paused => write!(f, "PAUSED"),
            EnrollmentStatus::Completed => write!(f, "COMPLETED"),
            EnrollmentStatus::Unsubscribed => write!(f, "UNSUBSCRIBED"),
        }
    }
}

impl From<&str> for EnrollmentStatus {
    fn from(s: &str) -> Self {
        match s {
            "PAUSED" => EnrollmentStatus::Paused,
            "COMPLETED" => EnrollmentStatus::Completed,
            "UNSUBSCRIBED" => EnrollmentStatus::Unsubscribed,
            _ => EnrollmentStatus::Active,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub enum AbVariant {
    A,
    B,
}

impl AbVariant {
    /// Stable assignment from the lead id: the same lead always lands in the same arm
    pub fn assign(lead_id: Uuid, split_percent: u8) -> Self {
        let bucket = (lead_id.as_u128() % 100) as u8;
        if bucket < split_percent.min(100) {
            AbVariant::B
        } else {
            AbVariant::A
        }
    }
}

impl std::fmt::Display for AbVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbVariant::A => write!(f, "A"),
            AbVariant::B => write!(f, "B"),
        }
    }
}

impl From<&str> for AbVariant {
    fn from(s: &str) -> Self {
        match s {
            "B" => AbVariant::B,
            _ => AbVariant::A,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CampaignEnrollment {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub status: EnrollmentStatus,
    pub ab_variant: AbVariant,
    pub current_step: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_send_at: Option<DateTime<Utc>>,
    pub enrolled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecipientStatus {
    Pending,
    Sent,
    Failed,
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipientStatus::Pending => write!(f, "PENDING"),
            RecipientStatus::Sent => write!(f, "SENT"),
            RecipientStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl From<&str> for RecipientStatus {
    fn from(s: &str) -> Self {
        match s {
            "SENT" => RecipientStatus::Sent,
            "FAILED" => RecipientStatus::Failed,
            _ => RecipientStatus::Pending,
        }
    }
}

/// One delivery of a blast send
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CampaignRecipient {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub lead_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub status: RecipientStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CreateCampaign {
    pub name: String,
    pub channel: CampaignChannel,
    #[serde(default)]
    pub email_subject: Option<String>,
    #[serde(default)]
    pub email_body: Option<String>,
    #[serde(default)]
    pub sms_template: Option<String>,
    #[serde(default)]
    pub drip_steps: Vec<DripStep>,
    #[serde(default)]
    pub ab_test: Option<AbTest>,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct UpdateCampaign {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub channel: Option<CampaignChannel>,
    #[serde(default)]
    pub email_subject: Option<String>,
    #[serde(default)]
    pub email_body: Option<String>,
    #[serde(default)]
    pub sms_template: Option<String>,
    #[serde(default)]
    pub drip_steps: Option<Vec<DripStep>>,
    #[serde(default)]
    pub ab_test: Option<AbTest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ab_assignment_is_stable() {
        let lead = Uuid::now_v7();
        let first = AbVariant::assign(lead, 50);
        for _ in 0..10 {
            assert_eq!(AbVariant::assign(lead, 50), first);
        }
    }

    #[test]
    fn test_ab_split_bounds() {
        let lead = Uuid::now_v7();
        assert_eq!(AbVariant::assign(lead, 0), AbVariant::A);
        assert_eq!(AbVariant::assign(lead, 100), AbVariant::B);
    }

    #[test]
    fn test_ab_split_is_roughly_proportional() {
        let b = (0..1000u128)
            .map(|n| AbVariant::assign(Uuid::from_u128(n * 7919 + 13), 30))
            .filter(|v| *v == AbVariant::B)
            .count();
        assert!((200..400).contains(&b), "got {b} B assignments");
    }

    #[test]
    fn test_channel_contacts() {
        assert!(CampaignChannel::MultiChannel.uses_email());
        assert!(CampaignChannel::MultiChannel.uses_sms());
        assert!(!CampaignChannel::Sms.uses_email());
    }

    #[test]
    fn test_live_enrollments() {
        assert!(EnrollmentStatus::Paused.is_live());
        assert!(!EnrollmentStatus::Completed.is_live());
    }
}
