// Campaign service: enrollment, blast sends, drip sequences

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Map;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::{
    AbVariant, Campaign, CampaignChannel, CampaignEnrollment, CampaignRecipient, CampaignStatus,
    CreateCampaign, DripStep, EnrollmentStatus, RecipientStatus, UpdateCampaign,
};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::lead::Lead;
use crate::personalize::personalize;
use crate::traits::{Channels, Store};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct EnrollmentReport {
    pub enrolled: usize,
    /// Leads that are unknown, foreign, unsubscribed or lack the channel's contact
    pub skipped: usize,
    pub already_enrolled: usize,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct SendReport {
    pub processed: usize,
    pub sent_count: usize,
    pub failed_count: usize,
}

/// Resolved message for one recipient
struct Message {
    subject: String,
    email_body: Option<String>,
    sms_body: Option<String>,
}

pub struct CampaignService {
    store: Arc<dyn Store>,
    channels: Channels,
    config: EngineConfig,
}

impl CampaignService {
    pub fn new(store: Arc<dyn Store>, channels: Channels) -> Self {
        Self {
            store,
            channels,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    async fn owned_campaign(&self, campaign_id: Uuid, user_id: Uuid) -> Result<Campaign> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| Error::not_found("Campaign", campaign_id))?;
        if campaign.user_id != user_id {
            return Err(Error::forbidden("Campaign belongs to another user"));
        }
        Ok(campaign)
    }

    pub async fn get_campaign(&self, campaign_id: Uuid, user_id: Uuid) -> Result<Campaign> {
        self.owned_campaign(campaign_id, user_id).await
    }

    pub async fn create_campaign(&self, user_id: Uuid, req: CreateCampaign) -> Result<Campaign> {
        if req.name.trim().is_empty() {
            return Err(Error::rule("Campaign name is required"));
        }
        validate_drip_steps(&req.drip_steps)?;
        if let Some(ab) = &req.ab_test {
            if ab.split_percent > 100 {
                return Err(Error::rule("A/B split percent must be between 0 and 100"));
            }
        }

        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::now_v7(),
            user_id,
            name: req.name,
            channel: req.channel,
            status: CampaignStatus::Draft,
            email_subject: req.email_subject,
            email_body: req.email_body,
            sms_template: req.sms_template,
            drip_steps: req.drip_steps,
            ab_test: req.ab_test,
            total_recipients: 0,
            sent_count: 0,
            failed_count: 0,
            created_at: now,
            updated_at: now,
        };
        let campaign = self.store.create_campaign(campaign).await?;
        info!(campaign_id = %campaign.id, channel = %campaign.channel, "Campaign created");
        Ok(campaign)
    }

    /// Edit a campaign; running campaigns must be paused first
    pub async fn update_campaign(
        &self,
        campaign_id: Uuid,
        user_id: Uuid,
        req: UpdateCampaign,
    ) -> Result<Campaign> {
        let mut campaign = self.owned_campaign(campaign_id, user_id).await?;
        if campaign.status == CampaignStatus::Running {
            return Err(Error::rule("Cannot edit a running campaign. Pause it first."));
        }
        if let Some(steps) = &req.drip_steps {
            validate_drip_steps(steps)?;
        }
        if let Some(ab) = &req.ab_test {
            if ab.split_percent > 100 {
                return Err(Error::rule("A/B split percent must be between 0 and 100"));
            }
        }

        if let Some(name) = req.name {
            campaign.name = name;
        }
        if let Some(channel) = req.channel {
            campaign.channel = channel;
        }
        if req.email_subject.is_some() {
            campaign.email_subject = req.email_subject;
        }
        if req.email_body.is_some() {
            campaign.email_body = req.email_body;
        }
        if req.sms_template.is_some() {
            campaign.sms_template = req.sms_template;
        }
        if let Some(steps) = req.drip_steps {
            campaign.drip_steps = steps;
        }
        if req.ab_test.is_some() {
            campaign.ab_test = req.ab_test;
        }
        campaign.updated_at = Utc::now();

        self.store.update_campaign(&campaign).await?;
        Ok(campaign)
    }

    // ========================================================================
    // Enrollment
    // ========================================================================

    /// Enroll leads into the campaign's drip sequence. Leads already ACTIVE or
    /// PAUSED in the campaign are never enrolled twice.
    #[instrument(skip(self, lead_ids), fields(leads = lead_ids.len()))]
    pub async fn enroll_leads(
        &self,
        campaign_id: Uuid,
        user_id: Uuid,
        lead_ids: &[Uuid],
    ) -> Result<EnrollmentReport> {
        let campaign = self.owned_campaign(campaign_id, user_id).await?;
        if campaign.status == CampaignStatus::Completed {
            return Err(Error::rule("Cannot enroll leads in a completed campaign"));
        }

        let mut report = EnrollmentReport::default();
        let mut seen = HashSet::new();
        let now = Utc::now();

        for &lead_id in lead_ids {
            if !seen.insert(lead_id) {
                continue;
            }

            let lead = match self.store.get_lead(lead_id).await? {
                Some(lead) if lead.user_id == user_id => lead,
                _ => {
                    report.skipped += 1;
                    continue;
                }
            };
            if !has_contact(campaign.channel, &lead) {
                report.skipped += 1;
                continue;
            }

            match self.store.get_enrollment(campaign.id, lead_id).await? {
                Some(existing) if existing.status.is_live() => {
                    report.already_enrolled += 1;
                    continue;
                }
                Some(existing) if existing.status == EnrollmentStatus::Unsubscribed => {
                    report.skipped += 1;
                    continue;
                }
                _ => {}
            }

            let variant = campaign
                .ab_test
                .as_ref()
                .map(|ab| AbVariant::assign(lead_id, ab.split_percent))
                .unwrap_or(AbVariant::A);
            let next_send_at = campaign
                .drip_steps
                .first()
                .map(|step| now + step.delay_unit.duration(step.delay_value));

            let enrollment = CampaignEnrollment {
                id: Uuid::now_v7(),
                campaign_id: campaign.id,
                lead_id,
                status: EnrollmentStatus::Active,
                ab_variant: variant,
                current_step: 0,
                next_send_at,
                enrolled_at: now,
            };
            self.store.save_enrollment(&enrollment).await?;
            report.enrolled += 1;
        }

        info!(
            enrolled = report.enrolled,
            skipped = report.skipped,
            already_enrolled = report.already_enrolled,
            "Leads enrolled"
        );
        Ok(report)
    }

    // ========================================================================
    // Blast sends
    // ========================================================================

    /// Materialize PENDING recipients and mark the campaign RUNNING
    #[instrument(skip(self, lead_ids), fields(leads = lead_ids.len()))]
    pub async fn start_send(
        &self,
        campaign_id: Uuid,
        user_id: Uuid,
        lead_ids: &[Uuid],
    ) -> Result<Campaign> {
        let mut campaign = self.owned_campaign(campaign_id, user_id).await?;
        match campaign.status {
            CampaignStatus::Running => return Err(Error::rule("Campaign is already running")),
            CampaignStatus::Completed => return Err(Error::rule("Campaign has already been sent")),
            CampaignStatus::Draft | CampaignStatus::Paused => {}
        }

        let mut seen = HashSet::new();
        let mut recipients = Vec::new();
        for &lead_id in lead_ids {
            if !seen.insert(lead_id) {
                continue;
            }
            match self.store.get_lead(lead_id).await? {
                Some(lead) if lead.user_id == user_id => recipients.push(CampaignRecipient {
                    id: Uuid::now_v7(),
                    campaign_id: campaign.id,
                    lead_id,
                    name: lead.display_name().to_string(),
                    email: lead.email().map(str::to_string),
                    phone: lead.phone().map(str::to_string),
                    status: RecipientStatus::Pending,
                    error_message: None,
                    sent_at: None,
                }),
                _ => warn!(lead_id = %lead_id, "Skipping unknown recipient"),
            }
        }
        if recipients.is_empty() && campaign.status == CampaignStatus::Draft {
            return Err(Error::rule("No recipients to send to"));
        }

        let added = recipients.len() as i64;
        self.store.create_recipients(recipients).await?;

        campaign.total_recipients += added;
        campaign.status = CampaignStatus::Running;
        campaign.updated_at = Utc::now();
        self.store.update_campaign(&campaign).await?;
        info!(recipients = added, "Campaign send started");
        Ok(campaign)
    }

    /// Deliver every PENDING recipient. A recipient without the channel's contact or
    /// whose delivery fails is marked FAILED; sent + failed always equals processed.
    #[instrument(skip(self))]
    pub async fn send_pending(&self, campaign_id: Uuid) -> Result<SendReport> {
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| Error::not_found("Campaign", campaign_id))?;
        let mut report = SendReport::default();
        if campaign.status != CampaignStatus::Running {
            return Ok(report);
        }

        let pending = self.store.pending_recipients(campaign.id).await?;
        for (i, mut recipient) in pending.into_iter().enumerate() {
            if i > 0 {
                if !self.config.send_pacing.is_zero() {
                    tokio::time::sleep(self.config.send_pacing).await;
                }
                // A pause lands between recipients; the rest stay PENDING for resume
                let status = self.store.get_campaign(campaign.id).await?.map(|c| c.status);
                if status != Some(CampaignStatus::Running) {
                    info!(processed = report.processed, "Campaign no longer running; stopping send");
                    break;
                }
            }

            let lead = self.recipient_lead(&recipient).await;
            let variant = campaign
                .ab_test
                .as_ref()
                .map(|ab| AbVariant::assign(recipient.lead_id, ab.split_percent))
                .unwrap_or(AbVariant::A);
            let message = blast_message(&campaign, variant, &lead);

            match self.deliver(campaign.channel, &lead, &message).await {
                Ok(()) => {
                    recipient.status = RecipientStatus::Sent;
                    recipient.sent_at = Some(Utc::now());
                    recipient.error_message = None;
                    report.sent_count += 1;
                    self.store.increment_counters(campaign.id, 1, 0).await?;
                }
                Err(message) => {
                    recipient.status = RecipientStatus::Failed;
                    recipient.error_message = Some(message);
                    report.failed_count += 1;
                    self.store.increment_counters(campaign.id, 0, 1).await?;
                }
            }
            self.store.update_recipient(&recipient).await?;
            report.processed += 1;
        }

        if self.store.pending_recipients(campaign.id).await?.is_empty() {
            if let Some(mut latest) = self.store.get_campaign(campaign.id).await? {
                if latest.status == CampaignStatus::Running {
                    latest.status = CampaignStatus::Completed;
                    latest.updated_at = Utc::now();
                    self.store.update_campaign(&latest).await?;
                }
            }
        }

        info!(
            processed = report.processed,
            sent = report.sent_count,
            failed = report.failed_count,
            "Campaign batch sent"
        );
        Ok(report)
    }

    /// Lead used for personalization, falling back to the recipient snapshot
    async fn recipient_lead(&self, recipient: &CampaignRecipient) -> Lead {
        let snapshot = || {
            let mut lead = Lead::new(Uuid::nil(), recipient.name.clone());
            lead.id = recipient.lead_id;
            lead.email = recipient.email.clone();
            lead.phone = recipient.phone.clone();
            lead
        };
        match self.store.get_lead(recipient.lead_id).await {
            Ok(Some(mut lead)) => {
                // Deliver to the contact captured when the send started
                lead.email = recipient.email.clone();
                lead.phone = recipient.phone.clone();
                lead
            }
            Ok(None) => snapshot(),
            Err(e) => {
                warn!(lead_id = %recipient.lead_id, error = %e, "Lead lookup failed, using recipient snapshot");
                snapshot()
            }
        }
    }

    /// Send over the campaign channel. MULTI_CHANNEL succeeds when any channel does.
    async fn deliver(
        &self,
        channel: CampaignChannel,
        lead: &Lead,
        message: &Message,
    ) -> std::result::Result<(), String> {
        let mut errors = Vec::new();
        let mut delivered = false;

        if channel.uses_email() {
            match (lead.email(), &message.email_body) {
                (Some(to), Some(body)) => {
                    match self.channels.email.send_email(to, &message.subject, body).await {
                        Ok(_) => delivered = true,
                        Err(e) => errors.push(format!("Email failed: {}", e)),
                    }
                }
                (None, _) => errors.push("No email address".to_string()),
                (_, None) => errors.push("No email content".to_string()),
            }
        }
        if channel.uses_sms() {
            match (lead.phone(), &message.sms_body) {
                (Some(to), Some(body)) => match self.channels.sms.send_sms(to, body).await {
                    Ok(_) => delivered = true,
                    Err(e) => errors.push(format!("SMS failed: {}", e)),
                },
                (None, _) => errors.push("No phone number".to_string()),
                (_, None) => errors.push("No SMS content".to_string()),
            }
        }

        if delivered {
            Ok(())
        } else {
            Err(errors.join("; "))
        }
    }

    // ========================================================================
    // Pause / resume
    // ========================================================================

    pub async fn pause(&self, campaign_id: Uuid, user_id: Uuid) -> Result<Campaign> {
        let mut campaign = self.owned_campaign(campaign_id, user_id).await?;
        if campaign.status != CampaignStatus::Running {
            return Err(Error::rule("Only running campaigns can be paused"));
        }
        campaign.status = CampaignStatus::Paused;
        campaign.updated_at = Utc::now();
        self.store.update_campaign(&campaign).await?;
        let paused = self
            .store
            .set_enrollments_status(campaign.id, EnrollmentStatus::Active, EnrollmentStatus::Paused)
            .await?;
        info!(campaign_id = %campaign.id, enrollments = paused, "Campaign paused");
        Ok(campaign)
    }

    pub async fn resume(&self, campaign_id: Uuid, user_id: Uuid) -> Result<Campaign> {
        let mut campaign = self.owned_campaign(campaign_id, user_id).await?;
        if campaign.status != CampaignStatus::Paused {
            return Err(Error::rule("Only paused campaigns can be resumed"));
        }
        campaign.status = CampaignStatus::Running;
        campaign.updated_at = Utc::now();
        self.store.update_campaign(&campaign).await?;
        let resumed = self
            .store
            .set_enrollments_status(campaign.id, EnrollmentStatus::Paused, EnrollmentStatus::Active)
            .await?;
        info!(campaign_id = %campaign.id, enrollments = resumed, "Campaign resumed");
        Ok(campaign)
    }

    /// Start a drip campaign: enrollments begin receiving steps once it is RUNNING
    pub async fn activate(&self, campaign_id: Uuid, user_id: Uuid) -> Result<Campaign> {
        let mut campaign = self.owned_campaign(campaign_id, user_id).await?;
        if campaign.status != CampaignStatus::Draft {
            return Err(Error::rule("Only draft campaigns can be activated"));
        }
        if campaign.drip_steps.is_empty() {
            return Err(Error::rule("Campaign has no drip steps"));
        }
        campaign.status = CampaignStatus::Running;
        campaign.updated_at = Utc::now();
        self.store.update_campaign(&campaign).await?;
        Ok(campaign)
    }

    // ========================================================================
    // Drip sequences
    // ========================================================================

    /// Send the current step to due enrollments and schedule the next one
    pub async fn process_due_enrollments(&self, now: DateTime<Utc>, limit: usize) -> Result<usize> {
        let due = self.store.due_enrollments(now, limit).await?;
        let mut processed = 0;
        for enrollment in due {
            match self.advance_enrollment(enrollment.clone(), now).await {
                Ok(()) => processed += 1,
                Err(e) => error!(
                    enrollment_id = %enrollment.id,
                    error = %e,
                    "Failed to process drip enrollment"
                ),
            }
        }
        Ok(processed)
    }

    async fn advance_enrollment(&self, mut enrollment: CampaignEnrollment, now: DateTime<Utc>) -> Result<()> {
        let campaign = self
            .store
            .get_campaign(enrollment.campaign_id)
            .await?
            .ok_or_else(|| Error::not_found("Campaign", enrollment.campaign_id))?;

        let step_index = enrollment.current_step.max(0) as usize;
        let Some(step) = campaign.drip_steps.get(step_index) else {
            enrollment.status = EnrollmentStatus::Completed;
            enrollment.next_send_at = None;
            return self.store.save_enrollment(&enrollment).await;
        };

        let lead = self
            .store
            .get_lead(enrollment.lead_id)
            .await?
            .ok_or_else(|| Error::not_found("Lead", enrollment.lead_id))?;

        let body = match (&campaign.ab_test, enrollment.ab_variant, step_index) {
            (Some(ab), AbVariant::B, 0) => ab.body_b.as_str(),
            _ => step.body.as_str(),
        };
        let subject = match (&campaign.ab_test, enrollment.ab_variant, step_index) {
            (Some(ab), AbVariant::B, 0) if ab.subject_b.is_some() => ab.subject_b.clone(),
            _ => step.subject.clone().or_else(|| campaign.email_subject.clone()),
        }
        .unwrap_or_else(|| campaign.name.clone());

        let extra = Map::new();
        let rendered = personalize(body, &lead, &extra);
        let message = Message {
            subject: personalize(&subject, &lead, &extra),
            email_body: Some(rendered.clone()),
            sms_body: Some(rendered),
        };

        match self.deliver(campaign.channel, &lead, &message).await {
            Ok(()) => self.store.increment_counters(campaign.id, 1, 0).await?,
            Err(reason) => {
                warn!(lead_id = %lead.id, step = step_index, reason = %reason, "Drip step not delivered");
                self.store.increment_counters(campaign.id, 0, 1).await?;
            }
        }

        enrollment.current_step += 1;
        match campaign.drip_steps.get(step_index + 1) {
            Some(next) => {
                enrollment.next_send_at = Some(now + next.delay_unit.duration(next.delay_value));
            }
            None => {
                enrollment.status = EnrollmentStatus::Completed;
                enrollment.next_send_at = None;
            }
        }
        self.store.save_enrollment(&enrollment).await
    }
}

fn validate_drip_steps(steps: &[DripStep]) -> Result<()> {
    for step in steps {
        step.delay_unit.validate(step.delay_value)?;
    }
    Ok(())
}

fn has_contact(channel: CampaignChannel, lead: &Lead) -> bool {
    match channel {
        CampaignChannel::Email => lead.email().is_some(),
        CampaignChannel::Sms => lead.phone().is_some(),
        CampaignChannel::MultiChannel => lead.email().is_some() || lead.phone().is_some(),
    }
}

fn blast_message(campaign: &Campaign, variant: AbVariant, lead: &Lead) -> Message {
    let extra = Map::new();
    let (subject, body) = match (&campaign.ab_test, variant) {
        (Some(ab), AbVariant::B) => (
            ab.subject_b.clone().or_else(|| campaign.email_subject.clone()),
            Some(ab.body_b.clone()),
        ),
        _ => (campaign.email_subject.clone(), campaign.email_body.clone()),
    };
    let subject = subject.unwrap_or_else(|| campaign.name.clone());

    Message {
        subject: personalize(&subject, lead, &extra),
        email_body: body.map(|b| personalize(&b, lead, &extra)),
        sms_body: campaign
            .sms_template
            .as_deref()
            .map(|t| personalize(t, lead, &extra)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::AbTest;
    use crate::channels::RecordingChannel;
    use crate::memory::InMemoryStore;
    use crate::template::DelayUnit;
    use crate::traits::{CampaignStore, LeadStore};

    struct Harness {
        store: Arc<InMemoryStore>,
        channel: Arc<RecordingChannel>,
        service: CampaignService,
        user: Uuid,
    }

    impl Harness {
        fn new() -> Self {
            let store = Arc::new(InMemoryStore::new());
            let channel = Arc::new(RecordingChannel::new());
            let service = CampaignService::new(
                store.clone(),
                Channels::new(channel.clone(), channel.clone()),
            )
            .with_config(EngineConfig::default().without_pacing());
            Self {
                store,
                channel,
                service,
                user: Uuid::now_v7(),
            }
        }

        async fn lead(&self, name: &str, email: Option<&str>, phone: Option<&str>) -> Uuid {
            let mut lead = Lead::new(self.user, name).with_contact(name);
            lead.email = email.map(str::to_string);
            lead.phone = phone.map(str::to_string);
            self.store.create_lead(lead).await.unwrap().id
        }

        async fn campaign(&self, channel: CampaignChannel) -> Campaign {
            self.service
                .create_campaign(
                    self.user,
                    CreateCampaign {
                        name: "Spring Promo".to_string(),
                        channel,
                        email_subject: Some("Hi {{firstName}}".to_string()),
                        email_body: Some("Spring deals for {{name}}".to_string()),
                        sms_template: Some("Hi {firstName}, spring deals inside".to_string()),
                        drip_steps: vec![],
                        ab_test: None,
                    },
                )
                .await
                .unwrap()
        }
    }

    #[tokio::test]
    async fn test_cannot_edit_running_campaign() {
        let h = Harness::new();
        let campaign = h.campaign(CampaignChannel::Email).await;
        let lead = h.lead("Ann", Some("ann@example.com"), None).await;
        h.service.start_send(campaign.id, h.user, &[lead]).await.unwrap();

        let err = h
            .service
            .update_campaign(campaign.id, h.user, UpdateCampaign::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Cannot edit a running campaign. Pause it first.");

        h.service.pause(campaign.id, h.user).await.unwrap();
        let updated = h
            .service
            .update_campaign(
                campaign.id,
                h.user,
                UpdateCampaign {
                    name: Some("Summer Promo".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Summer Promo");
    }

    #[tokio::test]
    async fn test_overlong_drip_delay_is_rejected() {
        let h = Harness::new();
        let step = DripStep {
            delay_value: i64::MAX,
            delay_unit: DelayUnit::Hours,
            subject: None,
            body: "Checking in".to_string(),
        };
        let err = h
            .service
            .create_campaign(
                h.user,
                CreateCampaign {
                    name: "Drip".to_string(),
                    channel: CampaignChannel::Email,
                    email_subject: None,
                    email_body: None,
                    sms_template: None,
                    drip_steps: vec![step.clone()],
                    ab_test: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BusinessRule(_)));

        let campaign = h.campaign(CampaignChannel::Email).await;
        let err = h
            .service
            .update_campaign(
                campaign.id,
                h.user,
                UpdateCampaign {
                    drip_steps: Some(vec![step]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BusinessRule(_)));
    }

    #[tokio::test]
    async fn test_stale_campaign_update_keeps_counters() {
        let h = Harness::new();
        let campaign = h.campaign(CampaignChannel::Sms).await;
        let mut snapshot = h.store.get_campaign(campaign.id).await.unwrap().unwrap();

        h.store.increment_counters(campaign.id, 3, 2).await.unwrap();
        snapshot.status = CampaignStatus::Paused;
        snapshot.name = "Renamed".to_string();
        h.store.update_campaign(&snapshot).await.unwrap();

        let stored = h.store.get_campaign(campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Paused);
        assert_eq!(stored.name, "Renamed");
        assert_eq!(stored.sent_count, 3);
        assert_eq!(stored.failed_count, 2);
    }

    #[tokio::test]
    async fn test_start_send_twice_is_rejected() {
        let h = Harness::new();
        let campaign = h.campaign(CampaignChannel::Sms).await;
        let lead = h.lead("Ann", None, Some("+1555")).await;
        h.service.start_send(campaign.id, h.user, &[lead]).await.unwrap();
        let err = h.service.start_send(campaign.id, h.user, &[lead]).await.unwrap_err();
        assert!(matches!(err, Error::BusinessRule(_)));
    }

    #[tokio::test]
    async fn test_paused_campaign_sends_nothing() {
        let h = Harness::new();
        let campaign = h.campaign(CampaignChannel::Sms).await;
        let lead = h.lead("Ann", None, Some("+1555")).await;
        h.service.start_send(campaign.id, h.user, &[lead]).await.unwrap();
        h.service.pause(campaign.id, h.user).await.unwrap();

        let report = h.service.send_pending(campaign.id).await.unwrap();
        assert_eq!(report, SendReport::default());
        assert!(h.channel.sms().is_empty());

        h.service.resume(campaign.id, h.user).await.unwrap();
        let report = h.service.send_pending(campaign.id).await.unwrap();
        assert_eq!(report.sent_count, 1);
        let campaign = h.store.get_campaign(campaign.id).await.unwrap().unwrap();
        assert_eq!(campaign.status, CampaignStatus::Completed);
    }

    /// Pauses the campaign from inside the first delivery
    struct PausingSms {
        store: Arc<InMemoryStore>,
        campaign_id: parking_lot::Mutex<Option<Uuid>>,
        sent: parking_lot::Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl crate::traits::SmsSender for PausingSms {
        async fn send_sms(&self, _to: &str, _body: &str) -> Result<String> {
            *self.sent.lock() += 1;
            let id = *self.campaign_id.lock();
            if let Some(id) = id {
                let mut campaign = self.store.get_campaign(id).await?.unwrap();
                campaign.status = CampaignStatus::Paused;
                self.store.update_campaign(&campaign).await?;
            }
            Ok("sms-1".to_string())
        }
    }

    #[tokio::test]
    async fn test_pause_stops_send_between_recipients() {
        let h = Harness::new();
        let sms = Arc::new(PausingSms {
            store: h.store.clone(),
            campaign_id: parking_lot::Mutex::new(None),
            sent: parking_lot::Mutex::new(0),
        });
        let service = CampaignService::new(
            h.store.clone(),
            Channels::new(sms.clone(), h.channel.clone()),
        )
        .with_config(EngineConfig::default().without_pacing());
        let campaign = h.campaign(CampaignChannel::Sms).await;
        let mut leads = vec![];
        for name in ["Ann", "Bob", "Cy"] {
            leads.push(h.lead(name, None, Some("+1555")).await);
        }
        service.start_send(campaign.id, h.user, &leads).await.unwrap();
        *sms.campaign_id.lock() = Some(campaign.id);

        let report = service.send_pending(campaign.id).await.unwrap();
        assert_eq!(report.processed, 1);
        assert_eq!(*sms.sent.lock(), 1);
        assert_eq!(h.store.pending_recipients(campaign.id).await.unwrap().len(), 2);
        let stored = h.store.get_campaign(campaign.id).await.unwrap().unwrap();
        assert_eq!(stored.status, CampaignStatus::Paused);
        assert_eq!(stored.sent_count, 1);
    }

    #[tokio::test]
    async fn test_blast_personalizes_per_recipient() {
        let h = Harness::new();
        let campaign = h.campaign(CampaignChannel::Email).await;
        let lead = h.lead("Ann Lee", Some("ann@example.com"), None).await;
        h.service.start_send(campaign.id, h.user, &[lead]).await.unwrap();
        h.service.send_pending(campaign.id).await.unwrap();

        let sent = h.channel.emails();
        assert_eq!(sent[0].subject.as_deref(), Some("Hi Ann"));
        assert_eq!(sent[0].body, "Spring deals for Ann Lee");
    }

    #[tokio::test]
    async fn test_multi_channel_enrollment_accepts_either_contact() {
        let h = Harness::new();
        let campaign = h.campaign(CampaignChannel::MultiChannel).await;
        let phone_only = h.lead("P", None, Some("+1555")).await;
        let nothing = h.lead("N", None, None).await;
        let report = h
            .service
            .enroll_leads(campaign.id, h.user, &[phone_only, nothing])
            .await
            .unwrap();
        assert_eq!(report.enrolled, 1);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn test_drip_sequence_advances_and_completes() {
        let h = Harness::new();
        let campaign = h
            .service
            .create_campaign(
                h.user,
                CreateCampaign {
                    name: "Welcome series".to_string(),
                    channel: CampaignChannel::Email,
                    email_subject: Some("Welcome".to_string()),
                    email_body: None,
                    sms_template: None,
                    drip_steps: vec![
                        DripStep {
                            delay_value: 0,
                            delay_unit: DelayUnit::Minutes,
                            subject: None,
                            body: "Step one for {{firstName}}".to_string(),
                        },
                        DripStep {
                            delay_value: 2,
                            delay_unit: DelayUnit::Days,
                            subject: Some("Still there?".to_string()),
                            body: "Step two".to_string(),
                        },
                    ],
                    ab_test: None,
                },
            )
            .await
            .unwrap();
        let lead = h.lead("Ann", Some("ann@example.com"), None).await;
        h.service.enroll_leads(campaign.id, h.user, &[lead]).await.unwrap();

        // Draft campaigns do not send
        assert_eq!(h.service.process_due_enrollments(Utc::now(), 10).await.unwrap(), 0);
        h.service.activate(campaign.id, h.user).await.unwrap();

        assert_eq!(h.service.process_due_enrollments(Utc::now(), 10).await.unwrap(), 1);
        let enrollment = h.store.get_enrollment(campaign.id, lead).await.unwrap().unwrap();
        assert_eq!(enrollment.current_step, 1);
        assert_eq!(enrollment.status, EnrollmentStatus::Active);
        assert_eq!(h.channel.emails()[0].body, "Step one for Ann");
        assert_eq!(h.channel.emails()[0].subject.as_deref(), Some("Welcome"));

        // Second step is two days out
        assert_eq!(h.service.process_due_enrollments(Utc::now(), 10).await.unwrap(), 0);
        let later = Utc::now() + chrono::Duration::days(3);
        assert_eq!(h.service.process_due_enrollments(later, 10).await.unwrap(), 1);

        let enrollment = h.store.get_enrollment(campaign.id, lead).await.unwrap().unwrap();
        assert_eq!(enrollment.status, EnrollmentStatus::Completed);
        assert!(enrollment.next_send_at.is_none());
        assert_eq!(h.channel.emails()[1].subject.as_deref(), Some("Still there?"));

        let campaign = h.store.get_campaign(campaign.id).await.unwrap().unwrap();
        assert_eq!(campaign.sent_count, 2);
    }

    #[tokio::test]
    async fn test_ab_variant_b_gets_alternate_body() {
        let h = Harness::new();
        let campaign = h
            .service
            .create_campaign(
                h.user,
                CreateCampaign {
                    name: "AB".to_string(),
                    channel: CampaignChannel::Email,
                    email_subject: Some("A subject".to_string()),
                    email_body: Some("A body".to_string()),
                    sms_template: None,
                    drip_steps: vec![],
                    ab_test: Some(AbTest {
                        split_percent: 100,
                        subject_b: Some("B subject".to_string()),
                        body_b: "B body".to_string(),
                    }),
                },
            )
            .await
            .unwrap();
        let lead = h.lead("Ann", Some("ann@example.com"), None).await;
        h.service.start_send(campaign.id, h.user, &[lead]).await.unwrap();
        h.service.send_pending(campaign.id).await.unwrap();

        let sent = h.channel.emails();
        assert_eq!(sent[0].subject.as_deref(), Some("B subject"));
        assert_eq!(sent[0].body, "B body");
    }

    #[tokio::test]
    async fn test_split_over_100_is_rejected() {
        let h = Harness::new();
        let err = h
            .service
            .create_campaign(
                h.user,
                CreateCampaign {
                    name: "AB".to_string(),
                    channel: CampaignChannel::Email,
                    email_subject: None,
                    email_body: Some("x".to_string()),
                    sms_template: None,
                    drip_steps: vec![],
                    ab_test: Some(AbTest {
                        split_percent: 150,
                        subject_b: None,
                        body_b: "y".to_string(),
                    }),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BusinessRule(_)));
    }
}
