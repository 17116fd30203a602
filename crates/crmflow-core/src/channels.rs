// Outbound channel implementations
//
// Provider clients (Twilio, transactional email) are deployed separately; this
// module provides the two implementations the workspace runs with:
// - LoggingChannel: logs every message and reports success (dev mode)
// - RecordingChannel: keeps sent messages in memory and can be told to fail
//   specific recipients (tests)

use std::collections::HashSet;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::traits::{EmailSender, SmsSender};

/// Channel that only logs outbound messages
#[derive(Debug, Default, Clone)]
pub struct LoggingChannel;

#[async_trait]
impl SmsSender for LoggingChannel {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String> {
        let message_id = format!("sms_{}", Uuid::now_v7());
        tracing::info!(to = %to, message_id = %message_id, chars = body.len(), "SMS sent");
        Ok(message_id)
    }
}

#[async_trait]
impl EmailSender for LoggingChannel {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        let message_id = format!("email_{}", Uuid::now_v7());
        tracing::info!(
            to = %to,
            subject = %subject,
            message_id = %message_id,
            chars = body.len(),
            "Email sent"
        );
        Ok(message_id)
    }
}

/// A message captured by [`RecordingChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    /// None for SMS
    pub subject: Option<String>,
    pub body: String,
}

/// In-memory channel for tests
#[derive(Debug, Default)]
pub struct RecordingChannel {
    sms: RwLock<Vec<SentMessage>>,
    emails: RwLock<Vec<SentMessage>>,
    failing: RwLock<HashSet<String>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `recipient` fail with a channel error
    pub fn fail_for(&self, recipient: impl Into<String>) {
        self.failing.write().insert(recipient.into());
    }

    pub fn sms(&self) -> Vec<SentMessage> {
        self.sms.read().clone()
    }

    pub fn emails(&self) -> Vec<SentMessage> {
        self.emails.read().clone()
    }

    fn check(&self, to: &str) -> Result<()> {
        if self.failing.read().contains(to) {
            return Err(Error::channel(format!("delivery to {} rejected", to)));
        }
        Ok(())
    }
}

#[async_trait]
impl SmsSender for RecordingChannel {
    async fn send_sms(&self, to: &str, body: &str) -> Result<String> {
        self.check(to)?;
        self.sms.write().push(SentMessage {
            to: to.to_string(),
            subject: None,
            body: body.to_string(),
        });
        Ok(format!("sms_{}", Uuid::now_v7()))
    }
}

#[async_trait]
impl EmailSender for RecordingChannel {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> Result<String> {
        self.check(to)?;
        self.emails.write().push(SentMessage {
            to: to.to_string(),
            subject: Some(subject.to_string()),
            body: body.to_string(),
        });
        Ok(format!("email_{}", Uuid::now_v7()))
    }
}
