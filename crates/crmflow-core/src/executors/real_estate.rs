// Real estate executor
//
// Voice calls are queued as call logs; placing the call belongs to the voice
// provider integration, which picks queued logs up.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::json;

use super::{ActionContext, TaskExecutor, TaskOutcome};
use crate::industry::Industry;

pub struct RealEstateExecutor;

#[async_trait]
impl TaskExecutor for RealEstateExecutor {
    fn industry(&self) -> Industry {
        Industry::RealEstate
    }

    fn actions(&self) -> &'static [&'static str] {
        &["voice_call", "sms", "email", "task", "calendar", "document"]
    }

    async fn execute(&self, action: &str, ctx: &ActionContext<'_>) -> TaskOutcome {
        match action {
            "voice_call" => voice_call(ctx).await,
            "sms" => sms(ctx).await,
            "email" => email(ctx).await,
            "task" => task(ctx).await,
            "calendar" => calendar(ctx).await,
            "document" => document(ctx).await,
            other => TaskOutcome::fail(format!("Unknown Real Estate action: {}", other)),
        }
    }
}

fn client_type<'a>(ctx: &'a ActionContext<'_>) -> &'a str {
    ctx.instance
        .metadata
        .get("client_type")
        .and_then(|v| v.as_str())
        .unwrap_or("buyer")
}

async fn voice_call(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(lead) = ctx.lead else {
        return TaskOutcome::fail("No lead associated with this workflow");
    };
    let Some(phone) = lead.phone() else {
        return TaskOutcome::fail("No phone number available");
    };

    let script = ctx.config().param_str("script").map(|s| ctx.render(s));
    let payload = json!({
        "phone": phone,
        "direction": "OUTBOUND",
        "status": "QUEUED",
        "agent": ctx.task.assigned_agent,
        "clientType": client_type(ctx),
        "script": script,
    });
    match ctx.record("call_log", payload).await {
        Ok(id) => TaskOutcome::ok(json!({ "callLogId": id, "phone": phone, "status": "QUEUED" })),
        Err(e) => TaskOutcome::fail(format!("Failed to initiate call: {}", e)),
    }
}

async fn sms(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(lead) = ctx.lead else {
        return TaskOutcome::fail("No lead associated with this workflow");
    };
    let Some(phone) = lead.phone() else {
        return TaskOutcome::fail("No phone number available");
    };

    let default = if client_type(ctx) == "seller" {
        "Hi {{firstName}}, thanks for reaching out about selling your home. When is a good time to talk about your listing?"
    } else {
        "Hi {{firstName}}, thanks for your interest! I'd love to help you find your next home. When are you free for a quick call?"
    };
    let body = ctx.render(ctx.config().param_str("message").unwrap_or(default));

    match ctx.sms(phone, &body).await {
        Ok(message_id) => TaskOutcome::ok(json!({ "to": phone, "messageId": message_id })),
        Err(e) => TaskOutcome::fail(e),
    }
}

async fn email(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(lead) = ctx.lead else {
        return TaskOutcome::fail("No lead associated with this workflow");
    };
    let Some(to) = lead.email() else {
        return TaskOutcome::fail("No email available");
    };

    let subject = ctx.render(
        ctx.config()
            .param_str("subject")
            .unwrap_or("Following up on your real estate goals"),
    );
    let body = ctx.render(ctx.config().param_str("body").unwrap_or(
        "Hi {{firstName}},\n\nThank you for connecting with us. Reply to this email to schedule a time to talk.",
    ));

    match ctx.email(to, &subject, &body).await {
        Ok(message_id) => TaskOutcome::ok(json!({ "to": to, "messageId": message_id })),
        Err(e) => TaskOutcome::fail(e),
    }
}

async fn task(ctx: &ActionContext<'_>) -> TaskOutcome {
    let title = ctx
        .config()
        .param_str("title")
        .map(|t| ctx.render(t))
        .unwrap_or_else(|| ctx.task.name.clone());
    let payload = json!({
        "title": title,
        "dueAt": Utc::now() + Duration::days(1),
        "assignedAgent": ctx.task.assigned_agent,
        "clientType": client_type(ctx),
    });
    match ctx.record("task", payload).await {
        Ok(id) => TaskOutcome::ok(json!({ "taskId": id, "title": title })),
        Err(e) => TaskOutcome::fail(format!("Failed to create task: {}", e)),
    }
}

async fn calendar(ctx: &ActionContext<'_>) -> TaskOutcome {
    let days = ctx.config().param_i64("daysFromNow").unwrap_or(1).max(0);
    let duration = ctx.config().param_i64("durationMinutes").unwrap_or(60).max(15);
    let start = Utc::now() + Duration::days(days);
    let title = ctx.render(
        ctx.config()
            .param_str("title")
            .unwrap_or("Consultation with {{name}}"),
    );

    let payload = json!({
        "title": title,
        "startsAt": start,
        "durationMinutes": duration,
        "status": "SCHEDULED",
    });
    match ctx.record("booking", payload).await {
        Ok(id) => TaskOutcome::ok(json!({ "eventId": id, "startsAt": start })),
        Err(e) => TaskOutcome::fail(format!("Failed to create calendar event: {}", e)),
    }
}

async fn document(ctx: &ActionContext<'_>) -> TaskOutcome {
    let default_kind = if client_type(ctx) == "seller" {
        "LISTING_AGREEMENT"
    } else {
        "BUYER_REPRESENTATION_AGREEMENT"
    };
    let kind = ctx.config().param_str("documentType").unwrap_or(default_kind);

    match ctx
        .record("document", json!({ "documentType": kind, "status": "DRAFT" }))
        .await
    {
        Ok(id) => TaskOutcome::ok(json!({ "documentId": id, "documentType": kind })),
        Err(e) => TaskOutcome::fail(format!("Failed to prepare document: {}", e)),
    }
}
