// Generic executor: actions shared by every industry

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use super::{ActionContext, TaskExecutor, TaskOutcome};
use crate::industry::Industry;

const DEFAULT_SUBJECT: &str = "Following up";
const DEFAULT_MESSAGE: &str = "Hi {{firstName}}, just following up. Let us know if you have any questions!";

pub struct GenericExecutor;

#[async_trait]
impl TaskExecutor for GenericExecutor {
    fn industry(&self) -> Industry {
        Industry::General
    }

    fn actions(&self) -> &'static [&'static str] {
        &[
            "send_email",
            "send_sms",
            "create_task",
            "notify_user",
            "add_tag",
            "update_lead_status",
            "wait",
        ]
    }

    async fn execute(&self, action: &str, ctx: &ActionContext<'_>) -> TaskOutcome {
        match action {
            "send_email" => send_email(ctx).await,
            "send_sms" => send_sms(ctx).await,
            "create_task" => create_task(ctx).await,
            "notify_user" => notify_user(ctx).await,
            "add_tag" => add_tag(ctx).await,
            "update_lead_status" => update_lead_status(ctx).await,
            "wait" => TaskOutcome::ok(json!({ "waited": true })),
            other => TaskOutcome::fail(format!("Unknown General action: {}", other)),
        }
    }
}

fn message_template<'a>(ctx: &'a ActionContext<'_>) -> &'a str {
    ctx.config()
        .param_str("body")
        .or_else(|| ctx.config().param_str("message"))
        .unwrap_or(DEFAULT_MESSAGE)
}

async fn send_email(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(lead) = ctx.lead else {
        return TaskOutcome::fail("No lead associated with this workflow");
    };
    let Some(to) = lead.email() else {
        return TaskOutcome::fail("No email available");
    };

    let subject = ctx.render(ctx.config().param_str("subject").unwrap_or(DEFAULT_SUBJECT));
    let body = ctx.render(message_template(ctx));

    match ctx.email(to, &subject, &body).await {
        Ok(message_id) => TaskOutcome::ok(json!({
            "to": to,
            "subject": subject,
            "messageId": message_id,
        })),
        Err(e) => TaskOutcome::fail(e),
    }
}

async fn send_sms(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(lead) = ctx.lead else {
        return TaskOutcome::fail("No lead associated with this workflow");
    };
    let Some(to) = lead.phone() else {
        return TaskOutcome::fail("No phone number available");
    };

    let body = ctx.render(message_template(ctx));
    match ctx.sms(to, &body).await {
        Ok(message_id) => TaskOutcome::ok(json!({ "to": to, "messageId": message_id })),
        Err(e) => TaskOutcome::fail(e),
    }
}

async fn create_task(ctx: &ActionContext<'_>) -> TaskOutcome {
    let title = ctx
        .config()
        .param_str("title")
        .map(|t| ctx.render(t))
        .unwrap_or_else(|| ctx.task.name.clone());
    let due_in_days = ctx.config().param_i64("dueInDays").unwrap_or(1).max(0);
    let due_at = Utc::now() + chrono::Duration::days(due_in_days);

    let payload = json!({
        "title": title,
        "dueAt": due_at,
        "assignedAgent": ctx.task.assigned_agent,
        "priority": ctx.config().param_str("priority").unwrap_or("MEDIUM"),
    });
    match ctx.record("task", payload).await {
        Ok(id) => TaskOutcome::ok(json!({ "taskId": id, "title": title })),
        Err(e) => TaskOutcome::fail(format!("Failed to create task: {}", e)),
    }
}

async fn notify_user(ctx: &ActionContext<'_>) -> TaskOutcome {
    let message = ctx.render(
        ctx.config()
            .param_str("message")
            .unwrap_or("Workflow step reached"),
    );
    match ctx
        .record("notification", json!({ "message": message, "task": ctx.task.name }))
        .await
    {
        Ok(id) => TaskOutcome::ok(json!({ "notificationId": id })),
        Err(e) => TaskOutcome::fail(format!("Failed to notify user: {}", e)),
    }
}

async fn add_tag(ctx: &ActionContext<'_>) -> TaskOutcome {
    let tags: Vec<String> = match ctx.config().params.get("tags").or(ctx.config().params.get("tag")) {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => vec![],
    };
    if tags.is_empty() {
        return TaskOutcome::fail("No tag configured");
    }

    let mut lead = match ctx.fresh_lead().await {
        Ok(lead) => lead,
        Err(e) => return TaskOutcome::fail(e),
    };
    for tag in &tags {
        if !lead.tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
            lead.tags.push(tag.clone());
        }
    }
    match ctx.store.update_lead(&lead).await {
        Ok(()) => TaskOutcome::ok(json!({ "tags": lead.tags })),
        Err(e) => TaskOutcome::fail(format!("Failed to add tag: {}", e)),
    }
}

async fn update_lead_status(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(status) = ctx.config().param_str("status") else {
        return TaskOutcome::fail("No status configured");
    };

    let mut lead = match ctx.fresh_lead().await {
        Ok(lead) => lead,
        Err(e) => return TaskOutcome::fail(e),
    };
    let previous = std::mem::replace(&mut lead.status, status.to_uppercase());
    match ctx.store.update_lead(&lead).await {
        Ok(()) => TaskOutcome::ok(json!({ "previous": previous, "status": lead.status })),
        Err(e) => TaskOutcome::fail(format!("Failed to update lead status: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::Fixture;
    use crate::industry::Industry;
    use crate::lead::Lead;
    use crate::template::ActionConfig;
    use crate::traits::LeadStore;
    use serde_json::json;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_send_email_personalizes() {
        let lead = Lead::new(Uuid::now_v7(), "Acme")
            .with_contact("Jane Doe")
            .with_email("jane@example.com");
        let fx = Fixture::new(Industry::General, lead).await;
        let task = fx.task(
            "EMAIL",
            ActionConfig::with_actions(&["send_email"])
                .with_param("subject", json!("Hello {{firstName}}"))
                .with_param("body", json!("Welcome to {businessName}")),
        );

        let outcome = fx.run(&task).await;
        assert!(outcome.success, "{:?}", outcome.error);
        let sent = fx.channel.emails();
        assert_eq!(sent[0].subject.as_deref(), Some("Hello Jane"));
        assert_eq!(sent[0].body, "Welcome to Acme");
    }

    #[tokio::test]
    async fn test_send_sms_without_phone_fails() {
        let fx = Fixture::new(Industry::General, Lead::new(Uuid::now_v7(), "Acme")).await;
        let task = fx.task("SEND_SMS", ActionConfig::default());
        let outcome = fx.run(&task).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("No phone number available"));
    }

    #[tokio::test]
    async fn test_update_status_and_create_task() {
        let fx = Fixture::new(Industry::General, Lead::new(Uuid::now_v7(), "Acme")).await;
        let task = fx.task(
            "X",
            ActionConfig::with_actions(&["update_lead_status", "create_task"])
                .with_param("status", json!("contacted"))
                .with_param("title", json!("Call {{name}}")),
        );
        let outcome = fx.run(&task).await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.data["create_task"]["title"], "Call Acme");

        let stored = fx.store.get_lead(fx.lead.id).await.unwrap().unwrap();
        assert_eq!(stored.status, "CONTACTED");
        let activities = fx.store.list_activities(fx.lead.id).await.unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].kind, "task");
    }

    #[tokio::test]
    async fn test_add_tag_requires_configuration() {
        let fx = Fixture::new(Industry::General, Lead::new(Uuid::now_v7(), "Acme")).await;
        let task = fx.task("ADD_TAG", ActionConfig::default());
        let outcome = fx.run(&task).await;
        assert_eq!(outcome.error.as_deref(), Some("No tag configured"));
    }
}
