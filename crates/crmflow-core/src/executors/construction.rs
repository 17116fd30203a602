// Construction executor

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};

use super::{ActionContext, TaskExecutor, TaskOutcome};
use crate::industry::Industry;
use crate::lead::Lead;

const NO_CLIENT: &str = "No client found";

pub struct ConstructionExecutor;

#[async_trait]
impl TaskExecutor for ConstructionExecutor {
    fn industry(&self) -> Industry {
        Industry::Construction
    }

    fn actions(&self) -> &'static [&'static str] {
        &[
            "estimate_generation",
            "project_scheduling",
            "material_ordering",
            "inspection_scheduling",
            "progress_update",
            "change_order",
            "project_completion",
        ]
    }

    async fn execute(&self, action: &str, ctx: &ActionContext<'_>) -> TaskOutcome {
        match action {
            "estimate_generation" => estimate(ctx).await,
            "project_scheduling" => schedule_project(ctx).await,
            "material_ordering" => order_materials(ctx).await,
            "inspection_scheduling" => schedule_inspection(ctx).await,
            "progress_update" => progress_update(ctx).await,
            "change_order" => change_order(ctx).await,
            "project_completion" => complete_project(ctx).await,
            other => TaskOutcome::fail(format!("Unknown Construction action: {}", other)),
        }
    }
}

fn project_type<'a>(ctx: &'a ActionContext<'_>) -> &'a str {
    ctx.config()
        .param_str("projectType")
        .unwrap_or("Construction Project")
}

fn date_param(ctx: &ActionContext<'_>, key: &str, default_days: i64) -> DateTime<Utc> {
    ctx.config()
        .param_str(key)
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| Utc::now() + Duration::days(default_days))
}

/// Email the client when an address is on file; a missing address is not a failure
async fn email_client(ctx: &ActionContext<'_>, lead: &Lead, subject: &str, body: &str) -> Result<bool, String> {
    match lead.email() {
        Some(to) => ctx.email(to, subject, body).await.map(|_| true),
        None => Ok(false),
    }
}

async fn estimate(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(lead) = ctx.lead else {
        return TaskOutcome::fail(NO_CLIENT);
    };
    let kind = project_type(ctx);
    let cost = ctx
        .config()
        .params
        .get("estimatedCost")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let description = ctx
        .config()
        .param_str("description")
        .unwrap_or(ctx.task.name.as_str());

    let estimate_id = match ctx
        .record(
            "estimate",
            json!({
                "title": format!("{} - {}", kind, lead.business_name),
                "value": cost,
                "stage": "Estimate",
                "description": description,
            }),
        )
        .await
    {
        Ok(id) => id,
        Err(e) => return TaskOutcome::fail(format!("Failed to generate estimate: {}", e)),
    };

    let body = format!(
        "Dear {},\n\nThank you for your interest in our services. Your estimate for the {} is ${:.2}.\n\n{}",
        lead.display_name(),
        kind,
        cost,
        description
    );
    match email_client(ctx, lead, &format!("Your {} Estimate", kind), &body).await {
        Ok(emailed) => TaskOutcome::ok(json!({
            "estimateId": estimate_id,
            "estimatedCost": cost,
            "emailed": emailed,
        })),
        Err(e) => TaskOutcome::fail(e),
    }
}

async fn schedule_project(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(lead) = ctx.lead else {
        return TaskOutcome::fail(NO_CLIENT);
    };
    let kind = project_type(ctx);
    let start = date_param(ctx, "startDate", 7);
    let days = ctx.config().param_i64("duration").unwrap_or(30).max(1);
    let end = start + Duration::days(days);

    let project = ctx
        .record(
            "project",
            json!({ "projectType": kind, "startsAt": start, "endsAt": end, "stage": "Scheduled" }),
        )
        .await;
    let project_id = match project {
        Ok(id) => id,
        Err(e) => return TaskOutcome::fail(format!("Failed to schedule project: {}", e)),
    };
    if let Err(e) = ctx
        .record(
            "booking",
            json!({ "title": format!("{} kickoff", kind), "startsAt": start, "durationMinutes": 60 }),
        )
        .await
    {
        return TaskOutcome::fail(format!("Failed to schedule project: {}", e));
    }

    let body = format!(
        "Dear {},\n\nYour {} is scheduled to start on {} and is expected to take {} days.",
        lead.display_name(),
        kind,
        start.format("%Y-%m-%d"),
        days
    );
    match email_client(ctx, lead, "Project Scheduled", &body).await {
        Ok(_) => TaskOutcome::ok(json!({
            "projectId": project_id,
            "startDate": start,
            "endDate": end,
        })),
        Err(e) => TaskOutcome::fail(e),
    }
}

async fn order_materials(ctx: &ActionContext<'_>) -> TaskOutcome {
    let materials: Vec<String> = ctx
        .config()
        .params
        .get("materials")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .filter(|items: &Vec<String>| !items.is_empty())
        .unwrap_or_else(|| vec!["Standard Materials".to_string()]);
    let supplier = ctx.config().param_str("supplier").unwrap_or("Default Supplier");

    match ctx
        .record(
            "task",
            json!({
                "title": format!("Order materials from {}", supplier),
                "materials": materials,
                "dueAt": Utc::now() + Duration::days(2),
                "priority": "HIGH",
            }),
        )
        .await
    {
        Ok(id) => TaskOutcome::ok(json!({ "orderTaskId": id, "materials": materials, "supplier": supplier })),
        Err(e) => TaskOutcome::fail(format!("Failed to order materials: {}", e)),
    }
}

async fn schedule_inspection(ctx: &ActionContext<'_>) -> TaskOutcome {
    let at = date_param(ctx, "date", 3);
    let kind = ctx.config().param_str("type").unwrap_or("Building Inspection");

    match ctx
        .record(
            "booking",
            json!({ "title": kind, "startsAt": at, "durationMinutes": 120, "status": "SCHEDULED" }),
        )
        .await
    {
        Ok(id) => TaskOutcome::ok(json!({ "inspectionId": id, "inspectionDate": at, "type": kind })),
        Err(e) => TaskOutcome::fail(format!("Failed to schedule inspection: {}", e)),
    }
}

async fn progress_update(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(lead) = ctx.lead else {
        return TaskOutcome::fail(NO_CLIENT);
    };
    let progress = ctx.config().param_i64("progress").unwrap_or(50).clamp(0, 100);
    let message = match ctx.config().param_str("message") {
        Some(m) => ctx.render(m),
        None => format!("Project is {}% complete.", progress),
    };

    let sent = ctx.notify_all(lead, "Project Progress Update", &message).await;
    TaskOutcome {
        data: json!({ "progress": progress, "channels": sent.data["channels"] }),
        ..sent
    }
}

async fn change_order(ctx: &ActionContext<'_>) -> TaskOutcome {
    let description = ctx
        .config()
        .param_str("description")
        .unwrap_or("Change order");
    let cost = ctx
        .config()
        .params
        .get("cost")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);

    let task_id = match ctx
        .record(
            "task",
            json!({
                "title": format!("Review change order: {}", description),
                "additionalCost": cost,
                "priority": "HIGH",
            }),
        )
        .await
    {
        Ok(id) => id,
        Err(e) => return TaskOutcome::fail(format!("Failed to process change order: {}", e)),
    };

    if let Some(lead) = ctx.lead {
        let body = format!(
            "Dear {},\n\nA change order has been submitted: {}. Additional cost: ${:.2}.",
            lead.display_name(),
            description,
            cost
        );
        if let Err(e) = email_client(ctx, lead, "Change Order", &body).await {
            return TaskOutcome::fail(e);
        }
    }

    TaskOutcome::ok(json!({ "changeOrderTaskId": task_id, "additionalCost": cost }))
}

async fn complete_project(ctx: &ActionContext<'_>) -> TaskOutcome {
    let Some(lead) = ctx.lead else {
        return TaskOutcome::fail("No project found");
    };
    let projects = match ctx.store.list_activities(lead.id).await {
        Ok(all) => all,
        Err(e) => return TaskOutcome::fail(format!("Failed to complete project: {}", e)),
    };
    let Some(project) = projects
        .into_iter()
        .filter(|a| a.kind == "project")
        .max_by_key(|a| a.created_at)
    else {
        return TaskOutcome::fail("No project found");
    };

    if let Err(e) = ctx
        .record(
            "project_update",
            json!({ "projectId": project.id, "stage": "Completed", "completedAt": Utc::now() }),
        )
        .await
    {
        return TaskOutcome::fail(format!("Failed to complete project: {}", e));
    }

    let body = format!(
        "Dear {},\n\nYour project is complete. Thank you for choosing us!",
        lead.display_name()
    );
    match email_client(ctx, lead, "Project Completed", &body).await {
        Ok(_) => TaskOutcome::ok(json!({ "projectId": project.id, "stage": "Completed" })),
        Err(e) => TaskOutcome::fail(e),
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

    fn client() -> Lead {
        Lead::new(Uuid::now_v7(), "Oak Street Remodel")
            .with_contact("Sam Carter")
            .with_email("sam@example.com")
    }

    #[tokio::test]
    async fn test_estimate_emails_client() {
        let fx = Fixture::new(Industry::Construction, client()).await;
        let task = fx.task(
            "ESTIMATE_GENERATION",
            ActionConfig::default()
                .with_param("projectType", json!("Kitchen Remodel"))
                .with_param("estimatedCost", json!(12500)),
        );
        let outcome = fx.run(&task).await;
        assert!(outcome.success, "{:?}", outcome.error);
        let email = &fx.channel.emails()[0];
        assert_eq!(email.subject.as_deref(), Some("Your Kitchen Remodel Estimate"));
        assert!(email.body.contains("$12500.00"));
    }

    #[tokio::test]
    async fn test_completion_requires_scheduled_project() {
        let fx = Fixture::new(Industry::Construction, client()).await;
        let complete = fx.task("PROJECT_COMPLETION", ActionConfig::default());
        assert_eq!(fx.run(&complete).await.error.as_deref(), Some("No project found"));

        let flow = fx.task(
            "X",
            ActionConfig::with_actions(&["project_scheduling", "project_completion"]),
        );
        let outcome = fx.run(&flow).await;
        assert!(outcome.success, "{:?}", outcome.error);

        let kinds: Vec<String> = fx
            .store
            .list_activities(fx.lead.id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.kind)
            .collect();
        assert_eq!(kinds, vec!["project", "booking", "project_update"]);
    }

    #[tokio::test]
    async fn test_progress_update_without_contacts_succeeds() {
        let fx = Fixture::new(Industry::Construction, Lead::new(Uuid::now_v7(), "No Contact")).await;
        let task = fx.task("PROGRESS_UPDATE", ActionConfig::default().with_param("progress", json!(75)));
        let outcome = fx.run(&task).await;
        assert!(outcome.success);
        assert_eq!(outcome.data["progress_update"]["progress"], 75);
    }
}
