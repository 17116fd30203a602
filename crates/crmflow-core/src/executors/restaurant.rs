// Restaurant executor

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use super::{ActionContext, TaskExecutor, TaskOutcome};
use crate::industry::Industry;
use crate::lead::Lead;

const NO_CUSTOMER: &str = "No customer found";

pub struct RestaurantExecutor;

#[async_trait]
impl TaskExecutor for RestaurantExecutor {
    fn industry(&self) -> Industry {
        Industry::Restaurant
    }

    fn actions(&self) -> &'static [&'static str] {
        &[
            "reservation_confirmation",
            "reservation_reminder",
            "customer_research",
            "loyalty_points_update",
            "feedback_request",
            "special_offer_notification",
            "birthday_greeting",
        ]
    }

    async fn execute(&self, action: &str, ctx: &ActionContext<'_>) -> TaskOutcome {
        let Some(lead) = ctx.lead else {
            return TaskOutcome::fail(NO_CUSTOMER);
        };
        match action {
            "reservation_confirmation" => confirm_reservation(ctx, lead).await,
            "reservation_reminder" => reservation_reminder(ctx, lead).await,
            "customer_research" => customer_research(ctx, lead).await,
            "loyalty_points_update" => loyalty_points(ctx).await,
            "feedback_request" => feedback_request(ctx, lead).await,
            "special_offer_notification" => special_offer(ctx, lead).await,
            "birthday_greeting" => birthday_greeting(ctx, lead).await,
            other => TaskOutcome::fail(format!("Unknown Restaurant action: {}", other)),
        }
    }
}

/// Stable per-lead code suffix so a re-run sends the same code
fn code_suffix(lead: &Lead, modulo: u128) -> u128 {
    lead.id.as_u128() % modulo
}

async fn confirm_reservation(ctx: &ActionContext<'_>, lead: &Lead) -> TaskOutcome {
    let at = ctx
        .config()
        .param_str("date")
        .and_then(|d| DateTime::parse_from_rfc3339(d).ok())
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|| Utc::now() + Duration::hours(24));
    let party_size = ctx.config().param_i64("partySize").unwrap_or(2);
    let requests = ctx.config().param_str("specialRequests").unwrap_or("");

    let booking = json!({
        "customerName": lead.display_name(),
        "startsAt": at,
        "durationMinutes": 120,
        "status": "CONFIRMED",
        "notes": format!("Reservation for {} guests. {}", party_size, requests).trim().to_string(),
    });
    let reservation_id = match ctx.record("booking", booking).await {
        Ok(id) => id,
        Err(e) => return TaskOutcome::fail(format!("Failed to confirm reservation: {}", e)),
    };

    let message = format!(
        "Your reservation is confirmed for {} for {} guests. We look forward to seeing you!",
        at.format("%Y-%m-%d %H:%M UTC"),
        party_size
    );
    let sent = ctx.notify_all(lead, "Reservation Confirmed", &message).await;
    if !sent.success {
        return sent;
    }

    TaskOutcome::ok(json!({
        "reservationId": reservation_id,
        "reservationDate": at,
        "partySize": party_size,
        "channels": sent.data["channels"],
    }))
}

async fn reservation_reminder(ctx: &ActionContext<'_>, lead: &Lead) -> TaskOutcome {
    let bookings = match ctx.store.list_activities(lead.id).await {
        Ok(all) => all,
        Err(e) => return TaskOutcome::fail(format!("Failed to send reminder: {}", e)),
    };
    let Some(reservation) = bookings
        .into_iter()
        .filter(|a| a.kind == "booking")
        .max_by_key(|a| a.created_at)
    else {
        return TaskOutcome::fail("No reservation found");
    };

    let when = reservation.payload["startsAt"].as_str().unwrap_or("your booked time").to_string();
    let message = match ctx.config().param_str("message") {
        Some(m) => ctx.render(m),
        None => format!("Reminder: You have a reservation on {}. We look forward to seeing you!", when),
    };

    let sent = ctx.notify_all(lead, "Reservation Reminder", &message).await;
    TaskOutcome {
        data: json!({ "reservationId": reservation.id, "channels": sent.data["channels"] }),
        ..sent
    }
}

async fn customer_research(ctx: &ActionContext<'_>, lead: &Lead) -> TaskOutcome {
    let history = match ctx.store.list_activities(lead.id).await {
        Ok(all) => all.into_iter().filter(|a| a.kind == "booking").count(),
        Err(e) => return TaskOutcome::fail(format!("Failed to research customer: {}", e)),
    };
    TaskOutcome::ok(json!({
        "customerId": lead.id,
        "reservationHistory": history,
        "loyaltyPoints": lead.custom_i64("loyaltyPoints"),
        "tags": lead.tags,
    }))
}

async fn loyalty_points(ctx: &ActionContext<'_>) -> TaskOutcome {
    let points = ctx.config().param_i64("points").unwrap_or(100);
    let reason = ctx.config().param_str("reason").unwrap_or("visit");

    let mut lead = match ctx.fresh_lead().await {
        Ok(lead) => lead,
        Err(_) => return TaskOutcome::fail(NO_CUSTOMER),
    };
    let total = lead.custom_i64("loyaltyPoints") + points;
    lead.set_custom("loyaltyPoints", json!(total));
    lead.set_custom("lastPointsUpdate", json!(Utc::now()));
    if let Err(e) = ctx.store.update_lead(&lead).await {
        return TaskOutcome::fail(format!("Failed to update loyalty points: {}", e));
    }

    if let Some(phone) = lead.phone() {
        let message = format!(
            "You've earned {} loyalty points! Your total is now {} points. Thank you for your {}!",
            points, total, reason
        );
        if let Err(e) = ctx.sms(phone, &message).await {
            return TaskOutcome::fail(e);
        }
    }

    TaskOutcome::ok(json!({ "pointsAdded": points, "totalPoints": total }))
}

async fn feedback_request(ctx: &ActionContext<'_>, lead: &Lead) -> TaskOutcome {
    let Some(to) = lead.email() else {
        return TaskOutcome::ok(json!({ "feedbackRequestSent": false }));
    };
    let body = ctx.render(ctx.config().param_str("message").unwrap_or(
        "Dear {{name}},\n\nWe hope you enjoyed your recent visit! Please take a moment to share your feedback with us.",
    ));
    match ctx.email(to, "We'd Love Your Feedback!", &body).await {
        Ok(_) => TaskOutcome::ok(json!({ "feedbackRequestSent": true })),
        Err(e) => TaskOutcome::fail(e),
    }
}

async fn special_offer(ctx: &ActionContext<'_>, lead: &Lead) -> TaskOutcome {
    let title = ctx.config().param_str("title").unwrap_or("Special Offer");
    let description = ctx
        .config()
        .param_str("description")
        .unwrap_or("Enjoy a special discount on your next visit!");
    let code = ctx
        .config()
        .param_str("discountCode")
        .map(str::to_string)
        .unwrap_or_else(|| format!("SAVE{}", code_suffix(lead, 1000)));

    let message = format!("{}: {} Use code: {}", title, ctx.render(description), code);
    let sent = ctx.notify_all(lead, title, &message).await;
    TaskOutcome {
        data: json!({ "offerTitle": title, "discountCode": code, "channels": sent.data["channels"] }),
        ..sent
    }
}

async fn birthday_greeting(ctx: &ActionContext<'_>, lead: &Lead) -> TaskOutcome {
    let code = ctx
        .config()
        .param_str("discountCode")
        .map(str::to_string)
        .unwrap_or_else(|| format!("BDAY{}", code_suffix(lead, 100)));
    let message = ctx.render(&format!(
        "Happy Birthday, {{{{firstName}}}}! Use code {} for a special birthday discount!",
        code
    ));

    let sent = ctx.notify_all(lead, "Happy Birthday!", &message).await;
    TaskOutcome {
        data: json!({ "birthdayGreetingSent": sent.success, "discountCode": code }),
        ..sent
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

    fn guest() -> Lead {
        Lead::new(Uuid::now_v7(), "Walk-in")
            .with_contact("Ana Lima")
            .with_phone("+15557777")
            .with_email("ana@example.com")
    }

    #[tokio::test]
    async fn test_loyalty_points_accumulate() {
        let fx = Fixture::new(Industry::Restaurant, guest()).await;
        let task = fx.task(
            "X",
            ActionConfig::with_actions(&["loyalty_points_update", "loyalty_points_update"])
                .with_param("points", json!(50)),
        );

        let outcome = fx.run(&task).await;
        assert!(outcome.success, "{:?}", outcome.error);
        let stored = fx.store.get_lead(fx.lead.id).await.unwrap().unwrap();
        assert_eq!(stored.custom_i64("loyaltyPoints"), 100);
        assert_eq!(fx.channel.sms().len(), 2);
    }

    #[tokio::test]
    async fn test_reminder_requires_reservation() {
        let fx = Fixture::new(Industry::Restaurant, guest()).await;
        let remind = fx.task("X", ActionConfig::with_actions(&["reservation_reminder"]));
        assert_eq!(fx.run(&remind).await.error.as_deref(), Some("No reservation found"));

        let both = fx.task(
            "X",
            ActionConfig::with_actions(&["reservation_confirmation", "reservation_reminder"])
                .with_param("partySize", json!(4)),
        );
        let outcome = fx.run(&both).await;
        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.data["reservation_confirmation"]["partySize"], 4);
        // confirmation and reminder, each over SMS and email
        assert_eq!(fx.channel.sms().len(), 2);
        assert_eq!(fx.channel.emails().len(), 2);
    }

    #[tokio::test]
    async fn test_birthday_greeting_code_is_stable() {
        let fx = Fixture::new(Industry::Restaurant, guest()).await;
        let task = fx.task("BIRTHDAY_GREETING", ActionConfig::default());
        let first = fx.run(&task).await;
        let second = fx.run(&task).await;
        assert!(first.success);
        assert_eq!(first.data["birthday_greeting"]["discountCode"], second.data["birthday_greeting"]["discountCode"]);
        assert!(fx.channel.sms()[0].body.starts_with("Happy Birthday, Ana!"));
    }

    #[tokio::test]
    async fn test_channel_failure_fails_offer() {
        let fx = Fixture::new(Industry::Restaurant, guest()).await;
        fx.channel.fail_for("ana@example.com");
        let task = fx.task("SPECIAL_OFFER_NOTIFICATION", ActionConfig::default());
        let outcome = fx.run(&task).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().starts_with("Email failed"));
        assert_eq!(fx.channel.sms().len(), 1);
    }
}
