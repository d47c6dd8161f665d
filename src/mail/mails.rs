// mail/mails.rs
use serde_json::Value;

use crate::service::notification_service::{DomainEvent, EventKind};

const NOTIFICATION_TEMPLATE: &str = include_str!("templates/Notification-email.html");

fn escape_html(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn text(details: &Value, key: &str) -> String {
    match details.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn money(details: &Value, key: &str) -> String {
    details
        .get(key)
        .and_then(Value::as_f64)
        .map(|amount| format!("${:.2}", amount))
        .unwrap_or_else(|| "-".to_string())
}

/// Subject, headline and detail line for one event
pub fn describe(event: &DomainEvent) -> (String, String, String) {
    let job_title = text(&event.details, "job_title");

    match event.kind {
        EventKind::OfferReceived => (
            "New offer on your job".to_string(),
            format!("You received a new offer for \"{}\"", job_title),
            format!(
                "{} offered {} per hour.",
                text(&event.details, "provider_name"),
                money(&event.details, "hourly_rate")
            ),
        ),
        EventKind::OfferAccepted => (
            "Your offer was accepted".to_string(),
            format!("Your offer for \"{}\" was accepted", job_title),
            format!(
                "The booking runs from {} to {}.",
                text(&event.details, "start_time"),
                text(&event.details, "end_time")
            ),
        ),
        EventKind::BookingStarted => (
            "Your booking has started".to_string(),
            format!("Work on \"{}\" has started", job_title),
            "Your provider marked the booking as in progress.".to_string(),
        ),
        EventKind::BookingCompleted => (
            "Your booking is complete".to_string(),
            format!("Work on \"{}\" is complete", job_title),
            "Please pay for the booking and leave a review.".to_string(),
        ),
        EventKind::PaymentReceived => (
            "Payment received".to_string(),
            format!("You were paid for \"{}\"", job_title),
            format!("Amount: {}.", money(&event.details, "amount")),
        ),
    }
}

/// Render the notification email for `event` addressed to `username`
pub fn render(event: &DomainEvent, username: &str) -> (String, String) {
    let (subject, headline, details) = describe(event);

    let placeholders = [
        ("{{username}}", username),
        ("{{headline}}", headline.as_str()),
        ("{{details}}", details.as_str()),
    ];

    let mut html = NOTIFICATION_TEMPLATE.to_string();
    for (key, value) in placeholders {
        html = html.replace(key, &escape_html(value));
    }

    (subject, html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_payment_email_mentions_amount() {
        let event = DomainEvent::new(
            EventKind::PaymentReceived,
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!({ "job_title": "Dinner for six", "amount": 62.5 }),
        );

        let (subject, html) = render(&event, "Ada");
        assert_eq!(subject, "Payment received");
        assert!(html.contains("Hi Ada,"));
        assert!(html.contains("$62.50"));
        assert!(html.contains("Dinner for six"));
    }

    #[test]
    fn test_user_text_is_escaped() {
        let event = DomainEvent::new(
            EventKind::BookingStarted,
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!({ "job_title": "<b>Clean</b>" }),
        );

        let (_, html) = render(&event, "Ada");
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;b&gt;Clean"));
    }
}
