// service/notification_service.rs
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    db::{userdb::UserExt, EntityStore},
    mail::{mails, sendmail::Mailer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    OfferReceived,
    OfferAccepted,
    BookingStarted,
    BookingCompleted,
    PaymentReceived,
}

impl EventKind {
    pub fn to_str(&self) -> &'static str {
        match self {
            EventKind::OfferReceived => "offer_received",
            EventKind::OfferAccepted => "offer_accepted",
            EventKind::BookingStarted => "booking_started",
            EventKind::BookingCompleted => "booking_completed",
            EventKind::PaymentReceived => "payment_received",
        }
    }
}

/// A lifecycle fact worth telling one user about
#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub kind: EventKind,
    pub recipient_id: Uuid,
    pub job_id: Uuid,
    pub details: Value,
}

impl DomainEvent {
    pub fn new(kind: EventKind, recipient_id: Uuid, job_id: Uuid, details: Value) -> Self {
        Self {
            kind,
            recipient_id,
            job_id,
            details,
        }
    }
}

/// Delivery channel for domain events
#[async_trait]
pub trait Notifier: std::fmt::Debug + Send + Sync {
    async fn notify(
        &self,
        event: &DomainEvent,
        recipient_name: &str,
        recipient_address: &str,
    ) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct MailNotifier {
    mailer: Mailer,
}

impl MailNotifier {
    pub fn new(mailer: Mailer) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl Notifier for MailNotifier {
    async fn notify(
        &self,
        event: &DomainEvent,
        recipient_name: &str,
        recipient_address: &str,
    ) -> anyhow::Result<()> {
        let (subject, html) = mails::render(event, recipient_name);
        self.mailer
            .send_email(recipient_address, &subject, &html)
            .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct NotificationService {
    db_client: Arc<dyn EntityStore>,
    notifier: Arc<dyn Notifier>,
}

impl NotificationService {
    pub fn new(db_client: Arc<dyn EntityStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            db_client,
            notifier,
        }
    }

    /// Fire and forget. Delivery runs on its own task and a failure is only
    /// logged, so it can never undo the transition that produced the event.
    pub fn publish(&self, event: DomainEvent) {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.deliver(&event).await {
                tracing::warn!(
                    "Failed to deliver {} notification to user {}: {}",
                    event.kind.to_str(),
                    event.recipient_id,
                    e
                );
            }
        });
    }

    async fn deliver(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let recipient = self
            .db_client
            .get_user(event.recipient_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("recipient no longer exists"))?;

        tracing::info!(
            "Notification {} for user {} on job {}",
            event.kind.to_str(),
            recipient.id,
            event.job_id
        );

        self.notifier
            .notify(event, &recipient.name, &recipient.email)
            .await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingNotifier;
    use super::*;
    use crate::{
        db::{memorydb::MemoryStore, userdb::UserExt},
        models::usermodel::{User, UserRole},
    };
    use serde_json::json;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_resolves_recipient_address() {
        let store = Arc::new(MemoryStore::new());
        let user = store
            .save_user(User::new(
                "Grace".to_string(),
                "Grace@Example.com".to_string(),
                UserRole::Requester,
                "Austin".to_string(),
                None,
            ))
            .await
            .unwrap();

        let (notifier, mut rx) = RecordingNotifier::new();
        let service = NotificationService::new(store, Arc::new(notifier));

        service.publish(DomainEvent::new(
            EventKind::OfferReceived,
            user.id,
            Uuid::new_v4(),
            json!({ "job_title": "Deep clean" }),
        ));

        let (kind, address) = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(kind, EventKind::OfferReceived);
        assert_eq!(address, "grace@example.com");
    }

    #[tokio::test]
    async fn test_unknown_recipient_is_swallowed() {
        let (notifier, mut rx) = RecordingNotifier::new();
        let service = NotificationService::new(Arc::new(MemoryStore::new()), Arc::new(notifier));

        service.publish(DomainEvent::new(
            EventKind::PaymentReceived,
            Uuid::new_v4(),
            Uuid::new_v4(),
            json!({}),
        ));

        let received = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(received.is_err());
    }
}
