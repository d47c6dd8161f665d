// service/chat_service.rs
use std::sync::Arc;

use uuid::Uuid;

use crate::{
    db::{chatdb::ChatExt, marketdb::MarketExt, EntityStore},
    models::{chatmodel::Message, marketmodel::Booking, usermodel::User},
    service::error::ServiceError,
    utils::text::clean_user_text,
};

/// Chat lines between the two parties of a booking. Delivery to connected
/// clients is someone else's job; this only records and reads them.
#[derive(Debug, Clone)]
pub struct ChatService {
    db_client: Arc<dyn EntityStore>,
}

impl ChatService {
    pub fn new(db_client: Arc<dyn EntityStore>) -> Self {
        Self { db_client }
    }

    async fn booking_visible_to(
        &self,
        booking_id: Uuid,
        user: &User,
        allow_admin: bool,
    ) -> Result<Booking, ServiceError> {
        let booking = self
            .db_client
            .get_booking(booking_id)
            .await?
            .ok_or(ServiceError::BookingNotFound(booking_id))?;

        if booking.is_participant(user.id) || (allow_admin && user.is_admin()) {
            Ok(booking)
        } else {
            Err(ServiceError::UnauthorizedBookingAccess(user.id, booking_id))
        }
    }

    pub async fn record_message(
        &self,
        booking_id: Uuid,
        sender: &User,
        text: &str,
    ) -> Result<Message, ServiceError> {
        self.booking_visible_to(booking_id, sender, false).await?;

        let text = clean_user_text(text)
            .ok_or_else(|| ServiceError::Validation("Message text cannot be empty".to_string()))?;

        let message = self
            .db_client
            .insert_message(Message::new(booking_id, sender.id, text))
            .await?;

        tracing::info!(
            "Message {} recorded on booking {} by {}",
            message.id,
            booking_id,
            sender.id
        );

        Ok(message)
    }

    pub async fn list_messages(
        &self,
        booking_id: Uuid,
        user: &User,
    ) -> Result<Vec<Message>, ServiceError> {
        self.booking_visible_to(booking_id, user, true).await?;

        Ok(self.db_client.get_booking_messages(booking_id).await?)
    }

    pub async fn mark_read(&self, booking_id: Uuid, reader: &User) -> Result<u64, ServiceError> {
        self.booking_visible_to(booking_id, reader, false).await?;

        Ok(self.db_client.mark_messages_read(booking_id, reader.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{
            marketdb::{ChangeSet, MarketExt, Mutation},
            memorydb::MemoryStore,
        },
        models::{
            marketmodel::{BookingStatus, PaymentStatus},
            usermodel::UserRole,
        },
        service::error::ErrorKind,
    };
    use chrono::{Duration, Utc};

    fn person(role: UserRole) -> User {
        User::new(
            "Someone".to_string(),
            format!("{}@example.com", Uuid::new_v4()),
            role,
            "Austin".to_string(),
            None,
        )
    }

    async fn booking_between(store: &MemoryStore, requester: &User, provider: &User) -> Booking {
        let booking = Booking {
            id: Uuid::new_v4(),
            job_id: Uuid::new_v4(),
            offer_id: Uuid::new_v4(),
            requester_id: requester.id,
            provider_id: provider.id,
            start_time: Utc::now(),
            end_time: Utc::now() + Duration::hours(2),
            status: BookingStatus::Accepted,
            payment_status: PaymentStatus::Unpaid,
            created_at: Utc::now(),
        };
        let mut changes = ChangeSet::new();
        changes.push(Mutation::InsertBooking(booking.clone()));
        store.commit(changes).await.unwrap();
        assert!(store.get_booking(booking.id).await.unwrap().is_some());
        booking
    }

    #[tokio::test]
    async fn test_participants_chat_and_mark_read() {
        let store = Arc::new(MemoryStore::new());
        let (requester, provider) = (person(UserRole::Requester), person(UserRole::Provider));
        let booking = booking_between(&store, &requester, &provider).await;
        let chat = ChatService::new(store);

        chat.record_message(booking.id, &requester, "Is 2pm still ok?")
            .await
            .unwrap();
        chat.record_message(booking.id, &provider, "<i>Yes</i>, see you then")
            .await
            .unwrap();

        let messages = chat.list_messages(booking.id, &requester).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Is 2pm still ok?");
        assert_eq!(messages[1].text, "Yes, see you then");

        assert_eq!(chat.mark_read(booking.id, &requester).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_outsiders_and_blank_text_are_refused() {
        let store = Arc::new(MemoryStore::new());
        let (requester, provider) = (person(UserRole::Requester), person(UserRole::Provider));
        let booking = booking_between(&store, &requester, &provider).await;
        let chat = ChatService::new(store);

        let err = chat
            .record_message(booking.id, &person(UserRole::Provider), "hello")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let err = chat
            .record_message(booking.id, &requester, "   ")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // admins may read but not write
        let admin = person(UserRole::Admin);
        assert!(chat.list_messages(booking.id, &admin).await.is_ok());
        assert!(chat.record_message(booking.id, &admin, "hi").await.is_err());
    }
}
