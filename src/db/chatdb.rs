// db/chatdb.rs
use async_trait::async_trait;
use uuid::Uuid;

use super::{db::DBClient, StoreError};
use crate::models::chatmodel::Message;

#[async_trait]
pub trait ChatExt {
    async fn insert_message(&self, message: Message) -> Result<Message, StoreError>;

    /// Messages of a booking, oldest first
    async fn get_booking_messages(&self, booking_id: Uuid) -> Result<Vec<Message>, StoreError>;

    /// Marks every unread message of the booking not sent by `reader` as read.
    /// Returns how many rows changed.
    async fn mark_messages_read(&self, booking_id: Uuid, reader_id: Uuid)
        -> Result<u64, StoreError>;
}

#[async_trait]
impl ChatExt for DBClient {
    async fn insert_message(&self, message: Message) -> Result<Message, StoreError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, booking_id, sender_id, text, is_read, read_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(message.booking_id)
        .bind(message.sender_id)
        .bind(&message.text)
        .bind(message.is_read)
        .bind(message.read_at)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(message)
    }

    async fn get_booking_messages(&self, booking_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>(
            "SELECT * FROM messages WHERE booking_id = $1 ORDER BY created_at ASC",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }

    async fn mark_messages_read(
        &self,
        booking_id: Uuid,
        reader_id: Uuid,
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE messages
            SET is_read = true, read_at = NOW()
            WHERE booking_id = $1
              AND sender_id != $2
              AND is_read = false
            "#,
        )
        .bind(booking_id)
        .bind(reader_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}
