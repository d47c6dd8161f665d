use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A chat line exchanged between the two parties of a booking
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Message {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub sender_id: Uuid,
    pub text: String,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(booking_id: Uuid, sender_id: Uuid, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            sender_id,
            text,
            is_read: false,
            read_at: None,
            created_at: Utc::now(),
        }
    }
}
