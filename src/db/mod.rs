pub mod chatdb;
pub mod db;
pub mod marketdb;
pub mod memorydb;
pub mod query_timeout;
pub mod userdb;

use std::time::Duration;

use thiserror::Error;

use self::{chatdb::ChatExt, marketdb::MarketExt, userdb::UserExt};

#[derive(Error, Debug)]
pub enum StoreError {
    /// A staged write no longer matches what is stored, or a uniqueness rule
    /// rejected it. Nothing from the change set was applied.
    #[error("Write conflict: {0}")]
    Conflict(String),

    #[error("Store operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_error) = &error {
            // 23P01 is exclusion_violation, raised by the booking overlap constraint
            if db_error.is_unique_violation() || db_error.code().as_deref() == Some("23P01") {
                return StoreError::Conflict(db_error.message().to_string());
            }
        }
        StoreError::Database(error)
    }
}

/// Everything the lifecycle engine, listing and chat need from persistence
pub trait EntityStore: UserExt + MarketExt + ChatExt + std::fmt::Debug + Send + Sync {}

impl<T> EntityStore for T where T: UserExt + MarketExt + ChatExt + std::fmt::Debug + Send + Sync {}
