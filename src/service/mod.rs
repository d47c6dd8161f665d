pub mod chat_service;
pub mod error;
pub mod lifecycle_service;
pub mod listing_service;
pub mod locks;
pub mod notification_service;
pub mod rating_aggregator;
