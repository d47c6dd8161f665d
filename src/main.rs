mod config;
mod db;
mod dtos;
mod error;
mod handler;
mod mail;
mod middleware;
mod models;
mod routes;
mod service;
mod utils;

use std::sync::Arc;

use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    HeaderName, HeaderValue, Method,
};
use config::Config;
use dotenv::dotenv;
use routes::create_router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::filter::LevelFilter;

use crate::{
    db::{db::DBClient, memorydb::MemoryStore, EntityStore},
    mail::sendmail::Mailer,
    service::{
        chat_service::ChatService,
        lifecycle_service::LifecycleService,
        listing_service::ListingService,
        locks::AggregateLocks,
        notification_service::{MailNotifier, NotificationService, Notifier},
    },
};

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<dyn EntityStore>,
    // Services
    pub lifecycle_service: Arc<LifecycleService>,
    pub listing_service: Arc<ListingService>,
    pub chat_service: Arc<ChatService>,
}

impl AppState {
    pub fn new(db_client: Arc<dyn EntityStore>, config: Config, notifier: Arc<dyn Notifier>) -> Self {
        let notification_service = NotificationService::new(db_client.clone(), notifier);
        let locks = Arc::new(AggregateLocks::new());

        let lifecycle_service = Arc::new(LifecycleService::new(
            db_client.clone(),
            locks,
            notification_service,
            config.enforce_quoted_price,
        ));
        let listing_service = Arc::new(ListingService::new(db_client.clone()));
        let chat_service = Arc::new(ChatService::new(db_client.clone()));

        Self {
            env: config,
            db_client,
            lifecycle_service,
            listing_service,
            chat_service,
        }
    }
}

async fn connect_store(config: &Config) -> anyhow::Result<Arc<dyn EntityStore>> {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL is not set, running on the in-memory store. Data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let max_connections = config.database_max_connections;
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to the database: {}", e))?;

    tracing::info!(
        "Connection to the database is successful (max connections: {})",
        max_connections
    );

    let pool_for_monitoring = pool.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            let size = pool_for_monitoring.size();
            let idle = pool_for_monitoring.num_idle() as u32;
            tracing::debug!(
                "Pool Status - Active: {}, Idle: {}, Total: {}",
                size.saturating_sub(idle),
                idle,
                size
            );

            if size >= max_connections * 8 / 10 {
                tracing::warn!("Connection pool at 80% capacity, consider raising DATABASE_MAX_CONNECTIONS");
            }
        }
    });

    Ok(Arc::new(DBClient::new(pool)))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::DEBUG)
        .init();

    dotenv().ok();

    let config = Config::init();

    let db_client = connect_store(&config).await?;

    let mailer = Mailer::new(config.smtp.clone(), config.mail_from.clone());
    if !mailer.is_configured() {
        tracing::info!("SMTP_HOST is not set, notification emails will only be logged");
    }
    let notifier: Arc<dyn Notifier> = Arc::new(MailNotifier::new(mailer));

    let allowed_origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid origin {:?}", origin);
                None
            }
        })
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed_origins))
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static(middleware::USER_ID_HEADER),
        ])
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE]);

    let app_state = Arc::new(AppState::new(db_client, config.clone(), notifier));

    let app = create_router(app_state).layer(cors);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;

    tracing::info!("Server is running on http://localhost:{}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
