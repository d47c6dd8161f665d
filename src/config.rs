// config.rs
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Without one the in-memory store is used.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    // Email notification configuration
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    /// Require payments to equal hourly rate x duration
    pub enforce_quoted_price: bool,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparsable {}={:?}, using default", key, raw);
            default
        }),
        Err(_) => default,
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    pub fn init() -> Config {
        let database_url = env_non_empty("DATABASE_URL");
        let database_max_connections = env_or("DATABASE_MAX_CONNECTIONS", 10);
        let port = env_or("PORT", 8000);

        let allowed_origins = env_non_empty("ALLOWED_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5173".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        // SMTP is optional, emails are only logged without it
        let smtp = env_non_empty("SMTP_HOST").map(|host| SmtpConfig {
            host,
            port: env_or("SMTP_PORT", 587),
            username: env_non_empty("SMTP_USERNAME").unwrap_or_default(),
            password: env_non_empty("SMTP_PASSWORD").unwrap_or_default(),
        });
        let mail_from = env_non_empty("MAIL_FROM")
            .unwrap_or_else(|| "Hire Nearby <noreply@hire-nearby.com>".to_string());

        let enforce_quoted_price = env_or("ENFORCE_QUOTED_PRICE", false);

        Config {
            database_url,
            database_max_connections,
            port,
            allowed_origins,
            smtp,
            mail_from,
            enforce_quoted_price,
        }
    }
}
