// mail/sendmail.rs
use ammonia::{Builder, UrlRelative};
use lettre::{
    message::{header::ContentType, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use thiserror::Error;
use tracing::{error, info};

use crate::config::SmtpConfig;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Failed to build email: {0}")]
    Build(#[from] lettre::error::Error),

    #[error("SMTP send failed: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("Email task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

// Only the markup the notification template uses survives
pub fn sanitize_html(input: &str) -> String {
    let mut builder = Builder::default();

    builder
        .add_tags(&["p", "br", "strong", "em", "span", "div", "h1", "h2", "h3", "table", "tr", "td"])
        .add_generic_attributes(&["style"])
        .url_relative(UrlRelative::PassThrough)
        .link_rel(None);

    builder.clean(input).to_string()
}

/// Sends notification emails over SMTP, or logs them when SMTP is not configured
#[derive(Debug, Clone)]
pub struct Mailer {
    smtp: Option<SmtpConfig>,
    from: String,
}

impl Mailer {
    pub fn new(smtp: Option<SmtpConfig>, from: String) -> Self {
        Self { smtp, from }
    }

    pub fn is_configured(&self) -> bool {
        self.smtp.is_some()
    }

    pub async fn send_email(
        &self,
        to_email: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), MailError> {
        let html_body = sanitize_html(html_body);

        let Some(smtp) = self.smtp.clone() else {
            info!(to = %to_email, subject = %subject, "SMTP not configured, email logged only");
            tracing::debug!("{}", html_body);
            return Ok(());
        };

        let email = Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .to(to_email.parse::<Mailbox>()?)
            .subject(subject)
            .multipart(
                MultiPart::alternative().singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(html_body),
                ),
            )?;

        // lettre's SmtpTransport blocks
        let to = to_email.to_string();
        tokio::task::spawn_blocking(move || -> Result<(), MailError> {
            let creds = Credentials::new(smtp.username, smtp.password);
            let mailer = SmtpTransport::relay(&smtp.host)?
                .port(smtp.port)
                .credentials(creds)
                .build();

            match mailer.send(&email) {
                Ok(_) => {
                    info!("Email sent successfully via SMTP to {}", to);
                    Ok(())
                }
                Err(e) => {
                    error!("SMTP send failed for {}: {}", to, e);
                    Err(e.into())
                }
            }
        })
        .await?
    }
}
