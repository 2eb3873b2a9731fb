use async_trait::async_trait;

use crate::error::Result;

pub mod smtp;

pub use smtp::SmtpMailer;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    fn name(&self) -> &str;
    async fn send(&self, email: &OutgoingEmail) -> Result<()>;
}

/// Writes messages to the log instead of delivering them. Used when SMTP is
/// not configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Email delivery disabled, message not sent"
        );
        tracing::debug!("Email body:\n{}", email.body);
        Ok(())
    }
}
