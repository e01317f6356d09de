//! SMTP email provider implementation using Lettre.

use crate::error::{AuthError, Result};
use crate::providers::EmailProvider;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

/// SMTP email provider using Lettre.
///
/// The transport is built once and shared; lettre pools the underlying
/// connections.
///
/// # Examples
///
/// ```no_run
/// use edumarket_auth::providers::SmtpEmailProvider;
///
/// # fn example() -> edumarket_auth::Result<()> {
/// let provider = SmtpEmailProvider::new(
///     "smtp.example.com",
///     587,
///     Some(("mailer".to_string(), "app_password".to_string())),
///     "noreply@edumarket.example",
///     "Edumarket",
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SmtpEmailProvider {
    /// Shared async transport.
    mailer: AsyncSmtpTransport<Tokio1Executor>,

    /// Sender mailbox.
    from: Mailbox,
}

impl SmtpEmailProvider {
    /// Create a new SMTP email provider.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::EmailError` if the relay host or the sender
    /// address is invalid.
    pub fn new(
        smtp_server: &str,
        smtp_port: u16,
        credentials: Option<(String, String)>,
        from_email: &str,
        from_name: &str,
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_server)
            .map_err(|e| AuthError::EmailError(format!("SMTP relay error: {e}")))?
            .port(smtp_port);
        if let Some((username, password)) = credentials {
            builder = builder.credentials(Credentials::new(username, password));
        }

        let from = format!("{from_name} <{from_email}>")
            .parse::<Mailbox>()
            .map_err(|e| AuthError::EmailError(format!("Invalid from address: {e}")))?;

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| AuthError::EmailError(format!("Invalid to address: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AuthError::EmailError(format!("Failed to build email: {e}")))?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| AuthError::EmailError(format!("Failed to send email: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl EmailProvider for SmtpEmailProvider {
    async fn send_magic_link(&self, to: &str, link: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let expires_minutes = (expires_at - Utc::now()).num_minutes().max(1);
        let body = format!(
            "Click the link below to sign in to Edumarket. \
             This link will expire in {expires_minutes} minutes.\n\n{link}\n\n\
             If you didn't request this email, you can safely ignore it."
        );
        self.send(to, "Sign in to Edumarket", body).await?;
        tracing::info!(to = %to, "Sent magic link email");
        Ok(())
    }

    async fn send_notification(&self, to: &str, subject: &str, message: &str) -> Result<()> {
        self.send(to, subject, message.to_string()).await?;
        tracing::debug!(to = %to, subject = %subject, "Sent notification email");
        Ok(())
    }
}
