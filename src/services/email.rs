use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html_body: String,
}

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError>;
}

/// SMTP delivery over STARTTLS
pub struct SmtpEmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn from_config(host: &str, config: &SmtpConfig) -> Result<Self, EmailError> {
        let from = config
            .from
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidAddress(format!("{}: {}", config.from, e)))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| EmailError::Transport(e.to_string()))?
            .port(config.port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        let to = message
            .to
            .parse::<Mailbox>()
            .map_err(|e| EmailError::InvalidAddress(format!("{}: {}", message.to, e)))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject)
            .header(ContentType::TEXT_HTML)
            .body(message.html_body)
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport
            .send(email)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// Used when no SMTP host is configured: the message is only logged
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: EmailMessage) -> Result<(), EmailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "SMTP not configured, email not delivered");
        Ok(())
    }
}

/// Delivery failures are logged and never reach the caller
pub async fn send_best_effort(sender: &dyn EmailSender, message: EmailMessage) {
    let to = message.to.clone();
    if let Err(e) = sender.send(message).await {
        tracing::warn!(to = %to, error = %e, "Email delivery failed");
    }
}

pub fn password_reset_email(to: &str, reset_url: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Password Reset".to_string(),
        html_body: format!(
            "<h1>Password Reset</h1>\n<p>Click the link below to reset your password</p>\n<a href=\"{}\">Reset Password</a>",
            reset_url
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSender;

    #[async_trait]
    impl EmailSender for FailingSender {
        async fn send(&self, _message: EmailMessage) -> Result<(), EmailError> {
            Err(EmailError::Transport("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn best_effort_swallows_failures() {
        send_best_effort(&FailingSender, password_reset_email("a@b.io", "http://x/reset")).await;
    }

    #[test]
    fn reset_email_links_to_url() {
        let email = password_reset_email("a@b.io", "http://x/reset?resetToken=abc");
        assert_eq!(email.subject, "Password Reset");
        assert!(email.html_body.contains("href=\"http://x/reset?resetToken=abc\""));
    }

    #[test]
    fn bad_sender_address_is_rejected() {
        let config = SmtpConfig {
            host: Some("smtp.example.com".into()),
            port: 587,
            username: None,
            password: None,
            from: "not an address".into(),
        };
        assert!(matches!(
            SmtpEmailSender::from_config("smtp.example.com", &config),
            Err(EmailError::InvalidAddress(_))
        ));
    }
}
