/// Outgoing email
///
/// Registration and the resend flow send a verification link through a
/// [`Mailer`]. With SMTP configured that is [`SmtpMailer`] (STARTTLS via
/// lettre); otherwise [`LogMailer`] writes the link to the log so local
/// development works without a mail server.

use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::config::{EmailConfig, SmtpConfig};

pub const VERIFICATION_SUBJECT: &str = "Verify your VetConnect account";

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("Invalid address: {0}")]
    Address(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("SMTP transport error: {0}")]
    Transport(String),
}

/// Sends account emails
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Sends the verification link for a freshly issued token
    async fn send_verification(&self, to: &str, username: &str, link: &str) -> Result<(), EmailError>;
}

/// Verification link for a token
pub fn verification_link(frontend_url: &str, token: &str) -> String {
    format!("{}/verify/{}", frontend_url.trim_end_matches('/'), token)
}

/// How long a link stays valid, in words
pub fn expiry_phrase(minutes: i64) -> String {
    let minutes = minutes.max(1);
    match (minutes / 60, minutes % 60) {
        (1, 0) => "one hour".to_string(),
        (hours, 0) => format!("{hours} hours"),
        (0, 1) => "one minute".to_string(),
        _ => format!("{minutes} minutes"),
    }
}

pub fn verification_body(username: &str, link: &str, ttl_minutes: i64) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{subject}</title>
</head>
<body style="font-family: Arial, sans-serif; line-height: 1.6; color: #333;">
    <h2>Verify your account</h2>
    <p>Hello {username},</p>
    <p>Click the link below to verify your email address. The link expires in {expiry}.</p>
    <p><a href="{link}">{link}</a></p>
    <p style="font-size: 12px; color: #666;">If you did not create a VetConnect account you can ignore this email.</p>
</body>
</html>"#,
        subject = VERIFICATION_SUBJECT,
        username = html_escape(username),
        link = link,
        expiry = expiry_phrase(ttl_minutes),
    )
}

fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// SMTP delivery over STARTTLS
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    ttl_minutes: i64,
}

impl SmtpMailer {
    pub fn new(smtp: &SmtpConfig, from: &str, ttl_minutes: i64) -> Result<Self, EmailError> {
        let from = from
            .parse::<Mailbox>()
            .map_err(|e| EmailError::Address(format!("{from}: {e}")))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| EmailError::Transport(format!("create SMTP transport: {e}")))?
            .port(smtp.port)
            .credentials(Credentials::new(smtp.username.clone(), smtp.password.clone()))
            .build();

        Ok(Self {
            transport,
            from,
            ttl_minutes,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_verification(&self, to: &str, username: &str, link: &str) -> Result<(), EmailError> {
        let to = to
            .parse::<Mailbox>()
            .map_err(|e| EmailError::Address(format!("{to}: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(VERIFICATION_SUBJECT)
            .header(ContentType::TEXT_HTML)
            .body(verification_body(username, link, self.ttl_minutes))
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        Ok(())
    }
}

/// Logs verification links instead of sending them
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_verification(&self, to: &str, username: &str, link: &str) -> Result<(), EmailError> {
        tracing::info!(to = %to, username = %username, link = %link, "SMTP not configured, verification link logged");
        Ok(())
    }
}

/// Picks the mailer for the configuration
pub fn mailer_from_config(config: &EmailConfig) -> Result<Box<dyn Mailer>, EmailError> {
    match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Using SMTP mailer");
            Ok(Box::new(SmtpMailer::new(smtp, &config.from, config.verification_ttl_minutes)?))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, verification emails will only be logged");
            Ok(Box::new(LogMailer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_link() {
        assert_eq!(
            verification_link("http://localhost:3000/", "abc"),
            "http://localhost:3000/verify/abc"
        );
    }

    #[test]
    fn test_verification_body_escapes_username() {
        let body = verification_body("<b>x</b>", "https://portal.example.com/verify/t", 60);
        assert!(body.contains("&lt;b&gt;x&lt;/b&gt;"));
        assert!(body.contains(r#"href="https://portal.example.com/verify/t""#));
        assert!(body.contains("Verify your account"));
    }

    #[test]
    fn test_body_states_configured_expiry() {
        let body = verification_body("owner", "https://portal.example.com/verify/t", 30);
        assert!(body.contains("expires in 30 minutes"));
        assert!(!body.contains("one hour"));

        let body = verification_body("owner", "https://portal.example.com/verify/t", 60);
        assert!(body.contains("expires in one hour"));
    }

    #[test]
    fn test_expiry_phrase() {
        assert_eq!(expiry_phrase(1), "one minute");
        assert_eq!(expiry_phrase(45), "45 minutes");
        assert_eq!(expiry_phrase(90), "90 minutes");
        assert_eq!(expiry_phrase(120), "2 hours");
        assert_eq!(expiry_phrase(1440), "24 hours");
        assert_eq!(expiry_phrase(0), "one minute");
    }

    #[tokio::test]
    async fn test_log_mailer_never_fails() {
        assert!(LogMailer
            .send_verification("owner@example.com", "owner", "http://x/verify/t")
            .await
            .is_ok());
    }

    #[test]
    fn test_smtp_mailer_rejects_bad_from() {
        let smtp = SmtpConfig {
            host: "smtp.example.com".into(),
            port: 587,
            username: "u".into(),
            password: "p".into(),
        };
        assert!(matches!(
            SmtpMailer::new(&smtp, "not an address", 60),
            Err(EmailError::Address(_))
        ));
    }

    #[test]
    fn test_mailer_from_config_without_smtp() {
        let config = EmailConfig {
            smtp: None,
            from: "VetConnect <no-reply@vetconnect.local>".into(),
            verification_ttl_minutes: 60,
        };
        assert!(mailer_from_config(&config).is_ok());
    }
}
