//! Transactional email over SMTP
//!
//! Without an SMTP host the message is logged instead of sent, so password
//! resets stay usable in development.

use anyhow::{anyhow, Result};
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};

use crate::config::MailConfig;

/// Outgoing mail as built by the services
#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub struct EmailService {
    config: MailConfig,
}

impl EmailService {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.is_enabled()
    }

    pub async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if !self.config.is_enabled() {
            tracing::info!(
                to = %email.to,
                subject = %email.subject,
                "SMTP not configured, logging email instead:\n{}",
                email.body
            );
            return Ok(());
        }

        let from = format!("{} <{}>", self.config.from_name, self.config.from_address);
        let message = Message::builder()
            .from(from.parse().map_err(|e| anyhow!("Invalid from address: {}", e))?)
            .to(email.to.parse().map_err(|e| anyhow!("Invalid to address: {}", e))?)
            .subject(email.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email.body.clone())
            .map_err(|e| anyhow!("Failed to build email: {}", e))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.smtp_host)
            .map_err(|e| anyhow!("Failed to create SMTP transport: {}", e))?
            .port(self.config.smtp_port);
        if !self.config.smtp_username.is_empty() {
            builder = builder.credentials(Credentials::new(
                self.config.smtp_username.clone(),
                self.config.smtp_password.clone(),
            ));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| anyhow!("Failed to send email: {}", e))?;

        tracing::info!(to = %email.to, "Email sent");
        Ok(())
    }
}

/// Password reset message with the link the user follows
pub fn password_reset_email(to: &str, site_name: &str, link: &str, valid_minutes: i64) -> OutgoingEmail {
    OutgoingEmail {
        to: to.to_string(),
        subject: format!("[{}] Atur ulang kata sandi", site_name),
        body: format!(
            "Halo,\n\nKami menerima permintaan untuk mengatur ulang kata sandi akunmu.\n\
             Buka tautan berikut untuk membuat kata sandi baru:\n\n{}\n\n\
             Tautan ini berlaku selama {} menit dan hanya bisa dipakai sekali.\n\
             Jika kamu tidak meminta ini, abaikan email ini.\n\n{}",
            link, valid_minutes, site_name
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_without_smtp_logs_and_succeeds() {
        let service = EmailService::new(MailConfig::default());
        assert!(!service.is_enabled());

        let email = password_reset_email("budi@example.com", "Pemuda Magelang", "http://x/reset", 60);
        service.send(&email).await.unwrap();
    }

    #[test]
    fn test_password_reset_email_contains_link() {
        let email = password_reset_email(
            "sari@example.com",
            "Pemuda Magelang",
            "https://pemudamagelang.id/reset-password?token=abc",
            60,
        );
        assert_eq!(email.to, "sari@example.com");
        assert!(email.subject.contains("Pemuda Magelang"));
        assert!(email.body.contains("reset-password?token=abc"));
        assert!(email.body.contains("60 menit"));
    }
}
