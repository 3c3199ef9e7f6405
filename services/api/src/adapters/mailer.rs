//! services/api/src/adapters/mailer.rs
//!
//! SMTP implementation of the `EmailSender` port, built on `lettre`'s async
//! transport. One transport (and its connection pool) is created at startup
//! and shared by every caller.

use crate::config::SmtpConfig;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use mindi_core::domain::OutgoingEmail;
use mindi_core::ports::{EmailSender, PortError, PortResult};
use tracing::{info, warn};

#[derive(Clone)]
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> PortResult<Self> {
        let from = sender_mailbox(&config.from_name, &config.from_email)?;

        // A local relay is reached in plain text; anything else must offer STARTTLS.
        let mut builder = if config.server == "localhost" {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.server)
                .map_err(|e| PortError::Unexpected(format!("Invalid SMTP relay: {e}")))?
        };
        builder = builder.port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

fn sender_mailbox(name: &str, email: &str) -> PortResult<Mailbox> {
    let address = email
        .parse::<Address>()
        .map_err(|e| PortError::Unexpected(format!("Invalid sender address '{email}': {e}")))?;
    Ok(Mailbox::new(Some(name.to_string()), address))
}

/// Assembles the MIME message: an HTML body with an optional plain-text
/// alternative, wrapped in `multipart/mixed` when there are attachments.
pub fn build_message(from: &Mailbox, email: &OutgoingEmail) -> PortResult<Message> {
    let to = email
        .to
        .parse::<Mailbox>()
        .map_err(|e| PortError::Unexpected(format!("Invalid recipient '{}': {e}", email.to)))?;

    let body = match &email.text_body {
        Some(text) => MultiPart::alternative_plain_html(text.clone(), email.html_body.clone()),
        None => MultiPart::alternative().singlepart(SinglePart::html(email.html_body.clone())),
    };

    let body = if email.attachments.is_empty() {
        body
    } else {
        let mut mixed = MultiPart::mixed().multipart(body);
        for attachment in &email.attachments {
            let content_type = ContentType::parse(&attachment.content_type).map_err(|e| {
                PortError::Unexpected(format!(
                    "Invalid content type '{}' for {}: {e}",
                    attachment.content_type, attachment.filename
                ))
            })?;
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.content.clone(), content_type),
            );
        }
        mixed
    };

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(email.subject.clone())
        .multipart(body)
        .map_err(|e| PortError::Unexpected(format!("Failed to build email: {e}")))
}

#[async_trait]
impl EmailSender for SmtpMailer {
    async fn send(&self, email: &OutgoingEmail) -> PortResult<()> {
        let message = build_message(&self.from, email)?;
        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %email.to, "Email sent");
                Ok(())
            }
            Err(e) => {
                warn!(to = %email.to, error = %e, "SMTP relay rejected email");
                Err(PortError::Unexpected(format!("Failed to send email: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindi_core::domain::EmailAttachment;

    fn email() -> OutgoingEmail {
        OutgoingEmail {
            to: "kim@example.com".into(),
            subject: "Weekly report".into(),
            html_body: "<p>hello</p>".into(),
            text_body: Some("hello".into()),
            attachments: vec![],
        }
    }

    fn from() -> Mailbox {
        sender_mailbox("MINDI", "noreply@example.com").unwrap()
    }

    fn render(message: &Message) -> String {
        String::from_utf8_lossy(&message.formatted()).into_owned()
    }

    #[test]
    fn html_and_text_become_alternatives() {
        let formatted = render(&build_message(&from(), &email()).unwrap());
        assert!(formatted.contains("multipart/alternative"));
        assert!(formatted.contains("text/plain"));
        assert!(formatted.contains("text/html"));
        assert!(!formatted.contains("multipart/mixed"));
    }

    #[test]
    fn attachments_wrap_the_body_in_mixed() {
        let mut email = email();
        email.attachments.push(EmailAttachment {
            filename: "report.pdf".into(),
            content_type: "application/pdf".into(),
            content: b"%PDF-1.4".to_vec(),
        });

        let formatted = render(&build_message(&from(), &email).unwrap());
        assert!(formatted.contains("multipart/mixed"));
        assert!(formatted.contains("report.pdf"));
    }

    #[test]
    fn invalid_recipient_is_rejected() {
        let mut email = email();
        email.to = "not an address".into();
        assert!(build_message(&from(), &email).is_err());
    }
}
