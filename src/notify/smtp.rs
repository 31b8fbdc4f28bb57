use super::{digest_subject, Dispatcher};
use crate::models::{MailConfig, PlaylistItem, Snapshot};
use crate::render;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

/// Delivers digests over SMTP with TLS. One session per digest; the
/// connection is opened, used and dropped inside `send_digest`.
pub struct SmtpDispatcher;

impl SmtpDispatcher {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SmtpDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble the single HTML message addressed to all recipients.
pub fn build_digest_message(
    mail: &MailConfig,
    recipients: &[String],
    subject: &str,
    html_body: String,
) -> Result<Message> {
    let from: Mailbox = mail
        .sender
        .parse()
        .with_context(|| format!("invalid sender address {:?}", mail.sender))?;

    let mut builder = Message::builder().from(from).subject(subject.to_string());
    for addr in recipients {
        let to: Mailbox = addr
            .parse()
            .with_context(|| format!("invalid recipient address {:?}", addr))?;
        builder = builder.to(to);
    }

    let message = builder
        .header(ContentType::TEXT_HTML)
        .body(html_body)
        .context("assembling digest message")?;
    Ok(message)
}

#[async_trait]
impl Dispatcher for SmtpDispatcher {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send_digest(
        &self,
        mail: &MailConfig,
        recipients: &[String],
        playlist: &Snapshot,
        new_items: &[PlaylistItem],
    ) -> Result<()> {
        let subject = digest_subject(playlist);
        let body = render::digest_html(&subject, playlist, new_items);
        let message = build_digest_message(mail, recipients, &subject, body)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&mail.host)
            .with_context(|| format!("building SMTP transport for {}", mail.host))?
            .port(mail.port)
            .credentials(Credentials::new(mail.sender.clone(), mail.password.clone()))
            .build();

        transport
            .send(message)
            .await
            .with_context(|| format!("delivering digest via {}:{}", mail.host, mail.port))?;

        info!(
            "Sent digest for playlist {:?} to {} recipient(s)",
            playlist.name,
            recipients.len()
        );
        Ok(())
    }
}
