use std::sync::Arc;

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Tokio1Executor,
    message::{
        Attachment, Body, Mailbox, Message, MultiPart, SinglePart,
        header::{ContentType, HeaderName, HeaderValue},
    },
    transport::smtp::authentication::Credentials,
};

use crate::application::services::{MailTransport, TransportError};
use crate::config::SmtpConfig;
use crate::domain::models::{MailAttachment, QueuedMessage};

const DEFAULT_MIMETYPE: &str = "application/octet-stream";

pub struct SmtpMailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    extra_headers: Vec<(String, String)>,
}

impl SmtpMailTransport {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Arc<dyn MailTransport>> {
        // Port 465 expects implicit TLS, everything else negotiates STARTTLS.
        let mut builder = if config.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        };
        builder = builder.port(config.port).timeout(Some(config.timeout));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Arc::new(Self {
            mailer: builder.build(),
            extra_headers: config.extra_headers.clone(),
        }) as Arc<dyn MailTransport>)
    }

    fn build_payload(
        &self,
        message: &QueuedMessage,
        attachments: &[MailAttachment],
    ) -> Result<Message, TransportError> {
        let to: Mailbox = message
            .to_address
            .parse()
            .map_err(|err| TransportError::Permanent(format!("invalid recipient address: {err}")))?;
        let from: Mailbox = message
            .from_address
            .parse()
            .map_err(|err| TransportError::Permanent(format!("invalid sender address: {err}")))?;

        let builder = Message::builder()
            .from(from)
            .to(to)
            .subject(&message.subject);

        let html_body = message.html_body.as_deref().filter(|html| !html.is_empty());

        let mut email = match (html_body, attachments.is_empty()) {
            (None, true) => builder.body(message.body.clone()).map_err(build_error)?,
            (html, _) => {
                let content = match html {
                    Some(html) => MultiPart::alternative_plain_html(
                        message.body.clone(),
                        html.to_string(),
                    ),
                    None => MultiPart::mixed().singlepart(SinglePart::plain(message.body.clone())),
                };

                let mut mixed = if html.is_some() && !attachments.is_empty() {
                    MultiPart::mixed().multipart(content)
                } else {
                    content
                };
                for attachment in attachments {
                    mixed = mixed.singlepart(attachment_part(attachment)?);
                }
                builder.multipart(mixed).map_err(build_error)?
            }
        };

        for (name, value) in &self.extra_headers {
            let header_name = HeaderName::new_from_ascii(name.clone()).map_err(|err| {
                TransportError::Unknown(anyhow::anyhow!("invalid extra header {name:?}: {err}"))
            })?;
            email
                .headers_mut()
                .insert_raw(HeaderValue::new(header_name, value.clone()));
        }

        Ok(email)
    }
}

#[async_trait]
impl MailTransport for SmtpMailTransport {
    async fn send(
        &self,
        message: &QueuedMessage,
        attachments: &[MailAttachment],
    ) -> Result<(), TransportError> {
        let email = self.build_payload(message, attachments)?;
        self.mailer
            .send(email)
            .await
            // Connection, auth, and protocol rejections all defer the message.
            .map_err(|err| TransportError::Transient(err.to_string()))?;
        Ok(())
    }
}

fn attachment_part(attachment: &MailAttachment) -> Result<SinglePart, TransportError> {
    let mimetype = attachment.mimetype.as_deref().unwrap_or(DEFAULT_MIMETYPE);
    let content_type = ContentType::parse(mimetype).map_err(|err| {
        TransportError::Transient(format!(
            "unparseable attachment mimetype {mimetype:?}: {err}"
        ))
    })?;
    Ok(Attachment::new(attachment.filename.clone())
        .body(Body::new(attachment.content.clone()), content_type))
}

fn build_error(err: lettre::error::Error) -> TransportError {
    // Encoding-class failures while assembling the payload.
    TransportError::Transient(err.to_string())
}
