use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use thiserror::Error;
use tracing::{error, info};

use crate::config::SmtpSettings;

#[derive(Debug, Error)]
pub enum MailError {
    /// The relay rejected our credentials.
    #[error("smtp authentication failed: {0}")]
    Authentication(String),
    #[error("smtp transport failed: {0}")]
    Transport(String),
    #[error("invalid message: {0}")]
    Message(String),
}

/// A plain-text email ready to hand to a [`Mailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Build the password reset email; the token travels as the last path
/// segment of the link.
pub fn password_reset_mail(to: &str, link_base: &str, token: &str) -> OutgoingMail {
    let link = format!("{}/{}", link_base.trim_end_matches('/'), token);
    let body = format!(
        "You are receiving this because you (or someone else) have requested the reset \
         of the password for your account.\n\n\
         Please click on the following link, or paste this into your browser to complete \
         the process:\n\n\
         {link}\n\n\
         If you did not request this, please ignore this email and your password will \
         remain unchanged.\n"
    );
    OutgoingMail {
        to: to.to_string(),
        subject: "TechStock Password Reset".to_string(),
        body,
    }
}

type SmtpTransport = AsyncSmtpTransport<Tokio1Executor>;

#[derive(Clone)]
pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, MailError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Message(e.to_string()))?;
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());
        let transport = SmtpTransport::starttls_relay(&settings.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(settings.port)
            .credentials(creds)
            .build();
        Ok(Self { transport, from })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let to: Mailbox = mail
            .to
            .parse()
            .map_err(|e: lettre::address::AddressError| MailError::Message(e.to_string()))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| MailError::Message(e.to_string()))?;

        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %mail.to, "email sent");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, to = %mail.to, "email send failed");
                let code = e.status().map(|c| c.to_string());
                Err(classify_smtp_failure(code.as_deref(), &e.to_string()))
            }
        }
    }
}

/// SMTP 530/534/535 replies, or a client-side auth negotiation failure,
/// mean the credentials were refused.
fn classify_smtp_failure(code: Option<&str>, message: &str) -> MailError {
    let auth_code = code.is_some_and(|c| matches!(c, "530" | "534" | "535"));
    let lower = message.to_ascii_lowercase();
    if auth_code
        || lower.contains("authentication unsuccessful")
        || lower.contains("basic authentication is disabled")
        || lower.contains("no compatible authentication mechanism")
    {
        MailError::Authentication(message.to_string())
    } else {
        MailError::Transport(message.to_string())
    }
}

#[cfg(test)]
pub mod fake {
    use std::sync::Mutex;

    use super::*;

    /// How a [`RecordingMailer`] should respond to `send`.
    #[derive(Debug, Clone, Copy)]
    pub enum Outcome {
        Deliver,
        RejectAuth,
        FailTransport,
    }

    pub struct RecordingMailer {
        outcome: Outcome,
        pub sent: Mutex<Vec<OutgoingMail>>,
    }

    impl RecordingMailer {
        pub fn new(outcome: Outcome) -> Self {
            Self {
                outcome,
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
            match self.outcome {
                Outcome::Deliver => {
                    self.sent.lock().unwrap().push(mail.clone());
                    Ok(())
                }
                Outcome::RejectAuth => Err(MailError::Authentication(
                    "535 5.7.3 Authentication unsuccessful".into(),
                )),
                Outcome::FailTransport => {
                    Err(MailError::Transport("connection refused".into()))
                }
            }
        }
    }
}
