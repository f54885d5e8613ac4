//! Outbound mail transport over SMTP.
//!
//! One transport is built per dispatch invocation and shared by every
//! recipient in the batch; dropping it closes the underlying
//! connections, whatever happened inside the send loop.

use async_trait::async_trait;
use lettre::message::{Mailbox, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;

use crate::credentials::SmtpDescriptor;

#[derive(Debug, Error)]
pub enum MailerError {
    #[error("invalid mail address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not assemble message: {0}")]
    Message(#[from] lettre::error::Error),

    #[error("smtp failure: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),
}

/// Body of an outgoing message.
#[derive(Debug, Clone)]
pub enum MailBody {
    Html(String),
    Plain(String),
}

/// One personalized message ready for transmission.
#[derive(Debug, Clone)]
pub struct OutboundEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: MailBody,
}

/// A live transport for one invocation's batch.
///
/// Errors are per-message: an unparsable recipient or a refused
/// transmission fails that message only.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError>;
}

/// Builds one transport per invocation from a resolved descriptor.
#[async_trait]
pub trait MailTransportFactory: Send + Sync {
    async fn open(&self, descriptor: &SmtpDescriptor) -> Result<Box<dyn MailTransport>, MailerError>;
}

/// Lettre-backed SMTP transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
    /// Build a transport for the descriptor. No connection is opened
    /// until the first send.
    ///
    /// TLS follows the port: 465 speaks implicit TLS, 587 requires
    /// STARTTLS, anything else upgrades opportunistically.
    pub fn from_descriptor(descriptor: &SmtpDescriptor) -> Result<Self, MailerError> {
        let credentials = Credentials::new(
            descriptor.username.clone(),
            descriptor.password.clone(),
        );

        let tls = match descriptor.port {
            465 => Tls::Wrapper(TlsParameters::new(descriptor.host.clone())?),
            587 => Tls::Required(TlsParameters::new(descriptor.host.clone())?),
            _ => Tls::Opportunistic(TlsParameters::new(descriptor.host.clone())?),
        };

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&descriptor.host)?
            .port(descriptor.port)
            .credentials(credentials)
            .tls(tls)
            .build();

        Ok(Self { transport })
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
        let builder = Message::builder()
            .from(email.from.parse::<Mailbox>()?)
            .to(email.to.parse::<Mailbox>()?)
            .subject(email.subject.as_str());

        let message = match &email.body {
            MailBody::Html(html) => builder.singlepart(SinglePart::html(html.clone()))?,
            MailBody::Plain(text) => builder.singlepart(SinglePart::plain(text.clone()))?,
        };

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Production factory handing out [`SmtpMailer`] transports.
pub struct SmtpMailerFactory;

#[async_trait]
impl MailTransportFactory for SmtpMailerFactory {
    async fn open(&self, descriptor: &SmtpDescriptor) -> Result<Box<dyn MailTransport>, MailerError> {
        Ok(Box::new(SmtpMailer::from_descriptor(descriptor)?))
    }
}

/// Recording mock transport shared by dispatcher and handler tests.
#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashSet;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Default)]
    pub struct MailLog {
        /// Recipient addresses whose sends should be refused.
        pub fail_for: HashSet<String>,
        pub sent: Mutex<Vec<OutboundEmail>>,
    }

    /// Factory and transport in one: every `open` hands out a
    /// transport recording into the same shared log.
    #[derive(Clone, Default)]
    pub struct RecordingMailer {
        pub log: Arc<MailLog>,
        /// When set, `open` itself fails with this message.
        pub refuse_open: Option<String>,
    }

    impl RecordingMailer {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_for(recipients: &[&str]) -> Self {
            Self {
                log: Arc::new(MailLog {
                    fail_for: recipients.iter().map(|r| r.to_string()).collect(),
                    sent: Mutex::new(Vec::new()),
                }),
                refuse_open: None,
            }
        }

        pub fn sent(&self) -> Vec<OutboundEmail> {
            self.log.sent.lock().unwrap().clone()
        }
    }

    fn refusal() -> MailerError {
        // Any constructible MailerError will do; the pipeline only
        // keeps its message text.
        MailerError::Address("no-at-sign".parse::<lettre::Address>().unwrap_err())
    }

    struct RecordingTransport {
        log: Arc<MailLog>,
    }

    #[async_trait]
    impl MailTransport for RecordingTransport {
        async fn send(&self, email: &OutboundEmail) -> Result<(), MailerError> {
            if self.log.fail_for.contains(&email.to) {
                return Err(refusal());
            }
            self.log.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    #[async_trait]
    impl MailTransportFactory for RecordingMailer {
        async fn open(
            &self,
            _descriptor: &SmtpDescriptor,
        ) -> Result<Box<dyn MailTransport>, MailerError> {
            if self.refuse_open.is_some() {
                return Err(refusal());
            }
            Ok(Box::new(RecordingTransport {
                log: Arc::clone(&self.log),
            }))
        }
    }
}
