//! SMTP delivery of notices over STARTTLS.

use async_trait::async_trait;
use lettre::{
  AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
  message::{Mailbox, header::ContentType},
  transport::smtp::{
    authentication::Credentials,
    client::{Certificate, Tls, TlsParameters},
  },
};
use sandbox_core::{BoxError, notify::Mailer};
use thiserror::Error;
use tracing::debug;

use crate::config::SmtpOptions;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid smtp certificate: {0}")]
  Certificate(#[source] lettre::transport::smtp::Error),

  #[error("smtp tls setup failed: {0}")]
  Tls(#[source] lettre::transport::smtp::Error),
}

pub struct SmtpMailer {
  transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpMailer {
  /// Build the transport. No connection is made until the first send.
  ///
  /// When `cert` is set it is added as a trusted root and the server name is
  /// checked against `host`.
  pub fn new(options: &SmtpOptions) -> Result<Self, Error> {
    let mut tls = TlsParameters::builder(options.host.clone());
    if let Some(pem) = &options.cert {
      let cert = Certificate::from_pem(pem.as_bytes()).map_err(Error::Certificate)?;
      tls = tls.add_root_certificate(cert);
    }
    let tls = tls.build_rustls().map_err(Error::Tls)?;

    let transport =
      AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&options.host)
        .port(options.port)
        .tls(Tls::Required(tls))
        .credentials(Credentials::new(options.user.clone(), options.pass.clone()))
        .build();
    Ok(Self { transport })
  }
}

#[async_trait]
impl Mailer for SmtpMailer {
  async fn send(
    &self,
    sender: &str,
    subject: &str,
    body: &str,
    recipients: &[String],
  ) -> Result<(), BoxError> {
    if recipients.is_empty() {
      debug!(subject, "no recipients; not sending");
      return Ok(());
    }

    let mut message = Message::builder()
      .from(sender.parse::<Mailbox>()?)
      .subject(subject)
      .header(ContentType::TEXT_HTML);
    for recipient in recipients {
      message = message.to(recipient.parse::<Mailbox>()?);
    }
    let message = message.body(body.to_string())?;

    self.transport.send(message).await?;
    Ok(())
  }
}
