//! Owner notices: what they say, how they are rendered, and how they are
//! delivered.
//!
//! Rendering and delivery are capabilities supplied by the binary (askama
//! templates and an SMTP transport); this module only composes them.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  ApiError, BoxError,
  client::ResourceClient,
  inventory::HumanUsers,
  lifecycle::SpaceDetails,
  resource::{Organization, Space},
  roles::{RecipientError, list_recipients},
};

// ─── Notices ─────────────────────────────────────────────────────────────────

/// The two emails a space owner can receive.
#[derive(Debug, Clone, Copy)]
pub enum Notice<'a> {
  /// The space will be purged on `purge_date` unless it is emptied.
  Expiring {
    org:        &'a Organization,
    space:      &'a Space,
    purge_date: DateTime<Utc>,
    days:       i64,
  },
  /// The space is being purged now.
  Purged {
    org:   &'a Organization,
    space: &'a Space,
    days:  i64,
  },
}

impl<'a> Notice<'a> {
  /// The warning for a space in the notify set. The purge date is counted
  /// from the same effective timestamp the classification used, saturating
  /// at the latest representable instant.
  pub fn expiring(
    org: &'a Organization,
    details: &'a SpaceDetails,
    purge_days: i64,
  ) -> Self {
    Self::Expiring {
      org,
      space: &details.space,
      purge_date: Duration::try_days(purge_days)
        .and_then(|days| details.timestamp.checked_add_signed(days))
        .unwrap_or(DateTime::<Utc>::MAX_UTC),
      days: purge_days,
    }
  }
}

/// Turns a notice into an HTML body.
pub trait NoticeRenderer: Send + Sync {
  fn render(&self, notice: &Notice<'_>) -> Result<String, BoxError>;
}

/// Delivers one message. Must be a no-op when `recipients` is empty.
#[async_trait]
pub trait Mailer: Send + Sync {
  async fn send(
    &self,
    sender: &str,
    subject: &str,
    body: &str,
    recipients: &[String],
  ) -> Result<(), BoxError>;
}

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("error listing users on space {space}: {source}")]
  ListUsers {
    space:  String,
    #[source]
    source: ApiError,
  },

  #[error("error listing recipients on space {space}: {source}")]
  Recipients {
    space:  String,
    #[source]
    source: RecipientError,
  },

  #[error("error rendering email: {0}")]
  Render(#[source] BoxError),

  #[error("error sending mail: {0}")]
  Send(#[source] BoxError),
}

// ─── Notifier ────────────────────────────────────────────────────────────────

/// Envelope settings shared by every notice.
#[derive(Debug, Clone)]
pub struct MailSettings {
  pub sender:         String,
  pub notify_subject: String,
  pub purge_subject:  String,
}

/// Renders and sends notices.
#[derive(Clone)]
pub struct Notifier {
  renderer: Arc<dyn NoticeRenderer>,
  mailer:   Arc<dyn Mailer>,
  settings: MailSettings,
}

impl Notifier {
  pub fn new(
    renderer: Arc<dyn NoticeRenderer>,
    mailer: Arc<dyn Mailer>,
    settings: MailSettings,
  ) -> Self {
    Self { renderer, mailer, settings }
  }

  pub async fn send(
    &self,
    notice: &Notice<'_>,
    recipients: &[String],
  ) -> Result<(), NotifyError> {
    let body = self.renderer.render(notice).map_err(NotifyError::Render)?;
    let subject = match notice {
      Notice::Expiring { .. } => &self.settings.notify_subject,
      Notice::Purged { .. } => &self.settings.purge_subject,
    };
    debug!(?recipients, %body, "sending notice");
    self
      .mailer
      .send(&self.settings.sender, subject, &body, recipients)
      .await
      .map_err(NotifyError::Send)
  }
}

// ─── Notify-set handling ─────────────────────────────────────────────────────

/// Warn the human users of a space in the notify set. Returns the recipients.
/// In dry-run nothing is rendered or sent.
pub async fn notify_space(
  client: &ResourceClient,
  notifier: &Notifier,
  human: &HumanUsers,
  org: &Organization,
  details: &SpaceDetails,
  purge_days: i64,
  dry_run: bool,
) -> Result<Vec<String>, NotifyError> {
  let space = &details.space;
  let space_users = client.spaces.list_users(&space.guid).await.map_err(
    |source| NotifyError::ListUsers { space: space.name.clone(), source },
  )?;

  let recipients = list_recipients(human, &space_users).map_err(|source| {
    NotifyError::Recipients { space: space.name.clone(), source }
  })?;

  info!(org = %org.name, space = %space.name, ?recipients, dry_run, "notifying space");
  if !dry_run {
    notifier
      .send(&Notice::expiring(org, details, purge_days), &recipients)
      .await?;
  }

  Ok(recipients)
}
