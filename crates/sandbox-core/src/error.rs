//! Error types for `sandbox-core`.

use std::time::Duration;

use thiserror::Error;

/// Type-erased error used at the mailer and renderer seams.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error returned by any capability trait in [`crate::client`].
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("job {guid} failed: {detail}")]
  JobFailed { guid: String, detail: String },

  #[error("timed out after {timeout:?} waiting for job {guid}")]
  JobTimeout { guid: String, timeout: Duration },

  #[error(transparent)]
  Client(BoxError),
}

impl ApiError {
  /// Wrap any client-side failure (transport, status, decoding).
  pub fn client(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Client(Box::new(err))
  }
}

/// Run-level errors. Per-space failures use [`crate::purge::PurgeError`],
/// [`crate::notify::NotifyError`] and [`crate::roles::RecipientError`].
#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid configuration: {0}")]
  Configuration(String),

  #[error("error listing sandbox organizations: {0}")]
  ListOrganizations(#[source] ApiError),

  #[error("error listing users: {0}")]
  ListUsers(#[source] ApiError),

  #[error("error listing resources for org {org}: {source}")]
  Inventory {
    org:    String,
    #[source]
    source: ApiError,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
