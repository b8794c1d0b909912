//! Run options: a TOML file overlaid with `SANDBOX_*` environment variables.

use std::{path::Path, time::Duration};

use chrono::{DateTime, Utc};
use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use sandbox_cf::CfConfig;
use sandbox_core::{
  Error, Result,
  lifecycle::LifecyclePolicy,
  notify::MailSettings,
  purge::{DeletionCheck, PurgeSettings},
  sweep::{FailurePolicy, SweepSettings},
};
use serde::Deserialize;

fn default_notify_days() -> i64 { 25 }
fn default_purge_days() -> i64 { 30 }
fn default_true() -> bool { true }
fn default_attempts() -> u32 { 10 }
fn default_interval_secs() -> u64 { 5 }
fn default_job_timeout_secs() -> u64 { 60 }
fn default_smtp_port() -> u16 { 587 }

/// Upper bound for `notify_days` and `purge_days`.
const MAX_DAYS: i64 = 36_500;

#[derive(Clone, Deserialize)]
pub struct SmtpOptions {
  pub host: String,
  #[serde(default = "default_smtp_port")]
  pub port: u16,
  pub user: String,
  pub pass: String,
  /// PEM root certificate for the SMTP server.
  #[serde(default)]
  pub cert: Option<String>,
}

#[derive(Clone, Deserialize)]
pub struct Options {
  pub api_address:   String,
  pub client_id:     String,
  pub client_secret: String,
  pub org_prefix:    String,

  #[serde(default = "default_notify_days")]
  pub notify_days:        i64,
  #[serde(default = "default_purge_days")]
  pub purge_days:         i64,
  #[serde(default = "default_true")]
  pub dry_run:            bool,
  #[serde(default)]
  pub disable_purge:      bool,
  /// RFC 3339. Resources older than this are aged from it instead.
  #[serde(default)]
  pub time_starts_at:     Option<String>,
  #[serde(default)]
  pub sandbox_quota_name: Option<String>,

  pub mail_sender:         String,
  pub notify_mail_subject: String,
  pub purge_mail_subject:  String,

  #[serde(default = "default_attempts")]
  pub deletion_check_attempts:      u32,
  #[serde(default = "default_interval_secs")]
  pub deletion_check_interval_secs: u64,
  #[serde(default = "default_job_timeout_secs")]
  pub job_timeout_secs:             u64,
  #[serde(default)]
  pub on_purge_error:               FailurePolicy,

  pub smtp: SmtpOptions,
}

impl Options {
  /// Read `path` if it exists, then apply the environment
  /// (`SANDBOX_SMTP__HOST` sets `smtp.host`).
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::from_builder(
      Config::builder().add_source(File::from(path).required(false)),
    )
  }

  fn from_builder(
    builder: config::ConfigBuilder<DefaultState>,
  ) -> Result<Self, ConfigError> {
    builder
      .add_source(
        Environment::with_prefix("SANDBOX")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  fn floor(&self) -> Result<Option<DateTime<Utc>>> {
    let Some(raw) = self.time_starts_at.as_deref() else {
      return Ok(None);
    };
    DateTime::parse_from_rfc3339(raw)
      .map(|at| Some(at.with_timezone(&Utc)))
      .map_err(|err| {
        Error::Configuration(format!("time_starts_at {raw:?} is not RFC 3339: {err}"))
      })
  }

  pub fn sweep_settings(&self) -> Result<SweepSettings> {
    for (key, days) in
      [("notify_days", self.notify_days), ("purge_days", self.purge_days)]
    {
      if !(0..=MAX_DAYS).contains(&days) {
        return Err(Error::Configuration(format!(
          "{key} must be between 0 and {MAX_DAYS}, got {days}"
        )));
      }
    }
    if self.deletion_check_attempts == 0 {
      return Err(Error::Configuration(
        "deletion_check_attempts must be at least 1".into(),
      ));
    }

    Ok(SweepSettings {
      org_prefix:     self.org_prefix.clone(),
      lifecycle:      LifecyclePolicy {
        notify_days:   self.notify_days,
        purge_days:    self.purge_days,
        disable_purge: self.disable_purge,
        floor:         self.floor()?,
      },
      purge:          PurgeSettings {
        dry_run:            self.dry_run,
        purge_days:         self.purge_days,
        sandbox_quota_name: self.sandbox_quota_name.clone(),
        deletion_check:     DeletionCheck {
          max_attempts: self.deletion_check_attempts,
          interval:     Duration::from_secs(self.deletion_check_interval_secs),
        },
        job_timeout:        Duration::from_secs(self.job_timeout_secs),
      },
      failure_policy: self.on_purge_error,
    })
  }

  pub fn cf_config(&self) -> CfConfig {
    CfConfig::new(&self.api_address, &self.client_id, &self.client_secret)
  }

  pub fn mail_settings(&self) -> MailSettings {
    MailSettings {
      sender:         self.mail_sender.clone(),
      notify_subject: self.notify_mail_subject.clone(),
      purge_subject:  self.purge_mail_subject.clone(),
    }
  }
}
