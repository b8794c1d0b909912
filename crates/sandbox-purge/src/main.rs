//! sandbox-purge binary.
//!
//! Reads `sandbox.toml` (or the path given with `--config`) plus `SANDBOX_*`
//! environment variables, then notifies the owners of aging sandbox spaces and
//! purges the expired ones. Exits non-zero when any organization or space
//! failed.
//!
//! ```
//! sandbox-purge --config /etc/sandbox.toml --dry-run
//! ```

mod config;
mod mail;
mod templates;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context as _, bail};
use chrono::Utc;
use clap::Parser;
use sandbox_cf::CfClient;
use sandbox_core::{client::ResourceClient, notify::Notifier, sweep::Sweep};
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

use crate::{config::Options, mail::SmtpMailer, templates::HtmlRenderer};

#[derive(Parser)]
#[command(author, version, about = "Notify and purge aging sandbox spaces")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "sandbox.toml", env = "SANDBOX_CONFIG")]
  config: PathBuf,

  /// Log what would happen without changing anything.
  #[arg(long, conflicts_with = "execute")]
  dry_run: bool,

  /// Send mail and purge spaces, overriding `dry_run` in the configuration.
  #[arg(long)]
  execute: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let mut options = Options::load(&cli.config).with_context(|| {
    format!("failed to load configuration from {}", cli.config.display())
  })?;
  if cli.execute {
    options.dry_run = false;
  } else if cli.dry_run {
    options.dry_run = true;
  }
  let settings = options.sweep_settings()?;

  let client = CfClient::new(options.cf_config())
    .context("failed to build API client")?;
  let mailer =
    SmtpMailer::new(&options.smtp).context("failed to configure SMTP")?;
  let notifier = Notifier::new(
    Arc::new(HtmlRenderer),
    Arc::new(mailer),
    options.mail_settings(),
  );
  let sweep =
    Sweep::new(ResourceClient::uniform(Arc::new(client)), notifier, settings);

  let report = tokio::select! {
    report = sweep.run(Utc::now()) => report?,
    _ = tokio::signal::ctrl_c() => {
      warn!("interrupted; abandoning the in-flight step");
      bail!("interrupted");
    }
  };

  for failure in &report.failures {
    error!(%failure, "sweep failure");
  }
  if !report.is_success() {
    bail!("{} failure(s) during sweep", report.failures.len());
  }

  info!(
    orgs = report.organizations,
    notified = report.notified.len(),
    purged = report.purged.len(),
    "done",
  );
  Ok(())
}
