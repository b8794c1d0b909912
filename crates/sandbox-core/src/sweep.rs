//! One full run over every sandbox organization.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
  Error, Result,
  client::ResourceClient,
  inventory::{HumanUsers, human_user_guids, list_org_resources, list_sandbox_orgs},
  lifecycle::{LifecyclePolicy, SpaceDetails, truncate_to_day},
  notify::{Notifier, NotifyError, notify_space},
  purge::{PurgeError, PurgeExecutor, PurgeOutcome, PurgeSettings},
  resource::Organization,
};

/// What to do with the rest of an organization after a space fails to purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
  /// Record the failure and move on to the next space.
  #[default]
  Continue,
  /// Record the failure and skip the organization's remaining purges.
  StopOrganization,
}

#[derive(Debug, Clone)]
pub struct SweepSettings {
  pub org_prefix:     String,
  pub lifecycle:      LifecyclePolicy,
  /// Also carries the run-wide dry-run switch.
  pub purge:          PurgeSettings,
  pub failure_policy: FailurePolicy,
}

// ─── Report ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceName {
  pub org:   String,
  pub space: String,
}

impl fmt::Display for SpaceName {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.org, self.space)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgedSpace {
  pub name:    SpaceName,
  pub outcome: PurgeOutcome,
}

#[derive(Debug, Error)]
pub enum FailureCause {
  #[error(transparent)]
  Inventory(Error),
  #[error(transparent)]
  Notify(NotifyError),
  #[error(transparent)]
  Purge(PurgeError),
}

/// A failure recorded during the run. `space` is `None` when the whole
/// organization could not be inventoried.
#[derive(Debug)]
pub struct Failure {
  pub org:   String,
  pub space: Option<String>,
  pub cause: FailureCause,
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match &self.space {
      Some(space) => write!(f, "{}/{}: {}", self.org, space, self.cause),
      None => write!(f, "{}: {}", self.org, self.cause),
    }
  }
}

#[derive(Debug, Default)]
pub struct SweepReport {
  pub organizations: usize,
  pub notified:      Vec<SpaceName>,
  pub purged:        Vec<PurgedSpace>,
  pub failures:      Vec<Failure>,
}

impl SweepReport {
  pub fn is_success(&self) -> bool { self.failures.is_empty() }
}

// ─── Sweep ───────────────────────────────────────────────────────────────────

pub struct Sweep {
  client:   ResourceClient,
  notifier: Notifier,
  settings: SweepSettings,
}

impl Sweep {
  pub fn new(
    client: ResourceClient,
    notifier: Notifier,
    settings: SweepSettings,
  ) -> Self {
    Self { client, notifier, settings }
  }

  /// Classify and act on every sandbox organization as of `now`.
  ///
  /// Only failing to list organizations or users aborts the run; everything
  /// else is collected into the report.
  pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepReport> {
    let orgs =
      list_sandbox_orgs(self.client.organizations.as_ref(), &self.settings.org_prefix)
        .await
        .map_err(Error::ListOrganizations)?;
    let users = self.client.users.list_all().await.map_err(Error::ListUsers)?;
    let human = human_user_guids(&users);

    info!(
      orgs = orgs.len(),
      human_users = human.len(),
      dry_run = self.settings.purge.dry_run,
      "starting sweep",
    );

    let now = truncate_to_day(now);
    let mut report = SweepReport { organizations: orgs.len(), ..Default::default() };
    for org in &orgs {
      self.sweep_org(org, &human, now, &mut report).await;
    }

    info!(
      notified = report.notified.len(),
      purged = report.purged.len(),
      failures = report.failures.len(),
      "sweep finished",
    );
    Ok(report)
  }

  async fn sweep_org(
    &self,
    org: &Organization,
    human: &HumanUsers,
    now: DateTime<Utc>,
    report: &mut SweepReport,
  ) {
    let inventory = match list_org_resources(&self.client, org).await {
      Ok(inventory) => inventory,
      Err(source) => {
        let cause = Error::Inventory { org: org.name.clone(), source };
        error!(org = %org.name, error = %cause, "skipping organization");
        report.failures.push(Failure {
          org:   org.name.clone(),
          space: None,
          cause: FailureCause::Inventory(cause),
        });
        return;
      }
    };

    let classification = self.settings.lifecycle.classify(&inventory, now);
    info!(
      org = %org.name,
      notify = classification.notify.len(),
      purge = classification.purge.len(),
      "classified spaces",
    );

    for details in &classification.notify {
      match notify_space(
        &self.client,
        &self.notifier,
        human,
        org,
        details,
        self.settings.lifecycle.purge_days,
        self.settings.purge.dry_run,
      )
      .await
      {
        Ok(_) => report.notified.push(space_name(org, details)),
        Err(err) => {
          error!(org = %org.name, space = %details.space.name, error = %err, "notify failed");
          report.failures.push(Failure {
            org:   org.name.clone(),
            space: Some(details.space.name.clone()),
            cause: FailureCause::Notify(err),
          });
        }
      }
    }

    let executor =
      PurgeExecutor::new(&self.client, &self.notifier, human, &self.settings.purge);
    for details in &classification.purge {
      match executor.purge(org, details).await {
        Ok(outcome) => report.purged.push(PurgedSpace {
          name: space_name(org, details),
          outcome,
        }),
        Err(err) => {
          error!(
            org = %org.name,
            space = %details.space.name,
            stage = %err.stage(),
            error = %err,
            "purge failed",
          );
          report.failures.push(Failure {
            org:   org.name.clone(),
            space: Some(details.space.name.clone()),
            cause: FailureCause::Purge(err),
          });
          if self.settings.failure_policy == FailurePolicy::StopOrganization {
            warn!(org = %org.name, "skipping remaining purges in organization");
            break;
          }
        }
      }
    }
  }
}

fn space_name(org: &Organization, details: &SpaceDetails) -> SpaceName {
  SpaceName { org: org.name.clone(), space: details.space.name.clone() }
}
