//! The purge/recreate state machine for a single space.
//!
//! ```text
//! Gathering ─▶ Notifying ─▶ Deleting ─▶ AwaitingConfirmation ─▶ Recreating ─▶ ReassigningRoles ─▶ Done
//!     │                        │                 │                   │                │
//!     └─ dry run ─▶ Done       └─ fallback:      └─ no members ─▶ Done                │
//!                                 delete apps                                         │
//! any step ─▶ Aborted(PurgeError) ◀────────────────────────────────────────────────────┘
//! ```
//!
//! Steps are strictly sequential: a space is only recreated once the platform
//! has observably finished deleting it, and roles are only reassigned on the
//! recreated space.

use std::{fmt, time::Duration};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  ApiError,
  client::{JobGuid, ListFilter, ResourceClient, SpaceQuotasClient, SpacesClient},
  inventory::HumanUsers,
  lifecycle::SpaceDetails,
  notify::{Notice, Notifier, NotifyError},
  resource::{Organization, RoleType, Space, SpaceCreate, SpaceQuota},
  roles::{
    RecipientError, SpaceMembers, list_recipients, list_space_devs_and_managers,
  },
};

// ─── Settings ────────────────────────────────────────────────────────────────

/// Bounded polling for a deleted space to disappear from lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeletionCheck {
  /// Total number of lookups before giving up. Must be at least one.
  pub max_attempts: u32,
  /// Sleep between consecutive lookups.
  pub interval:     Duration,
}

#[derive(Debug, Clone)]
pub struct PurgeSettings {
  pub dry_run:            bool,
  pub purge_days:         i64,
  /// Quota applied to recreated spaces, looked up by name within the org.
  pub sandbox_quota_name: Option<String>,
  pub deletion_check:     DeletionCheck,
  /// How long to wait on an asynchronous delete job.
  pub job_timeout:        Duration,
}

// ─── Outcome and errors ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeStage {
  Gathering,
  Notifying,
  Deleting,
  AwaitingConfirmation,
  Recreating,
  ReassigningRoles,
}

impl fmt::Display for PurgeStage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Gathering => "gathering",
      Self::Notifying => "notifying",
      Self::Deleting => "deleting",
      Self::AwaitingConfirmation => "awaiting confirmation",
      Self::Recreating => "recreating",
      Self::ReassigningRoles => "reassigning roles",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurgeOutcome {
  /// Nothing was changed; this is what would have happened.
  DryRun {
    recipients: Vec<String>,
    members:    SpaceMembers,
  },
  /// Deleted and left deleted: nobody to give it back to.
  Deleted,
  /// Deleted, recreated, and handed back to its developers and managers.
  Recreated {
    space_guid: String,
    /// The quota actually applied to the recreated space.
    quota_guid: Option<String>,
    roles:      usize,
  },
}

#[derive(Debug, Error)]
pub enum PurgeError {
  #[error("error listing roles with users on space {space}: {source}")]
  ListRoles {
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

  #[error(
    "error sending purge notification email for space {space} in org {org}: \
     {source}"
  )]
  Notify {
    space:  String,
    org:    String,
    #[source]
    source: NotifyError,
  },

  #[error("error purging space {space} in org {org}: {source}")]
  Delete {
    space:  String,
    org:    String,
    #[source]
    source: ApiError,
  },

  #[error("error confirming deletion of space {space} in org {org}: {source}")]
  Confirm {
    space:  String,
    org:    String,
    #[source]
    source: ApiError,
  },

  #[error(
    "maximum attempts reached: space {space} in org {org} still present after \
     {attempts} lookups"
  )]
  MaximumAttemptsReached {
    space:    String,
    org:      String,
    attempts: u32,
  },

  #[error("error recreating space {space} in org {org}: {source}")]
  Recreate {
    space:  String,
    org:    String,
    #[source]
    source: ApiError,
  },

  #[error(
    "error recreating space developers/managers for space {space} in org \
     {org}: {source}"
  )]
  Reassign {
    space:  String,
    org:    String,
    #[source]
    source: ApiError,
  },
}

impl PurgeError {
  /// The step the state machine was in when it aborted.
  pub fn stage(&self) -> PurgeStage {
    match self {
      Self::ListRoles { .. } | Self::Recipients { .. } => PurgeStage::Gathering,
      Self::Notify { .. } => PurgeStage::Notifying,
      Self::Delete { .. } => PurgeStage::Deleting,
      Self::Confirm { .. } | Self::MaximumAttemptsReached { .. } => {
        PurgeStage::AwaitingConfirmation
      }
      Self::Recreate { .. } => PurgeStage::Recreating,
      Self::Reassign { .. } => PurgeStage::ReassigningRoles,
    }
  }
}

// ─── Building blocks ─────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfirmError {
  #[error("maximum attempts reached after {attempts} lookups")]
  MaximumAttemptsReached { attempts: u32 },

  #[error(transparent)]
  Lookup(#[from] ApiError),
}

/// Poll the single-space lookup until the space is gone, issuing at most
/// `check.max_attempts` lookups.
pub async fn wait_until_space_is_fully_deleted(
  spaces: &dyn SpacesClient,
  org_guid: &str,
  space_name: &str,
  check: DeletionCheck,
) -> Result<(), ConfirmError> {
  let filter = ListFilter::default().name(space_name).organization(org_guid);
  for attempt in 1..=check.max_attempts {
    if spaces.single(&filter).await?.is_none() {
      return Ok(());
    }
    debug!(space = space_name, attempt, "space still present after delete");
    if attempt < check.max_attempts {
      tokio::time::sleep(check.interval).await;
    }
  }
  Err(ConfirmError::MaximumAttemptsReached { attempts: check.max_attempts })
}

/// The quota called `name` in the org, if any.
pub async fn resolve_quota(
  space_quotas: &dyn SpaceQuotasClient,
  org_guid: &str,
  name: &str,
) -> Result<Option<SpaceQuota>, ApiError> {
  let filter = ListFilter::default().name(name).organization(org_guid);
  space_quotas.single(&filter).await
}

// ─── State machine ───────────────────────────────────────────────────────────

#[derive(Debug)]
struct Gathered {
  recipients: Vec<String>,
  members:    SpaceMembers,
}

#[derive(Debug)]
enum State {
  Gathering,
  Notifying(Gathered),
  Deleting(Gathered),
  AwaitingConfirmation {
    members: SpaceMembers,
    job:     Option<JobGuid>,
  },
  Recreating(SpaceMembers),
  ReassigningRoles {
    members: SpaceMembers,
    space:   Space,
    quota:   Option<String>,
  },
  Done(PurgeOutcome),
}

impl State {
  fn stage(&self) -> Option<PurgeStage> {
    Some(match self {
      Self::Gathering => PurgeStage::Gathering,
      Self::Notifying(_) => PurgeStage::Notifying,
      Self::Deleting(_) => PurgeStage::Deleting,
      Self::AwaitingConfirmation { .. } => PurgeStage::AwaitingConfirmation,
      Self::Recreating(_) => PurgeStage::Recreating,
      Self::ReassigningRoles { .. } => PurgeStage::ReassigningRoles,
      Self::Done(_) => return None,
    })
  }
}

/// Purges spaces of one run. Holds only borrowed, read-only state, so one
/// executor serves every space of every organization.
pub struct PurgeExecutor<'a> {
  client:   &'a ResourceClient,
  notifier: &'a Notifier,
  human:    &'a HumanUsers,
  settings: &'a PurgeSettings,
}

impl<'a> PurgeExecutor<'a> {
  pub fn new(
    client: &'a ResourceClient,
    notifier: &'a Notifier,
    human: &'a HumanUsers,
    settings: &'a PurgeSettings,
  ) -> Self {
    Self { client, notifier, human, settings }
  }

  /// Drive one space from gathering to done, or abort on the first failing
  /// step.
  pub async fn purge(
    &self,
    org: &Organization,
    details: &SpaceDetails,
  ) -> Result<PurgeOutcome, PurgeError> {
    let space = &details.space;
    let mut state = State::Gathering;

    loop {
      if let Some(stage) = state.stage() {
        debug!(org = %org.name, space = %space.name, %stage, "purge step");
      }

      state = match state {
        State::Gathering => {
          let gathered = self.gather(space).await?;
          info!(
            org = %org.name,
            space = %space.name,
            recipients = ?gathered.recipients,
            dry_run = self.settings.dry_run,
            "purging space",
          );
          if self.settings.dry_run {
            State::Done(PurgeOutcome::DryRun {
              recipients: gathered.recipients,
              members:    gathered.members,
            })
          } else {
            State::Notifying(gathered)
          }
        }

        State::Notifying(gathered) => {
          let notice = Notice::Purged {
            org,
            space,
            days: self.settings.purge_days,
          };
          self
            .notifier
            .send(&notice, &gathered.recipients)
            .await
            .map_err(|source| PurgeError::Notify {
              space: space.name.clone(),
              org: org.name.clone(),
              source,
            })?;
          State::Deleting(gathered)
        }

        State::Deleting(gathered) => {
          let job = self.delete(org, space).await?;
          State::AwaitingConfirmation { members: gathered.members, job }
        }

        State::AwaitingConfirmation { members, job } => {
          self.confirm(org, space, job).await?;
          if members.is_empty() {
            info!(
              org = %org.name,
              space = %space.name,
              "no developers or managers; space not recreated",
            );
            State::Done(PurgeOutcome::Deleted)
          } else {
            State::Recreating(members)
          }
        }

        State::Recreating(members) => {
          let (space, quota) = self.recreate(org, space).await?;
          State::ReassigningRoles { members, space, quota }
        }

        State::ReassigningRoles { members, space: recreated, quota } => {
          let roles = self.reassign(org, space, &recreated, &members).await?;
          State::Done(PurgeOutcome::Recreated {
            space_guid: recreated.guid,
            quota_guid: quota,
            roles,
          })
        }

        State::Done(outcome) => return Ok(outcome),
      };
    }
  }

  async fn gather(&self, space: &Space) -> Result<Gathered, PurgeError> {
    let filter = ListFilter::default().space(&space.guid);
    let (roles, users) = self
      .client
      .roles
      .list_with_users(&filter)
      .await
      .map_err(|source| PurgeError::ListRoles {
        space: space.name.clone(),
        source,
      })?;

    let recipients = list_recipients(self.human, &users).map_err(|source| {
      PurgeError::Recipients { space: space.name.clone(), source }
    })?;

    let members = list_space_devs_and_managers(self.human, &roles, &users);
    for unresolved in &members.unresolved {
      warn!(
        space = %space.name,
        user_guid = %unresolved.user_guid,
        role = %unresolved.kind,
        "could not find a username for user; skipping role",
      );
    }

    Ok(Gathered { recipients, members })
  }

  /// Delete the space. When that fails, delete its apps one by one so fewer
  /// resources are orphaned, then report the original failure.
  async fn delete(
    &self,
    org: &Organization,
    space: &Space,
  ) -> Result<Option<JobGuid>, PurgeError> {
    info!(org = %org.name, space = %space.name, "deleting space");
    match self.client.spaces.delete(&space.guid).await {
      Ok(job) => Ok(job),
      Err(source) => {
        warn!(
          org = %org.name,
          space = %space.name,
          error = %source,
          "space deletion failed; deleting its applications",
        );
        self.delete_space_apps(space).await;
        Err(PurgeError::Delete {
          space: space.name.clone(),
          org: org.name.clone(),
          source,
        })
      }
    }
  }

  async fn delete_space_apps(&self, space: &Space) {
    let filter = ListFilter::default().space(&space.guid);
    let apps = match self.client.applications.list_all(&filter).await {
      Ok(apps) => apps,
      Err(error) => {
        warn!(space = %space.name, %error, "could not list applications for cleanup");
        return;
      }
    };
    for app in apps {
      if let Err(error) = self.client.applications.delete(&app.guid).await {
        warn!(space = %space.name, app = %app.name, %error, "could not delete application");
      }
    }
  }

  async fn confirm(
    &self,
    org: &Organization,
    space: &Space,
    job: Option<JobGuid>,
  ) -> Result<(), PurgeError> {
    match job {
      Some(job) => {
        debug!(space = %space.name, %job, "waiting for delete job");
        self
          .client
          .jobs
          .poll_complete(&job, self.settings.job_timeout)
          .await
          .map_err(|source| PurgeError::Confirm {
            space: space.name.clone(),
            org: org.name.clone(),
            source,
          })?;
      }
      None => info!(
        space = %space.name,
        "no job GUID for deletion of the space, cannot verify deletion via job",
      ),
    }

    wait_until_space_is_fully_deleted(
      self.client.spaces.as_ref(),
      &org.guid,
      &space.name,
      self.settings.deletion_check,
    )
    .await
    .map_err(|err| match err {
      ConfirmError::MaximumAttemptsReached { attempts } => {
        PurgeError::MaximumAttemptsReached {
          space: space.name.clone(),
          org: org.name.clone(),
          attempts,
        }
      }
      ConfirmError::Lookup(source) => PurgeError::Confirm {
        space: space.name.clone(),
        org: org.name.clone(),
        source,
      },
    })
  }

  /// Create the space again under the same org, with the sandbox quota when
  /// one is configured and exists. Quota lookup or apply failures are logged
  /// and the space is returned without a quota.
  async fn recreate(
    &self,
    org: &Organization,
    space: &Space,
  ) -> Result<(Space, Option<String>), PurgeError> {
    let quota = match &self.settings.sandbox_quota_name {
      Some(name) => self.lookup_quota(org, name).await,
      None => None,
    };

    info!(org = %org.name, space = %space.name, "recreating space");
    let request = SpaceCreate {
      name:              space.name.clone(),
      organization_guid: org.guid.clone(),
    };
    let recreated = self.client.spaces.create(&request).await.map_err(
      |source| PurgeError::Recreate {
        space: space.name.clone(),
        org: org.name.clone(),
        source,
      },
    )?;

    let Some(quota) = quota else {
      return Ok((recreated, None));
    };
    match self
      .client
      .space_quotas
      .apply(&quota.guid, std::slice::from_ref(&recreated.guid))
      .await
    {
      Ok(_) => Ok((recreated, Some(quota.guid))),
      Err(error) => {
        warn!(
          org = %org.name,
          space = %space.name,
          quota = %quota.name,
          %error,
          "could not apply space quota; continuing without it",
        );
        Ok((recreated, None))
      }
    }
  }

  async fn lookup_quota(
    &self,
    org: &Organization,
    name: &str,
  ) -> Option<SpaceQuota> {
    match resolve_quota(self.client.space_quotas.as_ref(), &org.guid, name).await
    {
      Ok(Some(quota)) => Some(quota),
      Ok(None) => {
        info!(org = %org.name, quota = %name, "space quota not found; recreating without it");
        None
      }
      Err(error) => {
        warn!(org = %org.name, quota = %name, %error, "space quota lookup failed; recreating without it");
        None
      }
    }
  }

  /// Developers first, then managers, each in role order. Stops at the first
  /// failure.
  async fn reassign(
    &self,
    org: &Organization,
    original: &Space,
    recreated: &Space,
    members: &SpaceMembers,
  ) -> Result<usize, PurgeError> {
    let assignments = members
      .developers
      .iter()
      .map(|m| (m, RoleType::SpaceDeveloper))
      .chain(members.managers.iter().map(|m| (m, RoleType::SpaceManager)));

    let mut created = 0;
    for (member, kind) in assignments {
      debug!(space = %recreated.name, user = %member.username, role = %kind, "recreating space role");
      self
        .client
        .roles
        .create_space_role(&recreated.guid, &member.user_guid, kind)
        .await
        .map_err(|source| PurgeError::Reassign {
          space: original.name.clone(),
          org: org.name.clone(),
          source,
        })?;
      created += 1;
    }
    Ok(created)
  }
}
