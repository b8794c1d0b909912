//! In-memory test doubles for the capability traits, the mailer, and the
//! renderer, plus small builders for resources.

use std::{
  collections::{HashMap, HashSet},
  sync::{Mutex, MutexGuard},
  time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
  ApiError, BoxError,
  client::{
    ApplicationsClient, JobGuid, JobsClient, ListFilter, OrganizationsClient,
    RolesClient, ServiceInstancesClient, SpaceQuotasClient, SpacesClient,
    UsersClient,
  },
  notify::{Mailer, Notice, NoticeRenderer},
  resource::{
    App, Organization, QuotaRelationships, ResourceRelationships, Role,
    RoleRelationships, RoleType, ServiceInstance, Space, SpaceCreate,
    SpaceQuota, SpaceRelationships, ToOne, User,
  },
};

// ─── Builders ────────────────────────────────────────────────────────────────

pub fn org(guid: &str, name: &str) -> Organization {
  Organization { guid: guid.into(), name: name.into() }
}

pub fn space(guid: &str, name: &str, org_guid: &str) -> Space {
  Space {
    guid:          guid.into(),
    name:          name.into(),
    relationships: SpaceRelationships {
      organization: ToOne::to(org_guid),
      quota:        ToOne::default(),
    },
  }
}

pub fn app(guid: &str, space_guid: &str, created_at: DateTime<Utc>) -> App {
  App {
    guid: guid.into(),
    name: format!("{guid}-name"),
    created_at,
    relationships: ResourceRelationships { space: ToOne::to(space_guid) },
  }
}

pub fn instance(
  guid: &str,
  space_guid: &str,
  created_at: DateTime<Utc>,
) -> ServiceInstance {
  ServiceInstance {
    guid: guid.into(),
    name: format!("{guid}-name"),
    created_at,
    relationships: ResourceRelationships { space: ToOne::to(space_guid) },
  }
}

pub fn user(guid: &str, username: &str) -> User {
  User { guid: guid.into(), username: Some(username.into()) }
}

pub fn role(kind: RoleType, user_guid: &str, space_guid: &str) -> Role {
  Role {
    guid: format!("role-{user_guid}-{kind}"),
    kind,
    relationships: RoleRelationships {
      user:  ToOne::to(user_guid),
      space: ToOne::to(space_guid),
    },
  }
}

pub fn quota(guid: &str, name: &str, org_guid: &str) -> SpaceQuota {
  SpaceQuota {
    guid:          guid.into(),
    name:          name.into(),
    relationships: QuotaRelationships { organization: ToOne::to(org_guid) },
  }
}

fn failure(what: &str) -> ApiError {
  ApiError::Client(format!("mock failure: {what}").into())
}

// ─── Platform ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedRole {
  pub space_guid: String,
  pub user_guid:  String,
  pub kind:       RoleType,
}

/// Canned platform contents, failure switches, and a record of every
/// mutating call.
#[derive(Debug, Default)]
pub struct MockState {
  pub orgs:        Vec<Organization>,
  pub spaces:      Vec<Space>,
  pub apps:        Vec<App>,
  pub instances:   Vec<ServiceInstance>,
  pub users:       Vec<User>,
  pub space_users: HashMap<String, Vec<User>>,
  pub roles:       Vec<Role>,
  /// Users returned alongside roles by `list_with_users`.
  pub role_users:  Vec<User>,
  pub quotas:      Vec<SpaceQuota>,
  pub delete_job:  Option<JobGuid>,

  /// How many `single` lookups still see the space after it was deleted.
  pub lingering_lookups: usize,

  pub fail_list_orgs:       bool,
  pub fail_list_users:      bool,
  pub fail_list_instances:  bool,
  /// Org guids whose service-instance listing fails.
  pub fail_instances_in:    HashSet<String>,
  pub fail_list_roles:      bool,
  pub fail_space_users:     HashSet<String>,
  pub fail_space_delete:    HashSet<String>,
  pub fail_app_delete:      HashSet<String>,
  pub fail_single_at:       Option<usize>,
  pub fail_create_space:    bool,
  pub fail_quota_lookup:    bool,
  pub fail_apply_quota:     bool,
  pub fail_role_for:        HashSet<String>,
  pub fail_job:             bool,

  pub single_calls:     usize,
  pub single_filters:   Vec<ListFilter>,
  pub quota_filters:    Vec<ListFilter>,
  pub deleted_spaces:   Vec<String>,
  pub deleted_apps:     Vec<String>,
  pub created_spaces:   Vec<SpaceCreate>,
  pub applied_quotas:   Vec<(String, Vec<String>)>,
  pub created_roles:    Vec<CreatedRole>,
  pub polled_jobs:      Vec<String>,
  pub mutating_calls:   usize,
}

impl MockState {
  fn org_of(&self, space_guid: Option<&str>) -> Option<&str> {
    let space_guid = space_guid?;
    self
      .spaces
      .iter()
      .find(|s| s.guid == space_guid)
      .and_then(|s| s.relationships.organization.guid())
  }

  fn in_scope(&self, filter: &ListFilter, space_guid: Option<&str>) -> bool {
    let space_ok = filter.space_guids.is_empty()
      || space_guid.is_some_and(|g| filter.space_guids.iter().any(|f| f == g));
    let org_ok = filter.organization_guids.is_empty()
      || self
        .org_of(space_guid)
        .is_some_and(|g| filter.organization_guids.iter().any(|f| f == g));
    space_ok && org_ok
  }
}

/// One struct implementing every capability, so tests can either bundle it
/// with [`crate::client::ResourceClient::uniform`] or slot it into a single
/// field.
#[derive(Debug, Default)]
pub struct MockPlatform {
  state: Mutex<MockState>,
}

impl MockPlatform {
  pub fn state(&self) -> MutexGuard<'_, MockState> {
    self.state.lock().unwrap()
  }
}

#[async_trait]
impl OrganizationsClient for MockPlatform {
  async fn list_all(
    &self,
    _filter: &ListFilter,
  ) -> Result<Vec<Organization>, ApiError> {
    let state = self.state();
    if state.fail_list_orgs {
      return Err(failure("list organizations"));
    }
    Ok(state.orgs.clone())
  }
}

#[async_trait]
impl SpacesClient for MockPlatform {
  async fn list_all(&self, filter: &ListFilter) -> Result<Vec<Space>, ApiError> {
    let state = self.state();
    Ok(
      state
        .spaces
        .iter()
        .filter(|s| {
          filter.organization_guids.is_empty()
            || s
              .relationships
              .organization
              .guid()
              .is_some_and(|g| filter.organization_guids.iter().any(|f| f == g))
        })
        .cloned()
        .collect(),
    )
  }

  async fn list_users(&self, space_guid: &str) -> Result<Vec<User>, ApiError> {
    let state = self.state();
    if state.fail_space_users.contains(space_guid) {
      return Err(failure("list space users"));
    }
    Ok(state.space_users.get(space_guid).cloned().unwrap_or_default())
  }

  async fn create(&self, request: &SpaceCreate) -> Result<Space, ApiError> {
    let mut state = self.state();
    state.mutating_calls += 1;
    state.created_spaces.push(request.clone());
    if state.fail_create_space {
      return Err(failure("create space"));
    }
    Ok(space(
      &format!("new-{}-guid", request.name),
      &request.name,
      &request.organization_guid,
    ))
  }

  async fn delete(&self, guid: &str) -> Result<Option<JobGuid>, ApiError> {
    let mut state = self.state();
    state.mutating_calls += 1;
    state.deleted_spaces.push(guid.to_string());
    if state.fail_space_delete.contains(guid) {
      return Err(failure("delete space"));
    }
    Ok(state.delete_job.clone())
  }

  async fn single(
    &self,
    filter: &ListFilter,
  ) -> Result<Option<Space>, ApiError> {
    let mut state = self.state();
    state.single_calls += 1;
    state.single_filters.push(filter.clone());
    if state.fail_single_at == Some(state.single_calls) {
      return Err(failure("single space"));
    }
    if state.single_calls <= state.lingering_lookups {
      let name = filter.names.first().cloned().unwrap_or_default();
      let org = filter.organization_guids.first().cloned().unwrap_or_default();
      return Ok(Some(space("lingering-guid", &name, &org)));
    }
    Ok(None)
  }
}

#[async_trait]
impl ApplicationsClient for MockPlatform {
  async fn list_all(&self, filter: &ListFilter) -> Result<Vec<App>, ApiError> {
    let state = self.state();
    Ok(
      state
        .apps
        .iter()
        .filter(|a| state.in_scope(filter, a.relationships.space.guid()))
        .cloned()
        .collect(),
    )
  }

  async fn delete(&self, guid: &str) -> Result<Option<JobGuid>, ApiError> {
    let mut state = self.state();
    state.mutating_calls += 1;
    state.deleted_apps.push(guid.to_string());
    if state.fail_app_delete.contains(guid) {
      return Err(failure("delete app"));
    }
    Ok(None)
  }
}

#[async_trait]
impl ServiceInstancesClient for MockPlatform {
  async fn list_all(
    &self,
    filter: &ListFilter,
  ) -> Result<Vec<ServiceInstance>, ApiError> {
    let state = self.state();
    let org_failing = filter
      .organization_guids
      .iter()
      .any(|guid| state.fail_instances_in.contains(guid));
    if state.fail_list_instances || org_failing {
      return Err(failure("list service instances"));
    }
    Ok(
      state
        .instances
        .iter()
        .filter(|i| state.in_scope(filter, i.relationships.space.guid()))
        .cloned()
        .collect(),
    )
  }
}

#[async_trait]
impl RolesClient for MockPlatform {
  async fn create_space_role(
    &self,
    space_guid: &str,
    user_guid: &str,
    kind: RoleType,
  ) -> Result<Role, ApiError> {
    let mut state = self.state();
    state.mutating_calls += 1;
    state.created_roles.push(CreatedRole {
      space_guid: space_guid.into(),
      user_guid: user_guid.into(),
      kind,
    });
    if state.fail_role_for.contains(user_guid) {
      return Err(failure("create role"));
    }
    Ok(role(kind, user_guid, space_guid))
  }

  async fn list_with_users(
    &self,
    filter: &ListFilter,
  ) -> Result<(Vec<Role>, Vec<User>), ApiError> {
    let state = self.state();
    if state.fail_list_roles {
      return Err(failure("list roles"));
    }
    let roles = state
      .roles
      .iter()
      .filter(|r| state.in_scope(filter, r.relationships.space.guid()))
      .cloned()
      .collect();
    Ok((roles, state.role_users.clone()))
  }
}

#[async_trait]
impl SpaceQuotasClient for MockPlatform {
  async fn single(
    &self,
    filter: &ListFilter,
  ) -> Result<Option<SpaceQuota>, ApiError> {
    let mut state = self.state();
    state.quota_filters.push(filter.clone());
    if state.fail_quota_lookup {
      return Err(failure("space quota lookup"));
    }
    Ok(
      state
        .quotas
        .iter()
        .find(|q| {
          filter.names.iter().all(|n| *n == q.name)
            && filter.organization_guids.iter().all(|o| {
              q.relationships.organization.guid() == Some(o.as_str())
            })
        })
        .cloned(),
    )
  }

  async fn apply(
    &self,
    quota_guid: &str,
    space_guids: &[String],
  ) -> Result<Vec<String>, ApiError> {
    let mut state = self.state();
    state.mutating_calls += 1;
    state
      .applied_quotas
      .push((quota_guid.to_string(), space_guids.to_vec()));
    if state.fail_apply_quota {
      return Err(failure("apply quota"));
    }
    Ok(space_guids.to_vec())
  }
}

#[async_trait]
impl UsersClient for MockPlatform {
  async fn list_all(&self) -> Result<Vec<User>, ApiError> {
    let state = self.state();
    if state.fail_list_users {
      return Err(failure("list users"));
    }
    Ok(state.users.clone())
  }
}

#[async_trait]
impl JobsClient for MockPlatform {
  async fn poll_complete(
    &self,
    job_guid: &str,
    _timeout: Duration,
  ) -> Result<(), ApiError> {
    let mut state = self.state();
    state.polled_jobs.push(job_guid.to_string());
    if state.fail_job {
      return Err(ApiError::JobFailed {
        guid:   job_guid.to_string(),
        detail: "space deletion failed".into(),
      });
    }
    Ok(())
  }
}

// ─── Mail ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
  pub sender:     String,
  pub subject:    String,
  pub body:       String,
  pub recipients: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RecordingMailer {
  pub sent: Mutex<Vec<SentMail>>,
  pub fail: bool,
}

impl RecordingMailer {
  pub fn failing() -> Self { Self { fail: true, ..Self::default() } }

  pub fn sent(&self) -> Vec<SentMail> { self.sent.lock().unwrap().clone() }
}

#[async_trait]
impl Mailer for RecordingMailer {
  async fn send(
    &self,
    sender: &str,
    subject: &str,
    body: &str,
    recipients: &[String],
  ) -> Result<(), BoxError> {
    if self.fail {
      return Err("smtp unavailable".into());
    }
    self.sent.lock().unwrap().push(SentMail {
      sender:     sender.into(),
      subject:    subject.into(),
      body:       body.into(),
      recipients: recipients.to_vec(),
    });
    Ok(())
  }
}

/// Renders notices as one-line plain text.
#[derive(Debug, Default)]
pub struct PlainRenderer;

impl NoticeRenderer for PlainRenderer {
  fn render(&self, notice: &Notice<'_>) -> Result<String, BoxError> {
    Ok(match notice {
      Notice::Expiring { org, space, purge_date, days } => format!(
        "{}/{} will be purged on {} after {days} days",
        org.name,
        space.name,
        purge_date.format("%Y-%m-%d"),
      ),
      Notice::Purged { org, space, days } => {
        format!("{}/{} was purged after {days} days", org.name, space.name)
      }
    })
  }
}
