//! Capability traits for the platform's resource API.
//!
//! Each resource type is its own narrow trait so a test double can replace one
//! capability without stubbing the whole platform. [`ResourceClient`] bundles
//! one implementation of each; `sandbox-cf` provides the HTTP-backed one.
//!
//! The traits are object-safe (`async_trait`) because the bundle holds them as
//! `Arc<dyn …>` and mixes implementations freely.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
  ApiError,
  resource::{
    App, Organization, Role, RoleType, ServiceInstance, Space, SpaceCreate,
    SpaceQuota, User,
  },
};

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Query filter shared by every list and single-lookup call. Empty vectors
/// mean "no constraint".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
  pub guids:              Vec<String>,
  pub names:              Vec<String>,
  pub organization_guids: Vec<String>,
  pub space_guids:        Vec<String>,
}

impl ListFilter {
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.names.push(name.into());
    self
  }

  pub fn organization(mut self, guid: impl Into<String>) -> Self {
    self.organization_guids.push(guid.into());
    self
  }

  pub fn space(mut self, guid: impl Into<String>) -> Self {
    self.space_guids.push(guid.into());
    self
  }

  /// Query-string pairs in the v3 API's comma-separated form.
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    [
      ("guids", &self.guids),
      ("names", &self.names),
      ("organization_guids", &self.organization_guids),
      ("space_guids", &self.space_guids),
    ]
    .into_iter()
    .filter(|(_, values)| !values.is_empty())
    .map(|(key, values)| (key, values.join(",")))
    .collect()
  }
}

/// Guid of an asynchronous platform job, returned by deletes.
pub type JobGuid = String;

// ─── Capabilities ────────────────────────────────────────────────────────────

#[async_trait]
pub trait OrganizationsClient: Send + Sync {
  async fn list_all(
    &self,
    filter: &ListFilter,
  ) -> Result<Vec<Organization>, ApiError>;
}

#[async_trait]
pub trait SpacesClient: Send + Sync {
  async fn list_all(&self, filter: &ListFilter) -> Result<Vec<Space>, ApiError>;

  /// Every user holding any role in the space.
  async fn list_users(&self, space_guid: &str) -> Result<Vec<User>, ApiError>;

  async fn create(&self, request: &SpaceCreate) -> Result<Space, ApiError>;

  /// Delete a space. Returns the deletion job, if the platform exposes one.
  async fn delete(&self, guid: &str) -> Result<Option<JobGuid>, ApiError>;

  /// The single space matching `filter`, or `None` when there is none.
  async fn single(&self, filter: &ListFilter)
  -> Result<Option<Space>, ApiError>;
}

#[async_trait]
pub trait ApplicationsClient: Send + Sync {
  async fn list_all(&self, filter: &ListFilter) -> Result<Vec<App>, ApiError>;

  async fn delete(&self, guid: &str) -> Result<Option<JobGuid>, ApiError>;
}

#[async_trait]
pub trait ServiceInstancesClient: Send + Sync {
  async fn list_all(
    &self,
    filter: &ListFilter,
  ) -> Result<Vec<ServiceInstance>, ApiError>;
}

#[async_trait]
pub trait RolesClient: Send + Sync {
  async fn create_space_role(
    &self,
    space_guid: &str,
    user_guid: &str,
    kind: RoleType,
  ) -> Result<Role, ApiError>;

  /// Roles matching `filter`, together with the users they reference.
  async fn list_with_users(
    &self,
    filter: &ListFilter,
  ) -> Result<(Vec<Role>, Vec<User>), ApiError>;
}

#[async_trait]
pub trait SpaceQuotasClient: Send + Sync {
  /// The single quota matching `filter`, or `None` when there is none.
  async fn single(
    &self,
    filter: &ListFilter,
  ) -> Result<Option<SpaceQuota>, ApiError>;

  /// Apply a quota to spaces; returns the guids the quota now covers.
  async fn apply(
    &self,
    quota_guid: &str,
    space_guids: &[String],
  ) -> Result<Vec<String>, ApiError>;
}

#[async_trait]
pub trait UsersClient: Send + Sync {
  async fn list_all(&self) -> Result<Vec<User>, ApiError>;
}

#[async_trait]
pub trait JobsClient: Send + Sync {
  /// Wait until the job completes, fails, or `timeout` elapses.
  async fn poll_complete(
    &self,
    job_guid: &str,
    timeout: Duration,
  ) -> Result<(), ApiError>;
}

// ─── Bundle ──────────────────────────────────────────────────────────────────

/// One implementation of every capability.
///
/// Cheap to clone: every field is an `Arc`.
#[derive(Clone)]
pub struct ResourceClient {
  pub applications:      Arc<dyn ApplicationsClient>,
  pub organizations:     Arc<dyn OrganizationsClient>,
  pub roles:             Arc<dyn RolesClient>,
  pub service_instances: Arc<dyn ServiceInstancesClient>,
  pub spaces:            Arc<dyn SpacesClient>,
  pub space_quotas:      Arc<dyn SpaceQuotasClient>,
  pub users:             Arc<dyn UsersClient>,
  pub jobs:              Arc<dyn JobsClient>,
}

impl ResourceClient {
  /// Use a single type that implements every capability for all of them.
  pub fn uniform<C>(client: Arc<C>) -> Self
  where
    C: ApplicationsClient
      + OrganizationsClient
      + RolesClient
      + ServiceInstancesClient
      + SpacesClient
      + SpaceQuotasClient
      + UsersClient
      + JobsClient
      + 'static,
  {
    Self {
      applications:      client.clone(),
      organizations:     client.clone(),
      roles:             client.clone(),
      service_instances: client.clone(),
      spaces:            client.clone(),
      space_quotas:      client.clone(),
      users:             client.clone(),
      jobs:              client,
    }
  }
}
