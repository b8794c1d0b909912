//! Per-run snapshots of organizations, their resources, and human users.

use std::collections::HashSet;

use crate::{
  ApiError,
  client::{ListFilter, OrganizationsClient, ResourceClient},
  resource::{App, Organization, ServiceInstance, Space, User},
};

/// Everything inside one organization that the lifecycle policy looks at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgInventory {
  pub spaces:    Vec<Space>,
  pub apps:      Vec<App>,
  pub instances: Vec<ServiceInstance>,
}

/// Guids of users whose username is email-shaped, i.e. not service accounts.
/// Computed once per run and only ever read afterwards.
pub type HumanUsers = HashSet<String>;

/// Organizations whose name starts with `prefix`, in API order.
pub async fn list_sandbox_orgs(
  organizations: &dyn OrganizationsClient,
  prefix: &str,
) -> Result<Vec<Organization>, ApiError> {
  let orgs = organizations.list_all(&ListFilter::default()).await?;
  Ok(orgs.into_iter().filter(|org| org.name.starts_with(prefix)).collect())
}

/// Fetch apps, service instances and spaces scoped to `org`.
pub async fn list_org_resources(
  client: &ResourceClient,
  org: &Organization,
) -> Result<OrgInventory, ApiError> {
  let filter = ListFilter::default().organization(&org.guid);
  let apps = client.applications.list_all(&filter).await?;
  let instances = client.service_instances.list_all(&filter).await?;
  let spaces = client.spaces.list_all(&filter).await?;
  Ok(OrgInventory { spaces, apps, instances })
}

pub fn human_user_guids(users: &[User]) -> HumanUsers {
  users
    .iter()
    .filter(|user| user.is_human())
    .map(|user| user.guid.clone())
    .collect()
}
