//! Platform resources as returned by the v3 API.
//!
//! Only the fields the lifecycle logic reads are modelled; unknown fields are
//! ignored on deserialisation. Everything here is a read-only snapshot taken
//! during the current run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Relationships ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
  pub guid: String,
}

/// A to-one relationship; `data` is `null` when the link is unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToOne {
  #[serde(default)]
  pub data: Option<Relationship>,
}

impl ToOne {
  pub fn to(guid: impl Into<String>) -> Self {
    Self { data: Some(Relationship { guid: guid.into() }) }
  }

  pub fn guid(&self) -> Option<&str> {
    self.data.as_ref().map(|d| d.guid.as_str())
  }
}

// ─── Organizations and spaces ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
  pub guid: String,
  pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceRelationships {
  pub organization: ToOne,
  #[serde(default)]
  pub quota:        ToOne,
}

/// The unit of lifecycle classification and purge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
  pub guid:          String,
  pub name:          String,
  #[serde(default)]
  pub relationships: SpaceRelationships,
}

/// Input to [`crate::client::SpacesClient::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceCreate {
  pub name:              String,
  pub organization_guid: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaRelationships {
  #[serde(default)]
  pub organization: ToOne,
}

/// A named resource-limit profile that can be applied to spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpaceQuota {
  pub guid:          String,
  pub name:          String,
  #[serde(default)]
  pub relationships: QuotaRelationships,
}

// ─── Space-scoped resources ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRelationships {
  pub space: ToOne,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
  pub guid:          String,
  pub name:          String,
  pub created_at:    DateTime<Utc>,
  pub relationships: ResourceRelationships,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInstance {
  pub guid:          String,
  pub name:          String,
  pub created_at:    DateTime<Utc>,
  pub relationships: ResourceRelationships,
}

/// Anything that lives in a space and contributes to the space's age.
pub trait SpaceResource {
  fn space_guid(&self) -> Option<&str>;
  fn created_at(&self) -> DateTime<Utc>;
}

impl SpaceResource for App {
  fn space_guid(&self) -> Option<&str> { self.relationships.space.guid() }

  fn created_at(&self) -> DateTime<Utc> { self.created_at }
}

impl SpaceResource for ServiceInstance {
  fn space_guid(&self) -> Option<&str> { self.relationships.space.guid() }

  fn created_at(&self) -> DateTime<Utc> { self.created_at }
}

// ─── Users and roles ─────────────────────────────────────────────────────────

/// A platform account. Human accounts have an email address as username;
/// service accounts have anything else (or nothing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub guid:     String,
  #[serde(default)]
  pub username: Option<String>,
}

impl User {
  pub fn username(&self) -> &str { self.username.as_deref().unwrap_or("") }

  pub fn is_human(&self) -> bool { self.username().contains('@') }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
  SpaceDeveloper,
  SpaceManager,
  SpaceAuditor,
  SpaceSupporter,
  OrganizationUser,
  OrganizationAuditor,
  OrganizationManager,
  OrganizationBillingManager,
  #[serde(other)]
  Other,
}

impl RoleType {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::SpaceDeveloper => "space_developer",
      Self::SpaceManager => "space_manager",
      Self::SpaceAuditor => "space_auditor",
      Self::SpaceSupporter => "space_supporter",
      Self::OrganizationUser => "organization_user",
      Self::OrganizationAuditor => "organization_auditor",
      Self::OrganizationManager => "organization_manager",
      Self::OrganizationBillingManager => "organization_billing_manager",
      Self::Other => "other",
    }
  }
}

impl fmt::Display for RoleType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRelationships {
  pub user:  ToOne,
  #[serde(default)]
  pub space: ToOne,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
  pub guid:          String,
  #[serde(rename = "type")]
  pub kind:          RoleType,
  pub relationships: RoleRelationships,
}

impl Role {
  pub fn user_guid(&self) -> Option<&str> { self.relationships.user.guid() }
}
