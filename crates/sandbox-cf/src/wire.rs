//! Request and response envelopes of the v3 API.

use sandbox_core::resource::{Relationship, RoleType, ToOne, User};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct Link {
  pub href: String,
}

// ─── Root and token ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Root {
  pub links: RootLinks,
}

#[derive(Debug, Default, Deserialize)]
pub struct RootLinks {
  #[serde(default)]
  pub login: Option<Link>,
  #[serde(default)]
  pub uaa:   Option<Link>,
}

#[derive(Debug, Deserialize)]
pub struct TokenResponse {
  pub access_token: String,
  #[serde(default)]
  pub expires_in:   u64,
}

// ─── Collections ─────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
  #[serde(default)]
  pub next: Option<Link>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Included {
  #[serde(default)]
  pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub struct Page<T> {
  pub resources:  Vec<T>,
  #[serde(default)]
  pub pagination: Pagination,
  #[serde(default)]
  pub included:   Included,
}

/// `{"data": [{"guid": …}, …]}`, used by to-many relationship endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ToMany {
  pub data: Vec<Relationship>,
}

impl ToMany {
  pub fn guids(self) -> Vec<String> {
    self.data.into_iter().map(|r| r.guid).collect()
  }
}

impl FromIterator<String> for ToMany {
  fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
    Self { data: iter.into_iter().map(|guid| Relationship { guid }).collect() }
  }
}

// ─── Create bodies ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SpaceRequest<'a> {
  pub name:          &'a str,
  pub relationships: SpaceRequestRelationships,
}

#[derive(Debug, Serialize)]
pub struct SpaceRequestRelationships {
  pub organization: ToOne,
}

#[derive(Debug, Serialize)]
pub struct RoleRequest {
  #[serde(rename = "type")]
  pub kind:          RoleType,
  pub relationships: RoleRequestRelationships,
}

#[derive(Debug, Serialize)]
pub struct RoleRequestRelationships {
  pub user:  ToOne,
  pub space: ToOne,
}

// ─── Jobs ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
  Processing,
  Polling,
  Complete,
  Failed,
  #[serde(other)]
  Unknown,
}

#[derive(Debug, Deserialize)]
pub struct JobErrorDetail {
  #[serde(default)]
  pub title:  String,
  #[serde(default)]
  pub detail: String,
}

#[derive(Debug, Deserialize)]
pub struct Job {
  pub state:  JobState,
  #[serde(default)]
  pub errors: Vec<JobErrorDetail>,
}

impl Job {
  /// The job's error details joined into one line.
  pub fn error_detail(&self) -> String {
    if self.errors.is_empty() {
      return "no error details".to_string();
    }
    self
      .errors
      .iter()
      .map(|e| format!("{}: {}", e.title, e.detail))
      .collect::<Vec<_>>()
      .join("; ")
  }
}
