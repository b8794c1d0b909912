//! HTTP client for the v3 resource API.

use std::{
  collections::HashSet,
  time::{Duration, Instant},
};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, header::LOCATION};
use sandbox_core::{
  ApiError,
  client::{
    ApplicationsClient, JobGuid, JobsClient, ListFilter, OrganizationsClient,
    RolesClient, ServiceInstancesClient, SpaceQuotasClient, SpacesClient,
    UsersClient,
  },
  resource::{
    App, Organization, Role, RoleType, ServiceInstance, Space, SpaceCreate,
    SpaceQuota, ToOne, User,
  },
};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
  error::{Error, Result},
  wire::{
    Job, JobState, Page, RoleRequest, RoleRequestRelationships, Root,
    SpaceRequest, SpaceRequestRelationships, ToMany, TokenResponse,
  },
};

/// Tokens are refreshed this long before the server says they expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Connection settings for the platform API.
#[derive(Debug, Clone)]
pub struct CfConfig {
  pub api_address:       String,
  pub client_id:         String,
  pub client_secret:     String,
  /// Delay between job status requests.
  pub job_poll_interval: Duration,
}

impl CfConfig {
  pub fn new(
    api_address: impl Into<String>,
    client_id: impl Into<String>,
    client_secret: impl Into<String>,
  ) -> Self {
    Self {
      api_address:       api_address.into(),
      client_id:         client_id.into(),
      client_secret:     client_secret.into(),
      job_poll_interval: Duration::from_secs(2),
    }
  }
}

#[derive(Debug)]
struct CachedToken {
  value:      String,
  refresh_at: Instant,
}

/// Implements every capability trait against one API endpoint.
pub struct CfClient {
  http:   Client,
  config: CfConfig,
  token:  Mutex<Option<CachedToken>>,
}

impl CfClient {
  pub fn new(config: CfConfig) -> Result<Self> {
    let http = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { http, config, token: Mutex::new(None) })
  }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.api_address.trim_end_matches('/'), path)
  }

  // ── Authentication ────────────────────────────────────────────────────────

  async fn token(&self) -> Result<String> {
    let mut cached = self.token.lock().await;
    if let Some(token) = cached.as_ref()
      && Instant::now() < token.refresh_at
    {
      return Ok(token.value.clone());
    }

    let token = self.fetch_token().await?;
    let value = token.access_token.clone();
    let lifetime = Duration::from_secs(token.expires_in);
    *cached = Some(CachedToken {
      value:      token.access_token,
      refresh_at: Instant::now() + lifetime.saturating_sub(TOKEN_EXPIRY_MARGIN),
    });
    Ok(value)
  }

  /// `GET /` for the login link, then a client-credentials grant.
  async fn fetch_token(&self) -> Result<TokenResponse> {
    let root_url = self.url("/");
    let resp = self.http.get(&root_url).send().await?;
    let root: Root = check(Method::GET, resp).await?.json().await?;

    let login = root
      .links
      .login
      .or(root.links.uaa)
      .ok_or_else(|| Error::Token(format!("no login link at {root_url}")))?;

    let token_url = format!("{}/oauth/token", login.href.trim_end_matches('/'));
    debug!(url = %token_url, "requesting token");
    let resp = self
      .http
      .post(&token_url)
      .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
      .form(&[("grant_type", "client_credentials")])
      .send()
      .await?;
    Ok(check(Method::POST, resp).await?.json().await?)
  }

  // ── Requests ──────────────────────────────────────────────────────────────

  async fn send(
    &self,
    method: Method,
    url: &str,
    build: impl FnOnce(RequestBuilder) -> RequestBuilder + Send,
  ) -> Result<Response> {
    let token = self.token().await?;
    debug!(%method, url, "api request");
    let resp = build(self.http.request(method.clone(), url))
      .bearer_auth(token)
      .send()
      .await?;
    check(method, resp).await
  }

  async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
    Ok(self.send(Method::GET, url, |r| r).await?.json().await?)
  }

  async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
  where
    B: serde::Serialize + Sync,
    T: DeserializeOwned,
  {
    let url = self.url(path);
    Ok(self.send(Method::POST, &url, |r| r.json(body)).await?.json().await?)
  }

  /// Every page of a collection, plus any included users.
  async fn list_pages<T>(
    &self,
    path: &str,
    query: Vec<(&'static str, String)>,
  ) -> Result<(Vec<T>, Vec<User>)>
  where
    T: DeserializeOwned + Send,
  {
    let first = self.url(path);
    let mut page: Page<T> =
      self.send(Method::GET, &first, |r| r.query(&query)).await?.json().await?;

    let mut resources = Vec::new();
    let mut users = Vec::new();
    let mut seen = HashSet::new();
    loop {
      resources.extend(page.resources);
      users.extend(
        page
          .included
          .users
          .into_iter()
          .filter(|u| seen.insert(u.guid.clone())),
      );
      match page.pagination.next {
        Some(next) => page = self.get_json(&next.href).await?,
        None => break,
      }
    }
    Ok((resources, users))
  }

  async fn list<T>(&self, path: &str, filter: &ListFilter) -> Result<Vec<T>>
  where
    T: DeserializeOwned + Send,
  {
    Ok(self.list_pages(path, filter.query_pairs()).await?.0)
  }

  async fn find_one<T>(&self, path: &str, filter: &ListFilter) -> Result<Option<T>>
  where
    T: DeserializeOwned + Send,
  {
    let mut found: Vec<T> = self.list(path, filter).await?;
    match found.len() {
      0 | 1 => Ok(found.pop()),
      count => Err(Error::MultipleResults { path: path.to_string(), count }),
    }
  }

  async fn delete_resource(&self, path: &str) -> Result<Option<JobGuid>> {
    let url = self.url(path);
    let resp = self.send(Method::DELETE, &url, |r| r).await?;
    Ok(job_guid(&resp))
  }

  async fn wait_for_job(&self, guid: &str) -> Result<(), ApiError> {
    let url = self.url(&format!("/v3/jobs/{guid}"));
    loop {
      let job: Job = self.get_json(&url).await?;
      match job.state {
        JobState::Complete => return Ok(()),
        JobState::Failed => {
          return Err(ApiError::JobFailed {
            guid:   guid.to_string(),
            detail: job.error_detail(),
          });
        }
        state => debug!(job = guid, ?state, "job still running"),
      }
      tokio::time::sleep(self.config.job_poll_interval).await;
    }
  }
}

async fn check(method: Method, resp: Response) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let url = resp.url().to_string();
  let body = resp.text().await.unwrap_or_default();
  Err(Error::Status { method, url, status, body })
}

/// The last path segment of the `Location` header, e.g. `/v3/jobs/<guid>`.
fn job_guid(resp: &Response) -> Option<JobGuid> {
  let location = resp.headers().get(LOCATION)?.to_str().ok()?;
  location
    .trim_end_matches('/')
    .rsplit('/')
    .next()
    .filter(|guid| !guid.is_empty())
    .map(str::to_string)
}

// ─── Capabilities ────────────────────────────────────────────────────────────

#[async_trait]
impl OrganizationsClient for CfClient {
  async fn list_all(
    &self,
    filter: &ListFilter,
  ) -> Result<Vec<Organization>, ApiError> {
    Ok(self.list("/v3/organizations", filter).await?)
  }
}

#[async_trait]
impl SpacesClient for CfClient {
  async fn list_all(&self, filter: &ListFilter) -> Result<Vec<Space>, ApiError> {
    Ok(self.list("/v3/spaces", filter).await?)
  }

  async fn list_users(&self, space_guid: &str) -> Result<Vec<User>, ApiError> {
    let path = format!("/v3/spaces/{space_guid}/users");
    Ok(self.list(&path, &ListFilter::default()).await?)
  }

  async fn create(&self, request: &SpaceCreate) -> Result<Space, ApiError> {
    let body = SpaceRequest {
      name:          &request.name,
      relationships: SpaceRequestRelationships {
        organization: ToOne::to(&request.organization_guid),
      },
    };
    Ok(self.post_json("/v3/spaces", &body).await?)
  }

  async fn delete(&self, guid: &str) -> Result<Option<JobGuid>, ApiError> {
    Ok(self.delete_resource(&format!("/v3/spaces/{guid}")).await?)
  }

  async fn single(
    &self,
    filter: &ListFilter,
  ) -> Result<Option<Space>, ApiError> {
    Ok(self.find_one("/v3/spaces", filter).await?)
  }
}

#[async_trait]
impl ApplicationsClient for CfClient {
  async fn list_all(&self, filter: &ListFilter) -> Result<Vec<App>, ApiError> {
    Ok(self.list("/v3/apps", filter).await?)
  }

  async fn delete(&self, guid: &str) -> Result<Option<JobGuid>, ApiError> {
    Ok(self.delete_resource(&format!("/v3/apps/{guid}")).await?)
  }
}

#[async_trait]
impl ServiceInstancesClient for CfClient {
  async fn list_all(
    &self,
    filter: &ListFilter,
  ) -> Result<Vec<ServiceInstance>, ApiError> {
    Ok(self.list("/v3/service_instances", filter).await?)
  }
}

#[async_trait]
impl RolesClient for CfClient {
  async fn create_space_role(
    &self,
    space_guid: &str,
    user_guid: &str,
    kind: RoleType,
  ) -> Result<Role, ApiError> {
    let body = RoleRequest {
      kind,
      relationships: RoleRequestRelationships {
        user:  ToOne::to(user_guid),
        space: ToOne::to(space_guid),
      },
    };
    Ok(self.post_json("/v3/roles", &body).await?)
  }

  async fn list_with_users(
    &self,
    filter: &ListFilter,
  ) -> Result<(Vec<Role>, Vec<User>), ApiError> {
    let mut query = filter.query_pairs();
    query.push(("include", "user".to_string()));
    Ok(self.list_pages("/v3/roles", query).await?)
  }
}

#[async_trait]
impl SpaceQuotasClient for CfClient {
  async fn single(
    &self,
    filter: &ListFilter,
  ) -> Result<Option<SpaceQuota>, ApiError> {
    Ok(self.find_one("/v3/space_quotas", filter).await?)
  }

  async fn apply(
    &self,
    quota_guid: &str,
    space_guids: &[String],
  ) -> Result<Vec<String>, ApiError> {
    let path = format!("/v3/space_quotas/{quota_guid}/relationships/spaces");
    let body: ToMany = space_guids.iter().cloned().collect();
    let applied: ToMany = self.post_json(&path, &body).await?;
    Ok(applied.guids())
  }
}

#[async_trait]
impl UsersClient for CfClient {
  async fn list_all(&self) -> Result<Vec<User>, ApiError> {
    Ok(self.list("/v3/users", &ListFilter::default()).await?)
  }
}

#[async_trait]
impl JobsClient for CfClient {
  async fn poll_complete(
    &self,
    job_guid: &str,
    timeout: Duration,
  ) -> Result<(), ApiError> {
    tokio::time::timeout(timeout, self.wait_for_job(job_guid))
      .await
      .unwrap_or_else(|_| {
        Err(ApiError::JobTimeout { guid: job_guid.to_string(), timeout })
      })
  }
}
