//! Error type for `sandbox-cf`.

use reqwest::StatusCode;
use sandbox_core::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{method} {url} returned {status}: {body}")]
  Status {
    method: reqwest::Method,
    url:    String,
    status: StatusCode,
    body:   String,
  },

  #[error("token error: {0}")]
  Token(String),

  #[error("expected at most one result from {path}, got {count}")]
  MultipleResults { path: String, count: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for ApiError {
  fn from(err: Error) -> Self { ApiError::client(err) }
}
