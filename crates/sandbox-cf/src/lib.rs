//! v3 REST backend for the `sandbox-core` capability traits.
//!
//! [`CfClient`] authenticates with client credentials against the login
//! server advertised by the API root, caches the bearer token, and follows
//! pagination links so every `list_all` returns the complete collection.

mod client;
mod wire;

pub mod error;

pub use client::{CfClient, CfConfig};
pub use error::{Error, Result};
