//! Core types, capability traits, and lifecycle logic for sandbox
//! organizations.
//!
//! No HTTP or SMTP transport lives here. The platform API and the mailer are
//! consumed through the narrow traits in [`client`] and [`notify`];
//! `sandbox-cf` and `sandbox-purge` provide the real implementations.

pub mod client;
pub mod error;
pub mod inventory;
pub mod lifecycle;
pub mod notify;
pub mod purge;
pub mod resource;
pub mod roles;
pub mod sweep;

pub use error::{ApiError, BoxError, Error, Result};

#[cfg(test)]
mod testing;
