//! Reconciling a space's users and roles against the human user set.
//!
//! The same data feeds two consumers: the notice recipients, and the
//! developer/manager lists used to re-provision a space after it is purged.
//! Service accounts never appear in either.

use std::collections::HashMap;

use lettre::{Address, address::AddressError};
use thiserror::Error;

use crate::{
  inventory::HumanUsers,
  resource::{Role, RoleType, User},
};

#[derive(Debug, Error)]
pub enum RecipientError {
  #[error("invalid email address {username:?} for user {guid}: {source}")]
  InvalidAddress {
    guid:     String,
    username: String,
    #[source]
    source:   AddressError,
  },
}

/// Email addresses of the space's human users, in input order.
///
/// Fails on the first selected user whose username is not a valid address;
/// the caller abandons the notice for that space rather than silently
/// dropping someone.
pub fn list_recipients(
  human: &HumanUsers,
  space_users: &[User],
) -> Result<Vec<String>, RecipientError> {
  let mut addresses = Vec::new();
  for user in space_users {
    if !human.contains(&user.guid) {
      continue;
    }
    let username = user.username();
    username.parse::<Address>().map_err(|source| {
      RecipientError::InvalidAddress {
        guid: user.guid.clone(),
        username: username.to_string(),
        source,
      }
    })?;
    addresses.push(username.to_string());
  }
  Ok(addresses)
}

// ─── Members ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceMember {
  pub user_guid: String,
  pub username:  String,
}

/// A human role whose user could not be matched to a username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRole {
  pub user_guid: String,
  pub kind:      RoleType,
}

/// Developers and managers of a space, each in original role order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceMembers {
  pub developers: Vec<SpaceMember>,
  pub managers:   Vec<SpaceMember>,
  /// Skipped roles, reported so the caller can log them.
  pub unresolved: Vec<UnresolvedRole>,
}

impl SpaceMembers {
  /// True when the space has nobody worth re-provisioning.
  pub fn is_empty(&self) -> bool {
    self.developers.is_empty() && self.managers.is_empty()
  }
}

/// Split the space's human roles into developers and managers.
///
/// Usernames are looked up in `space_users`; the lookup table is only built
/// once a human role needs it. Roles of any other type are ignored.
pub fn list_space_devs_and_managers(
  human: &HumanUsers,
  roles: &[Role],
  space_users: &[User],
) -> SpaceMembers {
  let mut members = SpaceMembers::default();
  let mut usernames: Option<HashMap<&str, &str>> = None;

  for role in roles {
    let Some(user_guid) = role.user_guid() else { continue };
    if !human.contains(user_guid) {
      continue;
    }

    let lookup = usernames.get_or_insert_with(|| {
      space_users
        .iter()
        .filter(|u| !u.username().is_empty())
        .map(|u| (u.guid.as_str(), u.username()))
        .collect()
    });
    let Some(username) = lookup.get(user_guid) else {
      members.unresolved.push(UnresolvedRole {
        user_guid: user_guid.to_string(),
        kind:      role.kind,
      });
      continue;
    };

    let member = SpaceMember {
      user_guid: user_guid.to_string(),
      username:  username.to_string(),
    };
    match role.kind {
      RoleType::SpaceDeveloper => members.developers.push(member),
      RoleType::SpaceManager => members.managers.push(member),
      _ => {}
    }
  }

  members
}
