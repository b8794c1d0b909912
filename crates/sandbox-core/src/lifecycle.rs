//! Space age derivation and notify/purge classification.
//!
//! Age is resource-driven: a space is as old as the earliest application or
//! service instance inside it, clamped to an operator-supplied floor. A space
//! without resources has no age and is never classified.
//!
//! Everything here is pure; callers own logging and I/O.

use std::collections::HashMap;

use chrono::{DateTime, NaiveTime, Utc};

use crate::{
  inventory::OrgInventory,
  resource::{App, ServiceInstance, Space, SpaceResource},
};

/// Truncate to the enclosing UTC midnight.
pub fn truncate_to_day(at: DateTime<Utc>) -> DateTime<Utc> {
  at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

// ─── Age ─────────────────────────────────────────────────────────────────────

/// Earliest resource creation time per space, built once per organization.
#[derive(Debug, Default)]
pub struct ResourceIndex<'a> {
  first_created: HashMap<&'a str, DateTime<Utc>>,
}

impl<'a> ResourceIndex<'a> {
  pub fn new(apps: &'a [App], instances: &'a [ServiceInstance]) -> Self {
    let mut index = Self::default();
    index.extend(apps);
    index.extend(instances);
    index
  }

  fn extend<R: SpaceResource>(&mut self, resources: &'a [R]) {
    for resource in resources {
      let Some(space_guid) = resource.space_guid() else { continue };
      let created_at = resource.created_at();
      self
        .first_created
        .entry(space_guid)
        .and_modify(|first| *first = (*first).min(created_at))
        .or_insert(created_at);
    }
  }

  /// Creation time of the space's earliest resource; `None` when empty.
  pub fn first_resource(&self, space: &Space) -> Option<DateTime<Utc>> {
    self.first_created.get(space.guid.as_str()).copied()
  }
}

// ─── Classification ──────────────────────────────────────────────────────────

/// A classified space and the effective (day-truncated) time its age is
/// counted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceDetails {
  pub timestamp: DateTime<Utc>,
  pub space:     Space,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
  Notify,
  Purge,
}

/// The notify and purge sets for one organization. Disjoint by construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classification {
  pub notify: Vec<SpaceDetails>,
  pub purge:  Vec<SpaceDetails>,
}

/// Day thresholds and switches that decide a space's fate.
///
/// `purge_days` is expected to exceed `notify_days` but nothing here relies
/// on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecyclePolicy {
  pub notify_days:   i64,
  pub purge_days:    i64,
  pub disable_purge: bool,
  /// Resources created before this instant are aged from it instead.
  pub floor:         Option<DateTime<Utc>>,
}

impl LifecyclePolicy {
  /// `truncate_to_day(max(first_resource, floor))`.
  pub fn effective_time(&self, first_resource: DateTime<Utc>) -> DateTime<Utc> {
    let clamped = match self.floor {
      Some(floor) => first_resource.max(floor),
      None => first_resource,
    };
    truncate_to_day(clamped)
  }

  /// Decide for a space whose age counts from `effective`. Purge wins over
  /// notify; both thresholds are inclusive.
  pub fn verdict(
    &self,
    effective: DateTime<Utc>,
    now: DateTime<Utc>,
  ) -> Option<Verdict> {
    let delta = (now - effective).num_days();
    if !self.disable_purge && delta >= self.purge_days {
      Some(Verdict::Purge)
    } else if delta >= self.notify_days {
      Some(Verdict::Notify)
    } else {
      None
    }
  }

  /// Classify every space of an organization. `now` should already be
  /// truncated to the day by the caller. Input order is preserved.
  pub fn classify(
    &self,
    inventory: &OrgInventory,
    now: DateTime<Utc>,
  ) -> Classification {
    let index = ResourceIndex::new(&inventory.apps, &inventory.instances);
    let mut classification = Classification::default();

    for space in &inventory.spaces {
      let Some(first_resource) = index.first_resource(space) else {
        continue;
      };
      let timestamp = self.effective_time(first_resource);
      let details = SpaceDetails { timestamp, space: space.clone() };
      match self.verdict(timestamp, now) {
        Some(Verdict::Purge) => classification.purge.push(details),
        Some(Verdict::Notify) => classification.notify.push(details),
        None => {}
      }
    }

    classification
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, TimeZone};

  use super::*;
  use crate::testing::{app, instance, space};

  fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap()
  }

  fn policy() -> LifecyclePolicy {
    LifecyclePolicy {
      notify_days:   25,
      purge_days:    30,
      disable_purge: false,
      floor:         None,
    }
  }

  fn inventory_with_app_age(days: i64) -> OrgInventory {
    OrgInventory {
      spaces:    vec![space("space-1", "dev", "org-1")],
      apps:      vec![app(
        "app-1",
        "space-1",
        now() - Duration::days(days) + Duration::hours(9),
      )],
      instances: vec![],
    }
  }

  // ── Age ────────────────────────────────────────────────────────────────

  #[test]
  fn first_resource_is_minimum_over_apps_and_instances() {
    let t = now() - Duration::days(10);
    let apps = vec![
      app("a1", "space-1", t),
      app("a2", "space-1", t - Duration::days(3)),
      app("a3", "space-2", t - Duration::days(50)),
    ];
    let instances = vec![instance("i1", "space-1", t - Duration::days(5))];
    let index = ResourceIndex::new(&apps, &instances);

    assert_eq!(
      index.first_resource(&space("space-1", "dev", "org-1")),
      Some(t - Duration::days(5))
    );
    assert_eq!(
      index.first_resource(&space("space-2", "prod", "org-1")),
      Some(t - Duration::days(50))
    );
    assert_eq!(index.first_resource(&space("space-3", "qa", "org-1")), None);
  }

  #[test]
  fn truncate_drops_time_of_day() {
    let at = Utc.with_ymd_and_hms(2024, 6, 12, 23, 59, 59).unwrap();
    assert_eq!(
      truncate_to_day(at),
      Utc.with_ymd_and_hms(2024, 6, 12, 0, 0, 0).unwrap()
    );
  }

  // ── Classification scenarios ───────────────────────────────────────────

  #[test]
  fn app_28_days_old_is_notified_with_truncated_timestamp() {
    let result = policy().classify(&inventory_with_app_age(28), now());
    assert!(result.purge.is_empty());
    assert_eq!(result.notify.len(), 1);
    assert_eq!(result.notify[0].space.guid, "space-1");
    assert_eq!(result.notify[0].timestamp, now() - Duration::days(28));
  }

  #[test]
  fn app_31_days_old_is_purged() {
    let result = policy().classify(&inventory_with_app_age(31), now());
    assert!(result.notify.is_empty());
    assert_eq!(result.purge.len(), 1);
    assert_eq!(result.purge[0].timestamp, now() - Duration::days(31));
  }

  #[test]
  fn disabled_purge_falls_back_to_notify() {
    let policy = LifecyclePolicy { disable_purge: true, ..policy() };
    let result = policy.classify(&inventory_with_app_age(31), now());
    assert!(result.purge.is_empty());
    assert_eq!(result.notify.len(), 1);
  }

  #[test]
  fn young_space_is_skipped() {
    let result = policy().classify(&inventory_with_app_age(24), now());
    assert_eq!(result, Classification::default());
  }

  #[test]
  fn thresholds_are_inclusive() {
    let at_notify = policy().classify(&inventory_with_app_age(25), now());
    assert_eq!(at_notify.notify.len(), 1);
    assert!(at_notify.purge.is_empty());

    let at_purge = policy().classify(&inventory_with_app_age(30), now());
    assert_eq!(at_purge.purge.len(), 1);
    assert!(at_purge.notify.is_empty());
  }

  #[test]
  fn empty_spaces_are_never_classified() {
    let inventory = OrgInventory {
      spaces:    vec![space("space-1", "empty", "org-1")],
      apps:      vec![],
      instances: vec![],
    };
    for (notify_days, purge_days) in [(0, 0), (-1, -1), (25, 30), (30, 25)] {
      for disable_purge in [false, true] {
        let policy = LifecyclePolicy {
          notify_days,
          purge_days,
          disable_purge,
          floor: None,
        };
        assert_eq!(
          policy.classify(&inventory, now()),
          Classification::default()
        );
      }
    }
  }

  #[test]
  fn floor_later_than_first_resource_is_used() {
    let floor = now() - Duration::days(10) + Duration::hours(4);
    let policy = LifecyclePolicy { floor: Some(floor), ..policy() };
    let result = policy.classify(&inventory_with_app_age(40), now());
    assert_eq!(result, Classification::default());

    let policy = LifecyclePolicy {
      floor: Some(now() - Duration::days(26)),
      ..policy
    };
    let result = policy.classify(&inventory_with_app_age(40), now());
    assert_eq!(result.notify.len(), 1);
    assert_eq!(result.notify[0].timestamp, now() - Duration::days(26));
  }

  #[test]
  fn floor_earlier_than_first_resource_is_ignored() {
    let policy = LifecyclePolicy {
      floor: Some(now() - Duration::days(400)),
      ..policy()
    };
    let result = policy.classify(&inventory_with_app_age(28), now());
    assert_eq!(result.notify[0].timestamp, now() - Duration::days(28));
  }

  #[test]
  fn purge_is_checked_first_even_when_thresholds_are_inverted() {
    let inverted = LifecyclePolicy {
      notify_days: 30,
      purge_days: 25,
      ..policy()
    };
    let result = inverted.classify(&inventory_with_app_age(27), now());
    assert_eq!(result.purge.len(), 1);
    assert!(result.notify.is_empty());
  }

  #[test]
  fn instances_alone_age_a_space() {
    let inventory = OrgInventory {
      spaces:    vec![space("space-1", "dev", "org-1")],
      apps:      vec![],
      instances: vec![instance("i1", "space-1", now() - Duration::days(33))],
    };
    let result = policy().classify(&inventory, now());
    assert_eq!(result.purge.len(), 1);
  }

  #[test]
  fn resources_in_the_future_are_skipped() {
    let result = policy().classify(&inventory_with_app_age(-3), now());
    assert_eq!(result, Classification::default());
  }

  #[test]
  fn classification_preserves_space_order() {
    let inventory = OrgInventory {
      spaces:    vec![
        space("s1", "a", "org-1"),
        space("s2", "b", "org-1"),
        space("s3", "c", "org-1"),
      ],
      apps:      vec![
        app("a3", "s3", now() - Duration::days(35)),
        app("a1", "s1", now() - Duration::days(31)),
        app("a2", "s2", now() - Duration::days(26)),
      ],
      instances: vec![],
    };
    let result = policy().classify(&inventory, now());
    let purged: Vec<_> = result.purge.iter().map(|d| d.space.guid.as_str()).collect();
    assert_eq!(purged, ["s1", "s3"]);
    assert_eq!(result.notify[0].space.guid, "s2");
  }
}
