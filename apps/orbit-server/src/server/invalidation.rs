use std::collections::HashMap;

use orbit_core::{
    effective_membership, ChannelId, ChannelKind, DomainError, MemberId, PermissionSource,
    PlanetId, RoleId, RoleMembershipSet,
};
use orbit_protocol::ChangeNotification;

use super::{cache::FlattenCache, metrics::record_cache_eviction, store::PlanetData};

/// A change that may invalidate flattened results of one planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Invalidation {
    RoleChanged(RoleId),
    NodeChanged {
        role_id: RoleId,
        channel_id: ChannelId,
        target_kind: ChannelKind,
    },
    MembershipChanged(MemberId),
    ChannelChanged(ChannelId),
    RoleOrderChanged,
}

impl Invalidation {
    pub(crate) fn to_notification(self, planet_id: PlanetId) -> ChangeNotification {
        match self {
            Self::RoleChanged(role_id) => ChangeNotification::RoleChanged {
                role_id: role_id.to_string(),
            },
            Self::NodeChanged {
                role_id,
                channel_id,
                target_kind,
            } => ChangeNotification::NodeChanged {
                role_id: role_id.to_string(),
                channel_id: channel_id.to_string(),
                target_kind: target_kind.to_string(),
            },
            Self::MembershipChanged(member_id) => ChangeNotification::MembershipChanged {
                member_id: member_id.to_string(),
            },
            Self::ChannelChanged(channel_id) => ChangeNotification::ChannelChanged {
                channel_id: channel_id.to_string(),
            },
            Self::RoleOrderChanged => ChangeNotification::RoleOrderChanged {
                planet_id: planet_id.to_string(),
            },
        }
    }

    pub(crate) fn from_notification(
        planet_id: PlanetId,
        notification: &ChangeNotification,
    ) -> Result<Self, DomainError> {
        match notification {
            ChangeNotification::RoleChanged { role_id } => {
                Ok(Self::RoleChanged(role_id.parse()?))
            }
            ChangeNotification::NodeChanged {
                role_id,
                channel_id,
                target_kind,
            } => Ok(Self::NodeChanged {
                role_id: role_id.parse()?,
                channel_id: channel_id.parse()?,
                target_kind: ChannelKind::try_from(target_kind.clone())?,
            }),
            ChangeNotification::MembershipChanged { member_id } => {
                Ok(Self::MembershipChanged(member_id.parse()?))
            }
            ChangeNotification::ChannelChanged { channel_id } => {
                Ok(Self::ChannelChanged(channel_id.parse()?))
            }
            ChangeNotification::RoleOrderChanged {
                planet_id: notified,
            } => {
                if notified.parse::<PlanetId>()? == planet_id {
                    Ok(Self::RoleOrderChanged)
                } else {
                    Err(DomainError::InvalidId)
                }
            }
        }
    }

    const fn reason(self) -> &'static str {
        match self {
            Self::RoleChanged(_) => "role_changed",
            Self::NodeChanged { .. } => "node_changed",
            Self::MembershipChanged(_) => "membership_changed",
            Self::ChannelChanged(_) => "channel_changed",
            Self::RoleOrderChanged => "role_order_changed",
        }
    }
}

/// Maps change events to cache evictions for one planet.
///
/// Tracks how many members share each membership key so an old key is only
/// evicted once nobody holds it any more. Applying the same event twice is
/// harmless.
#[derive(Debug, Default)]
pub(crate) struct InvalidationTracker {
    shared: HashMap<RoleMembershipSet, usize>,
    known: HashMap<MemberId, RoleMembershipSet>,
}

impl InvalidationTracker {
    pub(crate) fn seeded(data: &PlanetData) -> Self {
        let mut tracker = Self::default();
        for member in data.members() {
            tracker.track(member.id, membership_key(data, member.roles));
        }
        tracker
    }

    /// Number of members currently known to hold `roles`.
    #[cfg(test)]
    pub(crate) fn shared_by(&self, roles: &RoleMembershipSet) -> usize {
        self.shared.get(roles).copied().unwrap_or(0)
    }

    /// Returns the number of evicted flattened nodes.
    pub(crate) fn apply(
        &mut self,
        data: &PlanetData,
        cache: &FlattenCache,
        event: Invalidation,
    ) -> usize {
        let evicted = match event {
            Invalidation::RoleChanged(role_id) => match data.role(role_id) {
                Some(role) => cache.evict_slot(role.slot),
                None => cache.clear(),
            },
            Invalidation::NodeChanged { channel_id, .. } => cache.evict_channel(channel_id),
            Invalidation::MembershipChanged(member_id) => {
                let current = data
                    .member(member_id)
                    .map(|member| membership_key(data, member.roles));
                self.reconcile(cache, member_id, current)
            }
            Invalidation::ChannelChanged(_) | Invalidation::RoleOrderChanged => cache.clear(),
        };

        tracing::debug!(
            event = "cache.invalidate",
            outcome = "applied",
            reason = event.reason(),
            planet_id = %data.planet_record().id,
            evicted,
        );
        if evicted > 0 {
            record_cache_eviction(event.reason(), evicted);
        }
        evicted
    }

    fn reconcile(
        &mut self,
        cache: &FlattenCache,
        member_id: MemberId,
        current: Option<RoleMembershipSet>,
    ) -> usize {
        let previous = self.known.get(&member_id).copied();
        if previous == current {
            return 0;
        }

        let mut evicted = 0;
        if let Some(previous) = previous {
            self.known.remove(&member_id);
            if self.release(previous) {
                evicted = cache.evict_membership(&previous);
            }
        }
        if let Some(current) = current {
            self.track(member_id, current);
        }
        evicted
    }

    fn track(&mut self, member_id: MemberId, roles: RoleMembershipSet) {
        self.known.insert(member_id, roles);
        *self.shared.entry(roles).or_insert(0) += 1;
    }

    // Returns `true` when the last holder of `roles` let go of it.
    fn release(&mut self, roles: RoleMembershipSet) -> bool {
        match self.shared.get_mut(&roles) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.shared.remove(&roles);
                true
            }
            None => true,
        }
    }
}

fn membership_key(data: &PlanetData, roles: RoleMembershipSet) -> RoleMembershipSet {
    effective_membership(data, data.planet_record(), roles)
}

#[cfg(test)]
mod tests {
    use orbit_core::{
        ChannelKind, PermissionNode, RoleMembershipSet, RoleSlot, UserId,
    };
    use orbit_protocol::ChangeNotification;

    use super::{Invalidation, InvalidationTracker};
    use crate::server::{
        cache::{FlattenCache, FlattenKey},
        store::PlanetData,
    };

    fn fill(cache: &FlattenCache, key: FlattenKey) {
        cache.insert_if_current(key, PermissionNode::from_parts(1, u64::MAX), cache.generation());
    }

    #[test]
    fn membership_key_is_evicted_only_when_unshared() {
        let mut data = PlanetData::new(String::from("orbit"), UserId::new()).unwrap();
        let role = data.create_role(String::from("muted"), 3).unwrap();
        let channel = data
            .create_channel(String::from("general"), ChannelKind::Chat, None, false)
            .unwrap();
        let first = data.add_member(UserId::new()).unwrap();
        let second = data.add_member(UserId::new()).unwrap();
        data.grant_role(first.id, role.id).unwrap();
        data.grant_role(second.id, role.id).unwrap();

        let cache = FlattenCache::default();
        let mut tracker = InvalidationTracker::seeded(&data);
        let shared: RoleMembershipSet = [RoleSlot::new(0), role.slot].into_iter().collect();
        assert_eq!(tracker.shared_by(&shared), 2);
        let key = FlattenKey {
            channel_id: channel.id,
            roles: shared,
            target_kind: ChannelKind::Chat,
        };
        fill(&cache, key);

        data.revoke_role(first.id, role.id).unwrap();
        let event = Invalidation::MembershipChanged(first.id);
        assert_eq!(tracker.apply(&data, &cache, event), 0);
        assert_eq!(cache.len(), 1);
        // redelivery is a no-op
        assert_eq!(tracker.apply(&data, &cache, event), 0);
        assert_eq!(tracker.shared_by(&shared), 1);

        data.revoke_role(second.id, role.id).unwrap();
        assert_eq!(
            tracker.apply(&data, &cache, Invalidation::MembershipChanged(second.id)),
            1
        );
        assert_eq!(cache.len(), 0);
        assert_eq!(tracker.shared_by(&shared), 0);
        assert_eq!(
            tracker.shared_by(&RoleMembershipSet::EMPTY.with(RoleSlot::new(0))),
            2
        );
    }

    #[test]
    fn role_and_node_changes_evict_their_entries() {
        let mut data = PlanetData::new(String::from("orbit"), UserId::new()).unwrap();
        let role = data.create_role(String::from("helper"), 3).unwrap();
        let general = data
            .create_channel(String::from("general"), ChannelKind::Chat, None, false)
            .unwrap();
        let lounge = data
            .create_channel(String::from("lounge"), ChannelKind::Chat, None, false)
            .unwrap();
        let default_only = RoleMembershipSet::EMPTY.with(RoleSlot::new(0));
        let with_helper = default_only.with(role.slot);

        let cache = FlattenCache::default();
        let mut tracker = InvalidationTracker::seeded(&data);
        for (channel_id, roles) in [
            (general.id, default_only),
            (general.id, with_helper),
            (lounge.id, default_only),
            (lounge.id, with_helper),
        ] {
            fill(
                &cache,
                FlattenKey {
                    channel_id,
                    roles,
                    target_kind: ChannelKind::Chat,
                },
            );
        }

        assert_eq!(
            tracker.apply(&data, &cache, Invalidation::RoleChanged(role.id)),
            2
        );
        let node_changed = Invalidation::NodeChanged {
            role_id: role.id,
            channel_id: lounge.id,
            target_kind: ChannelKind::Chat,
        };
        assert_eq!(tracker.apply(&data, &cache, node_changed), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            tracker.apply(&data, &cache, Invalidation::ChannelChanged(general.id)),
            1
        );
    }

    #[test]
    fn unknown_role_clears_everything() {
        let data = PlanetData::new(String::from("orbit"), UserId::new()).unwrap();
        let channel = orbit_core::ChannelId::new();
        let cache = FlattenCache::default();
        let mut tracker = InvalidationTracker::default();
        fill(
            &cache,
            FlattenKey {
                channel_id: channel,
                roles: RoleMembershipSet::EMPTY.with(RoleSlot::new(0)),
                target_kind: ChannelKind::Voice,
            },
        );
        let deleted = Invalidation::RoleChanged(orbit_core::RoleId::new());
        assert_eq!(tracker.apply(&data, &cache, deleted), 1);
    }

    #[test]
    fn notifications_map_to_typed_invalidations() {
        let data = PlanetData::new(String::from("orbit"), UserId::new()).unwrap();
        let planet_id = data.planet_record().id;
        let role_id = orbit_core::RoleId::new();
        let event = Invalidation::NodeChanged {
            role_id,
            channel_id: orbit_core::ChannelId::new(),
            target_kind: ChannelKind::Voice,
        };
        let notification = event.to_notification(planet_id);
        assert_eq!(
            Invalidation::from_notification(planet_id, &notification).unwrap(),
            event
        );

        let foreign = ChangeNotification::RoleOrderChanged {
            planet_id: orbit_core::PlanetId::new().to_string(),
        };
        assert!(Invalidation::from_notification(planet_id, &foreign).is_err());
        let garbage = ChangeNotification::RoleChanged {
            role_id: String::from("nope"),
        };
        assert!(Invalidation::from_notification(planet_id, &garbage).is_err());
    }
}
