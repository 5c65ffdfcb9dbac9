use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Mutex,
    },
};

use orbit_core::{ChannelId, ChannelKind, PermissionNode, RoleMembershipSet, RoleSlot};

/// Identity of a flattened node. Members with equal `roles` share entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct FlattenKey {
    /// Channel whose nodes apply after inheritance.
    pub(crate) channel_id: ChannelId,
    /// Normalized membership: the default slot is always set.
    pub(crate) roles: RoleMembershipSet,
    pub(crate) target_kind: ChannelKind,
}

#[derive(Default)]
struct Entries {
    nodes: HashMap<FlattenKey, PermissionNode>,
    access: HashMap<RoleMembershipSet, Vec<ChannelId>>,
}

/// Per-planet cache of flattened nodes and channel access lists.
///
/// Writers capture [`FlattenCache::generation`] before computing and only
/// store when no eviction happened since.
#[derive(Default)]
pub(crate) struct FlattenCache {
    entries: Mutex<Entries>,
    generation: AtomicU64,
    computations: AtomicU64,
    hits: AtomicU64,
}

impl FlattenCache {
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub(crate) fn get(&self, key: &FlattenKey) -> Option<PermissionNode> {
        let found = self
            .entries
            .lock()
            .ok()
            .and_then(|entries| entries.nodes.get(key).copied());
        if found.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        found
    }

    /// Stores `node` unless the key is already present or the cache was
    /// evicted after `generation` was read. Returns the value callers should
    /// use: an existing entry wins over `node`.
    pub(crate) fn insert_if_current(
        &self,
        key: FlattenKey,
        node: PermissionNode,
        generation: u64,
    ) -> PermissionNode {
        let Ok(mut entries) = self.entries.lock() else {
            return node;
        };
        if self.generation.load(Ordering::Acquire) != generation {
            return node;
        }
        *entries.nodes.entry(key).or_insert(node)
    }

    pub(crate) fn access_list(&self, roles: &RoleMembershipSet) -> Option<Vec<ChannelId>> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.access.get(roles).cloned())
    }

    pub(crate) fn insert_access_if_current(
        &self,
        roles: RoleMembershipSet,
        channels: Vec<ChannelId>,
        generation: u64,
    ) -> Vec<ChannelId> {
        let Ok(mut entries) = self.entries.lock() else {
            return channels;
        };
        if self.generation.load(Ordering::Acquire) != generation {
            return channels;
        }
        entries.access.entry(roles).or_insert(channels).clone()
    }

    pub(crate) fn record_computation(&self) {
        self.computations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn computations(&self) -> u64 {
        self.computations.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries
            .lock()
            .map_or(0, |entries| entries.nodes.len())
    }

    /// Drops every node keyed by `channel_id`. Access lists span all
    /// channels, so all of them go.
    pub(crate) fn evict_channel(&self, channel_id: ChannelId) -> usize {
        self.evict(|entries| {
            let before = entries.nodes.len();
            entries.nodes.retain(|key, _| key.channel_id != channel_id);
            entries.access.clear();
            before - entries.nodes.len()
        })
    }

    /// Drops every entry whose membership key holds `slot`.
    pub(crate) fn evict_slot(&self, slot: RoleSlot) -> usize {
        self.evict(|entries| {
            let before = entries.nodes.len();
            entries.nodes.retain(|key, _| !key.roles.contains(slot));
            entries.access.retain(|roles, _| !roles.contains(slot));
            before - entries.nodes.len()
        })
    }

    pub(crate) fn evict_membership(&self, roles: &RoleMembershipSet) -> usize {
        self.evict(|entries| {
            let before = entries.nodes.len();
            entries.nodes.retain(|key, _| key.roles != *roles);
            entries.access.remove(roles);
            before - entries.nodes.len()
        })
    }

    pub(crate) fn clear(&self) -> usize {
        self.evict(|entries| {
            let evicted = entries.nodes.len();
            entries.nodes.clear();
            entries.access.clear();
            evicted
        })
    }

    // The generation moves while the lock is held so a concurrent writer
    // either lands before the eviction or is rejected.
    fn evict(&self, apply: impl FnOnce(&mut Entries) -> usize) -> usize {
        match self.entries.lock() {
            Ok(mut entries) => {
                self.generation.fetch_add(1, Ordering::AcqRel);
                apply(&mut entries)
            }
            Err(poisoned) => {
                let mut entries = poisoned.into_inner();
                self.generation.fetch_add(1, Ordering::AcqRel);
                *entries = Entries::default();
                0
            }
        }
    }
}
