use std::collections::HashMap;

use orbit_core::{
    validate_parent, ChannelId, ChannelKind, MemberId, NodeKey, PermissionError, PermissionNode,
    PermissionSet, PermissionSource, Planet, PlanetChannel, PlanetId, PlanetMember, PlanetRole,
    RoleId, RoleIndexAllocator, RoleMembershipSet, RoleSlot, UserId,
};

pub(crate) const DEFAULT_ROLE_NAME: &str = "everyone";

/// Resident records of one planet, plus its role slot allocator.
pub(crate) struct PlanetData {
    planet: Planet,
    roles: HashMap<RoleId, PlanetRole>,
    slots: HashMap<RoleSlot, RoleId>,
    members: HashMap<MemberId, PlanetMember>,
    channels: HashMap<ChannelId, PlanetChannel>,
    nodes: HashMap<NodeKey, PermissionNode>,
    allocator: RoleIndexAllocator,
}

#[derive(Debug, Default)]
pub(crate) struct ChannelUpdate {
    pub(crate) name: Option<String>,
    /// `Some(None)` detaches the channel from its parent.
    pub(crate) parent_id: Option<Option<ChannelId>>,
    pub(crate) inherits_perms: Option<bool>,
}

#[derive(Debug, Default)]
pub(crate) struct RoleUpdate {
    pub(crate) name: Option<String>,
    pub(crate) position: Option<u32>,
    pub(crate) is_admin: Option<bool>,
    pub(crate) permissions: Option<PermissionSet>,
    pub(crate) chat_permissions: Option<PermissionSet>,
    pub(crate) category_permissions: Option<PermissionSet>,
    pub(crate) voice_permissions: Option<PermissionSet>,
}

#[derive(Debug)]
pub(crate) struct RoleEdit {
    pub(crate) role: PlanetRole,
    pub(crate) position_changed: bool,
    pub(crate) bits_changed: bool,
}

#[derive(Debug)]
pub(crate) struct ChannelDeletion {
    pub(crate) channel: PlanetChannel,
    pub(crate) removed_nodes: usize,
}

#[derive(Debug)]
pub(crate) struct RoleDeletion {
    pub(crate) role: PlanetRole,
    /// Members whose bit was cleared before the slot was released.
    pub(crate) affected_members: Vec<MemberId>,
    pub(crate) removed_nodes: usize,
}

impl PlanetData {
    /// A new planet holding only its default role, which always takes slot 0.
    pub(crate) fn new(name: String, owner_user_id: UserId) -> Result<Self, PermissionError> {
        let planet_id = PlanetId::new();
        let mut allocator = RoleIndexAllocator::new();
        let slot = allocator.allocate()?;
        let mut default_role =
            PlanetRole::with_defaults(planet_id, String::from(DEFAULT_ROLE_NAME), u32::MAX, slot);
        default_role.is_default = true;

        let planet = Planet {
            id: planet_id,
            name,
            owner_user_id,
            default_role_id: default_role.id,
        };
        Ok(Self {
            planet,
            slots: HashMap::from([(slot, default_role.id)]),
            roles: HashMap::from([(default_role.id, default_role)]),
            members: HashMap::new(),
            channels: HashMap::new(),
            nodes: HashMap::new(),
            allocator,
        })
    }

    pub(crate) fn planet_record(&self) -> &Planet {
        &self.planet
    }

    pub(crate) fn members(&self) -> impl Iterator<Item = &PlanetMember> {
        self.members.values()
    }

    /// Channels ordered by id, which is creation order.
    pub(crate) fn channels_sorted(&self) -> Vec<&PlanetChannel> {
        let mut channels: Vec<_> = self.channels.values().collect();
        channels.sort_by_key(|channel| channel.id);
        channels
    }

    pub(crate) fn slots_in_use(&self) -> usize {
        self.allocator.in_use()
    }

    pub(crate) fn create_channel(
        &mut self,
        name: String,
        kind: ChannelKind,
        parent_id: Option<ChannelId>,
        inherits_perms: bool,
    ) -> Result<PlanetChannel, PermissionError> {
        let channel = PlanetChannel {
            id: ChannelId::new(),
            planet_id: self.planet.id,
            name,
            kind,
            parent_id,
            inherits_perms,
        };
        validate_parent(&*self, self.planet.id, channel.id, parent_id)?;
        self.channels.insert(channel.id, channel.clone());
        Ok(channel)
    }

    /// Returns the updated channel and whether its inheritance chain changed.
    pub(crate) fn update_channel(
        &mut self,
        channel_id: ChannelId,
        update: ChannelUpdate,
    ) -> Result<(PlanetChannel, bool), PermissionError> {
        if !self.channels.contains_key(&channel_id) {
            return Err(PermissionError::UnknownChannel);
        }
        if let Some(parent_id) = update.parent_id {
            validate_parent(&*self, self.planet.id, channel_id, parent_id)?;
        }

        let channel = self
            .channels
            .get_mut(&channel_id)
            .ok_or(PermissionError::UnknownChannel)?;
        let mut topology_changed = false;
        if let Some(name) = update.name {
            channel.name = name;
        }
        if let Some(parent_id) = update.parent_id {
            topology_changed |= channel.parent_id != parent_id;
            channel.parent_id = parent_id;
        }
        if let Some(inherits_perms) = update.inherits_perms {
            topology_changed |= channel.inherits_perms != inherits_perms;
            channel.inherits_perms = inherits_perms;
        }
        Ok((channel.clone(), topology_changed))
    }

    /// Removes a channel together with every node targeting it. Children
    /// must be moved or deleted first.
    pub(crate) fn delete_channel(
        &mut self,
        channel_id: ChannelId,
    ) -> Result<ChannelDeletion, PermissionError> {
        if !self.channels.contains_key(&channel_id) {
            return Err(PermissionError::UnknownChannel);
        }
        if self
            .channels
            .values()
            .any(|channel| channel.parent_id == Some(channel_id))
        {
            return Err(PermissionError::ChannelHasChildren { channel_id });
        }

        let nodes_before = self.nodes.len();
        self.nodes.retain(|key, _| key.channel_id != channel_id);
        let removed_nodes = nodes_before - self.nodes.len();
        let channel = self
            .channels
            .remove(&channel_id)
            .ok_or(PermissionError::UnknownChannel)?;

        Ok(ChannelDeletion {
            channel,
            removed_nodes,
        })
    }

    pub(crate) fn add_member(&mut self, user_id: UserId) -> Result<PlanetMember, PermissionError> {
        if self.members.values().any(|member| member.user_id == user_id) {
            return Err(PermissionError::AlreadyMember);
        }
        let member = PlanetMember {
            id: MemberId::new(),
            planet_id: self.planet.id,
            user_id,
            roles: RoleMembershipSet::EMPTY,
        };
        self.members.insert(member.id, member.clone());
        Ok(member)
    }

    pub(crate) fn remove_member(
        &mut self,
        member_id: MemberId,
    ) -> Result<PlanetMember, PermissionError> {
        if self
            .members
            .get(&member_id)
            .is_some_and(|member| member.user_id == self.planet.owner_user_id)
        {
            return Err(PermissionError::OwnerImmutable);
        }
        self.members
            .remove(&member_id)
            .ok_or(PermissionError::UnknownMember)
    }

    pub(crate) fn create_role(
        &mut self,
        name: String,
        position: u32,
    ) -> Result<PlanetRole, PermissionError> {
        let slot = self.allocator.allocate()?;
        let role = PlanetRole::with_defaults(self.planet.id, name, position, slot);
        self.slots.insert(slot, role.id);
        self.roles.insert(role.id, role.clone());
        Ok(role)
    }

    pub(crate) fn update_role(
        &mut self,
        role_id: RoleId,
        update: RoleUpdate,
    ) -> Result<RoleEdit, PermissionError> {
        let role = self
            .roles
            .get_mut(&role_id)
            .ok_or(PermissionError::UnknownRole)?;
        let before = role.clone();

        if let Some(name) = update.name {
            role.name = name;
        }
        if let Some(position) = update.position {
            role.position = position;
        }
        if let Some(is_admin) = update.is_admin {
            role.is_admin = is_admin;
        }
        if let Some(bits) = update.permissions {
            role.permissions = bits;
        }
        if let Some(bits) = update.chat_permissions {
            role.chat_permissions = bits;
        }
        if let Some(bits) = update.category_permissions {
            role.category_permissions = bits;
        }
        if let Some(bits) = update.voice_permissions {
            role.voice_permissions = bits;
        }

        Ok(RoleEdit {
            position_changed: before.position != role.position,
            bits_changed: before.is_admin != role.is_admin
                || before.permissions != role.permissions
                || before.chat_permissions != role.chat_permissions
                || before.category_permissions != role.category_permissions
                || before.voice_permissions != role.voice_permissions,
            role: role.clone(),
        })
    }

    /// Clears the role's bit on every member, drops its nodes and only then
    /// returns its slot to the allocator.
    pub(crate) fn delete_role(&mut self, role_id: RoleId) -> Result<RoleDeletion, PermissionError> {
        let role = self
            .roles
            .get(&role_id)
            .ok_or(PermissionError::UnknownRole)?;
        if role.is_default {
            return Err(PermissionError::DefaultRoleImmutable);
        }
        let slot = role.slot;

        let mut affected_members = Vec::new();
        for member in self.members.values_mut() {
            if member.roles.remove(slot) {
                affected_members.push(member.id);
            }
        }
        affected_members.sort();

        let nodes_before = self.nodes.len();
        self.nodes.retain(|key, _| key.role_id != role_id);
        let removed_nodes = nodes_before - self.nodes.len();

        let role = self
            .roles
            .remove(&role_id)
            .ok_or(PermissionError::UnknownRole)?;
        self.slots.remove(&slot);
        self.allocator.release(slot);

        Ok(RoleDeletion {
            role,
            affected_members,
            removed_nodes,
        })
    }

    /// Returns `true` if the member did not already hold the role.
    pub(crate) fn grant_role(
        &mut self,
        member_id: MemberId,
        role_id: RoleId,
    ) -> Result<bool, PermissionError> {
        let slot = self.role(role_id).ok_or(PermissionError::UnknownRole)?.slot;
        let member = self
            .members
            .get_mut(&member_id)
            .ok_or(PermissionError::UnknownMember)?;
        Ok(member.roles.insert(slot))
    }

    /// Returns `true` if the member held the role.
    pub(crate) fn revoke_role(
        &mut self,
        member_id: MemberId,
        role_id: RoleId,
    ) -> Result<bool, PermissionError> {
        let role = self.role(role_id).ok_or(PermissionError::UnknownRole)?;
        if role.is_default {
            return Err(PermissionError::DefaultRoleImmutable);
        }
        let slot = role.slot;
        let member = self
            .members
            .get_mut(&member_id)
            .ok_or(PermissionError::UnknownMember)?;
        Ok(member.roles.remove(slot))
    }

    /// Stores `node`; an empty node is the same as no node and is removed.
    pub(crate) fn set_node(
        &mut self,
        key: NodeKey,
        node: PermissionNode,
    ) -> Result<(), PermissionError> {
        self.ensure_node_target(key)?;
        if node.is_empty() {
            self.nodes.remove(&key);
        } else {
            self.nodes.insert(key, node);
        }
        Ok(())
    }

    pub(crate) fn remove_node(&mut self, key: NodeKey) -> Result<bool, PermissionError> {
        self.ensure_node_target(key)?;
        Ok(self.nodes.remove(&key).is_some())
    }

    fn ensure_node_target(&self, key: NodeKey) -> Result<(), PermissionError> {
        if !self.roles.contains_key(&key.role_id) {
            return Err(PermissionError::UnknownRole);
        }
        if !self.channels.contains_key(&key.channel_id) {
            return Err(PermissionError::UnknownChannel);
        }
        Ok(())
    }
}

impl PermissionSource for PlanetData {
    fn planet(&self, planet_id: PlanetId) -> Option<&Planet> {
        (self.planet.id == planet_id).then_some(&self.planet)
    }

    fn role(&self, role_id: RoleId) -> Option<&PlanetRole> {
        self.roles.get(&role_id)
    }

    fn roles_for_planet(&self, planet_id: PlanetId) -> Vec<&PlanetRole> {
        if planet_id == self.planet.id {
            self.roles.values().collect()
        } else {
            Vec::new()
        }
    }

    fn role_by_slot(&self, planet_id: PlanetId, slot: RoleSlot) -> Option<&PlanetRole> {
        if planet_id != self.planet.id {
            return None;
        }
        self.slots.get(&slot).and_then(|role_id| self.roles.get(role_id))
    }

    fn member(&self, member_id: MemberId) -> Option<&PlanetMember> {
        self.members.get(&member_id)
    }

    fn permission_node(
        &self,
        role_id: RoleId,
        channel_id: ChannelId,
        target_kind: ChannelKind,
    ) -> Option<&PermissionNode> {
        self.nodes.get(&NodeKey {
            role_id,
            channel_id,
            target_kind,
        })
    }

    fn channel(&self, channel_id: ChannelId) -> Option<&PlanetChannel> {
        self.channels.get(&channel_id)
    }
}

#[cfg(test)]
mod tests {
    use orbit_core::{
        permission::chat, ChannelId, ChannelKind, NodeKey, PermissionError, PermissionNode,
        PermissionSource, PermissionState, RoleSlot, UserId, MAX_PLANET_ROLES,
    };

    use super::{ChannelUpdate, PlanetData, RoleUpdate};

    fn planet() -> PlanetData {
        PlanetData::new(String::from("orbit"), UserId::new()).unwrap()
    }

    #[test]
    fn default_role_takes_slot_zero() {
        let data = planet();
        let default_role = data.role(data.planet_record().default_role_id).unwrap();
        assert!(default_role.is_default);
        assert_eq!(default_role.slot, RoleSlot::new(0));
        assert_eq!(data.slots_in_use(), 1);
    }

    #[test]
    fn deleted_role_slot_is_cleared_on_members_before_reuse() {
        let mut data = planet();
        let role = data.create_role(String::from("moderator"), 5).unwrap();
        let member = data.add_member(UserId::new()).unwrap();
        let bystander = data.add_member(UserId::new()).unwrap();
        assert!(data.grant_role(member.id, role.id).unwrap());

        let channel = data
            .create_channel(String::from("general"), ChannelKind::Chat, None, false)
            .unwrap();
        let key = NodeKey {
            role_id: role.id,
            channel_id: channel.id,
            target_kind: ChannelKind::Chat,
        };
        data.set_node(
            key,
            PermissionNode::empty().with_state(chat::MANAGE_MESSAGES, PermissionState::Granted),
        )
        .unwrap();

        let deletion = data.delete_role(role.id).unwrap();
        assert_eq!(deletion.affected_members, vec![member.id]);
        assert_eq!(deletion.removed_nodes, 1);
        assert!(!data.member(member.id).unwrap().roles.contains(role.slot));
        assert!(data.member(bystander.id).unwrap().roles.is_empty());

        let replacement = data.create_role(String::from("guest"), 9).unwrap();
        assert_eq!(replacement.slot, role.slot);
        assert!(!data.member(member.id).unwrap().roles.contains(replacement.slot));
        assert!(data
            .permission_node(role.id, channel.id, ChannelKind::Chat)
            .is_none());
    }

    #[test]
    fn default_role_cannot_be_deleted_or_revoked() {
        let mut data = planet();
        let default_role_id = data.planet_record().default_role_id;
        let member = data.add_member(UserId::new()).unwrap();
        assert_eq!(
            data.delete_role(default_role_id).unwrap_err(),
            PermissionError::DefaultRoleImmutable
        );
        assert_eq!(
            data.revoke_role(member.id, default_role_id).unwrap_err(),
            PermissionError::DefaultRoleImmutable
        );
    }

    #[test]
    fn role_creation_stops_at_capacity() {
        let mut data = planet();
        for index in 1..MAX_PLANET_ROLES {
            let position = u32::try_from(index).unwrap();
            data.create_role(format!("role-{index}"), position).unwrap();
        }
        assert_eq!(
            data.create_role(String::from("one-too-many"), 0)
                .unwrap_err(),
            PermissionError::CapacityExceeded
        );
    }

    #[test]
    fn channel_moves_reject_cycles() {
        let mut data = planet();
        let category = data
            .create_channel(String::from("lobby"), ChannelKind::Category, None, false)
            .unwrap();
        let chat = data
            .create_channel(
                String::from("general"),
                ChannelKind::Chat,
                Some(category.id),
                true,
            )
            .unwrap();

        let error = data
            .update_channel(
                category.id,
                ChannelUpdate {
                    parent_id: Some(Some(chat.id)),
                    ..ChannelUpdate::default()
                },
            )
            .unwrap_err();
        assert_eq!(
            error,
            PermissionError::InheritanceCycle {
                channel_id: category.id
            }
        );

        let (moved, topology_changed) = data
            .update_channel(
                chat.id,
                ChannelUpdate {
                    parent_id: Some(None),
                    ..ChannelUpdate::default()
                },
            )
            .unwrap();
        assert!(topology_changed);
        assert_eq!(moved.parent_id, None);
        assert!(data
            .create_channel(
                String::from("orphan"),
                ChannelKind::Voice,
                Some(ChannelId::new()),
                true
            )
            .is_err());
    }

    #[test]
    fn deleting_a_channel_drops_its_nodes_once_it_has_no_children() {
        let mut data = planet();
        let default_role_id = data.planet_record().default_role_id;
        let category = data
            .create_channel(String::from("lobby"), ChannelKind::Category, None, false)
            .unwrap();
        let chat = data
            .create_channel(
                String::from("general"),
                ChannelKind::Chat,
                Some(category.id),
                true,
            )
            .unwrap();
        for target_kind in [ChannelKind::Category, ChannelKind::Chat] {
            data.set_node(
                NodeKey {
                    role_id: default_role_id,
                    channel_id: category.id,
                    target_kind,
                },
                PermissionNode::empty().with_state(chat::POST, PermissionState::Denied),
            )
            .unwrap();
        }

        assert_eq!(
            data.delete_channel(category.id).unwrap_err(),
            PermissionError::ChannelHasChildren {
                channel_id: category.id
            }
        );
        data.delete_channel(chat.id).unwrap();

        let deletion = data.delete_channel(category.id).unwrap();
        assert_eq!(deletion.channel.id, category.id);
        assert_eq!(deletion.removed_nodes, 2);
        assert!(data.channel(category.id).is_none());
        assert!(data
            .permission_node(default_role_id, category.id, ChannelKind::Chat)
            .is_none());
        assert_eq!(
            data.delete_channel(category.id).unwrap_err(),
            PermissionError::UnknownChannel
        );
    }

    #[test]
    fn role_update_reports_what_changed() {
        let mut data = planet();
        let role = data.create_role(String::from("helper"), 4).unwrap();
        let edit = data
            .update_role(
                role.id,
                RoleUpdate {
                    name: Some(String::from("helpers")),
                    ..RoleUpdate::default()
                },
            )
            .unwrap();
        assert!(!edit.position_changed);
        assert!(!edit.bits_changed);

        let edit = data
            .update_role(
                role.id,
                RoleUpdate {
                    position: Some(2),
                    is_admin: Some(true),
                    ..RoleUpdate::default()
                },
            )
            .unwrap();
        assert!(edit.position_changed);
        assert!(edit.bits_changed);
    }

    #[test]
    fn duplicate_members_and_owner_removal_are_rejected() {
        let owner = UserId::new();
        let mut data = PlanetData::new(String::from("orbit"), owner).unwrap();
        let owner_member = data.add_member(owner).unwrap();
        assert_eq!(
            data.add_member(owner).unwrap_err(),
            PermissionError::AlreadyMember
        );
        assert_eq!(
            data.remove_member(owner_member.id).unwrap_err(),
            PermissionError::OwnerImmutable
        );
    }
}
