use crate::{
    ChannelId, ChannelKind, MemberId, PermissionNode, Planet, PlanetChannel, PlanetId,
    PlanetMember, PlanetRole, RoleId, RoleSlot,
};

/// Read access to resident planet data.
///
/// Resolution never fetches: everything a check needs must already be loaded
/// by the caller. A `None` is read as "absent", never as "lookup failed".
pub trait PermissionSource {
    fn planet(&self, planet_id: PlanetId) -> Option<&Planet>;

    fn role(&self, role_id: RoleId) -> Option<&PlanetRole>;

    fn roles_for_planet(&self, planet_id: PlanetId) -> Vec<&PlanetRole>;

    fn role_by_slot(&self, planet_id: PlanetId, slot: RoleSlot) -> Option<&PlanetRole> {
        self.roles_for_planet(planet_id)
            .into_iter()
            .find(|role| role.slot == slot)
    }

    fn member(&self, member_id: MemberId) -> Option<&PlanetMember>;

    fn permission_node(
        &self,
        role_id: RoleId,
        channel_id: ChannelId,
        target_kind: ChannelKind,
    ) -> Option<&PermissionNode>;

    fn channel(&self, channel_id: ChannelId) -> Option<&PlanetChannel>;
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Small in-memory planet used by the core unit tests.

    use std::collections::HashMap;

    use super::PermissionSource;
    use crate::{
        ChannelId, ChannelKind, MemberId, NodeKey, PermissionNode, Planet, PlanetChannel,
        PlanetId, PlanetMember, PlanetRole, RoleId, RoleMembershipSet, RoleSlot, UserId,
    };

    pub(crate) struct Fixture {
        pub(crate) planet: Planet,
        pub(crate) roles: HashMap<RoleId, PlanetRole>,
        pub(crate) members: HashMap<MemberId, PlanetMember>,
        pub(crate) channels: HashMap<ChannelId, PlanetChannel>,
        pub(crate) nodes: HashMap<NodeKey, PermissionNode>,
        next_slot: u8,
    }

    impl Fixture {
        pub(crate) fn new() -> Self {
            let planet_id = PlanetId::new();
            let mut default_role = PlanetRole::with_defaults(
                planet_id,
                String::from("everyone"),
                u32::MAX,
                RoleSlot::new(0),
            );
            default_role.is_default = true;
            let planet = Planet {
                id: planet_id,
                name: String::from("fixture"),
                owner_user_id: UserId::new(),
                default_role_id: default_role.id,
            };
            let mut roles = HashMap::new();
            roles.insert(default_role.id, default_role);
            Self {
                planet,
                roles,
                members: HashMap::new(),
                channels: HashMap::new(),
                nodes: HashMap::new(),
                next_slot: 1,
            }
        }

        pub(crate) fn default_role_id(&self) -> RoleId {
            self.planet.default_role_id
        }

        pub(crate) fn default_role_mut(&mut self) -> &mut PlanetRole {
            let id = self.planet.default_role_id;
            self.roles.get_mut(&id).unwrap()
        }

        pub(crate) fn add_role(&mut self, name: &str, position: u32) -> RoleId {
            let slot = RoleSlot::new(self.next_slot);
            self.next_slot += 1;
            let role = PlanetRole::with_defaults(self.planet.id, name.to_owned(), position, slot);
            let id = role.id;
            self.roles.insert(id, role);
            id
        }

        pub(crate) fn role_mut(&mut self, role_id: RoleId) -> &mut PlanetRole {
            self.roles.get_mut(&role_id).unwrap()
        }

        pub(crate) fn add_member(&mut self, roles: &[RoleId]) -> PlanetMember {
            let mut set = RoleMembershipSet::EMPTY;
            for role_id in roles {
                set.insert(self.roles[role_id].slot);
            }
            let member = PlanetMember {
                id: MemberId::new(),
                planet_id: self.planet.id,
                user_id: UserId::new(),
                roles: set,
            };
            self.members.insert(member.id, member.clone());
            member
        }

        pub(crate) fn owner(&mut self) -> PlanetMember {
            let member = PlanetMember {
                id: MemberId::new(),
                planet_id: self.planet.id,
                user_id: self.planet.owner_user_id,
                roles: RoleMembershipSet::EMPTY,
            };
            self.members.insert(member.id, member.clone());
            member
        }

        pub(crate) fn add_channel(
            &mut self,
            kind: ChannelKind,
            parent_id: Option<ChannelId>,
            inherits_perms: bool,
        ) -> PlanetChannel {
            let channel = PlanetChannel {
                id: ChannelId::new(),
                planet_id: self.planet.id,
                name: String::from("channel"),
                kind,
                parent_id,
                inherits_perms,
            };
            self.channels.insert(channel.id, channel.clone());
            channel
        }

        pub(crate) fn set_node(
            &mut self,
            role_id: RoleId,
            channel_id: ChannelId,
            target_kind: ChannelKind,
            node: PermissionNode,
        ) {
            self.nodes.insert(
                NodeKey {
                    role_id,
                    channel_id,
                    target_kind,
                },
                node,
            );
        }
    }

    impl PermissionSource for Fixture {
        fn planet(&self, planet_id: PlanetId) -> Option<&Planet> {
            (self.planet.id == planet_id).then_some(&self.planet)
        }

        fn role(&self, role_id: RoleId) -> Option<&PlanetRole> {
            self.roles.get(&role_id)
        }

        fn roles_for_planet(&self, planet_id: PlanetId) -> Vec<&PlanetRole> {
            self.roles
                .values()
                .filter(|role| role.planet_id == planet_id)
                .collect()
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
}
