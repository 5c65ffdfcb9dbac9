use crate::{
    authority::roles_of, inheritance::resolve_target, permission::VIEW_BIT, PermissionError,
    PermissionNode, PermissionSource, PermissionState, Planet, PlanetChannel, PlanetMember,
    RoleMembershipSet,
};

/// Merges every override that applies to a membership set in one channel
/// into a single fully-defined node.
///
/// The result agrees bit for bit with [`crate::PermissionResolver`] for the
/// channel's category, so callers can cache it by membership key.
pub struct Flattener<'a, S: ?Sized> {
    source: &'a S,
    planet: &'a Planet,
}

impl<'a, S: PermissionSource + ?Sized> Flattener<'a, S> {
    #[must_use]
    pub const fn new(source: &'a S, planet: &'a Planet) -> Self {
        Self { source, planet }
    }

    /// Flattened node for a specific member. Owners get every bit.
    ///
    /// # Errors
    /// `UnknownMember`/`UnknownChannel` if either record belongs to another planet.
    pub fn flatten(
        &self,
        member: &PlanetMember,
        channel: &PlanetChannel,
    ) -> Result<PermissionNode, PermissionError> {
        if member.planet_id != self.planet.id {
            return Err(PermissionError::UnknownMember);
        }
        if member.user_id == self.planet.owner_user_id {
            return Ok(PermissionNode::all_granted());
        }
        self.flatten_roles(member.roles, channel)
    }

    /// Flattened node for whoever holds exactly `membership`.
    ///
    /// # Errors
    /// [`PermissionError::UnknownChannel`] if the channel belongs to another planet.
    pub fn flatten_roles(
        &self,
        membership: RoleMembershipSet,
        channel: &PlanetChannel,
    ) -> Result<PermissionNode, PermissionError> {
        if channel.planet_id != self.planet.id {
            return Err(PermissionError::UnknownChannel);
        }
        let roles = roles_of(self.source, self.planet, membership);
        if roles.iter().any(|role| role.is_admin) {
            return Ok(PermissionNode::all_granted());
        }

        let kind = channel.kind;
        let target = resolve_target(self.source, channel).target;
        let base = roles
            .first()
            .map_or(0, |strongest| strongest.base_permissions(kind).bits());

        let merged = roles
            .iter()
            .rev()
            .filter_map(|role| self.source.permission_node(role.id, target.id, kind))
            .fold(PermissionNode::from_parts(base, u64::MAX), |merged, node| {
                merged.overlay(*node)
            });

        if merged.state_of_bit(VIEW_BIT) == PermissionState::Granted {
            Ok(merged)
        } else {
            Ok(PermissionNode::from_parts(0, u64::MAX))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Flattener;
    use crate::permission::{chat, voice};
    use crate::source::fixture::Fixture;
    use crate::{
        ChannelKind, PermissionNode, PermissionResolver, PermissionState, PlanetChannel,
        PlanetMember,
    };

    fn assert_matches_resolver(fixture: &Fixture, member: &PlanetMember, channel: &PlanetChannel) {
        let flattened = Flattener::new(fixture, &fixture.planet)
            .flatten(member, channel)
            .unwrap();
        let resolver = PermissionResolver::new(fixture, &fixture.planet);
        assert_eq!(flattened.mask(), u64::MAX);
        for permission in channel.kind.permission_category().catalog() {
            assert_eq!(
                flattened.state(*permission).is_granted(),
                resolver.has_permission(member, channel, *permission).unwrap(),
                "{permission}"
            );
        }
    }

    #[test]
    fn flattened_node_agrees_with_the_resolver() {
        let mut fixture = Fixture::new();
        let category = fixture.add_channel(ChannelKind::Category, None, false);
        let channel = fixture.add_channel(ChannelKind::Chat, Some(category.id), true);
        let strong = fixture.add_role("strong", 1);
        let weak = fixture.add_role("weak", 8);
        fixture.set_node(
            weak,
            category.id,
            ChannelKind::Chat,
            PermissionNode::empty()
                .with_state(chat::EMBED, PermissionState::Granted)
                .with_state(chat::POST, PermissionState::Denied),
        );
        fixture.set_node(
            strong,
            category.id,
            ChannelKind::Chat,
            PermissionNode::empty().with_state(chat::POST, PermissionState::Granted),
        );
        let both = fixture.add_member(&[strong, weak]);
        let weak_only = fixture.add_member(&[weak]);
        let nobody = fixture.add_member(&[]);

        for member in [&both, &weak_only, &nobody] {
            assert_matches_resolver(&fixture, member, &channel);
            assert_matches_resolver(&fixture, member, &category);
        }
        let flattened = Flattener::new(&fixture, &fixture.planet)
            .flatten(&both, &channel)
            .unwrap();
        assert!(flattened.state(chat::POST).is_granted());
        assert!(flattened.state(chat::EMBED).is_granted());
    }

    #[test]
    fn hidden_channel_flattens_to_all_denied() {
        let mut fixture = Fixture::new();
        let channel = fixture.add_channel(ChannelKind::Voice, None, false);
        let default_role = fixture.default_role_id();
        fixture.set_node(
            default_role,
            channel.id,
            ChannelKind::Voice,
            PermissionNode::empty()
                .with_state(voice::VIEW, PermissionState::Denied)
                .with_state(voice::SPEAK, PermissionState::Granted),
        );
        let member = fixture.add_member(&[]);

        let flattened = Flattener::new(&fixture, &fixture.planet)
            .flatten(&member, &channel)
            .unwrap();
        assert_eq!(flattened, PermissionNode::from_parts(0, u64::MAX));
        assert_matches_resolver(&fixture, &member, &channel);
    }

    #[test]
    fn owner_and_admin_flatten_to_everything() {
        let mut fixture = Fixture::new();
        let channel = fixture.add_channel(ChannelKind::Chat, None, false);
        let admin = fixture.add_role("admin", 0);
        fixture.role_mut(admin).is_admin = true;
        let owner = fixture.owner();
        let admin_member = fixture.add_member(&[admin]);

        let flattener = Flattener::new(&fixture, &fixture.planet);
        assert_eq!(
            flattener.flatten(&owner, &channel).unwrap(),
            PermissionNode::all_granted()
        );
        assert_eq!(
            flattener.flatten(&admin_member, &channel).unwrap(),
            PermissionNode::all_granted()
        );
    }

    #[test]
    fn members_with_equal_role_sets_flatten_identically() {
        let mut fixture = Fixture::new();
        let channel = fixture.add_channel(ChannelKind::Chat, None, false);
        let muted = fixture.add_role("Muted", 10);
        fixture.set_node(
            muted,
            channel.id,
            ChannelKind::Chat,
            PermissionNode::empty().with_state(chat::POST, PermissionState::Denied),
        );
        let first = fixture.add_member(&[muted]);
        let second = fixture.add_member(&[muted]);
        assert_eq!(first.roles, second.roles);

        let flattener = Flattener::new(&fixture, &fixture.planet);
        let a = flattener.flatten(&first, &channel).unwrap();
        let b = flattener.flatten(&second, &channel).unwrap();
        assert_eq!(a, b);
        assert!(a.state(chat::VIEW).is_granted());
        assert!(!a.state(chat::POST).is_granted());
    }
}
