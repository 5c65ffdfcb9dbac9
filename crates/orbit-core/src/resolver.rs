use crate::{
    authority::roles_of, inheritance::resolve_target, ChannelKind, Permission, PermissionCategory,
    PermissionError, PermissionSet, PermissionSource, PermissionState, Planet, PlanetChannel,
    PlanetMember, PlanetRole,
};

/// Answers single-bit permission questions for members of one planet.
///
/// Every answer is computed from the resident data in `source`; nothing is
/// cached here.
pub struct PermissionResolver<'a, S: ?Sized> {
    source: &'a S,
    planet: &'a Planet,
}

impl<'a, S: PermissionSource + ?Sized> PermissionResolver<'a, S> {
    #[must_use]
    pub const fn new(source: &'a S, planet: &'a Planet) -> Self {
        Self { source, planet }
    }

    /// # Errors
    /// [`PermissionError::CategoryMismatch`] if `permission` does not belong to
    /// the channel's kind; `UnknownMember`/`UnknownChannel` if either record
    /// belongs to another planet.
    pub fn has_permission(
        &self,
        member: &PlanetMember,
        channel: &PlanetChannel,
        permission: Permission,
    ) -> Result<bool, PermissionError> {
        self.state_for(member, channel, permission)
            .map(PermissionState::is_granted)
    }

    /// Resolved state of one bit. Never `Undefined`: a bit nothing defines is
    /// reported as `Denied`.
    ///
    /// # Errors
    /// Same as [`Self::has_permission`].
    pub fn state_for(
        &self,
        member: &PlanetMember,
        channel: &PlanetChannel,
        permission: Permission,
    ) -> Result<PermissionState, PermissionError> {
        let expected = channel.kind.permission_category();
        if permission.category() != expected {
            return Err(PermissionError::CategoryMismatch {
                permission,
                expected,
            });
        }
        self.ensure_scope(member, channel)?;

        if self.is_owner(member) {
            return Ok(PermissionState::Granted);
        }
        let roles = roles_of(self.source, self.planet, member.roles);
        if roles.iter().any(|role| role.is_admin) {
            return Ok(PermissionState::Granted);
        }

        let target = resolve_target(self.source, channel).target;
        if !permission.is_view() {
            let view = self.resolve_bit(&roles, channel.kind, target, expected.view());
            if !view.is_granted() {
                return Ok(PermissionState::Denied);
            }
        }
        Ok(self.resolve_bit(&roles, channel.kind, target, permission))
    }

    /// # Errors
    /// Same as [`Self::has_permission`].
    pub fn can_view(
        &self,
        member: &PlanetMember,
        channel: &PlanetChannel,
    ) -> Result<bool, PermissionError> {
        let view = channel.kind.permission_category().view();
        self.has_permission(member, channel, view)
    }

    /// Planet-wide bits: the union of every held role's general bitfield.
    /// Owners and admins hold everything; `general.view` is always held.
    ///
    /// # Errors
    /// [`PermissionError::UnknownMember`] if the member belongs to another planet.
    pub fn planet_permissions(
        &self,
        member: &PlanetMember,
    ) -> Result<PermissionSet, PermissionError> {
        if member.planet_id != self.planet.id {
            return Err(PermissionError::UnknownMember);
        }
        if self.is_owner(member) {
            return Ok(PermissionSet::all());
        }
        let roles = roles_of(self.source, self.planet, member.roles);
        if roles.iter().any(|role| role.is_admin) {
            return Ok(PermissionSet::all());
        }
        let mut bits = roles
            .iter()
            .fold(PermissionSet::empty(), |bits, role| bits.union(role.permissions));
        bits.insert(PermissionCategory::General.view());
        Ok(bits)
    }

    /// # Errors
    /// [`PermissionError::CategoryMismatch`] for non-`general` permissions.
    pub fn has_planet_permission(
        &self,
        member: &PlanetMember,
        permission: Permission,
    ) -> Result<bool, PermissionError> {
        if permission.category() != PermissionCategory::General {
            return Err(PermissionError::CategoryMismatch {
                permission,
                expected: PermissionCategory::General,
            });
        }
        self.planet_permissions(member)
            .map(|bits| bits.contains(permission))
    }

    fn is_owner(&self, member: &PlanetMember) -> bool {
        member.user_id == self.planet.owner_user_id
    }

    fn ensure_scope(
        &self,
        member: &PlanetMember,
        channel: &PlanetChannel,
    ) -> Result<(), PermissionError> {
        if member.planet_id != self.planet.id {
            return Err(PermissionError::UnknownMember);
        }
        if channel.planet_id != self.planet.id {
            return Err(PermissionError::UnknownChannel);
        }
        Ok(())
    }

    // Strongest role with a defined override wins, then the strongest role's base bits.
    fn resolve_bit(
        &self,
        roles: &[&PlanetRole],
        kind: ChannelKind,
        target: &PlanetChannel,
        permission: Permission,
    ) -> PermissionState {
        for role in roles {
            let Some(node) = self.source.permission_node(role.id, target.id, kind) else {
                continue;
            };
            let state = node.state(permission);
            if state.is_defined() {
                return state;
            }
        }
        match roles.first() {
            Some(strongest) if strongest.base_permissions(kind).contains(permission) => {
                PermissionState::Granted
            }
            _ => PermissionState::Denied,
        }
    }
}
