use crate::{PermissionSource, Planet, PlanetMember, PlanetRole, RoleMembershipSet};

/// The member's held slots with the planet's default role added.
///
/// Members hold the default role implicitly, so every derived key carries
/// its slot whether or not it was stored.
#[must_use]
pub fn effective_membership<S: PermissionSource + ?Sized>(
    source: &S,
    planet: &Planet,
    membership: RoleMembershipSet,
) -> RoleMembershipSet {
    match source.role(planet.default_role_id) {
        Some(default_role) => membership.with(default_role.slot),
        None => membership,
    }
}

/// Roles behind a membership set, strongest first.
///
/// Ordered by `(position, id)`. Slots with no matching role are skipped.
#[must_use]
pub fn roles_of<'a, S: PermissionSource + ?Sized>(
    source: &'a S,
    planet: &Planet,
    membership: RoleMembershipSet,
) -> Vec<&'a PlanetRole> {
    let membership = effective_membership(source, planet, membership);
    let mut roles: Vec<&PlanetRole> = Vec::with_capacity(membership.len());
    for slot in &membership {
        if let Some(role) = source.role_by_slot(planet.id, slot) {
            roles.push(role);
        } else {
            tracing::warn!(
                event = "authority.roles_of",
                outcome = "stale_slot",
                planet_id = %planet.id,
                slot = %slot,
            );
        }
    }
    roles.sort_by(|left, right| (left.position, left.id).cmp(&(right.position, right.id)));
    roles
}

/// How strongly a member ranks inside its planet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authority {
    Owner,
    /// Position of the strongest held role.
    Position(u32),
}

impl Authority {
    /// `true` when `self` is strictly stronger than `other`.
    #[must_use]
    pub const fn outranks(self, other: Self) -> bool {
        match (self, other) {
            (Self::Owner, Self::Owner) | (Self::Position(_), Self::Owner) => false,
            (Self::Owner, Self::Position(_)) => true,
            (Self::Position(mine), Self::Position(theirs)) => mine < theirs,
        }
    }

    /// Whether a member with this authority may edit a role at `position`.
    #[must_use]
    pub const fn can_manage_position(self, position: u32) -> bool {
        self.outranks(Self::Position(position))
    }
}

#[must_use]
pub fn member_authority<S: PermissionSource + ?Sized>(
    source: &S,
    planet: &Planet,
    member: &PlanetMember,
) -> Authority {
    if member.user_id == planet.owner_user_id {
        return Authority::Owner;
    }
    roles_of(source, planet, member.roles)
        .first()
        .map_or(Authority::Position(u32::MAX), |role| {
            Authority::Position(role.position)
        })
}
