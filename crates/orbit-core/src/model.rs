use crate::{
    ChannelId, ChannelKind, MemberId, PermissionCategory, PermissionSet, PlanetId, RoleId,
    RoleMembershipSet, RoleSlot, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Planet {
    pub id: PlanetId,
    pub name: String,
    pub owner_user_id: UserId,
    pub default_role_id: RoleId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanetRole {
    pub id: RoleId,
    pub planet_id: PlanetId,
    pub name: String,
    /// Lower is stronger.
    pub position: u32,
    pub slot: RoleSlot,
    pub is_admin: bool,
    pub is_default: bool,
    pub permissions: PermissionSet,
    pub chat_permissions: PermissionSet,
    pub category_permissions: PermissionSet,
    pub voice_permissions: PermissionSet,
}

impl PlanetRole {
    /// A role carrying the catalog default bits for every category.
    #[must_use]
    pub fn with_defaults(planet_id: PlanetId, name: String, position: u32, slot: RoleSlot) -> Self {
        Self {
            id: RoleId::new(),
            planet_id,
            name,
            position,
            slot,
            is_admin: false,
            is_default: false,
            permissions: PermissionCategory::General.default_bits(),
            chat_permissions: PermissionCategory::Chat.default_bits(),
            category_permissions: PermissionCategory::Category.default_bits(),
            voice_permissions: PermissionCategory::Voice.default_bits(),
        }
    }

    #[must_use]
    pub const fn base_permissions(&self, kind: ChannelKind) -> PermissionSet {
        match kind {
            ChannelKind::Chat => self.chat_permissions,
            ChannelKind::Category => self.category_permissions,
            ChannelKind::Voice => self.voice_permissions,
        }
    }

    #[must_use]
    pub const fn category_permissions_for(&self, category: PermissionCategory) -> PermissionSet {
        match category {
            PermissionCategory::General => self.permissions,
            PermissionCategory::Chat => self.chat_permissions,
            PermissionCategory::Category => self.category_permissions,
            PermissionCategory::Voice => self.voice_permissions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanetMember {
    pub id: MemberId,
    pub planet_id: PlanetId,
    pub user_id: UserId,
    pub roles: RoleMembershipSet,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanetChannel {
    pub id: ChannelId,
    pub planet_id: PlanetId,
    pub name: String,
    pub kind: ChannelKind,
    pub parent_id: Option<ChannelId>,
    pub inherits_perms: bool,
}
