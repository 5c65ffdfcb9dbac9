#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub mod allocator;
pub mod authority;
pub mod flatten;
pub mod inheritance;
pub mod membership;
pub mod model;
pub mod node;
pub mod permission;
pub mod resolver;
pub mod source;

pub use allocator::RoleIndexAllocator;
pub use authority::{effective_membership, member_authority, roles_of, Authority};
pub use flatten::Flattener;
pub use inheritance::{resolve_target, validate_parent, ResolvedTarget, MAX_INHERITANCE_DEPTH};
pub use membership::{RoleMembershipSet, RoleSlot, MAX_PLANET_ROLES};
pub use model::{Planet, PlanetChannel, PlanetMember, PlanetRole};
pub use node::{NodeKey, PermissionNode, PermissionState};
pub use permission::{ChannelKind, Permission, PermissionCategory, PermissionSet};
pub use resolver::PermissionResolver;
pub use source::PermissionSource;

/// Returns the project code name.
#[must_use]
pub const fn project_name() -> &'static str {
    "orbit"
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("name is invalid")]
    InvalidName,
    #[error("channel kind is invalid")]
    InvalidChannelKind,
    #[error("permission is invalid")]
    InvalidPermission,
    #[error("identifier is invalid")]
    InvalidId,
    #[error("role membership encoding is invalid")]
    InvalidMembership,
}

/// Failures raised by permission resolution and role bookkeeping.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PermissionError {
    #[error("planet already holds the maximum of 256 roles")]
    CapacityExceeded,
    #[error("role slot {0} is already allocated")]
    SlotInUse(RoleSlot),
    #[error("permission `{permission}` does not belong to the {expected} category")]
    CategoryMismatch {
        permission: Permission,
        expected: PermissionCategory,
    },
    #[error("channel {channel_id} references missing parent {parent_id}")]
    DanglingParent {
        channel_id: ChannelId,
        parent_id: ChannelId,
    },
    #[error("channel {channel_id} is part of an inheritance cycle")]
    InheritanceCycle { channel_id: ChannelId },
    #[error("planet not found")]
    UnknownPlanet,
    #[error("member not found")]
    UnknownMember,
    #[error("channel not found")]
    UnknownChannel,
    #[error("role not found")]
    UnknownRole,
    #[error("user is already a member of this planet")]
    AlreadyMember,
    #[error("the planet owner cannot be removed")]
    OwnerImmutable,
    #[error("the default role cannot be deleted")]
    DefaultRoleImmutable,
    #[error("channel {channel_id} still has child channels")]
    ChannelHasChildren { channel_id: ChannelId },
}

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Ulid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl core::str::FromStr for $name {
            type Err = DomainError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let parsed = Ulid::from_string(value).map_err(|_| DomainError::InvalidId)?;
                Ok(Self(parsed))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.to_string()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(
    /// Identifies a community (planet).
    PlanetId
);
ulid_id!(RoleId);
ulid_id!(
    /// Identifies one user's membership in one planet.
    MemberId
);
ulid_id!(ChannelId);
ulid_id!(UserId);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlanetName(String);

impl PlanetName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PlanetName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_name(&value, 1, 64)?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelName(String);

impl ChannelName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChannelName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_name(&value, 1, 64)?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleName(String);

impl RoleName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoleName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_name(&value, 1, 32)?;
        Ok(Self(value))
    }
}

fn validate_name(value: &str, min: usize, max: usize) -> Result<(), DomainError> {
    if !(min..=max).contains(&value.len()) {
        return Err(DomainError::InvalidName);
    }

    if value.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        return Ok(());
    }

    Err(DomainError::InvalidName)
}
