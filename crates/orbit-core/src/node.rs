use serde::{Deserialize, Serialize};

use crate::{ChannelId, ChannelKind, Permission, RoleId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionState {
    Undefined,
    Granted,
    Denied,
}

impl PermissionState {
    #[must_use]
    pub const fn is_defined(self) -> bool {
        !matches!(self, Self::Undefined)
    }

    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Per-bit tri-state override. A cleared `mask` bit means "not specified here";
/// the matching `code` bit is then meaningless and kept at zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PermissionNode {
    code: u64,
    mask: u64,
}

impl PermissionNode {
    #[must_use]
    pub const fn empty() -> Self {
        Self { code: 0, mask: 0 }
    }

    #[must_use]
    pub const fn all_granted() -> Self {
        Self {
            code: u64::MAX,
            mask: u64::MAX,
        }
    }

    #[must_use]
    pub const fn from_parts(code: u64, mask: u64) -> Self {
        Self {
            code: code & mask,
            mask,
        }
    }

    #[must_use]
    pub const fn code(self) -> u64 {
        self.code
    }

    #[must_use]
    pub const fn mask(self) -> u64 {
        self.mask
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.mask == 0
    }

    #[must_use]
    pub const fn state_of_bit(self, bit: u8) -> PermissionState {
        let flag = 1_u64 << bit;
        if self.mask & flag == 0 {
            PermissionState::Undefined
        } else if self.code & flag == 0 {
            PermissionState::Denied
        } else {
            PermissionState::Granted
        }
    }

    #[must_use]
    pub const fn state(self, permission: Permission) -> PermissionState {
        self.state_of_bit(permission.bit())
    }

    pub fn set_state(&mut self, permission: Permission, state: PermissionState) {
        let flag = permission.mask();
        match state {
            PermissionState::Undefined => {
                self.mask &= !flag;
                self.code &= !flag;
            }
            PermissionState::Granted => {
                self.mask |= flag;
                self.code |= flag;
            }
            PermissionState::Denied => {
                self.mask |= flag;
                self.code &= !flag;
            }
        }
    }

    #[must_use]
    pub fn with_state(mut self, permission: Permission, state: PermissionState) -> Self {
        self.set_state(permission, state);
        self
    }

    /// Layers `other` on top: every bit `other` defines replaces ours.
    #[must_use]
    pub const fn overlay(self, other: Self) -> Self {
        Self {
            code: (self.code & !other.mask) | (other.code & other.mask),
            mask: self.mask | other.mask,
        }
    }
}

/// Storage key of a node: one override record per role, channel and target kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    pub role_id: RoleId,
    pub channel_id: ChannelId,
    pub target_kind: ChannelKind,
}
