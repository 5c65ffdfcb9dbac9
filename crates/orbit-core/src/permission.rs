//! Permission catalog: one bitfield per category, one category per channel kind
//! plus the planet-wide `general` category.
//!
//! Bit positions are persisted; never renumber an existing permission.

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Bit shared by every channel category; no other channel permission is
/// granted without it.
pub const VIEW_BIT: u8 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Chat,
    Category,
    Voice,
}

impl ChannelKind {
    pub const ALL: [Self; 3] = [Self::Chat, Self::Category, Self::Voice];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Category => "category",
            Self::Voice => "voice",
        }
    }

    #[must_use]
    pub const fn permission_category(self) -> PermissionCategory {
        match self {
            Self::Chat => PermissionCategory::Chat,
            Self::Category => PermissionCategory::Category,
            Self::Voice => PermissionCategory::Voice,
        }
    }
}

impl TryFrom<String> for ChannelKind {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "chat" => Ok(Self::Chat),
            "category" => Ok(Self::Category),
            "voice" => Ok(Self::Voice),
            _ => Err(DomainError::InvalidChannelKind),
        }
    }
}

impl core::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    General,
    Chat,
    Category,
    Voice,
}

impl PermissionCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Chat => "chat",
            Self::Category => "category",
            Self::Voice => "voice",
        }
    }

    /// Every known permission in this category, in bit order.
    #[must_use]
    pub fn catalog(self) -> &'static [Permission] {
        match self {
            Self::General => &general::ALL,
            Self::Chat => &chat::ALL,
            Self::Category => &category::ALL,
            Self::Voice => &voice::ALL,
        }
    }

    /// Base bits a freshly created role receives for this category.
    #[must_use]
    pub const fn default_bits(self) -> PermissionSet {
        match self {
            Self::General => general::DEFAULT,
            Self::Chat => chat::DEFAULT,
            Self::Category => category::DEFAULT,
            Self::Voice => voice::DEFAULT,
        }
    }

    #[must_use]
    pub const fn view(self) -> Permission {
        match self {
            Self::General => general::VIEW,
            Self::Chat => chat::VIEW,
            Self::Category => category::VIEW,
            Self::Voice => voice::VIEW,
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "general" => Some(Self::General),
            "chat" => Some(Self::Chat),
            "category" => Some(Self::Category),
            "voice" => Some(Self::Voice),
            _ => None,
        }
    }
}

impl core::fmt::Display for PermissionCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single permission bit tagged with its category. Rendered as
/// `category.name`, e.g. `chat.post`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct Permission {
    category: PermissionCategory,
    bit: u8,
    name: &'static str,
}

impl Permission {
    const fn new(category: PermissionCategory, bit: u8, name: &'static str) -> Self {
        Self {
            category,
            bit,
            name,
        }
    }

    #[must_use]
    pub const fn category(self) -> PermissionCategory {
        self.category
    }

    #[must_use]
    pub const fn bit(self) -> u8 {
        self.bit
    }

    #[must_use]
    pub const fn mask(self) -> u64 {
        1 << self.bit
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn is_view(self) -> bool {
        self.bit == VIEW_BIT
    }
}

impl core::str::FromStr for Permission {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (category, name) = value
            .split_once('.')
            .ok_or(DomainError::InvalidPermission)?;
        let category = PermissionCategory::parse(category).ok_or(DomainError::InvalidPermission)?;
        category
            .catalog()
            .iter()
            .copied()
            .find(|permission| permission.name == name)
            .ok_or(DomainError::InvalidPermission)
    }
}

impl TryFrom<String> for Permission {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::try_from(value).map_err(serde::de::Error::custom)
    }
}

impl From<Permission> for String {
    fn from(value: Permission) -> Self {
        value.to_string()
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.category, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(u64);

impl PermissionSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Full control: every bit, known or not.
    #[must_use]
    pub const fn all() -> Self {
        Self(u64::MAX)
    }

    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    #[must_use]
    pub const fn contains(self, permission: Permission) -> bool {
        self.0 & permission.mask() != 0
    }

    pub fn insert(&mut self, permission: Permission) {
        self.0 |= permission.mask();
    }

    pub fn remove(&mut self, permission: Permission) {
        self.0 &= !permission.mask();
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Names of the catalog permissions present in this set.
    #[must_use]
    pub fn names(self, category: PermissionCategory) -> Vec<String> {
        category
            .catalog()
            .iter()
            .filter(|permission| self.contains(**permission))
            .map(ToString::to_string)
            .collect()
    }
}

const fn code(permissions: &[Permission]) -> PermissionSet {
    let mut bits = 0;
    let mut i = 0;
    while i < permissions.len() {
        bits |= permissions[i].mask();
        i += 1;
    }
    PermissionSet::from_bits(bits)
}

/// Planet-wide permissions, not tied to a channel.
pub mod general {
    use super::{code, Permission, PermissionCategory::General, PermissionSet};

    pub const VIEW: Permission = Permission::new(General, 0, "view");
    pub const INVITE: Permission = Permission::new(General, 1, "invite");
    pub const DISPLAY_ROLE: Permission = Permission::new(General, 2, "display_role");
    pub const MANAGE: Permission = Permission::new(General, 3, "manage");
    pub const KICK: Permission = Permission::new(General, 4, "kick");
    pub const BAN: Permission = Permission::new(General, 5, "ban");
    pub const CREATE_CHANNELS: Permission = Permission::new(General, 6, "create_channels");
    pub const MANAGE_ROLES: Permission = Permission::new(General, 7, "manage_roles");
    pub const USE_ECONOMY: Permission = Permission::new(General, 8, "use_economy");
    pub const MANAGE_CURRENCY: Permission = Permission::new(General, 9, "manage_currency");
    pub const MANAGE_ECO_ACCOUNTS: Permission =
        Permission::new(General, 10, "manage_eco_accounts");
    pub const FORCE_TRANSACTIONS: Permission =
        Permission::new(General, 11, "force_transactions");
    pub const MENTION_ALL: Permission = Permission::new(General, 12, "mention_all");

    pub const ALL: [Permission; 13] = [
        VIEW,
        INVITE,
        DISPLAY_ROLE,
        MANAGE,
        KICK,
        BAN,
        CREATE_CHANNELS,
        MANAGE_ROLES,
        USE_ECONOMY,
        MANAGE_CURRENCY,
        MANAGE_ECO_ACCOUNTS,
        FORCE_TRANSACTIONS,
        MENTION_ALL,
    ];

    pub const DEFAULT: PermissionSet = code(&[VIEW, USE_ECONOMY]);
}

pub mod chat {
    use super::{code, Permission, PermissionCategory::Chat, PermissionSet};

    pub const VIEW: Permission = Permission::new(Chat, 0, "view");
    pub const VIEW_MESSAGES: Permission = Permission::new(Chat, 1, "view_messages");
    pub const POST: Permission = Permission::new(Chat, 2, "post");
    pub const MANAGE: Permission = Permission::new(Chat, 3, "manage");
    pub const MANAGE_PERMISSIONS: Permission = Permission::new(Chat, 4, "manage_permissions");
    pub const EMBED: Permission = Permission::new(Chat, 5, "embed");
    pub const ATTACH_CONTENT: Permission = Permission::new(Chat, 6, "attach_content");
    pub const MANAGE_MESSAGES: Permission = Permission::new(Chat, 7, "manage_messages");
    pub const USE_ECONOMY: Permission = Permission::new(Chat, 8, "use_economy");

    pub const ALL: [Permission; 9] = [
        VIEW,
        VIEW_MESSAGES,
        POST,
        MANAGE,
        MANAGE_PERMISSIONS,
        EMBED,
        ATTACH_CONTENT,
        MANAGE_MESSAGES,
        USE_ECONOMY,
    ];

    pub const DEFAULT: PermissionSet = code(&[VIEW, VIEW_MESSAGES, POST]);
}

pub mod category {
    use super::{code, Permission, PermissionCategory::Category, PermissionSet};

    pub const VIEW: Permission = Permission::new(Category, 0, "view");
    pub const MANAGE: Permission = Permission::new(Category, 3, "manage");
    pub const MANAGE_PERMISSIONS: Permission =
        Permission::new(Category, 4, "manage_permissions");

    pub const ALL: [Permission; 3] = [VIEW, MANAGE, MANAGE_PERMISSIONS];

    pub const DEFAULT: PermissionSet = code(&[VIEW]);
}

pub mod voice {
    use super::{code, Permission, PermissionCategory::Voice, PermissionSet};

    pub const VIEW: Permission = Permission::new(Voice, 0, "view");
    pub const JOIN: Permission = Permission::new(Voice, 1, "join");
    pub const SPEAK: Permission = Permission::new(Voice, 2, "speak");
    pub const MANAGE: Permission = Permission::new(Voice, 3, "manage");
    pub const MANAGE_PERMISSIONS: Permission = Permission::new(Voice, 4, "manage_permissions");

    pub const ALL: [Permission; 5] = [VIEW, JOIN, SPEAK, MANAGE, MANAGE_PERMISSIONS];

    pub const DEFAULT: PermissionSet = code(&[VIEW, JOIN, SPEAK]);
}

#[cfg(test)]
mod tests {
    use super::{
        category, chat, general, voice, ChannelKind, Permission, PermissionCategory, PermissionSet,
    };
    use crate::DomainError;

    #[test]
    fn permission_names_round_trip_through_strings() {
        let parsed: Permission = "chat.post".parse().unwrap();
        assert_eq!(parsed, chat::POST);
        assert_eq!(voice::SPEAK.to_string(), "voice.speak");
        assert_eq!(
            "chat.fly".parse::<Permission>().unwrap_err(),
            DomainError::InvalidPermission
        );
        assert_eq!(
            "post".parse::<Permission>().unwrap_err(),
            DomainError::InvalidPermission
        );
        // same name, different category
        assert_ne!("voice.view".parse::<Permission>().unwrap(), chat::VIEW);
    }

    #[test]
    fn catalog_bits_are_unique_within_each_category() {
        for category in [
            PermissionCategory::General,
            PermissionCategory::Chat,
            PermissionCategory::Category,
            PermissionCategory::Voice,
        ] {
            let mut seen = 0_u64;
            for permission in category.catalog() {
                assert_eq!(permission.category(), category);
                assert_eq!(seen & permission.mask(), 0, "{permission} reuses a bit");
                seen |= permission.mask();
            }
            assert!(category.view().is_view());
        }
    }

    #[test]
    fn defaults_match_role_creation_matrix() {
        assert!(chat::DEFAULT.contains(chat::VIEW));
        assert!(chat::DEFAULT.contains(chat::POST));
        assert!(!chat::DEFAULT.contains(chat::MANAGE_MESSAGES));
        assert!(category::DEFAULT.contains(category::VIEW));
        assert!(!category::DEFAULT.contains(category::MANAGE));
        assert!(voice::DEFAULT.contains(voice::SPEAK));
        assert!(general::DEFAULT.contains(general::USE_ECONOMY));
        assert!(!general::DEFAULT.contains(general::BAN));
    }

    #[test]
    fn channel_kind_enforces_allowed_values() {
        assert_eq!(
            ChannelKind::try_from(String::from("voice")).unwrap(),
            ChannelKind::Voice
        );
        assert_eq!(
            ChannelKind::try_from(String::from("video")).unwrap_err(),
            DomainError::InvalidChannelKind
        );
        assert_eq!(
            ChannelKind::Category.permission_category(),
            PermissionCategory::Category
        );
    }

    #[test]
    fn permission_set_insert_remove_and_names() {
        let mut set = PermissionSet::empty();
        set.insert(chat::POST);
        set.insert(chat::EMBED);
        set.remove(chat::EMBED);
        assert!(set.contains(chat::POST));
        assert!(!set.contains(chat::EMBED));
        assert_eq!(set.names(PermissionCategory::Chat), vec![String::from("chat.post")]);
        assert!(PermissionSet::all().contains(general::MENTION_ALL));
    }
}
