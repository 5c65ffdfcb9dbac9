use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Width of the per-planet role bitset.
pub const MAX_PLANET_ROLES: usize = 256;

const WORDS: usize = MAX_PLANET_ROLES / 64;
const ENCODED_LEN: usize = WORDS * 8;

/// A role's bit position inside a planet's membership bitsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSlot(u8);

impl RoleSlot {
    #[must_use]
    pub const fn new(index: u8) -> Self {
        Self(index)
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    const fn word(self) -> usize {
        (self.0 >> 6) as usize
    }

    const fn bit(self) -> u64 {
        1 << (self.0 & 63)
    }
}

impl TryFrom<usize> for RoleSlot {
    type Error = DomainError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| DomainError::InvalidMembership)
    }
}

impl core::fmt::Display for RoleSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The set of role slots a member holds. Two members with equal sets are
/// permission-equivalent, so the set doubles as a cache key.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RoleMembershipSet([u64; WORDS]);

impl RoleMembershipSet {
    pub const EMPTY: Self = Self([0; WORDS]);

    #[must_use]
    pub const fn from_words(words: [u64; WORDS]) -> Self {
        Self(words)
    }

    #[must_use]
    pub const fn words(&self) -> [u64; WORDS] {
        self.0
    }

    #[must_use]
    pub const fn contains(&self, slot: RoleSlot) -> bool {
        self.0[slot.word()] & slot.bit() != 0
    }

    /// Returns `true` when the slot was not already present.
    pub fn insert(&mut self, slot: RoleSlot) -> bool {
        let present = self.contains(slot);
        self.0[slot.word()] |= slot.bit();
        !present
    }

    /// Returns `true` when the slot was present.
    pub fn remove(&mut self, slot: RoleSlot) -> bool {
        let present = self.contains(slot);
        self.0[slot.word()] &= !slot.bit();
        present
    }

    #[must_use]
    pub fn with(mut self, slot: RoleSlot) -> Self {
        self.insert(slot);
        self
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        let mut words = self.0;
        for (word, other) in words.iter_mut().zip(other.0) {
            *word |= other;
        }
        Self(words)
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut words = self.0;
        for (word, other) in words.iter_mut().zip(other.0) {
            *word &= other;
        }
        Self(words)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    /// Held slots in ascending order.
    #[must_use]
    pub fn iter(&self) -> Slots {
        Slots {
            words: self.0,
            word: 0,
        }
    }

    /// Little-endian, 8 bytes per word, lowest word first.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ENCODED_LEN] {
        let mut bytes = [0_u8; ENCODED_LEN];
        for (chunk, word) in bytes.chunks_exact_mut(8).zip(self.0) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        bytes
    }

    /// # Errors
    /// Returns [`DomainError::InvalidMembership`] unless `bytes` is exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DomainError> {
        if bytes.len() != ENCODED_LEN {
            return Err(DomainError::InvalidMembership);
        }
        let mut words = [0_u64; WORDS];
        for (word, chunk) in words.iter_mut().zip(bytes.chunks_exact(8)) {
            let mut raw = [0_u8; 8];
            raw.copy_from_slice(chunk);
            *word = u64::from_le_bytes(raw);
        }
        Ok(Self(words))
    }
}

impl FromIterator<RoleSlot> for RoleMembershipSet {
    fn from_iter<I: IntoIterator<Item = RoleSlot>>(iter: I) -> Self {
        let mut set = Self::EMPTY;
        for slot in iter {
            set.insert(slot);
        }
        set
    }
}

impl<'a> IntoIterator for &'a RoleMembershipSet {
    type Item = RoleSlot;
    type IntoIter = Slots;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub struct Slots {
    words: [u64; WORDS],
    word: usize,
}

impl Iterator for Slots {
    type Item = RoleSlot;

    fn next(&mut self) -> Option<Self::Item> {
        while self.word < WORDS {
            let bits = self.words[self.word];
            if bits == 0 {
                self.word += 1;
                continue;
            }
            let offset = bits.trailing_zeros() as usize;
            self.words[self.word] &= bits - 1;
            let index = (self.word << 6) + offset;
            return u8::try_from(index).ok().map(RoleSlot);
        }
        None
    }
}
