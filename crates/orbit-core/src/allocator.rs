use crate::{PermissionError, RoleMembershipSet, RoleSlot, MAX_PLANET_ROLES};

/// Hands out role slots for one planet. Slots are reused once released.
#[derive(Debug, Clone, Default)]
pub struct RoleIndexAllocator {
    used: RoleMembershipSet,
}

impl RoleIndexAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the allocator from slots already held by existing roles.
    #[must_use]
    pub fn from_slots<I: IntoIterator<Item = RoleSlot>>(slots: I) -> Self {
        Self {
            used: slots.into_iter().collect(),
        }
    }

    /// Claims the lowest free slot.
    ///
    /// # Errors
    /// Returns [`PermissionError::CapacityExceeded`] when all 256 slots are taken.
    pub fn allocate(&mut self) -> Result<RoleSlot, PermissionError> {
        let slot = (0..MAX_PLANET_ROLES)
            .filter_map(|index| RoleSlot::try_from(index).ok())
            .find(|slot| !self.used.contains(*slot))
            .ok_or(PermissionError::CapacityExceeded)?;
        self.used.insert(slot);
        Ok(slot)
    }

    /// Claims a specific slot.
    ///
    /// # Errors
    /// Returns [`PermissionError::SlotInUse`] if the slot is already held.
    pub fn reserve(&mut self, slot: RoleSlot) -> Result<(), PermissionError> {
        if self.used.insert(slot) {
            Ok(())
        } else {
            Err(PermissionError::SlotInUse(slot))
        }
    }

    /// Returns `true` if the slot was held. Releasing a free slot is a no-op.
    pub fn release(&mut self, slot: RoleSlot) -> bool {
        self.used.remove(slot)
    }

    #[must_use]
    pub fn is_allocated(&self, slot: RoleSlot) -> bool {
        self.used.contains(slot)
    }

    #[must_use]
    pub fn in_use(&self) -> usize {
        self.used.len()
    }
}
