//! Fixed-size, type-indexed hook storage.
//!
//! A [`HookTable`] holds one hook per block type. Every slot is always a
//! callable value: the table is filled with defaults by
//! [`HookTable::initialize_defaults`] and emptied again by
//! [`HookTable::teardown`]. The table does no synchronization of its own;
//! mutation goes through `&mut self`, so installs are serialized by whoever
//! owns the table.

use crate::error::TableError;
use crate::types::BLOCK_TYPE_COUNT;

/// Per-block-type storage for validators or notifiers.
pub struct HookTable<H> {
    slots: Vec<H>,
    make_default: fn() -> H,
}

impl<H> HookTable<H> {
    /// Creates an uninitialized table whose slots will be filled by
    /// `make_default` when [`initialize_defaults`](Self::initialize_defaults)
    /// runs.
    pub fn new(make_default: fn() -> H) -> Self {
        Self {
            slots: Vec::new(),
            make_default,
        }
    }

    /// Fills every slot with a freshly constructed default hook.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::AlreadyInitialized`] if the table is live; the
    /// existing slots are left untouched.
    pub fn initialize_defaults(&mut self) -> Result<(), TableError> {
        if self.is_initialized() {
            return Err(TableError::AlreadyInitialized);
        }

        let make_default = self.make_default;
        self.slots.reserve_exact(BLOCK_TYPE_COUNT);
        self.slots.extend((0..BLOCK_TYPE_COUNT).map(|_| make_default()));
        Ok(())
    }

    /// Destroys every slot, lowest block type first.
    ///
    /// Tearing down an uninitialized table does nothing.
    pub fn teardown(&mut self) {
        for hook in self.slots.drain(..) {
            drop(hook);
        }
    }

    pub fn is_initialized(&self) -> bool {
        !self.slots.is_empty()
    }

    /// Replaces the hook for `block_type`, returning the hook it displaced.
    pub fn install(&mut self, block_type: usize, hook: H) -> Result<H, TableError> {
        let slot = self.slot_mut(block_type)?;
        Ok(std::mem::replace(slot, hook))
    }

    /// Returns the hook currently installed for `block_type`.
    pub fn get(&self, block_type: usize) -> Result<&H, TableError> {
        if block_type >= BLOCK_TYPE_COUNT {
            return Err(TableError::OutOfDomain(block_type));
        }
        self.slots.get(block_type).ok_or(TableError::Uninitialized)
    }

    fn slot_mut(&mut self, block_type: usize) -> Result<&mut H, TableError> {
        if block_type >= BLOCK_TYPE_COUNT {
            return Err(TableError::OutOfDomain(block_type));
        }
        self.slots
            .get_mut(block_type)
            .ok_or(TableError::Uninitialized)
    }
}

impl<H> std::fmt::Debug for HookTable<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookTable")
            .field("slots", &self.slots.len())
            .finish()
    }
}
