//! The gate → commit → notify protocol for block mutations.
//!
//! Every block change passes through [`WorldEvents::try_set`]:
//!
//! 1. **Gate**: the global `can_set` validator, then `can_replace` for the
//!    type being removed, then `can_place` for the type being placed. The
//!    first refusal wins. A validator that returns an error or panics counts
//!    as a refusal.
//! 2. **Commit**: the caller's mutation runs, only if the gate approved.
//! 3. **Notify**: the global `on_set` notifier, then `on_replace` for the old
//!    type, then `on_place` for the new type. Notifier failures are returned
//!    to the caller; they are never swallowed.

use crate::error::{DispatchError, HookError, TableError};
use crate::table::HookTable;
use crate::types::{Block, BlockId};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Decides whether a mutation from one block to another is legal.
pub type Validator = Box<dyn Fn(BlockId, Block, Block) -> Result<bool, HookError> + Send + Sync>;

/// Observes a mutation that has been approved and committed.
pub type Notifier = Box<dyn Fn(BlockId, Block, Block) -> Result<(), HookError> + Send + Sync>;

fn allow_all() -> Validator {
    Box::new(|_, _, _| Ok(true))
}

fn ignore_all() -> Notifier {
    Box::new(|_, _, _| Ok(()))
}

/// Validator and notifier hooks for every block type, plus the global pair.
///
/// Hooks are installed through `&mut self` during the install phase. Once
/// [`seal`](Self::seal) has been called the tables are read-only and the
/// value is typically shared behind an `Arc` with every worker.
pub struct WorldEvents {
    can_set: Validator,
    on_set: Notifier,
    can_replace: HookTable<Validator>,
    can_place: HookTable<Validator>,
    on_replace: HookTable<Notifier>,
    on_place: HookTable<Notifier>,
    sealed: bool,
}

impl WorldEvents {
    /// Creates a dispatcher whose every slot approves and ignores mutations.
    pub fn new() -> Self {
        let mut events = Self {
            can_set: allow_all(),
            on_set: ignore_all(),
            can_replace: HookTable::new(allow_all),
            can_place: HookTable::new(allow_all),
            on_replace: HookTable::new(ignore_all),
            on_place: HookTable::new(ignore_all),
            sealed: false,
        };
        events.initialize_defaults();
        events
    }

    fn initialize_defaults(&mut self) {
        // Fresh tables cannot already be initialized.
        let _ = self.on_replace.initialize_defaults();
        let _ = self.on_place.initialize_defaults();
        let _ = self.can_replace.initialize_defaults();
        let _ = self.can_place.initialize_defaults();
    }

    /// Destroys every per-type hook. After teardown the gate refuses all
    /// mutations and the notify phase reports [`TableError::Uninitialized`].
    pub fn teardown(&mut self) {
        self.on_replace.teardown();
        self.on_place.teardown();
        self.can_replace.teardown();
        self.can_place.teardown();
    }

    /// Ends the install phase. Every later install fails with
    /// [`TableError::Sealed`].
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    fn ensure_open(&self) -> Result<(), TableError> {
        if self.sealed {
            Err(TableError::Sealed)
        } else {
            Ok(())
        }
    }

    /// Installs the global validator consulted before any per-type check.
    pub fn set_can_set<F>(&mut self, validator: F) -> Result<(), TableError>
    where
        F: Fn(BlockId, Block, Block) -> Result<bool, HookError> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.can_set = Box::new(validator);
        Ok(())
    }

    /// Installs the global notifier fired first for every approved mutation.
    pub fn set_on_set<F>(&mut self, notifier: F) -> Result<(), TableError>
    where
        F: Fn(BlockId, Block, Block) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        self.on_set = Box::new(notifier);
        Ok(())
    }

    /// Installs the validator asked whether a block of `block_type` may be replaced.
    pub fn install_can_replace<F>(&mut self, block_type: usize, validator: F) -> Result<(), TableError>
    where
        F: Fn(BlockId, Block, Block) -> Result<bool, HookError> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let _previous = self.can_replace.install(block_type, Box::new(validator))?;
        Ok(())
    }

    /// Installs the validator asked whether a block of `block_type` may be placed.
    pub fn install_can_place<F>(&mut self, block_type: usize, validator: F) -> Result<(), TableError>
    where
        F: Fn(BlockId, Block, Block) -> Result<bool, HookError> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let _previous = self.can_place.install(block_type, Box::new(validator))?;
        Ok(())
    }

    /// Installs the notifier fired after a block of `block_type` was replaced.
    pub fn install_on_replace<F>(&mut self, block_type: usize, notifier: F) -> Result<(), TableError>
    where
        F: Fn(BlockId, Block, Block) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let _previous = self.on_replace.install(block_type, Box::new(notifier))?;
        Ok(())
    }

    /// Installs the notifier fired after a block of `block_type` was placed.
    pub fn install_on_place<F>(&mut self, block_type: usize, notifier: F) -> Result<(), TableError>
    where
        F: Fn(BlockId, Block, Block) -> Result<(), HookError> + Send + Sync + 'static,
    {
        self.ensure_open()?;
        let _previous = self.on_place.install(block_type, Box::new(notifier))?;
        Ok(())
    }

    /// Runs the gate phase for a mutation of `id` from `from` to `to`.
    ///
    /// Returns `true` only if all three validators approve. Validator errors
    /// and panics are treated as refusals and never escape.
    pub fn can_set(&self, id: BlockId, from: Block, to: Block) -> bool {
        match panic::catch_unwind(AssertUnwindSafe(|| self.gate(id, from, to))) {
            Ok(Ok(approved)) => {
                if !approved {
                    debug!("Mutation of {} from {} to {} refused", id, from, to);
                }
                approved
            }
            Ok(Err(e)) => {
                debug!("Validator failed for {} ({} -> {}), refusing: {}", id, from, to, e);
                false
            }
            Err(_) => {
                warn!("Validator panicked for {} ({} -> {}), refusing", id, from, to);
                false
            }
        }
    }

    fn gate(&self, id: BlockId, from: Block, to: Block) -> Result<bool, DispatchError> {
        Ok((self.can_set)(id, from, to)?
            && (self.can_replace.get(from.slot())?)(id, from, to)?
            && (self.can_place.get(to.slot())?)(id, from, to)?)
    }

    /// Runs the notify phase for a committed mutation.
    ///
    /// Notifiers fire in order and the first failure is returned; notifiers
    /// that already ran are not rolled back.
    pub fn on_set(&self, id: BlockId, from: Block, to: Block) -> Result<(), DispatchError> {
        (self.on_set)(id, from, to)?;
        (self.on_replace.get(from.slot())?)(id, from, to)?;
        (self.on_place.get(to.slot())?)(id, from, to)?;
        Ok(())
    }

    /// Gates, commits and announces a mutation.
    ///
    /// `commit` runs only when the gate approves, before any notifier fires.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - the mutation was approved, committed and announced
    /// * `Ok(false)` - a validator refused (or failed); nothing was committed
    /// * `Err(_)` - the mutation was committed but a notifier failed
    pub fn try_set_with<F>(&self, id: BlockId, from: Block, to: Block, commit: F) -> Result<bool, DispatchError>
    where
        F: FnOnce(),
    {
        if !self.can_set(id, from, to) {
            return Ok(false);
        }
        commit();
        self.on_set(id, from, to)?;
        Ok(true)
    }

    /// [`try_set_with`](Self::try_set_with) for callers that apply the
    /// mutation themselves after approval.
    pub fn try_set(&self, id: BlockId, from: Block, to: Block) -> Result<bool, DispatchError> {
        self.try_set_with(id, from, to, || {})
    }
}

impl Default for WorldEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for WorldEvents {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for WorldEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldEvents")
            .field("can_replace", &self.can_replace)
            .field("can_place", &self.can_place)
            .field("on_replace", &self.on_replace)
            .field("on_place", &self.on_place)
            .field("sealed", &self.sealed)
            .finish()
    }
}
