//! World mutation entry point for a running server.
//!
//! [`World`] routes mutations through the sealed [`WorldEvents`] tables and
//! treats a failing notifier as an invariant violation: the panic signal
//! fires before the error (or the notifier's panic) reaches the caller.
//! Validator refusals are ordinary results and never escalate.

use crate::panic::PanicSignal;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::error;
use world_events::{Block, BlockId, DispatchError, WorldEvents};

/// Escalating front end over the world's hook tables.
#[derive(Debug, Clone)]
pub struct World {
    events: Arc<WorldEvents>,
    panic: Arc<PanicSignal>,
}

impl World {
    pub fn new(events: Arc<WorldEvents>, panic: Arc<PanicSignal>) -> Self {
        Self { events, panic }
    }

    /// The underlying tables.
    pub fn events(&self) -> &Arc<WorldEvents> {
        &self.events
    }

    /// Gates, commits and announces a mutation of `id`.
    ///
    /// Returns `Ok(false)` when a validator refuses. A notifier error fires
    /// the panic signal and is then returned; a notifier panic fires it and
    /// keeps unwinding.
    pub fn try_set_with<F>(&self, id: BlockId, from: Block, to: Block, commit: F) -> Result<bool, DispatchError>
    where
        F: FnOnce(),
    {
        if !self.events.can_set(id, from, to) {
            return Ok(false);
        }
        // The commit belongs to the caller; only the notify phase escalates.
        commit();

        match panic::catch_unwind(AssertUnwindSafe(|| self.events.on_set(id, from, to))) {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => {
                error!("Notifier failed for {} ({} -> {}): {}", id, from, to, e);
                self.panic.panic();
                Err(e)
            }
            Err(payload) => {
                error!("Notifier panicked for {} ({} -> {})", id, from, to);
                self.panic.panic();
                panic::resume_unwind(payload)
            }
        }
    }

    /// [`try_set_with`](Self::try_set_with) without a commit step.
    pub fn try_set(&self, id: BlockId, from: Block, to: Block) -> Result<bool, DispatchError> {
        self.try_set_with(id, from, to, || {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use world_events::HookError;

    fn world(configure: impl FnOnce(&mut WorldEvents)) -> World {
        let mut events = WorldEvents::new();
        configure(&mut events);
        events.seal();
        World::new(Arc::new(events), Arc::new(PanicSignal::default()))
    }

    #[test]
    fn test_refusal_does_not_escalate() {
        let world = world(|events| {
            events.install_can_place(3, |_, _, _| Ok(false)).unwrap();
        });

        assert!(!world.try_set(BlockId::default(), Block::AIR, Block::new(3)).unwrap());
        assert!(world.try_set(BlockId::default(), Block::AIR, Block::new(4)).unwrap());
        assert!(!world.panic.is_panicked());
    }

    #[test]
    fn test_notifier_error_escalates_then_returns() {
        let world = world(|events| {
            events
                .install_on_replace(2, |_, _, _| Err(HookError::failed("ledger offline")))
                .unwrap();
        });

        let mut committed = false;
        let result = world.try_set_with(BlockId::default(), Block::new(2), Block::AIR, || committed = true);

        assert!(matches!(result, Err(DispatchError::Hook(_))));
        assert!(committed);
        assert!(world.panic.is_panicked());
    }

    #[test]
    fn test_notifier_panic_escalates_then_unwinds() {
        let world = world(|events| {
            events
                .set_on_set(|_, _, _| panic!("notifier exploded"))
                .unwrap();
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            world.try_set(BlockId::default(), Block::AIR, Block::new(1))
        }));

        assert!(outcome.is_err());
        assert!(world.panic.is_panicked());
    }

    #[test]
    fn test_commit_panic_unwinds_without_escalating() {
        let notified = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let world = {
            let notified = notified.clone();
            world(move |events| {
                events
                    .set_on_set(move |_, _, _| {
                        notified.store(true, std::sync::atomic::Ordering::SeqCst);
                        Ok(())
                    })
                    .unwrap();
            })
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            world.try_set_with(BlockId::default(), Block::AIR, Block::new(1), || panic!("commit exploded"))
        }));

        assert!(outcome.is_err());
        assert!(!notified.load(std::sync::atomic::Ordering::SeqCst));
        assert!(!world.panic.is_panicked());
    }
}
