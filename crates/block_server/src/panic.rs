//! One-shot fatal error escalation.
//!
//! A [`PanicSignal`] is created per server instance and shared (via `Arc`)
//! with every component that can detect an invariant violation. The first
//! call to [`PanicSignal::panic`] runs the shutdown action; every other call,
//! concurrent or later, returns immediately without running it again and
//! without waiting for it to finish.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio::sync::watch;
use tracing::error;

type ShutdownAction = Box<dyn FnOnce() + Send>;

/// Shared, single-write-wins fatal error flag.
pub struct PanicSignal {
    fired: AtomicBool,
    action: Mutex<Option<ShutdownAction>>,
    notify: watch::Sender<bool>,
}

impl PanicSignal {
    /// Creates a signal that runs `action` on the first escalation.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let (notify, _) = watch::channel(false);
        Self {
            fired: AtomicBool::new(false),
            action: Mutex::new(Some(Box::new(action))),
            notify,
        }
    }

    /// Creates a signal with no shutdown action; escalation only raises the flag.
    pub fn without_action() -> Self {
        Self::new(|| {})
    }

    /// Escalates a fatal condition.
    ///
    /// Returns `true` for the single call that ran the shutdown action and
    /// `false` for every other call.
    pub fn panic(&self) -> bool {
        if self
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        error!("💥 Panic escalated, shutting down");
        self.notify.send_replace(true);

        let action = match self.action.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(action) = action {
            action();
        }
        true
    }

    pub fn is_panicked(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Returns a receiver that observes `true` once the signal fires.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.notify.subscribe()
    }

    /// Resolves once the signal has fired.
    pub async fn wait(&self) {
        let mut receiver = self.subscribe();
        // The sender lives as long as `self`, so this only returns on a panic.
        let _ = receiver.wait_for(|fired| *fired).await;
    }
}

impl Default for PanicSignal {
    fn default() -> Self {
        Self::without_action()
    }
}

impl fmt::Debug for PanicSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanicSignal")
            .field("fired", &self.is_panicked())
            .finish()
    }
}
