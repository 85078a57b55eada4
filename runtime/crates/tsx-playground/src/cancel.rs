//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// Shared cancellation flag for one run.
///
/// Clones share the flag, so a token handed to another thread can stop a run
/// that is executing on this one. Once cancelled a token stays cancelled.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
    generation: u64,
}

impl CancellationToken {
    pub fn new(generation: u64) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            generation,
        }
    }

    /// Position of this token in its session's sequence of runs.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// The one live token of a session.
///
/// Installing a new token cancels the previous one under the same lock, so
/// there is never a moment with two live tokens. Clones share the slot,
/// which lets another thread cancel whatever run is current.
#[derive(Clone, Debug, Default)]
pub struct ActiveToken {
    slot: Arc<Mutex<Option<CancellationToken>>>,
}

impl ActiveToken {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Cancel the current token, if any, and install `next`.
    pub fn replace(&self, next: CancellationToken) {
        if let Some(previous) = self.lock().replace(next) {
            previous.cancel();
        }
    }

    /// Cancel and drop the current token. Returns whether one was live.
    pub fn cancel(&self) -> bool {
        match self.lock().take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Uninstall `token` once its run has finished. A newer token installed
    /// in the meantime is left alone. Returns whether `token` was removed.
    pub fn release(&self, token: &CancellationToken) -> bool {
        let mut slot = self.lock();
        let installed = slot
            .as_ref()
            .is_some_and(|live| Arc::ptr_eq(&live.cancelled, &token.cancelled));
        if installed {
            slot.take();
        }
        installed
    }

    pub fn current(&self) -> Option<CancellationToken> {
        self.lock().clone()
    }

    /// True when `token` is the installed token and has not been cancelled.
    pub fn is_current(&self, token: &CancellationToken) -> bool {
        !token.is_cancelled()
            && self
                .lock()
                .as_ref()
                .is_some_and(|live| Arc::ptr_eq(&live.cancelled, &token.cancelled))
    }
}
