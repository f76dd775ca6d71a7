//! Shared/exclusive access token for the dataset
//!
//! Readers (runners and the operations driving them) hold the token shared;
//! writers take it exclusively. A yield is the moment a reader gives its
//! shared hold back so waiting writers can run.
//!
//! The token prefers writers: once a writer is waiting, new shared
//! acquisitions block until it has run. This is what makes yielding useful,
//! and it is also why a thread must never take the token shared twice
//! (see [`SharedAccess`], which tracks whether it currently holds it).

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
struct TokenState {
    readers: usize,
    writer: bool,
    waiting_writers: usize,
}

/// Dataset access token
#[derive(Debug, Default)]
pub struct AccessToken {
    state: Mutex<TokenState>,
    released: Condvar,
}

impl AccessToken {
    /// Create an unheld token
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until shared access is granted
    pub fn lock_shared(&self) {
        let mut state = self.state.lock();
        while state.writer || state.waiting_writers > 0 {
            self.released.wait(&mut state);
        }
        state.readers += 1;
    }

    /// Give back one shared hold
    pub fn unlock_shared(&self) {
        let mut state = self.state.lock();
        debug_assert!(state.readers > 0, "unlock_shared without a shared hold");
        state.readers = state.readers.saturating_sub(1);
        if state.readers == 0 {
            self.released.notify_all();
        }
    }

    /// Block until exclusive access is granted
    ///
    /// The returned guard releases the token on drop.
    pub fn lock_exclusive(&self) -> ExclusiveAccess<'_> {
        let mut state = self.state.lock();
        state.waiting_writers += 1;
        while state.writer || state.readers > 0 {
            self.released.wait(&mut state);
        }
        state.waiting_writers -= 1;
        state.writer = true;
        ExclusiveAccess { token: self }
    }

    fn unlock_exclusive(&self) {
        let mut state = self.state.lock();
        state.writer = false;
        self.released.notify_all();
    }

    /// Writers currently blocked waiting for exclusive access
    pub fn waiting_writers(&self) -> usize {
        self.state.lock().waiting_writers
    }

    /// Current number of shared holders
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }

    /// Whether a writer holds the token
    pub fn is_exclusively_held(&self) -> bool {
        self.state.lock().writer
    }
}

/// Exclusive hold on an [`AccessToken`]
#[must_use = "exclusive access is released as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ExclusiveAccess<'a> {
    token: &'a AccessToken,
}

impl Drop for ExclusiveAccess<'_> {
    fn drop(&mut self) {
        self.token.unlock_exclusive();
    }
}

/// One operation's shared hold on the token
///
/// Tracks whether the hold is currently taken so release/reacquire pairs
/// are idempotent. Owned by a single operation; the yield coordinator
/// releases and reacquires through it. Dropping it releases the hold.
///
/// At most one runner drives a hold at a time (see [`SharedAccess::claim`]).
/// A yield releases the hold for everything reading under it, and only the
/// yielding runner is registered to hear about writes made meanwhile.
#[derive(Debug)]
pub struct SharedAccess {
    token: Arc<AccessToken>,
    held: AtomicBool,
    claimed: AtomicBool,
}

impl SharedAccess {
    /// Take a shared hold, blocking while a writer runs or waits
    pub fn acquire(token: Arc<AccessToken>) -> Self {
        token.lock_shared();
        Self {
            token,
            held: AtomicBool::new(true),
            claimed: AtomicBool::new(false),
        }
    }

    /// Reserve the hold for one runner; `None` if another runner has it
    ///
    /// The reservation lasts until the returned claim is dropped.
    pub fn claim(self: &Arc<Self>) -> Option<AccessClaim> {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(AccessClaim {
            access: Arc::clone(self),
        })
    }

    /// Whether a runner currently drives this hold
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Give the hold back; returns false if it was not held
    pub fn release(&self) -> bool {
        if self.held.swap(false, Ordering::AcqRel) {
            self.token.unlock_shared();
            true
        } else {
            false
        }
    }

    /// Take the hold again; returns false if it was already held
    pub fn reacquire(&self) -> bool {
        if self.held.load(Ordering::Acquire) {
            return false;
        }
        self.token.lock_shared();
        self.held.store(true, Ordering::Release);
        true
    }

    /// Whether the hold is currently taken
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// The underlying token
    pub fn token(&self) -> &Arc<AccessToken> {
        &self.token
    }
}

impl Drop for SharedAccess {
    fn drop(&mut self) {
        self.release();
    }
}

/// A runner's reservation of a [`SharedAccess`]
#[must_use = "the reservation ends as soon as the claim is dropped"]
#[derive(Debug)]
pub struct AccessClaim {
    access: Arc<SharedAccess>,
}

impl AccessClaim {
    /// The reserved hold
    pub fn access(&self) -> &Arc<SharedAccess> {
        &self.access
    }
}

impl Drop for AccessClaim {
    fn drop(&mut self) {
        self.access.claimed.store(false, Ordering::Release);
    }
}
