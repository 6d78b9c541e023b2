//! Synchronization primitives used by the transit admission coordinator.
//!
//! The coordinator relies on exactly one shape of blocking primitive beyond
//! the global lock: a binary signal with release/acquire semantics. The same
//! [`Signal`] type plays three roles depending on how it is initialized and
//! reused — see its documentation for details.

use std::fmt;
use std::sync::{Condvar, Mutex, PoisonError};

/// A fatal, unrecoverable synchronization fault.
///
/// The coordinator treats a poisoned lock (always the result of a panic on
/// another thread while holding it) as unrecoverable: there is no partial
/// retry path for admission state, so the fault is raised as a panic rather
/// than threaded through as a `Result` a caller could ignore.
#[derive(Debug)]
pub struct RuntimeFault {
    context: &'static str,
}

impl RuntimeFault {
    fn new(context: &'static str) -> Self {
        Self { context }
    }
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "transit coordinator fault in {}: shared state was poisoned by a prior panic", self.context)
    }
}

impl std::error::Error for RuntimeFault {}

/// Convert a poisoned lock into the fatal fault panic described on
/// [`RuntimeFault`]. `context` should name the lock and operation, e.g.
/// `"Coordinator::execute"`, to make the panic message actionable.
///
/// Shared so that every mutex in the coordinator — this crate's own
/// `Signal`, and the coordinator's global state lock — converges on the
/// same fatal-fault behavior instead of each reimplementing it.
pub fn fault<T>(context: &'static str, _err: PoisonError<T>) -> T {
    panic!("{}", RuntimeFault::new(context));
}

/// A binary hand-off / wake primitive.
///
/// A `Signal` starts either *signalled* or *unsignalled*. `release` sets it
/// signalled and wakes one waiter; `acquire` blocks until signalled, then
/// atomically clears it back to unsignalled. The coordinator reuses this one
/// shape for three distinct purposes, distinguished only by initial state
/// and reuse pattern:
///
/// - a per-slot hand-off, reused for every occupant turnover of that slot,
///   starting signalled (a slot begins vacant);
/// - a per-transfer wake primitive, created fresh for each queued transfer,
///   starting unsignalled, and acquired exactly once;
/// - a per-component `prepared` signal, rearmed at the start of every
///   transfer that component takes part in, starting unsignalled.
pub struct Signal {
    signalled: Mutex<bool>,
    condvar: Condvar,
}

impl Signal {
    /// Create a new signal in the given initial state.
    pub fn new(initially_signalled: bool) -> Self {
        Self { signalled: Mutex::new(initially_signalled), condvar: Condvar::new() }
    }

    /// Set the signal and wake a single waiter blocked in [`acquire`](Self::acquire).
    pub fn release(&self) {
        let mut signalled = self.signalled.lock().unwrap_or_else(|e| fault("Signal::release", e));
        *signalled = true;
        self.condvar.notify_one();
    }

    /// Block until signalled, then atomically clear it back to unsignalled.
    pub fn acquire(&self) {
        let mut signalled = self.signalled.lock().unwrap_or_else(|e| fault("Signal::acquire", e));
        while !*signalled {
            signalled = self.condvar.wait(signalled).unwrap_or_else(|e| fault("Signal::acquire wait", e));
        }
        *signalled = false;
    }

    /// Reset the signal to a known state without waiting. Used to rearm a
    /// one-shot signal (a component's `prepared` primitive) before it is
    /// reused by the transfer that component is about to take part in.
    pub fn rearm(&self, initially_signalled: bool) {
        let mut signalled = self.signalled.lock().unwrap_or_else(|e| fault("Signal::rearm", e));
        *signalled = initially_signalled;
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.signalled.lock().map(|g| *g).unwrap_or(false);
        f.debug_struct("Signal").field("signalled", &state).finish()
    }
}
