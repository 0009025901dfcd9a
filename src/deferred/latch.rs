//! Single-assignment outcome cell with ordered, run-once listeners.
//!
//! A latch starts pending, accumulating listeners. Settling it swaps the
//! listener list out under the lock and replaces it with the outcome, so a
//! listener is either drained by the settling thread or, if it arrives later,
//! run on the registering thread. Never both, never neither.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use super::lock;
use crate::error::{DeferredError, Outcome};

pub(crate) type Listener<T> = Box<dyn FnOnce(&Outcome<T>) + Send + 'static>;

enum Slot<T> {
    Pending(Vec<Listener<T>>),
    Settled(Outcome<T>),
}

pub(crate) struct Latch<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T: Clone> Latch<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Pending(Vec::new())),
            ready: Condvar::new(),
        }
    }

    pub(crate) fn settled(outcome: Outcome<T>) -> Self {
        Self {
            slot: Mutex::new(Slot::Settled(outcome)),
            ready: Condvar::new(),
        }
    }

    /// Register a listener. Runs it immediately if already settled.
    pub(crate) fn listen(&self, listener: Listener<T>) {
        let outcome = {
            let mut slot = lock(&self.slot);
            match &mut *slot {
                Slot::Pending(listeners) => {
                    listeners.push(listener);
                    return;
                }
                Slot::Settled(outcome) => outcome.clone(),
            }
        };
        invoke(listener, &outcome);
    }

    /// Store the outcome and run every pending listener in registration order.
    ///
    /// Returns `false` (and drops `outcome`) if the latch was already settled.
    pub(crate) fn settle(&self, outcome: Outcome<T>) -> bool {
        let listeners = {
            let mut slot = lock(&self.slot);
            if let Slot::Settled(_) = &*slot {
                return false;
            }
            match std::mem::replace(&mut *slot, Slot::Settled(outcome.clone())) {
                Slot::Pending(listeners) => listeners,
                Slot::Settled(_) => Vec::new(),
            }
        };
        self.ready.notify_all();

        for listener in listeners {
            invoke(listener, &outcome);
        }
        true
    }

    pub(crate) fn peek(&self) -> Option<Outcome<T>> {
        match &*lock(&self.slot) {
            Slot::Settled(outcome) => Some(outcome.clone()),
            Slot::Pending(_) => None,
        }
    }

    pub(crate) fn is_settled(&self) -> bool {
        matches!(&*lock(&self.slot), Slot::Settled(_))
    }

    pub(crate) fn wait(&self) -> Outcome<T> {
        let mut slot = lock(&self.slot);
        loop {
            if let Slot::Settled(outcome) = &*slot {
                return outcome.clone();
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    pub(crate) fn wait_timeout(&self, timeout: Duration) -> Outcome<T> {
        let slot = lock(&self.slot);
        let (slot, _) = self
            .ready
            .wait_timeout_while(slot, timeout, |slot| matches!(slot, Slot::Pending(_)))
            .unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Slot::Settled(outcome) => outcome.clone(),
            Slot::Pending(_) => Err(DeferredError::TimedOut(timeout)),
        }
    }

    #[cfg(test)]
    pub(crate) fn pending_listeners(&self) -> usize {
        match &*lock(&self.slot) {
            Slot::Pending(listeners) => listeners.len(),
            Slot::Settled(_) => 0,
        }
    }
}

fn invoke<T>(listener: Listener<T>, outcome: &Outcome<T>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(outcome))) {
        let error = DeferredError::from_panic(payload);
        tracing::warn!("completion listener panicked: {}", error);
    }
}
