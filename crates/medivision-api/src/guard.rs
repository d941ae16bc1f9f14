// Per-key in-flight request guard.
//
// Every request for a logical operation ("suggestions", "full search") takes
// a ticket carrying a monotonically increasing generation. When a response
// arrives it is accepted only if no newer ticket for the same key has
// already been accepted, so an old response resolving late can never
// overwrite a newer one.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
struct Slot {
    issued: u64,
    resolved: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    key: String,
    generation: u64,
}

impl Ticket {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Default)]
pub struct RequestGuard {
    slots: Mutex<HashMap<String, Slot>>,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a ticket for a new request under `key`.
    pub fn begin(&self, key: &str) -> Ticket {
        let mut slots = self.slots();
        let slot = slots.entry(key.to_string()).or_default();
        slot.issued += 1;
        Ticket {
            key: key.to_string(),
            generation: slot.issued,
        }
    }

    /// Decide whether the response for `ticket` may be applied. Accepting a
    /// ticket supersedes every older one for the same key.
    pub fn accept(&self, ticket: &Ticket) -> bool {
        let mut slots = self.slots();
        let slot = slots.entry(ticket.key.clone()).or_default();
        if ticket.generation > slot.resolved {
            slot.resolved = ticket.generation;
            true
        } else {
            debug!(
                "Discarding stale response for {} (gen: {}, resolved: {})",
                ticket.key, ticket.generation, slot.resolved
            );
            false
        }
    }

    /// Mark every request issued so far under `key` as superseded.
    pub fn invalidate(&self, key: &str) {
        let mut slots = self.slots();
        if let Some(slot) = slots.get_mut(key) {
            slot.resolved = slot.issued;
        }
    }

    /// Run `fut` under a fresh ticket for `key`. Returns `None` when the
    /// output arrived after a newer request had already resolved.
    pub async fn run<F>(&self, key: &str, fut: F) -> Option<F::Output>
    where
        F: Future,
    {
        let ticket = self.begin(key);
        let output = fut.await;
        self.accept(&ticket).then_some(output)
    }
}
