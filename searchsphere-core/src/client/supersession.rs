//! Last-request-wins bookkeeping for the search and chat slots.
//!
//! Each slot holds at most one pending cancellation handle. Issuing a new
//! request cancels whatever was pending first; a result is only applied if
//! its request is still the current one and was never cancelled.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A logical request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Search,
    Chat,
}

/// What became of a request that went through a slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The request was current when it completed; show the result.
    Applied(T),
    /// A newer request or an explicit cancel replaced it; drop the result.
    Superseded,
}

impl<T> Outcome<T> {
    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            Outcome::Superseded => None,
        }
    }

    pub fn is_superseded(&self) -> bool {
        matches!(self, Outcome::Superseded)
    }
}

/// Handle for one issued request.
#[derive(Debug, Clone)]
pub struct Ticket {
    generation: u64,
    token: CancellationToken,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Token to thread into the network call.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[derive(Debug)]
struct Pending {
    generation: u64,
    token: CancellationToken,
}

/// One supersession slot: Idle or Pending(handle).
#[derive(Debug, Default)]
pub struct InFlightSlot {
    pending: Mutex<Option<Pending>>,
    generations: AtomicU64,
}

impl InFlightSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel the pending request, if any, and make a new one current.
    pub fn issue(&self) -> Ticket {
        let token = CancellationToken::new();
        let (generation, previous) = {
            let mut pending = self.lock();
            let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
            let previous = pending.replace(Pending {
                generation,
                token: token.clone(),
            });
            (generation, previous)
        };

        if let Some(previous) = previous {
            debug!(
                superseded = previous.generation,
                current = generation,
                "Cancelling superseded request"
            );
            previous.token.cancel();
        }

        Ticket { generation, token }
    }

    /// Settle a ticket's result.
    ///
    /// The slot returns to Idle only if the ticket is still current. A result
    /// whose token was cancelled is always discarded.
    pub fn complete<T>(&self, ticket: &Ticket, result: T) -> Outcome<T> {
        let current = {
            let mut pending = self.lock();
            let current = pending
                .as_ref()
                .is_some_and(|p| p.generation == ticket.generation);
            if current {
                *pending = None;
            }
            current
        };

        if current && !ticket.token.is_cancelled() {
            Outcome::Applied(result)
        } else {
            Outcome::Superseded
        }
    }

    /// Abort the pending request without issuing a new one.
    ///
    /// Returns whether anything was pending.
    pub fn cancel(&self) -> bool {
        let previous = self.lock().take();
        match previous {
            Some(previous) => {
                previous.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    /// Issue a request, run `call` with its token, and settle the result.
    ///
    /// Errors from a superseded request are swallowed as
    /// [`Outcome::Superseded`]; errors from the current request propagate.
    pub async fn run<T, E, F, Fut>(&self, call: F) -> Result<Outcome<T>, E>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let ticket = self.issue();
        let token = ticket.token.clone();

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            result = call(token.clone()) => Some(result),
        };

        match result {
            None => {
                let _ = self.complete(&ticket, ());
                Ok(Outcome::Superseded)
            }
            Some(Ok(value)) => Ok(self.complete(&ticket, value)),
            Some(Err(err)) => match self.complete(&ticket, err) {
                Outcome::Applied(err) => Err(err),
                Outcome::Superseded => Ok(Outcome::Superseded),
            },
        }
    }
}

/// The search and chat slots together.
#[derive(Debug, Default)]
pub struct SupersessionController {
    search: InFlightSlot,
    chat: InFlightSlot,
}

impl SupersessionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot(&self, slot: Slot) -> &InFlightSlot {
        match slot {
            Slot::Search => &self.search,
            Slot::Chat => &self.chat,
        }
    }

    pub async fn run<T, E, F, Fut>(&self, slot: Slot, call: F) -> Result<Outcome<T>, E>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.slot(slot).run(call).await
    }

    /// Abort one slot's in-flight request ("clear conversation").
    pub fn cancel(&self, slot: Slot) -> bool {
        self.slot(slot).cancel()
    }

    pub fn cancel_all(&self) {
        self.search.cancel();
        self.chat.cancel();
    }
}
