//! Global minimum spacing between outbound provider requests.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Default spacing between any two outbound requests.
pub const DEFAULT_MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(100);

/// Hands out send slots at least `min_interval` apart, across all callers
/// and all providers.
///
/// Reserving a slot is a short critical section; the wait for the slot
/// happens outside the lock, so callers queue without blocking each other.
/// A caller is only given a slot it can use before its own deadline, and a
/// caller that walks away from the newest reservation hands that slot back.
#[derive(Debug)]
pub struct RequestPacer {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

/// A reserved slot that has not been used yet.
struct Reservation<'a> {
    pacer: &'a RequestPacer,
    slot: Instant,
    used: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if self.used {
            return;
        }
        let mut next = self.pacer.lock_next();
        // Only the newest reservation can be returned without reordering others
        if *next == Some(self.slot + self.pacer.min_interval) {
            *next = Some(self.slot);
            tracing::trace!("Returned unused request slot");
        }
    }
}

impl RequestPacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    fn lock_next(&self) -> MutexGuard<'_, Option<Instant>> {
        self.next_slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reserve(&self, deadline: Instant) -> Option<Reservation<'_>> {
        let mut next = self.lock_next();
        let now = Instant::now();
        let slot = match *next {
            Some(reserved) if reserved > now => reserved,
            _ => now,
        };
        if slot >= deadline {
            return None;
        }
        *next = Some(slot + self.min_interval);
        Some(Reservation {
            pacer: self,
            slot,
            used: false,
        })
    }

    /// Wait for the next free slot that starts before `deadline`.
    ///
    /// Returns `false` straight away, without taking a slot, when the queue
    /// already reaches past the deadline.
    pub async fn acquire_until(&self, deadline: Instant) -> bool {
        let Some(mut reservation) = self.reserve(deadline) else {
            tracing::debug!("No request slot free before deadline");
            return false;
        };

        let now = Instant::now();
        if reservation.slot > now {
            tracing::trace!(wait_ms = (reservation.slot - now).as_millis() as u64, "Pacing request");
        }
        tokio::time::sleep_until(reservation.slot).await;
        reservation.used = true;
        true
    }
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_REQUEST_INTERVAL)
    }
}
