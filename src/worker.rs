//! The expiration loop: the single background thread that sleeps until the earliest
//! deadline in the heap, evicts whatever is due, and repeats until the cache is closed.
//!
//! State machine (see the crate root docs for the full narrative): idle-waiting when the
//! heap is empty, timed-waiting on the soonest deadline otherwise, evicting under the lock,
//! terminated once `is_closed` is observed.

use std::sync::Arc;
use std::time::Instant;

use crate::cache::SharedState;

pub(crate) fn run<V>(shared: Arc<SharedState<V>>) {
    tracing::debug!("expiration loop started");
    loop {
        let mut guard = shared.inner.lock();
        loop {
            if guard.is_closed {
                tracing::debug!("expiration loop terminating");
                return;
            }
            match guard.heap.peek_deadline(&guard.slab) {
                None => {
                    tracing::trace!("idle-waiting: heap is empty");
                    shared.wake.wait(&mut guard);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if deadline <= now {
                        break;
                    }
                    let delay = deadline - now;
                    tracing::trace!(?delay, "timed-waiting on earliest deadline");
                    shared.wake.wait_for(&mut guard, delay);
                }
            }
        }
        guard.evict_due();
    }
}
