//! Delayed-dispatch queue.
//!
//! Pending timeouts live on the same logical timeline as the pointer samples
//! they are interleaved with.  Nothing here sleeps: the owner asks for the
//! next deadline and drains due entries with [`DelayedQueue::pop_due`].

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

/// Identifies one scheduled instance of a tag.
///
/// A handle goes stale as soon as its tag is cancelled or rescheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerHandle<T> {
    pub tag: T,
    generation: u64,
}

#[derive(Debug, Clone)]
struct Pending<P> {
    deadline: Duration,
    generation: u64,
    payload: P,
}

/// Set of named, cancelable timeouts with at most one pending entry per tag.
#[derive(Debug, Clone)]
pub struct DelayedQueue<T, P = ()> {
    pending: HashMap<T, Pending<P>>,
    next_generation: u64,
}

impl<T, P> Default for DelayedQueue<T, P> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            next_generation: 0,
        }
    }
}

impl<T: Copy + Eq + Hash, P> DelayedQueue<T, P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `tag` to fire at `now + delay`, replacing any pending entry
    /// with the same tag.
    pub fn schedule(&mut self, tag: T, delay: Duration, now: Duration, payload: P) -> TimerHandle<T> {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.pending.insert(
            tag,
            Pending {
                deadline: now + delay,
                generation,
                payload,
            },
        );
        TimerHandle { tag, generation }
    }

    /// Remove the pending entry for `tag`.  Returns whether one existed.
    pub fn cancel(&mut self, tag: T) -> bool {
        self.pending.remove(&tag).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.pending.clear();
    }

    pub fn is_pending(&self, tag: T) -> bool {
        self.pending.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.values().map(|p| p.deadline).min()
    }

    /// Remove and return the earliest entry due at or before `now`.
    ///
    /// Entries with equal deadlines come out in the order they were scheduled.
    pub fn pop_due(&mut self, now: Duration) -> Option<(T, P)> {
        let tag = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .min_by_key(|(_, p)| (p.deadline, p.generation))
            .map(|(tag, _)| *tag)?;
        self.pending.remove(&tag).map(|p| (tag, p.payload))
    }

    /// Fire one specific scheduled instance regardless of its deadline.
    ///
    /// Returns `None` if the handle is stale.
    pub fn fire(&mut self, handle: TimerHandle<T>) -> Option<(T, P)> {
        let live = self
            .pending
            .get(&handle.tag)
            .is_some_and(|p| p.generation == handle.generation);
        if !live {
            return None;
        }
        self.pending.remove(&handle.tag).map(|p| (handle.tag, p.payload))
    }
}
