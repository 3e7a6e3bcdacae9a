//! Per-identity invalidation debouncer.
//!
//! Each subscription identity is a small state machine:
//!
//! ```text
//! Idle --event--> Pending(timer) --event--> Pending(new timer)
//!                     |                         |
//!                     +------ window elapses ---+--> invalidate, Idle
//! ```
//!
//! A new event while `Pending` aborts the running timer and starts another,
//! so a burst produces exactly one invalidation, `window` after its last
//! event. Timers carry a generation number; a timer that wakes up after being
//! superseded or cancelled finds a different generation (or no slot) and
//! does nothing. After [`InvalidationDebouncer::shutdown`] nothing is
//! scheduled and no timer fires.

use super::binding::BindingIdentity;
use crate::cache::{CacheKey, QueryCache};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// Observable timer state of one identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Pending,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    timer: Option<JoinHandle<()>>,
    last_fired: Option<DateTime<Utc>>,
    fired: u64,
}

/// Coalesces bursts of matching events into one invalidation per identity.
pub struct InvalidationDebouncer {
    cache: Arc<dyn QueryCache>,
    slots: Arc<DashMap<BindingIdentity, Slot>>,
    closed: Arc<AtomicBool>,
}

impl InvalidationDebouncer {
    pub fn new(cache: Arc<dyn QueryCache>) -> Self {
        Self {
            cache,
            slots: Arc::new(DashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Record a matching event for `identity`: (re)start its timer so that
    /// `cache_key` is invalidated once `window` passes with no further events.
    ///
    /// Must be called from within a tokio runtime. Ignored after `shutdown`.
    pub fn schedule(&self, identity: &BindingIdentity, cache_key: CacheKey, window: Duration) {
        if self.is_shut_down() {
            return;
        }
        let mut slot = self.slots.entry(identity.clone()).or_default();
        if let Some(timer) = slot.timer.take() {
            timer.abort();
            debug!(identity = %identity, "Invalidation timer restarted");
        }
        slot.generation += 1;

        let generation = slot.generation;
        let slots = self.slots.clone();
        let closed = self.closed.clone();
        let cache = self.cache.clone();
        let identity = identity.clone();

        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;

            {
                let Some(mut slot) = slots.get_mut(&identity) else {
                    return; // cancelled
                };
                if slot.generation != generation || closed.load(Ordering::Acquire) {
                    return; // superseded or shut down
                }
                slot.timer = None;
                slot.last_fired = Some(Utc::now());
                slot.fired += 1;
            }

            debug!(identity = %identity, cache_key = %cache_key, "Debounced invalidation fired");
            cache.invalidate(&cache_key).await;
        }));
    }

    /// Cancel any pending timer for `identity` and forget it.
    ///
    /// Returns `true` if a timer was pending.
    pub fn cancel(&self, identity: &BindingIdentity) -> bool {
        match self.slots.remove(identity) {
            Some((_, slot)) => match slot.timer {
                Some(timer) => {
                    timer.abort();
                    debug!(identity = %identity, "Pending invalidation cancelled");
                    true
                }
                None => false,
            },
            None => false,
        }
    }

    /// Cancel every pending timer. Returns how many were pending.
    pub fn cancel_all(&self) -> usize {
        let identities: Vec<BindingIdentity> =
            self.slots.iter().map(|entry| entry.key().clone()).collect();
        identities
            .iter()
            .filter(|identity| self.cancel(identity))
            .count()
    }

    /// Stop for good: cancel every pending timer and refuse new ones.
    ///
    /// A timer that already passed its checks may still be mid-invalidation.
    pub fn shutdown(&self) -> usize {
        self.closed.store(true, Ordering::Release);
        let cancelled = self.cancel_all();
        debug!(cancelled, "Invalidation debouncer shut down");
        cancelled
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn state(&self, identity: &BindingIdentity) -> TimerState {
        match self.slots.get(identity) {
            Some(slot) if slot.timer.is_some() => TimerState::Pending,
            _ => TimerState::Idle,
        }
    }

    /// When `identity` last fired, if it has since it was first scheduled
    pub fn last_fired(&self, identity: &BindingIdentity) -> Option<DateTime<Utc>> {
        self.slots.get(identity).and_then(|slot| slot.last_fired)
    }

    /// How many invalidations `identity` has fired
    pub fn fired_count(&self, identity: &BindingIdentity) -> u64 {
        self.slots.get(identity).map(|slot| slot.fired).unwrap_or(0)
    }

    /// Number of identities with a running timer
    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.timer.is_some()).count()
    }
}

impl Drop for InvalidationDebouncer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
