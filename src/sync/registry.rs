//! Subscription registry
//!
//! Holds the set of desired bindings. Adding is idempotent by identity and
//! removal is by (table, cache key), so mounting views can register freely and
//! unmounting views do not need to keep the binding they registered.
//! The registry never talks to the change source; the engine reads
//! [`SubscriptionRegistry::bindings`] and reconciles channels against it.

use super::binding::{Binding, BindingIdentity};
use crate::cache::CacheKey;
use crate::events::Table;

#[derive(Debug, Default, Clone)]
pub struct SubscriptionRegistry {
    bindings: Vec<Binding>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `binding` unless one with the same identity exists. An existing
    /// binding takes the new debounce window, the latest registration wins.
    ///
    /// Returns `true` if the binding was inserted or its window changed.
    pub fn add(&mut self, binding: Binding) -> bool {
        let identity = binding.identity();
        match self.bindings.iter_mut().find(|b| b.identity() == identity) {
            Some(existing) if existing.debounce == binding.debounce => false,
            Some(existing) => {
                existing.debounce = binding.debounce;
                true
            }
            None => {
                self.bindings.push(binding);
                true
            }
        }
    }

    /// Remove every binding on `table` for `cache_key`, whatever its event
    /// kind or filter. Returns the removed bindings.
    pub fn remove(&mut self, table: Table, cache_key: &CacheKey) -> Vec<Binding> {
        let (removed, kept): (Vec<Binding>, Vec<Binding>) = std::mem::take(&mut self.bindings)
            .into_iter()
            .partition(|b| b.table == table && &b.cache_key == cache_key);
        self.bindings = kept;
        removed
    }

    /// Remove every binding, returning them
    pub fn clear(&mut self) -> Vec<Binding> {
        std::mem::take(&mut self.bindings)
    }

    pub fn contains(&self, identity: &BindingIdentity) -> bool {
        self.bindings.iter().any(|b| &b.identity() == identity)
    }

    /// Current bindings in insertion order
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
