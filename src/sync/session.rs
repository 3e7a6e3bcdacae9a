//! Session-scoped owner of the registry and the invalidation engine.
//!
//! Constructed explicitly at session start and handed to whatever owns the
//! session; `logout` tears everything down. There is no process-global
//! instance.

use super::binding::Binding;
use super::engine::{InvalidationEngine, ReconcileReport};
use super::error::ChannelErrorHandler;
use super::registry::SubscriptionRegistry;
use crate::cache::{CacheKey, QueryCache};
use crate::events::{ChangeSource, Table};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

pub struct SyncSession {
    registry: RwLock<SubscriptionRegistry>,
    engine: InvalidationEngine,
}

impl SyncSession {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        cache: Arc<dyn QueryCache>,
        default_window: Duration,
        on_error: ChannelErrorHandler,
    ) -> Self {
        info!(window = ?default_window, "Sync session started");
        Self {
            registry: RwLock::new(SubscriptionRegistry::new()),
            engine: InvalidationEngine::new(source, cache, default_window, on_error),
        }
    }

    /// Register a binding and open its channel if it is new.
    ///
    /// Safe to call redundantly; returns `false` when an identical binding
    /// was already registered. A new debounce window for a registered
    /// binding replaces the old one.
    pub async fn subscribe(&self, binding: Binding) -> bool {
        let mut registry = self.registry.write().await;
        let added = registry.add(binding);
        if added {
            self.engine.reconcile(registry.bindings()).await;
        }
        added
    }

    /// Register several bindings with one reconciliation pass
    pub async fn subscribe_all(
        &self,
        bindings: impl IntoIterator<Item = Binding>,
    ) -> ReconcileReport {
        let mut registry = self.registry.write().await;
        for binding in bindings {
            registry.add(binding);
        }
        self.engine.reconcile(registry.bindings()).await
    }

    /// Remove every binding on `table` for `cache_key`, cancelling pending
    /// invalidations and closing their channels. Returns how many were removed.
    pub async fn unsubscribe(&self, table: Table, cache_key: &CacheKey) -> usize {
        let mut registry = self.registry.write().await;
        let removed = registry.remove(table, cache_key);
        if !removed.is_empty() {
            self.engine.reconcile(registry.bindings()).await;
            debug!(table = %table, cache_key = %cache_key, removed = removed.len(), "Unsubscribed");
        }
        removed.len()
    }

    /// Remove every binding for `cache_key` across all tables
    pub async fn unsubscribe_key(&self, cache_key: &CacheKey) -> usize {
        let mut registry = self.registry.write().await;
        let tables: Vec<Table> = registry
            .bindings()
            .iter()
            .filter(|b| &b.cache_key == cache_key)
            .map(|b| b.table)
            .collect();
        let removed: usize = tables
            .into_iter()
            .map(|table| registry.remove(table, cache_key).len())
            .sum();
        if removed > 0 {
            self.engine.reconcile(registry.bindings()).await;
        }
        removed
    }

    /// Tear down every binding of the session
    pub async fn logout(&self) {
        let mut registry = self.registry.write().await;
        let removed = registry.clear();
        let closed = self.engine.dispose().await;
        info!(bindings = removed.len(), channels = closed, "Sync session torn down");
    }

    /// Snapshot of the registered bindings
    pub async fn bindings(&self) -> Vec<Binding> {
        self.registry.read().await.bindings().to_vec()
    }

    pub fn engine(&self) -> &InvalidationEngine {
        &self.engine
    }
}
