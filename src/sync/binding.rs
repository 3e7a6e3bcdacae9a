//! Subscription bindings: which row changes invalidate which cache key

use crate::cache::CacheKey;
use crate::events::{ChangeEvent, ChannelSpec, EventKind, RowFilter, Table};
use std::fmt;
use std::time::Duration;

/// A desired change-to-invalidation mapping.
///
/// Two bindings are the same subscription when their [`BindingIdentity`] is
/// equal; the debounce window is a property of the binding, not part of its
/// identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub table: Table,
    pub event: EventKind,
    pub filter: Option<RowFilter>,
    pub cache_key: CacheKey,
    /// Overrides the engine's default debounce window
    pub debounce: Option<Duration>,
}

impl Binding {
    /// Bind every change on `table` to `cache_key`
    pub fn new(table: Table, cache_key: CacheKey) -> Self {
        Self {
            table,
            event: EventKind::Any,
            filter: None,
            cache_key,
            debounce: None,
        }
    }

    /// Narrow to one operation kind
    pub fn on(mut self, event: EventKind) -> Self {
        self.event = event;
        self
    }

    /// Narrow to rows where `column = value`
    pub fn filter(mut self, column: impl Into<String>, value: impl ToString) -> Self {
        self.filter = Some(RowFilter::new(column, value.to_string()));
        self
    }

    /// Registering the same identity again with another window replaces the
    /// window and reopens the binding's channel.
    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = Some(window);
        self
    }

    pub fn identity(&self) -> BindingIdentity {
        BindingIdentity {
            table: self.table,
            event: self.event,
            filter: self.filter.clone(),
            cache_key: self.cache_key.to_string(),
        }
    }

    /// The channel this binding listens on
    pub fn channel_spec(&self) -> ChannelSpec {
        ChannelSpec {
            table: self.table,
            filter: self.filter.clone(),
        }
    }

    /// Whether `event` should invalidate this binding's cache key
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        self.event.matches(event.operation) && self.channel_spec().accepts(event)
    }
}

/// Identity of a subscription: (table, event kind, filter, cache key as string)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BindingIdentity {
    pub table: Table,
    pub event: EventKind,
    pub filter: Option<RowFilter>,
    pub cache_key: String,
}

impl fmt::Display for BindingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}", self.table, self.event)?;
        if let Some(filter) = &self.filter {
            write!(f, ":{}", filter)?;
        }
        write!(f, "->{}", self.cache_key)
    }
}
