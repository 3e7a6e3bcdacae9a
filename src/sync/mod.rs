//! Live-data synchronization
//!
//! Turns table-level row-change notifications into a minimal set of
//! debounced cache invalidations:
//! - `SubscriptionRegistry` — the desired set of bindings
//! - `InvalidationEngine` — one channel per binding, debounced invalidation
//! - `SyncSession` — session-scoped owner of both

mod binding;
mod debounce;
mod engine;
mod error;
pub mod presets;
mod registry;
mod session;

pub use binding::{Binding, BindingIdentity};
pub use debounce::{InvalidationDebouncer, TimerState};
pub use engine::{InvalidationEngine, ReconcileReport, DASHBOARD_DEBOUNCE, DEFAULT_DEBOUNCE};
pub use error::{log_channel_errors, ChannelError, ChannelErrorHandler};
pub use registry::SubscriptionRegistry;
pub use session::SyncSession;
