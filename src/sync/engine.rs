//! Debounced invalidation engine
//!
//! Keeps exactly one open channel per active binding. Each channel gets a
//! listener task that turns matching events into debounced invalidations of
//! the binding's cache key. Reconciliation against the registry's binding set
//! opens channels for new bindings and tears down channels (listener, pending
//! timer, source handle) for removed ones.

use super::binding::{Binding, BindingIdentity};
use super::debounce::InvalidationDebouncer;
use super::error::{ChannelError, ChannelErrorHandler};
use crate::cache::QueryCache;
use crate::events::{ChangeSource, ChannelId, ChannelMessage};
use futures::future::join_all;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default debounce window
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Debounce window for the dashboard-wide aggregate
pub const DASHBOARD_DEBOUNCE: Duration = Duration::from_millis(300);

struct ActiveChannel {
    channel_id: ChannelId,
    window: Duration,
    listener: JoinHandle<()>,
}

#[derive(Default)]
struct EngineState {
    active: HashMap<BindingIdentity, ActiveChannel>,
    /// Bindings whose channel failed to establish. Left alone until the
    /// binding is removed; retrying is the channel layer's job.
    failed: HashSet<BindingIdentity>,
}

/// What a reconciliation pass changed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub opened: usize,
    pub closed: usize,
    pub failed: usize,
}

pub struct InvalidationEngine {
    source: Arc<dyn ChangeSource>,
    debouncer: Arc<InvalidationDebouncer>,
    default_window: Duration,
    on_error: ChannelErrorHandler,
    state: Mutex<EngineState>,
}

impl InvalidationEngine {
    pub fn new(
        source: Arc<dyn ChangeSource>,
        cache: Arc<dyn QueryCache>,
        default_window: Duration,
        on_error: ChannelErrorHandler,
    ) -> Self {
        Self {
            source,
            debouncer: Arc::new(InvalidationDebouncer::new(cache)),
            default_window,
            on_error,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn debouncer(&self) -> &InvalidationDebouncer {
        &self.debouncer
    }

    pub fn default_window(&self) -> Duration {
        self.default_window
    }

    /// Bring open channels in line with `bindings`.
    ///
    /// Channels whose binding is gone, or whose debounce window changed, are
    /// torn down first; channels for new bindings are then opened
    /// concurrently. A failed open is reported to the error handler and does
    /// not affect the other bindings.
    pub async fn reconcile(&self, bindings: &[Binding]) -> ReconcileReport {
        let mut state = self.state.lock().await;
        let mut report = ReconcileReport::default();

        let desired: HashMap<BindingIdentity, &Binding> =
            bindings.iter().map(|b| (b.identity(), b)).collect();

        let stale: Vec<BindingIdentity> = state
            .active
            .iter()
            .filter(|(identity, channel)| match desired.get(*identity) {
                Some(binding) => self.window_for(binding) != channel.window,
                None => true,
            })
            .map(|(identity, _)| identity.clone())
            .collect();
        for identity in stale {
            if let Some(channel) = state.active.remove(&identity) {
                self.teardown(&identity, channel).await;
                report.closed += 1;
            }
        }
        state.failed.retain(|identity| desired.contains_key(identity));

        let to_open: Vec<(BindingIdentity, &Binding)> = desired
            .into_iter()
            .filter(|(identity, _)| {
                !state.active.contains_key(identity) && !state.failed.contains(identity)
            })
            .collect();

        let opened = join_all(to_open.into_iter().map(|(identity, binding)| async move {
            let result = self.source.open_channel(&binding.channel_spec()).await;
            (identity, binding, result)
        }))
        .await;

        for (identity, binding, result) in opened {
            match result {
                Ok(channel) => {
                    debug!(identity = %identity, channel = %channel.id, "Binding channel open");
                    let window = self.window_for(binding);
                    let listener = self.spawn_listener(binding.clone(), window, channel.messages);
                    state.active.insert(
                        identity,
                        ActiveChannel {
                            channel_id: channel.id,
                            window,
                            listener,
                        },
                    );
                    report.opened += 1;
                }
                Err(e) => {
                    let error = ChannelError::Establish {
                        identity: identity.clone(),
                        message: format!("{:#}", e),
                    };
                    warn!(identity = %identity, "{}", error);
                    (self.on_error)(&error);
                    state.failed.insert(identity);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Tear down every channel and cancel every pending invalidation
    pub async fn dispose(&self) -> usize {
        let mut state = self.state.lock().await;
        let channels: Vec<(BindingIdentity, ActiveChannel)> = state.active.drain().collect();
        state.failed.clear();

        let closed = channels.len();
        for (identity, channel) in channels {
            self.teardown(&identity, channel).await;
        }
        // Timers that outlived their channel
        self.debouncer.cancel_all();

        info!(closed, "Invalidation engine disposed");
        closed
    }

    pub async fn active_channel_count(&self) -> usize {
        self.state.lock().await.active.len()
    }

    pub async fn is_active(&self, identity: &BindingIdentity) -> bool {
        self.state.lock().await.active.contains_key(identity)
    }

    pub async fn failed_identities(&self) -> Vec<BindingIdentity> {
        self.state.lock().await.failed.iter().cloned().collect()
    }

    fn window_for(&self, binding: &Binding) -> Duration {
        binding.debounce.unwrap_or(self.default_window)
    }

    /// Stop listening, drop any pending timer, and close the source channel.
    ///
    /// The listener must have stopped before the timer is cancelled: an
    /// aborted task keeps running until its next yield point and could
    /// re-arm the timer in between.
    async fn teardown(&self, identity: &BindingIdentity, channel: ActiveChannel) {
        channel.listener.abort();
        let _ = channel.listener.await;
        self.debouncer.cancel(identity);
        if let Err(e) = self.source.close_channel(channel.channel_id).await {
            warn!(
                identity = %identity,
                channel = %channel.channel_id,
                "Failed to close channel: {:#}",
                e
            );
        }
        debug!(identity = %identity, "Binding channel torn down");
    }

    fn spawn_listener(
        &self,
        binding: Binding,
        window: Duration,
        mut messages: mpsc::UnboundedReceiver<ChannelMessage>,
    ) -> JoinHandle<()> {
        let debouncer = self.debouncer.clone();
        let on_error = self.on_error.clone();
        let identity = binding.identity();

        tokio::spawn(async move {
            while let Some(message) = messages.recv().await {
                match message {
                    ChannelMessage::Event(event) => {
                        if binding.matches(&event) {
                            debouncer.schedule(&identity, binding.cache_key.clone(), window);
                        }
                    }
                    ChannelMessage::Disconnected { reason } => {
                        let error = ChannelError::Dropped {
                            identity: identity.clone(),
                            reason,
                        };
                        warn!(identity = %identity, "{}", error);
                        on_error(&error);
                    }
                }
            }
            debug!(identity = %identity, "Channel stream ended");
        })
    }
}

/// Dropping the engine without `dispose` stops every listener and timer.
/// Source channels are closed in the background when a runtime is available.
impl Drop for InvalidationEngine {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        state.failed.clear();
        let channels: Vec<ChannelId> = state
            .active
            .drain()
            .map(|(_, channel)| {
                channel.listener.abort();
                channel.channel_id
            })
            .collect();
        // Listeners may still be mid-poll; the debouncer refuses them from here on
        let cancelled = self.debouncer.shutdown();
        if channels.is_empty() {
            return;
        }

        debug!(channels = channels.len(), cancelled, "Invalidation engine dropped while active");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let source = self.source.clone();
                handle.spawn(async move {
                    for id in channels {
                        if let Err(e) = source.close_channel(id).await {
                            warn!(channel = %id, "Failed to close channel: {:#}", e);
                        }
                    }
                });
            }
            Err(_) => warn!(
                channels = channels.len(),
                "No runtime to close channels of a dropped engine"
            ),
        }
    }
}
