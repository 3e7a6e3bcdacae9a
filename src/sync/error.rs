//! Channel errors reported to the injected error handler

use super::binding::BindingIdentity;
use std::sync::Arc;

/// A failure local to one subscription's channel.
///
/// These never propagate out of the engine; they go to the session's
/// [`ChannelErrorHandler`] and only the views behind that binding degrade.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// The channel could not be established. Not retried by the engine.
    #[error("channel for {identity} could not be established: {message}")]
    Establish {
        identity: BindingIdentity,
        message: String,
    },

    /// The source reported a disconnect on an established channel
    #[error("channel for {identity} dropped: {reason}")]
    Dropped {
        identity: BindingIdentity,
        reason: String,
    },
}

impl ChannelError {
    pub fn identity(&self) -> &BindingIdentity {
        match self {
            ChannelError::Establish { identity, .. } | ChannelError::Dropped { identity, .. } => {
                identity
            }
        }
    }
}

/// Callback receiving channel errors (toast, log, metrics...)
pub type ChannelErrorHandler = Arc<dyn Fn(&ChannelError) + Send + Sync>;

/// Handler that only logs
pub fn log_channel_errors() -> ChannelErrorHandler {
    Arc::new(|error: &ChannelError| {
        tracing::warn!(identity = %error.identity(), "{}", error);
    })
}
