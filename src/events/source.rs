//! Interfaces at the change-feed seam
//!
//! `ChangeSource` is the subscriber side (open/close channels), `ChangeEmitter`
//! is the publisher side used by the store after every committed write.

use super::types::{ChangeChannel, ChangeEvent, ChangeOp, ChannelId, ChannelSpec, Table};
use anyhow::Result;
use async_trait::async_trait;

/// Row-level change notification source keyed by table.
///
/// A channel delivers every operation kind for its table/filter; narrowing by
/// operation happens on the consumer side.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Open a channel for `spec`. Failing to establish is an error, a later
    /// disconnect is reported in-band as `ChannelMessage::Disconnected`.
    async fn open_channel(&self, spec: &ChannelSpec) -> Result<ChangeChannel>;

    /// Close a channel. Closing an unknown or already-closed handle is a no-op.
    async fn close_channel(&self, id: ChannelId) -> Result<()>;
}

/// Publisher side of the change feed.
///
/// Fire-and-forget: emitting never blocks and never fails.
pub trait ChangeEmitter: Send + Sync {
    fn emit(&self, event: ChangeEvent);

    fn emit_created(&self, table: Table, row: serde_json::Value) {
        self.emit(ChangeEvent::new(table, ChangeOp::Create, row));
    }

    fn emit_updated(&self, table: Table, row: serde_json::Value) {
        self.emit(ChangeEvent::new(table, ChangeOp::Update, row));
    }

    fn emit_deleted(&self, table: Table, row: serde_json::Value) {
        self.emit(ChangeEvent::new(table, ChangeOp::Delete, row));
    }
}
