//! In-process change feed
//!
//! Routes every emitted `ChangeEvent` to the open channels whose table and
//! filter accept it. Used as the notification source when the store lives in
//! the same process, and as the fake source in tests.

use super::source::{ChangeEmitter, ChangeSource};
use super::types::{ChangeChannel, ChangeEvent, ChannelId, ChannelMessage, ChannelSpec, Table};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

struct OpenChannel {
    spec: ChannelSpec,
    sender: mpsc::UnboundedSender<ChannelMessage>,
}

#[derive(Default)]
struct FeedInner {
    next_id: AtomicU64,
    channels: DashMap<ChannelId, OpenChannel>,
    /// Tables for which channel establishment is refused, with the reason
    refused: DashMap<Table, String>,
}

/// Change feed that fans events out to per-channel unbounded queues.
///
/// Cloning shares the same set of channels.
#[derive(Clone, Default)]
pub struct LocalChangeFeed {
    inner: Arc<FeedInner>,
}

impl LocalChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of currently open channels
    pub fn open_channel_count(&self) -> usize {
        self.inner.channels.len()
    }

    /// Number of open channels on `table`
    pub fn channel_count_for(&self, table: Table) -> usize {
        self.inner
            .channels
            .iter()
            .filter(|entry| entry.spec.table == table)
            .count()
    }

    /// Refuse new channels on `table` until `accept_table` is called.
    /// Already-open channels are unaffected.
    pub fn refuse_table(&self, table: Table, reason: impl Into<String>) {
        self.inner.refused.insert(table, reason.into());
    }

    pub fn accept_table(&self, table: Table) {
        self.inner.refused.remove(&table);
    }

    /// Signal a transient disconnect on every open channel of `table`
    pub fn disconnect(&self, table: Table, reason: &str) {
        for entry in self.inner.channels.iter() {
            if entry.spec.table == table {
                let _ = entry.sender.send(ChannelMessage::Disconnected {
                    reason: reason.to_string(),
                });
            }
        }
    }
}

#[async_trait]
impl ChangeSource for LocalChangeFeed {
    async fn open_channel(&self, spec: &ChannelSpec) -> Result<ChangeChannel> {
        if let Some(reason) = self.inner.refused.get(&spec.table) {
            return Err(anyhow!("channel {} refused: {}", spec, reason.value()));
        }

        let id = ChannelId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, messages) = mpsc::unbounded_channel();
        self.inner.channels.insert(
            id,
            OpenChannel {
                spec: spec.clone(),
                sender,
            },
        );
        debug!(channel = %id, spec = %spec, "Channel opened");
        Ok(ChangeChannel { id, messages })
    }

    async fn close_channel(&self, id: ChannelId) -> Result<()> {
        if self.inner.channels.remove(&id).is_some() {
            debug!(channel = %id, "Channel closed");
        }
        Ok(())
    }
}

impl ChangeEmitter for LocalChangeFeed {
    fn emit(&self, event: ChangeEvent) {
        let mut delivered = 0usize;
        let mut gone = Vec::new();

        for entry in self.inner.channels.iter() {
            if !entry.spec.accepts(&event) {
                continue;
            }
            match entry.sender.send(ChannelMessage::Event(event.clone())) {
                Ok(()) => delivered += 1,
                Err(_) => gone.push(*entry.key()),
            }
        }

        // Receivers dropped without close_channel
        for id in gone {
            warn!(channel = %id, "Dropping channel with no receiver");
            self.inner.channels.remove(&id);
        }

        debug!(
            table = %event.table,
            operation = ?event.operation,
            channels = delivered,
            "ChangeEvent emitted"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ChangeOp, RowFilter};
    use serde_json::json;

    fn spec(table: Table, filter: Option<RowFilter>) -> ChannelSpec {
        ChannelSpec { table, filter }
    }

    fn expect_event(message: Option<ChannelMessage>) -> ChangeEvent {
        match message {
            Some(ChannelMessage::Event(event)) => event,
            other => panic!("expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_channels_no_panic() {
        let feed = LocalChangeFeed::new();
        feed.emit_created(Table::Tasks, json!({"id": "t-1"}));
        assert_eq!(feed.open_channel_count(), 0);
    }

    #[tokio::test]
    async fn test_routes_by_table_and_filter() {
        let feed = LocalChangeFeed::new();
        let mut all_tasks = feed.open_channel(&spec(Table::Tasks, None)).await.unwrap();
        let mut project_one = feed
            .open_channel(&spec(
                Table::Tasks,
                Some(RowFilter::new("project_id", "p-1")),
            ))
            .await
            .unwrap();
        let mut subtasks = feed.open_channel(&spec(Table::Subtasks, None)).await.unwrap();

        feed.emit_updated(Table::Tasks, json!({"id": "t-1", "project_id": "p-2"}));

        let event = expect_event(all_tasks.messages.try_recv().ok());
        assert_eq!(event.operation, ChangeOp::Update);
        assert!(project_one.messages.try_recv().is_err());
        assert!(subtasks.messages.try_recv().is_err());

        feed.emit_deleted(Table::Tasks, json!({"id": "t-2", "project_id": "p-1"}));
        let event = expect_event(project_one.messages.try_recv().ok());
        assert_eq!(event.row["id"], "t-2");
    }

    #[tokio::test]
    async fn test_close_channel_stops_delivery() {
        let feed = LocalChangeFeed::new();
        let mut channel = feed.open_channel(&spec(Table::Tasks, None)).await.unwrap();
        assert_eq!(feed.channel_count_for(Table::Tasks), 1);

        feed.close_channel(channel.id).await.unwrap();
        assert_eq!(feed.open_channel_count(), 0);

        feed.emit_created(Table::Tasks, json!({"id": "t-1"}));
        // Sender dropped on close, so the stream ends
        assert!(channel.messages.recv().await.is_none());

        // Closing twice is fine
        feed.close_channel(channel.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_refused_table_fails_to_open() {
        let feed = LocalChangeFeed::new();
        feed.refuse_table(Table::GanttTaskData, "permission denied");

        let err = feed
            .open_channel(&spec(Table::GanttTaskData, None))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("permission denied"));

        // Other tables still work
        assert!(feed.open_channel(&spec(Table::Tasks, None)).await.is_ok());

        feed.accept_table(Table::GanttTaskData);
        assert!(feed.open_channel(&spec(Table::GanttTaskData, None)).await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_is_in_band() {
        let feed = LocalChangeFeed::new();
        let mut channel = feed.open_channel(&spec(Table::Tasks, None)).await.unwrap();

        feed.disconnect(Table::Tasks, "socket reset");
        match channel.messages.try_recv() {
            Ok(ChannelMessage::Disconnected { reason }) => assert_eq!(reason, "socket reset"),
            other => panic!("expected disconnect, got {:?}", other),
        }
        // Still open afterwards
        assert_eq!(feed.open_channel_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_pruned() {
        let feed = LocalChangeFeed::new();
        let channel = feed.open_channel(&spec(Table::Tasks, None)).await.unwrap();
        drop(channel);

        feed.emit_created(Table::Tasks, json!({"id": "t-1"}));
        assert_eq!(feed.open_channel_count(), 0);
    }

    #[tokio::test]
    async fn test_clone_shares_channels() {
        let feed = LocalChangeFeed::new();
        let feed2 = feed.clone();
        let mut channel = feed.open_channel(&spec(Table::Projects, None)).await.unwrap();

        feed2.emit_created(Table::Projects, json!({"id": "p-1"}));
        let event = expect_event(channel.messages.try_recv().ok());
        assert_eq!(event.table, Table::Projects);
    }
}
