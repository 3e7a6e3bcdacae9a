//! Row-change event types for the change feed

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;

/// A table whose rows are observed by the change feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Projects,
    Tasks,
    Subtasks,
    TaskUpdates,
    GanttTaskData,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Projects => "projects",
            Table::Tasks => "tasks",
            Table::Subtasks => "subtasks",
            Table::TaskUpdates => "task_updates",
            Table::GanttTaskData => "gantt_task_data",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The write that produced a change event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

/// The operation kind a subscriber listens for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Create,
    Update,
    Delete,
    Any,
}

impl EventKind {
    /// Whether an event of operation `op` is of interest to this kind
    pub fn matches(&self, op: ChangeOp) -> bool {
        matches!(
            (self, op),
            (EventKind::Any, _)
                | (EventKind::Create, ChangeOp::Create)
                | (EventKind::Update, ChangeOp::Update)
                | (EventKind::Delete, ChangeOp::Delete)
        )
    }
}

/// Column-equality filter applied to a row snapshot (`column = value`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub value: String,
}

impl RowFilter {
    pub fn new(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Whether the row carries `column` with a value equal to the filter value.
    ///
    /// Non-string JSON scalars are compared through their textual form, so a
    /// filter value of `"3"` matches a numeric column holding `3`.
    pub fn matches(&self, row: &serde_json::Value) -> bool {
        match row.get(&self.column) {
            Some(serde_json::Value::String(s)) => s == &self.value,
            Some(serde_json::Value::Null) | None => false,
            Some(other) => other.to_string() == self.value,
        }
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=eq.{}", self.column, self.value)
    }
}

/// A committed row change, delivered once per matching channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub operation: ChangeOp,
    /// Row snapshot after the write (before it, for deletes)
    pub row: serde_json::Value,
    pub committed_at: DateTime<Utc>,
}

impl ChangeEvent {
    pub fn new(table: Table, operation: ChangeOp, row: serde_json::Value) -> Self {
        Self {
            table,
            operation,
            row,
            committed_at: Utc::now(),
        }
    }
}

/// What a channel subscribes to: one table, optionally narrowed by a filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelSpec {
    pub table: Table,
    pub filter: Option<RowFilter>,
}

impl ChannelSpec {
    /// Whether an event belongs on a channel opened with this spec
    pub fn accepts(&self, event: &ChangeEvent) -> bool {
        self.table == event.table
            && self
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(&event.row))
    }
}

impl fmt::Display for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{}:{}", self.table, filter),
            None => write!(f, "{}", self.table),
        }
    }
}

/// Handle identifying an open channel at the change source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel-{}", self.0)
    }
}

/// A message delivered on an open channel
#[derive(Debug, Clone)]
pub enum ChannelMessage {
    Event(ChangeEvent),
    /// Transient disconnect reported by the source. The channel stays open;
    /// reconnecting is the source's business.
    Disconnected { reason: String },
}

/// An established channel: its handle plus the stream of messages
#[derive(Debug)]
pub struct ChangeChannel {
    pub id: ChannelId,
    pub messages: mpsc::UnboundedReceiver<ChannelMessage>,
}
