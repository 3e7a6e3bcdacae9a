//! Row-change notification feed
//!
//! This module provides:
//! - `ChangeEvent` and friends — typed row changes keyed by table
//! - `ChangeSource` — the channel interface consumed by the invalidation engine
//! - `ChangeEmitter` — the publisher interface used by the store
//! - `LocalChangeFeed` — in-process implementation of both

mod feed;
mod source;
mod types;

pub use feed::LocalChangeFeed;
pub use source::{ChangeEmitter, ChangeSource};
pub use types::{
    ChangeChannel, ChangeEvent, ChangeOp, ChannelId, ChannelMessage, ChannelSpec, EventKind,
    RowFilter, Table,
};
