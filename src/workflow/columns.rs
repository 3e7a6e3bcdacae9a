//! Board column layout
//!
//! A static ordered list of columns, each showing one status or the archive.
//! A card's column is a pure function of its `(status, archived)` state.

use super::error::WorkflowError;
use super::models::{CardState, TaskStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Status(TaskStatus),
    Archive,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: String,
    pub title: String,
    pub kind: ColumnKind,
}

impl Column {
    pub fn status(id: impl Into<String>, title: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: ColumnKind::Status(status),
        }
    }

    pub fn archive(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: ColumnKind::Archive,
        }
    }

    pub fn is_archive(&self) -> bool {
        self.kind == ColumnKind::Archive
    }
}

/// Validated, ordered column list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardLayout {
    columns: Vec<Column>,
}

impl BoardLayout {
    /// Validate and build a layout.
    ///
    /// Requires unique ids, at most one column per status, and exactly one
    /// archive column.
    pub fn new(columns: Vec<Column>) -> Result<Self, WorkflowError> {
        let mut ids = HashSet::new();
        let mut statuses = HashSet::new();
        let mut archives = 0;

        for column in &columns {
            if !ids.insert(column.id.as_str()) {
                return Err(WorkflowError::InvalidLayout(format!(
                    "duplicate column id '{}'",
                    column.id
                )));
            }
            match column.kind {
                ColumnKind::Status(status) => {
                    if !statuses.insert(status) {
                        return Err(WorkflowError::InvalidLayout(format!(
                            "status '{}' is shown by more than one column",
                            status
                        )));
                    }
                }
                ColumnKind::Archive => archives += 1,
            }
        }

        if archives != 1 {
            return Err(WorkflowError::InvalidLayout(format!(
                "expected exactly one archive column, found {}",
                archives
            )));
        }

        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == id)
    }

    /// Like `column`, but an unknown id is an error
    pub fn require(&self, id: &str) -> Result<&Column, WorkflowError> {
        self.column(id)
            .ok_or_else(|| WorkflowError::UnknownColumn(id.to_string()))
    }

    pub fn archive_column(&self) -> &Column {
        // Guaranteed by `new`
        self.columns
            .iter()
            .find(|c| c.is_archive())
            .unwrap_or(&self.columns[0])
    }

    /// The column a card in `state` is shown in. `None` if the layout has no
    /// column for an active card's status.
    pub fn column_for(&self, state: CardState) -> Option<&Column> {
        if state.archived {
            return Some(self.archive_column());
        }
        self.columns
            .iter()
            .find(|c| c.kind == ColumnKind::Status(state.status))
    }
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            columns: vec![
                Column::status("not_started", "Not Started", TaskStatus::NotStarted),
                Column::status("in_progress", "In Progress", TaskStatus::InProgress),
                Column::status("pending", "Pending", TaskStatus::Pending),
                Column::status("stuck", "Stuck", TaskStatus::Stuck),
                Column::status("completed", "Completed", TaskStatus::Completed),
                Column::archive("archived", "Archived"),
            ],
        }
    }
}
