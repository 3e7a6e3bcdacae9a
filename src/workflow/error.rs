//! Workflow errors

use super::board::RollbackOutcome;
use super::models::TaskId;
use std::fmt;

/// One step of the cascading delete, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeleteStep {
    GanttData,
    Subtasks,
    TaskUpdates,
    Task,
}

impl DeleteStep {
    pub const ORDER: [DeleteStep; 4] = [
        DeleteStep::GanttData,
        DeleteStep::Subtasks,
        DeleteStep::TaskUpdates,
        DeleteStep::Task,
    ];
}

impl fmt::Display for DeleteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeleteStep::GanttData => "gantt data",
            DeleteStep::Subtasks => "subtasks",
            DeleteStep::TaskUpdates => "task updates",
            DeleteStep::Task => "task",
        })
    }
}

/// The store write a card action issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteAction {
    UpdateStatus,
    Archive,
    Unarchive,
    Update,
    Create,
    SaveGantt,
}

impl fmt::Display for WriteAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteAction::UpdateStatus => "status update",
            WriteAction::Archive => "archive",
            WriteAction::Unarchive => "unarchive",
            WriteAction::Update => "update",
            WriteAction::Create => "create",
            WriteAction::SaveGantt => "gantt save",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("invalid board layout: {0}")]
    InvalidLayout(String),

    /// A store write failed. The optimistic card state was reverted or
    /// flagged stale, as recorded in `rollback`.
    #[error("{action} of task {task_id} failed: {source:#}")]
    Write {
        task_id: TaskId,
        action: WriteAction,
        rollback: Option<RollbackOutcome>,
        #[source]
        source: anyhow::Error,
    },

    /// A cascading delete stopped at `failed`. Steps in `completed` stay
    /// committed; later steps were never attempted.
    #[error(
        "deleting task {task_id} failed at {failed} after {} committed step(s): {source:#}",
        .completed.len()
    )]
    CascadeDelete {
        task_id: TaskId,
        failed: DeleteStep,
        completed: Vec<DeleteStep>,
        #[source]
        source: anyhow::Error,
    },

    #[error("task {0} has dependencies; its start date is derived and cannot be set")]
    DerivedStartDate(TaskId),

    #[error("task {0} has no dependencies and needs a start date")]
    MissingStartDate(TaskId),

    #[error("dependencies of task {task_id} would form a cycle through {via}")]
    DependencyCycle { task_id: TaskId, via: TaskId },

    #[error("task {0} is not a gantt task")]
    NotGanttTask(TaskId),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
