//! Task workflow
//!
//! This module provides:
//! - Task, subtask, update and Gantt models
//! - `BoardLayout` — the column/status mapping
//! - `plan_transition` — pure drag-gesture transition table
//! - `TaskBoard` — optimistic local card state
//! - `TaskWorkflow` — executes transitions, cascading deletes and Gantt edits
//! - `DependencyScheduler` — dependency-derived start dates

mod board;
mod columns;
mod error;
mod manager;
mod models;
mod scheduler;
mod transition;

pub use board::{BoardCard, PendingMove, RollbackOutcome, TaskBoard};
pub use columns::{BoardLayout, Column, ColumnKind};
pub use error::{DeleteStep, WorkflowError, WriteAction};
pub use manager::TaskWorkflow;
pub use models::*;
pub use scheduler::{DependencyScheduler, Schedule, ScheduleEntry};
pub use transition::{
    plan_transition, DragGesture, DropPosition, DropTarget, SideEffect, Transition,
};
