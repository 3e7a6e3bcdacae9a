//! Store write interface
//!
//! The authoritative store is an external collaborator reached through
//! `TaskStore`. Every committed write is expected to surface on the change
//! feed as a row event.

mod memory;

pub use memory::MemoryTaskStore;

use crate::workflow::{
    GanttTaskData, Project, ProjectId, Subtask, Task, TaskId, TaskPatch, TaskUpdate,
};
use anyhow::Result;
use async_trait::async_trait;

#[async_trait]
pub trait TaskStore: Send + Sync {
    // ========================================================================
    // Projects
    // ========================================================================

    async fn create_project(&self, project: &Project) -> Result<()>;

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>>;

    async fn list_projects(&self) -> Result<Vec<Project>>;

    // ========================================================================
    // Tasks
    // ========================================================================

    async fn create_task(&self, task: &Task) -> Result<()>;

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>>;

    /// Every task of a project, archived ones included
    async fn list_project_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>>;

    /// Apply a partial update in one write and return the stored row
    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task>;

    /// Archive a task as one atomic server-side operation.
    ///
    /// Concurrent readers observe either the active or the archived row,
    /// never an intermediate state. The task's status is left untouched.
    async fn archive_task(&self, id: TaskId) -> Result<Task>;

    /// Delete the task row only. Fails while owned rows remain.
    async fn delete_task(&self, id: TaskId) -> Result<()>;

    // ========================================================================
    // Subtasks
    // ========================================================================

    async fn create_subtask(&self, subtask: &Subtask) -> Result<()>;

    async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>>;

    /// Delete every subtask owned by `task_id`, returning how many went
    async fn delete_subtasks(&self, task_id: TaskId) -> Result<usize>;

    // ========================================================================
    // Task updates
    // ========================================================================

    async fn create_task_update(&self, update: &TaskUpdate) -> Result<()>;

    async fn list_task_updates(&self, task_id: TaskId) -> Result<Vec<TaskUpdate>>;

    async fn delete_task_updates(&self, task_id: TaskId) -> Result<usize>;

    // ========================================================================
    // Gantt data
    // ========================================================================

    async fn get_gantt_data(&self, task_id: TaskId) -> Result<Option<GanttTaskData>>;

    async fn upsert_gantt_data(&self, data: &GanttTaskData) -> Result<()>;

    /// Returns whether a row existed
    async fn delete_gantt_data(&self, task_id: TaskId) -> Result<bool>;

    /// Gantt rows of every task in a project
    async fn list_gantt_data(&self, project_id: ProjectId) -> Result<Vec<GanttTaskData>>;
}
