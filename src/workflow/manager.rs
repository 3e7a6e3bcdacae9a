//! Task workflow executor
//!
//! Runs the side effects decided by the transition table against the store,
//! keeps the optimistic board in step, and owns the multi-step operations:
//! cascading delete and Gantt bookkeeping.

use super::board::TaskBoard;
use super::error::{DeleteStep, WorkflowError, WriteAction};
use super::models::{
    CreateTaskRequest, GanttSpec, GanttTaskData, ProjectId, Task, TaskId, TaskPatch,
};
use super::scheduler::{DependencyScheduler, Schedule};
use super::transition::{DragGesture, DropPosition, SideEffect, Transition};
use crate::store::TaskStore;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct TaskWorkflow {
    store: Arc<dyn TaskStore>,
    board: Arc<TaskBoard>,
}

impl TaskWorkflow {
    pub fn new(store: Arc<dyn TaskStore>, board: Arc<TaskBoard>) -> Self {
        Self { store, board }
    }

    pub fn board(&self) -> &Arc<TaskBoard> {
        &self.board
    }

    pub fn store(&self) -> &Arc<dyn TaskStore> {
        &self.store
    }

    /// Load a project's tasks onto the board
    pub async fn load_project(&self, project_id: ProjectId) -> Result<usize, WorkflowError> {
        let tasks = self.store.list_project_tasks(project_id).await?;
        let count = tasks.len();
        self.board.load(tasks).await;
        Ok(count)
    }

    /// Execute a drag gesture.
    ///
    /// The move is applied to the board before the write is issued. When the
    /// write fails the card is reverted, or flagged stale if it moved again
    /// meanwhile, and the error carries which of the two happened.
    pub async fn move_card(&self, gesture: &DragGesture) -> Result<Transition, WorkflowError> {
        if self.board.card(gesture.task_id).await.is_none() {
            let task = self
                .store
                .get_task(gesture.task_id)
                .await?
                .ok_or(WorkflowError::TaskNotFound(gesture.task_id))?;
            self.board.upsert(task).await;
        }

        let pending = self.board.begin(gesture).await?;
        let transition = pending.transition;
        let task_id = gesture.task_id;

        let (action, result) = match transition.effect {
            SideEffect::None => {
                debug!(task_id = %task_id, "Gesture needs no write");
                return Ok(transition);
            }
            SideEffect::UpdateStatus { status } => (
                WriteAction::UpdateStatus,
                self.store
                    .update_task(task_id, &TaskPatch::status(status))
                    .await,
            ),
            SideEffect::Archive => (WriteAction::Archive, self.store.archive_task(task_id).await),
            SideEffect::Unarchive { status } => (
                WriteAction::Unarchive,
                self.store
                    .update_task(task_id, &TaskPatch::unarchive(status))
                    .await,
            ),
        };

        match result {
            Ok(task) => {
                self.board.confirm(&pending, task).await;
                debug!(task_id = %task_id, %action, "Card write committed");
                Ok(transition)
            }
            Err(e) => {
                let rollback = self.board.rollback(&pending).await;
                warn!(task_id = %task_id, %action, ?rollback, "Card write failed: {:#}", e);
                Err(WorkflowError::Write {
                    task_id,
                    action,
                    rollback: Some(rollback),
                    source: e,
                })
            }
        }
    }

    /// Archive a task from whatever column it is in
    pub async fn archive(&self, task_id: TaskId) -> Result<Transition, WorkflowError> {
        let gesture = DragGesture::to_archive_zone(task_id, self.current_position(task_id).await?);
        self.move_card(&gesture).await
    }

    /// Unarchive a task into `column`, taking that column's status
    pub async fn unarchive(
        &self,
        task_id: TaskId,
        column: &str,
    ) -> Result<Transition, WorkflowError> {
        let source = self.current_position(task_id).await?;
        let gesture = DragGesture::to_column(task_id, source, DropPosition::new(column, 0));
        self.move_card(&gesture).await
    }

    async fn current_position(&self, task_id: TaskId) -> Result<DropPosition, WorkflowError> {
        let task = match self.board.card(task_id).await {
            Some(card) => card.task,
            None => self
                .store
                .get_task(task_id)
                .await?
                .ok_or(WorkflowError::TaskNotFound(task_id))?,
        };
        let column = self
            .board
            .layout()
            .column_for(task.card_state())
            .ok_or_else(|| WorkflowError::UnknownColumn(task.status.to_string()))?;
        Ok(DropPosition::new(column.id.clone(), 0))
    }

    /// Delete a task and everything it owns, in ownership order.
    ///
    /// Steps run one after another. On failure the committed steps stay
    /// committed, later steps are never attempted, and the error lists both.
    pub async fn delete_task(&self, task_id: TaskId) -> Result<Vec<DeleteStep>, WorkflowError> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(WorkflowError::TaskNotFound(task_id))?;

        let steps = DeleteStep::ORDER
            .into_iter()
            .filter(|step| *step != DeleteStep::GanttData || task.is_gantt_task);

        let mut completed = Vec::new();
        for step in steps {
            let result = match step {
                DeleteStep::GanttData => self.store.delete_gantt_data(task_id).await.map(|_| ()),
                DeleteStep::Subtasks => self.store.delete_subtasks(task_id).await.map(|_| ()),
                DeleteStep::TaskUpdates => {
                    self.store.delete_task_updates(task_id).await.map(|_| ())
                }
                DeleteStep::Task => self.store.delete_task(task_id).await,
            };

            if let Err(e) = result {
                warn!(
                    task_id = %task_id,
                    step = %step,
                    committed = completed.len(),
                    "Cascading delete stopped: {:#}", e
                );
                return Err(WorkflowError::CascadeDelete {
                    task_id,
                    failed: step,
                    completed,
                    source: e,
                });
            }
            debug!(task_id = %task_id, step = %step, "Delete step committed");
            completed.push(step);
        }

        self.board.remove(task_id).await;
        info!(task_id = %task_id, "Task deleted");
        Ok(completed)
    }

    /// Create a task, and its Gantt row when the request carries one
    pub async fn create_task(&self, request: CreateTaskRequest) -> Result<Task, WorkflowError> {
        let mut task = Task::new(request.project_id, request.title);
        if let Some(status) = request.status {
            task.status = status;
        }
        if let Some(priority) = request.priority {
            task.priority = priority;
        }
        task.due_date = request.due_date;
        task.is_gantt_task = request.gantt.is_some();

        let gantt = match &request.gantt {
            Some(spec) => Some(self.validate_gantt(&task, spec).await?),
            None => None,
        };

        self.store
            .create_task(&task)
            .await
            .map_err(|e| WorkflowError::Write {
                task_id: task.id,
                action: WriteAction::Create,
                rollback: None,
                source: e,
            })?;

        if let Some(data) = gantt {
            if let Err(e) = self.store.upsert_gantt_data(&data).await {
                self.discard_created(&task).await;
                return Err(WorkflowError::Write {
                    task_id: task.id,
                    action: WriteAction::SaveGantt,
                    rollback: None,
                    source: e,
                });
            }
        }

        self.board.upsert(task.clone()).await;
        info!(
            task_id = %task.id,
            project_id = %task.project_id,
            gantt = task.is_gantt_task,
            "Task created"
        );
        Ok(task)
    }

    /// Undo a task row whose Gantt row could not be written. A Gantt task
    /// must not exist without its scheduling data; if the row cannot be
    /// removed either, it is shown on the board so it can be deleted by hand.
    async fn discard_created(&self, task: &Task) {
        match self.store.delete_task(task.id).await {
            Ok(()) => debug!(task_id = %task.id, "Discarded task without Gantt data"),
            Err(e) => {
                warn!(task_id = %task.id, "Task left without Gantt data: {:#}", e);
                self.board.upsert(task.clone()).await;
            }
        }
    }

    /// Apply a partial update and refresh the card from the stored row
    pub async fn update_task(
        &self,
        task_id: TaskId,
        patch: &TaskPatch,
    ) -> Result<Task, WorkflowError> {
        let task = self
            .store
            .update_task(task_id, patch)
            .await
            .map_err(|e| WorkflowError::Write {
                task_id,
                action: WriteAction::Update,
                rollback: None,
                source: e,
            })?;
        self.board.upsert(task.clone()).await;
        Ok(task)
    }

    /// Replace a Gantt task's scheduling data
    pub async fn update_gantt(
        &self,
        task_id: TaskId,
        spec: &GanttSpec,
    ) -> Result<GanttTaskData, WorkflowError> {
        let task = self
            .store
            .get_task(task_id)
            .await?
            .ok_or(WorkflowError::TaskNotFound(task_id))?;
        if !task.is_gantt_task {
            return Err(WorkflowError::NotGanttTask(task_id));
        }

        let data = self.validate_gantt(&task, spec).await?;
        self.store
            .upsert_gantt_data(&data)
            .await
            .map_err(|e| WorkflowError::Write {
                task_id,
                action: WriteAction::SaveGantt,
                rollback: None,
                source: e,
            })?;
        debug!(task_id = %task_id, dependencies = data.dependencies.len(), "Gantt data saved");
        Ok(data)
    }

    /// Start-date invariant plus cycle rejection against the project's rows
    async fn validate_gantt(
        &self,
        task: &Task,
        spec: &GanttSpec,
    ) -> Result<GanttTaskData, WorkflowError> {
        if spec.dependencies.is_empty() {
            if spec.start_date.is_none() {
                return Err(WorkflowError::MissingStartDate(task.id));
            }
        } else {
            if spec.start_date.is_some() {
                return Err(WorkflowError::DerivedStartDate(task.id));
            }
            let rows = self.store.list_gantt_data(task.project_id).await?;
            let scheduler = DependencyScheduler::new(rows);
            if let Some(via) = scheduler.would_create_cycle(task.id, &spec.dependencies) {
                return Err(WorkflowError::DependencyCycle {
                    task_id: task.id,
                    via,
                });
            }
        }

        let mut seen = HashSet::new();
        let mut dependencies = spec.dependencies.clone();
        dependencies.retain(|dep| seen.insert(*dep));

        Ok(GanttTaskData {
            task_id: task.id,
            start_date: spec.start_date,
            duration_days: spec.duration_days,
            dependencies,
        })
    }

    /// Effective schedule of every Gantt task in a project
    pub async fn project_schedule(&self, project_id: ProjectId) -> Result<Schedule, WorkflowError> {
        let rows = self.store.list_gantt_data(project_id).await?;
        Ok(DependencyScheduler::new(rows).schedule())
    }
}
