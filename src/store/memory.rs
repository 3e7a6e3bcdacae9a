//! In-memory task store
//!
//! Authoritative store backed by `tokio::sync::RwLock<HashMap<K, V>>`
//! collections. Every committed write is published on the attached
//! `ChangeEmitter` as a row event, one event per affected row. Ownership is
//! enforced like foreign keys: a task row cannot be deleted while it still
//! owns subtasks, updates or Gantt data.

use super::TaskStore;
use crate::events::{ChangeEmitter, ChangeOp, ChangeEvent, Table};
use crate::workflow::{
    GanttTaskData, Project, ProjectId, Subtask, Task, TaskId, TaskPatch, TaskUpdate,
};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryTaskStore {
    projects: RwLock<HashMap<ProjectId, Project>>,
    tasks: RwLock<HashMap<TaskId, Task>>,
    subtasks: RwLock<HashMap<Uuid, Subtask>>,
    updates: RwLock<HashMap<Uuid, TaskUpdate>>,
    gantt: RwLock<HashMap<TaskId, GanttTaskData>>,
    emitter: Option<Arc<dyn ChangeEmitter>>,
}

impl MemoryTaskStore {
    /// A store that publishes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that publishes every committed write on `emitter`
    pub fn with_emitter(emitter: Arc<dyn ChangeEmitter>) -> Self {
        Self {
            emitter: Some(emitter),
            ..Default::default()
        }
    }

    fn publish<T: Serialize>(&self, table: Table, operation: ChangeOp, row: &T) {
        let Some(emitter) = &self.emitter else {
            return;
        };
        match serde_json::to_value(row) {
            Ok(row) => emitter.emit(ChangeEvent::new(table, operation, row)),
            Err(e) => warn!(table = %table, "Failed to serialize changed row: {}", e),
        }
    }

    async fn require_task(&self, id: TaskId) -> Result<()> {
        if self.tasks.read().await.contains_key(&id) {
            Ok(())
        } else {
            Err(anyhow!("task {} not found", id))
        }
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        self.projects
            .write()
            .await
            .insert(project.id, project.clone());
        self.publish(Table::Projects, ChangeOp::Create, project);
        Ok(())
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        Ok(self.projects.read().await.get(&id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(projects)
    }

    async fn create_task(&self, task: &Task) -> Result<()> {
        if !self.projects.read().await.contains_key(&task.project_id) {
            bail!("project {} not found", task.project_id);
        }
        {
            let mut tasks = self.tasks.write().await;
            if tasks.contains_key(&task.id) {
                bail!("task {} already exists", task.id);
            }
            tasks.insert(task.id, task.clone());
        }
        self.publish(Table::Tasks, ChangeOp::Create, task);
        Ok(())
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.read().await.get(&id).cloned())
    }

    async fn list_project_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>> {
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task> {
        let task = {
            let mut tasks = self.tasks.write().await;
            let task = tasks
                .get_mut(&id)
                .ok_or_else(|| anyhow!("task {} not found", id))?;
            task.apply(patch);
            task.clone()
        };
        self.publish(Table::Tasks, ChangeOp::Update, &task);
        Ok(task)
    }

    async fn archive_task(&self, id: TaskId) -> Result<Task> {
        // Flag and timestamp change under one write guard
        let task = {
            let mut tasks = self.tasks.write().await;
            let task = tasks
                .get_mut(&id)
                .ok_or_else(|| anyhow!("task {} not found", id))?;
            task.is_archived = true;
            task.updated_at = Some(Utc::now());
            task.clone()
        };
        self.publish(Table::Tasks, ChangeOp::Update, &task);
        Ok(task)
    }

    async fn delete_task(&self, id: TaskId) -> Result<()> {
        let subtasks = self
            .subtasks
            .read()
            .await
            .values()
            .filter(|s| s.task_id == id)
            .count();
        let updates = self
            .updates
            .read()
            .await
            .values()
            .filter(|u| u.task_id == id)
            .count();
        let has_gantt = self.gantt.read().await.contains_key(&id);
        if subtasks > 0 || updates > 0 || has_gantt {
            bail!(
                "task {} still owns {} subtask(s), {} update(s), gantt data: {}",
                id,
                subtasks,
                updates,
                has_gantt
            );
        }

        let removed = self.tasks.write().await.remove(&id);
        match removed {
            Some(task) => {
                self.publish(Table::Tasks, ChangeOp::Delete, &task);
                Ok(())
            }
            None => Err(anyhow!("task {} not found", id)),
        }
    }

    async fn create_subtask(&self, subtask: &Subtask) -> Result<()> {
        self.require_task(subtask.task_id).await?;
        self.subtasks
            .write()
            .await
            .insert(subtask.id, subtask.clone());
        self.publish(Table::Subtasks, ChangeOp::Create, subtask);
        Ok(())
    }

    async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>> {
        let mut subtasks: Vec<Subtask> = self
            .subtasks
            .read()
            .await
            .values()
            .filter(|s| s.task_id == task_id)
            .cloned()
            .collect();
        subtasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(subtasks)
    }

    async fn delete_subtasks(&self, task_id: TaskId) -> Result<usize> {
        let removed: Vec<Subtask> = {
            let mut subtasks = self.subtasks.write().await;
            let ids: Vec<Uuid> = subtasks
                .values()
                .filter(|s| s.task_id == task_id)
                .map(|s| s.id)
                .collect();
            ids.iter().filter_map(|id| subtasks.remove(id)).collect()
        };
        for subtask in &removed {
            self.publish(Table::Subtasks, ChangeOp::Delete, subtask);
        }
        Ok(removed.len())
    }

    async fn create_task_update(&self, update: &TaskUpdate) -> Result<()> {
        self.require_task(update.task_id).await?;
        self.updates.write().await.insert(update.id, update.clone());
        self.publish(Table::TaskUpdates, ChangeOp::Create, update);
        Ok(())
    }

    async fn list_task_updates(&self, task_id: TaskId) -> Result<Vec<TaskUpdate>> {
        let mut updates: Vec<TaskUpdate> = self
            .updates
            .read()
            .await
            .values()
            .filter(|u| u.task_id == task_id)
            .cloned()
            .collect();
        updates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(updates)
    }

    async fn delete_task_updates(&self, task_id: TaskId) -> Result<usize> {
        let removed: Vec<TaskUpdate> = {
            let mut updates = self.updates.write().await;
            let ids: Vec<Uuid> = updates
                .values()
                .filter(|u| u.task_id == task_id)
                .map(|u| u.id)
                .collect();
            ids.iter().filter_map(|id| updates.remove(id)).collect()
        };
        for update in &removed {
            self.publish(Table::TaskUpdates, ChangeOp::Delete, update);
        }
        Ok(removed.len())
    }

    async fn get_gantt_data(&self, task_id: TaskId) -> Result<Option<GanttTaskData>> {
        Ok(self.gantt.read().await.get(&task_id).cloned())
    }

    async fn upsert_gantt_data(&self, data: &GanttTaskData) -> Result<()> {
        self.require_task(data.task_id).await?;
        let previous = self
            .gantt
            .write()
            .await
            .insert(data.task_id, data.clone());
        let operation = if previous.is_some() {
            ChangeOp::Update
        } else {
            ChangeOp::Create
        };
        self.publish(Table::GanttTaskData, operation, data);
        Ok(())
    }

    async fn delete_gantt_data(&self, task_id: TaskId) -> Result<bool> {
        let removed = self.gantt.write().await.remove(&task_id);
        if let Some(data) = &removed {
            self.publish(Table::GanttTaskData, ChangeOp::Delete, data);
        }
        Ok(removed.is_some())
    }

    async fn list_gantt_data(&self, project_id: ProjectId) -> Result<Vec<GanttTaskData>> {
        let task_ids: Vec<TaskId> = self
            .tasks
            .read()
            .await
            .values()
            .filter(|t| t.project_id == project_id)
            .map(|t| t.id)
            .collect();
        let gantt = self.gantt.read().await;
        Ok(task_ids
            .iter()
            .filter_map(|id| gantt.get(id).cloned())
            .collect())
    }
}
