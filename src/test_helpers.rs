//! Test helper factories and recording fakes
//!
//! Provides task factories with sensible defaults, a cache that records every
//! invalidation with its (paused-clock) instant, an error sink for channel
//! errors, and a store wrapper that logs calls and injects failures.
#![allow(dead_code)]

use crate::cache::{CacheKey, QueryCache};
use crate::store::{MemoryTaskStore, TaskStore};
use crate::sync::{ChannelError, ChannelErrorHandler};
use crate::workflow::*;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use uuid::Uuid;

// ============================================================================
// Factories
// ============================================================================

/// An active task in a fresh project with the given status
pub fn test_task(status: TaskStatus) -> Task {
    let mut task = Task::new(Uuid::new_v4(), "Test task");
    task.status = status;
    task
}

/// `n` days after 2026-01-01
pub fn day(n: u64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1)
        .and_then(|d| d.checked_add_days(Days::new(n)))
        .expect("valid test date")
}

// ============================================================================
// Recording cache
// ============================================================================

/// Query cache that only records invalidations
#[derive(Default)]
pub struct RecordingCache {
    invalidations: Mutex<Vec<(CacheKey, Instant)>>,
}

impl RecordingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Instants at which `key` was invalidated, in order
    pub fn fired_at(&self, key: &CacheKey) -> Vec<Instant> {
        self.invalidations
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn count_for(&self, key: &CacheKey) -> usize {
        self.fired_at(key).len()
    }

    pub fn total(&self) -> usize {
        self.invalidations.lock().unwrap().len()
    }
}

#[async_trait]
impl QueryCache for RecordingCache {
    async fn get(&self, _key: &CacheKey) -> Option<Value> {
        None
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.invalidations
            .lock()
            .unwrap()
            .push((key.clone(), Instant::now()));
    }
}

// ============================================================================
// Channel error sink
// ============================================================================

#[derive(Clone, Default)]
pub struct ErrorSink {
    errors: Arc<Mutex<Vec<ChannelError>>>,
}

impl ErrorSink {
    pub fn handler(&self) -> ChannelErrorHandler {
        let errors = self.errors.clone();
        Arc::new(move |error: &ChannelError| errors.lock().unwrap().push(error.clone()))
    }

    /// Drain the collected errors
    pub fn take(&self) -> Vec<ChannelError> {
        std::mem::take(&mut *self.errors.lock().unwrap())
    }
}

// ============================================================================
// Fault-injecting store
// ============================================================================

/// `MemoryTaskStore` wrapper that records each call by method name and fails
/// the methods named in `fail_on`
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryTaskStore,
    failing: Mutex<HashSet<&'static str>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, method: &'static str) {
        self.failing.lock().unwrap().insert(method);
    }

    pub fn heal(&self, method: &'static str) {
        self.failing.lock().unwrap().remove(method);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn enter(&self, method: &'static str) -> Result<()> {
        self.calls.lock().unwrap().push(method);
        if self.failing.lock().unwrap().contains(method) {
            Err(anyhow!("injected failure in {}", method))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl TaskStore for FaultyStore {
    async fn create_project(&self, project: &Project) -> Result<()> {
        self.enter("create_project")?;
        self.inner.create_project(project).await
    }

    async fn get_project(&self, id: ProjectId) -> Result<Option<Project>> {
        self.enter("get_project")?;
        self.inner.get_project(id).await
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        self.enter("list_projects")?;
        self.inner.list_projects().await
    }

    async fn create_task(&self, task: &Task) -> Result<()> {
        self.enter("create_task")?;
        self.inner.create_task(task).await
    }

    async fn get_task(&self, id: TaskId) -> Result<Option<Task>> {
        self.enter("get_task")?;
        self.inner.get_task(id).await
    }

    async fn list_project_tasks(&self, project_id: ProjectId) -> Result<Vec<Task>> {
        self.enter("list_project_tasks")?;
        self.inner.list_project_tasks(project_id).await
    }

    async fn update_task(&self, id: TaskId, patch: &TaskPatch) -> Result<Task> {
        self.enter("update_task")?;
        self.inner.update_task(id, patch).await
    }

    async fn archive_task(&self, id: TaskId) -> Result<Task> {
        self.enter("archive_task")?;
        self.inner.archive_task(id).await
    }

    async fn delete_task(&self, id: TaskId) -> Result<()> {
        self.enter("delete_task")?;
        self.inner.delete_task(id).await
    }

    async fn create_subtask(&self, subtask: &Subtask) -> Result<()> {
        self.enter("create_subtask")?;
        self.inner.create_subtask(subtask).await
    }

    async fn list_subtasks(&self, task_id: TaskId) -> Result<Vec<Subtask>> {
        self.enter("list_subtasks")?;
        self.inner.list_subtasks(task_id).await
    }

    async fn delete_subtasks(&self, task_id: TaskId) -> Result<usize> {
        self.enter("delete_subtasks")?;
        self.inner.delete_subtasks(task_id).await
    }

    async fn create_task_update(&self, update: &TaskUpdate) -> Result<()> {
        self.enter("create_task_update")?;
        self.inner.create_task_update(update).await
    }

    async fn list_task_updates(&self, task_id: TaskId) -> Result<Vec<TaskUpdate>> {
        self.enter("list_task_updates")?;
        self.inner.list_task_updates(task_id).await
    }

    async fn delete_task_updates(&self, task_id: TaskId) -> Result<usize> {
        self.enter("delete_task_updates")?;
        self.inner.delete_task_updates(task_id).await
    }

    async fn get_gantt_data(&self, task_id: TaskId) -> Result<Option<GanttTaskData>> {
        self.enter("get_gantt_data")?;
        self.inner.get_gantt_data(task_id).await
    }

    async fn upsert_gantt_data(&self, data: &GanttTaskData) -> Result<()> {
        self.enter("upsert_gantt_data")?;
        self.inner.upsert_gantt_data(data).await
    }

    async fn delete_gantt_data(&self, task_id: TaskId) -> Result<bool> {
        self.enter("delete_gantt_data")?;
        self.inner.delete_gantt_data(task_id).await
    }

    async fn list_gantt_data(&self, project_id: ProjectId) -> Result<Vec<GanttTaskData>> {
        self.enter("list_gantt_data")?;
        self.inner.list_gantt_data(project_id).await
    }
}
