//! Binding sets used by the standard views

use super::binding::Binding;
use crate::cache::CacheKey;
use crate::events::Table;
use crate::workflow::{ProjectId, TaskId};
use std::time::Duration;

/// Cache key of a project's task board
pub fn board_key(project_id: ProjectId) -> CacheKey {
    CacheKey::named("tasks").with(project_id)
}

/// Cache key of a project's Gantt schedule
pub fn gantt_key(project_id: ProjectId) -> CacheKey {
    CacheKey::named("gantt").with(project_id)
}

/// Cache key of one task's detail view (subtasks and updates)
pub fn task_detail_key(task_id: TaskId) -> CacheKey {
    CacheKey::named("task").with(task_id)
}

/// Cache key of the dashboard-wide aggregate
pub fn dashboard_key() -> CacheKey {
    CacheKey::named("dashboard")
}

/// Task board of one project
pub fn board_bindings(project_id: ProjectId) -> Vec<Binding> {
    vec![Binding::new(Table::Tasks, board_key(project_id)).filter("project_id", project_id)]
}

/// Gantt timeline of one project.
///
/// Gantt rows carry no project column, so that table is watched unfiltered.
pub fn gantt_bindings(project_id: ProjectId) -> Vec<Binding> {
    let key = gantt_key(project_id);
    vec![
        Binding::new(Table::Tasks, key.clone()).filter("project_id", project_id),
        Binding::new(Table::GanttTaskData, key),
    ]
}

/// Detail view of one task
pub fn task_detail_bindings(task_id: TaskId) -> Vec<Binding> {
    let key = task_detail_key(task_id);
    vec![
        Binding::new(Table::Subtasks, key.clone()).filter("task_id", task_id),
        Binding::new(Table::TaskUpdates, key.clone()).filter("task_id", task_id),
        Binding::new(Table::Tasks, key).filter("id", task_id),
    ]
}

/// Dashboard-wide aggregate over every project, debounced with `window`
pub fn dashboard_bindings(window: Duration) -> Vec<Binding> {
    [
        Table::Projects,
        Table::Tasks,
        Table::Subtasks,
        Table::TaskUpdates,
    ]
    .into_iter()
    .map(|table| Binding::new(table, dashboard_key()).debounce(window))
    .collect()
}
